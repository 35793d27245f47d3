use std::collections::{BTreeMap, BTreeSet};

use crate::domain::network::NetworkPlan;
use crate::domain::network::forwarding::RoutingCycleType;
use crate::domain::network::layer::RoutingType;
use crate::domain::utils::Attributes;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{DemandId, LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId, RouteId};
use crate::error::{Error, Result};

/// Unicast traffic offered between two nodes of a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Demand {
    pub id: DemandId,
    pub index: usize,
    pub layer: LayerId,
    pub ingress: NodeId,
    pub egress: NodeId,
    pub offered_traffic: f64,

    /// Resource types every route of the demand has to traverse, in this order. Empty for
    /// plain demands, which admit no resources on their routes.
    pub service_chain: Vec<String>,

    /// The upper-layer link whose capacity this demand provides.
    pub coupled_upper_link: Option<LinkId>,
    pub attributes: Attributes,
}

impl Indexed for Demand {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl Demand {
    pub fn is_service_chain(&self) -> bool {
        !self.service_chain.is_empty()
    }

    pub fn is_coupled(&self) -> bool {
        self.coupled_upper_link.is_some()
    }
}

/// Traffic offered from one ingress node to a set of egress nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticastDemand {
    pub id: MulticastDemandId,
    pub index: usize,
    pub layer: LayerId,
    pub ingress: NodeId,
    pub egress: BTreeSet<NodeId>,
    pub offered_traffic: f64,

    /// Upper-layer links fed by this demand, one per egress node.
    pub coupled_upper_links: BTreeMap<NodeId, LinkId>,
    pub attributes: Attributes,
}

impl Indexed for MulticastDemand {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl MulticastDemand {
    pub fn is_coupled(&self) -> bool {
        !self.coupled_upper_links.is_empty()
    }
}

impl NetworkPlan {
    //-----------------------
    // --- Unicast Demands ---
    //-----------------------

    pub fn demands(&self, layer: LayerId) -> Result<Vec<&Demand>> {
        Ok(self.layer(layer)?.demands.values().collect())
    }

    pub fn demand_ids(&self, layer: LayerId) -> Result<Vec<DemandId>> {
        Ok(self.layer(layer)?.demands.ids())
    }

    pub fn add_demand(&mut self, ingress: NodeId, egress: NodeId, offered_traffic: f64, layer: LayerId) -> Result<DemandId> {
        self.insert_demand(None, ingress, egress, offered_traffic, layer, Vec::new())
    }

    /// Adds a demand whose routes must traverse resources of `service_chain` types, in order.
    pub fn add_service_chain_demand(
        &mut self,
        ingress: NodeId,
        egress: NodeId,
        offered_traffic: f64,
        layer: LayerId,
        service_chain: Vec<String>,
    ) -> Result<DemandId> {
        self.insert_demand(None, ingress, egress, offered_traffic, layer, service_chain)
    }

    pub(crate) fn insert_demand(
        &mut self,
        id: Option<u64>,
        ingress: NodeId,
        egress: NodeId,
        offered_traffic: f64,
        layer: LayerId,
        service_chain: Vec<String>,
    ) -> Result<DemandId> {
        self.layer(layer)?;
        self.node(ingress)?;
        self.node(egress)?;
        if ingress == egress {
            return Err(Error::InvalidValue(format!("demand ingress and egress must differ (node {})", ingress)));
        }
        Self::require_non_negative("offered traffic", offered_traffic)?;

        let id: DemandId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding demand {} ({} -> {}) in layer {} offering {}", id, ingress, egress, layer, offered_traffic);
        let demand = Demand {
            id,
            index: 0,
            layer,
            ingress,
            egress,
            offered_traffic,
            service_chain,
            coupled_upper_link: None,
            attributes: Attributes::new(),
        };
        self.layer_mut(layer)?.demands.insert(id, demand);
        self.invalidate_caches();
        Ok(id)
    }

    pub fn set_demand_offered_traffic(&mut self, demand: DemandId, offered_traffic: f64) -> Result<()> {
        Self::require_non_negative("offered traffic", offered_traffic)?;
        self.demand_mut(demand)?.offered_traffic = offered_traffic;
        Ok(())
    }

    /// Replaces the mandatory resource-type sequence. Only allowed while the demand has no
    /// routes, since existing routes were validated against the old sequence.
    pub fn set_demand_service_chain(&mut self, demand: DemandId, service_chain: Vec<String>) -> Result<()> {
        if !self.demand_routes(demand)?.is_empty() {
            return Err(Error::InvalidValue(format!("demand {} has routes; remove them before changing its service chain", demand)));
        }
        self.demand_mut(demand)?.service_chain = service_chain;
        Ok(())
    }

    /// Routes realizing `demand`, in index order.
    pub fn demand_routes(&self, demand: DemandId) -> Result<Vec<RouteId>> {
        self.demand(demand)?;
        Ok(self.caches().routes_of_demand(demand))
    }

    /// Traffic of the demand reaching its egress: the sum over its routes (zero for failed
    /// ones) or, under hop-by-hop routing, the result of propagating the forwarding rules.
    pub fn demand_carried_traffic(&self, demand: DemandId) -> Result<f64> {
        let layer = self.demand_layer(demand)?;
        match self.layer(layer)?.routing_type {
            RoutingType::SourceRouting => {
                let mut total = 0.0;
                for route in self.demand_routes(demand)? {
                    total += self.route_carried_traffic(route)?;
                }
                Ok(total)
            }
            RoutingType::HopByHop => Ok(self.demand_flow(demand)?.carried_traffic),
        }
    }

    pub fn demand_blocked_traffic(&self, demand: DemandId) -> Result<f64> {
        let offered = self.demand(demand)?.offered_traffic;
        Ok((offered - self.demand_carried_traffic(demand)?).max(0.0))
    }

    /// Whether the demand's routing revisits a node.
    ///
    /// Under source routing a route that revisits a node is an open cycle. Under hop-by-hop
    /// routing the forwarding rules are analysed, see `NetworkPlan::demand_flow`.
    pub fn demand_routing_cycle_type(&self, demand: DemandId) -> Result<RoutingCycleType> {
        let layer = self.demand_layer(demand)?;
        match self.layer(layer)?.routing_type {
            RoutingType::SourceRouting => {
                for route in self.demand_routes(demand)? {
                    let sequence = self.route_node_sequence(route)?;
                    let distinct: BTreeSet<_> = sequence.iter().collect();
                    if distinct.len() != sequence.len() {
                        return Ok(RoutingCycleType::OpenCycles);
                    }
                }
                Ok(RoutingCycleType::Loopless)
            }
            RoutingType::HopByHop => Ok(self.demand_flow(demand)?.cycle_type),
        }
    }

    /// Largest end-to-end delay over the routes of the demand that currently carry traffic.
    pub fn demand_worst_case_delay_ms(&self, demand: DemandId) -> Result<f64> {
        let mut worst: f64 = 0.0;
        for route in self.demand_routes(demand)? {
            if self.route_carried_traffic(route)? > 0.0 {
                worst = worst.max(self.route_propagation_delay_ms(route)?);
            }
        }
        Ok(worst)
    }

    /// Removes a demand with its routes and forwarding rules, dissolving its coupling.
    pub fn remove_demand(&mut self, demand: DemandId) -> Result<()> {
        let layer = self.demand_layer(demand)?;

        if self.demand(demand)?.coupled_upper_link.is_some() {
            self.decouple_demand(demand)?;
        }

        for route in self.demand_routes(demand)? {
            self.remove_route(route)?;
        }

        let target = self.layer_mut(layer)?;
        target.forwarding_rules.retain(|(d, _), _| *d != demand);
        target.demands.remove(demand);

        log::debug!("Removed demand {} from layer {}", demand, layer);
        self.invalidate_caches();
        Ok(())
    }

    //-------------------------
    // --- Multicast Demands ---
    //-------------------------

    pub fn multicast_demands(&self, layer: LayerId) -> Result<Vec<&MulticastDemand>> {
        Ok(self.layer(layer)?.multicast_demands.values().collect())
    }

    pub fn add_multicast_demand(
        &mut self,
        ingress: NodeId,
        egress: BTreeSet<NodeId>,
        offered_traffic: f64,
        layer: LayerId,
    ) -> Result<MulticastDemandId> {
        self.insert_multicast_demand(None, ingress, egress, offered_traffic, layer)
    }

    pub(crate) fn insert_multicast_demand(
        &mut self,
        id: Option<u64>,
        ingress: NodeId,
        egress: BTreeSet<NodeId>,
        offered_traffic: f64,
        layer: LayerId,
    ) -> Result<MulticastDemandId> {
        self.layer(layer)?;
        self.node(ingress)?;
        if egress.is_empty() {
            return Err(Error::InvalidValue("multicast demand needs at least one egress node".into()));
        }
        for node in &egress {
            self.node(*node)?;
        }
        if egress.contains(&ingress) {
            return Err(Error::InvalidValue(format!("multicast ingress node {} cannot be an egress node", ingress)));
        }
        Self::require_non_negative("offered traffic", offered_traffic)?;

        let id: MulticastDemandId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding multicast demand {} from {} to {} egress nodes in layer {}", id, ingress, egress.len(), layer);
        let demand = MulticastDemand {
            id,
            index: 0,
            layer,
            ingress,
            egress,
            offered_traffic,
            coupled_upper_links: BTreeMap::new(),
            attributes: Attributes::new(),
        };
        self.layer_mut(layer)?.multicast_demands.insert(id, demand);
        self.invalidate_caches();
        Ok(id)
    }

    pub fn set_multicast_demand_offered_traffic(&mut self, demand: MulticastDemandId, offered_traffic: f64) -> Result<()> {
        Self::require_non_negative("offered traffic", offered_traffic)?;
        self.multicast_demand_mut(demand)?.offered_traffic = offered_traffic;
        Ok(())
    }

    pub fn multicast_demand_trees(&self, demand: MulticastDemandId) -> Result<Vec<MulticastTreeId>> {
        let layer = self.multicast_demand_layer(demand)?;
        Ok(self.layer(layer)?.multicast_trees.values().filter(|tree| tree.demand == demand).map(|tree| tree.id).collect())
    }

    pub fn multicast_demand_carried_traffic(&self, demand: MulticastDemandId) -> Result<f64> {
        let mut total = 0.0;
        for tree in self.multicast_demand_trees(demand)? {
            total += self.multicast_tree_carried_traffic(tree)?;
        }
        Ok(total)
    }

    /// Traffic of the demand's trees that currently reach `node`.
    pub fn multicast_demand_traffic_reaching(&self, demand: MulticastDemandId, node: NodeId) -> Result<f64> {
        let mut total = 0.0;
        for tree in self.multicast_demand_trees(demand)? {
            if self.multicast_tree_reached_nodes(tree)?.contains(&node) {
                total += self.multicast_tree_carried_traffic(tree)?;
            }
        }
        Ok(total)
    }

    /// Removes a multicast demand with its trees, dissolving its couplings.
    pub fn remove_multicast_demand(&mut self, demand: MulticastDemandId) -> Result<()> {
        let layer = self.multicast_demand_layer(demand)?;

        if self.multicast_demand(demand)?.is_coupled() {
            self.decouple_multicast_demand(demand)?;
        }
        for tree in self.multicast_demand_trees(demand)? {
            self.remove_multicast_tree(tree)?;
        }

        self.layer_mut(layer)?.multicast_demands.remove(demand);
        log::debug!("Removed multicast demand {} from layer {}", demand, layer);
        self.invalidate_caches();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demand_validation() {
        let mut plan = NetworkPlan::new();
        let layer = plan.default_layer();
        let a = plan.add_node(0.0, 0.0, "A").unwrap();
        let b = plan.add_node(1.0, 0.0, "B").unwrap();

        assert!(matches!(plan.add_demand(a, a, 1.0, layer), Err(Error::InvalidValue(_))));
        assert!(matches!(plan.add_demand(a, b, -1.0, layer), Err(Error::InvalidValue(_))));
        assert!(matches!(plan.add_demand(a, b, 1.0, LayerId::new(50)), Err(Error::InvalidLayer(_))));

        let demand = plan.add_demand(a, b, 5.0, layer).unwrap();
        assert_eq!(plan.demand(demand).unwrap().offered_traffic, 5.0);
        assert_eq!(plan.demand_carried_traffic(demand).unwrap(), 0.0);
        assert_eq!(plan.demand_blocked_traffic(demand).unwrap(), 5.0);
    }

    #[test]
    fn test_multicast_demand_rejects_ingress_in_egress() {
        let mut plan = NetworkPlan::new();
        let layer = plan.default_layer();
        let a = plan.add_node(0.0, 0.0, "A").unwrap();
        let b = plan.add_node(1.0, 0.0, "B").unwrap();

        let result = plan.add_multicast_demand(a, BTreeSet::from([a, b]), 1.0, layer);
        assert!(matches!(result, Err(Error::InvalidValue(_))));
        assert!(plan.add_multicast_demand(a, BTreeSet::new(), 1.0, layer).is_err());
    }
}
