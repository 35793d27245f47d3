use crate::domain::network::NetworkPlan;
use crate::domain::network::layer::RoutingType;
use crate::domain::utils::Attributes;
use crate::domain::utils::config::DEFAULT_PROPAGATION_SPEED_KM_PER_SECOND;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{DemandId, LayerId, LinkId, MulticastDemandId, NodeId};
use crate::error::{Error, Result};

/// The lower-layer element whose carried traffic is the capacity of a coupled link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkCoupling {
    Demand(DemandId),
    MulticastDemand(MulticastDemandId),
}

/// A unidirectional link of one layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: LinkId,
    pub index: usize,
    pub layer: LayerId,
    pub origin: NodeId,
    pub destination: NodeId,

    /// The link's own capacity. While the link is coupled the capacity is read from the lower
    /// layer instead, see `NetworkPlan::link_capacity`.
    pub capacity: f64,
    pub length_km: f64,
    pub propagation_speed_km_per_second: f64,
    pub is_up: bool,
    pub coupling: Option<LinkCoupling>,
    pub attributes: Attributes,
}

impl Indexed for Link {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl Link {
    pub fn is_coupled(&self) -> bool {
        self.coupling.is_some()
    }

    pub fn propagation_delay_ms(&self) -> f64 {
        if self.propagation_speed_km_per_second <= 0.0 {
            return f64::INFINITY;
        }
        self.length_km / self.propagation_speed_km_per_second * 1000.0
    }
}

impl NetworkPlan {
    pub fn links(&self, layer: LayerId) -> Result<Vec<&Link>> {
        Ok(self.layer(layer)?.links.values().collect())
    }

    pub fn link_ids(&self, layer: LayerId) -> Result<Vec<LinkId>> {
        Ok(self.layer(layer)?.links.ids())
    }

    pub fn add_link(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        layer: LayerId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_per_second: f64,
    ) -> Result<LinkId> {
        self.insert_link(None, origin, destination, layer, capacity, length_km, propagation_speed_km_per_second, true)
    }

    /// Adds a link propagating at the default fiber speed.
    pub fn add_link_with_default_speed(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        layer: LayerId,
        capacity: f64,
        length_km: f64,
    ) -> Result<LinkId> {
        self.add_link(origin, destination, layer, capacity, length_km, DEFAULT_PROPAGATION_SPEED_KM_PER_SECOND)
    }

    /// Adds a link in each direction between `a` and `b`, with the same parameters.
    pub fn add_link_bidirectional(
        &mut self,
        a: NodeId,
        b: NodeId,
        layer: LayerId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_per_second: f64,
    ) -> Result<(LinkId, LinkId)> {
        self.validate_new_link(b, a, layer, capacity, length_km, propagation_speed_km_per_second)?;
        let forward = self.add_link(a, b, layer, capacity, length_km, propagation_speed_km_per_second)?;
        let backward = self.add_link(b, a, layer, capacity, length_km, propagation_speed_km_per_second)?;
        Ok((forward, backward))
    }

    fn validate_new_link(&self, origin: NodeId, destination: NodeId, layer: LayerId, capacity: f64, length_km: f64, speed: f64) -> Result<()> {
        self.layer(layer)?;
        self.node(origin)?;
        self.node(destination)?;

        if origin == destination {
            return Err(Error::InvalidValue(format!("self-loop links are not allowed (node {})", origin)));
        }
        Self::require_non_negative("link capacity", capacity)?;
        Self::require_non_negative("link length", length_km)?;
        if !(speed > 0.0) || !speed.is_finite() {
            return Err(Error::InvalidValue(format!("link propagation speed must be positive, got {}", speed)));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_link(
        &mut self,
        id: Option<u64>,
        origin: NodeId,
        destination: NodeId,
        layer: LayerId,
        capacity: f64,
        length_km: f64,
        propagation_speed_km_per_second: f64,
        is_up: bool,
    ) -> Result<LinkId> {
        self.validate_new_link(origin, destination, layer, capacity, length_km, propagation_speed_km_per_second)?;

        let id: LinkId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding link {} ({} -> {}) in layer {} with capacity {}", id, origin, destination, layer, capacity);
        let link = Link {
            id,
            index: 0,
            layer,
            origin,
            destination,
            capacity,
            length_km,
            propagation_speed_km_per_second,
            is_up,
            coupling: None,
            attributes: Attributes::new(),
        };
        self.layer_mut(layer)?.links.insert(id, link);
        self.invalidate_caches();
        Ok(id)
    }

    /// Sets the link's own capacity.
    ///
    /// Fails with `InvalidLayer` while the link is coupled: its capacity then belongs to the
    /// lower layer and has to be changed on the coupled demand.
    pub fn set_link_capacity(&mut self, link: LinkId, capacity: f64) -> Result<()> {
        Self::require_non_negative("link capacity", capacity)?;
        let target = self.link_mut(link)?;
        if let Some(coupling) = target.coupling {
            return Err(Error::InvalidLayer(format!(
                "capacity of link {} is bound to lower-layer {:?}; change the lower-layer traffic instead",
                link, coupling
            )));
        }
        target.capacity = capacity;
        Ok(())
    }

    pub fn set_link_length(&mut self, link: LinkId, length_km: f64) -> Result<()> {
        Self::require_non_negative("link length", length_km)?;
        self.link_mut(link)?.length_km = length_km;
        Ok(())
    }

    pub fn set_link_propagation_speed(&mut self, link: LinkId, speed_km_per_second: f64) -> Result<()> {
        if !(speed_km_per_second > 0.0) || !speed_km_per_second.is_finite() {
            return Err(Error::InvalidValue(format!("link propagation speed must be positive, got {}", speed_km_per_second)));
        }
        self.link_mut(link)?.propagation_speed_km_per_second = speed_km_per_second;
        Ok(())
    }

    /// Marks a link up or down. Traffic reads pick the change up without further action.
    pub fn set_link_failure_state(&mut self, link: LinkId, is_up: bool) -> Result<()> {
        let target = self.link_mut(link)?;
        if target.is_up != is_up {
            log::debug!("Link {} is now {}", link, if is_up { "up" } else { "down" });
            target.is_up = is_up;
        }
        Ok(())
    }

    /// Applies a batch of failure-state changes. Every id is checked before anything changes.
    pub fn set_links_and_nodes_failure_state(
        &mut self,
        links_to_set_up: &[LinkId],
        links_to_set_down: &[LinkId],
        nodes_to_set_up: &[NodeId],
        nodes_to_set_down: &[NodeId],
    ) -> Result<()> {
        for link in links_to_set_up.iter().chain(links_to_set_down) {
            self.link(*link)?;
        }
        for node in nodes_to_set_up.iter().chain(nodes_to_set_down) {
            self.node(*node)?;
        }

        for link in links_to_set_up {
            self.set_link_failure_state(*link, true)?;
        }
        for link in links_to_set_down {
            self.set_link_failure_state(*link, false)?;
        }
        for node in nodes_to_set_up {
            self.set_node_failure_state(*node, true)?;
        }
        for node in nodes_to_set_down {
            self.set_node_failure_state(*node, false)?;
        }
        Ok(())
    }

    /// The capacity the link offers right now.
    ///
    /// For a coupled link this is the carried traffic of the lower-layer demand (for a
    /// multicast coupling, the traffic of its trees that reach the link's destination).
    pub fn link_capacity(&self, link: LinkId) -> Result<f64> {
        let target = self.link(link)?;
        match target.coupling {
            None => Ok(target.capacity),
            Some(LinkCoupling::Demand(demand)) => self.demand_carried_traffic(demand),
            Some(LinkCoupling::MulticastDemand(demand)) => self.multicast_demand_traffic_reaching(demand, target.destination),
        }
    }

    /// A link can carry traffic when it and both end nodes are up and its capacity is nonzero.
    pub fn is_link_operational(&self, link: LinkId) -> Result<bool> {
        let target = self.link(link)?;
        if !target.is_up || !self.node(target.origin)?.is_up || !self.node(target.destination)?.is_up {
            return Ok(false);
        }
        Ok(self.link_capacity(link)? > 0.0)
    }

    /// Traffic currently carried over the link, summed over routes and multicast trees, or over
    /// the forwarded flows of every demand under hop-by-hop routing.
    pub fn link_carried_traffic(&self, link: LinkId) -> Result<f64> {
        let layer = self.link_layer(link)?;
        match self.layer(layer)?.routing_type {
            RoutingType::SourceRouting => {
                let mut total = 0.0;
                for route in self.routes_traversing_link(link)? {
                    total += self.route_carried_traffic(route)?;
                }
                for tree in self.multicast_trees_traversing_link(link)? {
                    total += self.multicast_tree_carried_traffic(tree)?;
                }
                Ok(total)
            }
            RoutingType::HopByHop => self.hop_by_hop_link_traffic(layer, link),
        }
    }

    /// Capacity occupied in the link: routes, trees and reserved protection capacity under
    /// source routing, the carried traffic under hop-by-hop routing.
    pub fn link_occupied_capacity(&self, link: LinkId) -> Result<f64> {
        let layer = self.link_layer(link)?;
        match self.layer(layer)?.routing_type {
            RoutingType::SourceRouting => {
                let mut total = 0.0;
                for route in self.routes_traversing_link(link)? {
                    total += self.route_occupied_capacity(route)?;
                }
                for tree in self.multicast_trees_traversing_link(link)? {
                    total += self.multicast_tree_occupied_capacity(tree)?;
                }
                for segment in self.layer(layer)?.protection_segments.values() {
                    let occurrences = segment.links.iter().filter(|l| **l == link).count();
                    total += occurrences as f64 * segment.reserved_capacity;
                }
                Ok(total)
            }
            RoutingType::HopByHop => self.hop_by_hop_link_traffic(layer, link),
        }
    }

    /// Occupied over offered capacity. A zero-capacity link carrying anything is infinitely
    /// utilized.
    pub fn link_utilization(&self, link: LinkId) -> Result<f64> {
        let capacity = self.link_capacity(link)?;
        let occupied = self.link_occupied_capacity(link)?;
        if capacity <= 0.0 {
            return Ok(if occupied > 0.0 { f64::INFINITY } else { 0.0 });
        }
        Ok(occupied / capacity)
    }

    pub fn link_propagation_delay_ms(&self, link: LinkId) -> Result<f64> {
        Ok(self.link(link)?.propagation_delay_ms())
    }

    /// Removes a link.
    ///
    /// The link is decoupled first. Routes traversing it in their initial or current path,
    /// protection segments containing it (with the routes currently using them), multicast
    /// trees using it and its forwarding rules all go with it; SRGs forget it.
    pub fn remove_link(&mut self, link: LinkId) -> Result<()> {
        let layer = self.link_layer(link)?;

        if self.link(link)?.coupling.is_some() {
            self.decouple_link(link)?;
        }

        let (routes, segments, trees) = {
            let layer = self.layer(layer)?;
            let segments: Vec<_> = layer.protection_segments.values().filter(|s| s.links.contains(&link)).map(|s| s.id).collect();
            let routes: Vec<_> = layer
                .routes
                .values()
                .filter(|r| r.initial_links().any(|l| l == link) || r.current_links_directly().any(|l| l == link))
                .map(|r| r.id)
                .collect();
            let trees: Vec<_> = layer
                .multicast_trees
                .values()
                .filter(|t| t.initial_links.contains(&link) || t.current_links.contains(&link))
                .map(|t| t.id)
                .collect();
            (routes, segments, trees)
        };

        for route in routes {
            self.remove_route(route)?;
        }
        for segment in segments {
            self.remove_protection_segment(segment)?;
        }
        for tree in trees {
            self.remove_multicast_tree(tree)?;
        }

        let target = self.layer_mut(layer)?;
        target.forwarding_rules.retain(|(_, l), _| *l != link);
        target.links.remove(link);

        for srg in self.srgs.values_mut() {
            srg.links.remove(&link);
        }

        log::debug!("Removed link {} from layer {}", link, layer);
        self.invalidate_caches();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_nodes() -> (NetworkPlan, NodeId, NodeId) {
        let mut plan = NetworkPlan::new();
        let a = plan.add_node(0.0, 0.0, "A").unwrap();
        let b = plan.add_node(1.0, 0.0, "B").unwrap();
        (plan, a, b)
    }

    #[test]
    fn test_add_link_rejects_unknown_layer() {
        let (mut plan, a, b) = two_nodes();
        let result = plan.add_link(a, b, LayerId::new(42), 10.0, 1.0, 200000.0);

        assert!(matches!(result, Err(Error::InvalidLayer(_))));
    }

    #[test]
    fn test_add_link_rejects_self_loop_and_unknown_node() {
        let (mut plan, a, _) = two_nodes();
        let layer = plan.default_layer();

        assert!(matches!(plan.add_link(a, a, layer, 10.0, 1.0, 200000.0), Err(Error::InvalidValue(_))));
        assert!(matches!(plan.add_link(a, NodeId::new(77), layer, 10.0, 1.0, 200000.0), Err(Error::InvalidReference(_))));
        assert_eq!(plan.layer(layer).unwrap().number_of_links(), 0);
    }

    #[test]
    fn test_failed_link_is_not_operational() {
        let (mut plan, a, b) = two_nodes();
        let layer = plan.default_layer();
        let link = plan.add_link_with_default_speed(a, b, layer, 10.0, 100.0).unwrap();

        assert!(plan.is_link_operational(link).unwrap());
        plan.set_link_failure_state(link, false).unwrap();
        assert!(!plan.is_link_operational(link).unwrap());

        plan.set_link_failure_state(link, true).unwrap();
        plan.set_node_failure_state(b, false).unwrap();
        assert!(!plan.is_link_operational(link).unwrap());
    }

    #[test]
    fn test_propagation_delay() {
        let (mut plan, a, b) = two_nodes();
        let layer = plan.default_layer();
        let link = plan.add_link(a, b, layer, 10.0, 200.0, 200000.0).unwrap();

        assert!((plan.link_propagation_delay_ms(link).unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_batch_failure_validates_before_changing() {
        let (mut plan, a, b) = two_nodes();
        let layer = plan.default_layer();
        let link = plan.add_link_with_default_speed(a, b, layer, 10.0, 1.0).unwrap();

        let result = plan.set_links_and_nodes_failure_state(&[], &[link], &[], &[NodeId::new(99)]);

        assert!(result.is_err());
        assert!(plan.link(link).unwrap().is_up);
    }
}
