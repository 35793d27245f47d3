use std::collections::BTreeMap;

use crate::domain::network::NetworkPlan;
use crate::domain::network::demand::{Demand, MulticastDemand};
use crate::domain::network::link::Link;
use crate::domain::network::multicast_tree::MulticastTree;
use crate::domain::network::route::{ProtectionSegment, Route};
use crate::domain::utils::Attributes;
use crate::domain::utils::element_table::{ElementTable, Indexed};
use crate::domain::utils::id::{DemandId, LayerId, LinkId, MulticastDemandId, MulticastTreeId, ProtectionSegmentId, RouteId};
use crate::error::{Error, Result};

/// How traffic of a layer is routed. A layer is in exactly one mode at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingType {
    /// Traffic follows explicit routes, protection segments and multicast trees.
    SourceRouting,

    /// Traffic is split at every node according to per-demand forwarding rules.
    HopByHop,
}

/// An independent graph of links over the shared node set, with its own demands and routing.
#[derive(Debug, Clone)]
pub struct NetworkLayer {
    pub id: LayerId,
    pub index: usize,
    pub name: String,
    pub description: String,
    pub link_capacity_units: String,
    pub demand_traffic_units: String,
    pub routing_type: RoutingType,
    pub attributes: Attributes,

    pub(crate) links: ElementTable<LinkId, Link>,
    pub(crate) demands: ElementTable<DemandId, Demand>,
    pub(crate) multicast_demands: ElementTable<MulticastDemandId, MulticastDemand>,

    // Source-Routing state
    pub(crate) routes: ElementTable<RouteId, Route>,
    pub(crate) protection_segments: ElementTable<ProtectionSegmentId, ProtectionSegment>,
    pub(crate) multicast_trees: ElementTable<MulticastTreeId, MulticastTree>,

    // Hop-by-Hop state: splitting ratio per (demand, link), absent entries are zero.
    pub(crate) forwarding_rules: BTreeMap<(DemandId, LinkId), f64>,
}

impl Indexed for NetworkLayer {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl NetworkLayer {
    pub fn new(id: LayerId, name: String, description: String, link_capacity_units: String, demand_traffic_units: String) -> Self {
        Self {
            id,
            index: 0,
            name,
            description,
            link_capacity_units,
            demand_traffic_units,
            routing_type: RoutingType::SourceRouting,
            attributes: Attributes::new(),
            links: ElementTable::new(),
            demands: ElementTable::new(),
            multicast_demands: ElementTable::new(),
            routes: ElementTable::new(),
            protection_segments: ElementTable::new(),
            multicast_trees: ElementTable::new(),
            forwarding_rules: BTreeMap::new(),
        }
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn demands(&self) -> impl Iterator<Item = &Demand> {
        self.demands.values()
    }

    pub fn multicast_demands(&self) -> impl Iterator<Item = &MulticastDemand> {
        self.multicast_demands.values()
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn protection_segments(&self) -> impl Iterator<Item = &ProtectionSegment> {
        self.protection_segments.values()
    }

    pub fn multicast_trees(&self) -> impl Iterator<Item = &MulticastTree> {
        self.multicast_trees.values()
    }

    pub fn number_of_links(&self) -> usize {
        self.links.len()
    }

    pub fn number_of_demands(&self) -> usize {
        self.demands.len()
    }

    pub fn number_of_multicast_demands(&self) -> usize {
        self.multicast_demands.len()
    }

    pub fn number_of_routes(&self) -> usize {
        self.routes.len()
    }

    pub fn number_of_protection_segments(&self) -> usize {
        self.protection_segments.len()
    }

    pub fn number_of_multicast_trees(&self) -> usize {
        self.multicast_trees.len()
    }

    pub fn number_of_forwarding_rules(&self) -> usize {
        self.forwarding_rules.len()
    }

    pub fn link_by_index(&self, index: usize) -> Option<&Link> {
        self.links.get_by_index(index)
    }

    pub fn demand_by_index(&self, index: usize) -> Option<&Demand> {
        self.demands.get_by_index(index)
    }
}

impl NetworkPlan {
    pub fn default_layer(&self) -> LayerId {
        self.default_layer
    }

    pub fn layers(&self) -> impl Iterator<Item = &NetworkLayer> {
        self.layers.values()
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.ids()
    }

    pub fn number_of_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layer_by_name(&self, name: &str) -> Option<&NetworkLayer> {
        self.layers.values().find(|layer| layer.name == name)
    }

    pub fn add_layer(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        link_capacity_units: impl Into<String>,
        demand_traffic_units: impl Into<String>,
    ) -> Result<LayerId> {
        self.insert_layer(None, name.into(), description.into(), link_capacity_units.into(), demand_traffic_units.into())
    }

    pub(crate) fn insert_layer(
        &mut self,
        id: Option<u64>,
        name: String,
        description: String,
        link_capacity_units: String,
        demand_traffic_units: String,
    ) -> Result<LayerId> {
        let id: LayerId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding layer {} '{}'", id, name);
        self.layers.insert(id, NetworkLayer::new(id, name, description, link_capacity_units, demand_traffic_units));
        self.invalidate_caches();
        Ok(id)
    }

    pub fn set_default_layer(&mut self, layer: LayerId) -> Result<()> {
        self.layer(layer)?;
        self.default_layer = layer;
        Ok(())
    }

    pub fn set_layer_name(&mut self, layer: LayerId, name: impl Into<String>) -> Result<()> {
        self.layer_mut(layer)?.name = name.into();
        Ok(())
    }

    pub fn set_layer_description(&mut self, layer: LayerId, description: impl Into<String>) -> Result<()> {
        self.layer_mut(layer)?.description = description.into();
        Ok(())
    }

    pub fn set_layer_units(
        &mut self,
        layer: LayerId,
        link_capacity_units: impl Into<String>,
        demand_traffic_units: impl Into<String>,
    ) -> Result<()> {
        let layer = self.layer_mut(layer)?;
        layer.link_capacity_units = link_capacity_units.into();
        layer.demand_traffic_units = demand_traffic_units.into();
        Ok(())
    }

    /// Removes a layer and everything in it.
    ///
    /// Couplings from or to the layer are dissolved first. The last layer cannot be removed;
    /// when the default layer goes, the first remaining layer becomes the default.
    pub fn remove_layer(&mut self, layer: LayerId) -> Result<()> {
        self.layer(layer)?;
        if self.layers.len() == 1 {
            return Err(Error::InvalidLayer(format!("layer {} is the last layer and cannot be removed", layer)));
        }

        // Removing demands dissolves their upward couplings, removing links their downward ones.
        for demand in self.layer(layer)?.demands.ids() {
            self.remove_demand(demand)?;
        }
        for demand in self.layer(layer)?.multicast_demands.ids() {
            self.remove_multicast_demand(demand)?;
        }
        for link in self.layer(layer)?.links.ids() {
            self.remove_link(link)?;
        }

        self.layers.remove(layer);
        if self.default_layer == layer {
            if let Some(first) = self.layers.ids().first() {
                self.default_layer = *first;
            }
        }

        log::info!("Removed layer {}", layer);
        self.invalidate_caches();
        Ok(())
    }

    /// Switches the routing representation of a layer.
    ///
    /// The transition is destructive: moving to Hop-by-Hop drops every route, protection
    /// segment and multicast tree of the layer; moving to Source-Routing drops the forwarding
    /// rules. Setting the current mode again changes nothing.
    pub fn set_routing_type(&mut self, layer: LayerId, routing_type: RoutingType) -> Result<()> {
        let target = self.layer_mut(layer)?;
        if target.routing_type == routing_type {
            return Ok(());
        }

        match routing_type {
            RoutingType::HopByHop => {
                log::warn!(
                    "Layer {} switched to hop-by-hop routing: discarding {} routes, {} protection segments, {} multicast trees",
                    layer,
                    target.routes.len(),
                    target.protection_segments.len(),
                    target.multicast_trees.len()
                );
                target.routes.clear();
                target.protection_segments.clear();
                target.multicast_trees.clear();
            }
            RoutingType::SourceRouting => {
                log::warn!("Layer {} switched to source routing: discarding {} forwarding rules", layer, target.forwarding_rules.len());
                target.forwarding_rules.clear();
            }
        }

        target.routing_type = routing_type;
        self.invalidate_caches();
        Ok(())
    }

    /// Validates an id read from a persisted plan: below the counter and not yet in use.
    pub(crate) fn register_id<T>(&self, raw: u64) -> Result<crate::domain::utils::id::Id<T>> {
        let id = self.ids.register(raw)?;
        if self.is_id_in_use(raw) {
            return Err(Error::corrupt(format!("element id {} is used by more than one element", raw), Some(raw)));
        }
        Ok(id)
    }

    /// Whether any live element of any kind holds `raw`.
    pub(crate) fn is_id_in_use(&self, raw: u64) -> bool {
        use crate::domain::utils::id::Id;

        if self.nodes.contains(Id::new(raw)) || self.resources.contains(Id::new(raw)) || self.srgs.contains(Id::new(raw)) {
            return true;
        }

        self.layers.iter().any(|(id, layer)| {
            id.raw() == raw
                || layer.links.contains(Id::new(raw))
                || layer.demands.contains(Id::new(raw))
                || layer.multicast_demands.contains(Id::new(raw))
                || layer.routes.contains(Id::new(raw))
                || layer.protection_segments.contains(Id::new(raw))
                || layer.multicast_trees.contains(Id::new(raw))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_last_layer_is_rejected() {
        let mut plan = NetworkPlan::new();
        let default_layer = plan.default_layer();

        assert!(matches!(plan.remove_layer(default_layer), Err(Error::InvalidLayer(_))));
    }

    #[test]
    fn test_remove_default_layer_promotes_first_remaining() {
        let mut plan = NetworkPlan::new();
        let old_default = plan.default_layer();
        let optical = plan.add_layer("WDM", "optical", "Gbps", "Gbps").unwrap();

        plan.remove_layer(old_default).unwrap();

        assert_eq!(plan.default_layer(), optical);
        assert_eq!(plan.layer(optical).unwrap().index, 0);
    }

    #[test]
    fn test_same_routing_type_is_noop() {
        let mut plan = NetworkPlan::new();
        let layer = plan.default_layer();

        plan.set_routing_type(layer, RoutingType::SourceRouting).unwrap();
        assert_eq!(plan.layer(layer).unwrap().routing_type, RoutingType::SourceRouting);
    }
}
