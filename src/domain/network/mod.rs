//! The multi-layer network model.
//!
//! `NetworkPlan` owns every element in arena tables keyed by typed ids. Relationships between
//! elements are always id references; the operations spread over the submodules of this
//! module validate those references eagerly and never leave a half-applied mutation behind.

pub mod checker;
pub mod coupling;
pub mod demand;
pub mod forwarding;
pub mod layer;
pub mod link;
pub mod multicast_tree;
pub mod node;
pub mod resource;
pub mod route;
pub mod srg;

use std::sync::OnceLock;

use crate::domain::network::checker::DerivedCaches;
use crate::domain::network::demand::{Demand, MulticastDemand};
use crate::domain::network::layer::{NetworkLayer, RoutingType};
use crate::domain::network::link::Link;
use crate::domain::network::multicast_tree::MulticastTree;
use crate::domain::network::node::Node;
use crate::domain::network::resource::Resource;
use crate::domain::network::route::{ProtectionSegment, Route};
use crate::domain::network::srg::SharedRiskGroup;
use crate::domain::utils::Attributes;
use crate::domain::utils::element_table::ElementTable;
use crate::domain::utils::id::{
    DemandId, IdRegistry, LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId, ProtectionSegmentId, ResourceId, RouteId, SrgId,
};
use crate::error::{Error, Result};

/// Names any element that carries attributes, including the network itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementRef {
    Network,
    Node(NodeId),
    Layer(LayerId),
    Link(LinkId),
    Demand(DemandId),
    MulticastDemand(MulticastDemandId),
    Route(RouteId),
    ProtectionSegment(ProtectionSegmentId),
    MulticastTree(MulticastTreeId),
    Resource(ResourceId),
    Srg(SrgId),
}

/// An in-memory network design: nodes shared by all layers, per-layer links, demands and
/// routing state, resources, shared risk groups and the couplings between layers.
#[derive(Debug, Clone)]
pub struct NetworkPlan {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) attributes: Attributes,

    pub(crate) ids: IdRegistry,

    pub(crate) layers: ElementTable<LayerId, NetworkLayer>,
    pub(crate) default_layer: LayerId,
    pub(crate) nodes: ElementTable<NodeId, Node>,
    pub(crate) resources: ElementTable<ResourceId, Resource>,
    pub(crate) srgs: ElementTable<SrgId, SharedRiskGroup>,

    /// Lazily built lookup views. Dropped on every mutation.
    pub(crate) caches: OnceLock<DerivedCaches>,
}

impl NetworkPlan {
    /// Creates an empty plan holding a single default layer.
    pub fn new() -> Self {
        let mut ids = IdRegistry::new();
        let default_layer: LayerId = ids.new_id();

        let mut layers = ElementTable::new();
        layers.insert(default_layer, NetworkLayer::new(default_layer, String::new(), String::new(), "Gbps".into(), "Gbps".into()));

        Self {
            name: String::new(),
            description: String::new(),
            attributes: Attributes::new(),
            ids,
            layers,
            default_layer,
            nodes: ElementTable::new(),
            resources: ElementTable::new(),
            srgs: ElementTable::new(),
            caches: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn next_element_id(&self) -> u64 {
        self.ids.next_element_id()
    }

    pub(crate) fn invalidate_caches(&mut self) {
        self.caches = OnceLock::new();
    }

    // ------------------------
    // --- Attribute Access ---
    // ------------------------

    pub fn attributes(&self, element: ElementRef) -> Result<&Attributes> {
        Ok(match element {
            ElementRef::Network => &self.attributes,
            ElementRef::Node(id) => &self.node(id)?.attributes,
            ElementRef::Layer(id) => &self.layer(id)?.attributes,
            ElementRef::Link(id) => &self.link(id)?.attributes,
            ElementRef::Demand(id) => &self.demand(id)?.attributes,
            ElementRef::MulticastDemand(id) => &self.multicast_demand(id)?.attributes,
            ElementRef::Route(id) => &self.route(id)?.attributes,
            ElementRef::ProtectionSegment(id) => &self.protection_segment(id)?.attributes,
            ElementRef::MulticastTree(id) => &self.multicast_tree(id)?.attributes,
            ElementRef::Resource(id) => &self.resource(id)?.attributes,
            ElementRef::Srg(id) => &self.srg(id)?.attributes,
        })
    }

    fn attributes_mut(&mut self, element: ElementRef) -> Result<&mut Attributes> {
        Ok(match element {
            ElementRef::Network => &mut self.attributes,
            ElementRef::Node(id) => &mut self.node_mut(id)?.attributes,
            ElementRef::Layer(id) => &mut self.layer_mut(id)?.attributes,
            ElementRef::Link(id) => &mut self.link_mut(id)?.attributes,
            ElementRef::Demand(id) => &mut self.demand_mut(id)?.attributes,
            ElementRef::MulticastDemand(id) => &mut self.multicast_demand_mut(id)?.attributes,
            ElementRef::Route(id) => &mut self.route_mut(id)?.attributes,
            ElementRef::ProtectionSegment(id) => &mut self.protection_segment_mut(id)?.attributes,
            ElementRef::MulticastTree(id) => &mut self.multicast_tree_mut(id)?.attributes,
            ElementRef::Resource(id) => &mut self.resource_mut(id)?.attributes,
            ElementRef::Srg(id) => &mut self.srg_mut(id)?.attributes,
        })
    }

    pub fn attribute(&self, element: ElementRef, key: &str) -> Option<&str> {
        self.attributes(element).ok()?.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, element: ElementRef, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        self.attributes_mut(element)?.insert(key.into(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&mut self, element: ElementRef, key: &str) -> Result<Option<String>> {
        Ok(self.attributes_mut(element)?.remove(key))
    }

    pub(crate) fn replace_attributes(&mut self, element: ElementRef, attributes: Attributes) -> Result<()> {
        *self.attributes_mut(element)? = attributes;
        Ok(())
    }

    // ---------------------------
    // --- Cross-layer Lookups ---
    // ---------------------------

    pub fn link_layer(&self, link: LinkId) -> Result<LayerId> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.links.contains(link))
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::InvalidReference(format!("link {} does not exist", link)))
    }

    pub fn demand_layer(&self, demand: DemandId) -> Result<LayerId> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.demands.contains(demand))
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::InvalidReference(format!("demand {} does not exist", demand)))
    }

    pub fn multicast_demand_layer(&self, demand: MulticastDemandId) -> Result<LayerId> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.multicast_demands.contains(demand))
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::InvalidReference(format!("multicast demand {} does not exist", demand)))
    }

    pub fn route_layer(&self, route: RouteId) -> Result<LayerId> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.routes.contains(route))
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::InvalidReference(format!("route {} does not exist", route)))
    }

    pub fn protection_segment_layer(&self, segment: ProtectionSegmentId) -> Result<LayerId> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.protection_segments.contains(segment))
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::InvalidReference(format!("protection segment {} does not exist", segment)))
    }

    pub fn multicast_tree_layer(&self, tree: MulticastTreeId) -> Result<LayerId> {
        self.layers
            .iter()
            .find(|(_, layer)| layer.multicast_trees.contains(tree))
            .map(|(id, _)| *id)
            .ok_or_else(|| Error::InvalidReference(format!("multicast tree {} does not exist", tree)))
    }

    // ----------------------
    // --- Element Access ---
    // ----------------------

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id).ok_or_else(|| Error::InvalidReference(format!("node {} does not exist", id)))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(id).ok_or_else(|| Error::InvalidReference(format!("node {} does not exist", id)))
    }

    pub fn layer(&self, id: LayerId) -> Result<&NetworkLayer> {
        self.layers.get(id).ok_or_else(|| Error::InvalidLayer(format!("layer {} does not exist", id)))
    }

    pub(crate) fn layer_mut(&mut self, id: LayerId) -> Result<&mut NetworkLayer> {
        self.layers.get_mut(id).ok_or_else(|| Error::InvalidLayer(format!("layer {} does not exist", id)))
    }

    pub fn link(&self, id: LinkId) -> Result<&Link> {
        let layer = self.link_layer(id)?;
        self.layer(layer)?.links.get(id).ok_or_else(|| Error::InvalidReference(format!("link {} does not exist", id)))
    }

    pub(crate) fn link_mut(&mut self, id: LinkId) -> Result<&mut Link> {
        let layer = self.link_layer(id)?;
        self.layer_mut(layer)?.links.get_mut(id).ok_or_else(|| Error::InvalidReference(format!("link {} does not exist", id)))
    }

    pub fn demand(&self, id: DemandId) -> Result<&Demand> {
        let layer = self.demand_layer(id)?;
        self.layer(layer)?.demands.get(id).ok_or_else(|| Error::InvalidReference(format!("demand {} does not exist", id)))
    }

    pub(crate) fn demand_mut(&mut self, id: DemandId) -> Result<&mut Demand> {
        let layer = self.demand_layer(id)?;
        self.layer_mut(layer)?.demands.get_mut(id).ok_or_else(|| Error::InvalidReference(format!("demand {} does not exist", id)))
    }

    pub fn multicast_demand(&self, id: MulticastDemandId) -> Result<&MulticastDemand> {
        let layer = self.multicast_demand_layer(id)?;
        self.layer(layer)?
            .multicast_demands
            .get(id)
            .ok_or_else(|| Error::InvalidReference(format!("multicast demand {} does not exist", id)))
    }

    pub(crate) fn multicast_demand_mut(&mut self, id: MulticastDemandId) -> Result<&mut MulticastDemand> {
        let layer = self.multicast_demand_layer(id)?;
        self.layer_mut(layer)?
            .multicast_demands
            .get_mut(id)
            .ok_or_else(|| Error::InvalidReference(format!("multicast demand {} does not exist", id)))
    }

    pub fn route(&self, id: RouteId) -> Result<&Route> {
        let layer = self.route_layer(id)?;
        self.layer(layer)?.routes.get(id).ok_or_else(|| Error::InvalidReference(format!("route {} does not exist", id)))
    }

    pub(crate) fn route_mut(&mut self, id: RouteId) -> Result<&mut Route> {
        let layer = self.route_layer(id)?;
        self.layer_mut(layer)?.routes.get_mut(id).ok_or_else(|| Error::InvalidReference(format!("route {} does not exist", id)))
    }

    pub fn protection_segment(&self, id: ProtectionSegmentId) -> Result<&ProtectionSegment> {
        let layer = self.protection_segment_layer(id)?;
        self.layer(layer)?
            .protection_segments
            .get(id)
            .ok_or_else(|| Error::InvalidReference(format!("protection segment {} does not exist", id)))
    }

    pub(crate) fn protection_segment_mut(&mut self, id: ProtectionSegmentId) -> Result<&mut ProtectionSegment> {
        let layer = self.protection_segment_layer(id)?;
        self.layer_mut(layer)?
            .protection_segments
            .get_mut(id)
            .ok_or_else(|| Error::InvalidReference(format!("protection segment {} does not exist", id)))
    }

    pub fn multicast_tree(&self, id: MulticastTreeId) -> Result<&MulticastTree> {
        let layer = self.multicast_tree_layer(id)?;
        self.layer(layer)?
            .multicast_trees
            .get(id)
            .ok_or_else(|| Error::InvalidReference(format!("multicast tree {} does not exist", id)))
    }

    pub(crate) fn multicast_tree_mut(&mut self, id: MulticastTreeId) -> Result<&mut MulticastTree> {
        let layer = self.multicast_tree_layer(id)?;
        self.layer_mut(layer)?
            .multicast_trees
            .get_mut(id)
            .ok_or_else(|| Error::InvalidReference(format!("multicast tree {} does not exist", id)))
    }

    pub fn resource(&self, id: ResourceId) -> Result<&Resource> {
        self.resources.get(id).ok_or_else(|| Error::InvalidReference(format!("resource {} does not exist", id)))
    }

    pub(crate) fn resource_mut(&mut self, id: ResourceId) -> Result<&mut Resource> {
        self.resources.get_mut(id).ok_or_else(|| Error::InvalidReference(format!("resource {} does not exist", id)))
    }

    pub fn srg(&self, id: SrgId) -> Result<&SharedRiskGroup> {
        self.srgs.get(id).ok_or_else(|| Error::InvalidReference(format!("SRG {} does not exist", id)))
    }

    pub(crate) fn srg_mut(&mut self, id: SrgId) -> Result<&mut SharedRiskGroup> {
        self.srgs.get_mut(id).ok_or_else(|| Error::InvalidReference(format!("SRG {} does not exist", id)))
    }

    /// Fails with `InvalidLayer` unless `layer` currently uses `expected` routing.
    pub(crate) fn require_routing_type(&self, layer: LayerId, expected: RoutingType) -> Result<()> {
        let actual = self.layer(layer)?.routing_type;
        if actual != expected {
            return Err(Error::InvalidLayer(format!("layer {} uses {:?} routing, operation requires {:?}", layer, actual, expected)));
        }
        Ok(())
    }

    pub(crate) fn require_non_negative(what: &str, value: f64) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidValue(format!("{} must be a non-negative finite number, got {}", what, value)));
        }
        Ok(())
    }
}

impl Default for NetworkPlan {
    fn default() -> Self {
        Self::new()
    }
}
