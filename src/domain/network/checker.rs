//! Derived lookup caches and the full-model consistency sweep.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;

use crate::domain::network::NetworkPlan;
use crate::domain::network::layer::{NetworkLayer, RoutingType};
use crate::domain::network::link::LinkCoupling;
use crate::domain::network::route::PathElement;
use crate::domain::utils::config::PRECISION_FACTOR;
use crate::domain::utils::element_table::{ElementTable, Indexed};
use crate::domain::utils::id::{DemandId, LinkId, MulticastTreeId, ResourceId, RouteId};
use crate::error::{Error, Result};

/// Reverse indexes over routes and trees. Always rebuilt from scratch, never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DerivedCaches {
    /// One entry per traversal, so a route crossing a link twice appears twice.
    routes_by_link: HashMap<LinkId, Vec<RouteId>>,
    routes_by_demand: HashMap<DemandId, Vec<RouteId>>,
    routes_by_resource: HashMap<ResourceId, Vec<RouteId>>,
    trees_by_link: HashMap<LinkId, Vec<MulticastTreeId>>,
}

impl DerivedCaches {
    fn build(plan: &NetworkPlan) -> Self {
        let mut caches = DerivedCaches::default();

        for layer in plan.layers.values() {
            for route in layer.routes.values() {
                caches.routes_by_demand.entry(route.demand).or_default().push(route.id);

                for element in &route.current_path {
                    match element {
                        PathElement::Link(link) => caches.routes_by_link.entry(*link).or_default().push(route.id),
                        PathElement::ProtectionSegment(segment) => {
                            for link in layer.protection_segments.get(*segment).map(|s| s.links.as_slice()).unwrap_or_default() {
                                caches.routes_by_link.entry(*link).or_default().push(route.id);
                            }
                        }
                        PathElement::Resource(resource) => {
                            let entry = caches.routes_by_resource.entry(*resource).or_default();
                            if !entry.contains(&route.id) {
                                entry.push(route.id);
                            }
                        }
                    }
                }
            }

            for tree in layer.multicast_trees.values() {
                for link in &tree.current_links {
                    caches.trees_by_link.entry(*link).or_default().push(tree.id);
                }
            }
        }
        caches
    }

    pub fn routes_of_demand(&self, demand: DemandId) -> Vec<RouteId> {
        self.routes_by_demand.get(&demand).cloned().unwrap_or_default()
    }

    pub fn routes_traversing_link(&self, link: LinkId) -> Vec<RouteId> {
        self.routes_by_link.get(&link).cloned().unwrap_or_default()
    }

    pub fn routes_traversing_resource(&self, resource: ResourceId) -> Vec<RouteId> {
        self.routes_by_resource.get(&resource).cloned().unwrap_or_default()
    }

    pub fn multicast_trees_traversing_link(&self, link: LinkId) -> Vec<MulticastTreeId> {
        self.trees_by_link.get(&link).cloned().unwrap_or_default()
    }
}

impl NetworkPlan {
    pub(crate) fn caches(&self) -> &DerivedCaches {
        self.caches.get_or_init(|| DerivedCaches::build(self))
    }

    /// Sweeps every structural invariant of the model and rebuilds the derived caches.
    ///
    /// Reports the first violation as `CorruptState` naming the offending element. Nothing is
    /// repaired.
    pub fn check_caches_consistency(&self) -> Result<()> {
        self.check_default_layer()?;
        self.check_ids()?;
        self.check_indices()?;
        self.check_node_references()?;
        for layer in self.layers.values() {
            self.check_layer(layer)?;
        }
        self.check_resources()?;
        self.check_couplings()?;

        let fresh = DerivedCaches::build(self);
        match self.caches.get() {
            Some(cached) if *cached != fresh => Err(Error::corrupt("derived caches do not match the model", None)),
            Some(_) => Ok(()),
            None => {
                let _ = self.caches.set(fresh);
                Ok(())
            }
        }
    }

    fn check_default_layer(&self) -> Result<()> {
        if !self.layers.contains(self.default_layer) {
            return Err(Error::corrupt("default layer does not exist", Some(self.default_layer.raw())));
        }
        Ok(())
    }

    /// Every id is below the counter and held by exactly one element.
    fn check_ids(&self) -> Result<()> {
        let mut raw_ids: Vec<u64> = Vec::new();
        raw_ids.extend(self.nodes.ids().iter().map(|id| id.raw()));
        raw_ids.extend(self.resources.ids().iter().map(|id| id.raw()));
        raw_ids.extend(self.srgs.ids().iter().map(|id| id.raw()));
        for layer in self.layers.values() {
            raw_ids.push(layer.id.raw());
            raw_ids.extend(layer.links.ids().iter().map(|id| id.raw()));
            raw_ids.extend(layer.demands.ids().iter().map(|id| id.raw()));
            raw_ids.extend(layer.multicast_demands.ids().iter().map(|id| id.raw()));
            raw_ids.extend(layer.routes.ids().iter().map(|id| id.raw()));
            raw_ids.extend(layer.protection_segments.ids().iter().map(|id| id.raw()));
            raw_ids.extend(layer.multicast_trees.ids().iter().map(|id| id.raw()));
        }

        let next = self.next_element_id();
        let mut seen = BTreeSet::new();
        for raw in raw_ids {
            if raw >= next {
                return Err(Error::corrupt(format!("id monotonicity violated: id {} is not below next element id {}", raw, next), Some(raw)));
            }
            if !seen.insert(raw) {
                return Err(Error::corrupt(format!("id {} is held by more than one element", raw), Some(raw)));
            }
        }
        Ok(())
    }

    fn check_indices(&self) -> Result<()> {
        check_table_indices(&self.layers)?;
        check_table_indices(&self.nodes)?;
        check_table_indices(&self.resources)?;
        check_table_indices(&self.srgs)?;
        for layer in self.layers.values() {
            check_table_indices(&layer.links)?;
            check_table_indices(&layer.demands)?;
            check_table_indices(&layer.multicast_demands)?;
            check_table_indices(&layer.routes)?;
            check_table_indices(&layer.protection_segments)?;
            check_table_indices(&layer.multicast_trees)?;
        }
        Ok(())
    }

    fn check_node_references(&self) -> Result<()> {
        for srg in self.srgs.values() {
            if let Some(node) = srg.nodes.iter().find(|n| !self.nodes.contains(**n)) {
                return Err(Error::corrupt(format!("SRG {} references missing node {}", srg.id, node), Some(srg.id.raw())));
            }
            if let Some(link) = srg.links.iter().find(|l| self.link_layer(**l).is_err()) {
                return Err(Error::corrupt(format!("SRG {} references missing link {}", srg.id, link), Some(srg.id.raw())));
            }
        }
        Ok(())
    }

    fn check_layer(&self, layer: &NetworkLayer) -> Result<()> {
        let corrupt = |reason: String, element: u64| Err(Error::corrupt(reason, Some(element)));

        for link in layer.links.values() {
            if link.layer != layer.id {
                return corrupt(format!("link {} is stored in layer {} but tagged with layer {}", link.id, layer.id, link.layer), link.id.raw());
            }
            if !self.nodes.contains(link.origin) || !self.nodes.contains(link.destination) {
                return corrupt(format!("link {} references a missing end node", link.id), link.id.raw());
            }
        }

        for demand in layer.demands.values() {
            if demand.layer != layer.id || !self.nodes.contains(demand.ingress) || !self.nodes.contains(demand.egress) {
                return corrupt(format!("demand {} references a missing node or layer", demand.id), demand.id.raw());
            }
        }
        for demand in layer.multicast_demands.values() {
            if demand.layer != layer.id || !self.nodes.contains(demand.ingress) || demand.egress.iter().any(|n| !self.nodes.contains(*n)) {
                return corrupt(format!("multicast demand {} references a missing node or layer", demand.id), demand.id.raw());
            }
        }

        match layer.routing_type {
            RoutingType::SourceRouting => {
                if !layer.forwarding_rules.is_empty() {
                    return corrupt(format!("source-routing layer {} holds forwarding rules", layer.id), layer.id.raw());
                }
            }
            RoutingType::HopByHop => {
                if !layer.routes.is_empty() || !layer.protection_segments.is_empty() || !layer.multicast_trees.is_empty() {
                    return corrupt(format!("hop-by-hop layer {} holds routes, segments or trees", layer.id), layer.id.raw());
                }
            }
        }

        for segment in layer.protection_segments.values() {
            if segment.links.is_empty() || segment.links.iter().any(|l| !layer.links.contains(*l)) {
                return corrupt(format!("protection segment {} references links outside layer {}", segment.id, layer.id), segment.id.raw());
            }
        }

        for route in layer.routes.values() {
            if route.layer != layer.id || !layer.demands.contains(route.demand) {
                return corrupt(format!("route {} references demand {} outside layer {}", route.id, route.demand, layer.id), route.id.raw());
            }
            for element in route.initial_path.iter().chain(&route.current_path) {
                let resolves = match element {
                    PathElement::Link(link) => layer.links.contains(*link),
                    PathElement::Resource(resource) => self.resources.contains(*resource),
                    PathElement::ProtectionSegment(segment) => layer.protection_segments.contains(*segment),
                };
                if !resolves {
                    return corrupt(format!("route {} references missing element {}", route.id, element.raw_id()), route.id.raw());
                }
            }
            let occupied = route.initial_resource_occupation.keys().chain(route.current_resource_occupation.keys());
            for resource in occupied {
                if !self.resources.contains(*resource) {
                    return corrupt(format!("route {} occupies missing resource {}", route.id, resource), route.id.raw());
                }
            }
            if let Some(segment) = route.backup_segments.iter().find(|s| !layer.protection_segments.contains(**s)) {
                return corrupt(format!("route {} lists missing backup segment {}", route.id, segment), route.id.raw());
            }
        }

        for tree in layer.multicast_trees.values() {
            if tree.layer != layer.id || !layer.multicast_demands.contains(tree.demand) {
                return corrupt(format!("multicast tree {} references demand {} outside layer {}", tree.id, tree.demand, layer.id), tree.id.raw());
            }
            if tree.initial_links.iter().chain(&tree.current_links).any(|l| !layer.links.contains(*l)) {
                return corrupt(format!("multicast tree {} references links outside layer {}", tree.id, layer.id), tree.id.raw());
            }
        }

        let mut ratio_sums: BTreeMap<_, f64> = BTreeMap::new();
        for ((demand, link), ratio) in &layer.forwarding_rules {
            let Some(l) = layer.links.get(*link) else {
                return corrupt(format!("forwarding rule references link {} outside layer {}", link, layer.id), link.raw());
            };
            if !layer.demands.contains(*demand) {
                return corrupt(format!("forwarding rule references demand {} outside layer {}", demand, layer.id), demand.raw());
            }
            *ratio_sums.entry((*demand, l.origin)).or_default() += ratio;
        }
        if let Some(((demand, node), sum)) = ratio_sums.iter().find(|(_, sum)| **sum > 1.0 + PRECISION_FACTOR) {
            return corrupt(format!("splitting ratios of demand {} out of node {} add up to {}", demand, node, sum), demand.raw());
        }
        Ok(())
    }

    fn check_resources(&self) -> Result<()> {
        for resource in self.resources.values() {
            if !self.nodes.contains(resource.host) {
                return Err(Error::corrupt(format!("resource {} is hosted at missing node {}", resource.id, resource.host), Some(resource.id.raw())));
            }
            for base in resource.base_resources.keys() {
                if !self.resources.contains(*base) {
                    return Err(Error::corrupt(format!("resource {} uses missing base resource {}", resource.id, base), Some(resource.id.raw())));
                }
            }
        }
        for resource in self.resources.ids() {
            if self.resource_depends_on(resource, resource)? {
                return Err(Error::corrupt(format!("resource base graph is cyclic through resource {}", resource), Some(resource.raw())));
            }
        }
        Ok(())
    }

    fn check_couplings(&self) -> Result<()> {
        for layer in self.layers.values() {
            for link in layer.links.values() {
                let consistent = match link.coupling {
                    None => true,
                    Some(LinkCoupling::Demand(d)) => self.demand(d).map(|d| d.coupled_upper_link == Some(link.id)).unwrap_or(false),
                    Some(LinkCoupling::MulticastDemand(d)) => self
                        .multicast_demand(d)
                        .map(|d| d.coupled_upper_links.get(&link.destination) == Some(&link.id))
                        .unwrap_or(false),
                };
                if !consistent {
                    return Err(Error::corrupt(format!("coupling of link {} is not mirrored by its lower demand", link.id), Some(link.id.raw())));
                }
            }
            for demand in layer.demands.values() {
                if let Some(link) = demand.coupled_upper_link {
                    if self.link(link).map(|l| l.coupling != Some(LinkCoupling::Demand(demand.id))).unwrap_or(true) {
                        return Err(Error::corrupt(format!("demand {} is coupled to link {} which does not point back", demand.id, link), Some(demand.id.raw())));
                    }
                }
            }
            for demand in layer.multicast_demands.values() {
                for link in demand.coupled_upper_links.values() {
                    if self.link(*link).map(|l| l.coupling != Some(LinkCoupling::MulticastDemand(demand.id))).unwrap_or(true) {
                        return Err(Error::corrupt(
                            format!("multicast demand {} is coupled to link {} which does not point back", demand.id, link),
                            Some(demand.id.raw()),
                        ));
                    }
                }
            }
        }

        let edges = self.layer_coupling_edges();
        for (upper, lower) in &edges {
            if upper == lower || self.layer_depends_on(*lower, *upper) {
                return Err(Error::corrupt(format!("layer coupling cycle through layers {} and {}", upper, lower), Some(upper.raw())));
            }
        }
        Ok(())
    }
}

fn check_table_indices<K: Copy + Hash + Eq + fmt::Display, V: Indexed>(table: &ElementTable<K, V>) -> Result<()> {
    for (position, (id, value)) in table.iter().enumerate() {
        if value.index() != position {
            return Err(Error::corrupt(format!("element {} has index {} at position {}", id, value.index(), position), None));
        }
    }
    Ok(())
}
