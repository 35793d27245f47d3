use std::collections::BTreeMap;

use crate::domain::network::NetworkPlan;
use crate::domain::network::layer::RoutingType;
use crate::domain::utils::Attributes;
use crate::domain::utils::config::PRECISION_FACTOR;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{DemandId, LayerId, LinkId, NodeId, ProtectionSegmentId, ResourceId, RouteId};
use crate::error::{Error, Result};

/// One hop of a route path. Links, resources and protection segments share one id space, so a
/// bare id is resolved by probing the kinds in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    Link(LinkId),
    Resource(ResourceId),
    ProtectionSegment(ProtectionSegmentId),
}

impl PathElement {
    pub fn raw_id(&self) -> u64 {
        match self {
            PathElement::Link(id) => id.raw(),
            PathElement::Resource(id) => id.raw(),
            PathElement::ProtectionSegment(id) => id.raw(),
        }
    }
}

/// A source-routed path carrying traffic of one demand.
///
/// The initial path is fixed at creation. The current path starts out equal to it and changes
/// when the route is rerouted, possibly through protection segments.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub id: RouteId,
    pub index: usize,
    pub layer: LayerId,
    pub demand: DemandId,

    /// Nominal values. The effective ones are zero while anything on the current path is down.
    pub carried_traffic_if_not_failing: f64,
    pub occupied_capacity_if_not_failing: f64,

    pub initial_path: Vec<PathElement>,
    pub initial_resource_occupation: BTreeMap<ResourceId, f64>,
    pub current_path: Vec<PathElement>,
    pub current_resource_occupation: BTreeMap<ResourceId, f64>,

    /// Protection segments assigned to this route as backups, in order.
    pub backup_segments: Vec<ProtectionSegmentId>,
    pub attributes: Attributes,
}

impl Indexed for Route {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl Route {
    pub fn initial_links(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.initial_path.iter().filter_map(|e| match e {
            PathElement::Link(l) => Some(*l),
            _ => None,
        })
    }

    pub fn initial_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.initial_path.iter().filter_map(|e| match e {
            PathElement::Resource(r) => Some(*r),
            _ => None,
        })
    }

    /// Links named directly in the current path, without the links inside segments.
    pub fn current_links_directly(&self) -> impl Iterator<Item = LinkId> + '_ {
        self.current_path.iter().filter_map(|e| match e {
            PathElement::Link(l) => Some(*l),
            _ => None,
        })
    }

    pub fn current_resources(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.current_path.iter().filter_map(|e| match e {
            PathElement::Resource(r) => Some(*r),
            _ => None,
        })
    }

    pub fn current_segments(&self) -> impl Iterator<Item = ProtectionSegmentId> + '_ {
        self.current_path.iter().filter_map(|e| match e {
            PathElement::ProtectionSegment(s) => Some(*s),
            _ => None,
        })
    }

    pub fn is_rerouted(&self) -> bool {
        self.current_path != self.initial_path
    }
}

/// A contiguous sequence of links with reserved capacity, usable as a backup hop in routes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtectionSegment {
    pub id: ProtectionSegmentId,
    pub index: usize,
    pub layer: LayerId,
    pub links: Vec<LinkId>,
    pub reserved_capacity: f64,
    pub attributes: Attributes,
}

impl Indexed for ProtectionSegment {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

/// Current path of a route handed to the persisted-plan reader.
pub(crate) struct CurrentPath {
    pub path: Vec<PathElement>,
    pub resource_occupation: BTreeMap<ResourceId, f64>,
}

impl NetworkPlan {
    //----------------------------
    // --- Protection Segments ---
    //----------------------------

    pub fn protection_segments(&self, layer: LayerId) -> Result<Vec<&ProtectionSegment>> {
        Ok(self.layer(layer)?.protection_segments.values().collect())
    }

    pub fn add_protection_segment(&mut self, layer: LayerId, links: Vec<LinkId>, reserved_capacity: f64) -> Result<ProtectionSegmentId> {
        self.insert_protection_segment(None, layer, links, reserved_capacity)
    }

    pub(crate) fn insert_protection_segment(
        &mut self,
        id: Option<u64>,
        layer: LayerId,
        links: Vec<LinkId>,
        reserved_capacity: f64,
    ) -> Result<ProtectionSegmentId> {
        self.require_routing_type(layer, RoutingType::SourceRouting)?;
        Self::require_non_negative("reserved capacity", reserved_capacity)?;
        self.validate_contiguous_links(layer, &links)?;

        let id: ProtectionSegmentId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding protection segment {} over {} links in layer {}", id, links.len(), layer);
        let segment = ProtectionSegment { id, index: 0, layer, links, reserved_capacity, attributes: Attributes::new() };
        self.layer_mut(layer)?.protection_segments.insert(id, segment);
        self.invalidate_caches();
        Ok(id)
    }

    fn validate_contiguous_links(&self, layer: LayerId, links: &[LinkId]) -> Result<()> {
        if links.is_empty() {
            return Err(Error::InvalidValue("a protection segment needs at least one link".into()));
        }
        let layer_links = &self.layer(layer)?.links;

        let mut previous_destination: Option<NodeId> = None;
        for link in links {
            let link = layer_links.get(*link).ok_or_else(|| self.foreign_link_error(*link, layer))?;
            if let Some(expected) = previous_destination {
                if link.origin != expected {
                    return Err(Error::InvalidReference(format!("link {} does not start where the previous link ends (node {})", link.id, expected)));
                }
            }
            previous_destination = Some(link.destination);
        }
        Ok(())
    }

    /// The error for a link id that is not part of `layer`: a wrong layer when the link lives
    /// elsewhere, a dangling reference otherwise.
    pub(crate) fn foreign_link_error(&self, link: LinkId, layer: LayerId) -> Error {
        match self.link_layer(link) {
            Ok(other) => Error::InvalidLayer(format!("link {} belongs to layer {}, not layer {}", link, other, layer)),
            Err(e) => e,
        }
    }

    pub fn set_protection_segment_reserved_capacity(&mut self, segment: ProtectionSegmentId, reserved_capacity: f64) -> Result<()> {
        Self::require_non_negative("reserved capacity", reserved_capacity)?;
        self.protection_segment_mut(segment)?.reserved_capacity = reserved_capacity;
        Ok(())
    }

    pub fn protection_segment_end_nodes(&self, segment: ProtectionSegmentId) -> Result<(NodeId, NodeId)> {
        let segment = self.protection_segment(segment)?;
        let (first, last) = match (segment.links.first(), segment.links.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Err(Error::corrupt("protection segment without links", Some(segment.id.raw()))),
        };
        Ok((self.link(first)?.origin, self.link(last)?.destination))
    }

    /// Removes a segment. Routes currently routed through it are removed; routes holding it as
    /// a backup only forget it.
    pub fn remove_protection_segment(&mut self, segment: ProtectionSegmentId) -> Result<()> {
        let layer = self.protection_segment_layer(segment)?;

        let routes_using: Vec<RouteId> =
            self.layer(layer)?.routes.values().filter(|r| r.current_segments().any(|s| s == segment)).map(|r| r.id).collect();
        for route in routes_using {
            self.remove_route(route)?;
        }

        let target = self.layer_mut(layer)?;
        for route in target.routes.values_mut() {
            route.backup_segments.retain(|s| *s != segment);
        }
        target.protection_segments.remove(segment);

        log::debug!("Removed protection segment {} from layer {}", segment, layer);
        self.invalidate_caches();
        Ok(())
    }

    //--------------
    // --- Routes ---
    //--------------

    pub fn routes(&self, layer: LayerId) -> Result<Vec<&Route>> {
        Ok(self.layer(layer)?.routes.values().collect())
    }

    pub fn route_ids(&self, layer: LayerId) -> Result<Vec<RouteId>> {
        Ok(self.layer(layer)?.routes.ids())
    }

    /// Adds a route for `demand` over `initial_path`, a sequence of links and resources.
    ///
    /// The path must lead from the demand's ingress to its egress through links of the
    /// demand's layer, traverse resources of exactly the demand's service-chain types, and the
    /// declared resource occupation must fit the free capacity of each resource.
    pub fn add_route(
        &mut self,
        demand: DemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        initial_path: Vec<PathElement>,
        initial_resource_occupation: BTreeMap<ResourceId, f64>,
    ) -> Result<RouteId> {
        self.insert_route(None, demand, carried_traffic, occupied_capacity, initial_path, initial_resource_occupation, None, Vec::new(), true)
    }

    /// Adds a route over links only.
    pub fn add_route_over_links(&mut self, demand: DemandId, carried_traffic: f64, occupied_capacity: f64, links: &[LinkId]) -> Result<RouteId> {
        let path = links.iter().map(|l| PathElement::Link(*l)).collect();
        self.add_route(demand, carried_traffic, occupied_capacity, path, BTreeMap::new())
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_route(
        &mut self,
        id: Option<u64>,
        demand: DemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        initial_path: Vec<PathElement>,
        initial_resource_occupation: BTreeMap<ResourceId, f64>,
        current: Option<CurrentPath>,
        backup_segments: Vec<ProtectionSegmentId>,
        check_free_capacity: bool,
    ) -> Result<RouteId> {
        let layer = self.demand_layer(demand)?;
        self.require_routing_type(layer, RoutingType::SourceRouting)?;
        Self::require_non_negative("carried traffic", carried_traffic)?;
        Self::require_non_negative("occupied capacity", occupied_capacity)?;

        self.validate_route_path(layer, demand, &initial_path, &initial_resource_occupation, false)?;
        let current = match current {
            Some(current) => {
                self.validate_route_path(layer, demand, &current.path, &current.resource_occupation, true)?;
                current
            }
            None => CurrentPath { path: initial_path.clone(), resource_occupation: initial_resource_occupation.clone() },
        };
        for segment in &backup_segments {
            if self.protection_segment_layer(*segment)? != layer {
                return Err(Error::InvalidLayer(format!("protection segment {} is not in layer {}", segment, layer)));
            }
        }
        if check_free_capacity {
            self.check_resource_occupation_fits(None, &current.resource_occupation)?;
        }

        let id: RouteId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding route {} for demand {} over {} hops, carrying {}", id, demand, initial_path.len(), carried_traffic);
        let route = Route {
            id,
            index: 0,
            layer,
            demand,
            carried_traffic_if_not_failing: carried_traffic,
            occupied_capacity_if_not_failing: occupied_capacity,
            initial_path,
            initial_resource_occupation,
            current_path: current.path,
            current_resource_occupation: current.resource_occupation,
            backup_segments,
            attributes: Attributes::new(),
        };
        self.layer_mut(layer)?.routes.insert(id, route);
        self.invalidate_caches();
        Ok(id)
    }

    /// Walks `path` from the demand's ingress and checks it ends at the egress.
    ///
    /// Consecutive links must be adjacent; a resource may sit between two links (or at either
    /// end of the path) when it is hosted at the joining node, but two resources may not follow
    /// each other. Protection segments are accepted only in current paths.
    fn validate_route_path(
        &self,
        layer: LayerId,
        demand: DemandId,
        path: &[PathElement],
        resource_occupation: &BTreeMap<ResourceId, f64>,
        allow_segments: bool,
    ) -> Result<()> {
        let demand = self.demand(demand)?;
        if path.is_empty() {
            return Err(Error::InvalidValue(format!("route path for demand {} is empty", demand.id)));
        }

        let layer_ref = self.layer(layer)?;
        let mut at = demand.ingress;
        let mut previous_was_resource = false;
        let mut traversed_types: Vec<&str> = Vec::new();

        for element in path {
            match element {
                PathElement::Link(link) => {
                    let link = layer_ref.links.get(*link).ok_or_else(|| self.foreign_link_error(*link, layer))?;
                    if link.origin != at {
                        return Err(Error::InvalidReference(format!(
                            "path for demand {} is not contiguous: link {} starts at node {}, expected node {}",
                            demand.id, link.id, link.origin, at
                        )));
                    }
                    at = link.destination;
                    previous_was_resource = false;
                }
                PathElement::ProtectionSegment(segment) => {
                    if !allow_segments {
                        return Err(Error::InvalidValue(format!("initial path of demand {} cannot contain protection segment {}", demand.id, segment)));
                    }
                    let segment = layer_ref.protection_segments.get(*segment).ok_or_else(|| match self.protection_segment_layer(*segment) {
                        Ok(other) => Error::InvalidLayer(format!("protection segment {} belongs to layer {}, not layer {}", segment, other, layer)),
                        Err(e) => e,
                    })?;
                    for link in &segment.links {
                        let link = layer_ref.links.get(*link).ok_or_else(|| self.foreign_link_error(*link, layer))?;
                        if link.origin != at {
                            return Err(Error::InvalidReference(format!(
                                "path for demand {} is not contiguous at protection segment {}: expected node {}",
                                demand.id, segment.id, at
                            )));
                        }
                        at = link.destination;
                    }
                    previous_was_resource = false;
                }
                PathElement::Resource(resource) => {
                    let resource = self.resource(*resource)?;
                    if resource.host != at {
                        return Err(Error::InvalidReference(format!(
                            "resource {} is hosted at node {}, but the path is at node {}",
                            resource.id, resource.host, at
                        )));
                    }
                    if previous_was_resource {
                        return Err(Error::InvalidReference(format!(
                            "path for demand {} traverses two resources in a row at node {}",
                            demand.id, at
                        )));
                    }
                    traversed_types.push(resource.resource_type.as_str());
                    previous_was_resource = true;
                }
            }
        }

        if at != demand.egress {
            return Err(Error::InvalidReference(format!("path for demand {} ends at node {}, not at egress node {}", demand.id, at, demand.egress)));
        }

        if traversed_types.len() != demand.service_chain.len() || traversed_types.iter().zip(&demand.service_chain).any(|(a, b)| *a != b.as_str()) {
            return Err(Error::InvalidValue(format!(
                "path for demand {} traverses resource types {:?}, the demand requires {:?}",
                demand.id, traversed_types, demand.service_chain
            )));
        }

        for (resource, amount) in resource_occupation {
            if !path.contains(&PathElement::Resource(*resource)) {
                return Err(Error::InvalidReference(format!("resource {} has an occupation but is not in the path", resource)));
            }
            Self::require_non_negative("resource occupation", *amount)?;
        }
        Ok(())
    }

    /// Checks that occupying `occupation` fits every resource, counting the current
    /// occupation of `route` as released.
    fn check_resource_occupation_fits(&self, route: Option<RouteId>, occupation: &BTreeMap<ResourceId, f64>) -> Result<()> {
        let released = match route {
            Some(route) => self.route(route)?.current_resource_occupation.clone(),
            None => BTreeMap::new(),
        };

        for (resource, amount) in occupation {
            let capacity = self.resource(*resource)?.capacity;
            let occupied_by_others = self.resource_occupied_capacity(*resource)? - released.get(resource).copied().unwrap_or(0.0);
            let available = capacity - occupied_by_others;
            if *amount > available + PRECISION_FACTOR {
                return Err(Error::CapacityExceeded { resource: *resource, requested: *amount, available });
            }
        }
        Ok(())
    }

    /// Replaces the current path of a route.
    ///
    /// Either the whole change applies or none of it: if any resource would exceed its
    /// capacity the route keeps its previous current path.
    pub fn set_current_path(&mut self, route: RouteId, path: Vec<PathElement>, resource_occupation: BTreeMap<ResourceId, f64>) -> Result<()> {
        let (layer, demand) = {
            let route = self.route(route)?;
            (route.layer, route.demand)
        };
        self.validate_route_path(layer, demand, &path, &resource_occupation, true)?;
        self.check_resource_occupation_fits(Some(route), &resource_occupation)?;

        let target = self.route_mut(route)?;
        target.current_path = path;
        target.current_resource_occupation = resource_occupation;
        log::debug!("Route {} rerouted over {} hops", route, target.current_path.len());
        self.invalidate_caches();
        Ok(())
    }

    pub fn revert_route_to_initial_path(&mut self, route: RouteId) -> Result<()> {
        let (path, occupation) = {
            let route = self.route(route)?;
            (route.initial_path.clone(), route.initial_resource_occupation.clone())
        };
        self.set_current_path(route, path, occupation)
    }

    pub fn set_route_carried_traffic(&mut self, route: RouteId, carried_traffic: f64, occupied_capacity: f64) -> Result<()> {
        Self::require_non_negative("carried traffic", carried_traffic)?;
        Self::require_non_negative("occupied capacity", occupied_capacity)?;
        let target = self.route_mut(route)?;
        target.carried_traffic_if_not_failing = carried_traffic;
        target.occupied_capacity_if_not_failing = occupied_capacity;
        Ok(())
    }

    /// Appends a backup segment to the route. The current path is not touched.
    pub fn add_protection_segment_to_route(&mut self, route: RouteId, segment: ProtectionSegmentId) -> Result<()> {
        let layer = self.route_layer(route)?;
        if self.protection_segment_layer(segment)? != layer {
            return Err(Error::InvalidLayer(format!("protection segment {} is not in the layer of route {}", segment, route)));
        }
        let target = self.route_mut(route)?;
        if target.backup_segments.contains(&segment) {
            return Err(Error::InvalidValue(format!("protection segment {} is already a backup of route {}", segment, route)));
        }
        target.backup_segments.push(segment);
        Ok(())
    }

    pub fn remove_protection_segment_from_route(&mut self, route: RouteId, segment: ProtectionSegmentId) -> Result<()> {
        let target = self.route_mut(route)?;
        let before = target.backup_segments.len();
        target.backup_segments.retain(|s| *s != segment);
        if target.backup_segments.len() == before {
            return Err(Error::InvalidReference(format!("protection segment {} is not a backup of route {}", segment, route)));
        }
        Ok(())
    }

    pub fn remove_route(&mut self, route: RouteId) -> Result<()> {
        let layer = self.route_layer(route)?;
        self.layer_mut(layer)?.routes.remove(route);
        log::debug!("Removed route {} from layer {}", route, layer);
        self.invalidate_caches();
        Ok(())
    }

    /// The links traversed by the current path, segments expanded, in order.
    pub fn route_current_links(&self, route: RouteId) -> Result<Vec<LinkId>> {
        let route = self.route(route)?;
        let mut links = Vec::new();
        for element in &route.current_path {
            match element {
                PathElement::Link(link) => links.push(*link),
                PathElement::ProtectionSegment(segment) => links.extend(self.protection_segment(*segment)?.links.iter().copied()),
                PathElement::Resource(_) => {}
            }
        }
        Ok(links)
    }

    /// Nodes visited by the current path, starting at the ingress.
    pub fn route_node_sequence(&self, route: RouteId) -> Result<Vec<NodeId>> {
        let ingress = self.demand(self.route(route)?.demand)?.ingress;
        let mut nodes = vec![ingress];
        for link in self.route_current_links(route)? {
            nodes.push(self.link(link)?.destination);
        }
        Ok(nodes)
    }

    /// Whether anything on the current path (link, node, resource, segment link) is down or
    /// has no capacity.
    pub fn is_route_down(&self, route: RouteId) -> Result<bool> {
        for link in self.route_current_links(route)? {
            if !self.is_link_operational(link)? {
                return Ok(true);
            }
        }
        for resource in self.route(route)?.current_resources() {
            if !self.is_resource_operational(resource)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The nominal carried traffic, or zero while the route is down.
    pub fn route_carried_traffic(&self, route: RouteId) -> Result<f64> {
        if self.is_route_down(route)? {
            return Ok(0.0);
        }
        Ok(self.route(route)?.carried_traffic_if_not_failing)
    }

    /// The nominal occupied link capacity, or zero while the route is down.
    pub fn route_occupied_capacity(&self, route: RouteId) -> Result<f64> {
        if self.is_route_down(route)? {
            return Ok(0.0);
        }
        Ok(self.route(route)?.occupied_capacity_if_not_failing)
    }

    /// Propagation delay over the current links plus processing time of traversed resources.
    pub fn route_propagation_delay_ms(&self, route: RouteId) -> Result<f64> {
        let mut delay = 0.0;
        for link in self.route_current_links(route)? {
            delay += self.link(link)?.propagation_delay_ms();
        }
        for resource in self.route(route)?.current_resources() {
            delay += self.resource(resource)?.processing_time_ms;
        }
        Ok(delay)
    }

    /// Routes whose current path traverses `link`, once per traversal.
    pub fn routes_traversing_link(&self, link: LinkId) -> Result<Vec<RouteId>> {
        self.link_layer(link)?;
        Ok(self.caches().routes_traversing_link(link))
    }
}
