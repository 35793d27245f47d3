use std::collections::{BTreeMap, BTreeSet};

use crate::api::network_dto::{AttributeDto, LayerDto, NetworkDto, NetworkFileDto, OccupationDto, ResourceDto};
use crate::domain::network::layer::RoutingType;
use crate::domain::network::route::{CurrentPath, PathElement};
use crate::domain::network::{ElementRef, NetworkPlan};
use crate::domain::utils::Attributes;
use crate::domain::utils::config::FILE_FORMAT_VERSION;
use crate::domain::utils::id::{DemandId, LayerId, LinkId, MulticastDemandId, NodeId, ProtectionSegmentId, ResourceId};
use crate::error::{Error, Result};

fn attributes_from_dto(attributes: &[AttributeDto]) -> Attributes {
    attributes.iter().map(|a| (a.key.clone(), a.value.clone())).collect()
}

fn occupation_from_dto(occupation: &[OccupationDto]) -> BTreeMap<ResourceId, f64> {
    occupation.iter().map(|o| (ResourceId::new(o.id), o.value)).collect()
}

/// Rebuilds a plan from its persisted form.
///
/// Elements are created in dependency order whatever their order in the document, with the
/// ids the document assigns. The consistency check runs once at the end; on any error no plan
/// is returned.
pub fn plan_from_dto(file: NetworkFileDto) -> Result<NetworkPlan> {
    let version = file.version.unwrap_or(FILE_FORMAT_VERSION);
    if version > FILE_FORMAT_VERSION {
        return Err(Error::corrupt(format!("file format version {} is newer than the supported version {}", version, FILE_FORMAT_VERSION), None));
    }
    let dto = file.network;
    check_next_element_id(&dto)?;

    let mut plan = NetworkPlan::new();
    plan.ids.advance_to(dto.next_element_id)?;
    plan.set_name(dto.name.clone());
    plan.set_description(dto.description.clone());
    plan.replace_attributes(ElementRef::Network, attributes_from_dto(&dto.attributes))?;

    let layer_ids = read_layers(&mut plan, &dto.layers)?;

    for node in &dto.nodes {
        let id = plan.insert_node(Some(node.id), node.x_coord, node.y_coord, node.name.clone(), node.is_up)?;
        plan.replace_attributes(ElementRef::Node(id), attributes_from_dto(&node.attributes))?;
    }

    read_resources(&mut plan, &dto.resources)?;

    for (layer, layer_dto) in layer_ids.iter().zip(&dto.layers) {
        for link in &layer_dto.links {
            let id = plan.insert_link(
                Some(link.id),
                NodeId::new(link.origin_node_id),
                NodeId::new(link.destination_node_id),
                *layer,
                link.capacity,
                link.length_in_km,
                link.propagation_speed_in_km_per_second,
                link.is_up,
            )?;
            plan.replace_attributes(ElementRef::Link(id), attributes_from_dto(&link.attributes))?;
        }
    }

    for (layer, layer_dto) in layer_ids.iter().zip(&dto.layers) {
        for demand in &layer_dto.demands {
            let service_chain = demand.mandatory_sequence_of_traversed_resource_types.clone().unwrap_or_default();
            let id = plan.insert_demand(
                Some(demand.id),
                NodeId::new(demand.ingress_node_id),
                NodeId::new(demand.egress_node_id),
                demand.offered_traffic,
                *layer,
                service_chain,
            )?;
            plan.replace_attributes(ElementRef::Demand(id), attributes_from_dto(&demand.attributes))?;
        }
        for demand in &layer_dto.multicast_demands {
            let egress = demand.egress_node_ids.iter().map(|n| NodeId::new(*n)).collect();
            let id = plan.insert_multicast_demand(Some(demand.id), NodeId::new(demand.ingress_node_id), egress, demand.offered_traffic, *layer)?;
            plan.replace_attributes(ElementRef::MulticastDemand(id), attributes_from_dto(&demand.attributes))?;
        }
    }

    for (layer, layer_dto) in layer_ids.iter().zip(&dto.layers) {
        for segment in layer_dto.source_routing.iter().flat_map(|sr| &sr.protection_segments) {
            let links = segment.seq_links.iter().map(|l| LinkId::new(*l)).collect();
            let id = plan.insert_protection_segment(Some(segment.id), *layer, links, segment.reserved_capacity)?;
            plan.replace_attributes(ElementRef::ProtectionSegment(id), attributes_from_dto(&segment.attributes))?;
        }
    }

    for (layer, layer_dto) in layer_ids.iter().zip(&dto.layers) {
        read_routes(&mut plan, *layer, layer_dto)?;
    }

    for (layer, layer_dto) in layer_ids.iter().zip(&dto.layers) {
        for tree in &layer_dto.multicast_trees {
            let demand = MulticastDemandId::new(tree.demand_id);
            require_listed_in_layer(*layer, plan.multicast_demand_layer(demand)?, "multicast tree", tree.id)?;
            let current = tree.current_set_links.as_ref().map(|links| links.iter().map(|l| LinkId::new(*l)).collect());
            let id = plan.insert_multicast_tree(
                Some(tree.id),
                demand,
                tree.carried_traffic_if_not_failing.unwrap_or(tree.carried_traffic),
                tree.occupied_link_capacity_if_not_failing.unwrap_or(tree.occupied_capacity),
                tree.link_ids.iter().map(|l| LinkId::new(*l)).collect(),
                current,
            )?;
            plan.replace_attributes(ElementRef::MulticastTree(id), attributes_from_dto(&tree.attributes))?;
        }
    }

    for (layer, layer_dto) in layer_ids.iter().zip(&dto.layers) {
        for rule in layer_dto.hop_by_hop_routing.iter().flat_map(|hbh| &hbh.forwarding_rules) {
            let demand = DemandId::new(rule.demand_id);
            require_listed_in_layer(*layer, plan.demand_layer(demand)?, "forwarding rule of demand", rule.demand_id)?;
            plan.set_forwarding_rule(demand, LinkId::new(rule.link_id), rule.splitting_ratio)?;
        }
    }

    for srg in &dto.srgs {
        let id = plan.insert_srg(Some(srg.id), srg.mean_time_to_fail_in_hours, srg.mean_time_to_repair_in_hours)?;
        for node in &srg.nodes {
            plan.add_node_to_srg(id, NodeId::new(*node))?;
        }
        for link in &srg.links {
            plan.add_link_to_srg(id, LinkId::new(*link))?;
        }
        plan.replace_attributes(ElementRef::Srg(id), attributes_from_dto(&srg.attributes))?;
    }

    for coupling in &dto.layer_coupling_demands {
        plan.couple_demand_to_link(DemandId::new(coupling.lower_layer_demand_id), LinkId::new(coupling.upper_layer_link_id))?;
    }
    for coupling in &dto.layer_coupling_multicast_demands {
        let links: BTreeSet<LinkId> = coupling.upper_layer_link_ids.iter().map(|l| LinkId::new(*l)).collect();
        plan.couple_multicast_demand_to_links(MulticastDemandId::new(coupling.lower_layer_demand_id), &links)?;
    }

    plan.check_caches_consistency()?;
    Ok(plan)
}

/// Elements placed through their demand must be listed under that demand's layer.
fn require_listed_in_layer(listed_in: LayerId, owner_layer: LayerId, element: &str, id: u64) -> Result<()> {
    if listed_in != owner_layer {
        return Err(Error::corrupt(
            format!("{} {} is listed under layer {} but its demand belongs to layer {}", element, id, listed_in, owner_layer),
            Some(id),
        ));
    }
    Ok(())
}

/// `nextElementId` must be positive and above every id in the document.
fn check_next_element_id(dto: &NetworkDto) -> Result<()> {
    if dto.next_element_id == 0 {
        return Err(Error::corrupt("next element id must be positive", None));
    }

    let mut ids: Vec<u64> = Vec::new();
    ids.extend(dto.nodes.iter().map(|n| n.id));
    ids.extend(dto.resources.iter().map(|r| r.id));
    ids.extend(dto.srgs.iter().map(|s| s.id));
    for layer in &dto.layers {
        ids.push(layer.id);
        ids.extend(layer.links.iter().map(|l| l.id));
        ids.extend(layer.demands.iter().map(|d| d.id));
        ids.extend(layer.multicast_demands.iter().map(|d| d.id));
        ids.extend(layer.multicast_trees.iter().map(|t| t.id));
        if let Some(sr) = &layer.source_routing {
            ids.extend(sr.routes.iter().map(|r| r.id));
            ids.extend(sr.protection_segments.iter().map(|s| s.id));
        }
    }

    match ids.into_iter().max() {
        Some(max) if max >= dto.next_element_id => {
            Err(Error::corrupt(format!("element id {} is not below the next element id {}", max, dto.next_element_id), Some(max)))
        }
        _ => Ok(()),
    }
}

/// Creates the layers of the document and returns their ids in document order.
///
/// The first layer takes over the plan's initial default layer when both have the same id.
/// Otherwise it is created with its own id and the initial layer is dropped.
fn read_layers(plan: &mut NetworkPlan, layers: &[LayerDto]) -> Result<Vec<LayerId>> {
    if layers.is_empty() {
        return Err(Error::corrupt("the network has no layers", None));
    }
    let flagged: Vec<&LayerDto> = layers.iter().filter(|l| l.is_default_layer).collect();
    if flagged.len() > 1 {
        return Err(Error::corrupt(format!("{} layers are flagged as default layer", flagged.len()), Some(flagged[1].id)));
    }

    let initial_layer = plan.default_layer();
    let mut ids = Vec::with_capacity(layers.len());
    for (position, layer_dto) in layers.iter().enumerate() {
        let id = if position == 0 && layer_dto.id == initial_layer.raw() {
            plan.set_layer_name(initial_layer, layer_dto.name.clone())?;
            plan.set_layer_description(initial_layer, layer_dto.description.clone())?;
            plan.set_layer_units(initial_layer, layer_dto.link_capacity_units_name.clone(), layer_dto.demand_traffic_units_name.clone())?;
            initial_layer
        } else {
            let id = plan.insert_layer(
                Some(layer_dto.id),
                layer_dto.name.clone(),
                layer_dto.description.clone(),
                layer_dto.link_capacity_units_name.clone(),
                layer_dto.demand_traffic_units_name.clone(),
            )?;
            if position == 0 {
                plan.remove_layer(initial_layer)?;
            }
            id
        };

        match (&layer_dto.hop_by_hop_routing, &layer_dto.source_routing) {
            (Some(_), Some(_)) => {
                return Err(Error::corrupt(format!("layer {} holds both hop-by-hop and source routing", layer_dto.id), Some(layer_dto.id)));
            }
            (Some(_), None) => plan.set_routing_type(id, RoutingType::HopByHop)?,
            _ => {}
        }
        plan.replace_attributes(ElementRef::Layer(id), attributes_from_dto(&layer_dto.attributes))?;
        ids.push(id);
    }

    match flagged.first() {
        Some(default_layer) => plan.set_default_layer(LayerId::new(default_layer.id))?,
        None => plan.set_default_layer(ids[0])?,
    }
    Ok(ids)
}

/// Creates resources so that base resources always exist before the resources built on them,
/// then restores the document order as index order.
fn read_resources(plan: &mut NetworkPlan, resources: &[ResourceDto]) -> Result<()> {
    let in_document: BTreeSet<u64> = resources.iter().map(|r| r.id).collect();
    let mut created: BTreeSet<u64> = BTreeSet::new();
    let mut pending: Vec<&ResourceDto> = resources.iter().collect();

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|r| r.base_resources.iter().all(|base| created.contains(&base.id) || !in_document.contains(&base.id)));
        let Some(position) = ready else {
            return Err(Error::CyclicResourceDependency(ResourceId::new(pending[0].id)));
        };

        let resource = pending.remove(position);
        let base_resources = resource.base_resources.iter().map(|b| (ResourceId::new(b.id), b.occupied_capacity)).collect();
        let id = plan.insert_resource(
            Some(resource.id),
            NodeId::new(resource.host_node_id),
            resource.resource_type.clone(),
            resource.name.clone(),
            resource.capacity,
            resource.capacity_measurement_units.clone(),
            base_resources,
            resource.processing_time_to_traversing_traffic_in_ms,
            false,
        )?;
        plan.replace_attributes(ElementRef::Resource(id), attributes_from_dto(&resource.attributes))?;
        created.insert(resource.id);
    }

    let document_position: BTreeMap<ResourceId, usize> = resources.iter().enumerate().map(|(position, r)| (ResourceId::new(r.id), position)).collect();
    plan.resources.sort_by_key(|id| document_position.get(id).copied().unwrap_or(usize::MAX));
    plan.invalidate_caches();
    Ok(())
}

fn read_routes(plan: &mut NetworkPlan, layer: LayerId, layer_dto: &LayerDto) -> Result<()> {
    for route in layer_dto.source_routing.iter().flat_map(|sr| &sr.routes) {
        let demand = DemandId::new(route.demand_id);
        require_listed_in_layer(layer, plan.demand_layer(demand)?, "route", route.id)?;
        let initial_path = resolve_path(plan, &route.initial_seq_links_and_resources, false)?;
        let initial_occupation = occupation_from_dto(&route.initial_resource_occupation_map);

        let current = match &route.current_seq_links_segments_and_resources {
            Some(sequence) => Some(CurrentPath {
                path: resolve_path(plan, sequence, true)?,
                resource_occupation: route.current_resource_occupation_map.as_deref().map(occupation_from_dto).unwrap_or_else(|| initial_occupation.clone()),
            }),
            None => route
                .current_resource_occupation_map
                .as_deref()
                .map(|occupation| CurrentPath { path: initial_path.clone(), resource_occupation: occupation_from_dto(occupation) }),
        };

        let mut occupied = route.occupied_link_capacity_if_not_failing;
        if occupied < 0.0 {
            log::warn!("Route {} has negative occupied capacity {}, using its carried traffic instead", route.id, occupied);
            occupied = route.carried_traffic_if_not_failing;
        }

        let id = plan.insert_route(
            Some(route.id),
            demand,
            route.carried_traffic_if_not_failing,
            occupied,
            initial_path,
            initial_occupation,
            current,
            route.backup_segment_list.iter().map(|s| ProtectionSegmentId::new(*s)).collect(),
            false,
        )?;
        plan.replace_attributes(ElementRef::Route(id), attributes_from_dto(&route.attributes))?;
    }
    Ok(())
}

/// Resolves persisted sequence ids by probing links, then resources, then (current sequences
/// only) protection segments.
fn resolve_path(plan: &NetworkPlan, ids: &[u64], allow_segments: bool) -> Result<Vec<PathElement>> {
    ids.iter()
        .map(|raw| {
            if plan.link(LinkId::new(*raw)).is_ok() {
                Ok(PathElement::Link(LinkId::new(*raw)))
            } else if plan.resource(ResourceId::new(*raw)).is_ok() {
                Ok(PathElement::Resource(ResourceId::new(*raw)))
            } else if allow_segments && plan.protection_segment(ProtectionSegmentId::new(*raw)).is_ok() {
                Ok(PathElement::ProtectionSegment(ProtectionSegmentId::new(*raw)))
            } else {
                Err(Error::InvalidReference(format!("path element {} is neither a link nor a resource nor a protection segment", raw)))
            }
        })
        .collect()
}
