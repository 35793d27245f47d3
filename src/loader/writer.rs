use crate::api::network_dto::{
    AttributeDto, BaseResourceDto, DemandDto, ForwardingRuleDto, HopByHopRoutingDto, LayerCouplingDemandDto,
    LayerCouplingMulticastDemandDto, LayerDto, LinkDto, MulticastDemandDto, MulticastTreeDto, NetworkDto, NetworkFileDto, NodeDto,
    OccupationDto, ProtectionSegmentDto, ResourceDto, RouteDto, SourceRoutingDto, SrgDto,
};
use crate::domain::network::NetworkPlan;
use crate::domain::network::layer::{NetworkLayer, RoutingType};
use crate::domain::network::link::LinkCoupling;
use crate::domain::network::resource::Resource;
use crate::domain::network::route::PathElement;
use crate::domain::utils::Attributes;
use crate::domain::utils::config::FILE_FORMAT_VERSION;
use crate::domain::utils::id::ResourceId;

fn attributes_to_dto(attributes: &Attributes) -> Vec<AttributeDto> {
    attributes.iter().map(|(key, value)| AttributeDto { key: key.clone(), value: value.clone() }).collect()
}

fn path_to_ids(path: &[PathElement]) -> Vec<u64> {
    path.iter().map(PathElement::raw_id).collect()
}

/// Builds the persisted form of a plan. Elements appear in index order and traffic values are
/// the nominal ones.
pub fn plan_to_dto(plan: &NetworkPlan) -> NetworkFileDto {
    let mut layer_coupling_demands = Vec::new();
    let mut layer_coupling_multicast_demands = Vec::new();
    for layer in plan.layers() {
        for link in layer.links() {
            if let Some(LinkCoupling::Demand(demand)) = link.coupling {
                layer_coupling_demands.push(LayerCouplingDemandDto { upper_layer_link_id: link.id.raw(), lower_layer_demand_id: demand.raw() });
            }
        }
        for demand in layer.multicast_demands() {
            if demand.is_coupled() {
                layer_coupling_multicast_demands.push(LayerCouplingMulticastDemandDto {
                    upper_layer_link_ids: demand.coupled_upper_links.values().map(|l| l.raw()).collect(),
                    lower_layer_demand_id: demand.id.raw(),
                });
            }
        }
    }

    let network = NetworkDto {
        name: plan.name().to_string(),
        description: plan.description().to_string(),
        next_element_id: plan.next_element_id(),
        attributes: attributes_to_dto(&plan.attributes),
        layers: plan.layers().map(|layer| layer_to_dto(layer, layer.id == plan.default_layer())).collect(),
        nodes: plan
            .nodes()
            .map(|node| NodeDto {
                id: node.id.raw(),
                x_coord: node.x,
                y_coord: node.y,
                name: node.name.clone(),
                is_up: node.is_up,
                attributes: attributes_to_dto(&node.attributes),
            })
            .collect(),
        resources: plan.resources().map(resource_to_dto).collect(),
        srgs: plan
            .srgs()
            .map(|srg| SrgDto {
                id: srg.id.raw(),
                mean_time_to_fail_in_hours: srg.mttf_hours,
                mean_time_to_repair_in_hours: srg.mttr_hours,
                attributes: attributes_to_dto(&srg.attributes),
                nodes: srg.nodes.iter().map(|n| n.raw()).collect(),
                links: srg.links.iter().map(|l| l.raw()).collect(),
            })
            .collect(),
        layer_coupling_demands,
        layer_coupling_multicast_demands,
    };

    NetworkFileDto { version: Some(FILE_FORMAT_VERSION), network }
}

fn layer_to_dto(layer: &NetworkLayer, is_default_layer: bool) -> LayerDto {
    let (hop_by_hop_routing, source_routing) = match layer.routing_type {
        RoutingType::HopByHop => {
            let forwarding_rules = layer
                .forwarding_rules
                .iter()
                .map(|((demand, link), ratio)| ForwardingRuleDto { link_id: link.raw(), demand_id: demand.raw(), splitting_ratio: *ratio })
                .collect();
            (Some(HopByHopRoutingDto { forwarding_rules }), None)
        }
        RoutingType::SourceRouting => {
            let routes = layer
                .routes()
                .map(|route| RouteDto {
                    id: route.id.raw(),
                    demand_id: route.demand.raw(),
                    carried_traffic_if_not_failing: route.carried_traffic_if_not_failing,
                    occupied_link_capacity_if_not_failing: route.occupied_capacity_if_not_failing,
                    initial_seq_links_and_resources: path_to_ids(&route.initial_path),
                    initial_resource_occupation_map: occupation_to_dto(route.initial_resource_occupation.iter()),
                    current_seq_links_segments_and_resources: Some(path_to_ids(&route.current_path)),
                    current_resource_occupation_map: Some(occupation_to_dto(route.current_resource_occupation.iter())),
                    backup_segment_list: route.backup_segments.iter().map(|s| s.raw()).collect(),
                    attributes: attributes_to_dto(&route.attributes),
                })
                .collect();
            let protection_segments = layer
                .protection_segments()
                .map(|segment| ProtectionSegmentDto {
                    id: segment.id.raw(),
                    reserved_capacity: segment.reserved_capacity,
                    seq_links: segment.links.iter().map(|l| l.raw()).collect(),
                    attributes: attributes_to_dto(&segment.attributes),
                })
                .collect();
            (None, Some(SourceRoutingDto { routes, protection_segments }))
        }
    };

    LayerDto {
        id: layer.id.raw(),
        name: layer.name.clone(),
        description: layer.description.clone(),
        link_capacity_units_name: layer.link_capacity_units.clone(),
        demand_traffic_units_name: layer.demand_traffic_units.clone(),
        is_default_layer,
        attributes: attributes_to_dto(&layer.attributes),
        demands: layer
            .demands()
            .map(|demand| DemandDto {
                id: demand.id.raw(),
                ingress_node_id: demand.ingress.raw(),
                egress_node_id: demand.egress.raw(),
                offered_traffic: demand.offered_traffic,
                mandatory_sequence_of_traversed_resource_types: demand.is_service_chain().then(|| demand.service_chain.clone()),
                attributes: attributes_to_dto(&demand.attributes),
            })
            .collect(),
        multicast_demands: layer
            .multicast_demands()
            .map(|demand| MulticastDemandDto {
                id: demand.id.raw(),
                ingress_node_id: demand.ingress.raw(),
                egress_node_ids: demand.egress.iter().map(|n| n.raw()).collect(),
                offered_traffic: demand.offered_traffic,
                attributes: attributes_to_dto(&demand.attributes),
            })
            .collect(),
        links: layer
            .links()
            .map(|link| LinkDto {
                id: link.id.raw(),
                origin_node_id: link.origin.raw(),
                destination_node_id: link.destination.raw(),
                capacity: link.capacity,
                length_in_km: link.length_km,
                propagation_speed_in_km_per_second: link.propagation_speed_km_per_second,
                is_up: link.is_up,
                attributes: attributes_to_dto(&link.attributes),
            })
            .collect(),
        multicast_trees: layer
            .multicast_trees()
            .map(|tree| MulticastTreeDto {
                id: tree.id.raw(),
                demand_id: tree.demand.raw(),
                carried_traffic: tree.carried_traffic_if_not_failing,
                occupied_capacity: tree.occupied_capacity_if_not_failing,
                carried_traffic_if_not_failing: Some(tree.carried_traffic_if_not_failing),
                occupied_link_capacity_if_not_failing: Some(tree.occupied_capacity_if_not_failing),
                link_ids: tree.initial_links.iter().map(|l| l.raw()).collect(),
                current_set_links: Some(tree.current_links.iter().map(|l| l.raw()).collect()),
                attributes: attributes_to_dto(&tree.attributes),
            })
            .collect(),
        hop_by_hop_routing,
        source_routing,
    }
}

fn occupation_to_dto<'a>(occupation: impl Iterator<Item = (&'a ResourceId, &'a f64)>) -> Vec<OccupationDto> {
    occupation.map(|(resource, amount)| OccupationDto { id: resource.raw(), value: *amount }).collect()
}

fn resource_to_dto(resource: &Resource) -> ResourceDto {
    ResourceDto {
        id: resource.id.raw(),
        host_node_id: resource.host.raw(),
        resource_type: resource.resource_type.clone(),
        name: resource.name.clone(),
        capacity_measurement_units: resource.capacity_units.clone(),
        processing_time_to_traversing_traffic_in_ms: resource.processing_time_ms,
        capacity: resource.capacity,
        attributes: attributes_to_dto(&resource.attributes),
        base_resources: resource
            .base_resources
            .iter()
            .map(|(base, amount)| BaseResourceDto { id: base.raw(), occupied_capacity: *amount })
            .collect(),
    }
}
