use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Root of a persisted network file.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkFileDto {
    /// Absent in older files, read as the current version.
    #[serde(default)]
    pub version: Option<u32>,
    pub network: NetworkDto,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeDto {
    pub key: String,
    pub value: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkDto {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub next_element_id: u64,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,

    #[serde(default)]
    pub layers: Vec<LayerDto>,
    #[serde(default)]
    pub nodes: Vec<NodeDto>,
    #[serde(default)]
    pub resources: Vec<ResourceDto>,
    #[serde(default)]
    pub srgs: Vec<SrgDto>,

    #[serde(default)]
    pub layer_coupling_demands: Vec<LayerCouplingDemandDto>,
    #[serde(default)]
    pub layer_coupling_multicast_demands: Vec<LayerCouplingMulticastDemandDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerDto {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub link_capacity_units_name: String,
    #[serde(default)]
    pub demand_traffic_units_name: String,
    #[serde(default)]
    pub is_default_layer: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,

    #[serde(default)]
    pub demands: Vec<DemandDto>,
    #[serde(default)]
    pub multicast_demands: Vec<MulticastDemandDto>,
    #[serde(default)]
    pub links: Vec<LinkDto>,
    #[serde(default)]
    pub multicast_trees: Vec<MulticastTreeDto>,

    // At most one of the two routing blocks may be present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hop_by_hop_routing: Option<HopByHopRoutingDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_routing: Option<SourceRoutingDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HopByHopRoutingDto {
    #[serde(default)]
    pub forwarding_rules: Vec<ForwardingRuleDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ForwardingRuleDto {
    pub link_id: u64,
    pub demand_id: u64,
    pub splitting_ratio: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRoutingDto {
    #[serde(default)]
    pub routes: Vec<RouteDto>,
    #[serde(default)]
    pub protection_segments: Vec<ProtectionSegmentDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeDto {
    pub id: u64,
    pub x_coord: f64,
    pub y_coord: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub is_up: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    pub id: u64,
    pub origin_node_id: u64,
    pub destination_node_id: u64,
    pub capacity: f64,
    pub length_in_km: f64,
    pub propagation_speed_in_km_per_second: f64,
    #[serde(default = "default_true")]
    pub is_up: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DemandDto {
    pub id: u64,
    pub ingress_node_id: u64,
    pub egress_node_id: u64,
    pub offered_traffic: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mandatory_sequence_of_traversed_resource_types: Option<Vec<String>>,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MulticastDemandDto {
    pub id: u64,
    pub ingress_node_id: u64,
    pub egress_node_ids: Vec<u64>,
    pub offered_traffic: f64,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

/// Resource occupation entry of a route.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OccupationDto {
    pub id: u64,
    pub value: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub id: u64,
    pub demand_id: u64,
    pub carried_traffic_if_not_failing: f64,
    pub occupied_link_capacity_if_not_failing: f64,

    /// Link and resource ids.
    pub initial_seq_links_and_resources: Vec<u64>,
    #[serde(default)]
    pub initial_resource_occupation_map: Vec<OccupationDto>,

    /// Link, protection segment and resource ids. Absent means equal to the initial sequence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_seq_links_segments_and_resources: Option<Vec<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_resource_occupation_map: Option<Vec<OccupationDto>>,

    #[serde(default)]
    pub backup_segment_list: Vec<u64>,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionSegmentDto {
    pub id: u64,
    pub reserved_capacity: f64,
    pub seq_links: Vec<u64>,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MulticastTreeDto {
    pub id: u64,
    pub demand_id: u64,
    pub carried_traffic: f64,
    pub occupied_capacity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carried_traffic_if_not_failing: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupied_link_capacity_if_not_failing: Option<f64>,

    /// Initial link set.
    pub link_ids: Vec<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_set_links: Option<Vec<u64>>,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDto {
    pub id: u64,
    pub host_node_id: u64,
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capacity_measurement_units: String,
    #[serde(default)]
    pub processing_time_to_traversing_traffic_in_ms: f64,
    pub capacity: f64,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
    #[serde(default)]
    pub base_resources: Vec<BaseResourceDto>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BaseResourceDto {
    pub id: u64,
    pub occupied_capacity: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SrgDto {
    pub id: u64,
    pub mean_time_to_fail_in_hours: f64,
    pub mean_time_to_repair_in_hours: f64,
    #[serde(default)]
    pub attributes: Vec<AttributeDto>,
    #[serde(default)]
    pub nodes: Vec<u64>,
    #[serde(default)]
    pub links: Vec<u64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerCouplingDemandDto {
    pub upper_layer_link_id: u64,
    pub lower_layer_demand_id: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LayerCouplingMulticastDemandDto {
    pub upper_layer_link_ids: Vec<u64>,
    pub lower_layer_demand_id: u64,
}
