use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Value, json};

use network_design_kernel::domain::network::ElementRef;
use network_design_kernel::domain::utils::id::{LayerId, LinkId, MulticastTreeId, ResourceId, RouteId};
use network_design_kernel::error::Error;
use network_design_kernel::{NetworkPlan, PathElement, RoutingType};

fn reload(plan: &NetworkPlan) -> NetworkPlan {
    NetworkPlan::from_json_str(&plan.to_json_string().unwrap()).unwrap()
}

fn assert_round_trip(plan: &NetworkPlan) -> NetworkPlan {
    let reloaded = reload(plan);
    assert_eq!(reloaded.to_dto(), plan.to_dto());
    reloaded
}

/// IP over WDM plus a hop-by-hop MPLS layer, with a rerouted lightpath, a partially failed
/// multicast tree, couplings in both flavours and an SRG.
fn multilayer_plan() -> (NetworkPlan, LinkId, RouteId, MulticastTreeId) {
    let mut plan = NetworkPlan::new();
    plan.set_name("backbone");
    plan.set_attribute(ElementRef::Network, "owner", "planning").unwrap();
    let ip = plan.default_layer();
    plan.set_layer_name(ip, "IP").unwrap();
    let wdm = plan.add_layer("WDM", "optical", "Gbps", "Gbps").unwrap();

    let a = plan.add_node(0.0, 0.0, "A").unwrap();
    let b = plan.add_node(1.0, 0.0, "B").unwrap();
    let c = plan.add_node(2.0, 0.0, "C").unwrap();
    plan.set_attribute(ElementRef::Node(b), "site", "pop-2").unwrap();

    let ab = plan.add_link_with_default_speed(a, b, wdm, 400.0, 50.0).unwrap();
    let bc = plan.add_link_with_default_speed(b, c, wdm, 400.0, 70.0).unwrap();
    let ac = plan.add_link_with_default_speed(a, c, wdm, 400.0, 150.0).unwrap();
    let lightpath = plan.add_demand(a, c, 100.0, wdm).unwrap();
    let route = plan.add_route_over_links(lightpath, 100.0, 100.0, &[ab, bc]).unwrap();
    let segment = plan.add_protection_segment(wdm, vec![ac], 100.0).unwrap();
    plan.add_protection_segment_to_route(route, segment).unwrap();
    plan.set_link_failure_state(bc, false).unwrap();
    plan.set_current_path(route, vec![PathElement::ProtectionSegment(segment)], BTreeMap::new()).unwrap();

    let broadcast = plan.add_multicast_demand(a, BTreeSet::from([b, c]), 20.0, wdm).unwrap();
    let tree = plan.add_multicast_tree(broadcast, 20.0, 20.0, BTreeSet::from([ab, bc])).unwrap();
    plan.set_multicast_tree_links(tree, BTreeSet::from([ab])).unwrap();

    let ip_ac = plan.add_link_with_default_speed(a, c, ip, 0.0, 150.0).unwrap();
    plan.couple_demand_to_link(lightpath, ip_ac).unwrap();
    let ip_ab = plan.add_link_with_default_speed(a, b, ip, 0.0, 50.0).unwrap();
    let ip_ac_multicast = plan.add_link_with_default_speed(a, c, ip, 0.0, 150.0).unwrap();
    plan.couple_multicast_demand_to_links(broadcast, &BTreeSet::from([ip_ab, ip_ac_multicast])).unwrap();

    let mpls = plan.add_layer("MPLS", "", "Gbps", "Gbps").unwrap();
    plan.set_routing_type(mpls, RoutingType::HopByHop).unwrap();
    let tunnel = plan.add_link_with_default_speed(a, b, mpls, 10.0, 50.0).unwrap();
    let flow = plan.add_demand(a, b, 4.0, mpls).unwrap();
    plan.set_forwarding_rule(flow, tunnel, 0.75).unwrap();

    let srg = plan.add_srg(8760.0, 24.0).unwrap();
    plan.add_node_to_srg(srg, b).unwrap();
    plan.add_link_to_srg(srg, ac).unwrap();

    (plan, ip_ac, route, tree)
}

#[test]
fn test_empty_plan_round_trip() {
    let plan = NetworkPlan::new();

    let reloaded = assert_round_trip(&plan);

    assert_eq!(reloaded.number_of_layers(), 1);
    assert_eq!(reloaded.default_layer(), plan.default_layer());
    assert_eq!(reloaded.next_element_id(), plan.next_element_id());
}

#[test]
fn test_single_route_round_trip() {
    let mut plan = NetworkPlan::new();
    let layer = plan.default_layer();
    let a = plan.add_node(0.0, 0.0, "A").unwrap();
    let b = plan.add_node(1.0, 0.0, "B").unwrap();
    let c = plan.add_node(2.0, 0.0, "C").unwrap();
    let ab = plan.add_link_with_default_speed(a, b, layer, 10.0, 1.0).unwrap();
    let bc = plan.add_link_with_default_speed(b, c, layer, 10.0, 1.0).unwrap();
    let demand = plan.add_demand(a, c, 7.0, layer).unwrap();
    plan.add_route_over_links(demand, 7.0, 7.0, &[ab, bc]).unwrap();

    let reloaded = assert_round_trip(&plan);

    assert_eq!(reloaded.demand_carried_traffic(demand).unwrap(), 7.0);
    assert_eq!(reloaded.link_carried_traffic(bc).unwrap(), 7.0);
}

#[test]
fn test_hop_by_hop_round_trip() {
    let mut plan = NetworkPlan::new();
    let layer = plan.default_layer();
    plan.set_routing_type(layer, RoutingType::HopByHop).unwrap();
    let a = plan.add_node(0.0, 0.0, "A").unwrap();
    let b = plan.add_node(1.0, 0.0, "B").unwrap();
    let c = plan.add_node(2.0, 0.0, "C").unwrap();
    let ab = plan.add_link_with_default_speed(a, b, layer, 10.0, 1.0).unwrap();
    let bc = plan.add_link_with_default_speed(b, c, layer, 10.0, 1.0).unwrap();
    let demand = plan.add_demand(a, c, 3.0, layer).unwrap();
    plan.set_forwarding_rule(demand, ab, 1.0).unwrap();
    plan.set_forwarding_rule(demand, bc, 1.0).unwrap();

    let reloaded = assert_round_trip(&plan);

    assert_eq!(reloaded.layer(layer).unwrap().routing_type, RoutingType::HopByHop);
    assert_eq!(reloaded.forwarding_rules(layer).unwrap(), vec![(demand, ab, 1.0), (demand, bc, 1.0)]);
    assert_eq!(reloaded.demand_carried_traffic(demand).unwrap(), 3.0);
}

#[test]
fn test_multilayer_plan_round_trip() {
    let (plan, ip_ac, route, tree) = multilayer_plan();

    let reloaded = assert_round_trip(&plan);

    assert_eq!(reloaded.name(), "backbone");
    assert_eq!(reloaded.attribute(ElementRef::Network, "owner"), Some("planning"));
    assert_eq!(reloaded.link_capacity(ip_ac).unwrap(), 100.0);
    assert!(reloaded.route(route).unwrap().is_rerouted());
    assert_eq!(reloaded.multicast_tree(tree).unwrap().current_links.len(), 1);
    assert_eq!(reloaded.layer_coupling_edges(), plan.layer_coupling_edges());
    reloaded.check_caches_consistency().unwrap();
}

#[test]
fn test_new_ids_continue_after_reload() {
    let (plan, ..) = multilayer_plan();
    let mut reloaded = reload(&plan);

    let node = reloaded.add_node(5.0, 5.0, "late").unwrap();

    assert_eq!(node.raw(), plan.next_element_id());
}

#[test]
fn test_service_chain_round_trip() {
    let mut plan = NetworkPlan::new();
    let layer = plan.default_layer();
    let n1 = plan.add_node(0.0, 0.0, "n1").unwrap();
    let n2 = plan.add_node(1.0, 0.0, "n2").unwrap();
    let n3 = plan.add_node(0.0, 1.0, "n3").unwrap();
    let l12 = plan.add_link_with_default_speed(n1, n2, layer, 10.0, 1.0).unwrap();
    let l21 = plan.add_link_with_default_speed(n2, n1, layer, 10.0, 1.0).unwrap();
    let l13 = plan.add_link_with_default_speed(n1, n3, layer, 10.0, 1.0).unwrap();
    let cpu = plan.add_resource(n1, "CPU", "cpu", 10.0, "cores", BTreeMap::new(), 0.0).unwrap();
    let vnf = plan.add_resource(n1, "VNF", "vnf", 5.0, "sessions", BTreeMap::from([(cpu, 2.0)]), 1.5).unwrap();
    let demand = plan.add_service_chain_demand(n1, n3, 3.0, layer, vec!["CPU".into(), "VNF".into()]).unwrap();
    let path = vec![
        PathElement::Resource(cpu),
        PathElement::Link(l12),
        PathElement::Link(l21),
        PathElement::Resource(vnf),
        PathElement::Link(l13),
    ];
    plan.add_route(demand, 3.0, 3.0, path.clone(), BTreeMap::from([(cpu, 1.0), (vnf, 1.0)])).unwrap();

    let reloaded = assert_round_trip(&plan);

    let routes = reloaded.routes(layer).unwrap();
    assert_eq!(routes[0].current_path, path);
    assert_eq!(reloaded.resource_occupied_capacity(cpu).unwrap(), 3.0);
    assert_eq!(reloaded.upper_resources(cpu).unwrap(), vec![vnf]);
}

#[test]
fn test_resource_indices_survive_late_base_dependency() {
    let mut plan = NetworkPlan::new();
    let host = plan.add_node(0.0, 0.0, "dc").unwrap();
    let vm = plan.add_resource(host, "VM", "vm", 4.0, "units", BTreeMap::new(), 0.0).unwrap();
    let cpu = plan.add_resource(host, "CPU", "cpu", 16.0, "cores", BTreeMap::new(), 0.0).unwrap();
    plan.set_resource_capacity(vm, 4.0, BTreeMap::from([(cpu, 2.0)])).unwrap();

    let reloaded = assert_round_trip(&plan);

    assert_eq!(reloaded.resource(vm).unwrap().index, 0);
    assert_eq!(reloaded.resource(cpu).unwrap().index, 1);
    assert_eq!(reloaded.resource_occupied_capacity(cpu).unwrap(), 2.0);
    reloaded.check_caches_consistency().unwrap();
}

#[test]
fn test_file_round_trip() {
    let (plan, ..) = multilayer_plan();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("backbone.json");

    plan.save_to_file(&path).unwrap();
    let reloaded = NetworkPlan::load_from_file(&path).unwrap();

    assert_eq!(reloaded.to_dto(), plan.to_dto());
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();

    let result = NetworkPlan::load_from_file(dir.path().join("absent.json"));

    assert!(matches!(result, Err(Error::IoError(_))));
}

/// A document written by an older tool: no current sequences, no `isUp` on most elements,
/// trees without the `IfNotFailing` fields and a negative occupied capacity.
fn legacy_document() -> Value {
    json!({
        "version": 5,
        "network": {
            "name": "legacy",
            "nextElementId": 20,
            "layers": [{
                "id": 1,
                "name": "IP",
                "isDefaultLayer": true,
                "links": [{
                    "id": 10, "originNodeId": 2, "destinationNodeId": 3,
                    "capacity": 50.0, "lengthInKm": 10.0, "propagationSpeedInKmPerSecond": 200000.0
                }],
                "demands": [{ "id": 11, "ingressNodeId": 2, "egressNodeId": 3, "offeredTraffic": 5.0 }],
                "multicastDemands": [{ "id": 13, "ingressNodeId": 2, "egressNodeIds": [3], "offeredTraffic": 4.0 }],
                "multicastTrees": [{
                    "id": 14, "demandId": 13, "carriedTraffic": 4.0, "occupiedCapacity": 4.5, "linkIds": [10]
                }],
                "sourceRouting": {
                    "routes": [{
                        "id": 12, "demandId": 11,
                        "carriedTrafficIfNotFailing": 5.0, "occupiedLinkCapacityIfNotFailing": -1.0,
                        "initialSeqLinksAndResources": [10]
                    }]
                }
            }],
            "nodes": [
                { "id": 2, "xCoord": 0.0, "yCoord": 0.0, "name": "A" },
                { "id": 3, "xCoord": 1.0, "yCoord": 0.0, "name": "B", "isUp": false }
            ]
        }
    })
}

fn load(document: &Value) -> Result<NetworkPlan, Error> {
    NetworkPlan::from_json_str(&document.to_string())
}

#[test]
fn test_legacy_document_defaults() {
    let plan = load(&legacy_document()).unwrap();

    assert_eq!(plan.default_layer(), LayerId::new(1));
    assert!(plan.layer(LayerId::new(0)).is_err());
    assert_eq!(plan.number_of_layers(), 1);
    assert!(plan.node_by_name("A").unwrap().is_up);
    assert!(!plan.node_by_name("B").unwrap().is_up);
    assert!(plan.link(LinkId::new(10)).unwrap().is_up);

    let route = plan.route(RouteId::new(12)).unwrap();
    assert_eq!(route.current_path, route.initial_path);
    assert_eq!(route.occupied_capacity_if_not_failing, 5.0);

    let tree = plan.multicast_tree(MulticastTreeId::new(14)).unwrap();
    assert_eq!(tree.carried_traffic_if_not_failing, 4.0);
    assert_eq!(tree.occupied_capacity_if_not_failing, 4.5);
    assert_eq!(tree.current_links, tree.initial_links);
    assert_eq!(plan.next_element_id(), 20);
}

#[test]
fn test_first_layer_reuses_initial_layer_with_same_id() {
    let mut document = legacy_document();
    document["network"]["layers"][0]["id"] = json!(0);

    let plan = load(&document).unwrap();

    assert_eq!(plan.default_layer(), LayerId::new(0));
    assert_eq!(plan.layer(LayerId::new(0)).unwrap().name, "IP");
    assert_eq!(plan.number_of_layers(), 1);
}

#[test]
fn test_newer_version_is_rejected() {
    let mut document = legacy_document();
    document["version"] = json!(6);

    assert!(matches!(load(&document), Err(Error::CorruptState { .. })));
}

#[test]
fn test_missing_version_reads_as_current() {
    let mut document = legacy_document();
    document.as_object_mut().unwrap().remove("version");

    assert!(load(&document).is_ok());
}

#[test]
fn test_next_element_id_must_exceed_all_ids() {
    let mut document = legacy_document();
    document["network"]["nextElementId"] = json!(14);
    assert!(matches!(load(&document), Err(Error::CorruptState { element: Some(14), .. })));

    document["network"]["nextElementId"] = json!(0);
    assert!(matches!(load(&document), Err(Error::CorruptState { .. })));
}

#[test]
fn test_two_default_layers_are_rejected() {
    let mut document = legacy_document();
    document["network"]["layers"].as_array_mut().unwrap().push(json!({ "id": 15, "isDefaultLayer": true }));

    assert!(matches!(load(&document), Err(Error::CorruptState { .. })));
}

#[test]
fn test_layer_with_both_routing_blocks_is_rejected() {
    let mut document = legacy_document();
    document["network"]["layers"][0]["hopByHopRouting"] = json!({ "forwardingRules": [] });

    assert!(matches!(load(&document), Err(Error::CorruptState { .. })));
}

#[test]
fn test_resource_cycle_in_document() {
    let mut document = legacy_document();
    document["network"]["resources"] = json!([
        { "id": 15, "hostNodeId": 2, "type": "CPU", "capacity": 1.0, "baseResources": [{ "id": 16, "occupiedCapacity": 1.0 }] },
        { "id": 16, "hostNodeId": 2, "type": "RAM", "capacity": 1.0, "baseResources": [{ "id": 15, "occupiedCapacity": 1.0 }] }
    ]);

    assert!(matches!(load(&document), Err(Error::CyclicResourceDependency(id)) if id == ResourceId::new(15)));
}

#[test]
fn test_dangling_reference_is_rejected() {
    let mut document = legacy_document();
    document["network"]["layers"][0]["links"][0]["destinationNodeId"] = json!(7);

    assert!(matches!(load(&document), Err(Error::InvalidReference(_))));
}

#[test]
fn test_malformed_json_is_corrupt_state() {
    let result = NetworkPlan::from_json_str("{ \"network\": ");

    assert!(matches!(result, Err(Error::CorruptState { .. })));
}

fn written_document(plan: &NetworkPlan) -> Value {
    serde_json::from_str(&plan.to_json_string().unwrap()).unwrap()
}

fn move_element(document: &mut Value, from: &str, to: &str) {
    let element = document.pointer_mut(from).unwrap().as_array_mut().unwrap().remove(0);
    document.pointer_mut(to).unwrap().as_array_mut().unwrap().push(element);
}

#[test]
fn test_route_listed_under_foreign_layer_is_rejected() {
    let (plan, _, route, _) = multilayer_plan();
    let mut document = written_document(&plan);
    move_element(&mut document, "/network/layers/1/sourceRouting/routes", "/network/layers/0/sourceRouting/routes");

    let result = load(&document);

    assert!(matches!(result, Err(Error::CorruptState { element: Some(id), .. }) if id == route.raw()));
}

#[test]
fn test_multicast_tree_listed_under_foreign_layer_is_rejected() {
    let (plan, _, _, tree) = multilayer_plan();
    let mut document = written_document(&plan);
    move_element(&mut document, "/network/layers/1/multicastTrees", "/network/layers/0/multicastTrees");

    let result = load(&document);

    assert!(matches!(result, Err(Error::CorruptState { element: Some(id), .. }) if id == tree.raw()));
}

#[test]
fn test_forwarding_rule_listed_under_foreign_layer_is_rejected() {
    let (plan, ..) = multilayer_plan();
    let mut document = written_document(&plan);
    let ip = document["network"]["layers"][0].as_object_mut().unwrap();
    ip.remove("sourceRouting");
    ip.insert("hopByHopRouting".into(), json!({ "forwardingRules": [] }));
    move_element(&mut document, "/network/layers/2/hopByHopRouting/forwardingRules", "/network/layers/0/hopByHopRouting/forwardingRules");

    let result = load(&document);

    assert!(matches!(result, Err(Error::CorruptState { .. })));
}

#[test]
fn test_document_without_layers_is_rejected() {
    let mut document = legacy_document();
    document["network"]["layers"] = json!([]);
    document["network"]["nodes"][0]["id"] = json!(0);

    assert!(matches!(load(&document), Err(Error::CorruptState { .. })));
}
