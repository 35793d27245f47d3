use std::collections::BTreeMap;

use network_design_kernel::domain::network::forwarding::RoutingCycleType;
use network_design_kernel::domain::utils::id::{DemandId, LinkId, NodeId, ResourceId};
use network_design_kernel::error::Error;
use network_design_kernel::{NetworkPlan, PathElement, RoutingType};

struct Line {
    plan: NetworkPlan,
    nodes: Vec<NodeId>,
    links: Vec<LinkId>,
}

/// N0 -> N1 -> N2 with capacity 10 and a 200 km hop length.
fn line() -> Line {
    let mut plan = NetworkPlan::new();
    let layer = plan.default_layer();
    let nodes: Vec<NodeId> = (0..3).map(|i| plan.add_node(i as f64, 0.0, format!("N{}", i)).unwrap()).collect();
    let links = vec![
        plan.add_link(nodes[0], nodes[1], layer, 10.0, 200.0, 200000.0).unwrap(),
        plan.add_link(nodes[1], nodes[2], layer, 10.0, 200.0, 200000.0).unwrap(),
    ];
    Line { plan, nodes, links }
}

fn firewall_chain(line: &mut Line, capacity: f64) -> (DemandId, ResourceId) {
    let layer = line.plan.default_layer();
    let firewall = line.plan.add_resource(line.nodes[1], "FW", "firewall", capacity, "units", BTreeMap::new(), 0.5).unwrap();
    let demand = line.plan.add_service_chain_demand(line.nodes[0], line.nodes[2], 5.0, layer, vec!["FW".to_string()]).unwrap();
    (demand, firewall)
}

#[test]
fn test_route_traffic_and_link_utilization() {
    let mut line = line();
    let layer = line.plan.default_layer();
    let demand = line.plan.add_demand(line.nodes[0], line.nodes[2], 8.0, layer).unwrap();

    let route = line.plan.add_route_over_links(demand, 6.0, 5.0, &line.links).unwrap();

    assert_eq!(line.plan.demand_carried_traffic(demand).unwrap(), 6.0);
    assert_eq!(line.plan.demand_blocked_traffic(demand).unwrap(), 2.0);
    assert_eq!(line.plan.link_carried_traffic(line.links[0]).unwrap(), 6.0);
    assert_eq!(line.plan.link_occupied_capacity(line.links[1]).unwrap(), 5.0);
    assert!((line.plan.link_utilization(line.links[1]).unwrap() - 0.5).abs() < 1e-12);
    assert_eq!(line.plan.route_node_sequence(route).unwrap(), line.nodes);
    assert!((line.plan.route_propagation_delay_ms(route).unwrap() - 2.0).abs() < 1e-9);
    assert_eq!(line.plan.demand_routing_cycle_type(demand).unwrap(), RoutingCycleType::Loopless);
}

#[test]
fn test_service_chain_route() {
    let mut line = line();
    let (demand, firewall) = firewall_chain(&mut line, 10.0);
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(firewall), PathElement::Link(line.links[1])];

    let route = line.plan.add_route(demand, 5.0, 5.0, path, BTreeMap::from([(firewall, 4.0)])).unwrap();

    assert_eq!(line.plan.resource_occupied_capacity(firewall).unwrap(), 4.0);
    assert_eq!(line.plan.routes_traversing_resource(firewall).unwrap(), vec![route]);
    assert!((line.plan.route_propagation_delay_ms(route).unwrap() - 2.5).abs() < 1e-9);
}

#[test]
fn test_service_chain_must_match_types() {
    let mut line = line();
    let (demand, _) = firewall_chain(&mut line, 10.0);
    let layer = line.plan.default_layer();

    assert!(matches!(line.plan.add_route_over_links(demand, 5.0, 5.0, &line.links.clone()), Err(Error::InvalidValue(_))));

    let plain = line.plan.add_demand(line.nodes[0], line.nodes[2], 1.0, layer).unwrap();
    let cache = line.plan.add_resource(line.nodes[1], "CACHE", "cache", 10.0, "GB", BTreeMap::new(), 0.0).unwrap();
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(cache), PathElement::Link(line.links[1])];
    assert!(matches!(line.plan.add_route(plain, 1.0, 1.0, path, BTreeMap::new()), Err(Error::InvalidValue(_))));
}

#[test]
fn test_resource_must_sit_at_joining_node() {
    let mut line = line();
    let (demand, _) = firewall_chain(&mut line, 10.0);
    let elsewhere = line.plan.add_resource(line.nodes[2], "FW", "remote firewall", 10.0, "units", BTreeMap::new(), 0.0).unwrap();
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(elsewhere), PathElement::Link(line.links[1])];

    assert!(matches!(line.plan.add_route(demand, 5.0, 5.0, path, BTreeMap::new()), Err(Error::InvalidReference(_))));
}

#[test]
fn test_route_admission_respects_resource_capacity() {
    let mut line = line();
    let (demand, firewall) = firewall_chain(&mut line, 3.0);
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(firewall), PathElement::Link(line.links[1])];

    let result = line.plan.add_route(demand, 5.0, 5.0, path, BTreeMap::from([(firewall, 4.0)]));

    match result {
        Err(Error::CapacityExceeded { resource, requested, .. }) => {
            assert_eq!(resource, firewall);
            assert_eq!(requested, 4.0);
        }
        other => panic!("expected CapacityExceeded, got {:?}", other),
    }
    assert!(line.plan.demand_routes(demand).unwrap().is_empty());
}

#[test]
fn test_set_current_path_over_capacity_keeps_previous_path() {
    let mut line = line();
    let (demand, firewall) = firewall_chain(&mut line, 10.0);
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(firewall), PathElement::Link(line.links[1])];
    let route = line.plan.add_route(demand, 5.0, 5.0, path.clone(), BTreeMap::from([(firewall, 4.0)])).unwrap();

    let result = line.plan.set_current_path(route, path.clone(), BTreeMap::from([(firewall, 12.0)]));

    assert!(matches!(result, Err(Error::CapacityExceeded { resource, .. }) if resource == firewall));
    let stored = line.plan.route(route).unwrap();
    assert_eq!(stored.current_path, path);
    assert_eq!(stored.current_resource_occupation[&firewall], 4.0);

    // Releasing its own occupation lets the route grow up to the full capacity.
    line.plan.set_current_path(route, path, BTreeMap::from([(firewall, 10.0)])).unwrap();
    assert_eq!(line.plan.resource_occupied_capacity(firewall).unwrap(), 10.0);
}

#[test]
fn test_routing_type_switch_is_destructive() {
    let mut line = line();
    let layer = line.plan.default_layer();
    let demand = line.plan.add_demand(line.nodes[0], line.nodes[2], 8.0, layer).unwrap();
    line.plan.add_route_over_links(demand, 8.0, 8.0, &line.links.clone()).unwrap();
    line.plan.add_protection_segment(layer, vec![line.links[1]], 2.0).unwrap();

    line.plan.set_routing_type(layer, RoutingType::HopByHop).unwrap();
    line.plan.set_routing_type(layer, RoutingType::SourceRouting).unwrap();

    let layer_ref = line.plan.layer(layer).unwrap();
    assert_eq!(layer_ref.number_of_routes(), 0);
    assert_eq!(layer_ref.number_of_protection_segments(), 0);
    assert_eq!(line.plan.demand_carried_traffic(demand).unwrap(), 0.0);
    assert!(line.plan.demand_routes(demand).unwrap().is_empty());
}

#[test]
fn test_routes_rejected_in_hop_by_hop_layer() {
    let mut line = line();
    let layer = line.plan.default_layer();
    let demand = line.plan.add_demand(line.nodes[0], line.nodes[2], 8.0, layer).unwrap();
    line.plan.set_routing_type(layer, RoutingType::HopByHop).unwrap();

    assert!(matches!(line.plan.add_route_over_links(demand, 8.0, 8.0, &line.links.clone()), Err(Error::InvalidLayer(_))));
}

#[test]
fn test_removing_link_removes_routes_over_it() {
    let mut line = line();
    let layer = line.plan.default_layer();
    let demand = line.plan.add_demand(line.nodes[0], line.nodes[2], 8.0, layer).unwrap();
    let route = line.plan.add_route_over_links(demand, 8.0, 8.0, &line.links.clone()).unwrap();

    line.plan.remove_link(line.links[1]).unwrap();

    assert!(line.plan.route(route).is_err());
    assert!(line.plan.demand(demand).is_ok());
    assert_eq!(line.plan.demand_carried_traffic(demand).unwrap(), 0.0);
}

#[test]
fn test_removing_resource_removes_routes_through_it() {
    let mut line = line();
    let (demand, firewall) = firewall_chain(&mut line, 10.0);
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(firewall), PathElement::Link(line.links[1])];
    let route = line.plan.add_route(demand, 5.0, 5.0, path, BTreeMap::new()).unwrap();

    line.plan.remove_resource(firewall).unwrap();

    assert!(line.plan.route(route).is_err());
    line.plan.check_caches_consistency().unwrap();
}

#[test]
fn test_resource_failure_downs_route() {
    let mut line = line();
    let (demand, firewall) = firewall_chain(&mut line, 10.0);
    let path = vec![PathElement::Link(line.links[0]), PathElement::Resource(firewall), PathElement::Link(line.links[1])];
    let route = line.plan.add_route(demand, 5.0, 5.0, path, BTreeMap::from([(firewall, 1.0)])).unwrap();

    line.plan.set_resource_capacity(firewall, 1.0, BTreeMap::new()).unwrap();
    assert_eq!(line.plan.route_carried_traffic(route).unwrap(), 5.0);

    line.plan.set_node_failure_state(line.nodes[1], false).unwrap();
    assert_eq!(line.plan.route_carried_traffic(route).unwrap(), 0.0);
    assert!(line.plan.is_route_down(route).unwrap());
}
