use std::collections::BTreeSet;

use network_design_kernel::domain::utils::id::{LayerId, NodeId};
use network_design_kernel::error::Error;
use network_design_kernel::NetworkPlan;

/// IP over WDM over fiber, all three layers sharing the nodes A, B and C.
struct Stack {
    plan: NetworkPlan,
    ip: LayerId,
    wdm: LayerId,
    fiber: LayerId,
    nodes: [NodeId; 3],
}

fn stack() -> Stack {
    let mut plan = NetworkPlan::new();
    let ip = plan.default_layer();
    let wdm = plan.add_layer("WDM", "lightpaths", "Gbps", "Gbps").unwrap();
    let fiber = plan.add_layer("FIBER", "fiber plant", "Gbps", "Gbps").unwrap();
    let a = plan.add_node(0.0, 0.0, "A").unwrap();
    let b = plan.add_node(1.0, 0.0, "B").unwrap();
    let c = plan.add_node(2.0, 0.0, "C").unwrap();
    Stack { plan, ip, wdm, fiber, nodes: [a, b, c] }
}

#[test]
fn test_capacity_follows_lower_layers() {
    let mut s = stack();
    let [a, b, _] = s.nodes;
    let cable = s.plan.add_link_with_default_speed(a, b, s.fiber, 400.0, 80.0).unwrap();
    let wavelength = s.plan.add_demand(a, b, 100.0, s.fiber).unwrap();
    s.plan.add_route_over_links(wavelength, 100.0, 100.0, &[cable]).unwrap();
    let lightpath = s.plan.add_link_with_default_speed(a, b, s.wdm, 0.0, 80.0).unwrap();
    s.plan.couple_demand_to_link(wavelength, lightpath).unwrap();
    let circuit = s.plan.add_demand(a, b, 60.0, s.wdm).unwrap();
    s.plan.add_route_over_links(circuit, 40.0, 40.0, &[lightpath]).unwrap();
    let ip_link = s.plan.add_link_with_default_speed(a, b, s.ip, 0.0, 80.0).unwrap();
    s.plan.couple_demand_to_link(circuit, ip_link).unwrap();

    assert_eq!(s.plan.link_capacity(lightpath).unwrap(), 100.0);
    assert_eq!(s.plan.link_capacity(ip_link).unwrap(), 40.0);

    s.plan.set_link_failure_state(cable, false).unwrap();

    assert_eq!(s.plan.link_capacity(lightpath).unwrap(), 0.0);
    assert_eq!(s.plan.link_capacity(ip_link).unwrap(), 0.0);
    assert!(!s.plan.is_link_operational(ip_link).unwrap());
    assert!(s.plan.layer_depends_on(s.ip, s.fiber));
}

#[test]
fn test_coupling_cycle_is_rejected() {
    let mut s = stack();
    let [a, b, _] = s.nodes;
    let wdm_demand = s.plan.add_demand(a, b, 10.0, s.wdm).unwrap();
    let ip_link = s.plan.add_link_with_default_speed(a, b, s.ip, 0.0, 1.0).unwrap();
    s.plan.couple_demand_to_link(wdm_demand, ip_link).unwrap();

    let ip_demand = s.plan.add_demand(a, b, 10.0, s.ip).unwrap();
    let wdm_link = s.plan.add_link_with_default_speed(a, b, s.wdm, 0.0, 1.0).unwrap();

    assert!(matches!(s.plan.couple_demand_to_link(ip_demand, wdm_link), Err(Error::InvalidLayer(_))));
    assert!(s.plan.link(wdm_link).unwrap().coupling.is_none());
    assert_eq!(s.plan.layer_coupling_edges(), BTreeSet::from([(s.ip, s.wdm)]));
}

#[test]
fn test_coupling_requires_matching_end_nodes() {
    let mut s = stack();
    let [a, b, c] = s.nodes;
    let demand = s.plan.add_demand(a, c, 10.0, s.wdm).unwrap();
    let link = s.plan.add_link_with_default_speed(a, b, s.ip, 0.0, 1.0).unwrap();

    assert!(matches!(s.plan.couple_demand_to_link(demand, link), Err(Error::InvalidReference(_))));
}

#[test]
fn test_decoupling_freezes_capacity() {
    let mut s = stack();
    let [a, b, _] = s.nodes;
    let lightpath = s.plan.add_link_with_default_speed(a, b, s.wdm, 100.0, 10.0).unwrap();
    let circuit = s.plan.add_demand(a, b, 30.0, s.wdm).unwrap();
    s.plan.add_route_over_links(circuit, 30.0, 30.0, &[lightpath]).unwrap();
    let ip_link = s.plan.add_link_with_default_speed(a, b, s.ip, 5.0, 10.0).unwrap();
    s.plan.couple_demand_to_link(circuit, ip_link).unwrap();

    s.plan.decouple_demand(circuit).unwrap();

    assert!(!s.plan.link(ip_link).unwrap().is_coupled());
    assert!(!s.plan.demand(circuit).unwrap().is_coupled());
    assert_eq!(s.plan.link_capacity(ip_link).unwrap(), 30.0);
    assert!(matches!(s.plan.decouple_link(ip_link), Err(Error::InvalidValue(_))));
}

#[test]
fn test_removing_coupled_demand_freezes_upper_link() {
    let mut s = stack();
    let [a, b, _] = s.nodes;
    let lightpath = s.plan.add_link_with_default_speed(a, b, s.wdm, 100.0, 10.0).unwrap();
    let circuit = s.plan.add_demand(a, b, 30.0, s.wdm).unwrap();
    s.plan.add_route_over_links(circuit, 25.0, 25.0, &[lightpath]).unwrap();
    let ip_link = s.plan.add_link_with_default_speed(a, b, s.ip, 0.0, 10.0).unwrap();
    s.plan.couple_demand_to_link(circuit, ip_link).unwrap();

    s.plan.remove_demand(circuit).unwrap();

    assert!(s.plan.link(ip_link).unwrap().coupling.is_none());
    assert_eq!(s.plan.link_capacity(ip_link).unwrap(), 25.0);
    s.plan.check_caches_consistency().unwrap();
}

#[test]
fn test_multicast_coupling_tracks_reached_destinations() {
    let mut s = stack();
    let [a, b, c] = s.nodes;
    let ab = s.plan.add_link_with_default_speed(a, b, s.wdm, 100.0, 10.0).unwrap();
    let bc = s.plan.add_link_with_default_speed(b, c, s.wdm, 100.0, 10.0).unwrap();
    let broadcast = s.plan.add_multicast_demand(a, BTreeSet::from([b, c]), 10.0, s.wdm).unwrap();
    let tree = s.plan.add_multicast_tree(broadcast, 10.0, 10.0, BTreeSet::from([ab, bc])).unwrap();
    let to_b = s.plan.add_link_with_default_speed(a, b, s.ip, 0.0, 10.0).unwrap();
    let to_c = s.plan.add_link_with_default_speed(a, c, s.ip, 0.0, 20.0).unwrap();

    s.plan.couple_multicast_demand_to_links(broadcast, &BTreeSet::from([to_b, to_c])).unwrap();

    assert_eq!(s.plan.link_capacity(to_b).unwrap(), 10.0);
    assert_eq!(s.plan.link_capacity(to_c).unwrap(), 10.0);

    s.plan.set_multicast_tree_links(tree, BTreeSet::from([ab])).unwrap();
    assert_eq!(s.plan.link_capacity(to_b).unwrap(), 10.0);
    assert_eq!(s.plan.link_capacity(to_c).unwrap(), 0.0);

    s.plan.decouple_link(to_b).unwrap();
    assert!(!s.plan.multicast_demand(broadcast).unwrap().is_coupled());
    assert!(s.plan.link(to_c).unwrap().coupling.is_none());
}

#[test]
fn test_multicast_coupling_needs_link_per_egress() {
    let mut s = stack();
    let [a, b, c] = s.nodes;
    let broadcast = s.plan.add_multicast_demand(a, BTreeSet::from([b, c]), 10.0, s.wdm).unwrap();
    let to_b = s.plan.add_link_with_default_speed(a, b, s.ip, 0.0, 10.0).unwrap();

    let result = s.plan.couple_multicast_demand_to_links(broadcast, &BTreeSet::from([to_b]));

    assert!(matches!(result, Err(Error::InvalidReference(_))));
    assert!(s.plan.link(to_b).unwrap().coupling.is_none());
}
