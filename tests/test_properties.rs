use proptest::prelude::*;

use network_design_kernel::domain::utils::config::PRECISION_FACTOR;
use network_design_kernel::{NetworkPlan, RoutingType};

#[derive(Debug, Clone)]
enum Op {
    AddNode,
    AddLink(usize, usize),
    RemoveNode(usize),
    RemoveLink(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::AddNode),
        4 => (any::<usize>(), any::<usize>()).prop_map(|(a, b)| Op::AddLink(a, b)),
        1 => any::<usize>().prop_map(Op::RemoveNode),
        2 => any::<usize>().prop_map(Op::RemoveLink),
    ]
}

proptest! {
    #[test]
    fn ids_grow_and_indices_stay_compact(ops in prop::collection::vec(op(), 1..60)) {
        let mut plan = NetworkPlan::new();
        let layer = plan.default_layer();
        let mut last_id = plan.next_element_id();

        for op in ops {
            let nodes = plan.node_ids();
            let links = plan.link_ids(layer).unwrap();
            let created = match op {
                Op::AddNode => Some(plan.add_node(0.0, 0.0, "n").unwrap().raw()),
                Op::AddLink(a, b) if nodes.len() >= 2 => {
                    let origin = nodes[a % nodes.len()];
                    let destination = nodes[b % nodes.len()];
                    if origin == destination {
                        None
                    } else {
                        Some(plan.add_link_with_default_speed(origin, destination, layer, 1.0, 1.0).unwrap().raw())
                    }
                }
                Op::RemoveNode(i) if !nodes.is_empty() => {
                    plan.remove_node(nodes[i % nodes.len()]).unwrap();
                    None
                }
                Op::RemoveLink(i) if !links.is_empty() => {
                    plan.remove_link(links[i % links.len()]).unwrap();
                    None
                }
                _ => None,
            };

            if let Some(id) = created {
                prop_assert!(id >= last_id);
                last_id = id + 1;
            }
            prop_assert_eq!(plan.next_element_id(), last_id);
        }

        let node_indices: Vec<usize> = plan.nodes().map(|n| n.index).collect();
        prop_assert_eq!(node_indices, (0..plan.number_of_nodes()).collect::<Vec<_>>());
        let link_indices: Vec<usize> = plan.links(layer).unwrap().iter().map(|l| l.index).collect();
        prop_assert_eq!(link_indices.len(), plan.layer(layer).unwrap().number_of_links());
        prop_assert_eq!(link_indices, (0..plan.layer(layer).unwrap().number_of_links()).collect::<Vec<_>>());
        prop_assert!(plan.check_caches_consistency().is_ok());
    }

    #[test]
    fn accepted_splitting_ratios_never_exceed_one(ratios in prop::collection::vec(0.0f64..=1.0, 1..6)) {
        let mut plan = NetworkPlan::new();
        let layer = plan.default_layer();
        plan.set_routing_type(layer, RoutingType::HopByHop).unwrap();
        let origin = plan.add_node(0.0, 0.0, "origin").unwrap();
        let sink = plan.add_node(1.0, 0.0, "sink").unwrap();
        let demand = plan.add_demand(origin, sink, 1.0, layer).unwrap();

        for ratio in ratios {
            let link = plan.add_link_with_default_speed(origin, sink, layer, 1.0, 1.0).unwrap();
            let accepted = plan.set_forwarding_rule(demand, link, ratio).is_ok();
            let total: f64 = plan.forwarding_rules(layer).unwrap().iter().map(|(_, _, r)| r).sum();
            prop_assert!(total <= 1.0 + PRECISION_FACTOR);
            if !accepted {
                prop_assert_eq!(plan.forwarding_rule(demand, link).unwrap(), 0.0);
            }
        }

        let carried = plan.demand_carried_traffic(demand).unwrap();
        let total: f64 = plan.forwarding_rules(layer).unwrap().iter().map(|(_, _, r)| r).sum();
        prop_assert!((carried - total).abs() < 1e-9);
    }
}
