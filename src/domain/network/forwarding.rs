//! Hop-by-hop routing: per-demand splitting ratios and the flow they induce.
//!
//! The traffic of a demand at every node follows from the linear system
//! `x = b + Aᵀx`, where `b` injects the offered traffic at the ingress and `A[i][j]` is the
//! fraction of traffic at node `i` forwarded over operational links towards node `j`. The
//! egress absorbs whatever reaches it.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::network::NetworkPlan;
use crate::domain::network::layer::RoutingType;
use crate::domain::utils::config::PRECISION_FACTOR;
use crate::domain::utils::id::{DemandId, LayerId, LinkId, NodeId};
use crate::error::{Error, Result};

/// Loop structure of a demand's routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingCycleType {
    Loopless,

    /// Traffic revisits nodes but eventually leaves every loop.
    OpenCycles,

    /// Some loop keeps all traffic that enters it. That traffic never reaches the egress and
    /// is counted as dropped.
    ClosedCycles,
}

/// Result of propagating one demand through the forwarding rules.
#[derive(Debug, Clone, PartialEq)]
pub struct DemandFlow {
    /// Traffic entering each node that carries any.
    pub node_traffic: BTreeMap<NodeId, f64>,
    pub link_traffic: BTreeMap<LinkId, f64>,
    pub carried_traffic: f64,

    /// Traffic that entered closed cycles.
    pub trapped_traffic: f64,
    pub cycle_type: RoutingCycleType,
}

impl NetworkPlan {
    /// Sets the fraction of `demand`'s traffic at the link's origin forwarded over `link`.
    ///
    /// The ratios of one demand over the outgoing links of a node may not add up to more than
    /// one. A ratio of zero removes the rule.
    pub fn set_forwarding_rule(&mut self, demand: DemandId, link: LinkId, ratio: f64) -> Result<()> {
        let layer = self.demand_layer(demand)?;
        self.require_routing_type(layer, RoutingType::HopByHop)?;
        let origin = {
            let layer_ref = self.layer(layer)?;
            layer_ref.links.get(link).ok_or_else(|| self.foreign_link_error(link, layer))?.origin
        };

        if !ratio.is_finite() || !(0.0..=1.0).contains(&ratio) {
            return Err(Error::InvalidSplittingRatio { demand, link, ratio, reason: "ratio must lie in [0, 1]".into() });
        }

        let layer_ref = self.layer(layer)?;
        let others: f64 = layer_ref
            .links
            .values()
            .filter(|l| l.origin == origin && l.id != link)
            .filter_map(|l| layer_ref.forwarding_rules.get(&(demand, l.id)))
            .sum();
        if others + ratio > 1.0 + PRECISION_FACTOR {
            return Err(Error::InvalidSplittingRatio {
                demand,
                link,
                ratio,
                reason: format!("ratios out of node {} would add up to {}", origin, others + ratio),
            });
        }

        let rules = &mut self.layer_mut(layer)?.forwarding_rules;
        if ratio == 0.0 {
            rules.remove(&(demand, link));
        } else {
            rules.insert((demand, link), ratio);
        }
        Ok(())
    }

    pub fn remove_forwarding_rule(&mut self, demand: DemandId, link: LinkId) -> Result<()> {
        let layer = self.demand_layer(demand)?;
        self.require_routing_type(layer, RoutingType::HopByHop)?;
        if self.layer_mut(layer)?.forwarding_rules.remove(&(demand, link)).is_none() {
            return Err(Error::InvalidReference(format!("no forwarding rule for demand {} on link {}", demand, link)));
        }
        Ok(())
    }

    /// Removes every rule of `demand`.
    pub fn clear_forwarding_rules(&mut self, demand: DemandId) -> Result<()> {
        let layer = self.demand_layer(demand)?;
        self.layer_mut(layer)?.forwarding_rules.retain(|(d, _), _| *d != demand);
        Ok(())
    }

    pub fn forwarding_rule(&self, demand: DemandId, link: LinkId) -> Result<f64> {
        let layer = self.demand_layer(demand)?;
        Ok(self.layer(layer)?.forwarding_rules.get(&(demand, link)).copied().unwrap_or(0.0))
    }

    /// The nonzero rules of a layer as `(demand, link, ratio)`, ordered by ids.
    pub fn forwarding_rules(&self, layer: LayerId) -> Result<Vec<(DemandId, LinkId, f64)>> {
        Ok(self.layer(layer)?.forwarding_rules.iter().map(|((d, l), ratio)| (*d, *l, *ratio)).collect())
    }

    /// Dense demand × link ratio matrix, rows and columns in index order.
    pub fn forwarding_matrix(&self, layer: LayerId) -> Result<Vec<Vec<f64>>> {
        let layer = self.layer(layer)?;
        let links = layer.links.ids();
        Ok(layer
            .demands
            .values()
            .map(|demand| links.iter().map(|link| layer.forwarding_rules.get(&(demand.id, *link)).copied().unwrap_or(0.0)).collect())
            .collect())
    }

    /// Propagates `demand` through the forwarding rules of its layer under the current failure
    /// state.
    pub fn demand_flow(&self, demand: DemandId) -> Result<DemandFlow> {
        let layer = self.demand_layer(demand)?;
        self.require_routing_type(layer, RoutingType::HopByHop)?;
        let target = self.demand(demand)?;
        let (ingress, egress, offered) = (target.ingress, target.egress, target.offered_traffic);

        // Rules that can move traffic right now. The egress absorbs, so its rules are ignored.
        let mut active: Vec<(LinkId, NodeId, NodeId, f64)> = Vec::new();
        for ((d, link), ratio) in &self.layer(layer)?.forwarding_rules {
            if *d != demand {
                continue;
            }
            let l = self.link(*link)?;
            if l.origin == egress || !self.is_link_operational(*link)? {
                continue;
            }
            active.push((*link, l.origin, l.destination, *ratio));
        }

        let mut flow = DemandFlow {
            node_traffic: BTreeMap::new(),
            link_traffic: BTreeMap::new(),
            carried_traffic: 0.0,
            trapped_traffic: 0.0,
            cycle_type: RoutingCycleType::Loopless,
        };
        if !self.node(ingress)?.is_up || offered <= 0.0 {
            return Ok(flow);
        }

        let nodes = reachable_nodes(ingress, &active);
        let position: BTreeMap<NodeId, usize> = nodes.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let n = nodes.len();

        let mut ratios = vec![vec![0.0; n]; n];
        for (_, origin, destination, ratio) in &active {
            if let (Some(i), Some(j)) = (position.get(origin), position.get(destination)) {
                ratios[*i][*j] += ratio;
            }
        }

        // Ratio sums are accepted up to 1 + PRECISION_FACTOR; scaled down to 1 so that no loop
        // amplifies traffic.
        let mut scale = vec![1.0; n];
        for (i, row) in ratios.iter_mut().enumerate() {
            let sum: f64 = row.iter().sum();
            if sum > 1.0 {
                scale[i] = sum;
                row.iter_mut().for_each(|r| *r /= sum);
            }
        }

        let (cycle_type, closed) = classify_cycles(&ratios);
        flow.cycle_type = cycle_type;
        for node in &closed {
            ratios[*node].iter_mut().for_each(|r| *r = 0.0);
        }

        // (I - Aᵀ) x = b
        let mut system = vec![vec![0.0; n]; n];
        for j in 0..n {
            system[j][j] = 1.0;
            for i in 0..n {
                system[j][i] -= ratios[i][j];
            }
        }
        let mut injection = vec![0.0; n];
        injection[0] = offered;
        let traffic = solve_linear_system(system, injection).ok_or_else(|| {
            Error::corrupt(format!("forwarding rules of demand {} admit no flow solution", demand), Some(demand.raw()))
        })?;

        for (i, node) in nodes.iter().enumerate() {
            flow.node_traffic.insert(*node, traffic[i]);
        }
        for (link, origin, _, ratio) in &active {
            if let Some(i) = position.get(origin) {
                let carried = if closed.contains(i) { 0.0 } else { traffic[*i] * ratio / scale[*i] };
                flow.link_traffic.insert(*link, carried);
            }
        }
        flow.carried_traffic = position.get(&egress).map(|i| traffic[*i]).unwrap_or(0.0);
        flow.trapped_traffic = closed.iter().map(|i| traffic[*i]).sum();

        if flow.cycle_type == RoutingCycleType::ClosedCycles {
            log::debug!("Demand {} loses {} traffic in closed forwarding cycles", demand, flow.trapped_traffic);
        }
        Ok(flow)
    }

    /// Traffic of all demands of `layer` forwarded over `link`.
    pub(crate) fn hop_by_hop_link_traffic(&self, layer: LayerId, link: LinkId) -> Result<f64> {
        let mut total = 0.0;
        for demand in self.layer(layer)?.demands.ids() {
            total += self.demand_flow(demand)?.link_traffic.get(&link).copied().unwrap_or(0.0);
        }
        Ok(total)
    }
}

/// Nodes reachable from `start` over links with a positive ratio. `start` comes first.
fn reachable_nodes(start: NodeId, active: &[(LinkId, NodeId, NodeId, f64)]) -> Vec<NodeId> {
    let mut seen = BTreeSet::from([start]);
    let mut order = vec![start];
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for (_, origin, destination, ratio) in active {
            if *origin == node && *ratio > 0.0 && seen.insert(*destination) {
                order.push(*destination);
                queue.push_back(*destination);
            }
        }
    }
    order
}

/// Finds the strongly connected groups of the ratio graph and reports the loop structure,
/// together with the nodes of closed groups.
///
/// A group is closed when every member forwards all of its traffic to other members.
fn classify_cycles(ratios: &[Vec<f64>]) -> (RoutingCycleType, BTreeSet<usize>) {
    let n = ratios.len();
    let reach: Vec<Vec<bool>> = (0..n)
        .map(|start| {
            let mut seen = vec![false; n];
            let mut stack = vec![start];
            while let Some(i) = stack.pop() {
                for j in 0..n {
                    if ratios[i][j] > 0.0 && !seen[j] {
                        seen[j] = true;
                        stack.push(j);
                    }
                }
            }
            seen
        })
        .collect();

    let mut cycle_type = RoutingCycleType::Loopless;
    let mut closed = BTreeSet::new();
    let mut assigned = vec![false; n];
    for i in 0..n {
        if assigned[i] || !reach[i][i] {
            continue;
        }
        let group: Vec<usize> = (0..n).filter(|j| reach[i][*j] && reach[*j][i]).collect();
        group.iter().for_each(|j| assigned[*j] = true);

        let is_closed = group.iter().all(|u| group.iter().map(|v| ratios[*u][*v]).sum::<f64>() >= 1.0 - PRECISION_FACTOR);
        if is_closed {
            closed.extend(group);
            cycle_type = RoutingCycleType::ClosedCycles;
        } else if cycle_type == RoutingCycleType::Loopless {
            cycle_type = RoutingCycleType::OpenCycles;
        }
    }
    (cycle_type, closed)
}

/// Gaussian elimination with partial pivoting. `None` when the system is singular.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|x, y| a[*x][col].abs().total_cmp(&a[*y][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
