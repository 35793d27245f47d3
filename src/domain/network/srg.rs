use std::collections::BTreeSet;

use crate::domain::network::NetworkPlan;
use crate::domain::utils::Attributes;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{LinkId, MulticastTreeId, NodeId, RouteId, SrgId};
use crate::error::Result;

/// Nodes and links that fail together.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedRiskGroup {
    pub id: SrgId,
    pub index: usize,
    pub nodes: BTreeSet<NodeId>,
    pub links: BTreeSet<LinkId>,
    pub mttf_hours: f64,
    pub mttr_hours: f64,
    pub attributes: Attributes,
}

impl Indexed for SharedRiskGroup {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl SharedRiskGroup {
    /// Fraction of time the group is up. A group that neither fails nor gets repaired is
    /// always available.
    pub fn availability(&self) -> f64 {
        let total = self.mttf_hours + self.mttr_hours;
        if total == 0.0 {
            return 1.0;
        }
        self.mttf_hours / total
    }
}

impl NetworkPlan {
    pub fn srgs(&self) -> impl Iterator<Item = &SharedRiskGroup> {
        self.srgs.values()
    }

    pub fn srg_ids(&self) -> Vec<SrgId> {
        self.srgs.ids()
    }

    pub fn add_srg(&mut self, mttf_hours: f64, mttr_hours: f64) -> Result<SrgId> {
        self.insert_srg(None, mttf_hours, mttr_hours)
    }

    pub(crate) fn insert_srg(&mut self, id: Option<u64>, mttf_hours: f64, mttr_hours: f64) -> Result<SrgId> {
        Self::require_non_negative("mean time to fail", mttf_hours)?;
        Self::require_non_negative("mean time to repair", mttr_hours)?;

        let id: SrgId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding SRG {} (MTTF {} h, MTTR {} h)", id, mttf_hours, mttr_hours);
        self.srgs.insert(
            id,
            SharedRiskGroup { id, index: 0, nodes: BTreeSet::new(), links: BTreeSet::new(), mttf_hours, mttr_hours, attributes: Attributes::new() },
        );
        Ok(id)
    }

    pub fn add_node_to_srg(&mut self, srg: SrgId, node: NodeId) -> Result<()> {
        self.node(node)?;
        self.srg_mut(srg)?.nodes.insert(node);
        Ok(())
    }

    pub fn add_link_to_srg(&mut self, srg: SrgId, link: LinkId) -> Result<()> {
        self.link(link)?;
        self.srg_mut(srg)?.links.insert(link);
        Ok(())
    }

    pub fn remove_node_from_srg(&mut self, srg: SrgId, node: NodeId) -> Result<()> {
        self.srg_mut(srg)?.nodes.remove(&node);
        Ok(())
    }

    pub fn remove_link_from_srg(&mut self, srg: SrgId, link: LinkId) -> Result<()> {
        self.srg_mut(srg)?.links.remove(&link);
        Ok(())
    }

    pub fn set_srg_mttf(&mut self, srg: SrgId, mttf_hours: f64) -> Result<()> {
        Self::require_non_negative("mean time to fail", mttf_hours)?;
        self.srg_mut(srg)?.mttf_hours = mttf_hours;
        Ok(())
    }

    pub fn set_srg_mttr(&mut self, srg: SrgId, mttr_hours: f64) -> Result<()> {
        Self::require_non_negative("mean time to repair", mttr_hours)?;
        self.srg_mut(srg)?.mttr_hours = mttr_hours;
        Ok(())
    }

    pub fn srg_availability(&self, srg: SrgId) -> Result<f64> {
        Ok(self.srg(srg)?.availability())
    }

    /// Brings every member of the group up or down.
    pub fn set_srg_failure_state(&mut self, srg: SrgId, is_up: bool) -> Result<()> {
        let (nodes, links): (Vec<_>, Vec<_>) = {
            let srg = self.srg(srg)?;
            (srg.nodes.iter().copied().collect(), srg.links.iter().copied().collect())
        };
        log::info!("SRG {} is now {}: {} nodes, {} links", srg, if is_up { "up" } else { "down" }, nodes.len(), links.len());

        if is_up {
            self.set_links_and_nodes_failure_state(&links, &[], &nodes, &[])
        } else {
            self.set_links_and_nodes_failure_state(&[], &links, &[], &nodes)
        }
    }

    pub fn srgs_of_node(&self, node: NodeId) -> Result<Vec<SrgId>> {
        self.node(node)?;
        Ok(self.srgs.values().filter(|srg| srg.nodes.contains(&node)).map(|srg| srg.id).collect())
    }

    pub fn srgs_of_link(&self, link: LinkId) -> Result<Vec<SrgId>> {
        self.link(link)?;
        Ok(self.srgs.values().filter(|srg| srg.links.contains(&link)).map(|srg| srg.id).collect())
    }

    /// Links brought down by the group: its own links and every link touching one of its nodes.
    pub fn srg_affected_links(&self, srg: SrgId) -> Result<BTreeSet<LinkId>> {
        let srg = self.srg(srg)?;
        let mut affected = srg.links.clone();
        for layer in self.layers.values() {
            affected.extend(
                layer.links.values().filter(|l| srg.nodes.contains(&l.origin) || srg.nodes.contains(&l.destination)).map(|l| l.id),
            );
        }
        Ok(affected)
    }

    /// Routes whose current path would go down with the group, in layer then index order.
    pub fn srg_affected_routes(&self, srg: SrgId) -> Result<Vec<RouteId>> {
        let links = self.srg_affected_links(srg)?;
        let nodes = &self.srg(srg)?.nodes;

        let mut affected = Vec::new();
        for route in self.layers.values().flat_map(|layer| layer.routes.values()) {
            let hits_link = self.route_current_links(route.id)?.iter().any(|l| links.contains(l));
            let mut hits_host = false;
            for resource in route.current_resources() {
                hits_host |= nodes.contains(&self.resource(resource)?.host);
            }
            if hits_link || hits_host {
                affected.push(route.id);
            }
        }
        Ok(affected)
    }

    pub fn srg_affected_multicast_trees(&self, srg: SrgId) -> Result<Vec<MulticastTreeId>> {
        let links = self.srg_affected_links(srg)?;
        Ok(self
            .layers
            .values()
            .flat_map(|layer| layer.multicast_trees.values())
            .filter(|tree| tree.current_links.iter().any(|l| links.contains(l)))
            .map(|tree| tree.id)
            .collect())
    }

    pub fn remove_srg(&mut self, srg: SrgId) -> Result<()> {
        self.srg(srg)?;
        self.srgs.remove(srg);
        log::debug!("Removed SRG {}", srg);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability() {
        let mut plan = NetworkPlan::new();
        let srg = plan.add_srg(99.0, 1.0).unwrap();
        let never_fails = plan.add_srg(0.0, 0.0).unwrap();

        assert!((plan.srg_availability(srg).unwrap() - 0.99).abs() < 1e-12);
        assert_eq!(plan.srg_availability(never_fails).unwrap(), 1.0);
        assert!(plan.set_srg_mttr(srg, -1.0).is_err());
    }

    #[test]
    fn test_srg_failure_sets_members() {
        let mut plan = NetworkPlan::new();
        let layer = plan.default_layer();
        let a = plan.add_node(0.0, 0.0, "A").unwrap();
        let b = plan.add_node(1.0, 0.0, "B").unwrap();
        let link = plan.add_link_with_default_speed(a, b, layer, 10.0, 1.0).unwrap();
        let srg = plan.add_srg(1000.0, 10.0).unwrap();
        plan.add_node_to_srg(srg, b).unwrap();
        plan.add_link_to_srg(srg, link).unwrap();

        plan.set_srg_failure_state(srg, false).unwrap();
        assert!(!plan.is_node_up(b).unwrap());
        assert!(!plan.link(link).unwrap().is_up);

        plan.set_srg_failure_state(srg, true).unwrap();
        assert!(plan.is_node_up(b).unwrap());
        assert!(plan.link(link).unwrap().is_up);
    }

    #[test]
    fn test_removing_node_drops_it_from_srg() {
        let mut plan = NetworkPlan::new();
        let a = plan.add_node(0.0, 0.0, "A").unwrap();
        let srg = plan.add_srg(1.0, 1.0).unwrap();
        plan.add_node_to_srg(srg, a).unwrap();

        plan.remove_node(a).unwrap();

        assert!(plan.srg(srg).unwrap().nodes.is_empty());
    }
}
