use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::network::NetworkPlan;
use crate::domain::network::layer::RoutingType;
use crate::domain::utils::Attributes;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{LayerId, LinkId, MulticastDemandId, MulticastTreeId, NodeId};
use crate::error::{Error, Result};

/// An arborescence rooted at the ingress node of a multicast demand.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticastTree {
    pub id: MulticastTreeId,
    pub index: usize,
    pub layer: LayerId,
    pub demand: MulticastDemandId,
    pub initial_links: BTreeSet<LinkId>,
    pub current_links: BTreeSet<LinkId>,
    pub carried_traffic_if_not_failing: f64,
    pub occupied_capacity_if_not_failing: f64,
    pub attributes: Attributes,
}

impl Indexed for MulticastTree {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl NetworkPlan {
    pub fn multicast_trees(&self, layer: LayerId) -> Result<Vec<&MulticastTree>> {
        Ok(self.layer(layer)?.multicast_trees.values().collect())
    }

    /// Adds a tree for `demand`. The links must form an arborescence rooted at the demand's
    /// ingress node that reaches every egress node.
    pub fn add_multicast_tree(
        &mut self,
        demand: MulticastDemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        links: BTreeSet<LinkId>,
    ) -> Result<MulticastTreeId> {
        self.insert_multicast_tree(None, demand, carried_traffic, occupied_capacity, links, None)
    }

    pub(crate) fn insert_multicast_tree(
        &mut self,
        id: Option<u64>,
        demand: MulticastDemandId,
        carried_traffic: f64,
        occupied_capacity: f64,
        initial_links: BTreeSet<LinkId>,
        current_links: Option<BTreeSet<LinkId>>,
    ) -> Result<MulticastTreeId> {
        let layer = self.multicast_demand_layer(demand)?;
        self.require_routing_type(layer, RoutingType::SourceRouting)?;
        Self::require_non_negative("carried traffic", carried_traffic)?;
        Self::require_non_negative("occupied capacity", occupied_capacity)?;

        let reached = self.validate_arborescence(layer, demand, &initial_links)?;
        let egress = &self.multicast_demand(demand)?.egress;
        if let Some(missing) = egress.iter().find(|node| !reached.contains(*node)) {
            return Err(Error::InvalidReference(format!("multicast tree for demand {} does not reach egress node {}", demand, missing)));
        }
        if let Some(current) = &current_links {
            self.validate_arborescence(layer, demand, current)?;
        }

        let id: MulticastTreeId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding multicast tree {} for demand {} over {} links", id, demand, initial_links.len());
        let tree = MulticastTree {
            id,
            index: 0,
            layer,
            demand,
            current_links: current_links.unwrap_or_else(|| initial_links.clone()),
            initial_links,
            carried_traffic_if_not_failing: carried_traffic,
            occupied_capacity_if_not_failing: occupied_capacity,
            attributes: Attributes::new(),
        };
        self.layer_mut(layer)?.multicast_trees.insert(id, tree);
        self.invalidate_caches();
        Ok(id)
    }

    /// Checks that `links` is an arborescence of `layer` rooted at the demand's ingress and
    /// returns the nodes it reaches, ingress included.
    fn validate_arborescence(&self, layer: LayerId, demand: MulticastDemandId, links: &BTreeSet<LinkId>) -> Result<BTreeSet<NodeId>> {
        if links.is_empty() {
            return Err(Error::InvalidValue(format!("multicast tree for demand {} needs at least one link", demand)));
        }
        let ingress = self.multicast_demand(demand)?.ingress;
        let layer_ref = self.layer(layer)?;

        let mut outgoing: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        let mut parent_link: BTreeMap<NodeId, LinkId> = BTreeMap::new();
        for link_id in links {
            let link = layer_ref.links.get(*link_id).ok_or_else(|| self.foreign_link_error(*link_id, layer))?;
            if link.destination == ingress {
                return Err(Error::InvalidValue(format!("multicast tree link {} enters the ingress node {}", link.id, ingress)));
            }
            if let Some(other) = parent_link.insert(link.destination, link.id) {
                return Err(Error::InvalidValue(format!("node {} is entered by both link {} and link {}", link.destination, other, link.id)));
            }
            outgoing.entry(link.origin).or_default().push(link.destination);
        }

        let mut reached = BTreeSet::from([ingress]);
        let mut queue = VecDeque::from([ingress]);
        while let Some(node) = queue.pop_front() {
            for next in outgoing.get(&node).into_iter().flatten() {
                if reached.insert(*next) {
                    queue.push_back(*next);
                }
            }
        }

        // Every link's destination has exactly one parent link, so all links are reached iff
        // all destinations are.
        if let Some((node, link)) = parent_link.iter().find(|(node, _)| !reached.contains(*node)) {
            return Err(Error::InvalidValue(format!("multicast tree link {} towards node {} is not reachable from the ingress", link, node)));
        }
        Ok(reached)
    }

    /// Replaces the current link set. The new set must still be an arborescence from the
    /// ingress, but may reach only some of the egress nodes.
    pub fn set_multicast_tree_links(&mut self, tree: MulticastTreeId, links: BTreeSet<LinkId>) -> Result<()> {
        let (layer, demand) = {
            let tree = self.multicast_tree(tree)?;
            (tree.layer, tree.demand)
        };
        self.validate_arborescence(layer, demand, &links)?;
        self.multicast_tree_mut(tree)?.current_links = links;
        self.invalidate_caches();
        Ok(())
    }

    pub fn set_multicast_tree_carried_traffic(&mut self, tree: MulticastTreeId, carried_traffic: f64, occupied_capacity: f64) -> Result<()> {
        Self::require_non_negative("carried traffic", carried_traffic)?;
        Self::require_non_negative("occupied capacity", occupied_capacity)?;
        let target = self.multicast_tree_mut(tree)?;
        target.carried_traffic_if_not_failing = carried_traffic;
        target.occupied_capacity_if_not_failing = occupied_capacity;
        Ok(())
    }

    pub fn remove_multicast_tree(&mut self, tree: MulticastTreeId) -> Result<()> {
        let layer = self.multicast_tree_layer(tree)?;
        self.layer_mut(layer)?.multicast_trees.remove(tree);
        log::debug!("Removed multicast tree {} from layer {}", tree, layer);
        self.invalidate_caches();
        Ok(())
    }

    /// Nodes reached by the current links, ingress included.
    pub fn multicast_tree_reached_nodes(&self, tree: MulticastTreeId) -> Result<BTreeSet<NodeId>> {
        let tree = self.multicast_tree(tree)?;
        let mut reached = BTreeSet::from([self.multicast_demand(tree.demand)?.ingress]);
        for link in &tree.current_links {
            reached.insert(self.link(*link)?.destination);
        }
        Ok(reached)
    }

    pub fn multicast_tree_reached_egress_nodes(&self, tree: MulticastTreeId) -> Result<BTreeSet<NodeId>> {
        let egress = &self.multicast_demand(self.multicast_tree(tree)?.demand)?.egress;
        Ok(self.multicast_tree_reached_nodes(tree)?.intersection(egress).copied().collect())
    }

    pub fn is_multicast_tree_down(&self, tree: MulticastTreeId) -> Result<bool> {
        for link in &self.multicast_tree(tree)?.current_links {
            if !self.is_link_operational(*link)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn multicast_tree_carried_traffic(&self, tree: MulticastTreeId) -> Result<f64> {
        if self.is_multicast_tree_down(tree)? {
            return Ok(0.0);
        }
        Ok(self.multicast_tree(tree)?.carried_traffic_if_not_failing)
    }

    pub fn multicast_tree_occupied_capacity(&self, tree: MulticastTreeId) -> Result<f64> {
        if self.is_multicast_tree_down(tree)? {
            return Ok(0.0);
        }
        Ok(self.multicast_tree(tree)?.occupied_capacity_if_not_failing)
    }

    /// Trees whose current link set contains `link`.
    pub fn multicast_trees_traversing_link(&self, link: LinkId) -> Result<Vec<MulticastTreeId>> {
        self.link_layer(link)?;
        Ok(self.caches().multicast_trees_traversing_link(link))
    }
}
