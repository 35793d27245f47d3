use crate::domain::network::NetworkPlan;
use crate::domain::network::link::Link;
use crate::domain::utils::Attributes;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{LayerId, LinkId, NodeId, ResourceId};
use crate::error::Result;

/// A network node. Nodes are shared by all layers.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub index: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,

    /// `false` when the node is failed.
    pub is_up: bool,
    pub attributes: Attributes,
}

impl Indexed for Node {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl NetworkPlan {
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.nodes.ids()
    }

    pub fn number_of_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_by_index(&self, index: usize) -> Option<&Node> {
        self.nodes.get_by_index(index)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.values().find(|node| node.name == name)
    }

    pub fn add_node(&mut self, x: f64, y: f64, name: impl Into<String>) -> Result<NodeId> {
        self.insert_node(None, x, y, name.into(), true)
    }

    pub(crate) fn insert_node(&mut self, id: Option<u64>, x: f64, y: f64, name: String, is_up: bool) -> Result<NodeId> {
        let id: NodeId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding node {} '{}' at ({}, {})", id, name, x, y);
        self.nodes.insert(id, Node { id, index: 0, name, x, y, is_up, attributes: Attributes::new() });
        self.invalidate_caches();
        Ok(id)
    }

    pub fn set_node_name(&mut self, node: NodeId, name: impl Into<String>) -> Result<()> {
        self.node_mut(node)?.name = name.into();
        Ok(())
    }

    pub fn set_node_coordinates(&mut self, node: NodeId, x: f64, y: f64) -> Result<()> {
        let node = self.node_mut(node)?;
        node.x = x;
        node.y = y;
        Ok(())
    }

    /// Marks a node up or down. Carried traffic is not recomputed here; every traffic read
    /// derives it from the current failure state.
    pub fn set_node_failure_state(&mut self, node: NodeId, is_up: bool) -> Result<()> {
        let target = self.node_mut(node)?;
        if target.is_up != is_up {
            log::debug!("Node {} is now {}", node, if is_up { "up" } else { "down" });
            target.is_up = is_up;
        }
        Ok(())
    }

    pub fn is_node_up(&self, node: NodeId) -> Result<bool> {
        Ok(self.node(node)?.is_up)
    }

    /// Links of `layer` leaving `node`, in index order.
    pub fn outgoing_links(&self, node: NodeId, layer: LayerId) -> Result<Vec<&Link>> {
        self.node(node)?;
        Ok(self.layer(layer)?.links.values().filter(|link| link.origin == node).collect())
    }

    /// Links of `layer` entering `node`, in index order.
    pub fn incoming_links(&self, node: NodeId, layer: LayerId) -> Result<Vec<&Link>> {
        self.node(node)?;
        Ok(self.layer(layer)?.links.values().filter(|link| link.destination == node).collect())
    }

    /// Links of `layer` from `origin` to `destination`.
    pub fn node_pair_links(&self, origin: NodeId, destination: NodeId, layer: LayerId) -> Result<Vec<LinkId>> {
        Ok(self
            .layer(layer)?
            .links
            .values()
            .filter(|link| link.origin == origin && link.destination == destination)
            .map(|link| link.id)
            .collect())
    }

    /// Resources hosted at `node`.
    pub fn node_resources(&self, node: NodeId) -> Result<Vec<ResourceId>> {
        self.node(node)?;
        Ok(self.resources.values().filter(|resource| resource.host == node).map(|resource| resource.id).collect())
    }

    /// Removes a node together with everything that can no longer exist without it: incident
    /// links of every layer, demands and multicast demands starting or ending at it, hosted
    /// resources. The node is dropped from all SRGs.
    pub fn remove_node(&mut self, node: NodeId) -> Result<()> {
        self.node(node)?;

        for layer in self.layers.ids() {
            let (demands, multicast_demands, links) = {
                let layer = self.layer(layer)?;
                let demands: Vec<_> =
                    layer.demands.values().filter(|d| d.ingress == node || d.egress == node).map(|d| d.id).collect();
                let multicast_demands: Vec<_> = layer
                    .multicast_demands
                    .values()
                    .filter(|d| d.ingress == node || d.egress.contains(&node))
                    .map(|d| d.id)
                    .collect();
                let links: Vec<_> =
                    layer.links.values().filter(|l| l.origin == node || l.destination == node).map(|l| l.id).collect();
                (demands, multicast_demands, links)
            };

            for demand in demands {
                self.remove_demand(demand)?;
            }
            for demand in multicast_demands {
                self.remove_multicast_demand(demand)?;
            }
            for link in links {
                // A previous cascade may already have taken it.
                if self.link_layer(link).is_ok() {
                    self.remove_link(link)?;
                }
            }
        }

        for resource in self.node_resources(node)? {
            if self.resources.contains(resource) {
                self.remove_resource(resource)?;
            }
        }

        for srg in self.srgs.values_mut() {
            srg.nodes.remove(&node);
        }

        self.nodes.remove(node);
        log::info!("Removed node {}", node);
        self.invalidate_caches();
        Ok(())
    }
}
