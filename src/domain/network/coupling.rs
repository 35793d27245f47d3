//! Multilayer coupling: a lower-layer demand provides the capacity of an upper-layer link.

use std::collections::{BTreeMap, BTreeSet};

use crate::domain::network::NetworkPlan;
use crate::domain::network::link::LinkCoupling;
use crate::domain::utils::id::{DemandId, LayerId, LinkId, MulticastDemandId};
use crate::error::{Error, Result};

impl NetworkPlan {
    /// Couples `demand` to `upper_link`: from now on the link's capacity is the demand's
    /// carried traffic.
    pub fn couple_demand_to_link(&mut self, demand: DemandId, upper_link: LinkId) -> Result<()> {
        let lower_layer = self.demand_layer(demand)?;
        let upper_layer = self.link_layer(upper_link)?;
        self.check_coupling_layers(upper_layer, lower_layer)?;

        let (d, l) = (self.demand(demand)?, self.link(upper_link)?);
        if let Some(link) = d.coupled_upper_link {
            return Err(Error::InvalidValue(format!("demand {} is already coupled to link {}", demand, link)));
        }
        if let Some(coupling) = l.coupling {
            return Err(Error::InvalidValue(format!("link {} is already coupled to {:?}", upper_link, coupling)));
        }
        if d.ingress != l.origin || d.egress != l.destination {
            return Err(Error::InvalidReference(format!(
                "demand {} ({} -> {}) and link {} ({} -> {}) have different end nodes",
                demand, d.ingress, d.egress, upper_link, l.origin, l.destination
            )));
        }

        self.link_mut(upper_link)?.coupling = Some(LinkCoupling::Demand(demand));
        self.demand_mut(demand)?.coupled_upper_link = Some(upper_link);
        log::info!("Coupled demand {} (layer {}) to link {} (layer {})", demand, lower_layer, upper_link, upper_layer);
        self.invalidate_caches();
        Ok(())
    }

    /// Couples a multicast demand to one upper link per egress node, each leaving the ingress.
    pub fn couple_multicast_demand_to_links(&mut self, demand: MulticastDemandId, upper_links: &BTreeSet<LinkId>) -> Result<()> {
        let lower_layer = self.multicast_demand_layer(demand)?;
        let target = self.multicast_demand(demand)?;
        if target.is_coupled() {
            return Err(Error::InvalidValue(format!("multicast demand {} is already coupled", demand)));
        }

        let mut upper_layer: Option<LayerId> = None;
        let mut by_egress = BTreeMap::new();
        for link in upper_links {
            let layer = self.link_layer(*link)?;
            if upper_layer.is_some_and(|first| first != layer) {
                return Err(Error::InvalidLayer(format!("links coupled to multicast demand {} span several layers", demand)));
            }
            upper_layer = Some(layer);

            let l = self.link(*link)?;
            if let Some(coupling) = l.coupling {
                return Err(Error::InvalidValue(format!("link {} is already coupled to {:?}", link, coupling)));
            }
            if l.origin != target.ingress || !target.egress.contains(&l.destination) {
                return Err(Error::InvalidReference(format!(
                    "link {} ({} -> {}) does not connect the ingress of multicast demand {} to one of its egress nodes",
                    link, l.origin, l.destination, demand
                )));
            }
            if by_egress.insert(l.destination, *link).is_some() {
                return Err(Error::InvalidReference(format!("more than one link towards egress node {}", l.destination)));
            }
        }
        if by_egress.len() != target.egress.len() {
            return Err(Error::InvalidReference(format!("multicast demand {} needs one upper link per egress node", demand)));
        }
        let upper_layer = upper_layer.ok_or_else(|| Error::InvalidValue("no upper links given".into()))?;
        self.check_coupling_layers(upper_layer, lower_layer)?;

        for link in by_egress.values() {
            self.link_mut(*link)?.coupling = Some(LinkCoupling::MulticastDemand(demand));
        }
        self.multicast_demand_mut(demand)?.coupled_upper_links = by_egress;
        log::info!("Coupled multicast demand {} (layer {}) to {} links of layer {}", demand, lower_layer, upper_links.len(), upper_layer);
        self.invalidate_caches();
        Ok(())
    }

    /// Rejects couplings within one layer and couplings closing a cycle between layers.
    fn check_coupling_layers(&self, upper: LayerId, lower: LayerId) -> Result<()> {
        if upper == lower {
            return Err(Error::InvalidLayer(format!("cannot couple elements of the same layer {}", upper)));
        }
        if self.layer_depends_on(lower, upper) {
            return Err(Error::InvalidLayer(format!("coupling layer {} over layer {} would create a coupling cycle", upper, lower)));
        }
        Ok(())
    }

    /// Pairs `(upper, lower)` of layers linked by at least one coupling.
    pub fn layer_coupling_edges(&self) -> BTreeSet<(LayerId, LayerId)> {
        let mut edges = BTreeSet::new();
        for layer in self.layers.values() {
            for link in layer.links.values() {
                let lower = match link.coupling {
                    Some(LinkCoupling::Demand(d)) => self.demand_layer(d).ok(),
                    Some(LinkCoupling::MulticastDemand(d)) => self.multicast_demand_layer(d).ok(),
                    None => None,
                };
                if let Some(lower) = lower {
                    edges.insert((layer.id, lower));
                }
            }
        }
        edges
    }

    /// Whether `upper` reaches `lower` by following couplings downwards.
    pub fn layer_depends_on(&self, upper: LayerId, lower: LayerId) -> bool {
        let edges = self.layer_coupling_edges();
        let mut stack = vec![upper];
        let mut visited = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == lower {
                return true;
            }
            if visited.insert(current) {
                stack.extend(edges.iter().filter(|(u, _)| *u == current).map(|(_, l)| *l));
            }
        }
        false
    }

    /// Dissolves the coupling of `link`. The link keeps the capacity it had at that moment.
    ///
    /// A link coupled to a multicast demand dissolves the coupling of the whole demand.
    pub fn decouple_link(&mut self, link: LinkId) -> Result<()> {
        match self.link(link)?.coupling {
            None => Err(Error::InvalidValue(format!("link {} is not coupled", link))),
            Some(LinkCoupling::Demand(demand)) => {
                let capacity = self.link_capacity(link)?;
                let target = self.link_mut(link)?;
                target.coupling = None;
                target.capacity = capacity;
                self.demand_mut(demand)?.coupled_upper_link = None;
                log::info!("Decoupled link {} from demand {}, keeping capacity {}", link, demand, capacity);
                self.invalidate_caches();
                Ok(())
            }
            Some(LinkCoupling::MulticastDemand(demand)) => self.decouple_multicast_demand(demand),
        }
    }

    pub fn decouple_demand(&mut self, demand: DemandId) -> Result<()> {
        match self.demand(demand)?.coupled_upper_link {
            Some(link) => self.decouple_link(link),
            None => Err(Error::InvalidValue(format!("demand {} is not coupled", demand))),
        }
    }

    pub fn decouple_multicast_demand(&mut self, demand: MulticastDemandId) -> Result<()> {
        let links: Vec<LinkId> = self.multicast_demand(demand)?.coupled_upper_links.values().copied().collect();
        if links.is_empty() {
            return Err(Error::InvalidValue(format!("multicast demand {} is not coupled", demand)));
        }

        let mut frozen = Vec::with_capacity(links.len());
        for link in &links {
            frozen.push((*link, self.link_capacity(*link)?));
        }
        for (link, capacity) in frozen {
            let target = self.link_mut(link)?;
            target.coupling = None;
            target.capacity = capacity;
        }
        self.multicast_demand_mut(demand)?.coupled_upper_links.clear();

        log::info!("Decoupled multicast demand {} from {} links", demand, links.len());
        self.invalidate_caches();
        Ok(())
    }
}
