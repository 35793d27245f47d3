use std::collections::{BTreeMap, HashSet};

use crate::domain::network::NetworkPlan;
use crate::domain::utils::Attributes;
use crate::domain::utils::config::PRECISION_FACTOR;
use crate::domain::utils::element_table::Indexed;
use crate::domain::utils::id::{NodeId, ResourceId, RouteId};
use crate::error::{Error, Result};

/// A capacity-bearing resource hosted at a node, e.g. a virtualized network function.
///
/// A resource may sit on top of other resources of the same node and consume part of their
/// capacity (`base_resources`). That relation is kept acyclic.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub index: usize,
    pub host: NodeId,
    pub resource_type: String,
    pub name: String,
    pub capacity: f64,
    pub capacity_units: String,

    /// Added to the latency of every route traversing the resource.
    pub processing_time_ms: f64,

    /// Capacity this resource occupies in each of its base resources.
    pub base_resources: BTreeMap<ResourceId, f64>,
    pub attributes: Attributes,
}

impl Indexed for Resource {
    fn index(&self) -> usize {
        self.index
    }

    fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}

impl NetworkPlan {
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.values()
    }

    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.resources.ids()
    }

    pub fn number_of_resources(&self) -> usize {
        self.resources.len()
    }

    pub fn resources_of_type(&self, resource_type: &str) -> Vec<ResourceId> {
        self.resources.values().filter(|r| r.resource_type == resource_type).map(|r| r.id).collect()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_resource(
        &mut self,
        host: NodeId,
        resource_type: impl Into<String>,
        name: impl Into<String>,
        capacity: f64,
        capacity_units: impl Into<String>,
        base_resource_occupation: BTreeMap<ResourceId, f64>,
        processing_time_ms: f64,
    ) -> Result<ResourceId> {
        self.insert_resource(
            None,
            host,
            resource_type.into(),
            name.into(),
            capacity,
            capacity_units.into(),
            base_resource_occupation,
            processing_time_ms,
            true,
        )
    }

    /// Inserts a resource. Persisted plans skip the free-capacity admission check
    /// (`check_free_capacity == false`): their occupation amounts are authoritative.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn insert_resource(
        &mut self,
        id: Option<u64>,
        host: NodeId,
        resource_type: String,
        name: String,
        capacity: f64,
        capacity_units: String,
        base_resource_occupation: BTreeMap<ResourceId, f64>,
        processing_time_ms: f64,
        check_free_capacity: bool,
    ) -> Result<ResourceId> {
        self.node(host)?;
        Self::require_non_negative("resource capacity", capacity)?;
        Self::require_non_negative("resource processing time", processing_time_ms)?;
        self.validate_base_resource_occupation(None, host, &base_resource_occupation, check_free_capacity)?;

        let id: ResourceId = match id {
            Some(raw) => self.register_id(raw)?,
            None => self.ids.new_id(),
        };

        log::debug!("Adding resource {} '{}' of type '{}' at node {} with capacity {}", id, name, resource_type, host, capacity);
        let resource = Resource {
            id,
            index: 0,
            host,
            resource_type,
            name,
            capacity,
            capacity_units,
            processing_time_ms,
            base_resources: base_resource_occupation,
            attributes: Attributes::new(),
        };
        self.resources.insert(id, resource);
        self.invalidate_caches();
        Ok(id)
    }

    /// Checks an occupation map of base resources for `resource` (`None` for a resource not
    /// yet created) hosted at `host`.
    fn validate_base_resource_occupation(
        &self,
        resource: Option<ResourceId>,
        host: NodeId,
        occupation: &BTreeMap<ResourceId, f64>,
        check_free_capacity: bool,
    ) -> Result<()> {
        for (base, amount) in occupation {
            let base_resource = self.resource(*base)?;
            if base_resource.host != host {
                return Err(Error::InvalidReference(format!(
                    "base resource {} is hosted at node {}, not at node {}",
                    base, base_resource.host, host
                )));
            }
            Self::require_non_negative("base resource occupation", *amount)?;

            if let Some(resource) = resource {
                if *base == resource || self.resource_depends_on(*base, resource)? {
                    return Err(Error::CyclicResourceDependency(resource));
                }
            }

            if check_free_capacity {
                let already_held = resource.and_then(|r| self.resources.get(r)).and_then(|r| r.base_resources.get(base)).copied().unwrap_or(0.0);
                let available = base_resource.capacity - self.resource_occupied_capacity(*base)? + already_held;
                if *amount > available + PRECISION_FACTOR {
                    return Err(Error::CapacityExceeded { resource: *base, requested: *amount, available });
                }
            }
        }
        Ok(())
    }

    /// Whether `resource` transitively occupies capacity in `target`.
    pub fn resource_depends_on(&self, resource: ResourceId, target: ResourceId) -> Result<bool> {
        let mut stack = vec![resource];
        let mut visited = HashSet::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            for base in self.resource(current)?.base_resources.keys() {
                if *base == target {
                    return Ok(true);
                }
                stack.push(*base);
            }
        }
        Ok(false)
    }

    /// Changes capacity and base occupation of a resource at once.
    ///
    /// The new capacity must cover what routes and upper resources already occupy, and the new
    /// base occupation must fit the base resources and keep the dependency graph acyclic.
    pub fn set_resource_capacity(&mut self, resource: ResourceId, capacity: f64, base_resource_occupation: BTreeMap<ResourceId, f64>) -> Result<()> {
        Self::require_non_negative("resource capacity", capacity)?;
        let host = self.resource(resource)?.host;

        let occupied = self.resource_occupied_capacity(resource)?;
        if occupied > capacity + PRECISION_FACTOR {
            return Err(Error::CapacityExceeded { resource, requested: occupied, available: capacity });
        }
        self.validate_base_resource_occupation(Some(resource), host, &base_resource_occupation, true)?;

        let target = self.resource_mut(resource)?;
        target.capacity = capacity;
        target.base_resources = base_resource_occupation;
        self.invalidate_caches();
        Ok(())
    }

    pub fn set_resource_name(&mut self, resource: ResourceId, name: impl Into<String>) -> Result<()> {
        self.resource_mut(resource)?.name = name.into();
        Ok(())
    }

    pub fn set_resource_processing_time(&mut self, resource: ResourceId, processing_time_ms: f64) -> Result<()> {
        Self::require_non_negative("resource processing time", processing_time_ms)?;
        self.resource_mut(resource)?.processing_time_ms = processing_time_ms;
        Ok(())
    }

    /// Resources that occupy capacity in `resource`.
    pub fn upper_resources(&self, resource: ResourceId) -> Result<Vec<ResourceId>> {
        self.resource(resource)?;
        Ok(self.resources.values().filter(|r| r.base_resources.contains_key(&resource)).map(|r| r.id).collect())
    }

    /// Routes whose current path traverses the resource.
    pub fn routes_traversing_resource(&self, resource: ResourceId) -> Result<Vec<RouteId>> {
        self.resource(resource)?;
        Ok(self.caches().routes_traversing_resource(resource))
    }

    /// Capacity occupied by the current paths of traversing routes and by upper resources.
    pub fn resource_occupied_capacity(&self, resource: ResourceId) -> Result<f64> {
        let mut total = 0.0;
        for route in self.routes_traversing_resource(resource)? {
            total += self.route(route)?.current_resource_occupation.get(&resource).copied().unwrap_or(0.0);
        }
        for upper in self.resources.values() {
            total += upper.base_resources.get(&resource).copied().unwrap_or(0.0);
        }
        Ok(total)
    }

    pub fn resource_free_capacity(&self, resource: ResourceId) -> Result<f64> {
        Ok(self.resource(resource)?.capacity - self.resource_occupied_capacity(resource)?)
    }

    /// A resource can serve traffic while its host node is up and its capacity is nonzero.
    pub fn is_resource_operational(&self, resource: ResourceId) -> Result<bool> {
        let target = self.resource(resource)?;
        Ok(self.node(target.host)?.is_up && target.capacity > 0.0)
    }

    /// Removes a resource, every route traversing it and every resource built on top of it.
    pub fn remove_resource(&mut self, resource: ResourceId) -> Result<()> {
        self.resource(resource)?;

        let routes: Vec<RouteId> = self
            .layers
            .values()
            .flat_map(|layer| layer.routes.values())
            .filter(|route| route.initial_resources().any(|r| r == resource) || route.current_resources().any(|r| r == resource))
            .map(|route| route.id)
            .collect();
        for route in routes {
            self.remove_route(route)?;
        }

        for upper in self.upper_resources(resource)? {
            if self.resources.contains(upper) {
                self.remove_resource(upper)?;
            }
        }

        self.resources.remove(resource);
        log::debug!("Removed resource {}", resource);
        self.invalidate_caches();
        Ok(())
    }
}
