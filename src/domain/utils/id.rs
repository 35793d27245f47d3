use std::fmt;
use std::marker::PhantomData;

use crate::error::{Error, Result};

/// A typed element identifier.
///
/// Every element kind of a `NetworkPlan` draws from the same counter, so the raw value alone
/// is unique across kinds. The tag only prevents mixing up, say, a `LinkId` and a `NodeId`
/// at compile time.
#[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub struct Id<T> {
    pub id: u64,
    _marker: PhantomData<T>,
}

impl<T> Id<T> {
    pub fn new(id: u64) -> Self {
        Id { id, _marker: PhantomData }
    }

    pub fn raw(&self) -> u64 {
        self.id
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> From<Id<T>> for u64 {
    fn from(id_wrapper: Id<T>) -> Self {
        id_wrapper.id
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let clean_name = full_name.split("::").last().unwrap_or(full_name);
        let display_name = clean_name.replace("Tag", "Id");

        write!(f, "{}: {}", display_name, self.id)
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct NodeTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct LayerTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct LinkTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct DemandTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct MulticastDemandTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct RouteTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ProtectionSegmentTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct MulticastTreeTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct ResourceTag;
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash, Copy)]
pub struct SrgTag;

pub type NodeId = Id<NodeTag>;
pub type LayerId = Id<LayerTag>;
pub type LinkId = Id<LinkTag>;
pub type DemandId = Id<DemandTag>;
pub type MulticastDemandId = Id<MulticastDemandTag>;
pub type RouteId = Id<RouteTag>;
pub type ProtectionSegmentId = Id<ProtectionSegmentTag>;
pub type MulticastTreeId = Id<MulticastTreeTag>;
pub type ResourceId = Id<ResourceTag>;
pub type SrgId = Id<SrgTag>;

/// Issues element ids for one `NetworkPlan`.
///
/// The counter is only ever advanced. A fresh registry starts at zero; there is no way to
/// rewind an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRegistry {
    next_element_id: u64,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self { next_element_id: 0 }
    }

    /// Returns the next free id and advances the counter.
    pub fn new_id<T>(&mut self) -> Id<T> {
        let id = Id::new(self.next_element_id);
        self.next_element_id += 1;
        id
    }

    pub fn next_element_id(&self) -> u64 {
        self.next_element_id
    }

    /// Accepts an id read from a persisted plan.
    ///
    /// Bulk loads first move the counter to the file's `nextElementId`; every id the file
    /// then presents must lie strictly below it.
    pub fn register<T>(&self, raw: u64) -> Result<Id<T>> {
        if raw >= self.next_element_id {
            return Err(Error::corrupt(
                format!("element id {} is not below the next element id {}", raw, self.next_element_id),
                Some(raw),
            ));
        }
        Ok(Id::new(raw))
    }

    /// Moves the counter forward to `next`. Moving it backwards is corruption.
    pub fn advance_to(&mut self, next: u64) -> Result<()> {
        if next < self.next_element_id {
            return Err(Error::corrupt(
                format!("next element id {} would rewind the counter from {}", next, self.next_element_id),
                None,
            ));
        }
        self.next_element_id = next;
        Ok(())
    }
}

impl Default for IdRegistry {
    fn default() -> Self {
        Self::new()
    }
}
