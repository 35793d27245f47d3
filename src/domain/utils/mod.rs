pub mod config;
pub mod element_table;
pub mod id;

use std::collections::BTreeMap;

/// User extension data attached to the network and to every element.
pub type Attributes = BTreeMap<String, String>;
