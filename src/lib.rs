use std::path::Path;

use crate::error::Result;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

pub use crate::domain::network::layer::RoutingType;
pub use crate::domain::network::route::PathElement;
pub use crate::domain::network::{ElementRef, NetworkPlan};

/// Loads a plan from disk. The returned plan has passed the full consistency check.
pub fn load_network_plan(file_path: impl AsRef<Path>) -> Result<NetworkPlan> {
    let plan = NetworkPlan::load_from_file(file_path)?;
    log::info!("Network plan '{}' is consistent.", plan.name());
    Ok(plan)
}
