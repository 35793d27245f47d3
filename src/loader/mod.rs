//! Persistence of network plans as JSON documents.

pub mod parser;
pub mod reader;
pub mod writer;

use std::path::Path;

use crate::api::network_dto::NetworkFileDto;
use crate::domain::network::NetworkPlan;
use crate::error::Result;
use crate::loader::parser::{parse_json_file, parse_json_str, write_json_file};

impl NetworkPlan {
    pub fn from_dto(dto: NetworkFileDto) -> Result<Self> {
        reader::plan_from_dto(dto)
    }

    pub fn to_dto(&self) -> NetworkFileDto {
        writer::plan_to_dto(self)
    }

    /// Loads a plan from a JSON file. On any error no plan is returned.
    pub fn load_from_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let file_path = file_path.as_ref();
        log::info!("Loading network plan from '{}'", file_path.display());

        let dto: NetworkFileDto = parse_json_file(file_path)?;
        let plan = Self::from_dto(dto)?;

        log::info!(
            "Loaded network plan '{}': {} layers, {} nodes, {} resources",
            plan.name(),
            plan.number_of_layers(),
            plan.number_of_nodes(),
            plan.number_of_resources()
        );
        Ok(plan)
    }

    pub fn save_to_file(&self, file_path: impl AsRef<Path>) -> Result<()> {
        let file_path = file_path.as_ref();
        write_json_file(file_path, &self.to_dto())?;
        log::info!("Saved network plan '{}' to '{}'", self.name(), file_path.display());
        Ok(())
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        Self::from_dto(parse_json_str(data)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_dto())?)
    }
}
