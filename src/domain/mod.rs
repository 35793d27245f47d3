pub mod network;
pub mod utils;
