pub mod cli;
pub mod collab;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;

pub use db::Database;
pub use engine::ContractEngine;
pub use error::{EngineError, EngineResult};
