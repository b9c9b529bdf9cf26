//! Loading engine configuration from data files.
//!
//! A host keeps its tuning in `engine.ron`, `engine.toml` or `engine.json`.
//! Every field is optional; missing ones take the engine defaults. Values
//! are read as plain decimals and converted to fixed point once, then
//! validated before an [`EngineConfig`](gridwire_core::config::EngineConfig)
//! is handed back.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, load_engine_config, load_engine_config_from_dir};
pub use schema::EngineData;
