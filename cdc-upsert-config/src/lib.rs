//! Configuration for CDC upsert pipelines.
//!
//! Provides the [`shared::UpsertConfig`] type describing which table a pipeline merges into,
//! which columns identify an entity and which column orders its versions, together with the
//! hierarchical [`load_config`] loader used by pipeline drivers.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
