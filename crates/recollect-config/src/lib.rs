//! Recollect configuration: the JSON5 schema, layered loading, and
//! validation.

mod error;
mod loader;
mod model;

pub use error::ConfigError;
/// Layer discovery and merge results.
pub use loader::{
    CONFIG_FILE_NAME, ConfigLayer, ConfigLayerSource, LayeredConfig, LayeredConfigOptions,
};
pub use model::*;
