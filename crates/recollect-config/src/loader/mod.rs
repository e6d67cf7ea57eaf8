//! Layered configuration loading.
//!
//! Layers, lowest precedence first: system, user, project root, working
//! directory, then explicit overrides. Each layer is schema-checked on its own
//! so errors name the file at fault; the merged document is checked again and
//! decoded into a [`RecollectConfig`].

mod discovery;
mod merge;
mod schema;


use crate::{ConfigError, RecollectConfig};
use log::{debug, info};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in every directory layer.
pub const CONFIG_FILE_NAME: &str = "recollect.json5";

/// Merged config plus the layers that contributed to it, in merge order.
#[derive(Debug, Clone)]
pub struct LayeredConfig {
    pub config: RecollectConfig,
    pub layers: Vec<ConfigLayer>,
}

/// Where a layer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayerSource {
    System,
    User,
    /// Nearest ancestor of the working directory holding a root marker.
    Project,
    Cwd,
    /// Passed explicitly; must exist.
    Override,
}

impl ConfigLayerSource {
    pub fn name(self) -> &'static str {
        match self {
            ConfigLayerSource::System => "system",
            ConfigLayerSource::User => "user",
            ConfigLayerSource::Project => "project",
            ConfigLayerSource::Cwd => "cwd",
            ConfigLayerSource::Override => "override",
        }
    }
}

/// A layer that was found and merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigLayer {
    pub source: ConfigLayerSource,
    pub path: PathBuf,
}

impl ConfigLayer {
    /// `source(path)`, used to prefix schema errors.
    pub fn label(&self) -> String {
        format!("{}({})", self.source.name(), self.path.display())
    }
}

/// Layer locations. [`LayeredConfigOptions::new`] fills in the defaults.
#[derive(Debug, Clone)]
pub struct LayeredConfigOptions {
    pub cwd: PathBuf,
    /// `/etc/recollect/recollect.json5` on Unix by default.
    pub system_config_path: Option<PathBuf>,
    /// `~/.recollect/recollect.json5` by default.
    pub user_config_path: Option<PathBuf>,
    pub override_paths: Vec<PathBuf>,
    /// Entries whose presence marks a directory as the project root.
    pub root_markers: Vec<String>,
}

impl LayeredConfigOptions {
    pub fn new(cwd: impl AsRef<Path>) -> Self {
        Self {
            cwd: cwd.as_ref().to_path_buf(),
            system_config_path: discovery::system_config_path(),
            user_config_path: discovery::user_config_path(),
            override_paths: Vec::new(),
            root_markers: vec![".git".to_string()],
        }
    }

    /// Append an override layer; later overrides win.
    pub fn with_override(mut self, path: impl AsRef<Path>) -> Self {
        self.override_paths.push(path.as_ref().to_path_buf());
        self
    }
}

impl RecollectConfig {
    /// Load exactly one file, with no layering.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("loading config (path={})", path.display());
        Self::from_document(json5::from_str(&fs::read_to_string(path)?)?, "config")
    }

    pub fn load_from_str(contents: &str) -> Result<Self, ConfigError> {
        debug!("loading config from string (len={})", contents.len());
        Self::from_document(json5::from_str(contents)?, "config")
    }

    /// Load the default layer stack around `cwd`.
    pub fn load_layered(cwd: impl AsRef<Path>) -> Result<LayeredConfig, ConfigError> {
        Self::load_layered_with_options(LayeredConfigOptions::new(cwd))
    }

    pub fn load_layered_with_options(
        options: LayeredConfigOptions,
    ) -> Result<LayeredConfig, ConfigError> {
        let candidates = discovery::candidates(&options)?;
        let mut visited = HashSet::new();
        let mut merged = Value::Object(Map::new());
        let mut layers = Vec::new();
        for candidate in candidates {
            if !visited.insert(discovery::identity(&candidate.layer.path)) {
                debug!("layer already merged (label={})", candidate.layer.label());
                continue;
            }
            let Some(document) = read_layer(&candidate)? else {
                continue;
            };
            merge::overlay(&mut merged, document);
            layers.push(candidate.layer);
        }
        let config = Self::from_document(merged, "merged")?;
        info!("layered config loaded (layers={})", layers.len());
        Ok(LayeredConfig { config, layers })
    }

    fn from_document(document: Value, label: &str) -> Result<Self, ConfigError> {
        schema::check_layer(&document, label)?;
        let config: RecollectConfig = serde_json::from_value(document)?;
        config.validate()?;
        Ok(config)
    }
}

/// Parsed and schema-checked layer, or `None` for an absent optional one.
fn read_layer(candidate: &discovery::Candidate) -> Result<Option<Value>, ConfigError> {
    let path = &candidate.layer.path;
    if !path.is_file() {
        if candidate.required {
            return Err(ConfigError::MissingOverride { path: path.clone() });
        }
        debug!("no config layer (label={})", candidate.layer.label());
        return Ok(None);
    }
    let document: Value = json5::from_str(&fs::read_to_string(path)?)?;
    schema::check_layer(&document, &candidate.layer.label())?;
    debug!("read config layer (label={})", candidate.layer.label());
    Ok(Some(document))
}
