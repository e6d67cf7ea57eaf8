//! Where config layers live on disk.

use super::{CONFIG_FILE_NAME, ConfigLayer, ConfigLayerSource, LayeredConfigOptions};
use crate::ConfigError;
use directories::UserDirs;
use log::debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub(super) struct Candidate {
    pub(super) layer: ConfigLayer,
    pub(super) required: bool,
}

impl Candidate {
    fn optional(source: ConfigLayerSource, path: PathBuf) -> Self {
        Self {
            layer: ConfigLayer { source, path },
            required: false,
        }
    }
}

/// Every place a layer may live, lowest precedence first.
pub(super) fn candidates(options: &LayeredConfigOptions) -> Result<Vec<Candidate>, ConfigError> {
    let cwd = match options.cwd.canonicalize() {
        Ok(cwd) => cwd,
        Err(err) if err.kind() == ErrorKind::NotFound => options.cwd.clone(),
        Err(err) => return Err(err.into()),
    };
    let mut found = Vec::new();
    if let Some(path) = &options.system_config_path {
        found.push(Candidate::optional(ConfigLayerSource::System, path.clone()));
    }
    if let Some(path) = &options.user_config_path {
        found.push(Candidate::optional(ConfigLayerSource::User, path.clone()));
    }
    match project_root(&cwd, &options.root_markers) {
        Some(root) => found.push(Candidate::optional(
            ConfigLayerSource::Project,
            root.join(CONFIG_FILE_NAME),
        )),
        None => debug!("no project root above {}", cwd.display()),
    }
    found.push(Candidate::optional(
        ConfigLayerSource::Cwd,
        cwd.join(CONFIG_FILE_NAME),
    ));
    found.extend(options.override_paths.iter().map(|path| Candidate {
        layer: ConfigLayer {
            source: ConfigLayerSource::Override,
            path: path.clone(),
        },
        required: true,
    }));
    Ok(found)
}

/// Same file reached through two layers compares equal.
pub(super) fn identity(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn project_root(cwd: &Path, markers: &[String]) -> Option<PathBuf> {
    cwd.ancestors()
        .find(|dir| markers.iter().any(|marker| dir.join(marker).exists()))
        .map(Path::to_path_buf)
}

pub(super) fn system_config_path() -> Option<PathBuf> {
    cfg!(unix).then(|| PathBuf::from("/etc/recollect").join(CONFIG_FILE_NAME))
}

pub(super) fn user_config_path() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join(".recollect").join(CONFIG_FILE_NAME))
}
