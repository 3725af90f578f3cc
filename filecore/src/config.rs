//! Configuration surface, per spec.md §6.
//!
//! A single TOML file under the user's config directory, loaded with
//! serde + `toml`. Missing file or parse failure both fall back to
//! defaults rather than erroring — matching the "ambient stack" loading
//! behaviour: a file manager core should still start with a broken config
//! file present.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_task_limit() -> usize {
    16
}

fn default_context_queue_capacity() -> usize {
    4096
}

fn default_search_batch_size() -> usize {
    100
}

/// Top-level configuration, covering the pool runner's parallelism (§4.A,
/// §6) plus the paths the ambient components (thumbnails, starred files,
/// search index) need.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub task_limit: usize,
    pub context_queue_capacity: usize,
    pub search_batch_size: usize,
    pub starred_files_path: Option<PathBuf>,
    pub search_index_path: Option<PathBuf>,
    pub thumbnail_cache_dir: Option<PathBuf>,
    pub recents_path: Option<PathBuf>,
    /// `argv` of the external thumbnailer, freedesktop-`Exec`-style: `%i`
    /// is replaced with the source path, `%o` with the destination PNG
    /// path, `%s` with the requested pixel size. `None` means no
    /// subprocess is ever attempted; formats outside the in-process
    /// decoder's set then fail straight to `ThumbnailState::Failed`.
    pub thumbnailer_command: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            task_limit: default_task_limit(),
            context_queue_capacity: default_context_queue_capacity(),
            search_batch_size: default_search_batch_size(),
            starred_files_path: None,
            search_index_path: None,
            thumbnail_cache_dir: None,
            recents_path: None,
            thumbnailer_command: None,
        }
    }
}

impl Config {
    /// Loads from `path`, falling back to defaults (with a logged warning)
    /// on a missing file or a parse error.
    pub fn load(path: &std::path::Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => match toml::from_str(&text) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(target: "filecore::config", error = %e, "failed to parse config, using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                tracing::debug!(target: "filecore::config", error = %e, "no config file, using defaults");
                Config::default()
            }
        }
    }

    /// The process default config path, under the host's config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("org", "filecore", "filecore")
            .map(|d| d.config_dir().join("filecore.toml"))
    }

    pub fn load_default() -> Self {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Config::default(),
        }
    }
}
