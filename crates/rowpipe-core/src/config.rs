//! Pipeline configuration that downstream crates can serialize/deserialize.
//!
//! There is no process-wide state: whoever needs config discovery receives a
//! `PipelineConfig` value explicitly.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directories searched, in order, for config files. A leading `~` is
    /// expanded to the user's home directory.
    pub search_paths: Vec<PathBuf>,

    /// Distinct-value cap used by audit nodes that don't set their own.
    pub distinct_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            search_paths: vec![
                PathBuf::from("/etc/rowpipe"),
                PathBuf::from("~/.rowpipe"),
                PathBuf::from("./.rowpipe"),
            ],
            distinct_threshold: 1000,
        }
    }
}

impl PipelineConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `ROWPIPE_SEARCH_PATHS`: `:`-separated list of directories
    /// - `ROWPIPE_DISTINCT_THRESHOLD`: audit distinct-value cap
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("ROWPIPE_SEARCH_PATHS") {
            let paths: Vec<PathBuf> = s
                .split(':')
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .collect();
            if !paths.is_empty() {
                cfg.search_paths = paths;
            }
        }

        if let Ok(s) = std::env::var("ROWPIPE_DISTINCT_THRESHOLD") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.distinct_threshold = v;
            }
        }

        cfg
    }

    /// Search paths with `~` expanded.
    pub fn resolved_search_paths(&self) -> Vec<PathBuf> {
        self.search_paths.iter().map(|p| expand_home(p)).collect()
    }

    /// First existing `<search_path>/<file_name>`.
    pub fn discover(&self, file_name: &str) -> Option<PathBuf> {
        self.resolved_search_paths()
            .into_iter()
            .map(|dir| dir.join(file_name))
            .find(|candidate| candidate.is_file())
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
