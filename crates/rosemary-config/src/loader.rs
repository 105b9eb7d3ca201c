// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/rosemary/rosemary.toml`, `~/.config/rosemary/rosemary.toml`,
//! `./rosemary.toml`, then `ROSEMARY_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::RosemaryConfig;

/// Config sections that env var names are mapped onto.
const SECTIONS: &[&str] = &[
    "agent",
    "memory",
    "domains",
    "embedding",
    "completion",
    "storage",
    "insights",
    "embed_server",
];

/// Candidate config files, lowest precedence first.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/rosemary/rosemary.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("rosemary/rosemary.toml"));
    }
    paths.push(PathBuf::from("rosemary.toml"));
    paths
}

/// Builds the Figment for the standard hierarchy without extracting it.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new().merge(Serialized::defaults(RosemaryConfig::default()));
    for path in config_paths() {
        figment = figment.merge(Toml::file(path));
    }
    figment.merge(env_provider())
}

/// Loads configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<RosemaryConfig, figment::Error> {
    build_figment().extract()
}

/// Loads configuration from an inline TOML string on top of the defaults.
pub fn load_config_from_str(toml_content: &str) -> Result<RosemaryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RosemaryConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Loads configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<RosemaryConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(RosemaryConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Maps `ROSEMARY_<SECTION>_<KEY>` onto `<section>.<key>`.
///
/// Sections are matched by name rather than by splitting on `_`, so
/// `ROSEMARY_MEMORY_TOPIC_THRESHOLD` becomes `memory.topic_threshold` and
/// `ROSEMARY_EMBED_SERVER_PORT` becomes `embed_server.port`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("ROSEMARY_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    // Longest section first so `embed_server_` wins over a shorter prefix.
    let mut sections = SECTIONS.to_vec();
    sections.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for section in sections {
        if let Some(rest) = key.strip_prefix(section).and_then(|r| r.strip_prefix('_')) {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_section_keys_with_underscores() {
        assert_eq!(map_env_key("memory_topic_threshold"), "memory.topic_threshold");
        assert_eq!(map_env_key("completion_api_key"), "completion.api_key");
        assert_eq!(map_env_key("embed_server_port"), "embed_server.port");
        assert_eq!(map_env_key("embedding_service_url"), "embedding.service_url");
    }

    #[test]
    fn unknown_prefix_is_left_alone() {
        assert_eq!(map_env_key("nonsense_key"), "nonsense_key");
    }

    #[test]
    fn env_overrides_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("rosemary.toml", "[memory]\ntopic_threshold = 0.4\n")?;
            jail.set_env("ROSEMARY_MEMORY_TOPIC_THRESHOLD", "0.8");
            jail.set_env("ROSEMARY_STORAGE_DATABASE_PATH", "/tmp/jail.db");

            let config = load_config_from_path(Path::new("rosemary.toml"))?;
            assert!((config.memory.topic_threshold - 0.8).abs() < f64::EPSILON);
            assert_eq!(config.storage.database_path, "/tmp/jail.db");
            Ok(())
        });
    }
}
