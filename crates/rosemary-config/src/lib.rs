// SPDX-FileCopyrightText: 2026 Rosemary Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Rosemary memory engine.
//!
//! TOML parsing with strict `deny_unknown_fields`, an XDG file hierarchy,
//! `ROSEMARY_*` environment overrides, semantic validation, and miette
//! diagnostics with typo suggestions.
//!
//! ```no_run
//! use rosemary_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("topic threshold: {}", config.memory.topic_threshold);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::RosemaryConfig;

/// Loads configuration from the XDG hierarchy and validates it.
pub fn load_and_validate() -> Result<RosemaryConfig, Vec<ConfigError>> {
    finish(loader::load_config(), collect_toml_sources)
}

/// Loads configuration from an explicit file and validates it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<RosemaryConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Loads configuration from an inline TOML string and validates it.
pub fn load_and_validate_str(toml_content: &str) -> Result<RosemaryConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

fn finish(
    loaded: Result<RosemaryConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<RosemaryConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            tracing::debug!(
                domains = config.domains.vocabulary.len(),
                dimensions = config.embedding.dimensions,
                "configuration loaded"
            );
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err, &sources())),
    }
}

/// Reads every existing config file so diagnostics can point into it.
fn collect_toml_sources() -> Vec<(String, String)> {
    loader::config_paths()
        .into_iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(&path).ok()?;
            let name = if path.is_relative() {
                std::env::current_dir()
                    .map(|d| d.join(&path).display().to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            } else {
                path.display().to_string()
            };
            Some((name, content))
        })
        .collect()
}
