//! Configuration management for the EPUB inliner

use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Run the mimetype/container checks after decoding
    pub validate: bool,
    /// Replace stylesheet links with inline `<style>` elements
    pub inline_stylesheets: bool,
    /// Where the binary writes the processed package
    pub output_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a boolean, got '{value}'")]
    InvalidFlag { name: &'static str, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Config {
            validate: true,
            inline_stylesheets: true,
            output_dir: PathBuf::from("./inlined"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        Ok(Config {
            validate: match lookup("EPUB_INLINER_VALIDATE") {
                Some(value) => parse_flag("EPUB_INLINER_VALIDATE", &value)?,
                None => defaults.validate,
            },
            inline_stylesheets: match lookup("EPUB_INLINER_INLINE_STYLESHEETS") {
                Some(value) => parse_flag("EPUB_INLINER_INLINE_STYLESHEETS", &value)?,
                None => defaults.inline_stylesheets,
            },
            output_dir: lookup("EPUB_INLINER_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
        })
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            name,
            value: value.to_string(),
        }),
    }
}
