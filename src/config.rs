use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct MyBlocksConfig {
    pub output: OutputConfig,
    pub cli: CliConfig,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    /// Prepended to the destination file name to form the output file.
    pub prefix: String,
    /// Spaces per level when writing project.json or dumping.
    pub indent: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            prefix: "new_".to_string(),
            indent: 4,
        }
    }
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(default)]
pub struct CliConfig {
    /// Exit with an error instead of only printing help on a missing or
    /// unknown command.
    pub strict_usage: bool,
}

impl MyBlocksConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let src = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", crate::format_path(path)))?;
        Self::from_toml(&src)
            .with_context(|| format!("Invalid config file: {}", crate::format_path(path)))
    }

    pub fn from_toml(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }
}
