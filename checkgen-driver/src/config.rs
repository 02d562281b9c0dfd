//! JSON configuration file
//!
//! ```json
//! {
//!     "result_type": "Result",
//!     "preamble": "/* Copyright ... */",
//!     "includes": ["<stdbool.h>", "<stdint.h>", "<stdlib.h>"],
//!     "defines": ["WASM_RUNTIME_API_EXTERN="],
//!     "include_dirs": ["include"],
//!     "output_dir": "generated",
//!     "cpp": "gcc"
//! }
//! ```
//!
//! Relative paths are taken relative to the configuration file.

use anyhow::{Context, Result};
use checkgen_core::GeneratorOptions;
use checkgen_frontend::FrontEndOptions;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub result_type: Option<String>,
    pub preamble: Option<String>,
    pub includes: Option<Vec<String>>,
    pub defines: Vec<String>,
    pub include_dirs: Vec<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub cpp: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("cannot read config '{}'", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&text).with_context(|| format!("invalid config '{}'", path.display()))?;

        if let Some(base) = path.parent() {
            for dir in &mut config.include_dirs {
                *dir = base.join(&*dir);
            }
            config.output_dir = config.output_dir.map(|dir| base.join(dir));
        }
        Ok(config)
    }

    pub fn generator_options(&self) -> GeneratorOptions {
        let defaults = GeneratorOptions::default();
        GeneratorOptions {
            result_type: self.result_type.clone().unwrap_or(defaults.result_type),
            preamble: self.preamble.clone(),
            includes: self.includes.clone().unwrap_or(defaults.includes),
        }
    }

    pub fn front_end_options(&self) -> FrontEndOptions {
        FrontEndOptions {
            defines: self.defines.clone(),
            include_dirs: self.include_dirs.clone(),
            cpp: self.cpp.clone(),
        }
    }
}
