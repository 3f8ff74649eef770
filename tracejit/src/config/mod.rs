//! Pipeline configuration
//!
//! ```toml
//! opt_level = "release"
//! passes = ["constant_fold", "virtualize"]   # optional; overrides opt_level
//! verbose = true
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::optimizer::{ConstantFold, GuardPropagation, OptLevel, OptimizationStage, Virtualize};

/// A selectable optimization stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    ConstantFold,
    GuardPropagation,
    Virtualize,
}

impl PassKind {
    /// Construct the stage, building its dispatch table
    pub fn stage(self) -> Box<dyn OptimizationStage> {
        match self {
            PassKind::ConstantFold => Box::new(ConstantFold::new()),
            PassKind::GuardPropagation => Box::new(GuardPropagation::new()),
            PassKind::Virtualize => Box::new(Virtualize::new()),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Optimization level
    pub opt_level: OptLevel,
    /// Explicit stage list, in chain order
    pub passes: Option<Vec<PassKind>>,
    /// Verbose output
    pub verbose: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            opt_level: OptLevel::Release,
            passes: None,
            verbose: false,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Set optimization level
    pub fn opt_level(mut self, level: OptLevel) -> Self {
        self.opt_level = level;
        self
    }

    /// Set an explicit stage list
    pub fn passes(mut self, passes: Vec<PassKind>) -> Self {
        self.passes = Some(passes);
        self
    }

    /// Set verbose mode
    pub fn verbose(mut self, v: bool) -> Self {
        self.verbose = v;
        self
    }

    /// Stages to run, in order
    pub fn effective_passes(&self) -> Vec<PassKind> {
        match &self.passes {
            Some(passes) => passes.clone(),
            None => self.opt_level.passes().to_vec(),
        }
    }
}
