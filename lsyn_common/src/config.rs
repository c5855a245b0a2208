//! Pipeline configuration.
//!
//! The two main concepts are:
//! - opt: which optimization passes run, for how many rounds, and whether a
//!   fold error aborts the pass (strict) or is only reported.
//! - strategy: the technology-mapping objective, `area_optimal` or
//!   `delay_optimal`. Any other spelling is a configuration error; there is no
//!   silent fallback.
//!
//! ```ignore
//! use lsyn_common::{Config, MapStrategy};
//! let cfg = Config::builder()
//!     .strategy(MapStrategy::DelayOptimal)
//!     .max_rounds(4)
//!     .strict(true)
//!     .build()?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while assembling a [`Config`].
///
/// These are always reported before any netlist is touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The mapping strategy text is not one of the recognized options.
    #[error("Unknown mapping strategy '{0}' (expected 'area_optimal' or 'delay_optimal')")]
    UnknownStrategy(String),

    /// The pass name is not one of the recognized optimization passes.
    #[error("Unknown optimization pass '{0}' (expected strash, constprop, dce or balance)")]
    UnknownPass(String),

    /// The optimization driver needs at least one round.
    #[error("Optimization round limit must be at least 1")]
    ZeroRounds,

    /// A library file was named but does not exist.
    #[error("Cell library not found: {}", .0.display())]
    MissingLibrary(PathBuf),
}

/// Technology-mapping objective.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapStrategy {
    /// Minimize the summed area of all selected cell instances.
    #[default]
    AreaOptimal,
    /// Minimize the critical-path arrival time; ties broken by area.
    DelayOptimal,
}

impl MapStrategy {
    /// Every recognized strategy, in a stable order.
    pub const ALL: [Self; 2] = [Self::AreaOptimal, Self::DelayOptimal];

    /// The textual selector for this strategy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AreaOptimal => "area_optimal",
            Self::DelayOptimal => "delay_optimal",
        }
    }
}

impl fmt::Display for MapStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownStrategy(s.to_string()))
    }
}

/// One of the optimization passes the driver knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    /// Structural hashing.
    Strash,
    /// Constant propagation.
    #[serde(rename = "constprop")]
    ConstProp,
    /// Dead-code elimination.
    Dce,
    /// Associative-chain rebalancing.
    Balance,
}

impl PassKind {
    /// The pass order used when none is configured.
    pub const DEFAULT_ORDER: [Self; 4] = [Self::Strash, Self::ConstProp, Self::Dce, Self::Balance];

    /// Name of the pass as used in reports and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strash => "strash",
            Self::ConstProp => "constprop",
            Self::Dce => "dce",
            Self::Balance => "balance",
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::DEFAULT_ORDER
            .into_iter()
            .find(|pass| pass.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownPass(s.to_string()))
    }
}

/// Settings of the optimization driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptConfig {
    /// Passes run in each round, in order.
    pub passes: Vec<PassKind>,
    /// Upper bound on driver rounds; the driver stops earlier at a fixed point.
    pub max_rounds: usize,
    /// Abort (and roll back) a pass on fold errors instead of skipping the fold.
    pub strict: bool,
}

impl Default for OptConfig {
    fn default() -> Self {
        Self {
            passes: PassKind::DEFAULT_ORDER.to_vec(),
            max_rounds: 8,
            strict: false,
        }
    }
}

/// Whole-pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Top module to elaborate; `None` picks the single uninstantiated module.
    pub top: Option<String>,
    /// Run the optimization passes before mapping.
    pub optimize: bool,
    /// Optimization driver settings.
    pub opt: OptConfig,
    /// Technology-mapping objective.
    pub strategy: MapStrategy,
    /// Cell library file; `None` selects the built-in generic library.
    pub library: Option<PathBuf>,
}

impl Config {
    /// Start building a configuration from the defaults.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for [`Config`]; validation happens in [`ConfigBuilder::build`].
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    /// Configuration under construction.
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            config: Config {
                optimize: true,
                ..Config::default()
            },
        }
    }
}

impl ConfigBuilder {
    /// Select the top module by name.
    #[must_use]
    pub fn top(mut self, top: impl Into<String>) -> Self {
        self.config.top = Some(top.into());
        self
    }

    /// Enable or disable the optimization passes.
    #[must_use]
    pub const fn optimize(mut self, optimize: bool) -> Self {
        self.config.optimize = optimize;
        self
    }

    /// Replace the pass list.
    #[must_use]
    pub fn passes(mut self, passes: impl IntoIterator<Item = PassKind>) -> Self {
        self.config.opt.passes = passes.into_iter().collect();
        self
    }

    /// Set the maximum number of driver rounds.
    #[must_use]
    pub const fn max_rounds(mut self, rounds: usize) -> Self {
        self.config.opt.max_rounds = rounds;
        self
    }

    /// Enable strict fold-error handling.
    #[must_use]
    pub const fn strict(mut self, strict: bool) -> Self {
        self.config.opt.strict = strict;
        self
    }

    /// Set the mapping strategy.
    #[must_use]
    pub const fn strategy(mut self, strategy: MapStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the mapping strategy from its textual selector.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownStrategy`] for anything other than
    /// `area_optimal` or `delay_optimal`.
    pub fn strategy_str(mut self, strategy: &str) -> Result<Self, ConfigError> {
        self.config.strategy = strategy.parse()?;
        Ok(self)
    }

    /// Use the cell library stored at `path`.
    #[must_use]
    pub fn library(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.library = Some(path.into());
        self
    }

    /// Validate and return the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroRounds`] when the round limit is zero and
    /// [`ConfigError::MissingLibrary`] when a named library file does not exist.
    pub fn build(self) -> Result<Config, ConfigError> {
        if self.config.optimize && self.config.opt.max_rounds == 0 {
            return Err(ConfigError::ZeroRounds);
        }
        if let Some(path) = &self.config.library
            && !path.exists()
        {
            return Err(ConfigError::MissingLibrary(path.clone()));
        }
        Ok(self.config)
    }
}
