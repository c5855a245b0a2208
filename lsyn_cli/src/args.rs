use std::path::PathBuf;

use clap::Parser;
use lsyn_common::{Config, ConfigError, MapStrategy};

/// lsyn - optimize a combinational design and map it onto a cell library
#[derive(Parser, Debug)]
#[command(name = "lsyn")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Design to compile: Verilog source (.v) or netlist JSON (.json)
    pub input: PathBuf,

    /// Top module to elaborate (default: the only uninstantiated module)
    #[arg(short = 't', long)]
    pub top: Option<String>,

    /// Cell library JSON file (default: the built-in generic library)
    #[arg(short = 'l', long)]
    pub library: Option<PathBuf>,

    /// Mapping objective
    #[arg(short = 's', long, value_enum, default_value = "area_optimal")]
    pub strategy: StrategyArg,

    /// Maximum number of optimization rounds
    #[arg(short = 'r', long, default_value_t = 8)]
    pub rounds: usize,

    /// Abort a pass on constant-folding errors instead of skipping the fold
    #[arg(long, default_value_t = false)]
    pub strict: bool,

    /// Skip the optimization passes
    #[arg(long, default_value_t = false)]
    pub no_opt: bool,

    /// Compare truth tables before and after each stage (designs up to 16 input bits)
    #[arg(long, default_value_t = false)]
    pub check: bool,

    /// Write the mapped netlist here instead of standard output
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Also write the optimized, unmapped netlist
    #[arg(long)]
    pub optimized: Option<PathBuf>,
}

impl Args {
    /// Convert command-line arguments into the pipeline configuration.
    ///
    /// # Errors
    ///
    /// Whatever [`lsyn_common::ConfigBuilder::build`] rejects.
    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let mut builder = Config::builder()
            .optimize(!self.no_opt)
            .max_rounds(self.rounds)
            .strict(self.strict)
            .strategy(self.strategy.into());
        if let Some(top) = &self.top {
            builder = builder.top(top.clone());
        }
        if let Some(library) = &self.library {
            builder = builder.library(library.clone());
        }
        builder.build()
    }
}

/// Command-line argument wrapper for [`MapStrategy`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StrategyArg {
    /// Minimize total cell area
    #[value(name = "area_optimal")]
    AreaOptimal,
    /// Minimize the critical-path arrival time
    #[value(name = "delay_optimal")]
    DelayOptimal,
}

impl From<StrategyArg> for MapStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::AreaOptimal => Self::AreaOptimal,
            StrategyArg::DelayOptimal => Self::DelayOptimal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsyn_common::PassKind;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["lsyn", "design.v"]).unwrap();
        assert_eq!(args.input, PathBuf::from("design.v"));
        assert_eq!(args.strategy, StrategyArg::AreaOptimal);
        let config = args.to_config().unwrap();
        assert!(config.optimize);
        assert_eq!(config.opt.max_rounds, 8);
        assert_eq!(config.opt.passes, PassKind::DEFAULT_ORDER.to_vec());
        assert_eq!(config.strategy, MapStrategy::AreaOptimal);
        assert!(config.top.is_none());
    }

    #[test]
    fn every_flag() {
        let args = Args::try_parse_from([
            "lsyn",
            "design.json",
            "--top",
            "core",
            "--strategy",
            "delay_optimal",
            "--rounds",
            "3",
            "--strict",
            "--no-opt",
            "--check",
            "-o",
            "out.json",
            "--optimized",
            "opt.json",
        ])
        .unwrap();
        assert!(args.check);
        assert_eq!(args.output, Some(PathBuf::from("out.json")));
        assert_eq!(args.optimized, Some(PathBuf::from("opt.json")));
        let config = args.to_config().unwrap();
        assert_eq!(config.top.as_deref(), Some("core"));
        assert_eq!(config.strategy, MapStrategy::DelayOptimal);
        assert_eq!(config.opt.max_rounds, 3);
        assert!(config.opt.strict);
        assert!(!config.optimize);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Args::try_parse_from(["lsyn", "d.v", "--strategy", "power_optimal"]).is_err());
    }

    #[test]
    fn configuration_errors() {
        let args = Args::try_parse_from(["lsyn", "d.v", "--rounds", "0"]).unwrap();
        assert_eq!(args.to_config(), Err(ConfigError::ZeroRounds));
        let args = Args::try_parse_from(["lsyn", "d.v", "--library", "/no/such/lib.json"]).unwrap();
        assert!(matches!(args.to_config(), Err(ConfigError::MissingLibrary(_))));
    }
}
