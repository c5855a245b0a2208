//! lsyn command-line entry point.

#[global_allocator]
/// Global allocator using jemalloc.
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use lsyn_cli::{Args, check, compile_file, write};
use tracing::info;

/// Compile one design:
/// 1. Initialize logging
/// 2. Parse arguments into a configuration
/// 3. Load, optimize and map the design
/// 4. Optionally check each stage against the source
/// 5. Write the mapped (and optimized) netlists
fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.to_config()?;
    info!("configuration: {config:?}");

    let compilation = compile_file(&config, &args.input)?;
    if let Some(report) = &compilation.report {
        for error in report.fold_errors() {
            eprintln!("warning: {error}");
        }
    }
    if args.check && !check(&compilation)? {
        eprintln!("warning: equivalence check skipped (opaque nodes or more than 16 input bits)");
    }

    if let Some(path) = &args.optimized {
        write(path, &compilation.optimized.to_json()?)?;
    }
    let mapped = compilation.mapping.netlist.to_json()?;
    match &args.output {
        Some(path) => write(path, &mapped)?,
        None => println!("{mapped}"),
    }
    eprint!("{}", compilation.mapping);
    Ok(())
}
