//! replicant - inspect and verify replicant dump streams

use anyhow::{Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use replicant::record::MemoryStore;
use replicant::{
    Loader, LoaderConfig, Status, StreamReader, TypeRegistry, UnresolvedPolicy, Verbosity,
};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// replicant - inspect and verify replicant dump streams
#[derive(ClapParser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every tuple in a stream
    Inspect {
        /// Stream file, or - for stdin
        file: PathBuf,
    },
    /// Replay a stream into an in-memory store and report what was loaded
    Check {
        /// Stream file, or - for stdin
        file: PathBuf,

        /// What to do with references to records not seen earlier in the stream
        #[arg(long, value_enum, default_value_t = UnresolvedPolicy::WarnAndNull)]
        on_unresolved: UnresolvedPolicy,

        /// Print one line per loaded tuple
        #[arg(short, long, conflicts_with = "quiet")]
        verbose: bool,

        /// Print nothing but errors
        #[arg(short, long)]
        quiet: bool,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match args.command {
        Command::Inspect { file } => inspect(&file),
        Command::Check {
            file,
            on_unresolved,
            verbose,
            quiet,
        } => {
            let verbosity = if verbose {
                Verbosity::Verbose
            } else if quiet {
                Verbosity::Quiet
            } else {
                Verbosity::Normal
            };
            check(&file, on_unresolved, verbosity)
        }
    }
}

/// Open a stream file, treating `-` as stdin
fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn inspect(path: &Path) -> Result<()> {
    let input = open_input(path)?;
    let mut count = 0;
    for tuple in StreamReader::new(input) {
        let tuple = tuple.with_context(|| format!("Failed to read tuple {}", count + 1))?;
        println!("{} {}", tuple.type_name, tuple.id);
        for (name, value) in &tuple.attributes {
            println!("    {} = {}", name, value);
        }
        count += 1;
    }
    println!("{} tuples", count);
    Ok(())
}

fn check(path: &Path, policy: UnresolvedPolicy, verbosity: Verbosity) -> Result<()> {
    let input = open_input(path)?;

    let mut registry = TypeRegistry::new();
    registry.set_fallback(MemoryStore::new());
    let config = LoaderConfig {
        on_unresolved_reference: policy,
    };
    let mut loader = Loader::with_config(registry, config);
    loader.listen(Status::new(io::stderr(), "load", verbosity));

    let count = loader.read(input).context("Failed to load stream")?;
    loader.complete()?;

    if loader.unresolved() > 0 {
        eprintln!(
            "{} tuples loaded, {} references unresolved",
            count,
            loader.unresolved()
        );
    } else if verbosity != Verbosity::Quiet {
        eprintln!("{} tuples loaded, all references resolved", count);
    }
    Ok(())
}
