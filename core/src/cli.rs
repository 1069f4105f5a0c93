use std::cell::RefCell;
use std::env;
use std::io;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;

use crate::commands::{run_target, FunctionPack, RunOptions, SourceStack, World};
use crate::config::{Config, CONFIG_PATH_ENV};
use crate::execution::{FunctionResolver, PrintTracer, Tracer};
use crate::logging;

#[derive(Parser)]
#[command(name = "cmdchain")]
#[command(about = "cmdchain - run command-chain function packs", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a function or function tag from a pack
    Run {
        /// Pack file (.json or .toml)
        pack: PathBuf,

        /// Function id (`ns:path`) or tag (`#ns:tag`)
        function: String,

        /// Macro arguments (JSON object)
        #[arg(long)]
        args: Option<String>,

        /// Run as this entity instead of the server
        #[arg(long = "as")]
        as_entity: Option<String>,

        /// Print an execution trace to stdout
        #[arg(long)]
        trace: bool,
    },

    /// Load a pack and instantiate every function that takes no arguments
    Check {
        /// Pack file (.json or .toml)
        pack: PathBuf,
    },
}

/// Run the CLI by parsing process arguments
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli)
}

/// Run the CLI with provided arguments
pub fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli)
}

fn run_cli_with_args(cli: Cli) -> Result<()> {
    if let Some(config_path) = &cli.config {
        env::set_var(CONFIG_PATH_ENV, config_path);
    }

    let config = Config::load()?;
    logging::init(&config.logging.filter);

    match cli.command {
        Commands::Run {
            pack,
            function,
            args,
            as_entity,
            trace,
        } => {
            let pack = FunctionPack::load(&pack, config.trace_dir.clone())
                .with_context(|| format!("Failed to load pack {}", pack.display()))?;
            let arguments: Option<JsonValue> = args
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .context("--args must be valid JSON")?;

            let world = Rc::new(World::new());
            let mut source = SourceStack::server(Rc::clone(&world));
            if let Some(entity) = &as_entity {
                source = source.with_entity(entity);
            }

            let tracer = trace.then(|| Rc::new(RefCell::new(PrintTracer::new(io::stdout()))));
            let options = RunOptions {
                arguments: arguments.as_ref(),
                limits: config.engine.limits(),
                tracer: tracer
                    .as_ref()
                    .map(|tracer| Box::new(Rc::clone(tracer)) as Box<dyn Tracer>),
            };

            let outcome = run_target(&pack, &function, &source, options);
            if let Some(tracer) = &tracer {
                tracer.borrow_mut().flush()?;
                println!();
            }

            for line in world.console() {
                println!("[{}] {}", line.sender, line.text);
            }
            let report = outcome.with_context(|| format!("Failed to run {function}"))?;

            println!("\nResults:");
            if report.results.is_empty() {
                println!("  (none)");
            }
            for result in &report.results {
                let status = if result.success { "success" } else { "failure" };
                println!("  {} -> {} ({})", result.function, result.result, status);
            }

            let errors = world.errors();
            if !errors.is_empty() {
                println!("\nErrors:");
                for error in &errors {
                    let forked = if error.forked { " (forked)" } else { "" };
                    println!("  [{}] {}{}", error.sender, error.message, forked);
                }
            }

            let scores = world.scores();
            if !scores.is_empty() {
                println!("\nScores:");
                for (holder, objective, value) in &scores {
                    println!("  {holder} {objective} = {value}");
                }
            }

            println!("\nExecuted {} command(s)", report.executed_commands);
        }

        Commands::Check { pack } => {
            let pack = FunctionPack::load(&pack, config.trace_dir.clone())
                .with_context(|| format!("Failed to load pack {}", pack.display()))?;

            let mut checked = 0;
            let mut macros = 0;
            let mut failures = Vec::new();
            for id in pack.function_ids() {
                let Some(function) = pack.function(id) else {
                    continue;
                };
                let is_macro = pack
                    .definition(id)
                    .is_some_and(|def| !def.params.is_empty());
                if is_macro {
                    macros += 1;
                    continue;
                }
                match function.instantiate(None) {
                    Ok(_) => checked += 1,
                    Err(error) => failures.push(format!("{id}: {error}")),
                }
            }

            println!("Checked {checked} function(s), skipped {macros} macro function(s)");
            if !failures.is_empty() {
                for failure in &failures {
                    eprintln!("  {failure}");
                }
                bail!("{} function(s) failed to instantiate", failures.len());
            }
        }
    }

    Ok(())
}
