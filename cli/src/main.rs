//! Command-line driver for the grounder pipeline (spec §6 "Public API").
//!
//! Reads a JSON-serialized [`Theory`]/[`Structure`] pair and runs one of
//! three pipeline entry points against it: `propagate` (bounds propagation
//! only), `ground` (build the grounder tree and print ECNF, no solving), or
//! `expand` (model expansion against the `test-solver`-gated reference
//! solver). A production deployment would substitute a real
//! [`fobdd_ground_core::solver::GroundSolver`] for `expand`; this binary only
//! ever reaches for the reference one (SPEC_FULL §13), so `expand` is built
//! conditionally on the same feature.

#![deny(missing_debug_implementations, missing_copy_implementations, trivial_casts, trivial_numeric_casts, unsafe_code)]

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use fobdd_ground_core::config::Options;
use fobdd_ground_core::error::GroundingError;
use fobdd_ground_core::inference;
use fobdd_ground_core::solver::ecnf::EcnfWriter;
use fobdd_ground_core::structure::Structure;
use fobdd_ground_core::termination::TerminationFlag;
use fobdd_ground_core::theory::Theory;

/// A theory plus the structure it is grounded or propagated against: the
/// unit of input this binary reads, one JSON document holding both halves.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct Input {
    theory: Theory,
    structure: Structure,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Ecnf,
}

#[derive(Debug, Parser)]
#[command(name = "fobdd-ground", version, about = "Grounder pipeline driver: propagate bounds, ground a theory, or run model expansion")]
struct App {
    /// Path to a JSON document holding `{"theory": ..., "structure": ...}`.
    input: PathBuf,

    /// Verbosity: repeat for more (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging output regardless of `--verbose`.
    #[arg(short, long)]
    quiet: bool,

    /// Write the result to this path instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run bounds propagation (§4.3) and print the tightened structure.
    Propagate,
    /// Build the grounder tree and print the resulting ECNF theory.
    Ground {
        #[arg(value_enum, long, default_value = "ecnf")]
        format: OutputFormat,
    },
    /// Run model expansion against the brute-force reference solver
    /// (SPEC_FULL §13; not a production solver).
    #[cfg(feature = "test-solver")]
    Expand {
        /// Number of models to request (0 = unbounded).
        #[arg(long, default_value_t = 1)]
        nb_models: usize,
    },
    /// Evaluate every inductive definition to fixpoint (§4.7) and print the
    /// resulting structure.
    Definitions,
}

impl App {
    fn init_logging(&self) {
        if self.quiet {
            return;
        }
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }

    fn run(&self) -> Result<String, GroundingError> {
        let text = fs::read_to_string(&self.input).map_err(|e| GroundingError::Configuration(format!("reading {}: {e}", self.input.display())))?;
        let input: Input = serde_json::from_str(&text).map_err(|e| GroundingError::Configuration(format!("parsing {}: {e}", self.input.display())))?;
        let options = Options::default();
        let flag = TerminationFlag::new();

        match &self.command {
            Command::Propagate => {
                let tightened = inference::propagate(&input.theory, &input.structure, &options, &flag)?;
                serde_json::to_string_pretty(&tightened).map_err(|e| GroundingError::Configuration(e.to_string()))
            }
            Command::Ground { format } => {
                let mut translator = fobdd_ground_core::solver::GroundTranslator::new();
                let mut grounder = fobdd_ground_core::grounding::build(&input.theory, &input.structure)?;
                let ground = grounder.run(&mut translator, &input.structure)?;
                match format {
                    OutputFormat::Ecnf => Ok(EcnfWriter::write(&ground)),
                    OutputFormat::Json => serde_json::to_string_pretty(&ground).map_err(|e| GroundingError::Configuration(e.to_string())),
                }
            }
            #[cfg(feature = "test-solver")]
            Command::Expand { nb_models } => {
                let options = Options { nb_models: *nb_models, ..options };
                let mut solver = fobdd_ground_core::solver::reference::BruteForceSolver::new();
                let result = inference::modelexpand(&input.theory, &input.structure, &options, &mut solver, &flag)?;
                serde_json::to_string_pretty(&result).map_err(|e| GroundingError::Configuration(e.to_string()))
            }
            Command::Definitions => {
                let result = inference::calculate_definitions(&input.theory, &input.structure, &options, &flag)?;
                serde_json::to_string_pretty(&result).map_err(|e| GroundingError::Configuration(e.to_string()))
            }
        }
    }
}

fn main() -> ExitCode {
    let app = App::parse();
    app.init_logging();
    match app.run() {
        Ok(text) => {
            match &app.output {
                Some(path) => {
                    if let Err(e) = fs::write(path, text) {
                        eprintln!("error writing {}: {e}", path.display());
                        return ExitCode::FAILURE;
                    }
                }
                None => println!("{text}"),
            }
            ExitCode::SUCCESS
        }
        Err(GroundingError::Unsat) => {
            println!("UNSAT");
            ExitCode::from(20)
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
