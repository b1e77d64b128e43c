//! TLAI command line interface
//!
//! Thin wrapper over the `tlai-eval` facade: parse or rewrite a module,
//! enumerate initial states, successors of a given state, or the
//! reachable state graph. States print in TLC style or as ITF JSON.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tlai_core::diagnostic::Diagnostic;
use tlai_core::{LineCol, LineIndex};
use tlai_eval::itf::{state_from_itf, state_to_itf};
use tlai_eval::{Interpreter, InterpreterError, ReachOptions, State};

/// Output format for state listings
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    /// TLC-style conjunction lines
    #[default]
    Human,
    /// Informal Trace Format JSON
    Itf,
}

#[derive(Parser)]
#[command(name = "tlai", version, about = "TLAI: an interpreter for a TLA+ subset")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct ModuleArgs {
    /// TLA+ source file
    file: PathBuf,
    /// Constant binding NAME=EXPR (repeatable)
    #[arg(short = 'c', long = "constant", value_name = "NAME=EXPR")]
    constants: Vec<String>,
    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    format: OutputFormat,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a TLA+ source file and report syntax errors.
    Parse { file: PathBuf },
    /// Print the rewriter's normalized source to stdout.
    Rewrite { file: PathBuf },
    /// Enumerate the states satisfying Init.
    Init {
        #[command(flatten)]
        module: ModuleArgs,
    },
    /// Enumerate the successors of a state given as ITF JSON.
    Next {
        #[command(flatten)]
        module: ModuleArgs,
        /// File holding the ITF state (stdin if omitted)
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Enumerate the reachable state graph from Init under Next.
    Reach {
        #[command(flatten)]
        module: ModuleArgs,
        /// Stop after this many states (0 = unbounded)
        #[arg(long, default_value = "0")]
        max_states: usize,
        /// Explore depth-first instead of breadth-first
        #[arg(long)]
        dfs: bool,
        /// Skip actions whose evaluation fails
        #[arg(long)]
        continue_on_error: bool,
        /// Also print the discovered edges
        #[arg(long)]
        edges: bool,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Parse { file } => {
            let source = read_source(&file)?;
            match tlai_core::rewrite_module(&source) {
                Ok(_) => println!("{}: ok", file.display()),
                Err(e) => {
                    Diagnostic::from_rewrite_error(&e, &source)
                        .eprint(&file.display().to_string(), &source);
                    std::process::exit(1);
                }
            }
        }
        Command::Rewrite { file } => {
            let source = read_source(&file)?;
            let rewritten = tlai_core::rewrite_module(&source)
                .with_context(|| format!("rewriting {}", file.display()))?;
            print!("{}", rewritten.text);
        }
        Command::Init { module } => {
            let (interp, source) = load(&module)?;
            let states =
                report(interp.initial_states(), &interp, &module.file, &source)?;
            print_states(&states, module.format)?;
        }
        Command::Next { module, state } => {
            let (interp, source) = load(&module)?;
            let json = read_state_json(state.as_deref())?;
            let state = state_from_itf(&json).map_err(|e| anyhow::anyhow!("{}", e))?;
            let states =
                report(interp.next_states(&state), &interp, &module.file, &source)?;
            print_states(&states, module.format)?;
        }
        Command::Reach {
            module,
            max_states,
            dfs,
            continue_on_error,
            edges,
        } => {
            let (interp, source) = load(&module)?;
            let opts = ReachOptions {
                max_states: (max_states > 0).then_some(max_states),
                dfs,
                continue_on_action_error: continue_on_error,
            };
            let reach = report(interp.reachable(&opts), &interp, &module.file, &source)?;
            print_states(&reach.states, module.format)?;
            if !reach.complete {
                eprintln!("(search stopped at the {}-state bound)", max_states);
            }
            if edges {
                for (from, to) in &reach.edges {
                    println!("{} -> {}", from, to);
                }
            }
        }
    }
    Ok(())
}

fn read_source(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
}

fn parse_constants(args: &[String]) -> Result<HashMap<String, String>> {
    let mut out = HashMap::new();
    for arg in args {
        let Some((name, expr)) = arg.split_once('=') else {
            bail!("constant binding must look like NAME=EXPR, got {:?}", arg);
        };
        out.insert(name.trim().to_string(), expr.to_string());
    }
    Ok(out)
}

fn load(module: &ModuleArgs) -> Result<(Interpreter, String)> {
    let source = read_source(&module.file)?;
    let constants = parse_constants(&module.constants)?;
    match Interpreter::load(&source, &constants) {
        Ok(interp) => Ok((interp, source)),
        Err(InterpreterError::Rewrite(e)) => {
            Diagnostic::from_rewrite_error(&e, &source)
                .eprint(&module.file.display().to_string(), &source);
            std::process::exit(1);
        }
        Err(e) => bail!("loading {}: {}", module.file.display(), e),
    }
}

/// Unwrap an interpreter result, rendering evaluation errors against
/// the original source
fn report<T>(
    result: Result<T, InterpreterError>,
    interp: &Interpreter,
    file: &Path,
    source: &str,
) -> Result<T> {
    match result {
        Ok(v) => Ok(v),
        Err(InterpreterError::Eval(e)) => {
            let pos = e
                .span()
                .map(|span| interp.original_pos(span))
                .unwrap_or(LineCol { line: 0, col: 0 });
            let index = LineIndex::new(source);
            let offset = (index.line_start(pos.line) + pos.col) as usize;
            Diagnostic::new(e.to_string(), offset, offset + 1)
                .eprint(&file.display().to_string(), source);
            std::process::exit(1);
        }
        Err(e) => bail!("{}", e),
    }
}

fn read_state_json(path: Option<&Path>) -> Result<serde_json::Value> {
    let text = match path {
        Some(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading state from stdin")?;
            buf
        }
    };
    serde_json::from_str(&text).context("parsing ITF state")
}

fn print_states(states: &[State], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Human => {
            for (i, state) in states.iter().enumerate() {
                println!("State {}:", i + 1);
                println!("{}", state);
                println!();
            }
            println!("{} state(s)", states.len());
        }
        OutputFormat::Itf => {
            let out: Vec<serde_json::Value> = states
                .iter()
                .map(|s| state_to_itf(s).map_err(|e| anyhow::anyhow!("{}", e)))
                .collect::<Result<_>>()?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
