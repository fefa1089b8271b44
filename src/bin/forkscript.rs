use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use forkscript::{
    stdlib::standard_functions, value::format_number, Repl, ScriptEngine, ScriptError,
    VariableStore,
};

#[derive(Parser)]
#[command(author, version, about = "Forkable script engine")]
struct Args {
    /// JSON object used as the initial variable store
    #[arg(long, global = true, value_name = "FILE")]
    vars: Option<PathBuf>,

    /// Log engine activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a script file and print the resulting variables
    Run { script: PathBuf },
    /// Execute a snippet and print the resulting variables
    Exec { code: String },
    /// Evaluate an expression as a boolean
    Check { expression: String },
    /// Evaluate an expression as a number
    Number { expression: String },
    /// Render a template string
    Render { template: String },
    /// Start an interactive session
    Repl,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), ScriptError> {
    let mut engine = build_engine(args.vars.as_deref())?;
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => {
            let source = fs::read_to_string(&script)?;
            engine.execute(&source)?;
            print_variables(&engine)
        }
        Command::Exec { code } => {
            engine.execute(&code)?;
            print_variables(&engine)
        }
        Command::Check { expression } => {
            println!("{}", engine.boolean(&expression)?);
            Ok(())
        }
        Command::Number { expression } => {
            println!("{}", format_number(engine.number(&expression)?));
            Ok(())
        }
        Command::Render { template } => {
            println!("{}", engine.string(&template)?);
            Ok(())
        }
        Command::Repl => Repl::new(engine).run(),
    }
}

fn build_engine(vars: Option<&std::path::Path>) -> Result<ScriptEngine, ScriptError> {
    let variables = match vars {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            let json: serde_json::Value = serde_json::from_str(&text)?;
            VariableStore::from_json(&json)?
        }
        None => VariableStore::new(),
    };
    ScriptEngine::new(standard_functions().into_shared(), variables)
}

fn print_variables(engine: &ScriptEngine) -> Result<(), ScriptError> {
    println!(
        "{}",
        serde_json::to_string_pretty(&engine.variables().to_json())?
    );
    Ok(())
}
