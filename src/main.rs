use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use typelox::ast_printer::AstPrinter;
use typelox::interpreter::{InterpreterConfig, DEFAULT_MAX_CALL_DEPTH};
use typelox::scanner::Scanner;
use typelox::session::{Session, EXIT_DIAGNOSTIC};
use typelox::token::Token;

/// Exit code for a malformed command line.
const EXIT_USAGE: i32 = 64;

/// Stack for the interpreter thread; deeply nested source recurses in the
/// parser and resolver.
const INTERPRETER_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(ClapParser, Debug)]
#[command(version, about = "Typed Lox language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,

    /// Maximum nested call depth before a stack overflow is reported
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_CALL_DEPTH)]
    max_call_depth: usize,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print the tokens as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints it back
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs a program from a file, or starts the REPL when no file is given
    Run { filename: Option<PathBuf> },
}

/// Reads the contents of a file into a String
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let bytes = reader
        .read_to_end(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    String::from_utf8(buf).context(format!("File {:?} is not valid UTF-8", filename))
}

fn init_logger() -> Result<()> {
    // Create or open the log file
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("typelox::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn tokenize(filename: &PathBuf, json: bool) -> Result<i32> {
    info!("Running Tokenize subcommand");
    let source = read_file(filename)?;

    let mut tokens: Vec<Token> = Vec::new();
    let mut tokenized = true;

    for token in Scanner::new(&source) {
        match token {
            Ok(token) => {
                debug!("Scanned token: {}", token);
                if !json {
                    println!("{}", token);
                }
                tokens.push(token);
            }

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if json {
        let rendered = serde_json::to_string_pretty(&tokens).context("Failed to serialize tokens")?;
        println!("{}", rendered);
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code {}", EXIT_DIAGNOSTIC);
        return Ok(EXIT_DIAGNOSTIC);
    }

    info!("Tokenization completed successfully");
    Ok(0)
}

fn repl(session: &mut Session) -> Result<i32> {
    println!("Opening interactive shell. Run '::exit' or hit ^D to exit.");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read from stdin")?,
            None => break,
        };

        if line.trim() == "::exit" {
            break;
        }

        session.run_repl_line(&line);
        session.reset_errors();
    }

    println!("Shell closed.");
    Ok(0)
}

fn dispatch(args: Cli) -> Result<i32> {
    let config = InterpreterConfig {
        max_call_depth: args.max_call_depth,
    };

    match args.commands {
        Commands::Tokenize { filename, json } => tokenize(&filename, json),

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");
            let source = read_file(&filename)?;
            let mut session = Session::with_config(config);

            match session.parse_expression(&source) {
                Some(expr) => {
                    let printed = AstPrinter::print(&expr);
                    debug!("AST: {}", printed);
                    println!("{}", printed);
                }
                None => debug!("Parse failed"),
            }

            Ok(session.exit_code().unwrap_or(0))
        }

        Commands::Evaluate { filename } => {
            info!("Running Evaluate subcommand");
            let source = read_file(&filename)?;
            let mut session = Session::with_config(config);

            if let Some(value) = session.evaluate(&source) {
                debug!("Evaluated to: {}", value);
                println!("{}", value);
            }

            Ok(session.exit_code().unwrap_or(0))
        }

        Commands::Run { filename } => {
            let mut session = Session::with_config(config);

            match filename {
                Some(filename) => {
                    info!("Running Run subcommand");
                    let source = read_file(&filename)?;
                    info!("Provided input:\n {}", source);

                    session.run(&source);
                    Ok(session.exit_code().unwrap_or(0))
                }
                None => {
                    info!("No filepath provided for Run, starting REPL");
                    repl(&mut session)
                }
            }
        }
    }
}

fn main() -> Result<()> {
    let args: Cli = match Cli::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            e.print().context("Failed to print usage")?;
            std::process::exit(EXIT_USAGE);
        }
    };

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    let handle = std::thread::Builder::new()
        .name("interpreter".into())
        .stack_size(INTERPRETER_STACK_SIZE)
        .spawn(move || dispatch(args))
        .context("Failed to spawn interpreter thread")?;

    let code = handle
        .join()
        .map_err(|_| anyhow!("Interpreter thread panicked"))??;

    if code != 0 {
        std::process::exit(code);
    }

    Ok(())
}
