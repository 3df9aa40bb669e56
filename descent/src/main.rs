//! descent — command-line driver for the parser generator.
//!
//! Run `cargo doc --open` to view this documentation in a browser.

// friendly reminders to add comments
#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
#![warn(rustdoc::all)]

use std::collections::HashMap;
use std::fmt::Display;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use colored::Colorize;

use descent::context::MaybeContext;
use descent::emit::js;
use descent::interp::{self, TextLexer};
use descent::loader;
use descent::pattern::{self, Classified};
use descent::plan::{self, Plan};
use grammar::cfg::{Assoc, Grammar, Symbol};
use grammar::ll1::{self, Analysis};

/// Command line arguments accepted by the generator
#[derive(Clone, PartialEq, Eq, ClapParser)]
#[command(version, about)]
struct Args {
    /// the grammar source file
    input: PathBuf,
    /// write the generated parser here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// print grammar statistics after analysis
    #[arg(short, long)]
    stats: bool,
    /// print the decoded grammar IR and exit
    #[arg(long)]
    dump_ir: bool,
    /// parse INPUT with the reference runtime and print the s-expression
    #[arg(short, long, value_name = "INPUT")]
    check: Option<String>,
    /// increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Everything that can go wrong before emission. Loader failures reach
/// the user with their grammar line attached; the rest have no location.
enum GenError {
    /// The grammar file could not be read
    Io(io::Error),
    /// The grammar source did not decode
    Load(loader::error::Error),
    /// Classification or planning refused the grammar
    Plan(plan::Error),
}

impl Display for GenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenError::Io(e) => write!(f, "i/o error occurred ({})", e),
            GenError::Load(e) => e.fmt(f),
            GenError::Plan(e) => e.fmt(f),
        }
    }
}

/// Everything the back end of the driver needs from the front end
type Stages = (Grammar, Analysis, Classified, Plan);

fn main() -> ExitCode {
    // parse command line arguments
    let args = Args::parse();

    let level = match args.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("grammar")
        .to_string();

    // front end of the generator: read, decode, analyze, classify, plan.
    // None means an early exit was requested (--dump-ir).
    let generate = || -> Result<Option<Stages>, MaybeContext<GenError>> {
        let source = fs::read_to_string(&args.input).map_err(GenError::Io)?;

        let grammar =
            loader::load(&source, &file_name).map_err(|e| e.map_kind(GenError::Load))?;

        if args.dump_ir {
            dump_ir(&grammar);
            return Ok(None);
        }

        let analysis = ll1::analyze(&grammar);
        for conflict in analysis.conflicts() {
            // a conflict here may still be resolved by a pattern or handler
            eprintln!("{} {}", "[WARNING]".yellow(), conflict);
        }

        let classified = pattern::classify(&grammar, &analysis);
        let plan = plan::build(&grammar, &analysis, &classified).map_err(GenError::Plan)?;

        Ok(Some((grammar, analysis, classified, plan)))
    };

    let (grammar, analysis, classified, plan) = match generate() {
        Ok(Some(stages)) => stages,
        Ok(None) => return ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red(), e);
            return ExitCode::FAILURE;
        }
    };

    if args.stats {
        print_stats(&grammar, &analysis, &classified);
    }

    if let Some(input) = &args.check {
        let lexer = TextLexer::new(&grammar, input);
        return match interp::parse(&plan, lexer) {
            Ok(sexpr) => {
                println!("{}", sexpr);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {}", "[ERROR]".red(), e);
                ExitCode::FAILURE
            }
        };
    }

    let code = js::render(&plan);
    match &args.output {
        Some(path) => {
            if let Err(e) = fs::write(path, &code) {
                eprintln!(
                    "{} cannot write {}: {}",
                    "[ERROR]".red(),
                    path.display(),
                    e
                );
                return ExitCode::FAILURE;
            }
        }
        None => print!("{}", code),
    }

    ExitCode::SUCCESS
}

/// Print the decoded IR, rules in index order
fn dump_ir(grammar: &Grammar) {
    println!("start: {}", grammar.start());

    let mut terminals: Vec<&String> = grammar.terminals().iter().collect();
    terminals.sort();
    println!(
        "terminals: {}",
        terminals
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    );

    for entry in grammar.operators() {
        let assoc = match entry.assoc {
            Assoc::Left => "left",
            Assoc::Right => "right",
            Assoc::Nonassoc => "nonassoc",
        };
        println!("operators ({}): {}", assoc, entry.tokens.join(" "));
    }

    for (nonterminal, handler) in grammar.specials() {
        println!("special: {} => {}", nonterminal, handler);
    }

    for rule in grammar.rules() {
        let rhs = if rule.rhs.is_empty() {
            "ε".to_string()
        } else {
            rule.rhs
                .iter()
                .map(Symbol::name)
                .collect::<Vec<_>>()
                .join(" ")
        };
        println!("{:3}: {} -> {} {{ {} }}", rule.index, rule.lhs, rhs, rule.action);
    }
}

/// Print token / rule / nonterminal / conflict counts and the pattern tally
fn print_stats(grammar: &Grammar, analysis: &Analysis, classified: &Classified) {
    println!("tokens:       {}", grammar.terminals().len());
    println!("rules:        {}", grammar.rules().len());
    println!("nonterminals: {}", grammar.nonterminals().len());
    println!("conflicts:    {}", analysis.conflicts().len());

    let mut tally: HashMap<&'static str, usize> = HashMap::new();
    for (_, pattern) in classified.iter() {
        *tally.entry(pattern.name()).or_default() += 1;
    }
    let mut tally: Vec<(&'static str, usize)> = tally.into_iter().collect();
    tally.sort();
    for (name, count) in tally {
        println!("  {:16} {}", name, count);
    }
}
