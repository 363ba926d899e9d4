//! Command-line interface for packgen
//! This binary emits the built-in sample grammars as generated Rust source
//! or as a JSON manifest of the compiled rule set.
//!
//! Usage:
//!   packgen list                                        - List sample grammars
//!   packgen emit `<sample>` [--module `<name>`] [--out `<path>`] [--format `<format>`]

use clap::{Arg, Command};
use std::fs;
use std::process;

use packgen::{samples, Compiler};

fn main() {
    let matches = Command::new("packgen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Emit generated parsers for the built-in sample grammars")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("list").about("List available sample grammars"))
        .subcommand(
            Command::new("emit")
                .about("Emit a sample grammar")
                .arg(
                    Arg::new("sample")
                        .help("Sample grammar name (see 'packgen list')")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::new("module")
                        .long("module")
                        .short('m')
                        .help("Module name for the generated parser (defaults to the sample name)"),
                )
                .arg(
                    Arg::new("out")
                        .long("out")
                        .short('o')
                        .help("Write to this path instead of stdout"),
                )
                .arg(
                    Arg::new("format")
                        .long("format")
                        .short('f')
                        .help("Output format (e.g., 'rust', 'manifest')")
                        .default_value("rust"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("list", _)) => {
            handle_list_command();
        }
        Some(("emit", emit_matches)) => {
            let sample = emit_matches.get_one::<String>("sample").unwrap();
            let module = emit_matches
                .get_one::<String>("module")
                .cloned()
                .unwrap_or_else(|| sample.replace('-', "_"));
            let format = emit_matches.get_one::<String>("format").unwrap();
            let out = emit_matches.get_one::<String>("out");
            handle_emit_command(sample, &module, format, out);
        }
        _ => unreachable!(),
    }
}

/// Handle the list command
fn handle_list_command() {
    println!("arithmetic  sums of the spelled-out numbers one through four");
    println!("word-list   comma-separated words and digit runs");
}

/// Handle the emit command
fn handle_emit_command(sample: &str, module: &str, format: &str, out: Option<&String>) {
    let compiler = sample_compiler(sample);
    let text = match format {
        "rust" => match compiler.serialize(module) {
            Ok(text) => text,
            Err(errors) => exit_with_errors(&errors),
        },
        "manifest" => {
            let rules = match compiler.rules() {
                Ok(rules) => rules,
                Err(errors) => exit_with_errors(&errors),
            };
            match serde_json::to_string_pretty(&rules.manifest()) {
                Ok(json) => json,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    process::exit(1);
                }
            }
        }
        other => {
            eprintln!("Error: unknown format '{}'", other);
            process::exit(1);
        }
    };

    match out {
        Some(path) => {
            if let Err(e) = fs::write(path, text) {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
        None => print!("{}", text),
    }
}

fn sample_compiler(name: &str) -> Compiler {
    match name {
        "arithmetic" => samples::arithmetic(),
        "word-list" => match samples::word_list() {
            Ok(compiler) => compiler,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        },
        other => {
            eprintln!("Error: unknown sample '{}' (try 'packgen list')", other);
            process::exit(1);
        }
    }
}

fn exit_with_errors(errors: &[packgen::CompileError]) -> ! {
    for error in errors {
        eprintln!("Error: {}", error);
    }
    process::exit(1)
}
