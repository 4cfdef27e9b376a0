//! Assembly to bytecode compiler CLI.
//!
//! Reads an assembly source file and compiles it to engine bytecode.
//!
//! # Usage
//! ```text
//! assembler <input.asm> [OPTIONS]
//! ```
//!
//! # Options
//! - `-o, --output <file>`: Output file path (defaults to `<input>.bin`)
//! - `-l, --labels`: Print every label with its code offset
//! - `-p, --predict [price]`: Dry-run the script as a transaction against
//!   empty state and print its gas profile (price defaults to 1)

use nexus_engine::config::EngineConfig;
use nexus_engine::oracle::source::StaticOracleSource;
use nexus_engine::oracle::OracleReader;
use nexus_engine::runtime::{GasMachine, Transaction};
use nexus_engine::storage::context::MemoryStorage;
use nexus_engine::types::timestamp::Timestamp;
use nexus_engine::virtual_machine::assembler::{assemble, render_diagnostic};
use nexus_engine::virtual_machine::vm::gas::GasProfile;
use nexus_engine::{error, info, warn};
use std::env;
use std::fs;
use std::path::Path;
use std::process;
use std::sync::Arc;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    let input_path = &args[1];
    let mut output_path: Option<String> = None;
    let mut show_labels = false;
    let mut gas_price: Option<u64> = None;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--output" | "-o") => {
                i += 1;
                if i >= args.len() {
                    error!("{k} requires an argument");
                    process::exit(1);
                }
                output_path = Some(args[i].clone());
                i += 1;
            }
            "--labels" | "-l" => {
                show_labels = true;
                i += 1;
            }
            "--predict" | "-p" => {
                let mut price = 1;
                if i + 1 < args.len() && !args[i + 1].starts_with('-') {
                    i += 1;
                    price = match args[i].parse::<u64>() {
                        Ok(p) if p > 0 => p,
                        _ => {
                            error!("Invalid gas price: '{}'", args[i]);
                            process::exit(1);
                        }
                    };
                }
                gas_price = Some(price);
                i += 1;
            }
            other => {
                error!("Unexpected argument: {other}\n");
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let source = match fs::read_to_string(input_path) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to read {input_path}: {e}");
            process::exit(1);
        }
    };

    let output_path = output_path.unwrap_or_else(|| {
        let p = Path::new(input_path);
        let stem = p.file_stem().unwrap_or_default().to_string_lossy();
        let parent = p.parent().unwrap_or(Path::new("."));
        parent.join(format!("{stem}.bin")).to_string_lossy().into_owned()
    });

    let assembly = match assemble(&source) {
        Ok(a) => a,
        Err(e) => {
            eprint!("{}", render_diagnostic(input_path, &source, &e));
            process::exit(1);
        }
    };

    if let Err(e) = fs::write(&output_path, &assembly.bytecode) {
        error!("Failed to write output file: {e}");
        process::exit(1);
    }
    info!("Compiled {input_path} -> {output_path} ({} bytes)", assembly.bytecode.len());

    if show_labels {
        let width = assembly.labels.keys().map(|l| l.len()).max().unwrap_or(0);
        for (label, offset) in &assembly.labels {
            println!("@{label:<width$} {offset:>6}");
        }
    }

    if let Some(price) = gas_price {
        let config = EngineConfig::default();
        let oracle = OracleReader::new(Arc::new(StaticOracleSource::new()));
        let state = MemoryStorage::new();
        let tx = Transaction::new(assembly.bytecode, Vec::new(), Timestamp::ZERO);

        let profile = match GasMachine::new(&config, &oracle).profile(&state, &tx) {
            Ok(p) => p,
            Err(e) => {
                error!("Dry run failed: {e}");
                process::exit(1);
            }
        };
        print_profile(&profile);
        info!("Estimated cost: {}", format_with_commas(profile.total().saturating_mul(price)));
        warn!("Actual cost will depend on chain state.");
    }
}

fn print_profile(profile: &GasProfile) {
    let total = profile.total();
    let cat_w = 2 + profile
        .iter()
        .map(|(c, _)| c.as_str().len())
        .max()
        .unwrap_or(0)
        .max("total".len());
    let amt_w = format_with_commas(total).len();
    let dash_w = cat_w + 1 + amt_w + 2 + "( 100.0%)".len();

    println!("Gas Profile:");
    println!("{}", "-".repeat(dash_w));
    for (category, amount) in profile.iter() {
        if amount == 0 {
            continue;
        }
        let percent = if total > 0 {
            (amount as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        println!(
            "{:<cat_w$} {:>amt_w$} ({:>5.1}%)",
            category.as_str(),
            format_with_commas(amount),
            percent
        );
    }
    println!("{}", "-".repeat(dash_w));
    println!("{:<cat_w$} {:>amt_w$} ({:>5.1}%)", "total", format_with_commas(total), 100.0);
}

fn format_with_commas(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

const USAGE: &str = "\
Assembly Compiler

USAGE:
    {program} <input.asm> [OPTIONS]

OPTIONS:
    -o, --output <file>     Output file path (defaults to <input>.bin)
    -l, --labels            Print label offsets
    -p, --predict [price]   Dry-run and print the gas profile (price defaults to 1)
    -h, --help              Print this help message
";

fn print_usage(program: &str) {
    info!("{}", USAGE.replace("{program}", program));
}
