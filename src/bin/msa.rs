use std::{env, fs};

use msa::assembler::{self, render_hex, Assembler};
use msa::logging::error;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} <input.mx> [output.bin] [--hex] [--trace]");
    std::process::exit(1);
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
    }

    let input_path = &args[1];
    let flags: Vec<&str> = args[2..].iter().filter(|a| a.starts_with("--")).map(String::as_str).collect();
    let output_path = args[2..].iter().find(|a| !a.starts_with("--"));

    let print_hex = flags.contains(&"--hex");
    let print_trace = flags.contains(&"--trace");

    let source = fs::read_to_string(input_path).unwrap_or_else(|_| {
        error(assembler::Error::ReadError { path: input_path.clone() }.to_string());
        std::process::exit(2);
    });

    let mut compiler = Assembler::new();
    let bytecode = compiler.compile(&source).unwrap_or_else(|e| {
        error(e.to_string());
        std::process::exit(3);
    });

    if let Some(output_path) = output_path {
        fs::write(output_path, &bytecode).unwrap_or_else(|e| {
            error(format!("failed to write to output file: {e}"));
            std::process::exit(4);
        });
    }

    if print_hex {
        println!("{}", render_hex(&bytecode));
    }

    if print_trace {
        for line in compiler.trace() {
            println!("{line}");
        }
    }
}
