use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

use hydro::prelude::*;

/// The conventional exit code in BSD Unixes.
/// See: man 3 sysexits
mod ex {
    /// The conventional exit code for usage error.
    pub const USAGE: i32 = 64;
    /// When the input data is incorrect -- for example, a compile-time error.
    pub const DATAERR: i32 = 65;
    /// An internal software error occured.
    pub const SOFTWARE: i32 = 70;
    /// An error occured while doing I/O on a file.
    pub const IOERR: i32 = 74;
}

/// Source files must have this extension.
const EXTENSION: &str = "hydro";

fn main() {
    // Quiet unless RUST_LOG says otherwise.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .try_init();

    let args: Vec<_> = env::args().collect();

    let status = match args.as_slice() {
        [_] => repl(),
        [_, filename] => run_file(filename),
        _ => {
            eprintln!("Usage: hydro [path]");
            ex::USAGE
        }
    };

    process::exit(status)
}

/// Use hydro interactively using the read-execute-print loop.
fn repl() -> i32 {
    let mut vm = VM::default();
    let mut line = String::with_capacity(1024);

    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    println!("Welcome to Hydrogen, the lightest programming language!");

    loop {
        line.clear();

        print!("> ");
        // The prompt is only cosmetic.
        let _ = io::stdout().flush();

        match stdin.read_line(&mut line) {
            Ok(0) | Err(_) => {
                println!();
                break;
            }
            Ok(_) => {
                // Errors are reported, and the session carries on.
                if let Err(error) = vm.interpret(&line) {
                    report(&error);
                }
            }
        }
    }

    0
}

/// Runs a whole file, and returns the exit code.
fn run_file(filename: &str) -> i32 {
    let path = Path::new(filename);
    if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
        eprintln!("File must have .{EXTENSION} extension.");
        return ex::DATAERR;
    }

    let source = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(error) => {
            eprintln!("Could not read file \"{filename}\": {error}");
            return ex::IOERR;
        }
    };
    let mut vm = VM::default();

    match vm.interpret(&source) {
        Ok(()) => 0,
        Err(error) => {
            report(&error);
            match error {
                InterpretationError::Compile(_) => ex::DATAERR,
                InterpretationError::Runtime(_) => ex::SOFTWARE,
            }
        }
    }
}

/// Prints every error to stderr.
fn report(error: &InterpretationError) {
    match error {
        InterpretationError::Compile(errors) => {
            for error in errors {
                eprintln!("{error}");
            }
        }
        InterpretationError::Runtime(error) => eprintln!("{error}"),
    }
}
