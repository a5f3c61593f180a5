//! `mexc` — standalone binary entry point.
//!
//! A thin wrapper around [`mex_cli::run_cli`]; all logic lives in the
//! library crate for testability.

fn main() {
    match mex_cli::run_cli() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}
