//! `mexc`: a command-line compiler for the mex language.
//!
//! Reads a `.mex` source file, runs the [`mex_lang`] front end, and
//! writes the resulting quad buffer and symbol table as JSON (or a
//! `--dump` human-readable listing) to stdout or `-o <file>`.
//!
//! # Module structure
//!
//! - [`cli`] — argument parsing and dispatch, the only module.

pub mod cli;

pub use cli::run_cli;
