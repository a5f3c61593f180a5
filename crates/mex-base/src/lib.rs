//! # mex-base
//!
//! Pure structural atoms shared by the `mex` front end: arena allocation,
//! string interning, source spans, and span-tagged errors.
//!
//! This crate has no knowledge of `mex` grammar, tokens, or types. It
//! provides only the generic, reusable infrastructure that
//! [`mex-lang`](../mex_lang/index.html) builds upon.

pub mod arena;
pub mod error;
pub mod intern;
pub mod span;

pub use arena::Arena;
pub use error::{Result, SpannedError};
pub use intern::{Interner, Symbol, SymbolEq};
pub use span::Span;
