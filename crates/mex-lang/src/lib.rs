//! # mex-lang
//!
//! A single-pass compiler front end for `mex`, a small block-structured,
//! statically typed imperative language with byte/word/dword integers,
//! fixed arrays, structs, strings, and user-defined functions.
//!
//! The pipeline is a single pass:
//!
//! 1. **[`lexer`]/[`token`]** — tokenizes source text. [`token::Lexer`] is
//!    the interface the parser depends on; [`lexer::Scanner`] is one
//!    concrete scanner.
//! 2. **[`types`]/[`symbol`]/[`scope`]** — the type system, symbol
//!    records, and the lexical scope stack.
//! 3. **[`dataobject`]** — the expression evaluator: constant folding,
//!    coercion, assignment, indexing, field access, calls.
//! 4. **[`quad`]** — the three-address quad buffer, jump back-patching,
//!    and temporary-register allocation.
//! 5. **[`parser`]** — the recursive-descent driver tying the above
//!    together, running semantic actions as it recognizes each
//!    construct.
//!
//! [`diagnostics`] and [`state`] are the ambient machinery threaded
//! through all of the above: the closed diagnostic-code/severity
//! taxonomy and the single mutable compiler-state record.

pub mod dataobject;
pub mod diagnostics;
pub mod lexer;
pub mod parser;
pub mod quad;
pub mod scope;
pub mod state;
pub mod symbol;
pub mod token;
pub mod types;

use diagnostics::{CollectingSink, Diagnostic, DiagnosticSink, Severity};
use lexer::Scanner;
use mex_base::Arena;
use parser::{ParseError, Parser};
use quad::QuadBuffer;
use serde::Serialize;
use state::CompilerState;
use symbol::SymbolKind;
use token::Lexer;
use types::TypeInterner;

/// An owned, serializable projection of one declared name, taken from the
/// file-level scope once parsing has finished (inner scopes are gone by
/// then, matching [`scope::ScopeStack::global_symbols`]).
#[derive(Debug, Clone, Serialize)]
pub struct SymbolSnapshot {
    pub name: String,
    pub kind: SymbolKind,
    pub scope_depth: u32,
    pub address: i32,
    pub is_defined: bool,
    pub is_ref: bool,
    pub ty: String,
}

/// Everything produced by a compile pass: the quad buffer, the file-level
/// symbol table, any parse-level syntax errors, and any semantic
/// diagnostics. Code generation proceeds even in the presence of errors;
/// [`CompileOutput::is_success`] is the caller's gate on whether the
/// output should actually be used.
pub struct CompileOutput {
    pub quads: QuadBuffer,
    pub symbols: Vec<SymbolSnapshot>,
    pub parse_errors: Vec<ParseError>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileOutput {
    /// `true` iff there were no parse errors and no semantic diagnostic
    /// of `Error` severity (warnings alone do not fail a compile).
    pub fn is_success(&self) -> bool {
        self.parse_errors.is_empty() && !self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }
}

/// Compiles one `mex` translation unit with the reference [`Scanner`]
/// and a [`CollectingSink`].
pub fn compile(source: &str) -> CompileOutput {
    let arena = Arena::new();
    let types = TypeInterner::new(&arena);
    let ctx = CompilerState::new(types, CollectingSink::new());
    compile_with(Scanner::new(source), ctx)
}

/// Compiles with a caller-supplied lexer and an already-constructed
/// [`CompilerState`], for embedding a different scanner or diagnostic
/// sink than the reference ones.
pub fn compile_with<'a, L: Lexer, S: DiagnosticSink + IntoDiagnostics>(lexer: L, ctx: CompilerState<'a, S>) -> CompileOutput {
    let mut parser = Parser::new(lexer, ctx);
    parser.ctx.scopes.open();
    parser.parse_program();
    let symbols = parser
        .ctx
        .scopes
        .global_symbols()
        .map(|sym| SymbolSnapshot {
            name: parser.ctx.names.resolve(sym.name).to_string(),
            kind: sym.kind,
            scope_depth: sym.scope_depth,
            address: sym.address,
            is_defined: sym.is_defined,
            is_ref: sym.is_ref,
            ty: types::describe(sym.ty, &parser.ctx.names),
        })
        .collect();
    CompileOutput {
        quads: parser.ctx.quads,
        symbols,
        parse_errors: parser.parse_errors,
        diagnostics: parser.ctx.sink.into_diagnostics(),
    }
}

/// A [`DiagnosticSink`] that can be drained into a plain `Vec<Diagnostic>`,
/// regardless of its internal storage, so [`compile_with`] can return a
/// uniform [`CompileOutput`] for any sink implementation.
pub trait IntoDiagnostics {
    fn into_diagnostics(self) -> Vec<Diagnostic>;
}

impl IntoDiagnostics for CollectingSink {
    fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_folding_emits_a_single_store() {
        let out = compile("byte x; x = 2 + 3;");
        assert!(out.is_success(), "{:?}", out.diagnostics);
        let stores: Vec<_> = out.quads.as_slice().iter().filter(|q| q.op == quad::QuadOp::Store).collect();
        assert_eq!(stores.len(), 1);
        assert!(out.quads.as_slice().iter().all(|q| q.op != quad::QuadOp::Add));
    }

    #[test]
    fn undeclared_name_reports_and_recovers() {
        let out = compile("byte x; x = y + 1;");
        assert!(!out.is_success());
        assert!(out.diagnostics.iter().any(|d| d.code == diagnostics::ErrorCode::Undeclared));
    }

    #[test]
    fn forward_goto_patches_to_the_label() {
        let out = compile("void f() begin goto L; byte x; x = 1; L: x = 2; end");
        assert!(out.is_success(), "{:?}", out.diagnostics);
    }

    #[test]
    fn struct_field_store_resolves_offset_zero() {
        let out = compile("struct S { byte f; } s; s.f = 7;");
        assert!(out.is_success(), "{:?}", out.diagnostics);
        assert!(out.quads.as_slice().iter().any(|q| q.op == quad::QuadOp::FieldStore));
    }
}
