//! The mutable compiler state threaded through every semantic action:
//! an explicit, exclusively-borrowed `CompilerState` rather than
//! process-wide globals.

use crate::diagnostics::{DiagnosticSink, ErrorCode};
use crate::quad::{PatchList, QuadBuffer, TempPool};
use crate::scope::ScopeStack;
use crate::symbol::FormalArg;
use crate::types::{Type, TypeInterner};
use mex_base::{Interner, Span, Symbol as Name};
use std::collections::HashMap;

/// Forward-reference bookkeeping for one label name within the function
/// currently being parsed.
pub enum LabelState {
    Defined(usize),
    Forward(PatchList),
}

/// The function currently being parsed: its identity, its return type,
/// its label table, and the patch list collecting every `return` so they
/// can all jump to one shared epilogue.
pub struct CurFn<'a> {
    pub name: Name,
    pub return_ty: Type<'a>,
    pub args: Vec<FormalArg<'a>>,
    pub labels: HashMap<Name, LabelState>,
    pub return_jumps: PatchList,
    pub start_quad: usize,
}

/// All mutable state owned by a single compilation pass, borrowed
/// exclusively by the parser's semantic actions.
pub struct CompilerState<'a, S: DiagnosticSink> {
    pub names: Interner,
    pub types: TypeInterner<'a>,
    pub scopes: ScopeStack<'a>,
    pub quads: QuadBuffer,
    pub temps: TempPool,
    pub sink: S,
    pub curfn: Option<CurFn<'a>>,
}

impl<'a, S: DiagnosticSink> CompilerState<'a, S> {
    pub fn new(types: TypeInterner<'a>, sink: S) -> Self {
        CompilerState {
            names: Interner::new(),
            types,
            scopes: ScopeStack::new(),
            quads: QuadBuffer::new(),
            temps: TempPool::new(),
            sink,
            curfn: None,
        }
    }

    pub fn error(&mut self, code: ErrorCode, span: Span, args: &[&dyn std::fmt::Display]) {
        self.sink.report(code, span, args);
    }

    pub fn curfn_mut(&mut self) -> &mut CurFn<'a> {
        self.curfn.as_mut().expect("semantic action requires an active function context")
    }
}
