//! Symbol records.

use crate::types::Type;
use mex_base::Symbol as Name;
use serde::Serialize;

/// One declared formal argument: its name, declared type,
/// and whether it is passed `ref`. A `variadic` formal (a trailing
/// `...`) matches zero or more trailing actuals of any integer/string
/// type and carries no name or fixed type.
#[derive(Debug, Clone)]
pub struct FormalArg<'a> {
    pub name: Name,
    pub ty: Type<'a>,
    pub by_ref: bool,
    pub variadic: bool,
}

/// What a [`Symbol`] denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Variable,
    Argument,
    Function,
    Label,
    StructTag,
}

/// Function-specific bookkeeping, populated once the body has been parsed:
/// where its code starts and ends in the quad stream.
#[derive(Debug, Clone, Default)]
pub struct FunctionInfo<'a> {
    pub args: Vec<FormalArg<'a>>,
    pub start_quad: usize,
    pub end_quad: usize,
}

/// A declared name: variable, argument, function, label, or struct tag.
#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    pub name: Name,
    pub ty: Type<'a>,
    pub scope_depth: u32,
    pub kind: SymbolKind,
    /// Stack offset for locals/arguments, or the defining quad index for
    /// labels and functions.
    pub address: i32,
    pub is_defined: bool,
    pub is_ref: bool,
    pub function: Option<FunctionInfo<'a>>,
}

impl<'a> Symbol<'a> {
    pub fn variable(name: Name, ty: Type<'a>, scope_depth: u32, offset: i32) -> Self {
        Symbol {
            name,
            ty,
            scope_depth,
            kind: SymbolKind::Variable,
            address: offset,
            is_defined: true,
            is_ref: false,
            function: None,
        }
    }

    pub fn argument(name: Name, ty: Type<'a>, scope_depth: u32, offset: i32, is_ref: bool) -> Self {
        Symbol {
            name,
            ty,
            scope_depth,
            kind: SymbolKind::Argument,
            address: offset,
            is_defined: true,
            is_ref,
            function: None,
        }
    }

    pub fn function(name: Name, ty: Type<'a>, scope_depth: u32) -> Self {
        Symbol {
            name,
            ty,
            scope_depth,
            kind: SymbolKind::Function,
            address: 0,
            is_defined: false,
            is_ref: false,
            function: Some(FunctionInfo::default()),
        }
    }

    pub fn label(name: Name, scope_depth: u32, void_ty: Type<'a>) -> Self {
        Symbol {
            name,
            ty: void_ty,
            scope_depth,
            kind: SymbolKind::Label,
            address: -1,
            is_defined: false,
            is_ref: false,
            function: None,
        }
    }

    pub fn struct_tag(name: Name, scope_depth: u32, ty: Type<'a>) -> Self {
        Symbol {
            name,
            ty,
            scope_depth,
            kind: SymbolKind::StructTag,
            address: 0,
            is_defined: false,
            is_ref: false,
            function: None,
        }
    }
}
