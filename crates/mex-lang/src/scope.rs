//! The symbol table: a stack of lexical scopes plus the monotonic local
//! `offset` cursor.
//!
//! `scope_open`/`scope_close` bracket function entry and every `begin...end`
//! block; `declare`/`lookup` follow stack discipline, innermost scope first.

use crate::symbol::Symbol;
use mex_base::Symbol as Name;
use std::collections::HashMap;

/// Error returned by [`ScopeStack::declare`] when `name` already exists in
/// the *current* scope.
pub struct DuplicateSymbol;

/// A stack of lexical scopes. Each frame owns the symbols declared in it;
/// on [`ScopeStack::close`] they become inaccessible.
pub struct ScopeStack<'a> {
    frames: Vec<HashMap<Name, Symbol<'a>>>,
    /// Monotonically increasing within the active function; restored to
    /// its value at block entry on `close`, reusing storage.
    pub offset: i32,
}

impl<'a> ScopeStack<'a> {
    pub fn new() -> Self {
        ScopeStack { frames: Vec::new(), offset: 0 }
    }

    pub fn depth(&self) -> u32 {
        self.frames.len() as u32
    }

    /// Pushes a fresh scope frame, recording the offset to restore on
    /// close.
    pub fn open(&mut self) -> i32 {
        self.frames.push(HashMap::new());
        self.offset
    }

    /// Pops the top frame and restores `offset` to the value captured by
    /// the matching `open` (simple stack discipline).
    pub fn close(&mut self, saved_offset: i32) {
        self.frames.pop();
        self.offset = saved_offset;
    }

    /// Declares `symbol` in the current (innermost) scope.
    ///
    /// # Errors
    /// [`DuplicateSymbol`] if `symbol.name` is already bound in this exact
    /// scope; shadowing an outer scope's binding is permitted.
    pub fn declare(&mut self, symbol: Symbol<'a>) -> Result<&Symbol<'a>, DuplicateSymbol> {
        let frame = self.frames.last_mut().expect("declare called with no open scope");
        if frame.contains_key(&symbol.name) {
            return Err(DuplicateSymbol);
        }
        let name = symbol.name;
        frame.insert(name, symbol);
        Ok(frame.get(&name).unwrap())
    }

    /// Searches innermost-first across all open scopes.
    pub fn lookup(&self, name: Name) -> Option<&Symbol<'a>> {
        self.frames.iter().rev().find_map(|frame| frame.get(&name))
    }

    pub fn lookup_mut(&mut self, name: Name) -> Option<&mut Symbol<'a>> {
        self.frames.iter_mut().rev().find_map(|frame| frame.get_mut(&name))
    }

    /// The outermost (file) scope's symbols, once compilation has finished
    /// and only that frame remains open. Empty if no scope is open.
    pub fn global_symbols(&self) -> impl Iterator<Item = &Symbol<'a>> {
        self.frames.first().into_iter().flat_map(|frame| frame.values())
    }

}

impl Default for ScopeStack<'_> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Primitive, Primitives, TypeInterner};
    use mex_base::{Arena, Interner};

    fn intern(name: &str) -> Name {
        let mut i = Interner::new();
        i.intern(name)
    }

    #[test]
    fn shadowing_is_permitted_and_resolves_innermost() {
        let arena = Arena::new();
        let types = TypeInterner::new(&arena);
        let mut scopes = ScopeStack::new();
        let x = intern("x");

        scopes.open();
        scopes.declare(Symbol::variable(x, types.primitives.of(Primitive::SByte), 1, 0)).unwrap();
        scopes.open();
        scopes
            .declare(Symbol::variable(x, types.primitives.of(Primitive::SWord), 2, 0))
            .unwrap();
        assert_eq!(scopes.lookup(x).unwrap().scope_depth, 2);
        scopes.close(0);
        assert_eq!(scopes.lookup(x).unwrap().scope_depth, 1);
    }

    #[test]
    fn inner_scope_invisible_after_close() {
        let arena = Arena::new();
        let types = TypeInterner::new(&arena);
        let mut scopes = ScopeStack::new();
        let y = intern("y");

        scopes.open();
        let saved = scopes.open();
        scopes.declare(Symbol::variable(y, types.primitives.of(Primitive::SByte), 2, 0)).unwrap();
        scopes.close(saved);
        assert!(scopes.lookup(y).is_none());
    }

    #[test]
    fn duplicate_in_same_scope_errors() {
        let arena = Arena::new();
        let types = TypeInterner::new(&arena);
        let mut scopes = ScopeStack::new();
        let x = intern("x");
        scopes.open();
        scopes.declare(Symbol::variable(x, types.primitives.of(Primitive::SByte), 1, 0)).unwrap();
        assert!(scopes.declare(Symbol::variable(x, types.primitives.of(Primitive::SByte), 1, 0)).is_err());
    }

    #[test]
    fn offset_cursor_restored_on_close() {
        let mut scopes: ScopeStack = ScopeStack::new();
        scopes.open();
        scopes.offset = 4;
        let saved = scopes.open();
        scopes.offset = 10;
        scopes.close(saved);
        assert_eq!(scopes.offset, 4);
    }
}
