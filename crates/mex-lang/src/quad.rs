//! Three-address quads, the emitter, and temporary-register allocation.

use crate::types::Primitive;
use mex_base::Symbol as Name;
use serde::Serialize;

/// The stable numeric opcode enumeration for the quad sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuadOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    Shl,
    Shr,
    LogAnd,
    LogOr,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Neg,
    /// Implicit or explicit integer conversion; `dest`'s and `src1`'s
    /// types carry the from/to widths.
    Conv,
    Store,
    IndexLoad,
    IndexStore,
    FieldLoad,
    FieldStore,
    AddrOf,
    Param,
    Call,
    Return,
    Jmp,
    Jz,
    Jnz,
    Prologue,
    Epilogue,
    /// A no-op marker left at a label site with no other instruction
    /// (e.g. a label at the very end of a function body).
    Nop,
}

/// Which operand slot of an already-emitted [`Quad`] a [`PatchList`] entry
/// targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Slot {
    Dest,
    Src1,
    Src2,
}

/// A forward jump target: resolved once the destination quad index is
/// known, pending until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JumpTarget {
    Resolved(usize),
    Pending,
}

/// One operand of a [`Quad`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Operand {
    None,
    ConstInt(i64),
    ConstStr(String),
    /// A symbol-table reference, serialized alongside the quad buffer.
    Sym(Name),
    Temp(u32),
    Target(JumpTarget),
}

/// A three-address instruction: `(op, dest, src1, src2)`.
#[derive(Debug, Clone, Serialize)]
pub struct Quad {
    pub op: QuadOp,
    pub dest: Operand,
    pub src1: Operand,
    pub src2: Operand,
    /// The primitive width the op should be computed in, when relevant
    /// (arithmetic/compare/conv); `None` for control-flow and marshalling
    /// ops.
    pub ty: Option<Primitive>,
}

impl Quad {
    pub fn new(op: QuadOp, dest: Operand, src1: Operand, src2: Operand) -> Self {
        Quad { op, dest, src1, src2, ty: None }
    }

    pub fn with_ty(mut self, ty: Primitive) -> Self {
        self.ty = Some(ty);
        self
    }

    fn operand_mut(&mut self, slot: Slot) -> &mut Operand {
        match slot {
            Slot::Dest => &mut self.dest,
            Slot::Src1 => &mut self.src1,
            Slot::Src2 => &mut self.src2,
        }
    }
}

/// A set of `(quad_index, slot)` patch records all destined to resolve to
/// the same future target.
#[derive(Debug, Clone, Default)]
pub struct PatchList(pub Vec<(usize, Slot)>);

impl PatchList {
    pub fn empty() -> Self {
        PatchList(Vec::new())
    }

    pub fn single(quad_index: usize, slot: Slot) -> Self {
        PatchList(vec![(quad_index, slot)])
    }

    pub fn merge(mut self, other: PatchList) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A pool of per-function temporary-register ids. `alloc` reuses the most
/// recently freed id (LIFO), matching the original's simple free-list
/// discipline; `reset` is called on function close.
#[derive(Debug, Default)]
pub struct TempPool {
    next: u32,
    free: Vec<u32>,
}

impl TempPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self) -> u32 {
        self.free.pop().unwrap_or_else(|| {
            let id = self.next;
            self.next += 1;
            id
        })
    }

    pub fn free(&mut self, id: u32) {
        self.free.push(id);
    }

    pub fn reset(&mut self) {
        self.next = 0;
        self.free.clear();
    }
}

/// An append-only sequence of quads, the central output of code generation.
#[derive(Debug, Default, Serialize)]
pub struct QuadBuffer {
    quads: Vec<Quad>,
}

impl QuadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a quad, returning its index.
    pub fn emit(&mut self, quad: Quad) -> usize {
        self.quads.push(quad);
        self.quads.len() - 1
    }

    /// Emits an unresolved jump (`op` must be `Jmp`, `Jz`, or `Jnz`) whose
    /// target slot is returned, pre-wired into a fresh single-entry
    /// [`PatchList`].
    pub fn emit_jump_placeholder(&mut self, op: QuadOp, cond: Operand) -> (usize, PatchList) {
        let dest = Operand::Target(JumpTarget::Pending);
        let quad = match op {
            QuadOp::Jmp => Quad::new(op, dest, Operand::None, Operand::None),
            QuadOp::Jz | QuadOp::Jnz => Quad::new(op, dest, cond, Operand::None),
            _ => panic!("emit_jump_placeholder called with non-jump op {op:?}"),
        };
        let index = self.emit(quad);
        (index, PatchList::single(index, Slot::Dest))
    }

    /// Emits an unconditional jump straight to a known quad index; no
    /// patching needed.
    pub fn emit_jmp_to(&mut self, target: usize) -> usize {
        self.emit(Quad::new(
            QuadOp::Jmp,
            Operand::Target(JumpTarget::Resolved(target)),
            Operand::None,
            Operand::None,
        ))
    }

    /// Resolves every placeholder in `list` to `target`.
    pub fn patch(&mut self, list: &PatchList, target: usize) {
        for &(quad_index, slot) in &list.0 {
            *self.quads[quad_index].operand_mut(slot) = Operand::Target(JumpTarget::Resolved(target));
        }
    }

    /// The index the next `emit` will use.
    pub fn current_quad(&self) -> usize {
        self.quads.len()
    }

    pub fn get(&self, index: usize) -> &Quad {
        &self.quads[index]
    }

    pub fn as_slice(&self) -> &[Quad] {
        &self.quads
    }

    pub fn len(&self) -> usize {
        self.quads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quads.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_resolves_all_entries_in_list() {
        let mut buf = QuadBuffer::new();
        let (_, p1) = buf.emit_jump_placeholder(QuadOp::Jz, Operand::Temp(0));
        let (_, p2) = buf.emit_jump_placeholder(QuadOp::Jmp, Operand::None);
        let merged = p1.merge(p2);
        let target = buf.current_quad();
        buf.patch(&merged, target);
        for quad in buf.as_slice() {
            assert_eq!(quad.dest, Operand::Target(JumpTarget::Resolved(target)));
        }
    }

    #[test]
    fn temp_pool_reuses_freed_ids_lifo() {
        let mut pool = TempPool::new();
        let a = pool.alloc();
        let b = pool.alloc();
        pool.free(b);
        assert_eq!(pool.alloc(), b);
        pool.free(a);
        pool.free(b);
        assert_eq!(pool.alloc(), b);
        assert_eq!(pool.alloc(), a);
    }

    #[test]
    fn current_quad_tracks_next_emit_index() {
        let mut buf = QuadBuffer::new();
        assert_eq!(buf.current_quad(), 0);
        buf.emit(Quad::new(QuadOp::Nop, Operand::None, Operand::None, Operand::None));
        assert_eq!(buf.current_quad(), 1);
    }
}
