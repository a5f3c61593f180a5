//! `DataObject`, the operand handle threaded through semantic actions, and
//! the expression evaluator: `EvalBinary`/`EvalAssign`/indexing/field
//! access/calls, including constant folding.

use crate::diagnostics::{DiagnosticSink, ErrorCode};
use crate::quad::{Operand, Quad, QuadOp};
use crate::state::CompilerState;
use crate::symbol::SymbolKind;
use crate::types::{common_integer_type, sizeof, Primitive, Type, TypeDescriptor};
use mex_base::{Span, Symbol as Name};

/// A compile-time constant value, carried by [`DataObject::Literal`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Int(i64),
    Str(String),
}

/// An operand handle passed between semantic actions. Indexing and field access are restricted to an
/// identifier base, matching the grammar.
#[derive(Debug, Clone)]
pub enum DataObject<'a> {
    Literal { value: ConstValue, ty: Type<'a> },
    Named { name: Name, ty: Type<'a> },
    Temporary { id: u32, ty: Type<'a> },
    Indexed { base: Name, index: Box<DataObject<'a>>, elem_ty: Type<'a> },
    Field { base: Name, field_offset: u32, field_ty: Type<'a> },
    /// Sentinel absorbing further diagnostics after an error, so one
    /// mistake does not cascade.
    Error { ty: Type<'a> },
}

impl<'a> DataObject<'a> {
    pub fn ty(&self) -> Type<'a> {
        match self {
            DataObject::Literal { ty, .. }
            | DataObject::Named { ty, .. }
            | DataObject::Temporary { ty, .. }
            | DataObject::Error { ty } => ty,
            DataObject::Indexed { elem_ty, .. } => elem_ty,
            DataObject::Field { field_ty, .. } => field_ty,
        }
    }

    /// A named symbol, an indexed element, or a field projection is an
    /// lvalue.
    pub fn is_lvalue(&self) -> bool {
        matches!(self, DataObject::Named { .. } | DataObject::Indexed { .. } | DataObject::Field { .. })
    }

    pub fn as_primitive(&self) -> Option<Primitive> {
        match self.ty() {
            TypeDescriptor::Primitive(p) => Some(*p),
            _ => None,
        }
    }
}

/// The surface binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
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
}

impl BinOp {
    fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::LogAnd | BinOp::LogOr | BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge
        )
    }

    fn quad_op(self) -> QuadOp {
        match self {
            BinOp::Add => QuadOp::Add,
            BinOp::Sub => QuadOp::Sub,
            BinOp::Mul => QuadOp::Mul,
            BinOp::Div => QuadOp::Div,
            BinOp::Mod => QuadOp::Mod,
            BinOp::BitAnd => QuadOp::BitAnd,
            BinOp::BitOr => QuadOp::BitOr,
            BinOp::Shl => QuadOp::Shl,
            BinOp::Shr => QuadOp::Shr,
            BinOp::LogAnd => QuadOp::LogAnd,
            BinOp::LogOr => QuadOp::LogOr,
            BinOp::Eq => QuadOp::Eq,
            BinOp::Ne => QuadOp::Ne,
            BinOp::Lt => QuadOp::Lt,
            BinOp::Le => QuadOp::Le,
            BinOp::Gt => QuadOp::Gt,
            BinOp::Ge => QuadOp::Ge,
        }
    }

    /// Evaluates `a op b` at compile time, returning `None` only for
    /// division/modulo by zero (which must fall through to a runtime
    /// quad rather than panic or silently wrap).
    fn fold(self, a: i64, b: i64) -> Option<i64> {
        Some(match self {
            BinOp::Add => a.wrapping_add(b),
            BinOp::Sub => a.wrapping_sub(b),
            BinOp::Mul => a.wrapping_mul(b),
            BinOp::Div => a.checked_div(b)?,
            BinOp::Mod => a.checked_rem(b)?,
            BinOp::BitAnd => a & b,
            BinOp::BitOr => a | b,
            BinOp::Shl => a.wrapping_shl(b as u32),
            BinOp::Shr => a.wrapping_shr(b as u32),
            BinOp::LogAnd => ((a != 0) && (b != 0)) as i64,
            BinOp::LogOr => ((a != 0) || (b != 0)) as i64,
            BinOp::Eq => (a == b) as i64,
            BinOp::Ne => (a != b) as i64,
            BinOp::Lt => (a < b) as i64,
            BinOp::Le => (a <= b) as i64,
            BinOp::Gt => (a > b) as i64,
            BinOp::Ge => (a >= b) as i64,
        })
    }
}

/// Truncates/extends a raw integer value to `prim`'s width and signedness.
fn narrow(value: i64, prim: Primitive) -> i64 {
    match prim {
        Primitive::SByte => value as i8 as i64,
        Primitive::UByte => value as u8 as i64,
        Primitive::SWord => value as i16 as i64,
        Primitive::UWord => value as u16 as i64,
        Primitive::SDword => value as i32 as i64,
        Primitive::UDword => value as u32 as i64,
        Primitive::Void | Primitive::Str => value,
    }
}

fn consume<S: DiagnosticSink>(ctx: &mut CompilerState<'_, S>, operand: &Operand) {
    if let Operand::Temp(id) = operand {
        ctx.temps.free(*id);
    }
}

/// Loads a [`DataObject`] into a quad operand, emitting `IndexLoad`/
/// `FieldLoad` if it denotes an indirect location.
pub fn load<'a, S: DiagnosticSink>(ctx: &mut CompilerState<'a, S>, obj: DataObject<'a>) -> (Operand, Type<'a>) {
    match obj {
        DataObject::Literal { value, ty } => (
            match value {
                ConstValue::Int(v) => Operand::ConstInt(v),
                ConstValue::Str(s) => Operand::ConstStr(s),
            },
            ty,
        ),
        DataObject::Named { name, ty } => (Operand::Sym(name), ty),
        DataObject::Temporary { id, ty } => (Operand::Temp(id), ty),
        DataObject::Error { ty } => (Operand::None, ty),
        DataObject::Indexed { base, index, elem_ty } => {
            let (index_op, _) = load(ctx, *index);
            let temp = ctx.temps.alloc();
            ctx.quads.emit(Quad::new(QuadOp::IndexLoad, Operand::Temp(temp), Operand::Sym(base), index_op.clone()));
            consume(ctx, &index_op);
            (Operand::Temp(temp), elem_ty)
        }
        DataObject::Field { base, field_offset, field_ty } => {
            let temp = ctx.temps.alloc();
            ctx.quads.emit(Quad::new(
                QuadOp::FieldLoad,
                Operand::Temp(temp),
                Operand::Sym(base),
                Operand::ConstInt(field_offset as i64),
            ));
            (Operand::Temp(temp), field_ty)
        }
    }
}

/// Coerces `operand` (of primitive `from`) to primitive `to`, emitting a
/// `Conv` quad and freeing the original temporary if one changed hands.
fn coerce<S: DiagnosticSink>(ctx: &mut CompilerState<'_, S>, operand: Operand, from: Primitive, to: Primitive) -> Operand {
    if from == to {
        return operand;
    }
    if let Operand::ConstInt(v) = operand {
        return Operand::ConstInt(narrow(v, to));
    }
    let temp = ctx.temps.alloc();
    ctx.quads
        .emit(Quad::new(QuadOp::Conv, Operand::Temp(temp), operand.clone(), Operand::None).with_ty(to));
    consume(ctx, &operand);
    Operand::Temp(temp)
}

/// `EvalBinary(lhs, op, rhs)`: constant-folds when both
/// operands are literals, otherwise emits coercions plus a single quad
/// into a fresh temporary.
pub fn eval_binary<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    lhs: DataObject<'a>,
    op: BinOp,
    rhs: DataObject<'a>,
    span: Span,
) -> DataObject<'a> {
    if let (
        DataObject::Literal { value: ConstValue::Int(a), ty: lty },
        DataObject::Literal { value: ConstValue::Int(b), ty: rty },
    ) = (&lhs, &rhs)
    {
        if let (TypeDescriptor::Primitive(lp), TypeDescriptor::Primitive(rp)) = (lty, rty) {
            if lp.is_integer() && rp.is_integer() {
                if let Some(result) = op.fold(*a, *b) {
                    let result_prim = if op.is_comparison() { Primitive::UByte } else { common_integer_type(*lp, *rp) };
                    return DataObject::Literal {
                        value: ConstValue::Int(narrow(result, result_prim)),
                        ty: ctx.types.primitives.of(result_prim),
                    };
                }
            }
        }
    }

    let (Some(lp), Some(rp)) = (lhs.as_primitive(), rhs.as_primitive()) else {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"string", &"integer"]);
        return DataObject::Error { ty: ctx.types.primitives.void };
    };
    if !lp.is_integer() || !rp.is_integer() {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"string", &"integer"]);
        return DataObject::Error { ty: ctx.types.primitives.void };
    }

    let operand_prim = common_integer_type(lp, rp);
    let dest_prim = if op.is_comparison() { Primitive::UByte } else { operand_prim };

    let (o1, _) = load(ctx, lhs);
    let (o2, _) = load(ctx, rhs);
    let o1 = coerce(ctx, o1, lp, operand_prim);
    let o2 = coerce(ctx, o2, rp, operand_prim);

    let temp = ctx.temps.alloc();
    ctx.quads
        .emit(Quad::new(op.quad_op(), Operand::Temp(temp), o1.clone(), o2.clone()).with_ty(operand_prim));
    consume(ctx, &o1);
    consume(ctx, &o2);
    DataObject::Temporary { id: temp, ty: ctx.types.primitives.of(dest_prim) }
}

/// Unary minus: folds constants, else emits `(neg, temp,
/// operand)`. Negating an unsigned value promotes it to its signed
/// counterpart of the same width.
pub fn eval_neg<'a, S: DiagnosticSink>(ctx: &mut CompilerState<'a, S>, operand: DataObject<'a>, span: Span) -> DataObject<'a> {
    let Some(prim) = operand.as_primitive() else {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"integer", &"string"]);
        return DataObject::Error { ty: ctx.types.primitives.void };
    };
    if !prim.is_integer() {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"integer", &"string"]);
        return DataObject::Error { ty: ctx.types.primitives.void };
    }
    let result_prim = signed_of(prim);

    if let DataObject::Literal { value: ConstValue::Int(v), .. } = &operand {
        return DataObject::Literal {
            value: ConstValue::Int(narrow(v.wrapping_neg(), result_prim)),
            ty: ctx.types.primitives.of(result_prim),
        };
    }

    let (o, _) = load(ctx, operand);
    let temp = ctx.temps.alloc();
    ctx.quads.emit(Quad::new(QuadOp::Neg, Operand::Temp(temp), o.clone(), Operand::None).with_ty(result_prim));
    consume(ctx, &o);
    DataObject::Temporary { id: temp, ty: ctx.types.primitives.of(result_prim) }
}

fn signed_of(prim: Primitive) -> Primitive {
    match prim {
        Primitive::UByte => Primitive::SByte,
        Primitive::UWord => Primitive::SWord,
        Primitive::UDword => Primitive::SDword,
        other => other,
    }
}

/// `EvalAssign(lhs, rhs)`: `lhs` must be an lvalue; `rhs`
/// is coerced toward `lhs`'s type and stored. The expression's value is
/// the (now-updated) lvalue.
pub fn eval_assign<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    lhs: DataObject<'a>,
    rhs: DataObject<'a>,
    span: Span,
) -> DataObject<'a> {
    if !lhs.is_lvalue() {
        ctx.error(ErrorCode::NotAnLvalue, span, &[]);
        return rhs;
    }

    match lhs {
        DataObject::Named { name, ty } => {
            let converted = coerce_value(ctx, rhs, ty, span);
            ctx.quads.emit(Quad::new(QuadOp::Store, Operand::Sym(name), converted.clone(), Operand::None));
            consume(ctx, &converted);
            DataObject::Named { name, ty }
        }
        DataObject::Indexed { base, index, elem_ty } => {
            let (index_op, _) = load(ctx, *index);
            let converted = coerce_value(ctx, rhs, elem_ty, span);
            ctx.quads.emit(Quad::new(QuadOp::IndexStore, Operand::Sym(base), index_op.clone(), converted.clone()));
            consume(ctx, &converted);
            let temp = ctx.temps.alloc();
            ctx.quads.emit(Quad::new(QuadOp::IndexLoad, Operand::Temp(temp), Operand::Sym(base), index_op.clone()));
            consume(ctx, &index_op);
            DataObject::Temporary { id: temp, ty: elem_ty }
        }
        DataObject::Field { base, field_offset, field_ty } => {
            let converted = coerce_value(ctx, rhs, field_ty, span);
            ctx.quads.emit(Quad::new(
                QuadOp::FieldStore,
                Operand::Sym(base),
                Operand::ConstInt(field_offset as i64),
                converted.clone(),
            ));
            consume(ctx, &converted);
            let temp = ctx.temps.alloc();
            ctx.quads.emit(Quad::new(
                QuadOp::FieldLoad,
                Operand::Temp(temp),
                Operand::Sym(base),
                Operand::ConstInt(field_offset as i64),
            ));
            DataObject::Temporary { id: temp, ty: field_ty }
        }
        _ => unreachable!("checked is_lvalue above"),
    }
}

/// Shared by assignment and argument marshalling: converts `value`
/// toward `target_ty`, rejecting string/integer mixing.
fn coerce_value<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    value: DataObject<'a>,
    target_ty: Type<'a>,
    span: Span,
) -> Operand {
    let target_prim = match target_ty {
        TypeDescriptor::Primitive(p) => *p,
        _ => {
            // struct/array assignment: no conversion, just load as-is.
            let (op, _) = load(ctx, value);
            return op;
        }
    };
    let Some(source_prim) = value.as_primitive() else {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"string", &"integer"]);
        let (op, _) = load(ctx, value);
        return op;
    };
    if target_prim.is_integer() != source_prim.is_integer() {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"string", &"integer"]);
    }
    let (op, _) = load(ctx, value);
    if target_prim.is_integer() && source_prim.is_integer() {
        coerce(ctx, op, source_prim, target_prim)
    } else {
        op
    }
}

/// `a[i]`. `base_name`/`base_ty` come from a
/// prior symbol lookup; a literal index outside `[low, high]` reports
/// `BadSubscript` but still produces a usable (clamped) lvalue. Open
/// arrays (`high == -1`) never bound-check.
pub fn eval_index<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    base_name: Name,
    base_ty: Type<'a>,
    index: DataObject<'a>,
    span: Span,
) -> DataObject<'a> {
    let TypeDescriptor::Array(array) = base_ty else {
        ctx.error(ErrorCode::BadSubscript, span, &[&"0", &"0", &"0"]);
        return DataObject::Error { ty: ctx.types.primitives.void };
    };

    if !array.is_open() {
        if let DataObject::Literal { value: ConstValue::Int(v), .. } = &index {
            if *v < array.low as i64 || *v > array.high as i64 {
                ctx.error(ErrorCode::BadSubscript, span, &[v, &array.low, &array.high]);
            }
        }
    }

    let zero_based = if array.low == 0 {
        index
    } else {
        eval_binary(
            ctx,
            index,
            BinOp::Sub,
            DataObject::Literal { value: ConstValue::Int(array.low as i64), ty: ctx.types.primitives.sword },
            span,
        )
    };

    DataObject::Indexed { base: base_name, index: Box::new(zero_based), elem_ty: array.element }
}

/// `s.f`. `field` is resolved by name
/// against the struct descriptor.
pub fn eval_field<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    base_name: Name,
    base_ty: Type<'a>,
    field_name: Name,
    span: Span,
) -> DataObject<'a> {
    let TypeDescriptor::Struct(descriptor) = base_ty else {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"struct", &"non-struct"]);
        return DataObject::Error { ty: ctx.types.primitives.void };
    };
    match descriptor.field(field_name) {
        Some((offset, field_ty)) => DataObject::Field { base: base_name, field_offset: offset, field_ty },
        None => {
            ctx.error(ErrorCode::TypeMismatch, span, &[&"field", &"struct"]);
            DataObject::Error { ty: ctx.types.primitives.void }
        }
    }
}

/// `sizeof(type)`: a `word` compile-time constant. Open
/// arrays are a static error.
pub fn eval_sizeof<'a, S: DiagnosticSink>(ctx: &mut CompilerState<'a, S>, ty: Type<'a>, span: Span) -> DataObject<'a> {
    match sizeof(ty) {
        Ok(size) => DataObject::Literal { value: ConstValue::Int(size as i64), ty: ctx.types.primitives.uword },
        Err(()) => {
            ctx.error(ErrorCode::TypeMismatch, span, &[&"sized type", &"open array or void"]);
            DataObject::Error { ty: ctx.types.primitives.uword }
        }
    }
}

/// `(type) expr`: explicit conversion, truncation allowed
/// without warning.
pub fn eval_cast<'a, S: DiagnosticSink>(ctx: &mut CompilerState<'a, S>, ty: Type<'a>, expr: DataObject<'a>, span: Span) -> DataObject<'a> {
    let (TypeDescriptor::Primitive(target), Some(source)) = (ty, expr.as_primitive()) else {
        ctx.error(ErrorCode::TypeMismatch, span, &[&"cast target", &"expression"]);
        return DataObject::Error { ty };
    };
    if let DataObject::Literal { value: ConstValue::Int(v), .. } = &expr {
        return DataObject::Literal { value: ConstValue::Int(narrow(*v, target)), ty };
    }
    let (op, _) = load(ctx, expr);
    let converted = coerce(ctx, op, source, target);
    match converted {
        Operand::Temp(id) => DataObject::Temporary { id, ty },
        Operand::ConstInt(v) => DataObject::Literal { value: ConstValue::Int(v), ty },
        other => {
            consume(ctx, &other);
            DataObject::Error { ty }
        }
    }
}

/// Releases a value's temporary if it holds one with no further use
///. Used for discarded
/// expression-statement values.
pub fn maybe_free_temporary<S: DiagnosticSink>(ctx: &mut CompilerState<'_, S>, obj: &DataObject<'_>) {
    if let DataObject::Temporary { id, .. } = obj {
        ctx.temps.free(*id);
    }
}

/// A bare expression statement has no effect worth keeping unless it is a
/// call or an assignment.
pub fn is_meaningless(obj: &DataObject<'_>, kind_is_call_or_assign: bool) -> bool {
    !kind_is_call_or_assign && !matches!(obj, DataObject::Error { .. })
}

/// `f(args)`. `func_sym` must already have been
/// resolved to a function; arguments are marshalled left-to-right, with
/// `ref` formals requiring an lvalue argument (its address is passed).
pub fn eval_call<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    func_name: Name,
    return_ty: Type<'a>,
    formals: &[(Type<'a>, bool, bool)], // (type, by_ref, variadic)
    args: Vec<DataObject<'a>>,
    span: Span,
) -> DataObject<'a> {
    let variadic = formals.last().map(|f| f.2).unwrap_or(false);
    let fixed = if variadic { formals.len() - 1 } else { formals.len() };
    if args.len() < fixed || (!variadic && args.len() != fixed) {
        ctx.error(ErrorCode::WrongArgCount, span, &[&fixed, &args.len()]);
    }

    for (i, arg) in args.into_iter().enumerate() {
        let is_lvalue = arg.is_lvalue();
        if i < fixed {
            let (target_ty, by_ref, _) = formals[i];
            if by_ref {
                if !is_lvalue {
                    ctx.error(ErrorCode::NotAnLvalue, span, &[]);
                }
                let addr_temp = ctx.temps.alloc();
                let (operand, _) = load(ctx, arg);
                ctx.quads.emit(Quad::new(QuadOp::AddrOf, Operand::Temp(addr_temp), operand.clone(), Operand::None));
                consume(ctx, &operand);
                ctx.quads
                    .emit(Quad::new(QuadOp::Param, Operand::None, Operand::Temp(addr_temp), Operand::None));
                ctx.temps.free(addr_temp);
            } else {
                let converted = coerce_value(ctx, arg, target_ty, span);
                ctx.quads.emit(Quad::new(QuadOp::Param, Operand::None, converted.clone(), Operand::None));
                consume(ctx, &converted);
            }
        } else {
            let (operand, _) = load(ctx, arg);
            ctx.quads.emit(Quad::new(QuadOp::Param, Operand::None, operand.clone(), Operand::None));
            consume(ctx, &operand);
        }
    }

    if matches!(return_ty, TypeDescriptor::Primitive(Primitive::Void)) {
        ctx.quads.emit(Quad::new(QuadOp::Call, Operand::None, Operand::Sym(func_name), Operand::None));
        DataObject::Error { ty: return_ty }
    } else {
        let temp = ctx.temps.alloc();
        ctx.quads
            .emit(Quad::new(QuadOp::Call, Operand::Temp(temp), Operand::Sym(func_name), Operand::None));
        DataObject::Temporary { id: temp, ty: return_ty }
    }
}

/// Looks up `name`, reporting `Undeclared` and substituting a `word`
/// placeholder symbol on miss.
pub fn resolve_named<'a, S: DiagnosticSink>(ctx: &mut CompilerState<'a, S>, name: Name, span: Span) -> DataObject<'a> {
    let found = ctx.scopes.lookup(name).map(|sym| (sym.kind, sym.ty));
    match found {
        Some((kind, ty)) if kind != SymbolKind::Function && kind != SymbolKind::Label && kind != SymbolKind::StructTag => {
            DataObject::Named { name, ty }
        }
        _ => {
            let spelling = ctx.names.resolve(name).to_string();
            ctx.error(ErrorCode::Undeclared, span, &[&spelling]);
            DataObject::Error { ty: ctx.types.primitives.uword }
        }
    }
}

/// Coerces a `return` expression toward the enclosing function's
/// declared return type, the same rule assignment uses.
pub fn coerce_return<'a, S: DiagnosticSink>(
    ctx: &mut CompilerState<'a, S>,
    value: DataObject<'a>,
    return_ty: Type<'a>,
    span: Span,
) -> Operand {
    coerce_value(ctx, value, return_ty, span)
}
