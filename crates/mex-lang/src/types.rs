//! The `mex` type system: primitives, arrays, structs, and the small set
//! of operations over them: structural/nominal equality,
//! implicit conversion, and `sizeof`.
//!
//! Primitive descriptors are process-wide singletons; array and struct
//! descriptors are hash-consed into a per-compilation [`Arena`] so that
//! pointer equality implies type equality everywhere except the
//! structural comparison arrays still need.

use mex_base::{Arena, Symbol};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;

/// One of the eight primitive `mex` types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Void,
    Str,
    SByte,
    UByte,
    SWord,
    UWord,
    SDword,
    UDword,
}

impl Primitive {
    /// `true` for the six integer primitives (everything but void/string).
    pub fn is_integer(self) -> bool {
        !matches!(self, Primitive::Void | Primitive::Str)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Primitive::SByte | Primitive::SWord | Primitive::SDword)
    }

    /// Representation width in bytes. `Void` has no storage; callers that
    /// need `sizeof` on `void` must reject it beforehand.
    pub fn width(self) -> u32 {
        match self {
            Primitive::Void => 0,
            Primitive::Str => 4, // string is represented as a pointer/handle
            Primitive::SByte | Primitive::UByte => 1,
            Primitive::SWord | Primitive::UWord => 2,
            Primitive::SDword | Primitive::UDword => 4,
        }
    }

    /// The "rank" used to order integer types by width for promotion.
    fn rank(self) -> u32 {
        self.width()
    }
}

/// A single named, offset field of a struct.
#[derive(Debug)]
pub struct StructField<'a> {
    pub name: Symbol,
    pub ty: Type<'a>,
    pub offset: u32,
}

/// The mutable part of a struct descriptor: empty (just declared) until
/// [`TypeInterner::define_struct`] attaches a body.
#[derive(Debug, Default)]
pub struct StructBody<'a> {
    pub fields: Vec<StructField<'a>>,
    pub total_size: u32,
    pub defined: bool,
}

/// A struct type. Identity (not structure) determines equality: two
/// `StructDescriptor`s are the same type iff they are the same allocation.
#[derive(Debug)]
pub struct StructDescriptor<'a> {
    pub name: Symbol,
    pub body: RefCell<StructBody<'a>>,
}

impl<'a> StructDescriptor<'a> {
    pub fn field(&self, name: Symbol) -> Option<(u32, Type<'a>)> {
        self.body
            .borrow()
            .fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| (f.offset, f.ty))
    }

    pub fn is_defined(&self) -> bool {
        self.body.borrow().defined
    }
}

/// A fixed-size (or open, `high == -1`) array type.
#[derive(Debug)]
pub struct ArrayDescriptor<'a> {
    pub low: i32,
    pub high: i32,
    pub element: Type<'a>,
}

impl ArrayDescriptor<'_> {
    /// An array is "open" (unsized) when its upper bound is the `-1`
    /// sentinel.
    pub fn is_open(&self) -> bool {
        self.high == -1
    }
}

/// The tagged type-descriptor value.
#[derive(Debug)]
pub enum TypeDescriptor<'a> {
    Primitive(Primitive),
    Array(ArrayDescriptor<'a>),
    Struct(StructDescriptor<'a>),
}

/// A type handle: a shared reference into the per-compilation type arena.
/// Primitive equality is `Type` pointer equality; see [`type_equal`].
pub type Type<'a> = &'a TypeDescriptor<'a>;

/// The eight primitive singletons, allocated once per compilation.
pub struct Primitives<'a> {
    pub void: Type<'a>,
    pub string: Type<'a>,
    pub sbyte: Type<'a>,
    pub ubyte: Type<'a>,
    pub sword: Type<'a>,
    pub uword: Type<'a>,
    pub sdword: Type<'a>,
    pub udword: Type<'a>,
}

impl<'a> Primitives<'a> {
    fn new(arena: &'a Arena<TypeDescriptor<'a>>) -> Self {
        Primitives {
            void: arena.alloc(TypeDescriptor::Primitive(Primitive::Void)),
            string: arena.alloc(TypeDescriptor::Primitive(Primitive::Str)),
            sbyte: arena.alloc(TypeDescriptor::Primitive(Primitive::SByte)),
            ubyte: arena.alloc(TypeDescriptor::Primitive(Primitive::UByte)),
            sword: arena.alloc(TypeDescriptor::Primitive(Primitive::SWord)),
            uword: arena.alloc(TypeDescriptor::Primitive(Primitive::UWord)),
            sdword: arena.alloc(TypeDescriptor::Primitive(Primitive::SDword)),
            udword: arena.alloc(TypeDescriptor::Primitive(Primitive::UDword)),
        }
    }

    pub fn of(&self, p: Primitive) -> Type<'a> {
        match p {
            Primitive::Void => self.void,
            Primitive::Str => self.string,
            Primitive::SByte => self.sbyte,
            Primitive::UByte => self.ubyte,
            Primitive::SWord => self.sword,
            Primitive::UWord => self.uword,
            Primitive::SDword => self.sdword,
            Primitive::UDword => self.udword,
        }
    }
}

/// Owns the per-compilation type arena plus the hash-consing tables for
/// array and struct descriptors.
pub struct TypeInterner<'a> {
    arena: &'a Arena<TypeDescriptor<'a>>,
    pub primitives: Primitives<'a>,
    arrays: RefCell<HashMap<(i32, i32, usize), Type<'a>>>,
    structs: RefCell<HashMap<Symbol, Type<'a>>>,
}

impl<'a> TypeInterner<'a> {
    pub fn new(arena: &'a Arena<TypeDescriptor<'a>>) -> Self {
        let primitives = Primitives::new(arena);
        TypeInterner {
            arena,
            primitives,
            arrays: RefCell::new(HashMap::new()),
            structs: RefCell::new(HashMap::new()),
        }
    }

    /// Interns (and clamps) an array type.
    ///
    /// `high == -1` denotes an open array and is never clamped; any other
    /// out-of-range bound results in `Err` carrying the clamped `[low, low]`
    /// type so the caller can still emit code.
    pub fn array(&self, low: i32, high: i32, element: Type<'a>) -> Result<Type<'a>, Type<'a>> {
        let open = high == -1;
        let valid = open || (low <= high && (0..=0x7FFF).contains(&low) && (0..=0x7FFF).contains(&high));
        if valid {
            Ok(self.intern_array(low, high, element))
        } else {
            Err(self.intern_array(low, low, element))
        }
    }

    fn intern_array(&self, low: i32, high: i32, element: Type<'a>) -> Type<'a> {
        let key = (low, high, element as *const _ as usize);
        if let Some(ty) = self.arrays.borrow().get(&key) {
            return ty;
        }
        let ty = self.arena.alloc(TypeDescriptor::Array(ArrayDescriptor { low, high, element }));
        self.arrays.borrow_mut().insert(key, ty);
        ty
    }

    /// Reserves (or returns the existing) struct tag, undefined until
    /// [`Self::define_struct`] is called.
    pub fn declare_struct(&self, name: Symbol) -> Type<'a> {
        if let Some(ty) = self.structs.borrow().get(&name) {
            return ty;
        }
        let ty = self.arena.alloc(TypeDescriptor::Struct(StructDescriptor {
            name,
            body: RefCell::new(StructBody::default()),
        }));
        self.structs.borrow_mut().insert(name, ty);
        ty
    }

    pub fn lookup_struct(&self, name: Symbol) -> Option<Type<'a>> {
        self.structs.borrow().get(&name).copied()
    }

    /// Attaches a body to a previously declared struct tag, computing
    /// unpadded additive offsets.
    pub fn define_struct(&self, ty: Type<'a>, fields: Vec<(Symbol, Type<'a>)>) {
        let TypeDescriptor::Struct(descriptor) = ty else {
            panic!("define_struct called on a non-struct type");
        };
        let mut offset = 0u32;
        let mut out = Vec::with_capacity(fields.len());
        for (name, field_ty) in fields {
            let size = sizeof(field_ty).unwrap_or(0);
            out.push(StructField { name, ty: field_ty, offset });
            offset += size;
        }
        let mut body = descriptor.body.borrow_mut();
        body.total_size = offset;
        body.fields = out;
        body.defined = true;
    }
}

/// A short human-readable rendering of a type, for diagnostics and the
/// CLI's symbol dump (not used anywhere code generation depends on).
pub fn describe(ty: Type<'_>, names: &mex_base::Interner) -> String {
    match ty {
        TypeDescriptor::Primitive(Primitive::Void) => "void".to_string(),
        TypeDescriptor::Primitive(Primitive::Str) => "string".to_string(),
        TypeDescriptor::Primitive(Primitive::SByte) => "byte".to_string(),
        TypeDescriptor::Primitive(Primitive::UByte) => "unsigned byte".to_string(),
        TypeDescriptor::Primitive(Primitive::SWord) => "word".to_string(),
        TypeDescriptor::Primitive(Primitive::UWord) => "unsigned word".to_string(),
        TypeDescriptor::Primitive(Primitive::SDword) => "dword".to_string(),
        TypeDescriptor::Primitive(Primitive::UDword) => "unsigned dword".to_string(),
        TypeDescriptor::Array(a) if a.is_open() => format!("array[{}..] of {}", a.low, describe(a.element, names)),
        TypeDescriptor::Array(a) => format!("array[{}..{}] of {}", a.low, a.high, describe(a.element, names)),
        TypeDescriptor::Struct(s) => format!("struct {}", names.resolve(s.name)),
    }
}

/// Structural-for-arrays, nominal-for-structs, identity-for-primitives
/// type equality.
pub fn type_equal(a: Type<'_>, b: Type<'_>) -> bool {
    if std::ptr::eq(a, b) {
        return true;
    }
    match (a, b) {
        (TypeDescriptor::Array(x), TypeDescriptor::Array(y)) => {
            x.low == y.low && x.high == y.high && type_equal(x.element, y.element)
        }
        _ => false,
    }
}

/// `sizeof(type)`, a compile-time `word` constant.
///
/// `Err(())` for `void` and for open arrays, whose size is a static error.
pub fn sizeof(ty: Type<'_>) -> Result<u32, ()> {
    match ty {
        TypeDescriptor::Primitive(Primitive::Void) => Err(()),
        TypeDescriptor::Primitive(p) => Ok(p.width()),
        TypeDescriptor::Array(a) => {
            if a.is_open() {
                Err(())
            } else {
                let elems = (a.high - a.low + 1) as u32;
                Ok(elems * sizeof(a.element)?)
            }
        }
        TypeDescriptor::Struct(s) => Ok(s.body.borrow().total_size),
    }
}

/// The primitive that `a op b` should be computed in, per the usual
/// promotion rules: wider type wins; equal width prefers
/// signed.
pub fn common_integer_type(a: Primitive, b: Primitive) -> Primitive {
    debug_assert!(a.is_integer() && b.is_integer());
    if a.rank() != b.rank() {
        if a.rank() > b.rank() {
            a
        } else {
            b
        }
    } else if a.is_signed() || b.is_signed() {
        match a.rank() {
            1 => Primitive::SByte,
            2 => Primitive::SWord,
            _ => Primitive::SDword,
        }
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_are_singletons() {
        let arena = Arena::new();
        let interner = TypeInterner::new(&arena);
        assert!(std::ptr::eq(interner.primitives.of(Primitive::SByte), interner.primitives.sbyte));
    }

    #[test]
    fn array_interning_dedupes_identical_shapes() {
        let arena = Arena::new();
        let interner = TypeInterner::new(&arena);
        let a1 = interner.array(0, 4, interner.primitives.ubyte).unwrap();
        let a2 = interner.array(0, 4, interner.primitives.ubyte).unwrap();
        assert!(std::ptr::eq(a1, a2));
    }

    #[test]
    fn invalid_range_clamps_to_low_low() {
        let arena = Arena::new();
        let interner = TypeInterner::new(&arena);
        let err = interner.array(5, 2, interner.primitives.ubyte).unwrap_err();
        let TypeDescriptor::Array(a) = err else { panic!() };
        assert_eq!((a.low, a.high), (5, 5));
    }

    #[test]
    fn open_array_has_no_static_size() {
        let arena = Arena::new();
        let interner = TypeInterner::new(&arena);
        let open = interner.array(0, -1, interner.primitives.ubyte).unwrap();
        assert!(sizeof(open).is_err());
    }

    #[test]
    fn struct_size_is_sum_of_unpadded_fields() {
        let arena = Arena::new();
        let interner = TypeInterner::new(&arena);
        let tag = interner.declare_struct(Symbol::EMPTY);
        interner.define_struct(
            tag,
            vec![(Symbol::EMPTY, interner.primitives.ubyte), (Symbol::EMPTY, interner.primitives.uword)],
        );
        assert_eq!(sizeof(tag).unwrap(), 3);
    }

    #[test]
    fn array_sizeof_multiplies_element_count() {
        let arena = Arena::new();
        let interner = TypeInterner::new(&arena);
        let arr = interner.array(1, 5, interner.primitives.ubyte).unwrap();
        assert_eq!(sizeof(arr).unwrap(), 5);
    }

    #[test]
    fn common_integer_type_prefers_wider() {
        assert_eq!(common_integer_type(Primitive::UByte, Primitive::SWord), Primitive::SWord);
    }

    #[test]
    fn common_integer_type_prefers_signed_at_equal_width() {
        assert_eq!(common_integer_type(Primitive::UByte, Primitive::SByte), Primitive::SByte);
    }
}
