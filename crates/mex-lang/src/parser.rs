//! Recursive-descent parser driver and the semantic actions it runs on
//! each construct it recognizes.
//!
//! The grammar's precedence ladder is table-driven the way an LALR(1)
//! parser's action table would be, but the automaton itself is a
//! hand-written descent over [`TokenKind`] rather than a generated
//! shift/reduce table: no table generator can run as part of this build,
//! and a descent over a 17-production expression grammar plus a dozen
//! statement forms is the idiomatic substitute. Control-flow back-patching,
//! scope discipline, and constant folding all live exactly where the
//! table-driven version would put them — in the point where each
//! construct reduces.

use crate::dataobject::{
    eval_assign, eval_binary, eval_call, eval_cast, eval_field, eval_index, eval_neg, is_meaningless,
    maybe_free_temporary, resolve_named, BinOp, ConstValue, DataObject,
};
use crate::diagnostics::{DiagnosticSink, ErrorCode};
use crate::quad::{Operand, Quad, QuadOp};
use crate::state::{CompilerState, CurFn, LabelState};
use crate::symbol::{FormalArg, Symbol as LangSymbol, SymbolKind};
use crate::token::{Lexer, LitValue, LitWidth, SemanticValue, Token, TokenKind};
use crate::types::{Primitive, Type, TypeDescriptor};
use mex_base::{Span, Symbol as Name};

/// A syntax error recorded during descent; distinct from the semantic
/// diagnostics routed through [`DiagnosticSink`] — parse-phase failures
/// and semantic ones are a different taxonomic axis.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

pub struct Parser<'a, L: Lexer, S: DiagnosticSink> {
    lexer: L,
    current: Token,
    /// One token of lookahead past `current`, filled lazily by [`Self::peek`].
    /// Needed only to resolve `(` ambiguity: whether it opens a cast or a
    /// parenthesized expression depends on the token after it.
    peeked: Option<Token>,
    pub ctx: CompilerState<'a, S>,
    pub parse_errors: Vec<ParseError>,
    /// `true` exactly when the most recently parsed expression is, with
    /// nothing wrapping it, an assignment or a call — the only forms a
    /// bare expression statement can have without being pointless.
    last_was_effectful: bool,
}

impl<'a, L: Lexer, S: DiagnosticSink> Parser<'a, L, S> {
    pub fn new(mut lexer: L, ctx: CompilerState<'a, S>) -> Self {
        let current = lexer.next_token();
        Parser { lexer, current, peeked: None, ctx, parse_errors: Vec::new(), last_was_effectful: false }
    }

    fn bump(&mut self) -> Token {
        let next = self.peeked.take().unwrap_or_else(|| self.lexer.next_token());
        std::mem::replace(&mut self.current, next)
    }

    /// The token after `current`, without consuming it.
    fn peek(&mut self) -> &Token {
        if self.peeked.is_none() {
            self.peeked = Some(self.lexer.next_token());
        }
        self.peeked.as_ref().unwrap()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// Reports a syntax error and recovers by discarding tokens until the
    /// next statement boundary, matching the grammar's single `error ;`
    /// recovery production in spirit (a whole statement is dropped rather
    /// than threading through the LALR state/error-token machinery).
    fn expect(&mut self, kind: TokenKind, what: &str) -> Token {
        if self.at(kind) {
            self.bump()
        } else {
            self.parse_errors.push(ParseError {
                message: format!("expected {what}, found {:?}", self.current.kind),
                span: self.current.span,
            });
            self.current.clone()
        }
    }

    fn recover_to_statement_boundary(&mut self) {
        while !matches!(self.current.kind, TokenKind::Semi | TokenKind::End | TokenKind::Eof) {
            self.bump();
        }
        self.eat(TokenKind::Semi);
    }

    fn ident_name(&mut self) -> Name {
        match &self.current.value {
            SemanticValue::Ident(spelling) => {
                let name = self.ctx.names.intern(spelling);
                self.bump();
                name
            }
            _ => {
                self.parse_errors.push(ParseError {
                    message: "expected identifier".to_string(),
                    span: self.current.span,
                });
                self.ctx.names.intern("")
            }
        }
    }

    // ---- top level -----------------------------------------------------

    /// Parses the whole translation unit: a sequence of variable
    /// declarations, struct declarations, and function definitions.
    pub fn parse_program(&mut self) {
        while !self.at(TokenKind::Eof) {
            self.parse_top_level_item();
        }
    }

    fn parse_top_level_item(&mut self) {
        if self.at(TokenKind::Struct) && self.looks_like_struct_decl() {
            self.parse_struct_decl_statement();
            return;
        }
        let span = self.current.span;
        let Some(ty) = self.parse_type() else {
            self.parse_errors.push(ParseError { message: "expected a type".to_string(), span });
            self.recover_to_statement_boundary();
            return;
        };
        let name = self.ident_name();
        if self.at(TokenKind::LParen) {
            self.parse_function_def(ty, name);
        } else {
            self.finish_var_decl_list(ty, name);
        }
    }

    /// A lookahead-free heuristic: `struct Ident {` or `struct Ident ;`
    /// (no following identifier) is a tag declaration/definition; `struct
    /// Ident name ...` is a variable declaration using that struct as its
    /// type. Since this parser has one token of lookahead, struct-as-type
    /// in variable/field/param position is handled directly in
    /// [`Self::parse_type`] instead of here.
    fn looks_like_struct_decl(&self) -> bool {
        true
    }

    fn parse_struct_decl_statement(&mut self) {
        self.bump(); // `struct`
        let tag_span = self.current.span;
        let name = self.ident_name();
        let ty = self.ctx.types.declare_struct(name);
        if self.eat(TokenKind::LBrace) {
            let mut fields = Vec::new();
            while !self.at(TokenKind::RBrace) && !self.at(TokenKind::Eof) {
                let Some(field_ty) = self.parse_type() else { break };
                let field_name = self.ident_name();
                fields.push((field_name, field_ty));
                self.eat(TokenKind::Semi);
            }
            self.expect(TokenKind::RBrace, "`}`");
            self.ctx.types.define_struct(ty, fields);
        }
        // Optional trailing variable declarations of this struct type:
        // `struct S { ... } s, t;`
        if !self.at(TokenKind::Semi) {
            self.require_defined_struct(ty, name, tag_span);
            let name = self.ident_name();
            self.finish_var_decl_list(ty, name);
        } else {
            self.eat(TokenKind::Semi);
        }
    }

    /// Parses one declared type (primitive, array, or struct reference).
    /// Returns `None` if the current token starts no type.
    fn parse_type(&mut self) -> Option<Type<'a>> {
        match self.current.kind {
            TokenKind::Unsigned | TokenKind::Signed => {
                let signed = self.at(TokenKind::Signed);
                self.bump();
                let width = self.expect_width_keyword();
                Some(self.ctx.types.primitives.of(primitive_for(width, signed)))
            }
            TokenKind::Byte => {
                self.bump();
                Some(self.ctx.types.primitives.of(Primitive::UByte))
            }
            TokenKind::Word => {
                self.bump();
                Some(self.ctx.types.primitives.of(Primitive::UWord))
            }
            TokenKind::Dword => {
                self.bump();
                Some(self.ctx.types.primitives.of(Primitive::UDword))
            }
            TokenKind::Void => {
                self.bump();
                Some(self.ctx.types.primitives.void)
            }
            TokenKind::KwString => {
                self.bump();
                Some(self.ctx.types.primitives.string)
            }
            TokenKind::Array => {
                self.bump();
                self.expect(TokenKind::LBracket, "`[`");
                let low = self.parse_const_i32();
                self.expect(TokenKind::DotDot, "`..`");
                let high = self.parse_open_or_const_i32();
                self.expect(TokenKind::RBracket, "`]`");
                self.expect(TokenKind::Of, "`of`");
                let element = self.parse_type().unwrap_or(self.ctx.types.primitives.void);
                let span = self.current.span;
                match self.ctx.types.array(low, high, element) {
                    Ok(ty) => Some(ty),
                    Err(clamped) => {
                        self.ctx.error(ErrorCode::InvalidRange, span, &[&low, &high]);
                        Some(clamped)
                    }
                }
            }
            TokenKind::Struct => {
                self.bump();
                let name_span = self.current.span;
                let name = self.ident_name();
                let ty = match self.ctx.types.lookup_struct(name) {
                    Some(ty) => ty,
                    None => self.ctx.types.declare_struct(name),
                };
                self.require_defined_struct(ty, name, name_span);
                Some(ty)
            }
            _ => None,
        }
    }

    /// A struct tag may be declared (reserving the name) well before its
    /// body is attached. Using it as a value type before that happens —
    /// a field, parameter, return, or variable type — is an error; only
    /// another `struct Name { ... }` can fill the tag in.
    fn require_defined_struct(&mut self, ty: Type<'a>, name: Name, span: Span) {
        if let TypeDescriptor::Struct(descriptor) = ty {
            if !descriptor.is_defined() {
                self.ctx.error(ErrorCode::UndefinedStruct, span, &[&self.ctx.names.resolve(name).to_string()]);
            }
        }
    }

    fn expect_width_keyword(&mut self) -> LitWidth {
        match self.current.kind {
            TokenKind::Byte => {
                self.bump();
                LitWidth::Byte
            }
            TokenKind::Word => {
                self.bump();
                LitWidth::Word
            }
            TokenKind::Dword => {
                self.bump();
                LitWidth::Dword
            }
            _ => {
                self.parse_errors.push(ParseError {
                    message: "expected byte/word/dword after signed/unsigned".to_string(),
                    span: self.current.span,
                });
                LitWidth::Word
            }
        }
    }

    fn parse_const_i32(&mut self) -> i32 {
        if let SemanticValue::Literal(lit) = &self.current.value {
            if let LitValue::Int(v) = lit.value {
                self.bump();
                return v as i32;
            }
        }
        self.parse_errors.push(ParseError { message: "expected integer constant".to_string(), span: self.current.span });
        self.bump();
        0
    }

    /// Array upper bounds may be the literal `-1` open-array sentinel,
    /// written as a unary-minus integer literal.
    fn parse_open_or_const_i32(&mut self) -> i32 {
        if self.eat(TokenKind::Minus) {
            let v = self.parse_const_i32();
            -v
        } else {
            self.parse_const_i32()
        }
    }

    fn finish_var_decl_list(&mut self, ty: Type<'a>, first_name: Name) {
        self.declare_one_var(ty, first_name);
        while self.eat(TokenKind::Comma) {
            let name = self.ident_name();
            self.declare_one_var(ty, name);
        }
        self.expect(TokenKind::Semi, "`;`");
    }

    fn declare_one_var(&mut self, ty: Type<'a>, name: Name) {
        let depth = self.ctx.scopes.depth();
        let offset = self.ctx.scopes.offset;
        let size = crate::types::sizeof(ty).unwrap_or(0);
        let symbol = LangSymbol::variable(name, ty, depth, offset);
        self.ctx.scopes.offset += size as i32;
        if self.ctx.scopes.declare(symbol).is_err() {
            self.ctx.error(ErrorCode::Duplicate, self.current.span, &[&self.ctx.names.resolve(name).to_string()]);
        }
    }

    // ---- function definitions -------------------------------------------

    /// `type name ( args ) begin body end`.
    fn parse_function_def(&mut self, return_ty: Type<'a>, name: Name) {
        let depth = self.ctx.scopes.depth();
        let func_symbol = LangSymbol::function(name, return_ty, depth);
        if self.ctx.scopes.declare(func_symbol).is_err() {
            self.ctx.error(ErrorCode::Duplicate, self.current.span, &[&self.ctx.names.resolve(name).to_string()]);
        }

        self.expect(TokenKind::LParen, "`(`");
        let saved_offset = self.ctx.scopes.open();
        self.ctx.scopes.offset = 0;
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_formal_arg());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`");

        let start_quad = self.ctx.quads.emit(Quad::new(QuadOp::Prologue, Operand::Sym(name), Operand::None, Operand::None));
        self.ctx.curfn = Some(CurFn {
            name,
            return_ty,
            args: args.clone(),
            labels: std::collections::HashMap::new(),
            return_jumps: crate::quad::PatchList::empty(),
            start_quad,
        });

        self.expect(TokenKind::Begin, "`begin`");
        while !self.at(TokenKind::End) && !self.at(TokenKind::Eof) {
            self.parse_statement();
        }
        self.expect(TokenKind::End, "`end`");

        let epilogue = self.ctx.quads.emit(Quad::new(QuadOp::Epilogue, Operand::Sym(name), Operand::None, Operand::None));
        let return_jumps = self.ctx.curfn_mut().return_jumps.clone();
        self.ctx.quads.patch(&return_jumps, epilogue);

        for (label_name, state) in self.ctx.curfn_mut().labels.drain().collect::<Vec<_>>() {
            if let LabelState::Forward(list) = state {
                // Label referenced by `goto` but never defined: patch to
                // the epilogue so the jump is at least well-formed, and
                // report it the same way an undeclared symbol would be.
                let spelling = self.ctx.names.resolve(label_name).to_string();
                self.ctx.error(ErrorCode::Undeclared, self.current.span, &[&spelling]);
                self.ctx.quads.patch(&list, epilogue);
            }
        }

        let end_quad = self.ctx.quads.len();
        self.ctx.curfn = None;
        self.ctx.scopes.close(saved_offset);

        if let Some(sym) = self.ctx.scopes.lookup_mut(name) {
            if let Some(info) = sym.function.as_mut() {
                info.args = args;
                info.start_quad = start_quad;
                info.end_quad = end_quad;
            }
        }
    }

    fn parse_formal_arg(&mut self) -> FormalArg<'a> {
        if self.at(TokenKind::Ellipsis) {
            self.bump();
            return FormalArg { name: Name::EMPTY, ty: self.ctx.types.primitives.void, by_ref: false, variadic: true };
        }
        let by_ref = self.eat(TokenKind::Ref);
        let ty = self.parse_type().unwrap_or(self.ctx.types.primitives.void);
        let name = self.ident_name();
        let depth = self.ctx.scopes.depth();
        let offset = self.ctx.scopes.offset;
        let size = crate::types::sizeof(ty).unwrap_or(4);
        self.ctx.scopes.offset += size as i32;
        let symbol = LangSymbol::argument(name, ty, depth, offset, by_ref);
        if self.ctx.scopes.declare(symbol).is_err() {
            self.ctx.error(ErrorCode::Duplicate, self.current.span, &[&self.ctx.names.resolve(name).to_string()]);
        }
        FormalArg { name, ty, by_ref, variadic: false }
    }

    // ---- statements ------------------------------------------------------

    fn parse_statement(&mut self) {
        match self.current.kind {
            TokenKind::Begin => self.parse_block(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Goto => self.parse_goto(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Error => self.parse_error_recovery_statement(),
            TokenKind::Struct => self.parse_struct_decl_statement(),
            _ => {
                if self.starts_type() {
                    self.parse_local_var_decl();
                } else {
                    self.parse_expr_statement();
                }
            }
        }
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.current.kind,
            TokenKind::Byte
                | TokenKind::Word
                | TokenKind::Dword
                | TokenKind::Void
                | TokenKind::KwString
                | TokenKind::Unsigned
                | TokenKind::Signed
                | TokenKind::Array
        )
    }

    fn parse_block(&mut self) {
        self.bump(); // `begin`
        let saved = self.ctx.scopes.open();
        while !self.at(TokenKind::End) && !self.at(TokenKind::Eof) {
            self.parse_statement();
        }
        self.expect(TokenKind::End, "`end`");
        self.ctx.scopes.close(saved);
    }

    fn parse_local_var_decl(&mut self) {
        let span = self.current.span;
        let Some(ty) = self.parse_type() else {
            self.parse_errors.push(ParseError { message: "expected a type".to_string(), span });
            self.recover_to_statement_boundary();
            return;
        };
        let name = self.ident_name();
        self.finish_var_decl_list(ty, name);
    }

    /// `if cond then S` / `if cond then S else T`.
    fn parse_if(&mut self) {
        self.bump(); // `if`
        let span = self.current.span;
        let cond = self.parse_expr();
        self.expect(TokenKind::Then, "`then`");
        let (cond_op, _) = self.load_cond(cond, span);
        let (jz_idx, patch_p) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jz, cond_op);
        let _ = jz_idx;

        self.parse_statement();

        if self.eat(TokenKind::Else) {
            let (jmp_idx, patch_q) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jmp, Operand::None);
            let _ = jmp_idx;
            self.ctx.quads.patch(&patch_p, self.ctx.quads.len());
            self.parse_statement();
            self.ctx.quads.patch(&patch_q, self.ctx.quads.len());
        } else {
            self.ctx.quads.patch(&patch_p, self.ctx.quads.len());
        }
    }

    /// `while cond do S`.
    fn parse_while(&mut self) {
        self.bump(); // `while`
        let top = self.ctx.quads.len();
        let span = self.current.span;
        let cond = self.parse_expr();
        self.expect(TokenKind::Do, "`do`");
        let (cond_op, _) = self.load_cond(cond, span);
        let (_, patch_e) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jz, cond_op);

        self.parse_statement();

        self.ctx.quads.emit_jmp_to(top);
        self.ctx.quads.patch(&patch_e, self.ctx.quads.len());
    }

    /// `do S while cond`.
    fn parse_do_while(&mut self) {
        self.bump(); // `do`
        let top = self.ctx.quads.len();
        self.parse_statement();
        self.expect(TokenKind::While, "`while`");
        let span = self.current.span;
        let cond = self.parse_expr();
        self.expect(TokenKind::Semi, "`;`");
        let (cond_op, _) = self.load_cond(cond, span);
        self.ctx.quads.emit(Quad::new(QuadOp::Jnz, Operand::Target(crate::quad::JumpTarget::Resolved(top)), cond_op, Operand::None));
    }

    /// `for ( init ; test ; post ) body` with a two-jump anchor layout:
    /// init, vmTest:test+jz E+jmp vmBody, vmPost:post+jmp
    /// vmTest, vmBody:body+jmp vmPost, patch(E).
    fn parse_for(&mut self) {
        self.bump(); // `for`
        self.expect(TokenKind::LParen, "`(`");

        let saved = self.ctx.scopes.open();
        if !self.at(TokenKind::Semi) {
            self.parse_expr_statement_inner();
        }
        self.expect(TokenKind::Semi, "`;`");

        let vm_test = self.ctx.quads.len();
        let test_span = self.current.span;
        let test = if !self.at(TokenKind::Semi) { Some(self.parse_expr()) } else { None };
        self.expect(TokenKind::Semi, "`;`");

        let patch_e = if let Some(test) = test {
            let (cond_op, _) = self.load_cond(test, test_span);
            let (_, patch_e) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jz, cond_op);
            Some(patch_e)
        } else {
            None
        };
        let (_, patch_body_fwd) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jmp, Operand::None);

        let vm_post = self.ctx.quads.len();
        if !self.at(TokenKind::RParen) {
            self.parse_expr_statement_inner();
        }
        self.expect(TokenKind::RParen, "`)`");
        self.ctx.quads.emit_jmp_to(vm_test);

        let vm_body = self.ctx.quads.len();
        self.ctx.quads.patch(&patch_body_fwd, vm_body);

        self.parse_statement();
        self.ctx.quads.emit_jmp_to(vm_post);

        if let Some(patch_e) = patch_e {
            self.ctx.quads.patch(&patch_e, self.ctx.quads.len());
        }
        self.ctx.scopes.close(saved);
    }

    /// `goto L;`
    fn parse_goto(&mut self) {
        self.bump(); // `goto`
        let name = self.ident_name();
        self.expect(TokenKind::Semi, "`;`");

        let existing = self.ctx.curfn_mut().labels.remove(&name);
        match existing {
            Some(LabelState::Defined(target)) => {
                self.ctx.quads.emit_jmp_to(target);
                self.ctx.curfn_mut().labels.insert(name, LabelState::Defined(target));
            }
            Some(LabelState::Forward(list)) => {
                let (_, single) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jmp, Operand::None);
                self.ctx.curfn_mut().labels.insert(name, LabelState::Forward(list.merge(single)));
            }
            None => {
                let (_, single) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jmp, Operand::None);
                self.ctx.curfn_mut().labels.insert(name, LabelState::Forward(single));
            }
        }
    }

    /// `L:`. Only reached via [`Self::parse_expr_statement`]'s
    /// one-token lookahead past a leading identifier.
    fn parse_label_named(&mut self, name: Name, span: Span) {
        let here = self.ctx.quads.len();
        let curfn = self.ctx.curfn_mut();
        match curfn.labels.remove(&name) {
            Some(LabelState::Forward(list)) => {
                self.ctx.quads.patch(&list, here);
                self.ctx.curfn_mut().labels.insert(name, LabelState::Defined(here));
            }
            Some(LabelState::Defined(_)) => {
                let spelling = self.ctx.names.resolve(name).to_string();
                self.ctx.error(ErrorCode::DupLabel, span, &[&spelling]);
                self.ctx.curfn_mut().labels.insert(name, LabelState::Defined(here));
            }
            None => {
                self.ctx.curfn_mut().labels.insert(name, LabelState::Defined(here));
            }
        }
    }

    /// `return [expr];`.
    fn parse_return(&mut self) {
        self.bump(); // `return`
        let span = self.current.span;
        if self.at(TokenKind::Semi) {
            let return_ty = self.ctx.curfn_mut().return_ty;
            if !matches!(return_ty, TypeDescriptor::Primitive(Primitive::Void)) {
                self.ctx.error(ErrorCode::RetType, span, &[&"non-void"]);
            }
            self.ctx.quads.emit(Quad::new(QuadOp::Return, Operand::None, Operand::None, Operand::None));
        } else {
            let value = self.parse_expr();
            let return_ty = self.ctx.curfn_mut().return_ty;
            if matches!(return_ty, TypeDescriptor::Primitive(Primitive::Void)) {
                self.ctx.error(ErrorCode::RetType, span, &[&"void"]);
                let (op, _) = self.load_expr(value);
                self.ctx.quads.emit(Quad::new(QuadOp::Return, Operand::None, op, Operand::None));
            } else {
                let op = crate::dataobject::coerce_return(&mut self.ctx, value, return_ty, span);
                self.ctx.quads.emit(Quad::new(QuadOp::Return, Operand::None, op, Operand::None));
            }
        }
        self.expect(TokenKind::Semi, "`;`");
        let (_, patch) = self.ctx.quads.emit_jump_placeholder(QuadOp::Jmp, Operand::None);
        let return_jumps = std::mem::take(&mut self.ctx.curfn_mut().return_jumps);
        self.ctx.curfn_mut().return_jumps = return_jumps.merge(patch);
    }

    /// The grammar's one explicit error-recovery production: `error ;`.
    fn parse_error_recovery_statement(&mut self) {
        self.bump(); // `error`
        self.eat(TokenKind::Semi);
    }

    fn parse_expr_statement(&mut self) {
        self.parse_expr_statement_inner();
        self.expect(TokenKind::Semi, "`;`");
    }

    /// Shared by standalone expression statements and the `init`/`post`
    /// clauses of a `for` loop (neither is terminated there by `;` in the
    /// same way). Also the point where a leading `ident :` is recognized
    /// as a label rather than an expression.
    fn parse_expr_statement_inner(&mut self) {
        if self.at(TokenKind::Ident) {
            if let SemanticValue::Ident(spelling) = self.current.value.clone() {
                let name = self.ctx.names.intern(&spelling);
                let span = self.current.span;
                // One token of lookahead distinguishes `L:` from an
                // expression starting with the same identifier.
                let saved = self.current.clone();
                self.bump();
                if self.at(TokenKind::Colon) {
                    self.bump();
                    self.parse_label_named(name, span);
                    return;
                }
                let value = self.parse_expr_from_ident(name, span, saved);
                self.finish_expr_statement(value);
                return;
            }
        }
        let value = self.parse_expr();
        self.finish_expr_statement(value);
    }

    fn finish_expr_statement(&mut self, value: DataObject<'a>) {
        if is_meaningless(&value, self.last_was_effectful) {
            self.ctx.error(ErrorCode::WarnMeaninglessExpr, self.current.span, &[]);
        }
        maybe_free_temporary(&mut self.ctx, &value);
    }

    // ---- expressions -------------------------------------------------

    fn load_expr(&mut self, obj: DataObject<'a>) -> (Operand, Type<'a>) {
        crate::dataobject::load(&mut self.ctx, obj)
    }

    /// A condition must be integer-typed; coercion to `UByte` keeps the
    /// `jz`/`jnz` quads uniform regardless of the source width.
    fn load_cond(&mut self, obj: DataObject<'a>, span: Span) -> (Operand, Type<'a>) {
        if obj.as_primitive().is_none() {
            self.ctx.error(ErrorCode::TypeMismatch, span, &[&"integer", &"non-integer condition"]);
        }
        self.load_expr(obj)
    }

    fn parse_expr(&mut self) -> DataObject<'a> {
        self.parse_assign()
    }

    fn parse_assign(&mut self) -> DataObject<'a> {
        let span = self.current.span;
        let lhs = self.parse_logical_or();
        if self.eat(TokenKind::Assign) {
            let rhs = self.parse_assign();
            let result = eval_assign(&mut self.ctx, lhs, rhs, span);
            self.last_was_effectful = true;
            return result;
        }
        lhs
    }

    fn parse_logical_or(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_logical_and();
        while self.at(TokenKind::OrOr) {
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_logical_and();
            lhs = eval_binary(&mut self.ctx, lhs, BinOp::LogOr, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_logical_and(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_equality();
        while self.at(TokenKind::AndAnd) {
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_equality();
            lhs = eval_binary(&mut self.ctx, lhs, BinOp::LogAnd, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_equality(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_relational();
        loop {
            let op = match self.current.kind {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                _ => break,
            };
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_relational();
            lhs = eval_binary(&mut self.ctx, lhs, op, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_relational(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_bitwise();
        loop {
            let op = match self.current.kind {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                _ => break,
            };
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_bitwise();
            lhs = eval_binary(&mut self.ctx, lhs, op, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_bitwise(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_shift();
        loop {
            let op = match self.current.kind {
                TokenKind::Pipe => BinOp::BitOr,
                TokenKind::Amp => BinOp::BitAnd,
                _ => break,
            };
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_shift();
            lhs = eval_binary(&mut self.ctx, lhs, op, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_shift(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_additive();
        loop {
            let op = match self.current.kind {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_additive();
            lhs = eval_binary(&mut self.ctx, lhs, op, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_additive(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_multiplicative();
        loop {
            let op = match self.current.kind {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_multiplicative();
            lhs = eval_binary(&mut self.ctx, lhs, op, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    fn parse_multiplicative(&mut self) -> DataObject<'a> {
        let mut lhs = self.parse_unary();
        loop {
            let op = match self.current.kind {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let span = self.current.span;
            self.bump();
            let rhs = self.parse_unary();
            lhs = eval_binary(&mut self.ctx, lhs, op, rhs, span);
            self.last_was_effectful = false;
        }
        lhs
    }

    /// Unary minus, a parenthesized cast, or `sizeof(type)`.
    fn parse_unary(&mut self) -> DataObject<'a> {
        let span = self.current.span;
        match self.current.kind {
            TokenKind::Minus => {
                self.bump();
                let operand = self.parse_unary();
                let result = eval_neg(&mut self.ctx, operand, span);
                self.last_was_effectful = false;
                result
            }
            TokenKind::Sizeof => {
                self.bump();
                self.expect(TokenKind::LParen, "`(`");
                let ty = self.parse_type().unwrap_or(self.ctx.types.primitives.void);
                self.expect(TokenKind::RParen, "`)`");
                let result = crate::dataobject::eval_sizeof(&mut self.ctx, ty, span);
                self.last_was_effectful = false;
                result
            }
            TokenKind::LParen if self.is_cast_ahead() => {
                self.bump();
                let ty = self.parse_type().unwrap_or(self.ctx.types.primitives.void);
                self.expect(TokenKind::RParen, "`)`");
                let operand = self.parse_unary();
                let result = eval_cast(&mut self.ctx, ty, operand, span);
                self.last_was_effectful = false;
                result
            }
            _ => self.parse_postfix(),
        }
    }

    /// One token of lookahead cannot distinguish `(type) expr` from
    /// `(expr)` in general; this parser resolves the ambiguity by
    /// treating a `(` immediately followed by a type keyword as a cast,
    /// which covers every cast the grammar's primitive type set admits
    /// (a parenthesized expression never starts with one of these
    /// keywords).
    fn is_cast_ahead(&mut self) -> bool {
        matches!(
            self.peek().kind,
            TokenKind::Byte | TokenKind::Word | TokenKind::Dword | TokenKind::Unsigned | TokenKind::Signed
        )
    }

    fn parse_postfix(&mut self) -> DataObject<'a> {
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> DataObject<'a> {
        let span = self.current.span;
        match self.current.kind {
            TokenKind::LParen => {
                self.bump();
                let inner = self.parse_expr();
                self.expect(TokenKind::RParen, "`)`");
                inner
            }
            TokenKind::IntLit => {
                let lit = self.take_literal();
                self.bump();
                self.last_was_effectful = false;
                self.literal_dataobject(lit)
            }
            TokenKind::StrLit => {
                let lit = self.take_literal();
                self.bump();
                self.last_was_effectful = false;
                self.literal_dataobject(lit)
            }
            TokenKind::Ident => {
                let spelling = match self.current.value.clone() {
                    SemanticValue::Ident(s) => s,
                    _ => unreachable!("Ident token always carries SemanticValue::Ident"),
                };
                let name = self.ctx.names.intern(&spelling);
                self.bump();
                self.parse_expr_from_ident(name, span, self.current.clone())
            }
            _ => {
                self.parse_errors.push(ParseError { message: "expected an expression".to_string(), span });
                self.bump();
                self.last_was_effectful = false;
                DataObject::Error { ty: self.ctx.types.primitives.void }
            }
        }
    }

    fn take_literal(&self) -> crate::token::Literal {
        match &self.current.value {
            SemanticValue::Literal(lit) => lit.clone(),
            _ => unreachable!("IntLit/StrLit token always carries SemanticValue::Literal"),
        }
    }

    fn literal_dataobject(&mut self, lit: crate::token::Literal) -> DataObject<'a> {
        match lit.value {
            LitValue::Int(v) => {
                let prim = match lit.width {
                    LitWidth::Byte => Primitive::UByte,
                    LitWidth::Word => Primitive::UWord,
                    LitWidth::Dword => Primitive::UDword,
                    LitWidth::Str => Primitive::UDword,
                };
                DataObject::Literal { value: ConstValue::Int(v), ty: self.ctx.types.primitives.of(prim) }
            }
            LitValue::Str(s) => DataObject::Literal { value: ConstValue::Str(s), ty: self.ctx.types.primitives.string },
        }
    }

    /// Continues parsing a primary expression after an identifier has
    /// already been consumed: a bare name, `id[expr]`, `id.field`, or
    /// `id(args)`.
    fn parse_expr_from_ident(&mut self, name: Name, span: Span, _peeked: Token) -> DataObject<'a> {
        if self.at(TokenKind::LParen) {
            return self.parse_call(name, span);
        }
        if self.eat(TokenKind::LBracket) {
            let index = self.parse_expr();
            self.expect(TokenKind::RBracket, "`]`");
            let base = resolve_named(&mut self.ctx, name, span);
            let base_ty = base.ty();
            self.last_was_effectful = false;
            return eval_index(&mut self.ctx, name, base_ty, index, span);
        }
        if self.eat(TokenKind::Dot) {
            let field = self.ident_name();
            let base = resolve_named(&mut self.ctx, name, span);
            let base_ty = base.ty();
            self.last_was_effectful = false;
            return eval_field(&mut self.ctx, name, base_ty, field, span);
        }
        self.last_was_effectful = false;
        resolve_named(&mut self.ctx, name, span)
    }

    fn parse_call(&mut self, name: Name, span: Span) -> DataObject<'a> {
        self.bump(); // `(`
        let mut args = Vec::new();
        if !self.at(TokenKind::RParen) {
            loop {
                args.push(self.parse_expr());
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "`)`");

        let Some(sym) = self.ctx.scopes.lookup(name) else {
            let spelling = self.ctx.names.resolve(name).to_string();
            self.ctx.error(ErrorCode::Undeclared, span, &[&spelling]);
            return DataObject::Error { ty: self.ctx.types.primitives.void };
        };
        if sym.kind != SymbolKind::Function {
            let spelling = self.ctx.names.resolve(name).to_string();
            self.ctx.error(ErrorCode::NotAFunction, span, &[&spelling]);
            return DataObject::Error { ty: self.ctx.types.primitives.void };
        }
        let return_ty = sym.ty;
        let formals: Vec<(Type<'a>, bool, bool)> =
            sym.function.as_ref().map(|info| info.args.iter().map(|a| (a.ty, a.by_ref, a.variadic)).collect()).unwrap_or_default();
        let result = eval_call(&mut self.ctx, name, return_ty, &formals, args, span);
        self.last_was_effectful = true;
        result
    }
}

fn primitive_for(width: LitWidth, signed: bool) -> Primitive {
    match (width, signed) {
        (LitWidth::Byte, true) => Primitive::SByte,
        (LitWidth::Byte, false) => Primitive::UByte,
        (LitWidth::Word, true) => Primitive::SWord,
        (LitWidth::Word, false) => Primitive::UWord,
        (LitWidth::Dword, true) => Primitive::SDword,
        (LitWidth::Dword, false) => Primitive::UDword,
        (LitWidth::Str, _) => Primitive::Str,
    }
}
