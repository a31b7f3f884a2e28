//! Expression lowering.

use crate::{
    ast::{BinaryOp, Expr, ExprKind, FunctionBody, FunctionLit, Position, TypeExpr, UnaryOp},
    events::EventKind,
    ssa::{
        builder::Builder, AliasType, Const, FuncId, MakeArgs, ObjectType, Op, Type, TypeKind,
        ValueId,
    },
    Result,
};

impl Builder<'_> {
    /// Builds an expression into the current block and returns its value.
    pub(crate) fn build_expr(&mut self, expr: &Expr) -> Result<ValueId> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Literal(literal) => self.constant(Const::from(literal), pos),
            ExprKind::Ident(name) => self.read_identifier(name, pos),
            ExprKind::Function(lit) => self.build_function(lit, pos),
            ExprKind::Call {
                callee,
                args,
                ellipsis,
                drop_error,
            } => self.build_call(callee, args, *ellipsis, *drop_error, pos),
            ExprKind::Index { object, keys } => self.build_index(object, keys, pos),
            ExprKind::Member { object, name } => {
                let object = self.build_expr(object)?;
                self.member(object, name, pos)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let x = self.build_expr(lhs)?;
                let y = self.build_expr(rhs)?;
                self.binary(*op, x, y, pos)
            }
            ExprKind::Unary { op, operand } => {
                let x = self.build_expr(operand)?;
                let ty = match op {
                    UnaryOp::Not => Type::boolean(),
                    UnaryOp::Recv => self
                        .value_type(x)
                        .as_chan()
                        .map_or_else(Type::any, |chan| chan.elem().clone()),
                    UnaryOp::Plus | UnaryOp::Neg | UnaryOp::BitNot => self.value_type(x),
                };
                self.emit_value(Op::UnOp { op: *op, x }, ty, pos)
            }
            ExprKind::Make { ty, args } => self.build_make(ty, args, pos),
            ExprKind::SliceLit { ty, elems } => self.build_slice(ty.as_ref(), elems, pos),
            ExprKind::MapLit { ty, entries } => self.build_map(ty.as_ref(), entries, pos),
            ExprKind::Cast { ty, value } => {
                let value = self.build_expr(value)?;
                self.emit_value(Op::TypeCast { value }, resolve_type(ty), pos)
            }
            ExprKind::Type(ty) => self.emit_value(Op::TypeValue, resolve_type(ty), pos),
            ExprKind::Recover => self.emit_value(Op::Recover, Type::any(), pos),
        }
    }

    /// Emits a binary operator and derives its type from the operands.
    pub(crate) fn binary(
        &mut self,
        op: BinaryOp,
        x: ValueId,
        y: ValueId,
        pos: Position,
    ) -> Result<ValueId> {
        let ty = if op.yields_boolean() {
            Type::boolean()
        } else if op == BinaryOp::Send {
            Type::null()
        } else {
            let (lhs, rhs) = (self.value_type(x), self.value_type(y));
            if lhs == rhs {
                lhs
            } else {
                if is_concrete(&lhs) && is_concrete(&rhs) {
                    self.events
                        .record(EventKind::Warning)
                        .function(self.function_name(self.current.func))
                        .block(self.current_block().index())
                        .message(format!("{pos}: `{op}` applied to {lhs} and {rhs}"));
                }
                lhs.unify(&rhs)
            }
        };
        self.emit_value(Op::BinOp { op, x, y }, ty, pos)
    }

    /// The type of `object[key]`, `any` if nothing is known.
    pub(crate) fn field_type(&self, object: ValueId, key: ValueId) -> Type {
        let object_ty = self.value_type(object);
        let Some(object) = object_ty.as_object() else {
            return Type::any();
        };
        match self.constant_key(key) {
            Some(key) => object.get_field(&key),
            None => object.field_type().cloned(),
        }
        .unwrap_or_else(Type::any)
    }

    fn constant_key(&self, key: ValueId) -> Option<String> {
        match self.graph.defining_instruction(key)?.op() {
            Op::Const(value) => Some(value.key_text()),
            _ => None,
        }
    }

    // ==================================================================================
    // Functions and calls
    // ==================================================================================

    /// Builds a function literal to completion and returns its value in the current
    /// function.
    ///
    /// A named literal binds its name in the enclosing function once it is built.
    /// Inside its own body the name is an ordinary identifier, so a recursive
    /// reference captures whatever the enclosing function bound to it before.
    fn build_function(&mut self, lit: &FunctionLit, pos: Position) -> Result<ValueId> {
        let parent = self.current.func;
        let child = self.enter_function(lit.name.as_deref(), pos)?;

        let body = self.build_function_body(child, lit, pos);
        let body = self.recover(body);
        let finished = self.leave_function();
        body?;
        finished?;

        let name = self.function_name(child);
        let value = self.graph.new_function_value(parent, child, &name)?;
        if let Some(name) = &lit.name {
            self.write_variable(name, value)?;
        }
        Ok(value)
    }

    fn build_function_body(&mut self, func: FuncId, lit: &FunctionLit, pos: Position) -> Result<()> {
        for (index, name) in lit.params.iter().enumerate() {
            let variadic = lit.variadic && index + 1 == lit.params.len();
            let ty = if variadic {
                Type::array(Type::any())
            } else {
                Type::any()
            };
            let param = self.graph.new_parameter(func, index, name, ty)?;
            self.write_variable(name, param)?;
        }
        self.graph.function_mut(func)?.set_variadic(lit.variadic);

        match &lit.body {
            FunctionBody::Block(stmts) => self.build_statements(stmts),
            FunctionBody::Expr(expr) => {
                let result = self.build_expr(expr)?;
                self.emit(
                    Op::Return {
                        results: vec![result],
                    },
                    Type::null(),
                    pos,
                )?;
                Ok(())
            }
        }
    }

    fn build_call(
        &mut self,
        callee: &Expr,
        args: &[Expr],
        ellipsis: bool,
        drop_error: bool,
        pos: Position,
    ) -> Result<ValueId> {
        let callee = self.build_expr(callee)?;
        let callee_ty = self.value_type(callee);
        if matches!(
            callee_ty.kind(),
            TypeKind::Number | TypeKind::String | TypeKind::Boolean | TypeKind::Null
        ) {
            return Err(malformed_error!(
                pos,
                "value of type {} is not callable",
                callee_ty
            ));
        }

        let args = args
            .iter()
            .map(|arg| self.build_expr(arg))
            .collect::<Result<Vec<_>>>()?;

        let mut ty = callee_ty
            .as_function()
            .map_or_else(Type::any, |function| function.return_type().clone());
        if drop_error {
            ty = without_error(ty);
        }

        self.emit_value(
            Op::Call {
                callee,
                args,
                ellipsis,
                drop_error,
            },
            ty,
            pos,
        )
    }

    // ==================================================================================
    // Member access
    // ==================================================================================

    fn build_index(&mut self, object: &Expr, keys: &[Expr], pos: Position) -> Result<ValueId> {
        if !(1..=3).contains(&keys.len()) {
            return Err(malformed_error!(
                pos,
                "subscript takes 1 to 3 keys, got {}",
                keys.len()
            ));
        }

        let object = self.build_expr(object)?;
        let keys = keys
            .iter()
            .map(|key| self.build_expr(key))
            .collect::<Result<Vec<_>>>()?;

        if let [key] = keys[..] {
            let ty = self.field_type(object, key);
            return self.emit_value(Op::Field { object, key }, ty, pos);
        }

        let args = MakeArgs::slice(
            object,
            keys.first().copied(),
            keys.get(1).copied(),
            keys.get(2).copied(),
        );
        let ty = self.value_type(object);
        self.emit_value(Op::Make(args), ty, pos)
    }

    fn member(&mut self, object: ValueId, name: &str, pos: Position) -> Result<ValueId> {
        let key = self.constant(Const::Str(name.to_string()), pos)?;
        let ty = match self.value_type(object).method(name) {
            Some(method) => method,
            None => self.field_type(object, key),
        };
        self.emit_value(Op::Field { object, key }, ty, pos)
    }

    // ==================================================================================
    // Composite values
    // ==================================================================================

    fn build_make(&mut self, ty: &TypeExpr, args: &[Expr], pos: Position) -> Result<ValueId> {
        let ty = resolve_type(ty);
        let limit = match ty.kind() {
            TypeKind::Array => 2,
            TypeKind::Map | TypeKind::Chan => 1,
            _ => return Err(malformed_error!(pos, "cannot make a value of type {}", ty)),
        };
        if args.len() > limit {
            return Err(malformed_error!(
                pos,
                "make({}) takes at most {} size arguments, got {}",
                ty,
                limit,
                args.len()
            ));
        }

        let sizes = args
            .iter()
            .map(|arg| self.build_expr(arg))
            .collect::<Result<Vec<_>>>()?;
        let args = MakeArgs::sized(sizes.first().copied(), sizes.get(1).copied());
        self.emit_value(Op::Make(args), ty, pos)
    }

    /// `[a, b, c]`: a make followed by one update per element.
    fn build_slice(&mut self, ty: Option<&TypeExpr>, elems: &[Expr], pos: Position) -> Result<ValueId> {
        let values = elems
            .iter()
            .map(|elem| self.build_expr(elem))
            .collect::<Result<Vec<_>>>()?;

        let ty = match ty {
            Some(ty) => resolve_type(ty),
            None => {
                let mut object = ObjectType::new();
                for (index, value) in values.iter().enumerate() {
                    object.add_field(index.to_string(), Type::number(), self.value_type(*value));
                }
                object.set_len(values.len());
                object.finish();
                Type::object(object)
            }
        };

        let len = self.constant(Const::Int(values.len() as i64), pos)?;
        let slice = self.emit_value(Op::Make(MakeArgs::sized(Some(len), None)), ty, pos)?;
        for (index, value) in values.into_iter().enumerate() {
            let key = self.constant(Const::Int(index as i64), pos)?;
            self.store(slice, key, value, pos)?;
        }
        Ok(slice)
    }

    /// `{k: v}`: a make followed by one update per entry, in source order.
    fn build_map(
        &mut self,
        ty: Option<&TypeExpr>,
        entries: &[(Expr, Expr)],
        pos: Position,
    ) -> Result<ValueId> {
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = self.build_expr(key)?;
            let value = self.build_expr(value)?;
            pairs.push((key, value));
        }

        let ty = match ty {
            Some(ty) => resolve_type(ty),
            None => {
                let mut object = ObjectType::new();
                for (index, (key, value)) in pairs.iter().enumerate() {
                    let text = self
                        .constant_key(*key)
                        .unwrap_or_else(|| index.to_string());
                    object.add_field(text, self.value_type(*key), self.value_type(*value));
                }
                object.finish();
                Type::object(object)
            }
        };

        let map = self.emit_value(Op::Make(MakeArgs::default()), ty, pos)?;
        for (key, value) in pairs {
            self.store(map, key, value, pos)?;
        }
        Ok(map)
    }

    fn store(&mut self, object: ValueId, key: ValueId, value: ValueId, pos: Position) -> Result<()> {
        let ty = self.field_type(object, key);
        let address = self.emit_value(Op::Field { object, key }, ty, pos)?;
        self.emit(Op::Update { address, value }, Type::null(), pos)?;
        Ok(())
    }
}

/// Maps a written type to a type descriptor. Unknown names become aliases of `any`.
fn resolve_type(ty: &TypeExpr) -> Type {
    match ty {
        TypeExpr::Named(name) => Type::from_name(name)
            .unwrap_or_else(|| Type::alias(AliasType::new(name.clone(), Type::any()))),
        TypeExpr::Slice(elem) => Type::array(resolve_type(elem)),
        TypeExpr::Map(key, value) => Type::map(resolve_type(key), resolve_type(value)),
        TypeExpr::Chan(elem) => Type::chan(resolve_type(elem)),
    }
}

/// The result type of a call with `~`: a trailing error is stripped.
fn without_error(ty: Type) -> Type {
    if ty.kind() == TypeKind::Error {
        return Type::null();
    }
    if let Some(object) = ty.as_object().filter(|object| object.is_combination()) {
        let mut elements = object.elements();
        if elements
            .last()
            .is_some_and(|last| last.kind() == TypeKind::Error)
        {
            elements.pop();
            return Type::combine(elements);
        }
    }
    ty
}

fn is_concrete(ty: &Type) -> bool {
    !matches!(
        ty.kind(),
        TypeKind::Any | TypeKind::Undefined | TypeKind::Null
    )
}
