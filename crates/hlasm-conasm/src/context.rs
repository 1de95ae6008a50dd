//! The conditional-assembly context manager.
//!
//! [`HlasmContext`] ties the pieces together: it owns the identifier table,
//! the global SET-symbol pool, the macro table, and the scope stack (open
//! code at the bottom, one scope per live macro expansion). Expression
//! trees are evaluated against it, variable reads are validated here, and
//! every user-level problem is reported through the caller's
//! [`DiagnosticSink`] — nothing in this module unwinds.
//!
//! Scoping follows the assembler: a macro scope sees its own locals, its
//! call's parameters, and the globals it declared with GBLx. It does not
//! see the caller's locals.

use std::collections::HashMap;
use std::sync::Arc;

use hlasm_lang_core::{Diagnostic, DiagnosticSink, Span};
use tracing::{debug, trace};

use crate::data::ParamData;
use crate::diags;
use crate::expr::arithmetic::parse_self_defining_term;
use crate::expr::ast::{AttrKind, Expr};
use crate::expr::character;
use crate::expr::eval::evaluate_tokens;
use crate::expr::keyword::OpCode;
use crate::expr::value::{Value, ValueKind};
use crate::ident::{Ident, IdentTable};
use crate::macro_def::{MacroArg, MacroDefinition, MacroInvocation};
use crate::param::SystemVariable;
use crate::set_symbol::{SetSymbol, SetSymbolKind, TypedValue};
use crate::variable::VariableSymbol;

/// Macro calls deeper than this are refused and unwound to open code.
pub const MACRO_NEST_LIMIT: usize = 100;

/// Default ACTR branch allowance per scope.
pub const DEFAULT_ACTR_LIMIT: u32 = 4096;

/// A SET symbol slot in a scope: owned locally, or an alias into the global
/// pool established by GBLx.
#[derive(Debug)]
enum ScopeVariable {
    Owned(SetSymbol),
    Global(Ident),
}

/// One level of the scope stack.
#[derive(Debug)]
struct CodeScope {
    variables: HashMap<Ident, ScopeVariable>,
    invocation: Option<MacroInvocation>,
    branch_counter: u32,
}

impl CodeScope {
    fn new(invocation: Option<MacroInvocation>) -> Self {
        Self {
            variables: HashMap::new(),
            invocation,
            branch_counter: DEFAULT_ACTR_LIMIT,
        }
    }
}

/// The conditional-assembly runtime state for one analysis run.
pub struct HlasmContext {
    idents: IdentTable,
    globals: HashMap<Ident, SetSymbol>,
    macros: HashMap<Ident, Arc<MacroDefinition>>,
    scopes: Vec<CodeScope>,
    syslist_id: Ident,
    sysmac_id: Ident,
}

impl HlasmContext {
    pub fn new() -> Self {
        let mut idents = IdentTable::new();
        let syslist_id = idents.intern("SYSLIST");
        let sysmac_id = idents.intern("SYSMAC");
        Self {
            idents,
            globals: HashMap::new(),
            macros: HashMap::new(),
            scopes: vec![CodeScope::new(None)],
            syslist_id,
            sysmac_id,
        }
    }

    pub fn idents(&self) -> &IdentTable {
        &self.idents
    }

    /// Intern a name in this context's identifier table.
    pub fn intern(&mut self, name: &str) -> Ident {
        self.idents.intern(name)
    }

    // -----------------------------------------------------------------------
    //  Macro table and call stack
    // -----------------------------------------------------------------------

    /// Register a macro definition. A redefinition replaces the previous
    /// one for subsequent calls; live invocations keep their own `Arc`.
    pub fn add_macro(&mut self, definition: Arc<MacroDefinition>) {
        self.macros.insert(definition.id(), definition);
    }

    pub fn get_macro(&self, name: Ident) -> Option<Arc<MacroDefinition>> {
        self.macros.get(&name).cloned()
    }

    /// Current macro nesting depth; 0 in open code.
    pub fn nesting_depth(&self) -> usize {
        self.scopes.len() - 1
    }

    /// Bind a call and push its scope. Refuses the call with M011 when the
    /// nesting limit is reached, leaving the current scope in place.
    pub fn enter_macro(
        &mut self,
        definition: &Arc<MacroDefinition>,
        label: Option<Arc<ParamData>>,
        args: Vec<MacroArg>,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        let name = self.idents.resolve(definition.id());
        if self.nesting_depth() >= MACRO_NEST_LIMIT {
            sink.report(diags::nest_limit_exceeded(name, MACRO_NEST_LIMIT, span));
            return false;
        }
        debug!(macro_name = name, depth = self.nesting_depth() + 1, "entering macro");

        let mut invocation = definition.call(label, args, self.syslist_id, &self.idents, sink);

        // SYSMAC: the macro being entered, its callers innermost first,
        // then open code.
        let mut names = vec![self.idents.resolve(definition.id()).to_string()];
        for scope in self.scopes.iter().rev() {
            if let Some(inv) = &scope.invocation {
                names.push(self.idents.resolve(inv.id()).to_string());
            }
        }
        names.push("OPEN CODE".to_string());
        invocation.bind_system_variable(SystemVariable::sysmac(self.sysmac_id, names));

        self.scopes.push(CodeScope::new(Some(invocation)));
        true
    }

    /// Pop the current macro scope. Returns `false` in open code.
    pub fn leave_macro(&mut self) -> bool {
        if self.scopes.len() > 1 {
            self.scopes.pop();
            debug!(depth = self.nesting_depth(), "left macro");
            true
        } else {
            false
        }
    }

    pub fn current_macro(&self) -> Option<&MacroInvocation> {
        self.scopes.last().and_then(|s| s.invocation.as_ref())
    }

    pub fn current_macro_mut(&mut self) -> Option<&mut MacroInvocation> {
        self.scopes.last_mut().and_then(|s| s.invocation.as_mut())
    }

    /// ACTR: set the current scope's branch allowance.
    pub fn set_branch_counter(&mut self, value: u32) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.branch_counter = value;
        }
    }

    /// Spend one conditional-assembly branch (taken AIF/AGO). Exhaustion is
    /// fatal for the processing unit: M012 is reported and the macro stack
    /// is abandoned back to open code.
    pub fn step_branch(&mut self, span: Span, sink: &mut dyn DiagnosticSink) -> bool {
        let scope = match self.scopes.last_mut() {
            Some(s) => s,
            None => diags::internal_error("scope stack is empty"),
        };
        if scope.branch_counter == 0 {
            sink.report(diags::actr_exhausted(span));
            self.scopes.truncate(1);
            return false;
        }
        scope.branch_counter -= 1;
        true
    }

    // -----------------------------------------------------------------------
    //  SET symbol declaration and lookup
    // -----------------------------------------------------------------------

    /// LCLA/LCLB/LCLC. Re-declaring the same shape is a no-op; a conflicting
    /// shape or a name already bound to a parameter is E051.
    pub fn declare_local(
        &mut self,
        kind: SetSymbolKind,
        name: Ident,
        is_scalar: bool,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        let display = self.idents.resolve(name).to_string();
        let scope = match self.scopes.last_mut() {
            Some(s) => s,
            None => diags::internal_error("scope stack is empty"),
        };
        if let Some(inv) = &scope.invocation {
            if inv.get_param(name).is_some() {
                sink.report(diags::conflicting_declaration(&display, span));
                return false;
            }
        }
        match scope.variables.get(&name) {
            Some(ScopeVariable::Owned(existing))
                if existing.kind() == kind && existing.is_scalar() == is_scalar =>
            {
                true
            }
            Some(_) => {
                sink.report(diags::conflicting_declaration(&display, span));
                false
            }
            None => {
                scope
                    .variables
                    .insert(name, ScopeVariable::Owned(SetSymbol::new(kind, name, is_scalar, false)));
                true
            }
        }
    }

    /// GBLA/GBLB/GBLC. Creates the pool entry on first declaration and an
    /// alias in the current scope; conflicting shapes are E051.
    pub fn declare_global(
        &mut self,
        kind: SetSymbolKind,
        name: Ident,
        is_scalar: bool,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        let display = self.idents.resolve(name).to_string();
        match self.globals.get(&name) {
            Some(existing) if existing.kind() != kind || existing.is_scalar() != is_scalar => {
                sink.report(diags::conflicting_declaration(&display, span));
                return false;
            }
            Some(_) => {}
            None => {
                self.globals
                    .insert(name, SetSymbol::new(kind, name, is_scalar, true));
            }
        }
        let scope = match self.scopes.last_mut() {
            Some(s) => s,
            None => diags::internal_error("scope stack is empty"),
        };
        match scope.variables.get(&name) {
            Some(ScopeVariable::Owned(_)) => {
                sink.report(diags::conflicting_declaration(&display, span));
                false
            }
            _ => {
                scope.variables.insert(name, ScopeVariable::Global(name));
                true
            }
        }
    }

    /// Resolve a name in the current scope: locals and global aliases
    /// first, then the enclosing call's parameters.
    pub fn find_var(&self, name: Ident) -> Option<VariableSymbol<'_>> {
        let scope = self.scopes.last()?;
        match scope.variables.get(&name) {
            Some(ScopeVariable::Owned(sym)) => return Some(VariableSymbol::Set(sym)),
            Some(ScopeVariable::Global(alias)) => {
                return self.globals.get(alias).map(VariableSymbol::Set)
            }
            None => {}
        }
        scope
            .invocation
            .as_ref()
            .and_then(|inv| inv.get_param(name))
            .map(VariableSymbol::Param)
    }

    fn find_set_mut(&mut self, name: Ident) -> Option<&mut SetSymbol> {
        let alias = {
            let scope = self.scopes.last()?;
            match scope.variables.get(&name) {
                Some(ScopeVariable::Global(alias)) => Some(*alias),
                Some(ScopeVariable::Owned(_)) => None,
                None => return None,
            }
        };
        match alias {
            Some(alias) => self.globals.get_mut(&alias),
            None => match self.scopes.last_mut()?.variables.get_mut(&name) {
                Some(ScopeVariable::Owned(sym)) => Some(sym),
                _ => None,
            },
        }
    }

    // -----------------------------------------------------------------------
    //  Reads, writes, conversions
    // -----------------------------------------------------------------------

    /// Read a variable symbol with subscript validation
    /// (`test_symbol_for_read`). Violations are reported and a default
    /// value is returned.
    pub fn get_var_sym_value(
        &self,
        name: &str,
        subscript: &[i32],
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> TypedValue {
        let resolved = self.idents.get(name).and_then(|id| self.find_var(id));
        let Some(var) = resolved else {
            sink.report(diags::undefined_variable_symbol(name, span));
            return TypedValue::Character(String::new());
        };
        self.read_var(var, subscript, name, span, sink)
    }

    fn read_var(
        &self,
        var: VariableSymbol<'_>,
        subscript: &[i32],
        name: &str,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> TypedValue {
        match var {
            VariableSymbol::Set(sym) => {
                let arity_ok = if sym.is_scalar() {
                    subscript.is_empty()
                } else {
                    subscript.len() == 1
                };
                if !arity_ok {
                    sink.report(diags::inconsistent_subscript(name, span));
                    return TypedValue::default_of(sym.kind());
                }
                if sym.is_scalar() {
                    sym.get_value(0)
                } else {
                    let index = subscript[0];
                    if index < 1 {
                        sink.report(diags::subscript_below_one(name, span));
                        return TypedValue::default_of(sym.kind());
                    }
                    sym.get_value(index as usize)
                }
            }
            VariableSymbol::Param(param) => {
                if !param.can_read(subscript, name, span, sink) {
                    return TypedValue::Character(String::new());
                }
                let offset: Vec<usize> = subscript.iter().map(|&v| v as usize).collect();
                TypedValue::Character(param.get_value(&offset).to_string())
            }
        }
    }

    /// SETA/SETB/SETC write path. `kind` is the statement's type; the value
    /// is converted to it first. Writes to macro parameters are E030, shape
    /// mismatches E051/E052/E055; a failed conversion skips the write.
    pub fn set_var_sym_value(
        &mut self,
        name: &str,
        kind: SetSymbolKind,
        subscript: &[i32],
        value: TypedValue,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> bool {
        let id = self.intern(name);

        // Parameters and system variables are read-only.
        let param_bound = self
            .scopes
            .last()
            .and_then(|s| s.invocation.as_ref())
            .is_some_and(|inv| inv.get_param(id).is_some());
        let locally_declared = self
            .scopes
            .last()
            .is_some_and(|s| s.variables.contains_key(&id));
        if param_bound && !locally_declared {
            sink.report(diags::read_only_symbol(name, span));
            return false;
        }

        // A SETx to an undeclared name implicitly declares a local; the
        // subscript decides scalar versus array.
        if self.find_var(id).is_none()
            && !self.declare_local(kind, id, subscript.is_empty(), span, sink)
        {
            return false;
        }

        let declared_kind = match self.find_var(id).and_then(|v| v.set_kind()) {
            Some(k) => k,
            None => {
                sink.report(diags::read_only_symbol(name, span));
                return false;
            }
        };
        if declared_kind != kind {
            sink.report(diags::conflicting_declaration(name, span));
            return false;
        }

        let converted = match Self::try_convert(value, kind, span) {
            Ok(v) => v,
            Err(diag) => {
                sink.report(diag);
                return false;
            }
        };

        let sym = match self.find_set_mut(id) {
            Some(s) => s,
            None => diags::internal_error("declared SET symbol vanished"),
        };

        // Scalars collapse every index to 0; arrays need exactly one
        // subscript of at least 1.
        let index = if sym.is_scalar() {
            0
        } else if subscript.len() != 1 {
            sink.report(diags::inconsistent_subscript(name, span));
            return false;
        } else if subscript[0] < 1 {
            sink.report(diags::subscript_below_one(name, span));
            return false;
        } else {
            subscript[0] as usize
        };

        match (sym, converted) {
            (SetSymbol::Arithmetic(base), TypedValue::Arithmetic(v)) => base.set_value(v, index),
            (SetSymbol::Boolean(base), TypedValue::Boolean(v)) => base.set_value(v, index),
            (SetSymbol::Character(base), TypedValue::Character(v)) => base.set_value(v, index),
            _ => diags::internal_error("conversion produced a mismatched SET type"),
        }
        true
    }

    /// Convert between the SET types, reporting failures and returning the
    /// target's default in their place.
    pub fn convert(
        &self,
        value: TypedValue,
        target: SetSymbolKind,
        span: Span,
        sink: &mut dyn DiagnosticSink,
    ) -> TypedValue {
        match Self::try_convert(value, target, span) {
            Ok(v) => v,
            Err(diag) => {
                sink.report(diag);
                TypedValue::default_of(target)
            }
        }
    }

    fn try_convert(
        value: TypedValue,
        target: SetSymbolKind,
        span: Span,
    ) -> Result<TypedValue, Diagnostic> {
        use SetSymbolKind as K;
        use TypedValue as V;
        Ok(match (value, target) {
            (v @ V::Arithmetic(_), K::Arithmetic)
            | (v @ V::Boolean(_), K::Boolean)
            | (v @ V::Character(_), K::Character) => v,

            // The sign is dropped: A→C stringifies the magnitude.
            (V::Arithmetic(v), K::Character) => V::Character((v as i64).abs().to_string()),
            (V::Boolean(b), K::Character) => V::Character(if b { "1" } else { "0" }.to_string()),

            (V::Arithmetic(v), K::Boolean) => V::Boolean(v != 0),
            (V::Boolean(b), K::Arithmetic) => V::Arithmetic(i32::from(b)),

            (V::Character(s), K::Arithmetic) => {
                let t = s.trim();
                if t.is_empty() {
                    // A null character value counts as zero.
                    V::Arithmetic(0)
                } else {
                    match t.parse::<i32>() {
                        Ok(v) => V::Arithmetic(v),
                        Err(_) => return Err(diags::invalid_arithmetic_conversion(&s, span)),
                    }
                }
            }
            (V::Character(s), K::Boolean) => match s.trim() {
                "0" => V::Boolean(false),
                "1" => V::Boolean(true),
                _ => return Err(diags::invalid_logic_operand(&s, span)),
            },
        })
    }

    // -----------------------------------------------------------------------
    //  Expression evaluation
    // -----------------------------------------------------------------------

    /// Evaluate an expression tree. The poison diagnostic, if any, is
    /// re-ranged to the call site, reported to `sink`, and also returned so
    /// the statement layer can react.
    pub fn evaluate_expression(
        &self,
        expr: &Expr,
        sink: &mut dyn DiagnosticSink,
    ) -> (TypedValue, Option<Diagnostic>) {
        let value = self.eval_expr(expr);
        let diag = value
            .diag
            .clone()
            .map(|d| d.ranged_at(expr.span()));
        if let Some(d) = &diag {
            trace!(code = %d.code, "expression poisoned");
            sink.report(d.clone());
        }
        let typed = match value.kind {
            ValueKind::Arithmetic(v) => TypedValue::Arithmetic(v),
            ValueKind::Logic(b) => TypedValue::Boolean(b),
            ValueKind::Character(s) => TypedValue::Character(s),
            ValueKind::Keyword(_) => diags::internal_error("keyword escaped the evaluator"),
        };
        (typed, diag)
    }

    /// Evaluate a subtree to a single poisonable value.
    fn eval_expr(&self, expr: &Expr) -> Value {
        match expr {
            Expr::List { items, span } => {
                let tokens = items.iter().map(|item| self.eval_atom(item)).collect();
                evaluate_tokens(tokens, *span)
            }
            other => evaluate_tokens(vec![self.eval_atom(other)], other.span()),
        }
    }

    /// Turn one tree node into a queue token.
    fn eval_atom(&self, expr: &Expr) -> Value {
        match expr {
            Expr::Term { text, .. } => {
                if let Some(op) = OpCode::from_str(text) {
                    Value::keyword(op)
                } else if let Some(v) = parse_self_defining_term(text) {
                    Value::arithmetic(v)
                } else {
                    Value::character(text.clone())
                }
            }
            Expr::Str { text, .. } => Value::character(text.clone()),
            Expr::Var {
                name,
                subscript,
                span,
            } => self.var_atom(name, subscript, *span),
            Expr::Attr {
                kind,
                name,
                subscript,
                span,
            } => self.attr_atom(*kind, name, subscript, *span),
            Expr::List { .. } => self.eval_expr(expr),
            Expr::Substring {
                dup,
                base,
                start,
                len,
                span,
            } => self.substring_atom(dup.as_deref(), base, start.as_deref(), len.as_deref(), *span),
        }
    }

    /// Evaluate one subscript element to its numeric value.
    fn eval_subscript(&self, expr: &Expr) -> Result<i32, Diagnostic> {
        let value = self.eval_expr(expr);
        if let Some(diag) = value.diag.as_deref() {
            return Err(diag.clone());
        }
        value.get_numeric(expr.span())
    }

    fn var_atom(&self, name: &str, subscript: &[Expr], span: Span) -> Value {
        let resolved = self.idents.get(name).and_then(|id| self.find_var(id));
        let Some(var) = resolved else {
            return Value::poisoned(diags::undefined_variable_symbol(name, span));
        };
        let mut values = Vec::with_capacity(subscript.len());
        for sub in subscript {
            match self.eval_subscript(sub) {
                Ok(v) => values.push(v),
                Err(diag) => return Value::poisoned(diag),
            }
        }
        // Reads inside an expression poison instead of reporting directly.
        let mut local: Vec<Diagnostic> = Vec::new();
        let typed = self.read_var(var, &values, name, span, &mut local);
        match local.into_iter().next() {
            Some(diag) => Value::poisoned(diag),
            None => Value::from_typed(typed),
        }
    }

    fn attr_atom(&self, kind: AttrKind, name: &str, subscript: &[Expr], span: Span) -> Value {
        let resolved = self.idents.get(name).and_then(|id| self.find_var(id));
        let Some(var) = resolved else {
            return Value::poisoned(diags::undefined_variable_symbol(name, span));
        };
        let mut offset = Vec::with_capacity(subscript.len());
        for sub in subscript {
            match self.eval_subscript(sub) {
                Ok(v) if v >= 0 => offset.push(v as usize),
                Ok(_) => return Value::poisoned(diags::subscript_below_one(name, span)),
                Err(diag) => return Value::poisoned(diag),
            }
        }
        match kind {
            AttrKind::Number => Value::arithmetic(var.number(&offset) as i32),
            AttrKind::Count => Value::arithmetic(var.count(&offset) as i32),
            AttrKind::Type => Value::character(var.type_attr(&offset).to_string()),
        }
    }

    fn substring_atom(
        &self,
        dup: Option<&Expr>,
        base: &Expr,
        start: Option<&Expr>,
        len: Option<&Expr>,
        span: Span,
    ) -> Value {
        let base_value = self.eval_expr(base);
        if let Some(diag) = &base_value.diag {
            return Value {
                kind: base_value.kind.clone(),
                diag: Some(diag.clone()),
            };
        }
        let text = match base_value.get_text(base.span()) {
            Ok(t) => t,
            Err(diag) => return Value::poisoned(diag),
        };

        let dup_factor = match dup {
            Some(e) => match self.eval_subscript(e) {
                Ok(v) => v,
                Err(diag) => return Value::poisoned(diag),
            },
            None => 1,
        };
        let start_value = match start {
            Some(e) => match self.eval_subscript(e) {
                Ok(v) => Some(v),
                Err(diag) => return Value::poisoned(diag),
            },
            None => None,
        };
        let len_value = match len {
            Some(e) => match self.eval_subscript(e) {
                Ok(v) => Some(v),
                Err(diag) => return Value::poisoned(diag),
            },
            None => None,
        };

        match character::substring(&text, dup_factor, start_value, len_value, span) {
            Ok(s) => Value::character(s),
            Err(diag) => Value::poisoned(diag),
        }
    }
}

impl Default for HlasmContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macro_def::{CachedStatement, FormalArg};
    use hlasm_lang_core::Location;

    fn span() -> Span {
        Span::dummy()
    }

    fn single(s: &str) -> Arc<ParamData> {
        Arc::new(ParamData::single(s))
    }

    fn term(t: &str) -> Expr {
        Expr::term(t, span())
    }

    fn simple_macro(ctx: &mut HlasmContext, name: &str) -> Arc<MacroDefinition> {
        let id = ctx.intern(name);
        let op1 = ctx.intern("OP1");
        Arc::new(
            MacroDefinition::new(
                id,
                None,
                vec![FormalArg::positional(op1)],
                vec![Arc::new(CachedStatement {
                    source: "         MEND".into(),
                    span: span(),
                })],
                HashMap::new(),
                Vec::new(),
                Location::new("SYSLIB(MAC)", 1, 1),
                ctx.idents(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_declare_and_read_scalar() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let a = ctx.intern("A");
        assert!(ctx.declare_local(SetSymbolKind::Arithmetic, a, true, span(), &mut sink));
        assert_eq!(
            ctx.get_var_sym_value("A", &[], span(), &mut sink),
            TypedValue::Arithmetic(0)
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_set_and_get_round_trip() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        assert!(ctx.set_var_sym_value(
            "A",
            SetSymbolKind::Arithmetic,
            &[],
            TypedValue::Arithmetic(42),
            span(),
            &mut sink,
        ));
        assert_eq!(
            ctx.get_var_sym_value("A", &[], span(), &mut sink),
            TypedValue::Arithmetic(42)
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_implicit_declaration_shape_follows_subscript() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        ctx.set_var_sym_value(
            "ARR",
            SetSymbolKind::Character,
            &[5],
            TypedValue::Character("x".into()),
            span(),
            &mut sink,
        );
        assert!(sink.is_empty());
        // Defined as an array: an unsubscripted read is inconsistent.
        ctx.get_var_sym_value("ARR", &[], span(), &mut sink);
        assert_eq!(sink[0].code, "E052");
        sink.clear();
        assert_eq!(
            ctx.get_var_sym_value("ARR", &[5], span(), &mut sink),
            TypedValue::Character("x".into())
        );
    }

    #[test]
    fn test_unknown_name_is_e032() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let v = ctx.get_var_sym_value("NOPE", &[], span(), &mut sink);
        assert_eq!(v, TypedValue::Character(String::new()));
        assert_eq!(sink[0].code, "E032");
    }

    #[test]
    fn test_undefined_array_index_reads_default_silently() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let a = ctx.intern("A");
        ctx.declare_local(SetSymbolKind::Arithmetic, a, false, span(), &mut sink);
        assert_eq!(
            ctx.get_var_sym_value("A", &[100], span(), &mut sink),
            TypedValue::Arithmetic(0)
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_array_subscript_below_one_is_e055() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let a = ctx.intern("A");
        ctx.declare_local(SetSymbolKind::Arithmetic, a, false, span(), &mut sink);
        ctx.get_var_sym_value("A", &[0], span(), &mut sink);
        assert_eq!(sink[0].code, "E055");
    }

    #[test]
    fn test_scalar_with_subscript_is_e052() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let a = ctx.intern("A");
        ctx.declare_local(SetSymbolKind::Arithmetic, a, true, span(), &mut sink);
        ctx.get_var_sym_value("A", &[1], span(), &mut sink);
        assert_eq!(sink[0].code, "E052");
    }

    #[test]
    fn test_conflicting_redeclaration_is_e051() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let a = ctx.intern("A");
        assert!(ctx.declare_local(SetSymbolKind::Arithmetic, a, true, span(), &mut sink));
        assert!(ctx.declare_local(SetSymbolKind::Arithmetic, a, true, span(), &mut sink));
        assert!(!ctx.declare_local(SetSymbolKind::Character, a, true, span(), &mut sink));
        assert_eq!(sink[0].code, "E051");
    }

    #[test]
    fn test_globals_are_shared_across_scopes() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let g = ctx.intern("G");
        ctx.declare_global(SetSymbolKind::Arithmetic, g, true, span(), &mut sink);
        ctx.set_var_sym_value(
            "G",
            SetSymbolKind::Arithmetic,
            &[],
            TypedValue::Arithmetic(7),
            span(),
            &mut sink,
        );

        let def = simple_macro(&mut ctx, "MAC");
        assert!(ctx.enter_macro(&def, None, Vec::new(), span(), &mut sink));
        // Invisible until declared in this scope.
        ctx.get_var_sym_value("G", &[], span(), &mut sink);
        assert_eq!(sink.pop().unwrap().code, "E032");
        ctx.declare_global(SetSymbolKind::Arithmetic, g, true, span(), &mut sink);
        assert_eq!(
            ctx.get_var_sym_value("G", &[], span(), &mut sink),
            TypedValue::Arithmetic(7)
        );
        assert!(sink.is_empty());
        ctx.leave_macro();
    }

    #[test]
    fn test_macro_scope_sees_params_not_caller_locals() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        ctx.set_var_sym_value(
            "LOCAL",
            SetSymbolKind::Arithmetic,
            &[],
            TypedValue::Arithmetic(1),
            span(),
            &mut sink,
        );

        let def = simple_macro(&mut ctx, "MAC");
        ctx.enter_macro(
            &def,
            None,
            vec![MacroArg::positional(single("ada"))],
            span(),
            &mut sink,
        );

        assert_eq!(
            ctx.get_var_sym_value("OP1", &[], span(), &mut sink),
            TypedValue::Character("ada".into())
        );
        assert_eq!(
            ctx.get_var_sym_value("SYSLIST", &[1], span(), &mut sink),
            TypedValue::Character("ada".into())
        );
        // SYSLIST(0) selects the (omitted) label slot without complaint.
        assert_eq!(
            ctx.get_var_sym_value("SYSLIST", &[0], span(), &mut sink),
            TypedValue::Character(String::new())
        );
        assert!(sink.is_empty());

        // The caller's local is invisible here.
        ctx.get_var_sym_value("LOCAL", &[], span(), &mut sink);
        assert_eq!(sink.pop().unwrap().code, "E032");
        ctx.leave_macro();
        assert_eq!(
            ctx.get_var_sym_value("LOCAL", &[], span(), &mut sink),
            TypedValue::Arithmetic(1)
        );
    }

    #[test]
    fn test_param_subscript_zero_is_e055() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let def = simple_macro(&mut ctx, "MAC");
        ctx.enter_macro(
            &def,
            None,
            vec![MacroArg::positional(single("ada"))],
            span(),
            &mut sink,
        );
        ctx.get_var_sym_value("OP1", &[0], span(), &mut sink);
        assert_eq!(sink[0].code, "E055");
        sink.clear();
        // An out-of-range parameter subscript reads empty, silently.
        assert_eq!(
            ctx.get_var_sym_value("OP1", &[4], span(), &mut sink),
            TypedValue::Character(String::new())
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_params_are_read_only() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let def = simple_macro(&mut ctx, "MAC");
        ctx.enter_macro(&def, None, Vec::new(), span(), &mut sink);
        assert!(!ctx.set_var_sym_value(
            "OP1",
            SetSymbolKind::Character,
            &[],
            TypedValue::Character("x".into()),
            span(),
            &mut sink,
        ));
        assert_eq!(sink[0].code, "E030");
    }

    #[test]
    fn test_sysmac_reports_nesting() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let outer = simple_macro(&mut ctx, "OUTER");
        let inner = simple_macro(&mut ctx, "INNER");
        ctx.enter_macro(&outer, None, Vec::new(), span(), &mut sink);
        ctx.enter_macro(&inner, None, Vec::new(), span(), &mut sink);

        assert_eq!(
            ctx.get_var_sym_value("SYSMAC", &[], span(), &mut sink),
            TypedValue::Character("INNER".into())
        );
        assert_eq!(
            ctx.get_var_sym_value("SYSMAC", &[1], span(), &mut sink),
            TypedValue::Character("OUTER".into())
        );
        assert_eq!(
            ctx.get_var_sym_value("SYSMAC", &[2], span(), &mut sink),
            TypedValue::Character("OPEN CODE".into())
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_nest_limit_refuses_call() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let def = simple_macro(&mut ctx, "MAC");
        for _ in 0..MACRO_NEST_LIMIT {
            assert!(ctx.enter_macro(&def, None, Vec::new(), span(), &mut sink));
        }
        assert!(!ctx.enter_macro(&def, None, Vec::new(), span(), &mut sink));
        assert_eq!(sink[0].code, "M011");
        assert_eq!(ctx.nesting_depth(), MACRO_NEST_LIMIT);
    }

    #[test]
    fn test_actr_exhaustion_abandons_the_macro_stack() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let def = simple_macro(&mut ctx, "MAC");
        ctx.enter_macro(&def, None, Vec::new(), span(), &mut sink);
        ctx.set_branch_counter(2);
        assert!(ctx.step_branch(span(), &mut sink));
        assert!(ctx.step_branch(span(), &mut sink));
        assert!(!ctx.step_branch(span(), &mut sink));
        assert_eq!(sink[0].code, "M012");
        assert_eq!(ctx.nesting_depth(), 0);
    }

    #[test]
    fn test_convert_a_to_c_drops_the_sign() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        assert_eq!(
            ctx.convert(TypedValue::Arithmetic(-17), SetSymbolKind::Character, span(), &mut sink),
            TypedValue::Character("17".into())
        );
        assert_eq!(
            ctx.convert(TypedValue::Arithmetic(i32::MIN), SetSymbolKind::Character, span(), &mut sink),
            TypedValue::Character("2147483648".into())
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn test_convert_other_directions() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        assert_eq!(
            ctx.convert(TypedValue::Boolean(true), SetSymbolKind::Character, span(), &mut sink),
            TypedValue::Character("1".into())
        );
        assert_eq!(
            ctx.convert(
                TypedValue::Character("-42".into()),
                SetSymbolKind::Arithmetic,
                span(),
                &mut sink,
            ),
            TypedValue::Arithmetic(-42)
        );
        assert_eq!(
            ctx.convert(
                TypedValue::Character(String::new()),
                SetSymbolKind::Arithmetic,
                span(),
                &mut sink,
            ),
            TypedValue::Arithmetic(0)
        );
        assert_eq!(
            ctx.convert(TypedValue::Arithmetic(9), SetSymbolKind::Boolean, span(), &mut sink),
            TypedValue::Boolean(true)
        );
        assert_eq!(
            ctx.convert(TypedValue::Boolean(true), SetSymbolKind::Arithmetic, span(), &mut sink),
            TypedValue::Arithmetic(1)
        );
        assert!(sink.is_empty());

        let v = ctx.convert(
            TypedValue::Character("12x".into()),
            SetSymbolKind::Arithmetic,
            span(),
            &mut sink,
        );
        assert_eq!(v, TypedValue::Arithmetic(0));
        assert_eq!(sink.pop().unwrap().code, "A010");

        let v = ctx.convert(
            TypedValue::Character("2".into()),
            SetSymbolKind::Boolean,
            span(),
            &mut sink,
        );
        assert_eq!(v, TypedValue::Boolean(false));
        assert_eq!(sink.pop().unwrap().code, "EL01");
    }

    #[test]
    fn test_evaluate_simple_arithmetic() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let expr = Expr::list(
            vec![term("5"), term("+"), term("3"), term("*"), term("2")],
            span(),
        );
        let (value, diag) = ctx.evaluate_expression(&expr, &mut sink);
        assert_eq!(value, TypedValue::Arithmetic(11));
        assert!(diag.is_none());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_evaluate_with_variable_reference() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        ctx.set_var_sym_value(
            "N",
            SetSymbolKind::Arithmetic,
            &[],
            TypedValue::Arithmetic(10),
            span(),
            &mut sink,
        );
        let expr = Expr::list(
            vec![
                Expr::var("N", Vec::new(), span()),
                term("*"),
                term("2"),
            ],
            span(),
        );
        let (value, _) = ctx.evaluate_expression(&expr, &mut sink);
        assert_eq!(value, TypedValue::Arithmetic(20));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_evaluate_subscripted_variable() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        ctx.set_var_sym_value(
            "ARR",
            SetSymbolKind::Arithmetic,
            &[3],
            TypedValue::Arithmetic(9),
            span(),
            &mut sink,
        );
        // &ARR(1+2)
        let subscript = Expr::list(vec![term("1"), term("+"), term("2")], span());
        let expr = Expr::var("ARR", vec![subscript], span());
        let (value, _) = ctx.evaluate_expression(&expr, &mut sink);
        assert_eq!(value, TypedValue::Arithmetic(9));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_evaluate_undefined_variable_poisons_and_reports() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let expr = Expr::list(
            vec![Expr::var("GHOST", Vec::new(), span()), term("+"), term("1")],
            span(),
        );
        let (value, diag) = ctx.evaluate_expression(&expr, &mut sink);
        assert_eq!(value, TypedValue::Arithmetic(0));
        assert_eq!(diag.unwrap().code, "E032");
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_evaluate_attr_references() {
        let mut ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        ctx.set_var_sym_value(
            "A",
            SetSymbolKind::Arithmetic,
            &[],
            TypedValue::Arithmetic(100),
            span(),
            &mut sink,
        );
        let (value, _) = ctx.evaluate_expression(
            &Expr::attr(AttrKind::Count, "A", Vec::new(), span()),
            &mut sink,
        );
        assert_eq!(value, TypedValue::Arithmetic(3));

        let (value, _) = ctx.evaluate_expression(
            &Expr::attr(AttrKind::Type, "A", Vec::new(), span()),
            &mut sink,
        );
        assert_eq!(value, TypedValue::Character("N".into()));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_evaluate_substring_with_duplication() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let expr = Expr::Substring {
            dup: Some(Box::new(term("2"))),
            base: Box::new(Expr::string("abcdef", span())),
            start: Some(Box::new(term("2"))),
            len: Some(Box::new(term("3"))),
            span: span(),
        };
        let (value, diag) = ctx.evaluate_expression(&expr, &mut sink);
        assert_eq!(value, TypedValue::Character("bcdbcd".into()));
        assert!(diag.is_none());
    }

    #[test]
    fn test_evaluate_substring_negative_len_errors_under_zero_dup() {
        let ctx = HlasmContext::new();
        let mut sink: Vec<Diagnostic> = Vec::new();
        let expr = Expr::Substring {
            dup: Some(Box::new(term("0"))),
            base: Box::new(Expr::string("abc", span())),
            start: Some(Box::new(term("1"))),
            len: Some(Box::new(Expr::list(
                vec![term("-"), term("1")],
                span(),
            ))),
            span: span(),
        };
        let (_, diag) = ctx.evaluate_expression(&expr, &mut sink);
        assert_eq!(diag.unwrap().code, "EC05");
    }
}
