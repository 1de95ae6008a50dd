//! Tagged expression values and the poison channel.
//!
//! A [`Value`] is one of four kinds plus an optional attached diagnostic.
//! A value carrying a diagnostic is "poisoned": every operator consuming it
//! must copy that diagnostic onto its result and skip the computation, so a
//! single user error surfaces once and evaluation of the statement carries
//! on with well-typed stand-ins. When both operands of an operator are
//! poisoned, the first operand's diagnostic wins.

use hlasm_lang_core::{Diagnostic, Span};

use super::arithmetic::parse_self_defining_term;
use super::keyword::OpCode;
use crate::diags;
use crate::set_symbol::TypedValue;

/// The kind of an expression value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Arithmetic(i32),
    Logic(bool),
    Character(String),
    /// An operator sitting in the token queue.
    Keyword(OpCode),
}

/// An expression value with its optional poison diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub kind: ValueKind,
    pub diag: Option<Box<Diagnostic>>,
}

impl Value {
    pub fn arithmetic(v: i32) -> Self {
        Self {
            kind: ValueKind::Arithmetic(v),
            diag: None,
        }
    }

    pub fn logic(v: bool) -> Self {
        Self {
            kind: ValueKind::Logic(v),
            diag: None,
        }
    }

    pub fn character(v: impl Into<String>) -> Self {
        Self {
            kind: ValueKind::Character(v.into()),
            diag: None,
        }
    }

    pub fn keyword(op: OpCode) -> Self {
        Self {
            kind: ValueKind::Keyword(op),
            diag: None,
        }
    }

    /// A poisoned arithmetic zero carrying `diag`.
    pub fn poisoned(diag: Diagnostic) -> Self {
        Self {
            kind: ValueKind::Arithmetic(0),
            diag: Some(Box::new(diag)),
        }
    }

    pub fn is_poisoned(&self) -> bool {
        self.diag.is_some()
    }

    /// The diagnostic to propagate when either operand is poisoned; the
    /// first operand's diagnostic takes precedence.
    pub fn first_poison(lhs: &Value, rhs: &Value) -> Option<Diagnostic> {
        lhs.diag
            .as_deref()
            .or(rhs.diag.as_deref())
            .cloned()
    }

    /// Read this value as an arithmetic operand.
    ///
    /// Logic coerces to 0/1; character values must form a self-defining
    /// term. A keyword has no numeric reading.
    pub fn get_numeric(&self, span: Span) -> Result<i32, Diagnostic> {
        match &self.kind {
            ValueKind::Arithmetic(v) => Ok(*v),
            ValueKind::Logic(b) => Ok(i32::from(*b)),
            ValueKind::Character(s) => parse_self_defining_term(s)
                .ok_or_else(|| diags::invalid_self_defining_term(s, span)),
            ValueKind::Keyword(op) => Err(diags::invalid_self_defining_term(op.as_str(), span)),
        }
    }

    /// Read this value as a logic operand.
    ///
    /// Arithmetic coerces nonzero to true; character values must be the
    /// strings "0" or "1".
    pub fn get_logic(&self, span: Span) -> Result<bool, Diagnostic> {
        match &self.kind {
            ValueKind::Logic(b) => Ok(*b),
            ValueKind::Arithmetic(v) => Ok(*v != 0),
            ValueKind::Character(s) => match s.trim() {
                "0" => Ok(false),
                "1" => Ok(true),
                _ => Err(diags::invalid_logic_operand(s, span)),
            },
            ValueKind::Keyword(op) => Err(diags::invalid_logic_operand(op.as_str(), span)),
        }
    }

    /// Read this value as character text. Arithmetic renders as decimal,
    /// logic as "1"/"0".
    pub fn get_text(&self, span: Span) -> Result<String, Diagnostic> {
        match &self.kind {
            ValueKind::Character(s) => Ok(s.clone()),
            ValueKind::Arithmetic(v) => Ok(v.to_string()),
            ValueKind::Logic(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            ValueKind::Keyword(op) => Err(diags::invalid_logic_operand(op.as_str(), span)),
        }
    }

    /// Convert into the well-typed shape handed to the variable model.
    /// Keywords have no such shape; the caller must have rejected them.
    pub fn into_typed(self) -> Option<TypedValue> {
        match self.kind {
            ValueKind::Arithmetic(v) => Some(TypedValue::Arithmetic(v)),
            ValueKind::Logic(b) => Some(TypedValue::Boolean(b)),
            ValueKind::Character(s) => Some(TypedValue::Character(s)),
            ValueKind::Keyword(_) => None,
        }
    }

    /// Wrap a [`TypedValue`] coming back out of the variable model.
    pub fn from_typed(value: TypedValue) -> Self {
        match value {
            TypedValue::Arithmetic(v) => Value::arithmetic(v),
            TypedValue::Boolean(b) => Value::logic(b),
            TypedValue::Character(s) => Value::character(s),
        }
    }
}
