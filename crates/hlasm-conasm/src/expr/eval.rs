//! The expression evaluator.
//!
//! Works over a flattened queue of [`Value`]s (operators ride the queue as
//! `Keyword` values). Structure, tightest binding first: unary operators,
//! then `* /`, then `+ -`, then the keyword priority table levels 1 through
//! 4. An operator counter enforces the legacy 24-operator ceiling.
//!
//! Poison discipline: an operator whose operand is already poisoned applies
//! no computation and copies the existing diagnostic forward; the counter is
//! consulted only for operators that would actually compute, so the ceiling
//! never masks an earlier error.

use hlasm_lang_core::Span;

use super::arithmetic;
use super::character;
use super::keyword::OpCode;
use super::logical;
use super::value::{Value, ValueKind};
use crate::diags;

/// Legacy ceiling on the number of operators in one expression.
pub const MAX_OPERATORS: usize = 24;

/// Evaluate a flattened token queue.
pub fn evaluate_tokens(tokens: Vec<Value>, span: Span) -> Value {
    if tokens.is_empty() {
        return Value::poisoned(diags::malformed_expression("operand expected", span));
    }
    let mut ev = Evaluator {
        tokens,
        pos: 0,
        ops: 0,
        span,
    };
    let result = ev.eval_level(4);
    if ev.pos < ev.tokens.len() && !result.is_poisoned() {
        return Value::poisoned(diags::malformed_expression("operator expected", span));
    }
    result
}

struct Evaluator {
    tokens: Vec<Value>,
    pos: usize,
    ops: usize,
    span: Span,
}

impl Evaluator {
    fn peek_keyword(&self) -> Option<OpCode> {
        match self.tokens.get(self.pos) {
            Some(Value {
                kind: ValueKind::Keyword(op),
                ..
            }) => Some(*op),
            _ => None,
        }
    }

    /// Count one applied operator against the ceiling.
    fn count_op(&mut self) -> Option<Value> {
        self.ops += 1;
        if self.ops > MAX_OPERATORS {
            Some(Value::poisoned(diags::too_many_operators(
                MAX_OPERATORS,
                self.span,
            )))
        } else {
            None
        }
    }

    /// Apply a binary operator, observing poison and the operator ceiling.
    fn combine(&mut self, op: OpCode, lhs: Value, rhs: Value) -> Value {
        if let Some(diag) = Value::first_poison(&lhs, &rhs) {
            return Value {
                kind: lhs.kind,
                diag: Some(Box::new(diag)),
            };
        }
        if let Some(poisoned) = self.count_op() {
            return poisoned;
        }
        apply_binary(op, &lhs, &rhs, self.span)
    }

    /// One keyword-table priority level; level 0 is the `+ -` grammar.
    fn eval_level(&mut self, level: u8) -> Value {
        if level == 0 {
            return self.eval_sum();
        }
        let mut lhs = self.eval_level(level - 1);
        while let Some(op) = self.peek_keyword() {
            if op.priority() != Some(level) {
                break;
            }
            self.pos += 1;
            // `AND NOT` may arrive as two queue entries.
            let op = if matches!(op, OpCode::And | OpCode::Or | OpCode::Xor)
                && self.peek_keyword() == Some(OpCode::Not)
            {
                self.pos += 1;
                match op {
                    OpCode::And => OpCode::AndNot,
                    OpCode::Or => OpCode::OrNot,
                    _ => OpCode::XorNot,
                }
            } else {
                op
            };
            let rhs = self.eval_level(level - 1);
            lhs = self.combine(op, lhs, rhs);
        }
        lhs
    }

    fn eval_sum(&mut self) -> Value {
        let mut lhs = self.eval_product();
        while let Some(op) = self.peek_keyword() {
            if !matches!(op, OpCode::Add | OpCode::Sub) {
                break;
            }
            self.pos += 1;
            let rhs = self.eval_product();
            lhs = self.combine(op, lhs, rhs);
        }
        lhs
    }

    fn eval_product(&mut self) -> Value {
        let mut lhs = self.eval_factor();
        while let Some(op) = self.peek_keyword() {
            if !matches!(op, OpCode::Mul | OpCode::Div) {
                break;
            }
            self.pos += 1;
            let rhs = self.eval_factor();
            lhs = self.combine(op, lhs, rhs);
        }
        lhs
    }

    fn eval_factor(&mut self) -> Value {
        match self.peek_keyword() {
            Some(op) if op.is_unary() => {
                self.pos += 1;
                let operand = self.eval_factor();
                if operand.is_poisoned() {
                    return operand;
                }
                if let Some(poisoned) = self.count_op() {
                    return poisoned;
                }
                apply_unary(op, &operand, self.span)
            }
            Some(OpCode::Add) => {
                // Unary plus.
                self.pos += 1;
                self.eval_factor()
            }
            Some(OpCode::Sub) => {
                self.pos += 1;
                let operand = self.eval_factor();
                self.combine(OpCode::Sub, Value::arithmetic(0), operand)
            }
            _ => self.eval_primary(),
        }
    }

    fn eval_primary(&mut self) -> Value {
        match self.tokens.get(self.pos) {
            None => Value::poisoned(diags::malformed_expression("operand expected", self.span)),
            Some(Value {
                kind: ValueKind::Keyword(op),
                ..
            }) => Value::poisoned(diags::malformed_expression(
                &format!("operator '{op}' where an operand is required"),
                self.span,
            )),
            Some(value) => {
                let value = value.clone();
                self.pos += 1;
                value
            }
        }
    }
}

/// Dispatch a binary operator over clean operands.
fn apply_binary(op: OpCode, lhs: &Value, rhs: &Value, span: Span) -> Value {
    match op {
        OpCode::Add
        | OpCode::Sub
        | OpCode::Mul
        | OpCode::Div
        | OpCode::Sla
        | OpCode::Sll
        | OpCode::Sra
        | OpCode::Srl => {
            let (l, r) = match (lhs.get_numeric(span), rhs.get_numeric(span)) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(d), _) | (_, Err(d)) => return Value::poisoned(d),
            };
            match arithmetic::binary(op, l, r, span) {
                Ok(v) => Value::arithmetic(v),
                Err(d) => Value::poisoned(d),
            }
        }

        OpCode::Eq | OpCode::Ne | OpCode::Le | OpCode::Lt | OpCode::Gt | OpCode::Ge => {
            // Two character operands compare as text; any arithmetic or
            // logic operand forces a numeric comparison.
            if let (ValueKind::Character(l), ValueKind::Character(r)) = (&lhs.kind, &rhs.kind) {
                Value::logic(character::relational(op, l, r))
            } else {
                match (lhs.get_numeric(span), rhs.get_numeric(span)) {
                    (Ok(l), Ok(r)) => Value::logic(arithmetic::relational(op, l, r)),
                    (Err(d), _) | (_, Err(d)) => Value::poisoned(d),
                }
            }
        }

        OpCode::Find | OpCode::Index => {
            let (l, r) = match (lhs.get_text(span), rhs.get_text(span)) {
                (Ok(l), Ok(r)) => (l, r),
                (Err(d), _) | (_, Err(d)) => return Value::poisoned(d),
            };
            let pos = if op == OpCode::Find {
                character::find(&l, &r)
            } else {
                character::index(&l, &r)
            };
            Value::arithmetic(pos)
        }

        OpCode::And
        | OpCode::Or
        | OpCode::Xor
        | OpCode::AndNot
        | OpCode::OrNot
        | OpCode::XorNot => {
            let (base, negate) = op.split_not();
            // Two arithmetic operands use the bitwise form; anything else is
            // the logical connective with coercion.
            if let (ValueKind::Arithmetic(l), ValueKind::Arithmetic(r)) = (&lhs.kind, &rhs.kind) {
                let r = if negate { !*r } else { *r };
                match arithmetic::binary(base, *l, r, span) {
                    Ok(v) => Value::arithmetic(v),
                    Err(d) => Value::poisoned(d),
                }
            } else {
                match (lhs.get_logic(span), rhs.get_logic(span)) {
                    (Ok(l), Ok(r)) => Value::logic(logical::connective(base, l, r, negate)),
                    (Err(d), _) | (_, Err(d)) => Value::poisoned(d),
                }
            }
        }

        _ => diags::internal_error("unary operator dispatched as binary"),
    }
}

/// Dispatch a unary operator over a clean operand.
fn apply_unary(op: OpCode, operand: &Value, span: Span) -> Value {
    // The character conversions all read their operand as text.
    let text_in = |f: &dyn Fn(&str) -> Result<String, hlasm_lang_core::Diagnostic>| match operand
        .get_text(span)
    {
        Ok(s) => match f(&s) {
            Ok(out) => Value::character(out),
            Err(d) => Value::poisoned(d),
        },
        Err(d) => Value::poisoned(d),
    };
    let numeric_in = |f: &dyn Fn(i32) -> String| match operand.get_numeric(span) {
        Ok(v) => Value::character(f(v)),
        Err(d) => Value::poisoned(d),
    };

    match op {
        OpCode::Not => match &operand.kind {
            ValueKind::Arithmetic(v) => Value::arithmetic(arithmetic::complement(*v)),
            _ => match operand.get_logic(span) {
                Ok(b) => Value::logic(!b),
                Err(d) => Value::poisoned(d),
            },
        },

        OpCode::A2b => numeric_in(&arithmetic::a2b),
        OpCode::A2c => numeric_in(&arithmetic::a2c),
        OpCode::A2d => numeric_in(&arithmetic::a2d),
        OpCode::A2x => numeric_in(&arithmetic::a2x),
        OpCode::Signed => numeric_in(&arithmetic::signed),
        OpCode::Byte => match operand.get_numeric(span) {
            Ok(v) => match arithmetic::byte(v, span) {
                Ok(s) => Value::character(s),
                Err(d) => Value::poisoned(d),
            },
            Err(d) => Value::poisoned(d),
        },

        OpCode::B2c => text_in(&|s| character::b2c(s, span)),
        OpCode::B2d => text_in(&|s| character::b2d(s, span)),
        OpCode::B2x => text_in(&|s| character::b2x(s, span)),
        OpCode::C2b => text_in(&|s| Ok(character::c2b(s))),
        OpCode::C2d => text_in(&|s| character::c2d(s, span)),
        OpCode::C2x => text_in(&|s| Ok(character::c2x(s))),
        OpCode::D2b => text_in(&|s| character::d2b(s, span)),
        OpCode::D2c => text_in(&|s| character::d2c(s, span)),
        OpCode::D2x => text_in(&|s| character::d2x(s, span)),
        OpCode::X2b => text_in(&|s| character::x2b(s, span)),
        OpCode::X2c => text_in(&|s| character::x2c(s, span)),
        OpCode::X2d => text_in(&|s| character::x2d(s, span)),

        OpCode::Double => text_in(&|s| Ok(character::double(s))),
        OpCode::Dcval => text_in(&|s| Ok(character::dcval(s))),
        OpCode::Dequote => text_in(&|s| Ok(character::dequote(s))),
        OpCode::Lower => text_in(&|s| Ok(s.to_ascii_lowercase())),
        OpCode::Upper => text_in(&|s| Ok(s.to_ascii_uppercase())),

        OpCode::Dclen => match operand.get_text(span) {
            Ok(s) => Value::arithmetic(character::dclen(&s) as i32),
            Err(d) => Value::poisoned(d),
        },

        OpCode::IsBin | OpCode::IsDec | OpCode::IsHex | OpCode::IsSym => {
            match operand.get_text(span) {
                Ok(s) => Value::logic(match op {
                    OpCode::IsBin => character::is_bin(&s),
                    OpCode::IsDec => character::is_dec(&s),
                    OpCode::IsHex => character::is_hex(&s),
                    _ => character::is_sym(&s),
                }),
                Err(d) => Value::poisoned(d),
            }
        }

        _ => diags::internal_error("binary operator dispatched as unary"),
    }
}
