//! Logic operations of the expression engine.
//!
//! The connectives work on booleans; operand coercion (nonzero arithmetic is
//! true, character "0"/"1" only) happens in [`super::value::Value::get_logic`]
//! before dispatch lands here.

use super::keyword::OpCode;
use crate::diags;

/// Apply a logical connective. `negate_rhs` carries the `… NOT` complex
/// keyword forms (`AND NOT` etc.).
pub fn connective(op: OpCode, lhs: bool, rhs: bool, negate_rhs: bool) -> bool {
    let rhs = if negate_rhs { !rhs } else { rhs };
    match op {
        OpCode::And => lhs && rhs,
        OpCode::Or => lhs || rhs,
        OpCode::Xor => lhs != rhs,
        _ => diags::internal_error("non-connective operator dispatched to logical::connective"),
    }
}
