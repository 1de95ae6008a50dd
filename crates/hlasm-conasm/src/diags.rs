//! Diagnostic constructors for every code the runtime emits.
//!
//! Downstream IDE clients match on the code strings verbatim, so each code
//! has exactly one constructor here and the texts never change shape.
//! Families:
//!
//! - `E0xx` — variable-symbol access (lookup, subscripts, declarations)
//! - `A0xx` — inter-type conversion
//! - `EA0x` / `EL0x` / `EC0x` — arithmetic / logic / character expression
//! - `M0xx` — macro invocation
//! - `D00x` — macro definition (hard errors, see [`crate::macro_def`])
//!
//! `E055` is emitted by two distinct validation paths — SET-symbol arrays
//! and macro parameters. Legacy behavior, kept as-is.

use hlasm_lang_core::{Diagnostic, Span};

/// E030: assignment to a name that is not a SET symbol.
pub fn read_only_symbol(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "E030",
        format!("cannot assign a value to '&{name}'"),
        span,
    )
}

/// E032: a variable symbol that was never declared or bound.
pub fn undefined_variable_symbol(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error("E032", format!("undefined variable symbol '&{name}'"), span)
}

/// E051: GBLx/LCLx re-declaration that conflicts with the existing symbol.
pub fn conflicting_declaration(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "E051",
        format!("variable symbol '&{name}' is already declared with a different type or shape"),
        span,
    )
}

/// E052: subscript count does not match the symbol's shape.
pub fn inconsistent_subscript(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "E052",
        format!("inconsistent subscript count for variable symbol '&{name}'"),
        span,
    )
}

/// E055: subscript below the first element.
pub fn subscript_below_one(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "E055",
        format!("subscript of '&{name}' must be at least 1"),
        span,
    )
}

/// A010: character value that does not form a valid arithmetic term.
pub fn invalid_arithmetic_conversion(value: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "A010",
        format!("cannot convert character value '{value}' to an arithmetic value"),
        span,
    )
}

/// EA01: malformed self-defining term.
pub fn invalid_self_defining_term(text: &str, span: Span) -> Diagnostic {
    Diagnostic::error("EA01", format!("invalid self-defining term '{text}'"), span)
}

/// EA02: arithmetic result outside the 32-bit signed range.
pub fn arithmetic_overflow(span: Span) -> Diagnostic {
    Diagnostic::error(
        "EA02",
        "arithmetic operation overflows the 32-bit signed range",
        span,
    )
}

/// EA03: the expression uses more operators than the legacy limit allows.
pub fn too_many_operators(limit: usize, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EA03",
        format!("expression uses more than {limit} operators"),
        span,
    )
}

/// EA04: the token sequence does not form an expression.
pub fn malformed_expression(detail: &str, span: Span) -> Diagnostic {
    Diagnostic::error("EA04", format!("malformed expression: {detail}"), span)
}

/// EL01: a value that cannot be read as a logic operand.
pub fn invalid_logic_operand(value: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EL01",
        format!("'{value}' is not a valid logic value"),
        span,
    )
}

/// EC01: non-hexadecimal digits where hexadecimal is required.
pub fn invalid_hex_string(value: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC01",
        format!("'{value}' contains characters that are not hexadecimal digits"),
        span,
    )
}

/// EC02: field length is not the multiple the conversion requires.
pub fn invalid_field_length(function: &str, multiple: usize, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC02",
        format!("{function} requires a field length that is a multiple of {multiple}"),
        span,
    )
}

/// EC03: non-binary digits where binary is required.
pub fn invalid_binary_string(value: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC03",
        format!("'{value}' contains characters that are not binary digits"),
        span,
    )
}

/// EC04: non-decimal input where a decimal number is required.
pub fn invalid_decimal_string(value: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC04",
        format!("'{value}' is not a valid decimal number"),
        span,
    )
}

/// EC05: substring start/length outside the string.
pub fn substring_out_of_bounds(span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC05",
        "substring start or length falls outside the string",
        span,
    )
}

/// EC06: negative duplication factor.
pub fn invalid_duplication_factor(factor: i32, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC06",
        format!("duplication factor {factor} must not be negative"),
        span,
    )
}

/// EC07: ordinal outside the representable character range.
pub fn ordinal_out_of_range(value: i32, span: Span) -> Diagnostic {
    Diagnostic::error(
        "EC07",
        format!("value {value} is outside the 0-255 character range"),
        span,
    )
}

/// M010: keyword argument that names no keyword parameter of the macro.
pub fn unknown_keyword_argument(macro_name: &str, keyword: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        "M010",
        format!("macro '{macro_name}' has no keyword parameter '{keyword}'"),
        span,
    )
}

/// M011: macro call refused because the nest limit was reached.
pub fn nest_limit_exceeded(macro_name: &str, limit: usize, span: Span) -> Diagnostic {
    Diagnostic::error(
        "M011",
        format!("call to macro '{macro_name}' exceeds the nesting limit of {limit}"),
        span,
    )
}

/// M012: ACTR branch counter exhausted; the processing unit is abandoned.
pub fn actr_exhausted(span: Span) -> Diagnostic {
    Diagnostic::error(
        "M012",
        "ACTR branch counter exhausted; conditional assembly of this unit stops",
        span,
    )
}

/// I999: engineering invariant violated. Not user-reachable; panics.
pub fn internal_error(detail: &str) -> ! {
    panic!("I999: internal conditional-assembly error: {detail}");
}
