//! HLASM conditional-assembly runtime.
//!
//! This crate models the macro language that the High Level Assembler
//! executes during parsing — a small dynamically-typed interpreted language
//! whose statements generate the final instruction stream.
//!
//! This crate provides:
//!
//! - **Variable symbols** — typed SET symbols (A/B/C, scalar or sparse
//!   array), macro parameters (positional/keyword), and the SYSLIST/SYSMAC
//!   system variables
//! - **Macro definition & invocation** — prototype validation, parameter
//!   binding with SYSLIST construction, statement replay with sequence-
//!   symbol branching
//! - **Typed expression engine** — arithmetic/logic/character values with
//!   implicit coercions, the keyword operator table, built-in string
//!   functions, and attribute references
//! - **Context manager** — scoped variable resolution, subscript
//!   validation, inter-type conversion, nest and ACTR limits
//!
//! User-level errors never unwind: they ride values as poison diagnostics
//! and accumulate in a [`DiagnosticSink`](hlasm_lang_core::DiagnosticSink),
//! so evaluation of the surrounding statement always continues.

pub mod context;
pub mod data;
pub mod diags;
pub mod expr;
pub mod ident;
pub mod macro_def;
pub mod param;
pub mod set_symbol;
pub mod variable;

pub use context::{HlasmContext, DEFAULT_ACTR_LIMIT, MACRO_NEST_LIMIT};
pub use data::ParamData;
pub use expr::{AttrKind, Expr, OpCode, Value, ValueKind};
pub use ident::{Ident, IdentTable};
pub use macro_def::{
    CachedStatement, DefinitionError, FormalArg, MacroArg, MacroDefinition, MacroInvocation,
};
pub use param::{KeywordParam, MacroParam, PositionalParam, SystemVariable, SystemVariableKind};
pub use set_symbol::{SetElement, SetSymbol, SetSymbolBase, SetSymbolKind, TypedValue};
pub use variable::VariableSymbol;

pub use hlasm_lang_core::{
    Diagnostic, DiagnosticSink, FileId, Location, NullSink, Severity, Span,
};
