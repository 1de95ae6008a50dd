//! The typed expression engine.
//!
//! Values are tagged arithmetic/logic/character (plus operators riding the
//! token queue), with an optional poison diagnostic that short-circuits
//! every operator that touches it. The evaluator consumes a flattened token
//! queue using the keyword priority table.

pub mod arithmetic;
pub mod ast;
pub mod character;
pub mod eval;
pub mod keyword;
pub mod logical;
pub mod value;

pub use ast::{AttrKind, Expr};
pub use eval::{evaluate_tokens, MAX_OPERATORS};
pub use keyword::OpCode;
pub use value::{Value, ValueKind};
