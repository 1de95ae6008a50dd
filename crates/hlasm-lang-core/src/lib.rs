//! Shared infrastructure for the HLASM conditional-assembly crates.
//!
//! This crate provides the foundational types the runtime crates share:
//!
//! - **Source location tracking**: [`Span`], [`FileId`], [`Location`]
//! - **Diagnostics**: [`Diagnostic`], [`Severity`]
//! - **Diagnostic sinks**: [`DiagnosticSink`], [`NullSink`]
//!
//! # Design Principles
//!
//! - **Zero required dependencies**: plain Rust types only; the optional
//!   `serde` feature adds derives for layers that ship diagnostics to IDE
//!   clients. Runtime crates add `miette`/`thiserror` on top for hard
//!   errors.
//! - **Reported, not thrown**: user-level errors travel as [`Diagnostic`]
//!   values into a [`DiagnosticSink`]; nothing in this crate unwinds.

mod diagnostic;
mod span;

pub use diagnostic::{Diagnostic, DiagnosticSink, NullSink, Severity};
pub use span::{offset_to_line_col, FileId, Location, Span};
