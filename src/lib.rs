//! # packgen
//!
//! A grammar compiler: a typed tree of parsing-expression combinators goes
//! in, a self-contained memoized (packrat) recursive-descent parser comes
//! out. Generated parsers have no runtime dependency on this crate and run
//! in linear time even though alternation and lookahead backtrack freely.
//!
//! ## Workflow
//!
//! 1. Build [`Expr`] values with the variant constructors.
//! 2. Register every rule on a [`Compiler`] with `register_root`; a
//!    leading-uppercase name becomes a public entry point.
//! 3. Call `serialize` for the generated Rust module, or `rules` for a
//!    validated [`RuleSet`] that the in-process [`Machine`] can execute.
//!
//! Grammar-authoring defects (unresolved references, alternation branches
//! that disagree on type, malformed patterns) are collected and reported
//! together; no partial output is ever emitted.

pub mod compiler;
pub mod error;
pub mod expr;
pub mod machine;
mod render;
pub mod runtime;
pub mod samples;
pub mod types;
pub mod unit;
pub mod value;

pub use compiler::{Compiler, Manifest, ManifestRule, RootSpec, RuleSet};
pub use error::CompileError;
pub use expr::Expr;
pub use machine::Machine;
pub use runtime::{Outcome, ParseError, Reject};
pub use types::Ty;
pub use unit::{Body, CompilationUnit, UnitId};
pub use value::Value;
