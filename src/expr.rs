//! The grammar expression model.
//!
//! A grammar is a tree of `Expr` values: literals, sequences, ordered
//! alternation, greedy repetition, lookahead, anchored pattern atoms, span
//! capture, and semantic actions. Trees, not graphs — recursion is expressed
//! by [`Expr::root`], which names a rule instead of holding the referenced
//! node, so cyclic grammars never form cyclic object graphs.
//!
//! Each variant answers three queries the compiler needs: its synthesized
//! [result type](Expr::result_type), a [stable diagnostic
//! rendering](Expr::describe) embedded beside generated code, and the
//! [side resources](Expr::resources) its compiled body needs once per parser
//! instance.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::error::CompileError;
use crate::types::Ty;
use crate::unit::Resource;
use crate::value::Value;

/// The pure transform a semantic action applies to its child's value when
/// a grammar runs on the evaluation machine.
#[derive(Clone)]
pub struct ActionFn(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl ActionFn {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> ActionFn {
        ActionFn(Arc::new(f))
    }

    pub fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl fmt::Debug for ActionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ActionFn")
    }
}

/// One node of a grammar expression tree.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Exact text match.
    Literal(String),
    /// Children left to right, each starting where the previous ended.
    Sequence(Vec<Expr>),
    /// Ordered choice: every branch tried at the same offset, first
    /// success wins.
    Alternate(Vec<Expr>),
    /// Zero or more repetitions; never fails.
    Star(Box<Expr>),
    /// One or more repetitions.
    Plus(Box<Expr>),
    /// Zero or one occurrence; absence is not an error.
    Optional(Box<Expr>),
    /// Zero-width negative lookahead.
    Not(Box<Expr>),
    /// Zero-width positive lookahead; keeps the child's value.
    And(Box<Expr>),
    /// Anchored regex atom. `anchored` is `source` wrapped in `\A(?:…)` so
    /// a match can only occur exactly at the current offset.
    Pattern {
        source: String,
        anchored: String,
        compiled: Regex,
    },
    /// Run the child for its offset effect only and yield the raw input
    /// slice it covered.
    Contents(Box<Expr>),
    /// Semantic action: transform the child's value into `returns`.
    /// `source` is a Rust expression over `arg` for emission; `apply` is
    /// the same transform as a closure for the machine.
    Action {
        inner: Box<Expr>,
        returns: Ty,
        source: String,
        apply: ActionFn,
    },
    /// Pure indirection to the rule named `name`, with its declared
    /// result type.
    RootRef { name: String, ty: Ty },
}

impl Expr {
    pub fn literal(text: impl Into<String>) -> Expr {
        Expr::Literal(text.into())
    }

    pub fn sequence(children: Vec<Expr>) -> Expr {
        Expr::Sequence(children)
    }

    pub fn alternate(branches: Vec<Expr>) -> Expr {
        Expr::Alternate(branches)
    }

    pub fn star(inner: Expr) -> Expr {
        Expr::Star(Box::new(inner))
    }

    pub fn plus(inner: Expr) -> Expr {
        Expr::Plus(Box::new(inner))
    }

    pub fn optional(inner: Expr) -> Expr {
        Expr::Optional(Box::new(inner))
    }

    pub fn not(inner: Expr) -> Expr {
        Expr::Not(Box::new(inner))
    }

    pub fn and(inner: Expr) -> Expr {
        Expr::And(Box::new(inner))
    }

    /// Build a pattern atom, rejecting an unparsable pattern before any
    /// compilation begins.
    pub fn pattern(source: &str) -> Result<Expr, CompileError> {
        let anchored = format!(r"\A(?:{})", source);
        let compiled = Regex::new(&anchored).map_err(|e| CompileError::InvalidPattern {
            source: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(Expr::Pattern {
            source: source.to_string(),
            anchored,
            compiled,
        })
    }

    pub fn contents(inner: Expr) -> Expr {
        Expr::Contents(Box::new(inner))
    }

    pub fn action(
        inner: Expr,
        returns: Ty,
        source: impl Into<String>,
        apply: impl Fn(Value) -> Value + Send + Sync + 'static,
    ) -> Expr {
        Expr::Action {
            inner: Box::new(inner),
            returns,
            source: source.into(),
            apply: ActionFn::new(apply),
        }
    }

    pub fn root(name: impl Into<String>, ty: Ty) -> Expr {
        Expr::RootRef {
            name: name.into(),
            ty,
        }
    }

    /// The type of value this expression yields on a successful match.
    pub fn result_type(&self) -> Ty {
        match self {
            Expr::Literal(_) | Expr::Pattern { .. } | Expr::Contents(_) => Ty::Text,
            Expr::Sequence(children) => {
                Ty::Record(children.iter().map(Expr::result_type).collect())
            }
            // Branch agreement is enforced at compile time; the first
            // branch is the representative. An empty alternation has no
            // type and is flagged as a defect by the compiler.
            Expr::Alternate(branches) => match branches.first() {
                Some(first) => first.result_type(),
                None => Ty::Unit,
            },
            Expr::Star(inner) | Expr::Plus(inner) => Ty::list(inner.result_type()),
            Expr::Optional(inner) => Ty::option(inner.result_type()),
            Expr::Not(_) => Ty::Unit,
            Expr::And(inner) => inner.result_type(),
            Expr::Action { returns, .. } => returns.clone(),
            Expr::RootRef { ty, .. } => ty.clone(),
        }
    }

    /// Stable diagnostic rendering of this expression.
    pub fn describe(&self) -> String {
        match self {
            Expr::Literal(text) => format!("{:?}", text),
            Expr::Sequence(children) => {
                let parts: Vec<String> = children.iter().map(Expr::describe).collect();
                parts.join(" ")
            }
            Expr::Alternate(branches) => {
                let parts: Vec<String> = branches.iter().map(Expr::describe).collect();
                format!("({})", parts.join(" / "))
            }
            Expr::Star(inner) => format!("({})*", inner.describe()),
            Expr::Plus(inner) => format!("({})+", inner.describe()),
            Expr::Optional(inner) => format!("({})?", inner.describe()),
            Expr::Not(inner) => format!("!({})", inner.describe()),
            Expr::And(inner) => format!("&({})", inner.describe()),
            Expr::Pattern { source, .. } => format!("regex {:?}", source),
            Expr::Contents(inner) => format!("$({})", inner.describe()),
            Expr::Action { inner, returns, .. } => {
                format!("({} -> {})", inner.describe(), returns)
            }
            Expr::RootRef { name, .. } => name.clone(),
        }
    }

    /// Side resources this node's compiled body needs, one set per
    /// compilation unit. Identical patterns at different nodes each
    /// declare their own matcher; nothing is shared globally.
    pub fn resources(&self) -> Vec<Resource> {
        match self {
            Expr::Pattern {
                anchored, compiled, ..
            } => vec![Resource::pattern(anchored, compiled.clone())],
            _ => Vec::new(),
        }
    }
}
