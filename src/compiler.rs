//! Compiler state: the per-session orchestrator.
//!
//! A [`Compiler`] turns a forest of named rules into a closed set of
//! [`CompilationUnit`]s with no dangling references. Registration compiles
//! eagerly; root references resolve through a lazily populated
//! name-to-identity map, which is what lets recursive and mutually
//! recursive grammars compile without walking forever: compiling a
//! reference allocates at most one identity per distinct name and never
//! generates a body.
//!
//! Authoring defects are collected, not thrown — one serialization attempt
//! reports everything wrong with a grammar, and any defect blocks all code
//! generation.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::CompileError;
use crate::expr::Expr;
use crate::machine::Machine;
use crate::render;
use crate::runtime::{ParseError, Reject};
use crate::types::Ty;
use crate::unit::{Body, CompilationUnit, UnitId};
use crate::value::Value;

/// Legal root names: an ASCII letter followed by letters, digits,
/// underscores, or dashes.
static ROOT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new("^[A-Za-z][A-Za-z0-9_-]*$").unwrap());

/// A name's slot in the session: its identity, whether its rule has been
/// registered yet, the rule's actual type, and every type the name was
/// referenced as.
struct RootEntry {
    id: UnitId,
    registered: bool,
    ty: Option<Ty>,
    referenced: Vec<Ty>,
}

/// One registered rule, as exposed by a validated [`RuleSet`].
#[derive(Debug, Clone)]
pub struct RootSpec {
    pub name: String,
    pub id: UnitId,
    pub ty: Ty,
    /// Leading-uppercase names are public: they get generated entry points.
    pub public: bool,
}

/// One compile session. Construct, register every rule, then call
/// [`serialize`](Compiler::serialize) or [`rules`](Compiler::rules) once;
/// the state is not reusable across sessions.
pub struct Compiler {
    units: Vec<Option<CompilationUnit>>,
    roots: BTreeMap<String, RootEntry>,
    errors: Vec<CompileError>,
}

impl Compiler {
    pub fn new() -> Compiler {
        Compiler {
            units: Vec::new(),
            roots: BTreeMap::new(),
            errors: Vec::new(),
        }
    }

    /// Bind `name` to `expr`. A leading-uppercase name becomes a public
    /// entry point; any other name stays internal, reachable only through
    /// root references.
    pub fn register_root(&mut self, name: &str, expr: Expr) {
        if !ROOT_NAME.is_match(name) {
            self.errors.push(CompileError::InvalidRootName {
                name: name.to_string(),
            });
        }
        if let Some(entry) = self.roots.get(name) {
            if entry.registered {
                self.errors.push(CompileError::DuplicateRoot {
                    name: name.to_string(),
                });
                return;
            }
        }
        // Reuse the identity if an earlier reference minted it; the rule's
        // unit is a thin delegate to the compiled expression.
        let id = self.root_id(name);
        let ty = expr.result_type();
        let describe = expr.describe();
        let target = self.compile(&expr);
        self.units[id.index()] = Some(CompilationUnit {
            id,
            result: ty.clone(),
            body: Body::Delegate { target },
            resources: Vec::new(),
            describe,
        });
        if let Some(entry) = self.roots.get_mut(name) {
            entry.registered = true;
            entry.ty = Some(ty);
        }
    }

    /// Render the whole session into one self-contained Rust module, or
    /// report every collected defect. No partial output is ever produced.
    pub fn serialize(&self, module_name: &str) -> Result<String, Vec<CompileError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let units: Vec<CompilationUnit> = self.units.iter().flatten().cloned().collect();
        Ok(render::module(module_name, &units, &self.root_specs()))
    }

    /// Validate and hand over the closed unit set for direct evaluation.
    pub fn rules(self) -> Result<RuleSet, Vec<CompileError>> {
        let errors = self.validate();
        if !errors.is_empty() {
            return Err(errors);
        }
        let roots = self.root_specs();
        let units = self.units.into_iter().flatten().collect();
        Ok(RuleSet { units, roots })
    }

    /// Mint a fresh identity. Monotonic and unique within the session.
    fn mint(&mut self) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        self.units.push(None);
        id
    }

    /// The identity bound to a root name, minting one on first sight.
    fn root_id(&mut self, name: &str) -> UnitId {
        if let Some(entry) = self.roots.get(name) {
            return entry.id;
        }
        let id = self.mint();
        self.roots.insert(
            name.to_string(),
            RootEntry {
                id,
                registered: false,
                ty: None,
                referenced: Vec::new(),
            },
        );
        id
    }

    /// The single recursive compilation entry point: mint an identity for
    /// this node, compile its children, and record its unit.
    fn compile(&mut self, expr: &Expr) -> UnitId {
        // A root reference is pure indirection: a name lookup, never a new
        // unit and never a walk into the referenced tree.
        if let Expr::RootRef { name, ty } = expr {
            let id = self.root_id(name);
            if let Some(entry) = self.roots.get_mut(name) {
                entry.referenced.push(ty.clone());
            }
            return id;
        }

        let id = self.mint();
        let body = match expr {
            Expr::Literal(text) => Body::Literal { text: text.clone() },
            Expr::Sequence(children) => Body::Sequence {
                children: children.iter().map(|child| self.compile(child)).collect(),
            },
            Expr::Alternate(branches) => {
                self.check_branch_agreement(expr, branches);
                Body::Alternate {
                    children: branches.iter().map(|branch| self.compile(branch)).collect(),
                }
            }
            Expr::Star(inner) => Body::Star {
                child: self.compile(inner),
            },
            Expr::Plus(inner) => Body::Plus {
                child: self.compile(inner),
            },
            Expr::Optional(inner) => Body::Optional {
                child: self.compile(inner),
            },
            Expr::Not(inner) => Body::Not {
                child: self.compile(inner),
                describe: inner.describe(),
            },
            Expr::And(inner) => Body::And {
                child: self.compile(inner),
            },
            Expr::Pattern { source, .. } => Body::Pattern {
                source: source.clone(),
            },
            Expr::Contents(inner) => Body::Contents {
                child: self.compile(inner),
            },
            Expr::Action {
                inner,
                source,
                apply,
                ..
            } => Body::Action {
                child: self.compile(inner),
                source: source.clone(),
                apply: apply.clone(),
            },
            Expr::RootRef { .. } => unreachable!("root references are resolved above"),
        };
        self.units[id.index()] = Some(CompilationUnit {
            id,
            result: expr.result_type(),
            body,
            resources: expr.resources(),
            describe: expr.describe(),
        });
        id
    }

    /// Branches of an ordered choice must agree on one result type;
    /// mismatches are reported against branch 0, never coerced.
    fn check_branch_agreement(&mut self, alt: &Expr, branches: &[Expr]) {
        if branches.is_empty() {
            self.errors.push(CompileError::EmptyAlternate {
                describe: alt.describe(),
            });
            return;
        }
        let first_ty = branches[0].result_type();
        for (index, branch) in branches.iter().enumerate().skip(1) {
            let ty = branch.result_type();
            if ty != first_ty {
                self.errors.push(CompileError::BranchTypeMismatch {
                    describe: alt.describe(),
                    first: 0,
                    first_ty: first_ty.clone(),
                    second: index,
                    second_ty: ty,
                });
            }
        }
    }

    /// Every defect the session has accumulated: compile-time reports plus
    /// resolution checks over the root table.
    fn validate(&self) -> Vec<CompileError> {
        let mut errors = self.errors.clone();
        for (name, entry) in &self.roots {
            if !entry.registered {
                errors.push(CompileError::UnresolvedRoot { name: name.clone() });
                continue;
            }
            if let Some(actual) = &entry.ty {
                let mut reported: Vec<&Ty> = Vec::new();
                for declared in &entry.referenced {
                    if declared != actual && !reported.contains(&declared) {
                        reported.push(declared);
                        errors.push(CompileError::RootTypeMismatch {
                            name: name.clone(),
                            declared: declared.clone(),
                            actual: actual.clone(),
                        });
                    }
                }
            }
        }
        errors
    }

    /// Registered roots in name order.
    fn root_specs(&self) -> Vec<RootSpec> {
        self.roots
            .iter()
            .filter(|(_, entry)| entry.registered)
            .map(|(name, entry)| RootSpec {
                name: name.clone(),
                id: entry.id,
                ty: entry.ty.clone().unwrap_or(Ty::Unit),
                public: is_public(name),
            })
            .collect()
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

/// A leading-uppercase root name marks the rule public.
pub(crate) fn is_public(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

/// Generated entry-point name for a root: lowercased, dashes to
/// underscores.
pub(crate) fn entry_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_lowercase() })
        .collect()
}

/// The validated, closed output of one compile session: every unit indexed
/// by identity plus the root table.
pub struct RuleSet {
    units: Vec<CompilationUnit>,
    roots: Vec<RootSpec>,
}

impl RuleSet {
    /// All units, ordered by identity.
    pub fn units(&self) -> &[CompilationUnit] {
        &self.units
    }

    /// Registered roots in name order.
    pub fn roots(&self) -> &[RootSpec] {
        &self.roots
    }

    /// Identity of the rule named `name`, if registered.
    pub fn root(&self, name: &str) -> Option<UnitId> {
        self.roots
            .iter()
            .find(|spec| spec.name == name)
            .map(|spec| spec.id)
    }

    /// A fresh evaluation machine over `input`, with its own memo tables
    /// and freshly constructed resources.
    pub fn machine<'a>(&'a self, input: &'a str) -> Machine<'a> {
        Machine::new(&self.units, input)
    }

    /// Run the rule named `root` against the whole of `input` on the
    /// evaluation machine.
    pub fn parse(&self, root: &str, input: &str) -> Result<Value, ParseError> {
        let id = match self.root(root) {
            Some(id) => id,
            None => {
                return Err(ParseError {
                    at: 0,
                    reasons: vec![Reject::Expected {
                        at: 0,
                        token: format!("registered root `{}`", root),
                    }],
                })
            }
        };
        let mut machine = self.machine(input);
        let (outcome, value) = machine.run(id, 0);
        if outcome.ok && outcome.at == input.len() {
            return Ok(value);
        }
        Err(machine.into_parse_error(&outcome))
    }

    /// Render the generated module. Infallible: the set was validated when
    /// it was produced.
    pub fn serialize(&self, module_name: &str) -> String {
        render::module(module_name, &self.units, &self.roots)
    }

    /// A serializable summary of the session, for tooling.
    pub fn manifest(&self) -> Manifest {
        Manifest {
            units: self.units.len(),
            rules: self
                .roots
                .iter()
                .map(|spec| ManifestRule {
                    name: spec.name.clone(),
                    unit: spec.id.index() as u32,
                    result: spec.ty.rust_name(),
                    public: spec.public,
                })
                .collect(),
        }
    }
}

/// JSON-friendly description of a compiled rule set.
#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub units: usize,
    pub rules: Vec<ManifestRule>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestRule {
    pub name: String,
    pub unit: u32,
    pub result: String,
    pub public: bool,
}
