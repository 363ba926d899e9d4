//! The evaluation machine: direct execution of a compiled unit set.
//!
//! A [`Machine`] is one parser instance over one immutable input. It owns
//! an arena of memo maps — one per unit, indexed by the unit's identity —
//! and the per-instance resources, constructed once at creation and
//! read-only thereafter. Every `(unit, offset)` pair evaluates at most once
//! per instance, so a parse runs in O(units × input length) no matter how
//! freely alternation and lookahead backtrack.
//!
//! Generated Rust source implements exactly these semantics with static
//! types; the machine exists so a grammar can be executed and inspected
//! without compiling emitted text.

use std::collections::HashMap;

use crate::runtime::{Outcome, ParseError, Reject};
use crate::unit::{Body, CompilationUnit, Resource, RuntimeResource, UnitId};
use crate::value::Value;

/// One parser instance: memo tables, constructed resources, and the
/// farthest-failure trail for diagnostics. Offsets are byte offsets into
/// the input and must lie on character boundaries.
pub struct Machine<'a> {
    units: &'a [CompilationUnit],
    input: &'a str,
    memo: Vec<HashMap<usize, (Outcome, Value)>>,
    resources: Vec<Vec<RuntimeResource>>,
    farthest: usize,
    trail: Vec<Reject>,
}

impl<'a> Machine<'a> {
    /// Build an instance over `input`. Each unit's declared resources are
    /// constructed here, exactly once for the lifetime of the instance.
    pub fn new(units: &'a [CompilationUnit], input: &'a str) -> Machine<'a> {
        let memo = units.iter().map(|_| HashMap::new()).collect();
        let resources = units
            .iter()
            .map(|unit| unit.resources.iter().map(Resource::construct).collect())
            .collect();
        Machine {
            units,
            input,
            memo,
            resources,
            farthest: 0,
            trail: Vec::new(),
        }
    }

    /// The memoized match routine of `unit` at `here`: a cached pair is
    /// returned unchanged, otherwise the raw body runs and its result is
    /// stored first.
    pub fn run(&mut self, unit: UnitId, here: usize) -> (Outcome, Value) {
        if let Some(cached) = self.memo[unit.index()].get(&here) {
            return cached.clone();
        }
        let pair = self.eval(unit, here);
        self.memo[unit.index()].insert(here, pair.clone());
        pair
    }

    /// Convert an unrecovered entry-point failure into a report: the
    /// deepest-reached failure offset with every reason recorded there, or
    /// "end of input" when a partial match has no deeper failure to blame.
    pub fn into_parse_error(self, outcome: &Outcome) -> ParseError {
        if outcome.ok {
            if self.farthest >= outcome.at && !self.trail.is_empty() {
                return ParseError {
                    at: self.farthest,
                    reasons: self.trail,
                };
            }
            return ParseError {
                at: outcome.at,
                reasons: vec![Reject::Expected {
                    at: outcome.at,
                    token: "end of input".to_string(),
                }],
            };
        }
        if !self.trail.is_empty() {
            return ParseError {
                at: self.farthest,
                reasons: self.trail,
            };
        }
        ParseError {
            at: 0,
            reasons: outcome.rejects.clone(),
        }
    }

    /// The raw, unmemoized body of one unit.
    fn eval(&mut self, unit: UnitId, here: usize) -> (Outcome, Value) {
        let units = self.units;
        let current = &units[unit.index()];
        match &current.body {
            Body::Literal { text } => {
                if self.input[here..].starts_with(text.as_str()) {
                    (
                        Outcome::success(here + text.len()),
                        Value::Text(text.clone()),
                    )
                } else {
                    (
                        self.reject_expected(here, format!("{:?}", text)),
                        Value::Text(String::new()),
                    )
                }
            }
            Body::Sequence { children } => {
                let mut at = here;
                let mut fields = Vec::with_capacity(children.len());
                for child in children {
                    let (outcome, value) = self.run(*child, at);
                    if !outcome.ok {
                        return (outcome, Value::zero(&current.result));
                    }
                    at = outcome.at;
                    fields.push(value);
                }
                (Outcome::success(at), Value::Record(fields))
            }
            Body::Alternate { children } => {
                let mut rejects = Vec::new();
                for child in children {
                    let (outcome, value) = self.run(*child, here);
                    if outcome.ok {
                        return (outcome, value);
                    }
                    rejects.extend(outcome.rejects);
                }
                (Outcome::failure(rejects), Value::zero(&current.result))
            }
            Body::Star { child } => {
                let mut at = here;
                let mut items = Vec::new();
                loop {
                    let (outcome, value) = self.run(*child, at);
                    if !outcome.ok {
                        return (Outcome::success(at), Value::List(items));
                    }
                    at = outcome.at;
                    items.push(value);
                }
            }
            Body::Plus { child } => {
                let (first, value) = self.run(*child, here);
                if !first.ok {
                    return (first, Value::zero(&current.result));
                }
                let mut at = first.at;
                let mut items = vec![value];
                loop {
                    let (outcome, value) = self.run(*child, at);
                    if !outcome.ok {
                        return (Outcome::success(at), Value::List(items));
                    }
                    at = outcome.at;
                    items.push(value);
                }
            }
            Body::Optional { child } => {
                let (outcome, value) = self.run(*child, here);
                if outcome.ok {
                    (
                        Outcome::success(outcome.at),
                        Value::Maybe(Some(Box::new(value))),
                    )
                } else {
                    (Outcome::success(here), Value::Maybe(None))
                }
            }
            Body::Not { child, describe } => {
                let (outcome, _) = self.run(*child, here);
                if outcome.ok {
                    (self.reject_excluded(here, describe.clone()), Value::Unit)
                } else {
                    (Outcome::success(here), Value::Unit)
                }
            }
            Body::And { child } => {
                let (outcome, value) = self.run(*child, here);
                if !outcome.ok {
                    return (outcome, Value::zero(&current.result));
                }
                (Outcome::success(here), value)
            }
            Body::Pattern { source } => {
                // A pattern unit always declares its matcher in slot 0.
                let found = match self.resources[unit.index()].first() {
                    Some(RuntimeResource::Pattern(re)) => re
                        .find(&self.input[here..])
                        .map(|m| (here + m.end(), m.as_str().to_string())),
                    None => None,
                };
                match found {
                    Some((end, text)) => (Outcome::success(end), Value::Text(text)),
                    None => (
                        self.reject_expected(here, format!("regex {:?}", source)),
                        Value::Text(String::new()),
                    ),
                }
            }
            Body::Contents { child } => {
                let (outcome, _) = self.run(*child, here);
                if !outcome.ok {
                    return (outcome, Value::Text(String::new()));
                }
                (
                    Outcome::success(outcome.at),
                    Value::Text(self.input[here..outcome.at].to_string()),
                )
            }
            Body::Action { child, apply, .. } => {
                let (outcome, value) = self.run(*child, here);
                if !outcome.ok {
                    return (outcome, Value::zero(&current.result));
                }
                (outcome, apply.apply(value))
            }
            Body::Delegate { target } => self.run(*target, here),
        }
    }

    /// Record an unmet positive requirement at a primitive failure site and
    /// return the failed outcome.
    fn reject_expected(&mut self, at: usize, token: String) -> Outcome {
        let reject = Reject::Expected { at, token };
        self.record(reject.clone());
        Outcome::failure(vec![reject])
    }

    /// Record a negative lookahead that unexpectedly matched.
    fn reject_excluded(&mut self, at: usize, describe: String) -> Outcome {
        let reject = Reject::Excluded { at, describe };
        self.record(reject.clone());
        Outcome::failure(vec![reject])
    }

    /// Keep the farthest-failure trail: a deeper offset resets it, an
    /// equal offset appends.
    fn record(&mut self, reject: Reject) {
        let at = reject.at();
        if at > self.farthest {
            self.farthest = at;
            self.trail.clear();
        }
        if at == self.farthest {
            self.trail.push(reject);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::compiler::Compiler;
    use crate::expr::Expr;
    use crate::types::Ty;

    fn counting_action(counter: &Arc<AtomicUsize>, inner: Expr) -> Expr {
        let counter = counter.clone();
        Expr::action(inner, Ty::Num, "1.0", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Value::Num(1.0)
        })
    }

    #[test]
    fn test_memoization_is_idempotent_and_skips_reevaluation() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut compiler = Compiler::new();
        compiler.register_root("count", counting_action(&counter, Expr::literal("x")));
        let rules = compiler.rules().expect("grammar is fine");
        let id = rules.root("count").expect("root is registered");

        let mut machine = rules.machine("x");
        let first = machine.run(id, 0);
        let second = machine.run(id, 0);
        assert_eq!(first, second);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sequence_short_circuits() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut compiler = Compiler::new();
        compiler.register_root(
            "pair",
            Expr::sequence(vec![
                Expr::literal("x"),
                counting_action(&counter, Expr::literal("y")),
            ]),
        );
        let rules = compiler.rules().expect("grammar is fine");
        let id = rules.root("pair").expect("root is registered");

        let mut machine = rules.machine("zzz");
        let (outcome, _) = machine.run(id, 0);
        assert!(!outcome.ok);
        // The first child failed, so the second child's routine never ran.
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_alternation_orders_reasons_and_does_not_consume() {
        let mut compiler = Compiler::new();
        compiler.register_root(
            "choice",
            Expr::sequence(vec![
                Expr::literal("a"),
                Expr::alternate(vec![Expr::literal("foo"), Expr::literal("bar")]),
            ]),
        );
        let rules = compiler.rules().expect("grammar is fine");
        let alt = rules
            .units()
            .iter()
            .find(|unit| matches!(unit.body, Body::Alternate { .. }))
            .expect("the grammar has one alternation")
            .id;

        let mut machine = rules.machine("aqq");
        let (outcome, _) = machine.run(alt, 1);
        assert!(!outcome.ok);
        assert_eq!(
            outcome.rejects,
            vec![
                Reject::Expected {
                    at: 1,
                    token: "\"foo\"".to_string()
                },
                Reject::Expected {
                    at: 1,
                    token: "\"bar\"".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_lookahead_is_zero_width() {
        let mut compiler = Compiler::new();
        compiler.register_root("ahead", Expr::and(Expr::literal("ab")));
        compiler.register_root("veto", Expr::not(Expr::literal("zz")));
        let rules = compiler.rules().expect("grammar is fine");

        let mut machine = rules.machine("abc");
        let (outcome, value) = machine.run(rules.root("ahead").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 0);
        assert_eq!(value, Value::Text("ab".to_string()));

        let (outcome, value) = machine.run(rules.root("veto").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 0);
        assert_eq!(value, Value::Unit);
    }

    #[test]
    fn test_negative_lookahead_reports_exclusion() {
        let mut compiler = Compiler::new();
        compiler.register_root("veto", Expr::not(Expr::literal("ab")));
        let rules = compiler.rules().expect("grammar is fine");

        let mut machine = rules.machine("abc");
        let (outcome, _) = machine.run(rules.root("veto").unwrap(), 0);
        assert!(!outcome.ok);
        assert_eq!(
            outcome.rejects,
            vec![Reject::Excluded {
                at: 0,
                describe: "\"ab\"".to_string()
            }]
        );
    }

    #[test]
    fn test_star_collects_and_never_fails() {
        let mut compiler = Compiler::new();
        compiler.register_root("many", Expr::star(Expr::literal("ab")));
        let rules = compiler.rules().expect("grammar is fine");

        let mut machine = rules.machine("ababx");
        let (outcome, value) = machine.run(rules.root("many").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 4);
        assert_eq!(value.items().len(), 2);

        let mut machine = rules.machine("x");
        let (outcome, value) = machine.run(rules.root("many").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 0);
        assert_eq!(value, Value::List(vec![]));
    }

    #[test]
    fn test_plus_requires_one_and_propagates_first_failure() {
        let mut compiler = Compiler::new();
        compiler.register_root("some", Expr::plus(Expr::literal("a")));
        let rules = compiler.rules().expect("grammar is fine");

        let mut machine = rules.machine("b");
        let (outcome, _) = machine.run(rules.root("some").unwrap(), 0);
        assert!(!outcome.ok);
        assert_eq!(
            outcome.rejects,
            vec![Reject::Expected {
                at: 0,
                token: "\"a\"".to_string()
            }]
        );

        let mut machine = rules.machine("aaab");
        let (outcome, value) = machine.run(rules.root("some").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 3);
        assert_eq!(value.items().len(), 3);
    }

    #[test]
    fn test_optional_absence_is_not_an_error() {
        let mut compiler = Compiler::new();
        compiler.register_root("maybe", Expr::optional(Expr::literal("x")));
        let rules = compiler.rules().expect("grammar is fine");

        let mut machine = rules.machine("y");
        let (outcome, value) = machine.run(rules.root("maybe").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 0);
        assert_eq!(value, Value::Maybe(None));

        let mut machine = rules.machine("xy");
        let (outcome, value) = machine.run(rules.root("maybe").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 1);
        assert_eq!(value.present().map(Value::text), Some("x"));
    }

    #[test]
    fn test_contents_yields_the_covered_slice() {
        let mut compiler = Compiler::new();
        compiler.register_root("span", Expr::contents(Expr::plus(Expr::literal("ab"))));
        let rules = compiler.rules().expect("grammar is fine");

        let mut machine = rules.machine("ababx");
        let (outcome, value) = machine.run(rules.root("span").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 4);
        assert_eq!(value, Value::Text("abab".to_string()));
    }

    #[test]
    fn test_pattern_is_anchored_at_the_current_offset() {
        let mut compiler = Compiler::new();
        compiler.register_root("digits", Expr::pattern("[0-9]+").expect("pattern is valid"));
        let rules = compiler.rules().expect("grammar is fine");
        let id = rules.root("digits").unwrap();

        let mut machine = rules.machine("ab12");
        let (outcome, _) = machine.run(id, 0);
        assert!(!outcome.ok, "a later match is not acceptable");

        let (outcome, value) = machine.run(id, 2);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 4);
        assert_eq!(value, Value::Text("12".to_string()));
    }

    #[test]
    fn test_literal_end_of_input_policy_is_inclusive() {
        let mut compiler = Compiler::new();
        compiler.register_root("word", Expr::literal("one"));
        compiler.register_root("empty", Expr::literal(""));
        let rules = compiler.rules().expect("grammar is fine");

        // A literal ending exactly at end of input succeeds.
        let mut machine = rules.machine("one");
        let (outcome, _) = machine.run(rules.root("word").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 3);

        // The zero-length literal succeeds at end of input.
        let mut machine = rules.machine("");
        let (outcome, _) = machine.run(rules.root("empty").unwrap(), 0);
        assert!(outcome.ok);
        assert_eq!(outcome.at, 0);
    }

    #[test]
    fn test_resources_build_exactly_once_per_instance() {
        let mut compiler = Compiler::new();
        compiler.register_root("digits", Expr::pattern("[0-9]+").expect("pattern is valid"));
        let rules = compiler.rules().expect("grammar is fine");
        let id = rules.root("digits").unwrap();

        // Wrap every resource builder with a construction counter.
        let counter = Arc::new(AtomicUsize::new(0));
        let mut units = rules.units().to_vec();
        for unit in &mut units {
            for resource in &mut unit.resources {
                let inner = resource.build.clone();
                let counter = counter.clone();
                resource.build = Arc::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    inner()
                });
            }
        }

        let mut machine = Machine::new(&units, "12 345");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        machine.run(id, 0);
        machine.run(id, 0);
        machine.run(id, 3);
        machine.run(id, 5);
        assert_eq!(
            counter.load(Ordering::SeqCst),
            1,
            "invocation count must not rebuild resources"
        );

        // A second instance constructs its own.
        let _other = Machine::new(&units, "9");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
