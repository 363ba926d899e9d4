//! Rendering a compiled unit set as Rust source.
//!
//! Everything before this module is data: structured bodies addressed by
//! unit identity. This module is the only place that turns those bodies
//! into text, so retargeting the emitter means changing only this file.
//!
//! The emitted module is self-contained: it carries its own runtime support
//! types and depends on nothing from this crate. Units are rendered in
//! identity order and roots in name order, so identical sessions produce
//! byte-identical output.

use std::collections::BTreeSet;

use crate::compiler::{entry_name, RootSpec};
use crate::types::Ty;
use crate::unit::{Body, CompilationUnit, UnitId};

/// Render one generated module named `name` from the closed unit set.
pub(crate) fn module(name: &str, units: &[CompilationUnit], roots: &[RootSpec]) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "//! Parser module `{}`, generated by packgen. Do not edit.\n\
         //!\n\
         //! Parsing is linear time: every (rule, offset) match is computed at\n\
         //! most once per parser instance and cached in that instance's memo\n\
         //! tables.\n\
         #![allow(dead_code)]\n\n",
        name
    ));

    // Deduplicated import list: the runtime support plus whatever the
    // declared resources need.
    let mut imports: BTreeSet<String> = BTreeSet::new();
    imports.insert("std::collections::HashMap".to_string());
    imports.insert("std::fmt".to_string());
    for unit in units {
        for resource in &unit.resources {
            if let Some(import) = &resource.import {
                imports.insert(import.clone());
            }
        }
    }
    for import in &imports {
        out.push_str(&format!("use {};\n", import));
    }
    out.push('\n');

    for root in roots.iter().filter(|root| root.public) {
        out.push_str(&entry_point(root));
        out.push('\n');
    }

    out.push_str(&parser_struct(units));
    out.push('\n');
    out.push_str("impl Parser {\n");
    out.push_str(&constructor(units));
    out.push_str(HELPERS);
    for unit in units {
        out.push('\n');
        out.push_str(&unit_routines(unit, units));
    }
    out.push_str("}\n\n");
    out.push_str(SUPPORT);

    out
}

/// The exported entry point of one public rule: build a fresh parser
/// instance, require the root to cover the whole input, and convert an
/// unrecovered failure into a reported error.
fn entry_point(root: &RootSpec) -> String {
    format!(
        "/// Parse the `{name}` rule against the entire input.\n\
         pub fn parse_{entry}(input: &str) -> Result<{ty}, ParseError> {{\n    \
             let mut parser = Parser::new(input);\n    \
             let (outcome, value) = parser.{id}(0);\n    \
             if outcome.ok && outcome.at == input.len() {{\n        \
                 return Ok(value);\n    \
             }}\n    \
             Err(parser.report(&outcome))\n\
         }}\n",
        name = root.name,
        entry = entry_name(&root.name),
        ty = root.ty.rust_name(),
        id = root.id,
    )
}

/// The parser instance: input, farthest-failure trail, one memo table per
/// unit, one field per declared resource.
fn parser_struct(units: &[CompilationUnit]) -> String {
    let mut out = String::new();
    out.push_str("pub struct Parser {\n");
    out.push_str("    input: String,\n");
    out.push_str("    farthest: usize,\n");
    out.push_str("    trail: Vec<Reject>,\n");
    for unit in units {
        out.push_str(&format!(
            "    memo_{id}: HashMap<usize, (Outcome, {ty})>,\n",
            id = unit.id,
            ty = unit.result.rust_name(),
        ));
    }
    for unit in units {
        for (slot, resource) in unit.resources.iter().enumerate() {
            out.push_str(&format!(
                "    res_{id}_{slot}: {ty},\n",
                id = unit.id,
                slot = slot,
                ty = resource.rust_type,
            ));
        }
    }
    out.push_str("}\n");
    out
}

/// `Parser::new`: memo tables start empty, resources are constructed here
/// exactly once per instance.
fn constructor(units: &[CompilationUnit]) -> String {
    let mut out = String::new();
    out.push_str("    pub fn new(input: &str) -> Parser {\n        Parser {\n");
    out.push_str("            input: input.to_string(),\n");
    out.push_str("            farthest: 0,\n");
    out.push_str("            trail: Vec::new(),\n");
    for unit in units {
        out.push_str(&format!("            memo_{}: HashMap::new(),\n", unit.id));
    }
    for unit in units {
        for (slot, resource) in unit.resources.iter().enumerate() {
            out.push_str(&format!(
                "            res_{id}_{slot}: {init},\n",
                id = unit.id,
                slot = slot,
                init = resource.init,
            ));
        }
    }
    out.push_str("        }\n    }\n");
    out
}

/// The memoized wrapper plus the raw body of one unit, the body preceded
/// by the node's diagnostic description.
fn unit_routines(unit: &CompilationUnit, units: &[CompilationUnit]) -> String {
    let ty = unit.result.rust_name();
    let mut out = String::new();
    out.push_str(&format!(
        "    fn {id}(&mut self, here: usize) -> (Outcome, {ty}) {{\n        \
             if let Some(cached) = self.memo_{id}.get(&here) {{\n            \
                 return cached.clone();\n        \
             }}\n        \
             let pair = self.d_{id}(here);\n        \
             self.memo_{id}.insert(here, pair.clone());\n        \
             pair\n    \
         }}\n\n",
        id = unit.id,
        ty = ty,
    ));
    out.push_str(&format!("    // {}\n", unit.describe.replace('\n', " ")));
    out.push_str(&format!(
        "    fn d_{id}(&mut self, here: usize) -> (Outcome, {ty}) {{\n",
        id = unit.id,
        ty = ty,
    ));
    out.push_str(&body(unit, units));
    out.push_str("    }\n");
    out
}

fn result_of(units: &[CompilationUnit], id: UnitId) -> &Ty {
    &units[id.index()].result
}

/// A tuple expression over the given element expressions, with the
/// single-element trailing comma.
fn tuple(parts: &[String]) -> String {
    match parts.len() {
        0 => "()".to_string(),
        1 => format!("({},)", parts[0]),
        _ => format!("({})", parts.join(", ")),
    }
}

/// The statements of one raw body. Semantics mirror the evaluation
/// machine exactly; see that module for the contract each operation obeys.
fn body(unit: &CompilationUnit, units: &[CompilationUnit]) -> String {
    let zero = unit.result.rust_zero();
    match &unit.body {
        Body::Literal { text } => {
            let token = format!("{:?}", format!("{:?}", text));
            format!(
                "        if !self.input[here..].starts_with({text:?}) {{\n            \
                     return (self.reject_expected(here, {token}), String::new());\n        \
                 }}\n        \
                 (Outcome::success(here + {len}), {text:?}.to_string())\n",
                text = text,
                token = token,
                len = text.len(),
            )
        }
        Body::Sequence { children } => {
            if children.is_empty() {
                return "        (Outcome::success(here), ())\n".to_string();
            }
            let mut out = String::from("        let mut here = here;\n");
            let mut fields = Vec::new();
            for (index, child) in children.iter().enumerate() {
                out.push_str(&format!(
                    "        let (o{index}, v{index}) = self.{child}(here);\n        \
                         if !o{index}.ok {{\n            \
                             return (o{index}, {zero});\n        \
                         }}\n        \
                         here = o{index}.at;\n",
                    index = index,
                    child = child,
                    zero = zero,
                ));
                fields.push(format!("v{}", index));
            }
            out.push_str(&format!(
                "        (Outcome::success(here), {})\n",
                tuple(&fields)
            ));
            out
        }
        Body::Alternate { children } => {
            let mut out = String::from("        let mut rejects: Vec<Reject> = Vec::new();\n");
            for child in children {
                out.push_str(&format!(
                    "        let (outcome, value) = self.{child}(here);\n        \
                         if outcome.ok {{\n            \
                             return (outcome, value);\n        \
                         }}\n        \
                         rejects.extend(outcome.rejects);\n",
                    child = child,
                ));
            }
            out.push_str(&format!(
                "        (Outcome::failure(rejects), {})\n",
                zero
            ));
            out
        }
        Body::Star { child } => {
            let element = result_of(units, *child).rust_name();
            format!(
                "        let mut here = here;\n        \
                 let mut items: Vec<{element}> = Vec::new();\n        \
                 loop {{\n            \
                     let (outcome, value) = self.{child}(here);\n            \
                     if !outcome.ok {{\n                \
                         return (Outcome::success(here), items);\n            \
                     }}\n            \
                     here = outcome.at;\n            \
                     items.push(value);\n        \
                 }}\n",
                element = element,
                child = child,
            )
        }
        Body::Plus { child } => {
            let element = result_of(units, *child).rust_name();
            format!(
                "        let (first, value) = self.{child}(here);\n        \
                 if !first.ok {{\n            \
                     return (first, Vec::new());\n        \
                 }}\n        \
                 let mut here = first.at;\n        \
                 let mut items: Vec<{element}> = vec![value];\n        \
                 loop {{\n            \
                     let (outcome, value) = self.{child}(here);\n            \
                     if !outcome.ok {{\n                \
                         return (Outcome::success(here), items);\n            \
                     }}\n            \
                     here = outcome.at;\n            \
                     items.push(value);\n        \
                 }}\n",
                element = element,
                child = child,
            )
        }
        Body::Optional { child } => format!(
            "        let (outcome, value) = self.{child}(here);\n        \
             if outcome.ok {{\n            \
                 return (Outcome::success(outcome.at), Some(value));\n        \
             }}\n        \
             (Outcome::success(here), None)\n",
            child = child,
        ),
        Body::Not { child, describe } => {
            let describe = format!("{:?}", describe);
            format!(
                "        let (outcome, _) = self.{child}(here);\n        \
                 if outcome.ok {{\n            \
                     return (self.reject_excluded(here, {describe}), ());\n        \
                 }}\n        \
                 (Outcome::success(here), ())\n",
                child = child,
                describe = describe,
            )
        }
        Body::And { child } => format!(
            "        let (outcome, value) = self.{child}(here);\n        \
             if !outcome.ok {{\n            \
                 return (outcome, {zero});\n        \
             }}\n        \
             (Outcome::success(here), value)\n",
            child = child,
            zero = zero,
        ),
        Body::Pattern { source } => {
            let token = format!("{:?}", format!("regex {:?}", source));
            format!(
                "        let found = self\n            \
                     .res_{id}_0\n            \
                     .find(&self.input[here..])\n            \
                     .map(|m| (here + m.end(), m.as_str().to_string()));\n        \
                 match found {{\n            \
                     Some((end, text)) => (Outcome::success(end), text),\n            \
                     None => (self.reject_expected(here, {token}), String::new()),\n        \
                 }}\n",
                id = unit.id,
                token = token,
            )
        }
        Body::Contents { child } => format!(
            "        let (outcome, _) = self.{child}(here);\n        \
             if !outcome.ok {{\n            \
                 return (outcome, String::new());\n        \
             }}\n        \
             let text = self.input[here..outcome.at].to_string();\n        \
             (Outcome::success(outcome.at), text)\n",
            child = child,
        ),
        Body::Action { child, source, .. } => {
            let arg = result_of(units, *child).rust_name();
            format!(
                "        let (outcome, value) = self.{child}(here);\n        \
                 if !outcome.ok {{\n            \
                     return (outcome, {zero});\n        \
                 }}\n        \
                 let answer = (|arg: {arg}| -> {ret} {{ {source} }})(value);\n        \
                 (outcome, answer)\n",
                child = child,
                zero = zero,
                arg = arg,
                ret = unit.result.rust_name(),
                source = source,
            )
        }
        Body::Delegate { target } => format!("        self.{}(here)\n", target),
    }
}

/// Failure bookkeeping shared by every generated body: primitive failure
/// sites record into the farthest trail, and `report` turns the trail into
/// the entry point's error.
const HELPERS: &str = "
    fn reject_expected(&mut self, at: usize, token: &str) -> Outcome {
        let reject = Reject::Expected {
            at,
            token: token.to_string(),
        };
        self.record(reject.clone());
        Outcome::failure(vec![reject])
    }

    fn reject_excluded(&mut self, at: usize, describe: &str) -> Outcome {
        let reject = Reject::Excluded {
            at,
            describe: describe.to_string(),
        };
        self.record(reject.clone());
        Outcome::failure(vec![reject])
    }

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

    fn report(&self, outcome: &Outcome) -> ParseError {
        if outcome.ok {
            if self.farthest >= outcome.at && !self.trail.is_empty() {
                return ParseError {
                    at: self.farthest,
                    reasons: self.trail.clone(),
                };
            }
            return ParseError {
                at: outcome.at,
                reasons: vec![Reject::Expected {
                    at: outcome.at,
                    token: \"end of input\".to_string(),
                }],
            };
        }
        if !self.trail.is_empty() {
            return ParseError {
                at: self.farthest,
                reasons: self.trail.clone(),
            };
        }
        ParseError {
            at: 0,
            reasons: outcome.rejects.clone(),
        }
    }
";

/// Runtime support types carried inside every generated module.
const SUPPORT: &str = "/// One reason a match routine refused the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Reject {
    Expected { at: usize, token: String },
    Excluded { at: usize, describe: String },
}

impl Reject {
    fn at(&self) -> usize {
        match self {
            Reject::Expected { at, .. } | Reject::Excluded { at, .. } => *at,
        }
    }

    fn reason(&self) -> String {
        match self {
            Reject::Expected { token, .. } => format!(\"expected {}\", token),
            Reject::Excluded { describe, .. } => format!(\"but not {}\", describe),
        }
    }
}

/// The result of one match attempt: advance or fail with reasons.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    pub ok: bool,
    pub at: usize,
    pub rejects: Vec<Reject>,
}

impl Outcome {
    fn success(at: usize) -> Outcome {
        Outcome {
            ok: true,
            at,
            rejects: Vec::new(),
        }
    }

    fn failure(rejects: Vec<Reject>) -> Outcome {
        Outcome {
            ok: false,
            at: 0,
            rejects,
        }
    }
}

/// Reported when an entry point fails: the deepest-reached failure offset
/// and every distinct reason recorded there, one per line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub at: usize,
    pub reasons: Vec<Reject>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, \"failed to parse at offset {}\", self.at)?;
        let mut seen: Vec<String> = Vec::new();
        for reject in &self.reasons {
            let line = reject.reason();
            if !seen.contains(&line) {
                write!(f, \"\\n  {}\", line)?;
                seen.push(line);
            }
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
";
