//! Compilation units: identities, structured bodies, and side resources.
//!
//! Compilation lowers every distinct expression node to one
//! [`CompilationUnit`] — an identity, a result type, a structured body
//! (operation plus operand identities, never pre-rendered text), the
//! resources the node needs once per parser instance, and a diagnostic
//! description. Rendering to Rust source happens later and elsewhere;
//! everything here is data the machine can execute directly.

use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::expr::ActionFn;
use crate::types::Ty;

/// Stable identity of one compilation unit within a session.
///
/// Identities are minted monotonically and are the only addressing
/// mechanism generated bodies use to call one unit from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    /// Index into the session's unit table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// A side-artifact constructed once per parser instance and read-only
/// thereafter, such as a compiled pattern matcher.
#[derive(Clone)]
pub struct Resource {
    /// Import the generated module needs for this resource, if any.
    pub(crate) import: Option<String>,
    /// Rust type of the generated parser field.
    pub(crate) rust_type: String,
    /// Rust expression constructing the resource in `Parser::new`.
    pub(crate) init: String,
    /// Builder the machine calls once at instance construction.
    pub(crate) build: Arc<dyn Fn() -> RuntimeResource + Send + Sync>,
}

impl Resource {
    /// The compiled-pattern resource of a regex atom. `anchored` is the
    /// pattern source already wrapped to match at the start of its input.
    pub fn pattern(anchored: &str, compiled: Regex) -> Resource {
        Resource {
            import: Some("regex::Regex".to_string()),
            rust_type: "Regex".to_string(),
            init: format!(
                "Regex::new({:?}).expect(\"pattern validated during grammar construction\")",
                anchored
            ),
            build: Arc::new(move || RuntimeResource::Pattern(compiled.clone())),
        }
    }

    /// Construct the runtime form of this resource.
    pub fn construct(&self) -> RuntimeResource {
        (self.build)()
    }
}

// Manual impl: the builder closure has no useful rendering.
impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("rust_type", &self.rust_type)
            .field("init", &self.init)
            .finish()
    }
}

/// The constructed, per-instance form of a [`Resource`].
pub enum RuntimeResource {
    Pattern(Regex),
}

/// The structured body of one compilation unit: an operation over operand
/// identities. The renderer turns this into Rust source; the machine
/// interprets it directly.
#[derive(Debug, Clone)]
pub enum Body {
    Literal { text: String },
    Sequence { children: Vec<UnitId> },
    Alternate { children: Vec<UnitId> },
    Star { child: UnitId },
    Plus { child: UnitId },
    Optional { child: UnitId },
    Not { child: UnitId, describe: String },
    And { child: UnitId },
    /// The matcher lives in the unit's resource slot 0; `source` is the
    /// user-written pattern, used in diagnostics.
    Pattern { source: String },
    Contents { child: UnitId },
    Action { child: UnitId, source: String, apply: ActionFn },
    /// A rule's thin wrapper around its compiled expression.
    Delegate { target: UnitId },
}

/// The compiled record of one expression node.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub id: UnitId,
    pub result: Ty,
    pub body: Body,
    pub resources: Vec<Resource>,
    pub describe: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_display_and_index() {
        let id = UnitId(7);
        assert_eq!(id.to_string(), "m7");
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn test_pattern_resource_builds_a_matcher() {
        let compiled = Regex::new(r"\A(?:[0-9]+)").unwrap();
        let resource = Resource::pattern(r"\A(?:[0-9]+)", compiled);
        assert_eq!(resource.rust_type, "Regex");
        assert!(resource.init.contains("Regex::new"));
        assert_eq!(resource.import.as_deref(), Some("regex::Regex"));
        let RuntimeResource::Pattern(re) = resource.construct();
        assert!(re.is_match("42"));
        assert!(!re.is_match("x42"));
    }
}
