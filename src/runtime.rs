//! The runtime matching contract.
//!
//! Every compiled match routine — interpreted by the machine or emitted as
//! Rust source — produces an [`Outcome`]: either an advance to a new offset
//! or a failure carrying an ordered list of [`Reject`] reasons. Compound
//! expressions combine outcomes; nothing in the runtime ever panics on a
//! failed match. Only a public entry point converts an unrecovered failure
//! into a [`ParseError`].

use std::fmt;

/// One reason a match routine refused the input.
#[derive(Debug, Clone, PartialEq)]
pub enum Reject {
    /// An unmet positive requirement: `token` was expected at `at`.
    Expected { at: usize, token: String },
    /// A negative lookahead that unexpectedly matched at `at`.
    Excluded { at: usize, describe: String },
}

impl Reject {
    /// Byte offset the reason applies to.
    pub fn at(&self) -> usize {
        match self {
            Reject::Expected { at, .. } | Reject::Excluded { at, .. } => *at,
        }
    }

    /// Human-readable reason line, without the offset.
    pub fn reason(&self) -> String {
        match self {
            Reject::Expected { token, .. } => format!("expected {}", token),
            Reject::Excluded { describe, .. } => format!("but not {}", describe),
        }
    }
}

/// The result of one match attempt: advance or fail with reasons.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Whether the match succeeded.
    pub ok: bool,
    /// End offset on success; meaningless on failure.
    pub at: usize,
    /// Ordered reject reasons on failure; empty on success.
    pub rejects: Vec<Reject>,
}

impl Outcome {
    /// A successful match ending at `at`.
    pub fn success(at: usize) -> Outcome {
        Outcome {
            ok: true,
            at,
            rejects: Vec::new(),
        }
    }

    /// A failed match with the given reasons.
    pub fn failure(rejects: Vec<Reject>) -> Outcome {
        Outcome {
            ok: false,
            at: 0,
            rejects,
        }
    }
}

/// The error a public entry point reports when the root rule does not match
/// the entire input.
///
/// Carries the deepest-reached failure offset and every reason recorded
/// there, in first-seen order. Duplicate reasons are kept in the data and
/// collapsed only when the report renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Deepest byte offset any match attempt failed at.
    pub at: usize,
    /// Reasons recorded at that offset, in evaluation order.
    pub reasons: Vec<Reject>,
}

impl ParseError {
    /// Distinct reason lines in first-seen order.
    pub fn distinct_reasons(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for reject in &self.reasons {
            let line = reject.reason();
            if !seen.contains(&line) {
                seen.push(line);
            }
        }
        seen
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse at offset {}", self.at)?;
        for line in self.distinct_reasons() {
            write!(f, "\n  {}", line)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reasons() {
        let expected = Reject::Expected {
            at: 4,
            token: "\"one\"".to_string(),
        };
        assert_eq!(expected.at(), 4);
        assert_eq!(expected.reason(), "expected \"one\"");

        let excluded = Reject::Excluded {
            at: 0,
            describe: "!(regex \"[0-9]\")".to_string(),
        };
        assert_eq!(excluded.reason(), "but not !(regex \"[0-9]\")");
    }

    #[test]
    fn test_parse_error_display_dedupes_but_data_keeps_duplicates() {
        let duplicate = Reject::Expected {
            at: 2,
            token: "\"a\"".to_string(),
        };
        let error = ParseError {
            at: 2,
            reasons: vec![
                duplicate.clone(),
                Reject::Expected {
                    at: 2,
                    token: "\"b\"".to_string(),
                },
                duplicate,
            ],
        };
        assert_eq!(error.reasons.len(), 3);
        assert_eq!(
            error.to_string(),
            "failed to parse at offset 2\n  expected \"a\"\n  expected \"b\""
        );
    }
}
