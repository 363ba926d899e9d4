//! Result-type synthesis for grammar expressions.
//!
//! Every expression node reports a `Ty` describing the value its compiled
//! match routine yields on success. Types are structural: sequences become
//! records (tuples), repetition becomes lists, optionality becomes options.
//! The same `Ty` drives both the type-agreement check across alternation
//! branches and the emitted Rust type syntax.

use std::fmt;

/// The synthesized result type of a grammar expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ty {
    /// No interesting value (negative lookahead).
    Unit,
    /// A piece of matched input text.
    Text,
    /// A number produced by a semantic action.
    Num,
    /// Zero or more values of the element type (star/plus).
    List(Box<Ty>),
    /// A possibly absent value (optional).
    Option(Box<Ty>),
    /// One typed field per sequence child, in order.
    Record(Vec<Ty>),
}

impl Ty {
    pub fn list(element: Ty) -> Ty {
        Ty::List(Box::new(element))
    }

    pub fn option(element: Ty) -> Ty {
        Ty::Option(Box::new(element))
    }

    /// Rust type syntax for this type, as emitted into generated code.
    ///
    /// Records render as tuples; the single-field record keeps the trailing
    /// comma Rust requires (`(f64,)`).
    pub fn rust_name(&self) -> String {
        match self {
            Ty::Unit => "()".to_string(),
            Ty::Text => "String".to_string(),
            Ty::Num => "f64".to_string(),
            Ty::List(element) => format!("Vec<{}>", element.rust_name()),
            Ty::Option(element) => format!("Option<{}>", element.rust_name()),
            Ty::Record(fields) => match fields.len() {
                0 => "()".to_string(),
                1 => format!("({},)", fields[0].rust_name()),
                _ => {
                    let names: Vec<String> = fields.iter().map(Ty::rust_name).collect();
                    format!("({})", names.join(", "))
                }
            },
        }
    }

    /// Rust expression producing the zero value of this type.
    ///
    /// Semantic actions yield this on failure, and compound bodies use it
    /// for the value slot of a failed match.
    pub fn rust_zero(&self) -> String {
        match self {
            Ty::Unit => "()".to_string(),
            Ty::Text => "String::new()".to_string(),
            Ty::Num => "0.0".to_string(),
            Ty::List(_) => "Vec::new()".to_string(),
            Ty::Option(_) => "None".to_string(),
            Ty::Record(fields) => match fields.len() {
                0 => "()".to_string(),
                1 => format!("({},)", fields[0].rust_zero()),
                _ => {
                    let zeros: Vec<String> = fields.iter().map(Ty::rust_zero).collect();
                    format!("({})", zeros.join(", "))
                }
            },
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rust_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_names() {
        assert_eq!(Ty::Unit.rust_name(), "()");
        assert_eq!(Ty::Text.rust_name(), "String");
        assert_eq!(Ty::Num.rust_name(), "f64");
    }

    #[test]
    fn test_compound_names() {
        assert_eq!(Ty::list(Ty::Text).rust_name(), "Vec<String>");
        assert_eq!(Ty::option(Ty::Num).rust_name(), "Option<f64>");
        assert_eq!(
            Ty::Record(vec![Ty::Num, Ty::Text, Ty::Num]).rust_name(),
            "(f64, String, f64)"
        );
    }

    #[test]
    fn test_single_field_record_keeps_trailing_comma() {
        assert_eq!(Ty::Record(vec![Ty::Num]).rust_name(), "(f64,)");
        assert_eq!(Ty::Record(vec![Ty::Num]).rust_zero(), "(0.0,)");
    }

    #[test]
    fn test_empty_record_is_unit() {
        assert_eq!(Ty::Record(vec![]).rust_name(), "()");
        assert_eq!(Ty::Record(vec![]).rust_zero(), "()");
    }

    #[test]
    fn test_zero_expressions() {
        assert_eq!(Ty::Text.rust_zero(), "String::new()");
        assert_eq!(Ty::list(Ty::Num).rust_zero(), "Vec::new()");
        assert_eq!(Ty::option(Ty::Text).rust_zero(), "None");
        assert_eq!(
            Ty::Record(vec![Ty::Num, Ty::Text]).rust_zero(),
            "(0.0, String::new())"
        );
    }
}
