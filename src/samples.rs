//! Ready-made sample grammars.
//!
//! These exercise every expression variant and double as the grammars the
//! `packgen` binary can emit. Integration tests run them end to end on the
//! evaluation machine.

use crate::compiler::Compiler;
use crate::error::CompileError;
use crate::expr::Expr;
use crate::types::Ty;
use crate::value::Value;

/// Sums of the spelled-out numbers one through four: `one+two+three`.
///
/// `sum` is right-recursive through a root reference, and the public
/// `Expression` root is itself a bare reference.
pub fn arithmetic() -> Compiler {
    let mut compiler = Compiler::new();

    let numbers: [(&str, f64); 4] = [("one", 1.0), ("two", 2.0), ("three", 3.0), ("four", 4.0)];
    for (name, number) in numbers {
        compiler.register_root(
            name,
            Expr::action(
                Expr::literal(name),
                Ty::Num,
                format!("{:?}", number),
                move |_| Value::Num(number),
            ),
        );
    }

    compiler.register_root(
        "number",
        Expr::alternate(vec![
            Expr::root("one", Ty::Num),
            Expr::root("two", Ty::Num),
            Expr::root("three", Ty::Num),
            Expr::root("four", Ty::Num),
        ]),
    );

    compiler.register_root(
        "sum",
        Expr::alternate(vec![
            Expr::action(
                Expr::sequence(vec![
                    Expr::root("number", Ty::Num),
                    Expr::literal("+"),
                    Expr::root("sum", Ty::Num),
                ]),
                Ty::Num,
                "arg.0 + arg.2",
                |arg| Value::Num(arg.items()[0].num() + arg.items()[2].num()),
            ),
            Expr::root("number", Ty::Num),
        ]),
    );

    compiler.register_root("Expression", Expr::root("sum", Ty::Num));
    compiler
}

/// Comma-separated words plus digit runs: patterns, repetition, optional,
/// span capture, and both lookaheads.
pub fn word_list() -> Result<Compiler, CompileError> {
    let mut compiler = Compiler::new();

    compiler.register_root("space", Expr::pattern(r"\s*")?);

    compiler.register_root(
        "word",
        Expr::action(
            Expr::sequence(vec![
                Expr::root("space", Ty::Text),
                Expr::pattern("[A-Za-z]+")?,
            ]),
            Ty::Text,
            "arg.1",
            |arg| Value::Text(arg.items()[1].text().to_string()),
        ),
    );

    compiler.register_root(
        "tail",
        Expr::action(
            Expr::sequence(vec![
                Expr::root("space", Ty::Text),
                Expr::literal(","),
                Expr::root("word", Ty::Text),
            ]),
            Ty::Text,
            "arg.2",
            |arg| Value::Text(arg.items()[2].text().to_string()),
        ),
    );

    // word ("," word)* ","? whitespace, and nothing may remain.
    compiler.register_root(
        "Words",
        Expr::action(
            Expr::sequence(vec![
                Expr::root("word", Ty::Text),
                Expr::star(Expr::root("tail", Ty::Text)),
                Expr::optional(Expr::literal(",")),
                Expr::root("space", Ty::Text),
                Expr::not(Expr::pattern(".")?),
            ]),
            Ty::list(Ty::Text),
            "{ let mut all = vec![arg.0]; all.extend(arg.1); all }",
            |arg| {
                let fields = arg.items();
                let mut all = vec![fields[0].clone()];
                all.extend(fields[1].items().iter().cloned());
                Value::List(all)
            },
        ),
    );

    compiler.register_root(
        "Digits",
        Expr::action(
            Expr::sequence(vec![
                Expr::and(Expr::pattern("[0-9]")?),
                Expr::contents(Expr::plus(Expr::pattern("[0-9]")?)),
            ]),
            Ty::Text,
            "arg.1",
            |arg| Value::Text(arg.items()[1].text().to_string()),
        ),
    );

    Ok(compiler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_compiles_clean() {
        let rules = arithmetic().rules().expect("sample grammar is valid");
        assert!(rules.root("Expression").is_some());
        assert!(rules.roots().iter().any(|root| root.public));
    }

    #[test]
    fn test_word_list_compiles_clean() {
        let compiler = word_list().expect("patterns are valid");
        let rules = compiler.rules().expect("sample grammar is valid");
        assert!(rules.root("Words").is_some());
        assert!(rules.root("Digits").is_some());
    }
}
