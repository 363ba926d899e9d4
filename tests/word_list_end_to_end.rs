//! End-to-end tests of the word-list sample grammar: patterns, repetition,
//! optional, span capture, and both lookaheads.

use packgen::samples;
use packgen::{RuleSet, Value};

fn rules() -> RuleSet {
    samples::word_list()
        .expect("sample patterns are valid")
        .rules()
        .expect("sample grammar is valid")
}

#[test]
fn test_words_with_mixed_spacing() {
    let value = rules()
        .parse("Words", "alpha, beta,gamma")
        .expect("list parses");
    let words: Vec<&str> = value.items().iter().map(Value::text).collect();
    assert_eq!(words, vec!["alpha", "beta", "gamma"]);
}

#[test]
fn test_single_word() {
    let value = rules().parse("Words", "solo").expect("one word parses");
    let words: Vec<&str> = value.items().iter().map(Value::text).collect();
    assert_eq!(words, vec!["solo"]);
}

#[test]
fn test_trailing_comma_is_optional() {
    let value = rules().parse("Words", "a, b,").expect("trailing comma is fine");
    assert_eq!(value.items().len(), 2);
}

#[test]
fn test_trailing_whitespace_is_consumed() {
    let value = rules().parse("Words", "a, b  ").expect("trailing space is fine");
    assert_eq!(value.items().len(), 2);
}

#[test]
fn test_double_comma_is_rejected() {
    let error = rules()
        .parse("Words", "alpha,,beta")
        .err()
        .expect("an empty item cannot parse");
    assert_eq!(error.at, 6);
}

#[test]
fn test_digits_span_capture() {
    let value = rules().parse("Digits", "12345").expect("digits parse");
    assert_eq!(value, Value::Text("12345".to_string()));
}

#[test]
fn test_digits_stop_at_first_nondigit() {
    let error = rules()
        .parse("Digits", "12a")
        .err()
        .expect("trailing letter is not consumed");
    assert_eq!(error.at, 2);
}

#[test]
fn test_digits_require_a_leading_digit() {
    let error = rules()
        .parse("Digits", "x1")
        .err()
        .expect("positive lookahead fails");
    assert_eq!(error.at, 0);
}
