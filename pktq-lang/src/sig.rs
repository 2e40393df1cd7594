//! Textual type signatures.
//!
//! A signature is a sequence of arrow-separated tokens, e.g.
//! `Int -> Buf -> Action Buf`. Parentheses nest, so a function-valued
//! parameter such as `(Buf -> Action Buf)` is a single token. A bare token
//! starting with a lowercase letter is a universal type variable and is
//! equal to any token.

use core::fmt;

use itertools::{EitherOrBoth, Itertools};

/// Signature parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    /// The signature is empty or made of blank tokens.
    #[error("empty signature")]
    Empty,
    /// A parenthesis is left open or closed twice.
    #[error("unbalanced parentheses")]
    Unbalanced,
}

/// A parsed type signature borrowing its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> Signature<'a> {
    /// Parse `source`, splitting on top-level `->` arrows.
    pub fn parse(source: &'a str) -> Result<Self, SignatureError> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        let mut start = 0usize;
        let bytes = source.as_bytes();

        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => depth = depth.checked_sub(1).ok_or(SignatureError::Unbalanced)?,
                b'-' if depth == 0 && bytes.get(i + 1) == Some(&b'>') => {
                    tokens.push(source[start..i].trim());
                    start = i + 2;
                    i += 1;
                }
                _ => {}
            }
            i += 1;
        }
        if depth != 0 {
            return Err(SignatureError::Unbalanced);
        }
        tokens.push(source[start..].trim());

        if tokens.iter().any(|t| t.is_empty()) {
            return Err(SignatureError::Empty);
        }
        Ok(Self { tokens })
    }

    /// Number of arrow-separated tokens.
    pub fn arity(&self) -> usize {
        self.tokens.len()
    }

    /// Drop the first `nargs` argument types, the signature of the function
    /// with that many arguments already applied. Fails when nothing would
    /// remain.
    pub fn bind(&self, nargs: usize) -> Option<Signature<'a>> {
        if nargs >= self.tokens.len() {
            return None;
        }
        Some(Self {
            tokens: self.tokens[nargs..].to_vec(),
        })
    }

    /// Equality modulo type variables.
    pub fn equal(&self, other: &Signature<'_>) -> bool {
        self.tokens.len() == other.tokens.len()
            && self
                .tokens
                .iter()
                .zip(other.tokens.iter())
                .all(|(a, b)| token_equal(a, b))
    }
}

impl fmt::Display for Signature<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.iter().format(" -> "))
    }
}

/// A bare lowercase word with no further structure.
fn is_type_var(word: &str) -> bool {
    word.starts_with(|c: char| c.is_ascii_lowercase())
        && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn token_equal(a: &str, b: &str) -> bool {
    if is_type_var(a) || is_type_var(b) {
        return true;
    }

    // Function-valued tokens compare structurally.
    let pa = a.strip_prefix('(').and_then(|s| s.strip_suffix(')'));
    let pb = b.strip_prefix('(').and_then(|s| s.strip_suffix(')'));
    match (pa, pb) {
        (Some(ia), Some(ib)) => {
            return match (Signature::parse(ia), Signature::parse(ib)) {
                (Ok(sa), Ok(sb)) => sa.equal(&sb),
                _ => false,
            };
        }
        (Some(_), None) | (None, Some(_)) => return false,
        (None, None) => {}
    }

    // Multi-word constructors ("Action Buf") compare word-wise.
    a.split_whitespace()
        .zip_longest(b.split_whitespace())
        .all(|pair| match pair {
            EitherOrBoth::Both(wa, wb) => wa == wb || is_type_var(wa) || is_type_var(wb),
            _ => false,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    fn sig(s: &str) -> Signature<'_> {
        Signature::parse(s).expect("well-formed signature")
    }

    #[test]
    fn equal_modulo_type_variables() {
        assert!(sig("Buf -> Action Buf").equal(&sig("a -> Action a")));
        assert!(!sig("Buf -> Bool").equal(&sig("Buf -> Action Buf")));
    }

    #[test]
    fn bind_drops_leading_arguments() {
        let bound = sig("Int -> Buf -> Action Buf").bind(1).unwrap();
        assert!(bound.equal(&sig("Buf -> Action Buf")));
        assert_eq!(bound.to_string(), "Buf -> Action Buf");
    }

    #[test]
    fn bind_past_arity_fails() {
        assert!(sig("Buf -> Bool").bind(2).is_none());
        assert!(sig("Buf -> Bool").bind(5).is_none());
    }

    #[test]
    fn function_tokens_nest() {
        let s = sig("(Buf -> Action Buf) -> Buf -> Action Buf");
        assert_eq!(s.arity(), 3);
        assert!(s.bind(1).unwrap().equal(&sig("Buf -> Action Buf")));

        let par = sig("(Buf -> Action Buf) -> (Buf -> Action Buf) -> Buf -> Action Buf");
        assert_eq!(par.arity(), 4);
    }

    #[test]
    fn parenthesized_tokens_compare_structurally() {
        assert!(sig("(Buf -> Bool) -> Buf").equal(&sig("(a -> Bool) -> Buf")));
        assert!(!sig("(Buf -> Bool) -> Buf").equal(&sig("(Buf -> Int) -> Buf")));
        assert!(sig("(Buf -> Bool) -> Buf").equal(&sig("f -> Buf")));
    }

    #[test]
    fn unbalanced_rejected() {
        assert_eq!(
            Signature::parse("(Buf -> Bool -> Buf"),
            Err(SignatureError::Unbalanced)
        );
        assert_eq!(Signature::parse("Buf -> "), Err(SignatureError::Empty));
    }

    #[quickcheck]
    fn bind_reduces_arity(tokens: Vec<bool>, k: usize) -> bool {
        // Build an arity = tokens.len() + 1 signature out of two spellings.
        let text = tokens
            .iter()
            .map(|t| if *t { "Int" } else { "Buf" })
            .chain(core::iter::once("Bool"))
            .collect::<Vec<_>>()
            .join(" -> ");
        let s = sig(&text);
        match s.bind(k) {
            Some(b) => b.arity() == s.arity() - k,
            None => k >= s.arity(),
        }
    }
}
