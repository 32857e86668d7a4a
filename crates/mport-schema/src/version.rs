//! Version algebra: total order on version strings with epoch/revision,
//! plus requirement predicates.
//!
//! A version string parses to `(epoch, base, revision)`. The suffix `,N`
//! sets the epoch, `_N` sets the revision, and an embedded `<` or `>`
//! truncates the string at that point (guarding against a range expression
//! accidentally ending up embedded in a plain version string).

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A parsed `(epoch, base, revision)` version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    raw: String,
    epoch: i64,
    base: String,
    revision: i64,
}

impl Version {
    /// Parse a version string into its epoch/base/revision components.
    ///
    /// Parsing never fails: inputs that don't carry an epoch or revision
    /// suffix simply get the defaults `epoch = 0`, `revision = 0`.
    pub fn parse(raw: &str) -> Self {
        let mut s = raw;

        // An embedded '<' or '>' truncates the string there.
        if let Some(idx) = s.find(['<', '>']) {
            s = &s[..idx];
        }

        let (s, epoch) = match s.split_once(',') {
            Some((base, epoch_str)) => (base, epoch_str.parse::<i64>().unwrap_or(0)),
            None => (s, 0),
        };

        let (base, revision) = match s.rsplit_once('_') {
            Some((base, rev_str)) if rev_str.chars().all(|c| c.is_ascii_digit()) => {
                (base, rev_str.parse::<i64>().unwrap_or(0))
            }
            _ => (s, 0),
        };

        Self {
            raw: raw.to_string(),
            epoch,
            base: base.to_string(),
            revision,
        }
    }

    /// The original, unparsed version string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The `,N` epoch suffix; 0 when absent.
    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    /// The version string with its epoch and revision suffixes stripped.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// The `_N` revision suffix; 0 when absent.
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Compare two base strings using the lockstep token walk: skip runs of
    /// `.`/`+`, then compare either a maximal decimal run (numerically) or a
    /// single character (by code point). A shorter string is treated as
    /// though padded with zero tokens.
    fn compare_base(a: &str, b: &str) -> Ordering {
        let mut ai = a.char_indices().peekable();
        let mut bi = b.char_indices().peekable();

        loop {
            skip_separators(&mut ai);
            skip_separators(&mut bi);

            let a_tok = next_token(a, &mut ai);
            let b_tok = next_token(b, &mut bi);

            match (a_tok, b_tok) {
                (None, None) => return Ordering::Equal,
                (None, Some(bt)) => {
                    let cmp = Token::Number(0).cmp(&bt);
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                (Some(at), None) => {
                    let cmp = at.cmp(&Token::Number(0));
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
                (Some(at), Some(bt)) => {
                    let cmp = at.cmp(&bt);
                    if cmp != Ordering::Equal {
                        return cmp;
                    }
                }
            }
        }
    }
}

/// A single comparable token: either a numeric run or one code point.
/// Numbers always sort below characters is wrong in general, so we give
/// each variant its own ordering that matches "numeric run vs single char"
/// by comparing within-kind and treating cross-kind by variant order only
/// when the other side is the implicit zero-pad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Number(u64),
    Char(char),
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Token::Number(a), Token::Number(b)) => a.cmp(b),
            (Token::Char(a), Token::Char(b)) => a.cmp(b),
            // Mixed comparisons only arise when padding a shorter string
            // with Number(0); numeric zero-pad sorts below any character.
            (Token::Number(_), Token::Char(_)) => Ordering::Less,
            (Token::Char(_), Token::Number(_)) => Ordering::Greater,
        }
    }
}

fn skip_separators(it: &mut std::iter::Peekable<std::str::CharIndices>) {
    while matches!(it.peek(), Some((_, '.')) | Some((_, '+'))) {
        it.next();
    }
}

fn next_token(s: &str, it: &mut std::iter::Peekable<std::str::CharIndices>) -> Option<Token> {
    let &(start, c) = it.peek()?;
    if c.is_ascii_digit() {
        let mut end = start;
        while let Some(&(idx, ch)) = it.peek() {
            if ch.is_ascii_digit() {
                end = idx + ch.len_utf8();
                it.next();
            } else {
                break;
            }
        }
        let digits = &s[start..end];
        Some(Token::Number(digits.parse().unwrap_or(u64::MAX)))
    } else {
        it.next();
        Some(Token::Char(c))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| Self::compare_base(&self.base, &other.base))
            .then_with(|| self.revision.cmp(&other.revision))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

/// Result of evaluating a requirement predicate against a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementOutcome {
    /// The version matches every bound in the requirement.
    Satisfied,
    /// The version fails at least one bound.
    Unsatisfied,
}

/// A requirement string failed to parse; carries the original input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("malformed version requirement: {0}")]
pub struct ErrMalformedRequirement(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

#[derive(Debug, Clone)]
struct Bound {
    op: RelOp,
    version: Version,
}

/// A parsed requirement: one or two bounds, e.g. `">=2.0"` or
/// `">=1.4.0<1.5"`.
#[derive(Debug, Clone)]
pub struct Requirement {
    bounds: Vec<Bound>,
}

impl Requirement {
    /// Parse a requirement string. The grammar allows up to two of each of
    /// `<`, `>`, `=`, forming one or two `(op, version)` bounds.
    ///
    /// # Errors
    ///
    /// Returns [`ErrMalformedRequirement`] if the string contains no
    /// recognizable operator, an operator with no version following it, or
    /// more than two bounds.
    pub fn parse(s: &str) -> Result<Self, ErrMalformedRequirement> {
        let mut bounds = Vec::new();
        let mut rest = s;

        while !rest.is_empty() {
            let (op, skip) = if let Some(r) = rest.strip_prefix(">=") {
                (RelOp::Ge, rest.len() - r.len())
            } else if let Some(r) = rest.strip_prefix("<=") {
                (RelOp::Le, rest.len() - r.len())
            } else if let Some(r) = rest.strip_prefix('>') {
                (RelOp::Gt, rest.len() - r.len())
            } else if let Some(r) = rest.strip_prefix('<') {
                (RelOp::Lt, rest.len() - r.len())
            } else if let Some(r) = rest.strip_prefix('=') {
                (RelOp::Eq, rest.len() - r.len())
            } else {
                return Err(ErrMalformedRequirement(s.to_string()));
            };

            rest = &rest[skip..];

            // The version portion runs until the next operator or the end.
            let end = rest
                .find(['<', '>', '='])
                .unwrap_or(rest.len());
            let ver_str = &rest[..end];
            if ver_str.is_empty() {
                return Err(ErrMalformedRequirement(s.to_string()));
            }

            bounds.push(Bound {
                op,
                version: Version::parse(ver_str),
            });
            rest = &rest[end..];

            if bounds.len() > 2 {
                return Err(ErrMalformedRequirement(s.to_string()));
            }
        }

        if bounds.is_empty() {
            return Err(ErrMalformedRequirement(s.to_string()));
        }

        Ok(Self { bounds })
    }

    /// Evaluate this requirement against a concrete version.
    pub fn evaluate(&self, version: &Version) -> RequirementOutcome {
        let all_match = self.bounds.iter().all(|b| match b.op {
            RelOp::Lt => version < &b.version,
            RelOp::Le => version <= &b.version,
            RelOp::Gt => version > &b.version,
            RelOp::Ge => version >= &b.version,
            RelOp::Eq => version == &b.version,
        });

        if all_match {
            RequirementOutcome::Satisfied
        } else {
            RequirementOutcome::Unsatisfied
        }
    }
}

/// Convenience: parse `requirement` and evaluate it against `version`,
/// returning an error for malformed requirements instead of a tri-state.
///
/// # Errors
///
/// Returns [`ErrMalformedRequirement`] if `requirement` cannot be parsed.
pub fn satisfies(version: &str, requirement: &str) -> Result<bool, ErrMalformedRequirement> {
    let req = Requirement::parse(requirement)?;
    Ok(req.evaluate(&Version::parse(version)) == RequirementOutcome::Satisfied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_suffix_parses() {
        let v = Version::parse("1.0,5");
        assert_eq!(v.epoch(), 5);
        assert_eq!(v.base(), "1.0");
    }

    #[test]
    fn revision_suffix_parses() {
        let v = Version::parse("1.0_3");
        assert_eq!(v.revision(), 3);
        assert_eq!(v.base(), "1.0");
    }

    #[test]
    fn embedded_range_operator_truncates() {
        let v = Version::parse("1.0>=2.0");
        assert_eq!(v.base(), "1.0");
    }

    #[test]
    fn antisymmetry() {
        let a = Version::parse("1.2.3");
        let b = Version::parse("1.3.0");
        assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    #[test]
    fn transitivity() {
        let a = Version::parse("1.0.0");
        let b = Version::parse("1.5.0");
        let c = Version::parse("2.0.0");
        assert!(a <= b);
        assert!(b <= c);
        assert!(a <= c);
    }

    #[test]
    fn epoch_dominates_base() {
        let a = Version::parse("9.0,0");
        let b = Version::parse("1.0,1");
        assert!(a < b);
    }

    #[test]
    fn numeric_runs_compare_numerically_not_lexically() {
        let a = Version::parse("1.9");
        let b = Version::parse("1.10");
        assert!(a < b, "1.9 should be less than 1.10 numerically");
    }

    #[test]
    fn shorter_string_zero_padded() {
        let a = Version::parse("1.2");
        let b = Version::parse("1.2.0");
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn requirement_single_bound() {
        assert!(satisfies("1.0", ">=1.0").unwrap());
        assert!(!satisfies("1.0", ">1.0").unwrap());
    }

    #[test]
    fn requirement_double_bound() {
        assert!(satisfies("1.4.5", ">=1.4.0<1.5").unwrap());
        assert!(!satisfies("1.5.0", ">=1.4.0<1.5").unwrap());
    }

    #[test]
    fn requirement_malformed() {
        assert!(satisfies("x", "|").is_err());
    }

    #[test]
    fn requirement_too_many_bounds_is_malformed() {
        assert!(Requirement::parse(">=1.0<2.0>3.0").is_err());
    }
}
