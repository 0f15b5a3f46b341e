//! Dewey version comparison: runs of digits compared
//! numerically, non-digit runs compared lexically, `_<revision>` compared
//! numerically as a final key. Named after the comparison scheme from
//! NetBSD `pkg_install`.

use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Num(u128),
    Str(&'a str),
}

fn tokenize(s: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let is_digit = bytes[i].is_ascii_digit();
        while i < bytes.len() && bytes[i].is_ascii_digit() == is_digit {
            i += 1;
        }
        let part = &s[start..i];
        out.push(if is_digit {
                Token::Num(part.parse().unwrap_or(u128::MAX))
            } else {
                Token::Str(part)
        });
    }
    out
}

fn compare_token(a: Token, b: Token) -> Ordering {
    match (a, b) {
        (Token::Num(x), Token::Num(y)) => x.cmp(&y),
        (Token::Str(x), Token::Str(y)) => x.cmp(y),
        // A digit run outranks an alpha run at the same position. Not
        // codified anywhere explicitly; this follows common practice among
        // dewey-derived version comparators (e.g. rpm's vercmp).
        (Token::Num(_), Token::Str(_)) => Ordering::Greater,
        (Token::Str(_), Token::Num(_)) => Ordering::Less,
    }
}

/// Compares two plain version strings (no `_<revision>` suffix), component
/// by component.
pub(crate) fn compare_version_strings(a: &str, b: &str) -> Ordering {
    let (ta, tb) = (tokenize(a), tokenize(b));
    let mut ai = ta.into_iter();
    let mut bi = tb.into_iter();
    loop {
        match (ai.next(), bi.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => match compare_token(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
        }
    }
}

/// Compares `a_ver`/`a_rev` (always-present, from an installed/candidate
/// pkgver) against `b_ver`/`b_rev` (from a dependency constraint, where the
/// revision is optional: when absent, the constraint matches any revision
/// of an otherwise-equal version).
pub(crate) fn compare_full(a_ver: &str, a_rev: u64, b_ver: &str, b_rev: Option<u64>) -> Ordering {
    match compare_version_strings(a_ver, b_ver) {
        Ordering::Equal => match b_rev {
            Some(rev) => a_rev.cmp(&rev),
            None => Ordering::Equal,
        },
        other => other,
    }
}

/// Splits `<version>_<revision>` into its parts; if there is no numeric
/// `_<revision>` suffix, the whole string is the version and the revision
/// is `0`.
pub(crate) fn split_version_revision(s: &str) -> (&str, u64) {
    if let Some((ver, rev)) = s.rsplit_once('_') {
        if !rev.is_empty() && rev.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(rev) = rev.parse() {
                return (ver, rev);
            }
        }
    }
    (s, 0)
}

#[cfg(test)]
#[path = "dewey.test.rs"]
mod test;
