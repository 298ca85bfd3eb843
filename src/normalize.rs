//! Text → token set normalization.
//!
//! Content is compared as a bag of words: markup, whitespace, case,
//! punctuation and Unicode compatibility variants must not matter, but
//! vocabulary must. The steps run in a fixed order:
//!
//! 1. NFKC normalization (`²` → `2`, `ﬁ` → `fi`, full-width → ASCII)
//! 2. lowercase
//! 3. every character that is neither a word character nor whitespace
//!    becomes a space
//! 4. every digit becomes a token of its own (`500mg` → `5 0 0 mg`), so
//!    numbers compare as the set of digits they contain
//! 5. split on whitespace into a set

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

/// Unordered set of normalized tokens. Ordered storage keeps diagnostics
/// stable between runs.
pub type TokenSet = BTreeSet<String>;

fn symbol_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

fn digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d").expect("static regex"))
}

pub fn normalize(text: &str) -> TokenSet {
    if text.is_empty() {
        return TokenSet::new();
    }

    let text: String = text.nfkc().collect();
    let text = text.to_lowercase();
    let text = symbol_re().replace_all(&text, " ");
    let text = digit_re().replace_all(&text, " $0 ");

    text.split_whitespace().map(str::to_string).collect()
}
