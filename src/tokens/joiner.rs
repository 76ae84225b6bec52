//! Joining of multi-token composites.
//!
//! Inference emits some logical tokens split across several pieces:
//! contractions ("don" + "'t"), currency amounts ("$" + "5"), and digit
//! groups ("1" + "," + "000"). The joiner inspects a token and its
//! successors and decides how many of them form one logical token.

/// How many tokens, starting at `index`, should merge into one.
///
/// Returns `None` when the token stands alone.
pub fn join_count(texts: &[String], index: usize) -> Option<usize> {
    let current = texts.get(index)?.as_str();
    let next = texts.get(index + 1).map(String::as_str);

    // Contraction: the next token is an apostrophe suffix ("'t", "'s", "'ll").
    if let Some(next) = next
        && is_apostrophe_suffix(next)
        && current.trim_end().ends_with(|c: char| c.is_alphanumeric())
    {
        return Some(2);
    }

    // Currency symbol glued to the following number ("$" + "5").
    if let Some(next) = next
        && is_currency_symbol(current)
        && starts_with_digit(next)
    {
        return Some(2);
    }

    // Digit group: "1" + "," + "000" or "3" + "." + "14".
    if let (Some(sep), Some(after)) = (next, texts.get(index + 2).map(String::as_str))
        && ends_with_digit(current)
        && (sep == "," || sep == ".")
        && starts_with_digit(after)
    {
        return Some(3);
    }

    None
}

/// Concatenation of `count` token texts starting at `index`.
pub fn combine_text(texts: &[String], index: usize, count: usize) -> String {
    texts[index..index + count].concat()
}

/// Geometric mean of `count` probabilities starting at `index`.
///
/// The geometric mean keeps long joins from collapsing toward the
/// arithmetic average of mismatched magnitudes.
pub fn combine_prob(probs: &[f32], index: usize, count: usize) -> f32 {
    let product: f32 = probs[index..index + count].iter().product();
    product.powf(1.0 / count as f32)
}

fn is_apostrophe_suffix(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some('\'') | Some('\u{2019}'))
        && chars.clone().count() > 0
        && chars.all(|c| c.is_alphabetic())
}

fn is_currency_symbol(text: &str) -> bool {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => matches!(c, '$' | '€' | '£' | '¥'),
        _ => false,
    }
}

fn starts_with_digit(text: &str) -> bool {
    text.chars().next().is_some_and(|c| c.is_ascii_digit())
}

fn ends_with_digit(text: &str) -> bool {
    text.chars().last().is_some_and(|c| c.is_ascii_digit())
}
