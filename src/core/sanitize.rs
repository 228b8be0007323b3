use unicode_normalization::UnicodeNormalization;

// Typographic characters that compatibility decomposition leaves alone
// but that have an obvious ASCII stand-in.
const SUBSTITUTIONS: &[(char, &str)] = &[
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{2014}', "-"),
    ('\u{2013}', "-"),
    ('\u{2026}', "..."),
];

/// Map arbitrary text to 7-bit ASCII.
///
/// Applies NFKD so accented letters fall back to their base letter,
/// swaps smart quotes, dashes and ellipses for ASCII equivalents, then
/// drops anything still outside the ASCII range. Total and idempotent.
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if c.is_ascii() {
            out.push(c);
        } else if let Some((_, replacement)) = SUBSTITUTIONS.iter().find(|(from, _)| *from == c) {
            out.push_str(replacement);
        }
    }
    out
}
