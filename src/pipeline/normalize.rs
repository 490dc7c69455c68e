//! Speech-oriented cleanup of translated text before synthesis.

/// Characters that synthesize poorly, with their spoken-friendly forms.
const REPLACEMENTS: &[(char, &str)] = &[
    ('…', "..."),
    ('\u{201c}', "\""),
    ('\u{201d}', "\""),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('–', "-"),
    ('—', "-"),
];

/// Normalizes text for synthesis: trims, swaps typographic punctuation for
/// plain forms, and ensures a terminal punctuation mark so the synthesizer
/// produces a natural closing pause.
pub fn optimize_for_speech(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        match REPLACEMENTS.iter().find(|(from, _)| *from == ch) {
            Some((_, to)) => out.push_str(to),
            None => out.push(ch),
        }
    }

    if !out.is_empty() && !out.ends_with(['.', '!', '?', ':']) {
        out.push('.');
    }
    out
}
