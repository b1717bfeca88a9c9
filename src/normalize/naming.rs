//! Object name normalization.

use std::collections::HashSet;

const WORD_PREFIXES: [&str; 4] = ["frame", "bone", "bip", "b"];
const SYMBOL_PREFIXES: [char; 5] = ['#', '?', '@', '$', '\''];
const INSTANCE_FLAGS: [char; 6] = ['?', '!', '+', '-', '>', '*'];

/// Lowercase `name` and remove legacy naming-convention prefixes.
pub fn strip_prefix(name: &str) -> String {
    let mut name = name.to_lowercase();
    loop {
        if let Some(rest) = strip_word_prefix(&name) {
            name = rest.to_string();
        } else if name.starts_with(SYMBOL_PREFIXES) {
            name.remove(0);
        } else if let Some(rest) = name.strip_prefix('%') {
            let mut rest = rest;
            for _ in 0..3 {
                match rest.strip_prefix(INSTANCE_FLAGS) {
                    Some(r) => rest = r,
                    None => break,
                }
            }
            name = rest.to_string();
        } else {
            break;
        }
    }
    name.trim_matches(|c| c == ' ' || c == '_').to_string()
}

fn strip_word_prefix(name: &str) -> Option<&str> {
    WORD_PREFIXES.iter().find_map(|word| {
        let rest = name.strip_prefix(word)?;
        rest.strip_prefix(' ').or_else(|| rest.strip_prefix('_'))
    })
}

/// Append `padding` until `name` no longer clashes with a protected name.
/// A `.` separator is added first when the name has none.
pub fn pad_protected(name: String, protected: &HashSet<String>) -> String {
    let mut name = name;
    while protected.contains(&name) {
        if !name.contains('.') {
            name.push('.');
        }
        name.push_str("padding");
    }
    name
}
