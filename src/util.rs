//! Small helpers shared across extraction, session derivation, and codegen.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Safe for multi-byte UTF-8 input: truncation happens on character
/// boundaries, never byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", s[..idx].trim_end()),
        None => s.to_string(),
    }
}

/// Convert an arbitrary attribute token into a camelCase identifier.
///
/// Used when deriving input-schema property names from locators
/// (`user-email` -> `userEmail`, `pizza_id` -> `pizzaId`). Characters that
/// cannot start or continue an identifier are treated as word breaks.
pub fn camel_case_ident(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut upper_next = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if out.is_empty() && ch.is_ascii_digit() {
                // Identifiers cannot start with a digit.
                out.push('_');
            }
            if upper_next {
                out.extend(ch.to_uppercase());
                upper_next = false;
            } else if out.is_empty() {
                out.extend(ch.to_lowercase());
            } else {
                out.push(ch);
            }
        } else {
            upper_next = !out.is_empty();
        }
    }
    out
}

/// Normalize whitespace runs to single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_string_untouched() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string() {
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
    }

    #[test]
    fn truncate_multibyte_safe() {
        assert_eq!(truncate_with_ellipsis("😀😀😀😀", 2), "😀😀...");
    }

    #[test]
    fn camel_case_hyphenated() {
        assert_eq!(camel_case_ident("user-email"), "userEmail");
    }

    #[test]
    fn camel_case_snake() {
        assert_eq!(camel_case_ident("pizza_id"), "pizzaId");
    }

    #[test]
    fn camel_case_already_camel() {
        assert_eq!(camel_case_ident("pizzaId"), "pizzaId");
    }

    #[test]
    fn camel_case_leading_digit_prefixed() {
        assert_eq!(camel_case_ident("2fa-code"), "_2faCode");
    }

    #[test]
    fn camel_case_single_word_lowercased() {
        assert_eq!(camel_case_ident("Email"), "email");
    }

    #[test]
    fn collapse_whitespace_runs() {
        assert_eq!(collapse_whitespace("  a \n b\t\tc "), "a b c");
    }
}
