//! Escaping of free text for the renderer's filter grammar.
//!
//! Any text drawn from shared state goes through [`escape_text`] before it is
//! composed into a filter expression. Reserved characters are prefixed with a
//! backslash: `:` `'` `"` `(` `)` `|` `[` `]`.

const RESERVED: [char; 8] = [':', '\'', '"', '(', ')', '|', '[', ']'];

/// Returns `raw` with every reserved character escaped.
///
/// # Example
/// ```
/// use rendervisor::escape_text;
///
/// assert_eq!(escape_text("CRR: 6.42"), "CRR\\: 6.42");
/// ```
pub fn escape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 4);
    for ch in raw.chars() {
        if RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(
            escape_text(r#":'"()|[]"#),
            r#"\:\'\"\(\)\|\[\]"#
        );
    }

    #[test]
    fn score_line_is_escaped_in_place() {
        assert_eq!(
            escape_text("India 245/4 (38.2) | Australia"),
            r"India 245/4 \(38.2\) \| Australia"
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(escape_text("Melbourne • ODI"), "Melbourne • ODI");
        assert_eq!(escape_text(""), "");
    }
}
