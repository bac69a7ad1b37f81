/// Render raw bytes as a printable escape representation.
///
/// Printable characters pass through unchanged; control characters become
/// visible escape sequences (`\n`, `\t`, `\u{..}`) with no surrounding quote
/// delimiters. Backslashes are doubled so the escaped form stays unambiguous.
/// Total over arbitrary input: bytes that do not decode as UTF-8 are replaced
/// before escaping, so this never fails.
pub fn escape(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch == '\\' {
            escaped.push_str("\\\\");
        } else if ch.is_control() {
            escaped.extend(ch.escape_default());
        } else {
            escaped.push(ch);
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn printable_text_unchanged() {
        assert_eq!(escape(b"plain text, no controls"), "plain text, no controls");
    }

    #[test]
    fn controls_become_visible() {
        assert_eq!(escape(b"\tindented\n"), "\\tindented\\n");
        assert_eq!(escape(b"\r\x00"), "\\r\\u{0}");
    }

    #[test]
    fn backslash_is_doubled() {
        assert_eq!(escape(br"a\b"), r"a\\b");
    }

    #[test]
    fn invalid_utf8_never_fails() {
        let escaped = escape(&[0xff, 0xfe, b'o', b'k']);
        assert!(escaped.ends_with("ok"));
        assert!(!escaped.chars().any(char::is_control));
    }

    #[test]
    fn no_raw_controls_in_output() {
        let all_bytes: Vec<u8> = (0u8..=255).collect();
        let escaped = escape(&all_bytes);
        assert!(!escaped.chars().any(char::is_control));
    }
}
