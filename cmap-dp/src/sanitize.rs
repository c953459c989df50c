//! Text sanitization for the restricted exchange charset
//!
//! Assembled document text travels through text-exchange boundaries that
//! only accept a restricted codepoint set (tab, CR, LF and the printable
//! planes, excluding the surrogate-reserved block and the two final
//! noncharacters of the BMP). Everything else is substituted, never
//! rejected; invalid input text is not an error condition.

/// Replace invalid codepoints with a single space.
pub fn sanitize(text: &str) -> String {
    sanitize_with(text, " ")
}

/// Replace invalid codepoints with `substitute`.
pub fn sanitize_with(text: &str, substitute: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if is_valid_char(c) {
            out.push(c);
        } else {
            out.push_str(substitute);
        }
    }
    out
}

/// Valid codepoints: U+0009, U+000A, U+000D, U+0020..=U+D7FF,
/// U+E000..=U+FFFD, U+10000..=U+10FFFF.
fn is_valid_char(c: char) -> bool {
    let cp = c as u32;
    matches!(cp,
        0x9 | 0xA | 0xD
        | 0x20..=0xD7FF
        | 0xE000..=0xFFFD
        | 0x10000..=0x10FFFF)
}
