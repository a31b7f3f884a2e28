//! DOT format utilities for graph visualization.
//!
//! The exporters in [`crate::ssa`] build DOT text by hand; every label and name taken
//! from the program goes through [`escape_dot`] first.

/// Escapes instruction text, block labels and function names for a quoted DOT label.
///
/// Backslashes, quotes and angle brackets are escaped, line breaks become `\n`
/// and carriage returns are dropped.
///
/// # Examples
///
/// ```rust
/// use yakssa::utils::escape_dot;
///
/// let escaped = escape_dot("v3 = const \"a<b\"");
/// assert_eq!(escaped, "v3 = const \\\"a\\<b\\\"");
/// ```
#[must_use]
pub fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "")
        .replace('<', "\\<")
        .replace('>', "\\>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_dot_plain_names_unchanged() {
        assert_eq!(escape_dot("main$0"), "main$0");
        assert_eq!(escape_dot("loop.header1"), "loop.header1");
    }

    #[test]
    fn test_escape_dot_string_constant() {
        assert_eq!(escape_dot("v1 = const \"a\""), "v1 = const \\\"a\\\"");
    }

    #[test]
    fn test_escape_dot_escaped_constant() {
        // the rendering of the string constant "a\b" keeps its backslash
        assert_eq!(escape_dot("const \"a\\\\b\""), "const \\\"a\\\\\\\\b\\\"");
    }

    #[test]
    fn test_escape_dot_multiline_block_label() {
        assert_eq!(escape_dot("if.done2\nv5 = phi"), "if.done2\\nv5 = phi");
        assert_eq!(escape_dot("entry0\r\nv0 = const 1"), "entry0\\nv0 = const 1");
    }

    #[test]
    fn test_escape_dot_angle_brackets() {
        assert_eq!(escape_dot("map<string, int>"), "map\\<string, int\\>");
    }

    #[test]
    fn test_escape_dot_instruction() {
        assert_eq!(
            escape_dot("v2 = binop(v0 << v1)"),
            "v2 = binop(v0 \\<\\< v1)"
        );
        assert_eq!(
            escape_dot("v4 = field(v1, \"ok\")"),
            "v4 = field(v1, \\\"ok\\\")"
        );
    }
}
