use std::fmt::Write as _;

/// A Python string literal for `s`, double-quoted unless single quotes avoid escaping.
pub(crate) fn py_quote(s: &str) -> String {
    let quote = if s.contains('"') && !s.contains('\'') {
        '\''
    } else {
        '"'
    };
    quote_with(s, quote)
}

/// A single-quoted Python string literal, for embedding inside quoted annotations.
pub(crate) fn py_quote_single(s: &str) -> String {
    quote_with(s, '\'')
}

fn quote_with(s: &str, quote: char) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {
                let _ = write!(out, "\\x{:02x}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// A Python bytes literal.
pub(crate) fn py_bytes(bytes: &[u8]) -> String {
    let mut out = String::from("b\"");
    for &b in bytes {
        match b {
            b'\\' => out.push_str("\\\\"),
            b'"' => out.push_str("\\\""),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "\\x{b:02x}");
            }
        }
    }
    out.push('"');
    out
}

/// A Python float literal; non-finite values become `float("inf")` and friends.
pub(crate) fn py_float(v: f64) -> String {
    if v.is_nan() {
        return "float(\"nan\")".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 {
            "float(\"inf\")".to_string()
        } else {
            "float(\"-inf\")".to_string()
        };
    }
    // Debug keeps a fractional part or exponent, so the literal stays a float.
    format!("{v:?}")
}

pub(crate) fn py_bool(v: bool) -> &'static str {
    if v { "True" } else { "False" }
}

/// Escape text for a triple-double-quoted docstring.
pub(crate) fn docstring_text(line: &str) -> String {
    line.replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{docstring_text, py_bytes, py_float, py_quote, py_quote_single};

    #[test]
    fn quotes_prefer_double_unless_single_avoids_escaping() {
        assert_eq!(py_quote("plain"), r#""plain""#);
        assert_eq!(py_quote(r#"say "hi""#), r#"'say "hi"'"#);
        assert_eq!(py_quote(r#"it's "x""#), r#""it's \"x\"""#);
        assert_eq!(py_quote("a\\d\n"), r#""a\\d\n""#);
        assert_eq!(py_quote_single("it's"), r"'it\'s'");
    }

    #[test]
    fn bytes_escape_non_printable_values() {
        assert_eq!(py_bytes(b"ab\x00\xff\""), r#"b"ab\x00\xff\"""#);
    }

    #[test]
    fn floats_always_read_back_as_floats() {
        assert_eq!(py_float(1.0), "1.0");
        assert_eq!(py_float(0.1), "0.1");
        assert_eq!(py_float(-2.5), "-2.5");
        assert_eq!(py_float(1e20), "1e20");
        assert_eq!(py_float(f64::INFINITY), r#"float("inf")"#);
        assert_eq!(py_float(f64::NEG_INFINITY), r#"float("-inf")"#);
        assert_eq!(py_float(f64::NAN), r#"float("nan")"#);
    }

    #[test]
    fn docstrings_escape_backslashes_and_triple_quotes() {
        assert_eq!(docstring_text(r#"a\b """x""""#), r#"a\\b \"\"\"x\"\"\""#);
    }
}
