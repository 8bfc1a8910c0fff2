//! C-style escaping for quoted string and bytes values.

/// Decode the body of a quoted literal (without the quotes) into raw bytes.
pub fn unescape(body: &str) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(body.len());
    let bytes = body.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }

        let Some(&esc) = bytes.get(i + 1) else {
            return Err("Invalid escape sequence at end of string.".to_string());
        };
        i += 2;

        match esc {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'a' => out.push(0x07),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0c),
            b'v' => out.push(0x0b),
            b'\\' | b'\'' | b'"' | b'?' => out.push(esc),
            b'0'..=b'7' => {
                let mut value = u32::from(esc - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match bytes.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                let byte = u8::try_from(value)
                    .map_err(|_| format!("Octal escape \\{:o} is out of range.", value))?;
                out.push(byte);
            }
            b'x' | b'X' => {
                let start = i;
                while i < bytes.len() && i - start < 2 && bytes[i].is_ascii_hexdigit() {
                    i += 1;
                }
                if i == start {
                    return Err("Expected hex digits after \\x.".to_string());
                }
                let value = u8::from_str_radix(&body[start..i], 16)
                    .map_err(|e| format!("Invalid hex escape: {}", e))?;
                out.push(value);
            }
            b'u' | b'U' => {
                let width = if esc == b'u' { 4 } else { 8 };
                let digits = body
                    .get(i..i + width)
                    .filter(|d| d.bytes().all(|b| b.is_ascii_hexdigit()))
                    .ok_or_else(|| format!("Expected {} hex digits after \\{}.", width, esc as char))?;
                let code = u32::from_str_radix(digits, 16)
                    .map_err(|e| format!("Invalid unicode escape: {}", e))?;
                let c = char::from_u32(code)
                    .ok_or_else(|| format!("Invalid unicode code point \\{}{}.", esc as char, digits))?;
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                i += width;
            }
            other => {
                return Err(format!("Invalid escape sequence \\{}.", other as char));
            }
        }
    }

    Ok(out)
}

/// Escape raw bytes for a double-quoted literal. Printable ASCII passes
/// through; everything else becomes a three-digit octal escape.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\t' => out.push_str("\\t"),
            b'"' => out.push_str("\\\""),
            b'\'' => out.push_str("\\'"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:03o}", b)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn simple_escapes() {
        assert_eq!(unescape(r#"a\nb\t\"c\"\\"#).unwrap(), b"a\nb\t\"c\"\\".to_vec());
    }

    #[test]
    fn octal_and_hex() {
        assert_eq!(unescape(r"\000\101\x41\xff").unwrap(), vec![0, b'A', b'A', 0xff]);
        // Octal stops after three digits.
        assert_eq!(unescape(r"\1011").unwrap(), b"A1".to_vec());
    }

    #[test]
    fn unicode_escapes_encode_utf8() {
        assert_eq!(unescape(r"\u00e9x\U0001F600").unwrap(), "éx😀".as_bytes().to_vec());
    }

    #[test]
    fn bad_escapes() {
        assert!(unescape(r"\q").is_err());
        assert!(unescape(r"\x").is_err());
        assert!(unescape(r"\u12").is_err());
        assert!(unescape(r"\777").is_err());
        assert!(unescape("\\").is_err());
    }

    #[test]
    fn escape_uses_octal_for_non_printable() {
        assert_eq!(escape(b"a\"b\n\x00\xff"), r#"a\"b\n\000\377"#);
        assert_eq!(unescape(&escape(&[0, 1, 127, 200, b'\''])).unwrap(), vec![0, 1, 127, 200, b'\'']);
    }
}
