//! Escape grammars of the two text string opcodes.
//!
//! STRING carries a quoted literal in the legacy `string_escape` form
//! (`\xNN`, `\\`, `\'`, `\n`, octal, ...). UNICODE carries
//! `raw_unicode_escape` text, where only `\uXXXX` and `\UXXXXXXXX` are
//! escapes. In both, unescaped bytes map to their Latin-1 code point.

fn hex_value(digits: &[u8]) -> Option<u32> {
    if digits.len() % 2 != 0 {
        return None;
    }
    let bytes = hex::decode(digits).ok()?;
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
}

/// Decode the body of a STRING literal (quotes already stripped).
pub fn decode_string_escape(body: &[u8]) -> Result<String, String> {
    let mut out = String::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b != b'\\' {
            out.push(b as char);
            i += 1;
            continue;
        }
        let Some(&esc) = body.get(i + 1) else {
            return Err("trailing backslash in string literal".to_string());
        };
        i += 2;
        match esc {
            b'\\' => out.push('\\'),
            b'\'' => out.push('\''),
            b'"' => out.push('"'),
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'a' => out.push('\x07'),
            b'b' => out.push('\x08'),
            b'f' => out.push('\x0c'),
            b'v' => out.push('\x0b'),
            b'\n' => {} // line continuation
            b'x' => {
                let digits = body
                    .get(i..i + 2)
                    .ok_or_else(|| "truncated \\x escape".to_string())?;
                let v = hex_value(digits).ok_or_else(|| "invalid \\x escape".to_string())?;
                out.push(v as u8 as char);
                i += 2;
            }
            b'0'..=b'7' => {
                let mut v = (esc - b'0') as u32;
                let mut n = 1;
                while n < 3 {
                    match body.get(i) {
                        Some(&d @ b'0'..=b'7') => {
                            v = v * 8 + (d - b'0') as u32;
                            i += 1;
                            n += 1;
                        }
                        _ => break,
                    }
                }
                out.push((v & 0xff) as u8 as char);
            }
            other => {
                // unknown escapes are kept verbatim
                out.push('\\');
                out.push(other as char);
            }
        }
    }
    Ok(out)
}

/// Decode a UNICODE opcode argument.
pub fn decode_raw_unicode_escape(line: &[u8]) -> Result<String, String> {
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while i < line.len() {
        if line[i] != b'\\' {
            out.push(line[i] as char);
            i += 1;
            continue;
        }
        // a run of backslashes escapes a following u/U only when its length is odd
        let run_start = i;
        while i < line.len() && line[i] == b'\\' {
            i += 1;
        }
        let run = i - run_start;
        let width = match line.get(i) {
            Some(b'u') if run % 2 == 1 => 4,
            Some(b'U') if run % 2 == 1 => 8,
            _ => {
                out.extend(std::iter::repeat('\\').take(run));
                continue;
            }
        };
        out.extend(std::iter::repeat('\\').take(run - 1));
        let digits = line
            .get(i + 1..i + 1 + width)
            .ok_or_else(|| format!("truncated \\{} escape", line[i] as char))?;
        let code = hex_value(digits).ok_or_else(|| "invalid unicode escape".to_string())?;
        let ch = char::from_u32(code)
            .ok_or_else(|| format!("escape \\u{code:x} is not a unicode scalar value"))?;
        out.push(ch);
        i += 1 + width;
    }
    Ok(out)
}

/// Encode text for the UNICODE opcode. Characters that would break the
/// line-oriented framing (backslash, newline, CR, NUL, SUB) are always escaped.
pub fn encode_raw_unicode_escape(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        let code = ch as u32;
        match ch {
            '\\' | '\n' | '\r' | '\0' | '\x1a' => {
                out.extend_from_slice(format!("\\u{code:04x}").as_bytes());
            }
            _ if code < 0x100 => out.push(code as u8),
            _ if code < 0x10000 => out.extend_from_slice(format!("\\u{code:04x}").as_bytes()),
            _ => out.extend_from_slice(format!("\\U{code:08x}").as_bytes()),
        }
    }
    out
}

/// Latin-1 view of a string, if every char fits in a byte.
pub fn latin1_bytes(s: &str) -> Option<Vec<u8>> {
    s.chars()
        .map(|c| u8::try_from(c as u32).ok())
        .collect()
}

pub fn latin1_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}
