// Slice-based STOMP frame parser (produces owned Vecs from input slices)

use crate::error::ParseError;

/// A frame split into its raw parts, before UTF-8 and escape handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub command: Vec<u8>,
    pub headers: Vec<(Vec<u8>, Vec<u8>)>,
    pub body: Vec<u8>,
    /// Number of input bytes the frame occupied, including the terminator
    /// and an optional trailing LF.
    pub consumed: usize,
}

/// Extract the content-length header value from a header list.
///
/// Only the first occurrence counts, matching how duplicate headers are
/// resolved everywhere else.
fn get_content_length(headers: &[(Vec<u8>, Vec<u8>)]) -> Result<Option<usize>, ParseError> {
    let Some((_, v)) = headers.iter().find(|(k, _)| k.as_slice() == b"content-length") else {
        return Ok(None);
    };
    let s = std::str::from_utf8(v).map_err(|_| ParseError::InvalidUtf8("content-length"))?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(ParseError::InvalidContentLength("empty".to_string()));
    }
    trimmed
        .parse::<usize>()
        .map(Some)
        .map_err(|e| ParseError::InvalidContentLength(format!("'{}': {}", trimmed, e)))
}

fn strip_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}

/// Number of heartbeat EOLs (LF or CRLF) at the start of `input`.
pub fn leading_heartbeats(input: &[u8]) -> usize {
    let mut pos = 0usize;
    loop {
        match input.get(pos..) {
            Some([b'\n', ..]) => pos += 1,
            Some([b'\r', b'\n', ..]) => pos += 2,
            _ => return pos,
        }
    }
}

/// Parse a single STOMP frame from a raw byte slice.
///
/// Leading heartbeat EOLs are skipped. Returns `Ok(Some(frame))` when a
/// full frame was parsed, `Ok(None)` when more bytes are required, and
/// `Err` on protocol errors.
pub fn parse_frame_slice(input: &[u8]) -> Result<Option<RawFrame>, ParseError> {
    let len = input.len();
    let mut pos = leading_heartbeats(input);

    // command line
    let Some(cmd_end_rel) = input[pos..].iter().position(|&b| b == b'\n') else {
        if input[pos..].contains(&0) {
            // a terminator before any command line
            return Err(ParseError::MissingCommand);
        }
        return Ok(None);
    };
    let command = strip_cr(&input[pos..pos + cmd_end_rel]).to_vec();
    if command.is_empty() || command.contains(&0) {
        return Err(ParseError::MissingCommand);
    }
    pos += cmd_end_rel + 1;

    // headers until an empty line
    let mut headers: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
    loop {
        if pos >= len {
            return Ok(None);
        }
        if input[pos] == b'\n' {
            pos += 1;
            break;
        }
        if input[pos] == b'\r' && input.get(pos + 1) == Some(&b'\n') {
            pos += 2;
            break;
        }
        let line_end_rel = match input[pos..].iter().position(|&b| b == b'\n') {
            Some(i) => i,
            None => {
                if input[pos..].contains(&0) {
                    return Err(ParseError::MalformedHeader(
                        String::from_utf8_lossy(&input[pos..]).into_owned(),
                    ));
                }
                return Ok(None);
            }
        };
        let line = strip_cr(&input[pos..pos + line_end_rel]);
        match line.iter().position(|&b| b == b':') {
            Some(colon) => headers.push((line[..colon].to_vec(), line[colon + 1..].to_vec())),
            None => {
                return Err(ParseError::MalformedHeader(
                    String::from_utf8_lossy(line).into_owned(),
                ));
            }
        }
        pos += line_end_rel + 1;
    }

    // body
    let body = match get_content_length(&headers)? {
        Some(content_len) => {
            let Some(end) = pos.checked_add(content_len).and_then(|n| n.checked_add(1)) else {
                return Err(ParseError::InvalidContentLength(format!(
                    "{} exceeds addressable size",
                    content_len
                )));
            };
            if end > len {
                return Ok(None);
            }
            let body = input[pos..pos + content_len].to_vec();
            pos += content_len;
            if input[pos] != 0 {
                return Err(ParseError::MissingNulAfterBody);
            }
            pos += 1;
            body
        }
        None => match input[pos..].iter().position(|&b| b == 0) {
            Some(nul_rel) => {
                let body = input[pos..pos + nul_rel].to_vec();
                pos += nul_rel + 1;
                body
            }
            None => return Ok(None),
        },
    };

    // optional trailing EOL
    if input.get(pos) == Some(&b'\n') {
        pos += 1;
    } else if input.get(pos..pos + 2) == Some(&b"\r\n"[..]) {
        pos += 2;
    }

    Ok(Some(RawFrame {
        command,
        headers,
        body,
        consumed: pos,
    }))
}

/// Undo STOMP 1.2 header escaping (`\\`, `\r`, `\n`, `\c`).
pub fn unescape_header_value(input: &[u8]) -> Result<Vec<u8>, ParseError> {
    let mut out = Vec::with_capacity(input.len());
    let mut iter = input.iter();
    while let Some(&b) = iter.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match iter.next() {
            Some(b'\\') => out.push(b'\\'),
            Some(b'r') => out.push(b'\r'),
            Some(b'n') => out.push(b'\n'),
            Some(b'c') => out.push(b':'),
            Some(&other) => {
                return Err(ParseError::InvalidEscape(format!("\\{}", other as char)));
            }
            None => return Err(ParseError::InvalidEscape("trailing backslash".to_string())),
        }
    }
    Ok(out)
}

/// Apply STOMP 1.2 header escaping.
pub fn escape_header_value(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\\' => result.push_str("\\\\"),
            '\r' => result.push_str("\\r"),
            '\n' => result.push_str("\\n"),
            ':' => result.push_str("\\c"),
            _ => result.push(ch),
        }
    }
    result
}
