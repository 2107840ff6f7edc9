//! Request transcript parsing.
//!
//! Accepts `METHOD SP URL SP HTTP/version`, header lines, a blank line and
//! the raw body. Line endings may be `\r\n` or bare `\n`.

use hyper::body::Bytes;

/// A request read back from a transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    pub method: String,
    pub url: String,
    /// Version digits without the `HTTP/` prefix, e.g. `1.1`.
    pub http_version: String,
    /// Headers in first-seen order; a repeated name keeps its first
    /// position and takes the last value.
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl ParsedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Cannot parse payload: no blank line separates head and body")]
    MissingDelimiter,

    #[error("Cannot parse payload, problem with header: `{0}`")]
    RequestLine(String),

    #[error("Cannot parse payload: head is not valid UTF-8")]
    Encoding,
}

/// Parse a captured request.
pub fn parse_request(payload: &[u8]) -> Result<ParsedRequest, ParseError> {
    let (head_end, body_start) = find_blank_line(payload).ok_or(ParseError::MissingDelimiter)?;
    let head = std::str::from_utf8(&payload[..head_end]).map_err(|_| ParseError::Encoding)?;

    let mut lines = head.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
    let request_line = lines.next().unwrap_or_default();
    let (method, url, http_version) = parse_request_line(request_line)
        .ok_or_else(|| ParseError::RequestLine(request_line.to_string()))?;

    let mut headers: Vec<(String, String)> = Vec::new();
    for (name, value) in lines.filter_map(parse_header_line) {
        match headers.iter_mut().find(|(n, _)| n == name) {
            Some(existing) => existing.1 = value.to_string(),
            None => headers.push((name.to_string(), value.to_string())),
        }
    }

    Ok(ParsedRequest {
        method: method.to_string(),
        url: url.to_string(),
        http_version: http_version.to_string(),
        headers,
        body: Bytes::copy_from_slice(&payload[body_start..]),
    })
}

/// Locate the first `\r?\n\r?\n`; returns (end of head, start of body).
fn find_blank_line(payload: &[u8]) -> Option<(usize, usize)> {
    let newline_at = |i: usize| -> Option<usize> {
        let mut j = i;
        if payload.get(j) == Some(&b'\r') {
            j += 1;
        }
        (payload.get(j) == Some(&b'\n')).then_some(j + 1)
    };

    (0..payload.len()).find_map(|i| {
        let after_first = newline_at(i)?;
        let after_second = newline_at(after_first)?;
        Some((i, after_second))
    })
}

fn parse_request_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.splitn(3, char::is_whitespace);
    let method = parts.next().filter(|m| !m.is_empty())?;
    let url = parts.next().filter(|u| !u.is_empty())?;
    let protocol = parts.next()?;

    let prefix = protocol.get(..5)?;
    if !prefix.eq_ignore_ascii_case("HTTP/") {
        return None;
    }
    let version = &protocol[5..];
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    Some((method, url, version))
}

/// `name[ws]:[ws]value`, the name free of whitespace and colons.
fn parse_header_line(line: &str) -> Option<(&str, &str)> {
    let name_end = line.find(|c: char| c == ':' || c.is_whitespace())?;
    if name_end == 0 {
        return None;
    }
    let name = &line[..name_end];

    let rest = skip_one_whitespace(&line[name_end..]);
    let rest = rest.strip_prefix(':')?;
    Some((name, skip_one_whitespace(rest)))
}

fn skip_one_whitespace(s: &str) -> &str {
    match s.chars().next() {
        Some(c) if c.is_whitespace() => &s[c.len_utf8()..],
        _ => s,
    }
}
