//! Byte-level `multipart/form-data` decoder for upload requests.
//!
//! A body looks like
//!
//! ```text
//! --BOUNDARY\r\n
//! Content-Disposition: form-data; name="path"\r\n
//! \r\n
//! /srv/incoming\r\n
//! --BOUNDARY\r\n
//! Content-Disposition: form-data; name="file"; filename="a.bin"\r\n
//! \r\n
//! <raw bytes>\r\n
//! --BOUNDARY--\r\n
//! ```
//!
//! The line break in front of each delimiter belongs to the delimiter, so it is
//! removed exactly once and the payload keeps every byte it was sent with.
use thiserror::Error;

use crate::domain::UploadIntent;

/// Name of the text field carrying the destination folder.
pub const PATH_FIELD: &str = "path";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Bad request: Not multipart/form-data")]
    NotMultipart,
    #[error("Bad upload request (malformed boundary)")]
    MalformedBoundary,
    #[error("Bad upload request (missing file or filename)")]
    MissingFilePart,
    #[error("Bad upload request (missing path)")]
    MissingPathField,
}

/// One decoded part of the body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MultipartField {
    File { filename: String, data: Vec<u8> },
    Text { name: String, value: String },
}

/// Extract the boundary token from a `Content-Type` header value.
pub fn boundary(content_type: &str) -> Result<&str, DecodeError> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(DecodeError::NotMultipart);
    }

    params
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|value| !value.is_empty())
        .ok_or(DecodeError::MalformedBoundary)
}

/// Decode `body` into the fields needed for an upload.
pub fn decode(body: &[u8], boundary: &[u8]) -> Result<UploadIntent, DecodeError> {
    let mut file = None;
    let mut folder = None;

    for field in fields(body, boundary)? {
        match field {
            MultipartField::File { filename, data } => {
                if file.is_none() && !filename.is_empty() {
                    file = Some((filename, data));
                }
            }
            MultipartField::Text { name, value } if name == PATH_FIELD => {
                if folder.is_none() {
                    folder = Some(value);
                }
            }
            MultipartField::Text { .. } => {}
        }
    }

    let (filename, data) = file.ok_or(DecodeError::MissingFilePart)?;
    let folder = folder
        .filter(|folder| !folder.is_empty())
        .ok_or(DecodeError::MissingPathField)?;

    Ok(UploadIntent {
        filename,
        data,
        folder,
    })
}

/// Every well-formed, named part of `body`, in order.
///
/// Parts without a header terminator or without a `name`/`filename` are
/// skipped, as are text parts that are not valid UTF-8.
pub fn fields(body: &[u8], boundary: &[u8]) -> Result<Vec<MultipartField>, DecodeError> {
    let fields = split_parts(body, boundary)?
        .into_iter()
        .filter_map(|part| {
            let Some((head, content)) = split_head(part) else {
                log::warn!("Skipping multipart part without header terminator");
                return None;
            };
            classify(head, content)
        })
        .collect();

    Ok(fields)
}

/// Raw parts between consecutive delimiters, with delimiter artifacts removed.
fn split_parts<'a>(body: &'a [u8], boundary: &[u8]) -> Result<Vec<&'a [u8]>, DecodeError> {
    if boundary.is_empty() {
        return Err(DecodeError::MalformedBoundary);
    }

    // "\n--" + boundary; a preceding '\r' is trimmed per part in CRLF bodies.
    let mut delimiter = Vec::with_capacity(boundary.len() + 3);
    delimiter.extend_from_slice(b"\n--");
    delimiter.extend_from_slice(boundary);
    let dash_boundary = &delimiter[1..];

    let mut cursor = if body.starts_with(dash_boundary) {
        dash_boundary.len()
    } else {
        find(body, &delimiter).ok_or(DecodeError::MalformedBoundary)? + delimiter.len()
    };

    // The first delimiter line tells whether the body uses CRLF or bare LF.
    let crlf = body[cursor..]
        .iter()
        .position(|&b| b == b'\n')
        .is_some_and(|eol| eol > 0 && body[cursor + eol - 1] == b'\r');

    let mut parts = Vec::new();
    loop {
        let rest = &body[cursor..];
        if rest.starts_with(b"--") {
            break;
        }
        let Some(end) = find(rest, &delimiter) else {
            // A truncated body has content but no closing delimiter.
            if rest.iter().all(u8::is_ascii_whitespace) {
                break;
            }
            log::warn!("Multipart body ends without a closing delimiter");
            return Err(DecodeError::MalformedBoundary);
        };

        let part = &rest[..end];
        let part = if crlf {
            part.strip_suffix(b"\r").unwrap_or(part)
        } else {
            part
        };
        parts.push(skip_delimiter_line(part));
        cursor += end + delimiter.len();
    }

    Ok(parts)
}

/// Drop the transport padding and line break that follow a delimiter.
fn skip_delimiter_line(part: &[u8]) -> &[u8] {
    match part.iter().position(|&b| b == b'\n') {
        Some(eol) if part[..eol].iter().all(|b| matches!(b, b' ' | b'\t' | b'\r')) => {
            &part[eol + 1..]
        }
        _ => part,
    }
}

/// Split a part into its header block and content at the first blank line.
fn split_head(part: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(content) = part.strip_prefix(b"\r\n") {
        return Some((&part[..0], content));
    }
    if let Some(content) = part.strip_prefix(b"\n") {
        return Some((&part[..0], content));
    }

    let crlf = find(part, b"\r\n\r\n").map(|at| (at, 4));
    let lf = find(part, b"\n\n").map(|at| (at, 2));
    let (at, len) = match (crlf, lf) {
        (Some(crlf), Some(lf)) => {
            if lf.0 < crlf.0 {
                lf
            } else {
                crlf
            }
        }
        (crlf, lf) => crlf.or(lf)?,
    };

    Some((&part[..at], &part[at + len..]))
}

fn classify(head: &[u8], content: &[u8]) -> Option<MultipartField> {
    let head = String::from_utf8_lossy(head);
    let disposition = head.lines().find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-disposition")
            .then_some(value)
    })?;

    if let Some(filename) = disposition_param(disposition, "filename") {
        return Some(MultipartField::File {
            filename,
            data: content.to_vec(),
        });
    }

    let name = disposition_param(disposition, "name")?;
    match std::str::from_utf8(content) {
        Ok(value) => Some(MultipartField::Text {
            name,
            value: value.trim().to_string(),
        }),
        Err(err) => {
            log::warn!("Skipping non UTF-8 field {name:?}: {err}");
            None
        }
    }
}

/// Value of `key` in a `Content-Disposition` header, honouring quoted strings.
fn disposition_param(value: &str, key: &str) -> Option<String> {
    let mut params = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut escaped = false;

    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if quoted => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ';' if !quoted => params.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    params.push(current);

    params.into_iter().find_map(|param| {
        let (name, raw) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case(key) {
            return None;
        }
        Some(unquote(raw.trim()))
    })
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    // Only `\"` and `\\` are escapes; other backslashes are kept so that
    // Windows-style client paths survive intact.
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(&next) = chars.peek() {
                if next == '"' || next == '\\' {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(ch);
    }
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
