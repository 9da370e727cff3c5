//! `multipart/form-data` decoding over raw bytes.
//!
//! The body is never decoded to text before it is split on the boundary, so
//! the file part comes back byte-for-byte as it was sent. Only header lines
//! and text field values are turned into strings, after splitting.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

/// Field that carries the uploaded photo.
pub const FILE_FIELD: &str = "photo";
pub const DEFAULT_FILE_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Error, Debug, PartialEq)]
pub enum MultipartError {
    #[error("missing multipart boundary in Content-Type")]
    MissingBoundary,

    #[error("multipart part {0} has no blank line between headers and body")]
    MissingHeaderSeparator(usize),

    #[error("multipart part {0} has no Content-Disposition name")]
    MissingDisposition(usize),

    #[error("no file received in field `{0}`")]
    NoFile(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormData {
    pub fields: HashMap<String, String>,
    pub file: FilePart,
}

impl FormData {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Reads the `boundary` parameter of a `multipart/form-data` Content-Type.
pub fn boundary_from_content_type(content_type: &str) -> Result<String, MultipartError> {
    let parsed: mime::Mime = content_type
        .parse()
        .map_err(|_| MultipartError::MissingBoundary)?;

    if parsed.type_() != mime::MULTIPART {
        return Err(MultipartError::MissingBoundary);
    }

    parsed
        .get_param(mime::BOUNDARY)
        .map(|boundary| boundary.as_str().trim_matches('"').to_string())
        .filter(|boundary| !boundary.is_empty())
        .ok_or(MultipartError::MissingBoundary)
}

pub fn decode(body: &[u8], boundary: &str) -> Result<FormData, MultipartError> {
    decode_with_file_field(body, boundary, FILE_FIELD)
}

/// Decodes a form whose file arrives in `file_field`.
///
/// Text fields: last value wins. Parts may come in any order. A part with a
/// `filename` in any other field is ignored.
pub fn decode_with_file_field(
    body: &[u8],
    boundary: &str,
    file_field: &str,
) -> Result<FormData, MultipartError> {
    if boundary.is_empty() {
        return Err(MultipartError::MissingBoundary);
    }

    let delimiter = [b"--".as_slice(), boundary.as_bytes()].concat();

    let mut fields = HashMap::new();
    let mut file = None;

    for (index, segment) in split_on_delimiter(body, &delimiter).into_iter().enumerate() {
        // Closing delimiter: everything after it is epilogue.
        if segment.starts_with(b"--") {
            break;
        }

        let segment = trim_segment(segment);
        if segment.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let part = parse_part(segment, index)?;

        match part.filename {
            Some(filename) if part.name == file_field && !filename.is_empty() => {
                file = Some(FilePart {
                    field: part.name,
                    filename,
                    content_type: part
                        .content_type
                        .unwrap_or_else(|| DEFAULT_FILE_CONTENT_TYPE.to_string()),
                    data: part.body.to_vec(),
                });
            }
            Some(filename) => {
                debug!("Ignoring file part {:?} ({filename:?})", part.name);
            }
            None => {
                fields.insert(part.name, String::from_utf8_lossy(part.body).into_owned());
            }
        }
    }

    let file = file.ok_or_else(|| MultipartError::NoFile(file_field.to_string()))?;

    Ok(FormData { fields, file })
}

struct RawPart<'a> {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    body: &'a [u8],
}

/// Segments that follow each delimiter line. A delimiter only counts at the
/// start of the body or of a line; the preamble is dropped.
fn split_on_delimiter<'a>(body: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let starts: Vec<usize> = find_all(body, delimiter)
        .into_iter()
        .filter(|&at| at == 0 || body[at - 1] == b'\n')
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let from = start + delimiter.len();
            let to = starts.get(i + 1).copied().unwrap_or(body.len());
            &body[from..to]
        })
        .collect()
}

fn find_all(haystack: &[u8], needle: &[u8]) -> Vec<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return Vec::new();
    }

    haystack
        .windows(needle.len())
        .enumerate()
        .filter(|(_, window)| *window == needle)
        .map(|(at, _)| at)
        .collect()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Drops the rest of the delimiter line and the line break that belongs to
/// the next delimiter.
fn trim_segment(segment: &[u8]) -> &[u8] {
    let mut segment = segment;

    while let [b' ' | b'\t', rest @ ..] = segment {
        segment = rest;
    }
    if let Some(rest) = segment.strip_prefix(b"\r\n") {
        segment = rest;
    } else if let Some(rest) = segment.strip_prefix(b"\n") {
        segment = rest;
    }

    if let Some(rest) = segment.strip_suffix(b"\r\n") {
        segment = rest;
    } else if let Some(rest) = segment.strip_suffix(b"\n") {
        segment = rest;
    }

    segment
}

fn parse_part(segment: &[u8], index: usize) -> Result<RawPart<'_>, MultipartError> {
    // The body may itself contain either separator, so the first one wins.
    let separator = [
        find(segment, b"\r\n\r\n").map(|at| (at, 4)),
        find(segment, b"\n\n").map(|at| (at, 2)),
    ]
    .into_iter()
    .flatten()
    .min_by_key(|(at, _)| *at);

    let (headers, body) = if let Some((at, len)) = separator {
        (&segment[..at], &segment[at + len..])
    } else if segment.ends_with(b"\r\n") || segment.ends_with(b"\n") {
        // Headers followed by an empty body whose break was trimmed.
        (segment, &segment[segment.len()..])
    } else {
        return Err(MultipartError::MissingHeaderSeparator(index));
    };

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in String::from_utf8_lossy(headers).lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        if key.trim().eq_ignore_ascii_case("content-disposition") {
            for (param, param_value) in disposition_params(value) {
                if param.eq_ignore_ascii_case("name") {
                    name = Some(param_value);
                } else if param.eq_ignore_ascii_case("filename") {
                    filename = Some(param_value);
                }
            }
        } else if key.trim().eq_ignore_ascii_case("content-type") && !value.is_empty() {
            content_type = Some(value.to_string());
        }
    }

    let name = name.ok_or(MultipartError::MissingDisposition(index))?;

    Ok(RawPart {
        name,
        filename,
        content_type,
        body,
    })
}

/// `form-data; name="eventId"; filename="a.jpg"` → `[(name, eventId), (filename, a.jpg)]`
fn disposition_params(value: &str) -> Vec<(String, String)> {
    split_unquoted(value, ';')
        .into_iter()
        .skip(1)
        .filter_map(|param| param.split_once('='))
        .map(|(key, value)| {
            let value = value.trim();
            let value = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value);
            (key.trim().to_string(), value.to_string())
        })
        .collect()
}

/// Splits on `separator` except inside double quotes.
fn split_unquoted(value: &str, separator: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (at, c) in value.char_indices() {
        if c == '"' {
            quoted = !quoted;
        } else if c == separator && !quoted {
            pieces.push(&value[start..at]);
            start = at + c.len_utf8();
        }
    }
    pieces.push(&value[start..]);
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDARY: &str = "----WebKitFormBoundary7MA4YWxkTrZu0gW";

    fn text_part(name: &str, value: &str) -> Vec<u8> {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .into_bytes()
    }

    fn file_part(name: &str, filename: &str, content_type: Option<&str>, data: &[u8]) -> Vec<u8> {
        let mut part = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
        );
        if let Some(content_type) = content_type {
            part.push_str(&format!("Content-Type: {content_type}\r\n"));
        }
        part.push_str("\r\n");

        let mut part = part.into_bytes();
        part.extend_from_slice(data);
        part.extend_from_slice(b"\r\n");
        part
    }

    fn closing() -> Vec<u8> {
        format!("--{BOUNDARY}--\r\n").into_bytes()
    }

    fn binary_payload() -> Vec<u8> {
        let mut data: Vec<u8> = (0..=255u8).collect();
        data.extend_from_slice(b"\r\n\r\n\r\n--");
        data.extend_from_slice(&[0xFF, 0xD8, 0x0D, 0x0A, 0x00, 0xC3, 0x28, 0x0A, 0x0D]);
        data.extend_from_slice(format!("x--{BOUNDARY}").as_bytes());
        data.extend_from_slice(b"\r\n");
        data
    }

    #[test]
    fn test_decode_preserves_binary_file_and_fields() {
        let data = binary_payload();
        let body = [
            text_part("eventId", "E1"),
            file_part("photo", "foto.jpg", Some("image/jpeg"), &data),
            text_part("message", "hello"),
            closing(),
        ]
        .concat();

        let form = decode(&body, BOUNDARY).unwrap();

        assert_eq!(form.file.data, data);
        assert_eq!(form.file.filename, "foto.jpg");
        assert_eq!(form.file.content_type, "image/jpeg");
        assert_eq!(form.field("eventId"), Some("E1"));
        assert_eq!(form.field("message"), Some("hello"));
        assert_eq!(form.fields.len(), 2);
    }

    #[test]
    fn test_file_part_first_and_default_content_type() {
        let body = [
            file_part("photo", "raw.bin", None, b"\x00\x01\x02"),
            text_part("eventId", "E2"),
            closing(),
        ]
        .concat();

        let form = decode(&body, BOUNDARY).unwrap();

        assert_eq!(form.file.content_type, DEFAULT_FILE_CONTENT_TYPE);
        assert_eq!(form.file.data, b"\x00\x01\x02");
        assert_eq!(form.field("eventId"), Some("E2"));
    }

    #[test]
    fn test_preamble_epilogue_and_padding_are_tolerated() {
        let mut body = b"this is a preamble\r\n".to_vec();
        body.extend(text_part("eventId", "E3"));
        body.extend(file_part("photo", "a.png", Some("image/png"), b"PNG"));
        body.extend(format!("--{BOUNDARY}--  \r\n\r\nepilogue\r\n").into_bytes());

        let form = decode(&body, BOUNDARY).unwrap();

        assert_eq!(form.file.data, b"PNG");
        assert_eq!(form.field("eventId"), Some("E3"));
    }

    #[test]
    fn test_last_duplicate_field_wins() {
        let body = [
            text_part("message", "first"),
            file_part("photo", "a.png", Some("image/png"), b"PNG"),
            text_part("message", "second"),
            closing(),
        ]
        .concat();

        let form = decode(&body, BOUNDARY).unwrap();
        assert_eq!(form.field("message"), Some("second"));
    }

    #[test]
    fn test_empty_text_field() {
        let body = [
            text_part("message", ""),
            file_part("photo", "a.png", Some("image/png"), b"PNG"),
            closing(),
        ]
        .concat();

        let form = decode(&body, BOUNDARY).unwrap();
        assert_eq!(form.field("message"), Some(""));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let body = [text_part("eventId", "E1"), closing()].concat();
        assert_eq!(
            decode(&body, BOUNDARY),
            Err(MultipartError::NoFile("photo".to_string()))
        );
    }

    #[test]
    fn test_file_in_other_field_or_without_filename_is_not_the_photo() {
        let body = [
            file_part("attachment", "a.png", Some("image/png"), b"PNG"),
            text_part("photo", "not a file"),
            file_part("photo", "", Some("application/octet-stream"), b""),
            closing(),
        ]
        .concat();

        assert_eq!(
            decode(&body, BOUNDARY),
            Err(MultipartError::NoFile("photo".to_string()))
        );
    }

    #[test]
    fn test_missing_header_separator() {
        let mut body = format!("--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"photo\"\r\n")
            .into_bytes();
        body.extend(closing());

        assert_eq!(
            decode(&body, BOUNDARY),
            Err(MultipartError::MissingHeaderSeparator(0))
        );
    }

    #[test]
    fn test_part_without_name() {
        let mut body = format!("--{BOUNDARY}\r\nContent-Type: text/plain\r\n\r\nvalue\r\n").into_bytes();
        body.extend(closing());

        assert_eq!(
            decode(&body, BOUNDARY),
            Err(MultipartError::MissingDisposition(0))
        );
    }

    #[test]
    fn test_custom_file_field() {
        let body = [file_part("image", "a.gif", Some("image/gif"), b"GIF89a"), closing()].concat();

        let form = decode_with_file_field(&body, BOUNDARY, "image").unwrap();
        assert_eq!(form.file.field, "image");
        assert_eq!(form.file.data, b"GIF89a");
    }

    #[test]
    fn test_lf_only_line_breaks() {
        let body = format!(
            "--{BOUNDARY}\nContent-Disposition: form-data; name=\"photo\"; filename=\"a.png\"\n\nPNG\n--{BOUNDARY}--\n"
        );

        let form = decode(body.as_bytes(), BOUNDARY).unwrap();
        assert_eq!(form.file.data, b"PNG");
    }

    #[test]
    fn test_quoted_filename_with_semicolon() {
        let body = [
            file_part("photo", "a;b.jpg", Some("image/jpeg"), b"JPG"),
            closing(),
        ]
        .concat();

        let form = decode(&body, BOUNDARY).unwrap();
        assert_eq!(form.file.filename, "a;b.jpg");
        assert_eq!(form.file.field, "photo");
    }

    #[test]
    fn test_lf_headers_with_crlf_blank_line_in_body() {
        let body = format!(
            "--{BOUNDARY}\nContent-Disposition: form-data; name=\"photo\"; filename=\"a.png\"\nContent-Type: image/png\n\nPNG\r\n\r\nIEND\n--{BOUNDARY}--\n"
        );

        let form = decode(body.as_bytes(), BOUNDARY).unwrap();
        assert_eq!(form.file.content_type, "image/png");
        assert_eq!(form.file.data, b"PNG\r\n\r\nIEND");
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type(&format!("multipart/form-data; boundary={BOUNDARY}")),
            Ok(BOUNDARY.to_string())
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data; boundary=\"abc123\""),
            Ok("abc123".to_string())
        );
        assert_eq!(
            boundary_from_content_type("multipart/form-data"),
            Err(MultipartError::MissingBoundary)
        );
        assert_eq!(
            boundary_from_content_type("application/json"),
            Err(MultipartError::MissingBoundary)
        );
        assert_eq!(
            boundary_from_content_type("not a mime"),
            Err(MultipartError::MissingBoundary)
        );
    }
}
