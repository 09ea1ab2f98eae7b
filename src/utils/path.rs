use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use thiserror::Error;

/// Characters escaped inside a single path segment when building provider URLs.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("Malformed path encoding: {0}")]
    Malformed(String),

    #[error("Path escapes the permitted base path")]
    Escapes,
}

/// Normalizes a slash separated path: always absolute, no empty, `.` or `..`
/// segments, no trailing slash except for the root.
pub fn clean_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Decodes a percent-encoded path received from a client.
pub fn decode_path(raw: &str) -> Result<String, PathError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|p| p.into_owned())
        .map_err(|e| PathError::Malformed(e.to_string()))
}

/// True when `path` equals `base` or lies underneath it. Both must be clean.
pub fn is_sub_path(base: &str, path: &str) -> bool {
    base == "/" || path == base || path.starts_with(&format!("{}/", base))
}

/// Joins a caller supplied path onto the caller's base path, refusing any
/// result outside of the base.
pub fn join_base_path(base: &str, path: &str) -> Result<String, PathError> {
    let base = clean_path(base);
    // `..` must be applied relative to the base, so collapse after joining
    let joined = clean_path(&format!("{}/{}", base, path));
    if !is_sub_path(&base, &joined) {
        return Err(PathError::Escapes);
    }
    Ok(joined)
}

/// Appends a single name to a directory path.
pub fn join_name(dir: &str, name: &str) -> String {
    clean_path(&format!("{}/{}", dir, name))
}

/// Splits a clean path into its segments, root yields none.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Percent-encodes every segment of a clean path, keeping the separators.
pub fn encode_path(path: &str) -> String {
    let encoded: Vec<String> = segments(path)
        .map(|s| utf8_percent_encode(s, PATH_SEGMENT).to_string())
        .collect();
    format!("/{}", encoded.join("/"))
}
