use std::{
    fmt::Display,
    path::{Component, Path, PathBuf},
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseRequestPathError {
    #[error("Request path is not valid UTF-8 once decoded")]
    InvalidEncoding,

    #[error("Request path escapes the root")]
    EscapesRoot,

    #[error("Request path segment `{0}` is not allowed")]
    ForbiddenSegment(String),
}

/// A request path after percent-decoding and dot-segment collapsing.
///
/// Routing and asset lookup both work on this form, never on the raw URI,
/// so an encoded `..` or an encoded prefix cannot take a different route
/// than its decoded spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    segments: Vec<String>,
}

impl RequestPath {
    /// Decodes `raw` and collapses `.`/`..` segments.
    ///
    /// Fails if a `..` would climb above the root, or if any segment could be
    /// interpreted by the filesystem as something other than a plain name.
    pub fn parse(raw: &str) -> Result<Self, ParseRequestPathError> {
        let decoded =
            urlencoding::decode(raw).map_err(|_| ParseRequestPathError::InvalidEncoding)?;

        let mut segments: Vec<String> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(ParseRequestPathError::EscapesRoot);
                    }
                }
                s if is_plain_name(s) => segments.push(s.to_string()),
                s => return Err(ParseRequestPathError::ForbiddenSegment(s.to_string())),
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn starts_with(&self, prefix: &[String]) -> bool {
        self.segments.starts_with(prefix)
    }

    /// Path relative to whatever directory the request is resolved against.
    pub fn to_relative_path(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl Display for RequestPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

// A segment must stay a single normal component on every platform: no NUL,
// no backslash separators, no drive or root prefixes.
fn is_plain_name(segment: &str) -> bool {
    if segment.contains(['\0', '\\']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
