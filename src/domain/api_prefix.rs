use std::fmt::Display;

use thiserror::Error;

use super::RequestPath;

#[derive(Debug, Error)]
pub struct ParseApiPrefixError(String);

impl AsRef<str> for ParseApiPrefixError {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ParseApiPrefixError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// The path prefix reserved for API routes, e.g. `/api`.
#[derive(Debug, Clone)]
pub struct ApiPrefix {
    segments: Vec<String>,
}

impl ApiPrefix {
    /// Returns an instance of `ApiPrefix` if the input is an absolute path with
    /// at least one plain segment. It returns `ParseApiPrefixError` otherwise.
    pub fn parse(s: &str) -> Result<ApiPrefix, ParseApiPrefixError> {
        let invalid = |reason: &str| {
            ParseApiPrefixError(format!("{s} is not a valid API prefix: {reason}."))
        };

        let Some(rest) = s.strip_prefix('/') else {
            return Err(invalid("it must start with `/`"));
        };
        let rest = rest.trim_end_matches('/');
        if rest.is_empty() {
            // `/` would reserve every path and leave nothing for the assets
            return Err(invalid("it must contain at least one segment"));
        }

        let forbidden_characters = ['%', '\\', '?', '#', '\0'];
        let mut segments = Vec::new();
        for segment in rest.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." {
                return Err(invalid("empty and dot segments are not allowed"));
            }
            if segment.contains(forbidden_characters) {
                return Err(invalid("it contains a forbidden character"));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Whether `path` falls inside the reserved namespace.
    pub fn reserves(&self, path: &RequestPath) -> bool {
        path.starts_with(&self.segments)
    }

    /// Full path of a route registered under this prefix.
    pub fn join(&self, route: &str) -> String {
        format!("{}/{}", self, route.trim_start_matches('/'))
    }
}

impl Display for ApiPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}
