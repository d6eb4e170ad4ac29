//! Source locators for cross-endpoint copies.
//!
//! ```text
//! /abs/path                  -> serving endpoint
//! ~/rel/path                 -> serving endpoint, home relative
//! remote://<endpoint>/<path> -> named endpoint
//! ```
//!
//! For the `remote://` form a path starting with `~` stays home relative,
//! anything else is taken as absolute on that endpoint.

use std::fmt;
use std::str::FromStr;

use crate::LOCAL_ENDPOINT;

const REMOTE_SCHEME: &str = "remote://";

/// Errors produced while parsing a locator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocatorError {
    #[error("empty source locator")]
    Empty,

    #[error("unsupported locator scheme: {0}")]
    UnsupportedScheme(String),

    #[error("missing endpoint in locator: {0}")]
    MissingEndpoint(String),

    #[error("missing path in locator: {0}")]
    MissingPath(String),
}

/// Where a copy source lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocator {
    /// Named endpoint, `None` for the serving endpoint.
    pub endpoint: Option<String>,
    pub path: String,
}

impl SourceLocator {
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            endpoint: None,
            path: path.into(),
        }
    }

    pub fn remote(endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            path: path.into(),
        }
    }

    pub fn parse(input: &str) -> Result<Self, LocatorError> {
        if input.is_empty() {
            return Err(LocatorError::Empty);
        }
        let Some(rest) = input.strip_prefix(REMOTE_SCHEME) else {
            if let Some((scheme, _)) = input.split_once("://") {
                return Err(LocatorError::UnsupportedScheme(scheme.to_string()));
            }
            return Ok(Self::local(input));
        };

        let (endpoint, path) = rest
            .split_once('/')
            .ok_or_else(|| LocatorError::MissingPath(input.to_string()))?;
        if endpoint.is_empty() {
            return Err(LocatorError::MissingEndpoint(input.to_string()));
        }
        if path.is_empty() {
            return Err(LocatorError::MissingPath(input.to_string()));
        }

        let path = if path.starts_with('~') || path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        if endpoint == LOCAL_ENDPOINT {
            Ok(Self::local(path))
        } else {
            Ok(Self::remote(endpoint, path))
        }
    }

    /// Returns `true` when the source is the serving endpoint.
    pub fn is_local(&self) -> bool {
        self.endpoint.is_none()
    }
}

impl FromStr for SourceLocator {
    type Err = LocatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceLocator::parse(s)
    }
}

impl fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.endpoint {
            None => f.write_str(&self.path),
            Some(endpoint) => {
                let path = self.path.strip_prefix('/').unwrap_or(&self.path);
                write!(f, "{REMOTE_SCHEME}{endpoint}/{path}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_local() {
        let loc = SourceLocator::parse("/var/log/syslog").unwrap();
        assert!(loc.is_local());
        assert_eq!(loc.path, "/var/log/syslog");

        let loc = SourceLocator::parse("~/notes").unwrap();
        assert!(loc.is_local());
        assert_eq!(loc.path, "~/notes");
    }

    #[test]
    fn remote_absolute_path() {
        let loc = SourceLocator::parse("remote://build-box/srv/data").unwrap();
        assert_eq!(loc.endpoint.as_deref(), Some("build-box"));
        assert_eq!(loc.path, "/srv/data");
        assert_eq!(loc.to_string(), "remote://build-box/srv/data");
    }

    #[test]
    fn remote_home_relative_path() {
        let loc = SourceLocator::parse("remote://build-box/~/projects").unwrap();
        assert_eq!(loc.path, "~/projects");
        assert_eq!(loc.to_string(), "remote://build-box/~/projects");
    }

    #[test]
    fn local_endpoint_name_maps_to_local() {
        let loc = SourceLocator::parse("remote://local/tmp/x").unwrap();
        assert!(loc.is_local());
        assert_eq!(loc.path, "/tmp/x");
    }

    #[test]
    fn rejects_malformed_locators() {
        assert_eq!(SourceLocator::parse(""), Err(LocatorError::Empty));
        assert!(matches!(
            SourceLocator::parse("s3://bucket/key"),
            Err(LocatorError::UnsupportedScheme(s)) if s == "s3"
        ));
        assert!(matches!(
            SourceLocator::parse("remote:///tmp"),
            Err(LocatorError::MissingEndpoint(_))
        ));
        assert!(matches!(
            SourceLocator::parse("remote://box"),
            Err(LocatorError::MissingPath(_))
        ));
        assert!(matches!(
            SourceLocator::parse("remote://box/"),
            Err(LocatorError::MissingPath(_))
        ));
    }
}
