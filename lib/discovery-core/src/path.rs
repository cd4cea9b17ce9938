//! Decoding of coordination-store paths into service registrations
//!
//! Registrations live in the store as `<root>/<service>/<version>/<endpoint>`.
//! The watched root is `offset` segments deep; every notification path is
//! decoded relative to it.

use crate::{CoreError, Result};

/// What a notification path points at once the watched root is stripped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PathTarget<'a> {
    /// The watched root itself
    Root,
    /// A service node
    Service { name: &'a str },
    /// A version node under a service
    Version { name: &'a str, version: &'a str },
    /// An endpoint leaf under a service version
    Endpoint {
        name: &'a str,
        version: &'a str,
        endpoint: &'a str,
    },
}

impl<'a> PathTarget<'a> {
    /// Flatten into a `(name, version, endpoint)` triple, empty where absent
    pub fn parts(&self) -> (&'a str, &'a str, &'a str) {
        match *self {
            PathTarget::Root => ("", "", ""),
            PathTarget::Service { name } => (name, "", ""),
            PathTarget::Version { name, version } => (name, version, ""),
            PathTarget::Endpoint {
                name,
                version,
                endpoint,
            } => (name, version, endpoint),
        }
    }

    pub fn name(&self) -> &'a str {
        self.parts().0
    }
}

/// Strip one leading and one trailing `/`
pub fn sanitize(path: &str) -> &str {
    let path = path.strip_prefix('/').unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Number of segments in the sanitized path.
///
/// An empty path still counts as one (empty) segment.
pub fn segment_count(path: &str) -> usize {
    sanitize(path).split('/').count()
}

/// Decode `path` relative to a root that is `offset` segments deep
pub fn decode(path: &str, offset: usize) -> Result<PathTarget<'_>> {
    let path = sanitize(path);
    let parts: Vec<&str> = path.split('/').collect();

    match parts.len().checked_sub(offset) {
        Some(0) => Ok(PathTarget::Root),
        Some(1) => Ok(PathTarget::Service { name: parts[offset] }),
        Some(2) => Ok(PathTarget::Version {
            name: parts[offset],
            version: parts[offset + 1],
        }),
        Some(3) => Ok(PathTarget::Endpoint {
            name: parts[offset],
            version: parts[offset + 1],
            endpoint: parts[offset + 2],
        }),
        _ => Err(CoreError::InvalidPath(path.to_string())),
    }
}
