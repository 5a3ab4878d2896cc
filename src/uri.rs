//! URIs of resources on the remote service.
//!
//! Resources are addressed by their path relative to the API root, such as
//! `/videos/12345`. Paths of the connections used during an upload are derived
//! from the resource they belong to:
//!
//! ```rust
//! use resumable_upload::ResourceUri;
//!
//! let video = ResourceUri::new("/videos/12345/");
//! assert_eq!(&*video.join("files"), "/videos/12345/files");
//! assert_eq!(video.id().as_deref(), Some("12345"));
//! ```
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt::{self, Formatter};
use std::ops::Deref;

/// The address of a resource on the remote service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceUri(Cow<'static, str>);

impl ResourceUri {
    /// Create a new `ResourceUri`.
    ///
    /// A trailing `'/'` is removed.
    pub fn new<T: Into<Cow<'static, str>>>(uri: T) -> Self {
        let uri: Cow<'static, str> = uri.into();
        match uri.strip_suffix('/') {
            Some(v) => Self(Cow::Owned(v.to_string())),
            _ => Self(uri),
        }
    }

    /// The URI of the sub-resource `path` of this resource.
    pub fn join(&self, path: &str) -> ResourceUri {
        let path = path.trim_start_matches('/');
        Self::new(format!("{self}/{path}"))
    }

    /// The identifier of the resource, which is the last segment of its path.
    ///
    /// Any query string or fragment is ignored.
    pub fn id(&self) -> Option<ResourceId> {
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(ResourceId::from)
    }
}

impl Deref for ResourceUri {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ResourceUri {
    fn from(value: &str) -> Self {
        Self::new(value.to_string())
    }
}

impl From<String> for ResourceUri {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identifier of a resource created by an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl Deref for ResourceId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ResourceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ResourceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}
