//! Remote fetch links
//!
//! A [`RemoteLink`] may own a backend resource (an open file, a session).
//! Callers copy what they need with [`RemoteLink::snapshot`] and then
//! [`close`](RemoteLink::close) it; a link that is dropped without being
//! closed still releases its resource.

use crate::{Headers, Result};
use std::fmt;
use tracing::warn;

/// A backend handle tied to a link
pub trait LinkResource: Send {
    /// Release the handle
    fn close(self: Box<Self>) -> Result<()>;
}

/// Descriptor for fetching one object's bytes from a backend
#[derive(Default)]
pub struct RemoteLink {
    pub url: String,
    pub headers: Headers,
    /// Total byte length, 0 when unknown
    pub content_length: u64,
    /// Suggested parallel range fetches, 0 when unspecified
    pub concurrency: usize,
    /// Suggested range size in bytes, 0 when unspecified
    pub part_size: u64,
    resource: Option<Box<dyn LinkResource>>,
}

/// The plain fields of a [`RemoteLink`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub url: String,
    pub headers: Headers,
    pub content_length: u64,
    pub concurrency: usize,
    pub part_size: u64,
}

impl RemoteLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Headers::new(),
            content_length: 0,
            concurrency: 0,
            part_size: 0,
            resource: None,
        }
    }

    pub fn with_headers(mut self, headers: Headers) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = length;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize, part_size: u64) -> Self {
        self.concurrency = concurrency;
        self.part_size = part_size;
        self
    }

    /// Attach a resource released when the link is closed or dropped
    pub fn with_resource(mut self, resource: Box<dyn LinkResource>) -> Self {
        self.resource = Some(resource);
        self
    }

    pub fn has_resource(&self) -> bool {
        self.resource.is_some()
    }

    /// Copy the descriptor fields
    pub fn snapshot(&self) -> LinkInfo {
        LinkInfo {
            url: self.url.clone(),
            headers: self.headers.clone(),
            content_length: self.content_length,
            concurrency: self.concurrency,
            part_size: self.part_size,
        }
    }

    /// Release the backing resource, reporting failures
    pub fn close(mut self) -> Result<()> {
        match self.resource.take() {
            Some(resource) => resource.close(),
            None => Ok(()),
        }
    }
}

impl Drop for RemoteLink {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take() {
            if let Err(e) = resource.close() {
                warn!(url = %self.url, error = %e, "failed to release remote link");
            }
        }
    }
}

impl fmt::Debug for RemoteLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteLink")
            .field("url", &self.url)
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .field("content_length", &self.content_length)
            .field("concurrency", &self.concurrency)
            .field("part_size", &self.part_size)
            .field("resource", &self.resource.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StorageError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted(Arc<AtomicUsize>, bool);

    impl LinkResource for Counted {
        fn close(self: Box<Self>) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            if self.1 {
                return Err(StorageError::Internal("close failed".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_close_releases_once() {
        let closed = Arc::new(AtomicUsize::new(0));
        let link = RemoteLink::new("http://x").with_resource(Box::new(Counted(closed.clone(), false)));
        link.close().unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let closed = Arc::new(AtomicUsize::new(0));
        {
            let _link = RemoteLink::new("http://x").with_resource(Box::new(Counted(closed.clone(), true)));
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_reports_error() {
        let closed = Arc::new(AtomicUsize::new(0));
        let link = RemoteLink::new("http://x").with_resource(Box::new(Counted(closed.clone(), true)));
        assert!(link.close().is_err());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_copies_fields() {
        let mut headers = Headers::new();
        headers.insert("Referer".to_string(), vec!["https://a".to_string()]);
        let link = RemoteLink::new("http://x")
            .with_headers(headers.clone())
            .with_content_length(42)
            .with_concurrency(32, 1024);
        let info = link.snapshot();
        assert_eq!(info.url, "http://x");
        assert_eq!(info.headers, headers);
        assert_eq!(info.content_length, 42);
        assert_eq!(info.concurrency, 32);
        assert_eq!(info.part_size, 1024);
    }
}
