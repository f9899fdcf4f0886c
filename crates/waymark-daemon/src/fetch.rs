//! Boundaries to the two network pipelines.
//!
//! Both services are fire-and-forget from the coordinator's perspective: the
//! coordinator spawns a fetch and the completion re-enters the event loop as
//! a separate event. Neither pipeline's errors are ever surfaced to the
//! user; the coordinator drops (metadata) or retracts (image) internally.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;
use waymark_core::error::ParseError;
use waymark_core::types::PhotoRecord;

/// Boxed completion future returned by the fetch services.
pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T, FetchError>> + Send>>;

/// Failure of either fetch pipeline. A malformed metadata document is
/// treated identically to a transport failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Malformed(#[from] ParseError),
}

/// Looks up one photo-metadata record near a coordinate. Operates on a
/// durable transport: the completion may arrive after arbitrary delay, and
/// re-enters the coordinator exactly once per logical request.
pub trait MetadataService: Send + Sync + 'static {
    fn fetch(&self, latitude: f64, longitude: f64) -> FetchFuture<PhotoRecord>;
}

/// Downloads the image behind a record and stages it locally, returning the
/// local path. Foreground transport; only requested on demand from the UI.
pub trait ImageService: Send + Sync + 'static {
    fn fetch(&self, record: &PhotoRecord) -> FetchFuture<PathBuf>;
}
