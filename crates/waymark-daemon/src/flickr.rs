//! Flickr-backed implementations of the two fetch services.
//!
//! Metadata uses the geo photo search endpoint; images come from the static
//! farm hosts, staged into a local cache directory. The index is not
//! persisted across runs, so stale staged images are cleared at startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use waymark_core::parse::parse_search_response;
use waymark_core::types::PhotoRecord;

use crate::fetch::{FetchFuture, ImageService, MetadataService};

const SEARCH_URL: &str = "https://api.flickr.com/services/rest/";

/// Default timeout for both services' requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client() -> Result<Client, reqwest::Error> {
    Client::builder().timeout(DEFAULT_TIMEOUT).build()
}

/// Geo photo search against the metadata endpoint.
pub struct FlickrMetadataService {
    client: Client,
    api_key: String,
}

impl FlickrMetadataService {
    pub fn new(api_key: impl Into<String>) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
        })
    }

    fn search_url(&self, latitude: f64, longitude: f64) -> String {
        format!(
            "{SEARCH_URL}?method=flickr.photos.search&api_key={}&accuracy=16&geo_context=2\
             &lat={latitude}&lon={longitude}&per_page=20&format=json&nojsoncallback=1",
            self.api_key
        )
    }
}

impl MetadataService for FlickrMetadataService {
    fn fetch(&self, latitude: f64, longitude: f64) -> FetchFuture<PhotoRecord> {
        let client = self.client.clone();
        let url = self.search_url(latitude, longitude);
        Box::pin(async move {
            let response = client.get(&url).send().await?.error_for_status()?;
            let body = response.bytes().await?;
            Ok(parse_search_response(&body)?)
        })
    }
}

/// Image download from the static farm hosts into a cache directory.
pub struct FlickrImageService {
    client: Client,
    cache_dir: PathBuf,
}

impl FlickrImageService {
    pub fn new(cache_dir: PathBuf) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client()?,
            cache_dir,
        })
    }
}

fn image_url(record: &PhotoRecord) -> String {
    format!(
        "https://farm{}.staticflickr.com/{}/{}_{}_n.jpg",
        record.farm, record.server, record.id, record.secret
    )
}

impl ImageService for FlickrImageService {
    fn fetch(&self, record: &PhotoRecord) -> FetchFuture<PathBuf> {
        let client = self.client.clone();
        let url = image_url(record);
        let dest = self
            .cache_dir
            .join(format!("{}_{}.jpg", record.id, record.secret));
        Box::pin(async move {
            let response = client.get(&url).send().await?.error_for_status()?;
            let body = response.bytes().await?;
            tokio::fs::write(&dest, &body).await?;
            Ok(dest)
        })
    }
}

/// Remove staged `.jpg` files from a previous run. Individual failures are
/// logged and skipped.
pub fn clear_cache_dir(dir: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == "jpg") {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to remove stale image");
            }
        }
    }
    Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────
