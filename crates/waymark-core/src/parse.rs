//! Parser for the photo-search metadata response.
//!
//! The metadata service answers a geo search with a JSON document of the
//! shape `{"photos": {"photo": [{id, server, farm, secret}, ...]}}`. One
//! entry becomes the acquired record; which photo is "best" for a location
//! is out of scope, so the first entry is taken deterministically.

use serde::Deserialize;

use crate::error::ParseError;
use crate::types::PhotoRecord;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    photos: PhotoPage,
}

#[derive(Debug, Deserialize)]
struct PhotoPage {
    photo: Vec<PhotoEntry>,
}

#[derive(Debug, Deserialize)]
struct PhotoEntry {
    id: String,
    server: String,
    farm: u32,
    secret: String,
}

/// Extract one photo record from a raw search response body.
pub fn parse_search_response(body: &[u8]) -> Result<PhotoRecord, ParseError> {
    let response: SearchResponse = serde_json::from_slice(body)?;
    let entry = response.photos.photo.into_iter().next().ok_or(ParseError::Empty)?;
    Ok(PhotoRecord::new(entry.id, entry.server, entry.farm, entry.secret))
}

// ─── Tests ───────────────────────────────────────────────────────────
