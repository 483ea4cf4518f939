use serde::Deserialize;
use thiserror::Error;

use crate::config::LookupOptions;

/// One catalog match. Transient: lives only as long as the suggestion
/// list that renders it. Artwork and preview are absent for some media.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackHit {
    #[serde(rename = "trackId")]
    pub track_id: i64,
    #[serde(rename = "trackName")]
    pub track_name: String,
    #[serde(rename = "artistName")]
    pub artist_name: String,
    #[serde(rename = "artworkUrl100")]
    pub artwork_url: Option<String>,
    #[serde(rename = "previewUrl")]
    pub preview_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("catalog request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("catalog response unparsable: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Free-text track search against the song catalog.
pub trait SongLookup {
    fn search(&self, term: &str, limit: usize) -> Result<Vec<TrackHit>, LookupError>;
}

/// Catalog client over the iTunes Search API shape. The base URL is
/// injected so the same client serves a local proxy, a serverless relay,
/// or the catalog origin directly; the client knows nothing about which.
pub struct CatalogClient {
    base_url: String,
    http: reqwest::blocking::Client,
}

impl CatalogClient {
    pub fn new(options: &LookupOptions) -> Result<Self, LookupError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout())
            .build()?;
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

impl SongLookup for CatalogClient {
    fn search(&self, term: &str, limit: usize) -> Result<Vec<TrackHit>, LookupError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("term", term),
                ("media", "music"),
                ("limit", &limit.to_string()),
            ])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }
        let body = response.text()?;
        Ok(parse_search_response(&body)?)
    }
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "results", default)]
    results: Vec<TrackHit>,
}

fn parse_search_response(body: &str) -> Result<Vec<TrackHit>, serde_json::Error> {
    let envelope: SearchEnvelope = serde_json::from_str(body)?;
    Ok(envelope.results)
}
