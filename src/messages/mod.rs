use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ServiceOptions;
use crate::lookup::TrackHit;

/// A published message, owned by the hosted message store. The client
/// reads these by id-set or feed queries and creates them through
/// [`MessageService::insert`]; it never updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub recipient: String,
    pub message: String,
    pub song_title: String,
    pub artist: String,
    pub cover: Option<String>,
    pub preview: Option<String>,
    pub created_at: String,
}

/// Insert payload for a new message. The song fields come straight from
/// the selected catalog hit.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub recipient: String,
    pub message: String,
    pub song_title: String,
    pub artist: String,
    pub cover: Option<String>,
    pub preview: Option<String>,
}

impl NewMessage {
    pub fn from_track(recipient: &str, message: &str, track: &TrackHit) -> Self {
        Self {
            recipient: recipient.to_string(),
            message: message.to_string(),
            song_title: track.track_name.clone(),
            artist: track.artist_name.clone(),
            cover: track.artwork_url.clone(),
            preview: track.preview_url.clone(),
        }
    }
}

/// Recoverable: the presentation layer shows an empty or failed state and
/// the user retries by reloading. No retry happens inside the core.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("message store request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("message store returned status {0}")]
    Status(u16),
    #[error("message store response unparsable: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("message store returned no record for the insert")]
    MissingRecord,
}

/// The hosted persistence service, behind a trait so views and tests can
/// substitute fakes.
pub trait MessageService {
    fn insert(&self, message: &NewMessage) -> Result<Message, ServiceError>;
    fn fetch_by_id(&self, id: &str) -> Result<Option<Message>, ServiceError>;
    /// Batched fetch; the service orders results by creation time,
    /// newest first.
    fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Message>, ServiceError>;
    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Message>, ServiceError>;
}

/// PostgREST-style client for the hosted store (the production backend
/// exposes the Supabase REST surface).
pub struct RestMessageService {
    base_url: String,
    api_key: String,
    table: String,
    http: reqwest::blocking::Client,
}

impl RestMessageService {
    pub fn new(options: &ServiceOptions) -> Result<Self, ServiceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(options.timeout())
            .build()?;
        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            api_key: options.api_key.clone(),
            table: options.table.clone(),
            http,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn get_records(&self, query: &[(&str, &str)]) -> Result<Vec<Message>, ServiceError> {
        let response = self
            .http
            .get(self.table_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .query(query)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }
        let body = response.text()?;
        Ok(decode_records(&body)?)
    }
}

impl MessageService for RestMessageService {
    fn insert(&self, message: &NewMessage) -> Result<Message, ServiceError> {
        let response = self
            .http
            .post(self.table_url())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(message)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }
        let body = response.text()?;
        decode_records(&body)?
            .into_iter()
            .next()
            .ok_or(ServiceError::MissingRecord)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<Message>, ServiceError> {
        let filter = format!("eq.{id}");
        let records = self.get_records(&[("select", "*"), ("id", &filter), ("limit", "1")])?;
        Ok(records.into_iter().next())
    }

    fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Message>, ServiceError> {
        let filter = format!("in.({})", ids.join(","));
        self.get_records(&[
            ("select", "*"),
            ("id", &filter),
            ("order", "created_at.desc"),
        ])
    }

    fn fetch_all(&self, limit: Option<usize>) -> Result<Vec<Message>, ServiceError> {
        match limit {
            Some(limit) => {
                let limit = limit.to_string();
                self.get_records(&[
                    ("select", "*"),
                    ("order", "created_at.desc"),
                    ("limit", &limit),
                ])
            }
            None => self.get_records(&[("select", "*"), ("order", "created_at.desc")]),
        }
    }
}

fn decode_records(body: &str) -> Result<Vec<Message>, serde_json::Error> {
    serde_json::from_str(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_store_records() {
        let body = r#"[
            {
                "id": "2f1f9f9e-0000-4000-8000-000000000001",
                "recipient": "Rani",
                "message": "For the quiet days",
                "song_title": "Lucky",
                "artist": "Jason Mraz & Colbie Caillat",
                "cover": "https://example.test/lucky.jpg",
                "preview": "https://example.test/lucky.m4a",
                "created_at": "2026-08-20T09:15:00.000Z"
            },
            {
                "id": "2f1f9f9e-0000-4000-8000-000000000002",
                "recipient": "Dika",
                "message": "No preview on this one",
                "song_title": "I Will",
                "artist": "The Beatles",
                "cover": null,
                "preview": null,
                "created_at": "2026-08-19T22:03:00.000Z"
            }
        ]"#;

        let records = decode_records(body).expect("valid records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].recipient, "Rani");
        assert!(records[1].preview.is_none());
    }

    #[test]
    fn malformed_store_body_is_a_decode_error() {
        assert!(decode_records(r#"{"message":"JWT expired"}"#).is_err());
    }

    #[test]
    fn insert_payload_carries_the_selected_track() {
        let track = TrackHit {
            track_id: 7,
            track_name: "Stranger".into(),
            artist_name: "Olivia Rodrigo".into(),
            artwork_url: Some("https://example.test/stranger.jpg".into()),
            preview_url: None,
        };
        let payload = NewMessage::from_track("Sasha", "thinking of you", &track);

        assert_eq!(payload.song_title, "Stranger");
        assert_eq!(payload.artist, "Olivia Rodrigo");
        assert_eq!(
            payload.cover.as_deref(),
            Some("https://example.test/stranger.jpg")
        );
        assert!(payload.preview.is_none());

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["recipient"], "Sasha");
        assert_eq!(json["preview"], serde_json::Value::Null);
    }
}
