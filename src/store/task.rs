//! Task data model and delivery envelope (spec §3).

use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One persisted unit of work: a callback URL, an opaque payload, a success
/// criterion, and the retry state accumulated across delivery attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub url: String,
    #[serde(with = "payload_as_base64")]
    pub payload: Vec<u8>,
    pub expected: u16,
    /// Cron expression, empty for a one-shot task.
    #[serde(default)]
    pub schedule: String,
    pub next_run: DateTime<Utc>,
    /// For cron tasks, the cron-computed fire time this occurrence advanced from.
    pub next_scheduled_run: Option<DateTime<Utc>>,
    pub tries: u32,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error_body: Option<String>,
    /// -1 on a transport failure, the HTTP status otherwise. 0 until the first
    /// failed attempt.
    pub last_error_status_code: i32,
}

impl Task {
    pub fn is_cron(&self) -> bool {
        !self.schedule.is_empty()
    }
}

/// Serialize/deserialize `Vec<u8>` as a base64 string rather than a JSON
/// array of integers — matches the envelope's "default JSON byte-string
/// encoding" convention from spec §3.2 and keeps on-disk files readable.
mod payload_as_base64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(s.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// The JSON body POSTed to the callback URL (spec §3.2).
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(with = "payload_as_base64")]
    pub payload: Vec<u8>,
    pub tries: u32,
    pub req_id: String,
}

impl Envelope {
    /// Build the envelope for the attempt numbered `tries` (post-increment,
    /// starting at 1), with a fresh random correlation id.
    pub fn new(payload: Vec<u8>, tries: u32) -> Self {
        let mut bytes = [0u8; 6];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self {
            payload,
            tries,
            req_id: hex::encode(bytes),
        }
    }
}

/// A 32-char hex id for one-shot tasks: 16 random bytes.
pub fn random_task_id() -> String {
    let mut bytes = [0u8; 16];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
    hex::encode(bytes)
}

/// The 40-char SHA-1 hex content-hash id for cron tasks — the deduplication
/// key described in spec §3.1.
pub fn cron_task_id(url: &str, payload: &[u8], schedule: &str) -> String {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    hasher.update(payload);
    hasher.update(schedule.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cron_id_is_stable_and_forty_chars() {
        let a = cron_task_id("http://x/t", b"hi", "*/5 * * * *");
        let b = cron_task_id("http://x/t", b"hi", "*/5 * * * *");
        assert_eq!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn cron_id_changes_with_any_field() {
        let base = cron_task_id("http://x/t", b"hi", "*/5 * * * *");
        assert_ne!(base, cron_task_id("http://x/u", b"hi", "*/5 * * * *"));
        assert_ne!(base, cron_task_id("http://x/t", b"bye", "*/5 * * * *"));
        assert_ne!(base, cron_task_id("http://x/t", b"hi", "*/10 * * * *"));
    }

    #[test]
    fn random_id_is_thirty_two_hex_chars() {
        let id = random_task_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn envelope_round_trips_payload() {
        let payload = b"hello world".to_vec();
        let env = Envelope::new(payload.clone(), 3);
        let json = serde_json::to_value(&env).unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(json["payload"].as_str().unwrap())
            .unwrap();
        assert_eq!(decoded, payload);
        assert_eq!(json["tries"], 3);
        assert_eq!(json["req_id"].as_str().unwrap().len(), 12);
    }
}
