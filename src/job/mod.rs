//! Job parameters for a single board download
//!
//! A job is staged in a key-value store as a flat map of string fields
//! (`board_pins`, `CALLBACK_URL`, `MAX_BOARD_NUMBER`, `board_id`, `site`,
//! `uifnKey`) keyed by the job token (`uifn`). [`Job::from_fields`] decodes
//! that map once into typed values; nothing downstream touches raw fields.

pub mod error;
pub mod store;

pub use error::{DecodeError, StoreError};
pub use store::{FjallJobStore, JobFields, JobStore, MemoryJobStore};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

pub const FIELD_BOARD_PINS: &str = "board_pins";
pub const FIELD_CALLBACK_URL: &str = "CALLBACK_URL";
pub const FIELD_MAX_BOARD_NUMBER: &str = "MAX_BOARD_NUMBER";
pub const FIELD_BOARD_ID: &str = "board_id";
pub const FIELD_SITE: &str = "site";
pub const FIELD_UIFN_KEY: &str = "uifnKey";

/// Source site a board was collected from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    Huaban,
    Duitang,
}

impl Site {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Site::Huaban),
            2 => Some(Site::Duitang),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Site::Huaban => 1,
            Site::Duitang => 2,
        }
    }

    /// `Referer` sent with every image request of the board
    pub fn referer(&self, board_id: &str) -> String {
        match self {
            Site::Huaban => format!("https://huaban.com/boards/{}", board_id),
            Site::Duitang => format!("https://www.duitang.com/album/?id={}", board_id),
        }
    }
}

/// One image reference within a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    #[serde(rename = "imgUrl")]
    pub image_url: String,
    #[serde(rename = "imgName")]
    pub image_name: String,
}

/// A `board_pins` entry as supplied upstream.
///
/// Entries that are not objects, miss a field, carry empty values, or name a
/// file outside the board directory decode as `Malformed` and are ignored by
/// the downloader.
#[derive(Debug, Clone, PartialEq)]
pub enum PinEntry {
    Valid(Pin),
    Malformed(Value),
}

impl PinEntry {
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value::<Pin>(value.clone()) {
            Ok(pin) if !pin.image_url.is_empty() && is_plain_component(&pin.image_name) => {
                PinEntry::Valid(pin)
            }
            _ => PinEntry::Malformed(value),
        }
    }

    pub fn pin(&self) -> Option<&Pin> {
        match self {
            PinEntry::Valid(pin) => Some(pin),
            PinEntry::Malformed(_) => None,
        }
    }
}

impl From<Pin> for PinEntry {
    fn from(pin: Pin) -> Self {
        PinEntry::Valid(pin)
    }
}

impl<'de> Deserialize<'de> for PinEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(PinEntry::from_value)
    }
}

/// A decoded job. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Job {
    pub uifn: String,
    pub uifn_key: String,
    pub board_id: String,
    pub site: Site,
    pub callback_url: String,
    pub max_pins: usize,
    /// Already truncated to `max_pins`
    pub pins: Vec<PinEntry>,
    pub disk_limit_percent: u8,
}

impl Job {
    /// Decode the stored field map of job `uifn`.
    pub fn from_fields(
        uifn: &str,
        fields: &JobFields,
        disk_limit_percent: u8,
    ) -> Result<Self, DecodeError> {
        if !is_plain_component(uifn) {
            return Err(DecodeError::invalid("uifn", "must be a plain file name"));
        }

        let board_id = required(fields, FIELD_BOARD_ID)?.trim().to_string();
        if !is_plain_component(&board_id) {
            return Err(DecodeError::invalid(
                FIELD_BOARD_ID,
                "must be a plain directory name",
            ));
        }

        let site_code: i64 = parse_number(fields, FIELD_SITE)?;
        let site = Site::from_code(site_code).ok_or_else(|| {
            DecodeError::invalid(FIELD_SITE, format!("unknown site {}", site_code))
        })?;

        let max_pins: usize = parse_number(fields, FIELD_MAX_BOARD_NUMBER)?;
        let callback_url = required(fields, FIELD_CALLBACK_URL)?.to_string();
        let uifn_key = required(fields, FIELD_UIFN_KEY)?.to_string();

        let mut pins: Vec<PinEntry> = serde_json::from_str(required(fields, FIELD_BOARD_PINS)?)
            .map_err(|e| DecodeError::invalid(FIELD_BOARD_PINS, e.to_string()))?;

        if pins.len() > max_pins {
            debug!(uifn, supplied = pins.len(), max_pins, "Truncating board pins");
            pins.truncate(max_pins);
        }

        Ok(Self {
            uifn: uifn.to_string(),
            uifn_key,
            board_id,
            site,
            callback_url,
            max_pins,
            pins,
            disk_limit_percent,
        })
    }

    pub fn referer(&self) -> String {
        self.site.referer(&self.board_id)
    }
}

/// True for a single, non-special path component
pub fn is_plain_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

fn required<'a>(fields: &'a JobFields, field: &'static str) -> Result<&'a str, DecodeError> {
    fields
        .get(field)
        .map(String::as_str)
        .ok_or(DecodeError::MissingField(field))
}

fn parse_number<T>(fields: &JobFields, field: &'static str) -> Result<T, DecodeError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    required(fields, field)?
        .trim()
        .parse::<T>()
        .map_err(|e| DecodeError::invalid(field, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_fields(pins: Value, max: usize) -> JobFields {
        let mut fields = JobFields::new();
        fields.insert(FIELD_BOARD_PINS.to_string(), pins.to_string());
        fields.insert(
            FIELD_CALLBACK_URL.to_string(),
            "http://callback.local/status".to_string(),
        );
        fields.insert(FIELD_MAX_BOARD_NUMBER.to_string(), max.to_string());
        fields.insert(FIELD_BOARD_ID.to_string(), "12345".to_string());
        fields.insert(FIELD_SITE.to_string(), "1".to_string());
        fields.insert(FIELD_UIFN_KEY.to_string(), "secret".to_string());
        fields
    }

    #[test]
    fn test_decode_job() {
        let pins = json!([
            {"imgUrl": "http://img.local/a.jpg", "imgName": "a.jpg"},
            {"imgUrl": "http://img.local/b.jpg", "imgName": "b.jpg"}
        ]);
        let job = Job::from_fields("board.zip", &sample_fields(pins, 10), 80).unwrap();

        assert_eq!(job.uifn, "board.zip");
        assert_eq!(job.board_id, "12345");
        assert_eq!(job.site, Site::Huaban);
        assert_eq!(job.uifn_key, "secret");
        assert_eq!(job.pins.len(), 2);
        assert_eq!(job.pins[0].pin().unwrap().image_name, "a.jpg");
        assert_eq!(job.referer(), "https://huaban.com/boards/12345");
    }

    #[test]
    fn test_truncates_to_max_board_number() {
        let pins = Value::Array(
            (0..5)
                .map(|i| json!({"imgUrl": format!("http://img.local/{i}.jpg"), "imgName": format!("{i}.jpg")}))
                .collect(),
        );
        let job = Job::from_fields("board.zip", &sample_fields(pins, 2), 80).unwrap();

        assert_eq!(job.pins.len(), 2);
        assert_eq!(job.pins[1].pin().unwrap().image_name, "1.jpg");
    }

    #[test]
    fn test_malformed_pins_are_kept_as_malformed() {
        let pins = json!([
            {"imgUrl": "http://img.local/a.jpg"},
            {},
            null,
            {"imgUrl": "", "imgName": "x.jpg"},
            {"imgUrl": "http://img.local/b.jpg", "imgName": "../b.jpg"},
            {"imgUrl": "http://img.local/c.jpg", "imgName": "c.jpg", "extra": 1}
        ]);
        let job = Job::from_fields("board.zip", &sample_fields(pins, 10), 80).unwrap();

        assert_eq!(job.pins.len(), 6);
        let valid: Vec<_> = job.pins.iter().filter_map(PinEntry::pin).collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(valid[0].image_name, "c.jpg");
    }

    #[test]
    fn test_duitang_referer() {
        assert_eq!(
            Site::Duitang.referer("77"),
            "https://www.duitang.com/album/?id=77"
        );
        assert_eq!(Site::from_code(2), Some(Site::Duitang));
        assert_eq!(Site::Duitang.code(), 2);
    }

    #[test]
    fn test_unknown_site_rejected() {
        let mut fields = sample_fields(json!([]), 10);
        fields.insert(FIELD_SITE.to_string(), "3".to_string());

        let result = Job::from_fields("board.zip", &fields, 80);
        assert!(matches!(result, Err(DecodeError::InvalidField { field: "site", .. })));
    }

    #[test]
    fn test_missing_field() {
        let mut fields = sample_fields(json!([]), 10);
        fields.remove(FIELD_UIFN_KEY);

        let result = Job::from_fields("board.zip", &fields, 80);
        assert!(matches!(result, Err(DecodeError::MissingField("uifnKey"))));
    }

    #[test]
    fn test_board_id_must_be_plain() {
        let mut fields = sample_fields(json!([]), 10);
        fields.insert(FIELD_BOARD_ID.to_string(), "../etc".to_string());

        assert!(Job::from_fields("board.zip", &fields, 80).is_err());
        assert!(Job::from_fields("a/b.zip", &sample_fields(json!([]), 1), 80).is_err());
    }
}
