//! Record data model
//!
//! In memory a body is a tagged union. In the record file it is flattened
//! into sibling optional fields (`body`, `body_file`, `body_json`,
//! `body_multipart`), of which at most one is written.

use super::header::FoldedHeaders;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::value::RawValue;

/// Body of a captured message
#[derive(Debug, Clone, Default)]
pub enum Body {
    /// No body; replayed as zero bytes
    #[default]
    None,
    /// Short printable body stored inline
    Text(String),
    /// Body spooled to a file, named relative to the record's directory
    File(String),
    /// JSON body, stored byte for byte
    Json(Box<RawValue>),
    /// Multipart form, one entry per part in wire order
    Multipart(Vec<Part>),
}

/// Body of one multipart part
#[derive(Debug, Clone, Default)]
pub enum PartBody {
    #[default]
    None,
    Text(String),
    File(String),
    Json(Box<RawValue>),
}

/// One part of a multipart body
#[derive(Debug, Clone, Default)]
pub struct Part {
    pub header: FoldedHeaders,
    pub body: PartBody,
}

/// A request (or response) with its folded header and body
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub header: FoldedHeaders,
    /// `Content-Encoding` removed from `header`, empty when there was none
    pub original_content_encoding: String,
    pub body: Body,
}

impl Message {
    pub fn new(header: FoldedHeaders) -> Self {
        Message {
            header,
            ..Default::default()
        }
    }
}

/// One captured HTTP transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub method: String,

    /// Request target exactly as received
    #[serde(default)]
    pub url: String,

    #[serde(default, with = "rfc3339")]
    pub time: Option<DateTime<FixedOffset>>,

    #[serde(default)]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Message>,

    /// Reserved for response capture; never filled in by the recorder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Message>,
}

impl TransactionRecord {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        time: DateTime<FixedOffset>,
        protocol: impl Into<String>,
    ) -> Self {
        TransactionRecord {
            method: method.into(),
            url: url.into(),
            time: Some(time),
            protocol: protocol.into(),
            request: None,
            response: None,
        }
    }
}

mod rfc3339 {
    use chrono::{DateTime, FixedOffset, SecondsFormat};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        time: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => serializer.serialize_str(&t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<FixedOffset>>, D::Error> {
        match Option::<String>::deserialize(deserializer)?.as_deref() {
            None | Some("") => Ok(None),
            Some(s) => DateTime::parse_from_rfc3339(s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Serialize)]
struct MessageOut<'a> {
    header: &'a FoldedHeaders,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_content_encoding: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_json: Option<&'a RawValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body_multipart: Option<&'a [Part]>,
}

#[derive(Deserialize)]
struct MessageIn {
    #[serde(default)]
    header: FoldedHeaders,
    #[serde(default)]
    original_content_encoding: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_file: Option<String>,
    #[serde(default)]
    body_json: Option<Box<RawValue>>,
    #[serde(default)]
    body_multipart: Option<Vec<Part>>,
}

#[derive(Serialize)]
struct PartOut<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    header: Option<&'a FoldedHeaders>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_file: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_json: Option<&'a RawValue>,
}

#[derive(Deserialize)]
struct PartIn {
    #[serde(default)]
    header: FoldedHeaders,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    content_file: Option<String>,
    #[serde(default)]
    content_json: Option<Box<RawValue>>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.is_empty())
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = MessageOut {
            header: &self.header,
            original_content_encoding: Some(self.original_content_encoding.as_str())
                .filter(|s| !s.is_empty()),
            body: None,
            body_file: None,
            body_json: None,
            body_multipart: None,
        };
        match &self.body {
            Body::None => {}
            Body::Text(text) => out.body = Some(text).filter(|t| !t.is_empty()).map(String::as_str),
            Body::File(name) => out.body_file = Some(name.as_str()),
            Body::Json(raw) => out.body_json = Some(raw.as_ref()),
            Body::Multipart(parts) => out.body_multipart = Some(parts.as_slice()),
        }
        out.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Message {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = MessageIn::deserialize(deserializer)?;

        // A hand-edited file may fill in several body fields; the first
        // non-empty one in this order wins.
        let multipart = wire.body_multipart.filter(|parts| !parts.is_empty());
        let body = if let Some(file) = non_empty(wire.body_file) {
            Body::File(file)
        } else if let Some(json) = wire.body_json {
            Body::Json(json)
        } else if let Some(parts) = multipart {
            Body::Multipart(parts)
        } else if let Some(text) = non_empty(wire.body) {
            Body::Text(text)
        } else {
            Body::None
        };

        Ok(Message {
            header: wire.header,
            original_content_encoding: wire.original_content_encoding.unwrap_or_default(),
            body,
        })
    }
}

impl Serialize for Part {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut out = PartOut {
            header: Some(&self.header).filter(|h| !h.is_empty()),
            content: None,
            content_file: None,
            content_json: None,
        };
        match &self.body {
            PartBody::None => {}
            PartBody::Text(text) => {
                out.content = Some(text).filter(|t| !t.is_empty()).map(String::as_str)
            }
            PartBody::File(name) => out.content_file = Some(name.as_str()),
            PartBody::Json(raw) => out.content_json = Some(raw.as_ref()),
        }
        out.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = PartIn::deserialize(deserializer)?;

        let body = if let Some(file) = non_empty(wire.content_file) {
            PartBody::File(file)
        } else if let Some(json) = wire.content_json {
            PartBody::Json(json)
        } else if let Some(text) = non_empty(wire.content) {
            PartBody::Text(text)
        } else {
            PartBody::None
        };

        Ok(Part {
            header: wire.header,
            body,
        })
    }
}
