//! WebSocket wire protocol.
//!
//! Every frame is a JSON object tagged by `"type"`. Field names follow the
//! deployed mobile client (`child_id`, `attention_level`, `time`).

use crate::error::Result;
use crate::types::{AttentionLevel, SubjectId};
use serde::{Deserialize, Serialize};

/// Client → server requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe as a dashboard observer.
    Dashboard,
    /// Request the profile view of one subject.
    StartStream {
        #[serde(rename = "child_id", alias = "subject")]
        subject: SubjectId,
    },
    /// Leave the profile view.
    StopStream,
    /// Any other `type` value.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Parse a text frame.
    ///
    /// Frames with an unrecognized `type` parse to `Unknown`; frames that are
    /// not a tagged JSON object are an error.
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Latest label of one subject.
    DashboardUpdate {
        #[serde(rename = "child_id")]
        subject: SubjectId,
        attention_level: AttentionLevel,
    },
    /// One historical window of the subject being profiled.
    ProfileData {
        #[serde(rename = "child_id")]
        subject: SubjectId,
        /// 1-based window number.
        window: usize,
        /// Time range label, e.g. `"15-20s"`.
        #[serde(rename = "time")]
        time_range: String,
        attention_level: AttentionLevel,
    },
    /// A request was rejected; the connection stays open.
    Error { message: String },
}

impl ServerMessage {
    pub fn dashboard_update(subject: SubjectId, attention_level: AttentionLevel) -> Self {
        Self::DashboardUpdate {
            subject,
            attention_level,
        }
    }

    /// Build the profile frame for the 0-based window `index`.
    pub fn profile_data(
        subject: SubjectId,
        index: usize,
        attention_level: AttentionLevel,
        window_secs: u64,
    ) -> Self {
        Self::ProfileData {
            subject,
            window: index + 1,
            time_range: time_range(index, window_secs),
            attention_level,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Message kind, for logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DashboardUpdate { .. } => "dashboard_update",
            Self::ProfileData { .. } => "profile_data",
            Self::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// `"{start}-{end}s"` label for the 0-based window `index`.
pub fn time_range(index: usize, window_secs: u64) -> String {
    let start = index as u64 * window_secs;
    format!("{}-{}s", start, start + window_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dashboard() {
        let msg = ClientMessage::parse(r#"{"type":"dashboard"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Dashboard);
    }

    #[test]
    fn test_parse_start_stream_accepts_both_field_names() {
        let msg = ClientMessage::parse(r#"{"type":"start_stream","child_id":4}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartStream {
                subject: SubjectId::new(4)
            }
        );

        let msg = ClientMessage::parse(r#"{"type":"start_stream","subject":9}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::StartStream {
                subject: SubjectId::new(9)
            }
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        let msg = ClientMessage::parse(r#"{"type":"rewind","to":3}"#).unwrap();
        assert_eq!(msg, ClientMessage::Unknown);
    }

    #[test]
    fn test_parse_garbage_is_error() {
        assert!(ClientMessage::parse("not json").is_err());
        assert!(ClientMessage::parse(r#"{"child_id":1}"#).is_err());
    }

    #[test]
    fn test_dashboard_update_shape() {
        let json = ServerMessage::dashboard_update(SubjectId::new(2), AttentionLevel::Low)
            .to_json()
            .unwrap();
        assert!(json.contains("\"type\":\"dashboard_update\""));
        assert!(json.contains("\"child_id\":2"));
        assert!(json.contains("\"attention_level\":\"Low\""));
    }

    #[test]
    fn test_profile_data_time_range() {
        let msg = ServerMessage::profile_data(SubjectId::new(1), 3, AttentionLevel::High, 5);
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"profile_data\""));
        assert!(json.contains("\"window\":4"));
        assert!(json.contains("\"time\":\"15-20s\""));
    }

    #[test]
    fn test_time_range() {
        assert_eq!(time_range(0, 5), "0-5s");
        assert_eq!(time_range(9, 5), "45-50s");
        assert_eq!(time_range(2, 10), "20-30s");
    }
}
