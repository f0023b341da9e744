use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::{ClientError, RestartError};

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Bot => write!(f, "bot"),
        }
    }
}

/// Identifier of a rendered quick-reply button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ButtonId(pub u64);

/// A quick-reply button as rendered under a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickReply {
    pub id: ButtonId,
    pub title: String,
    pub payload: String,
}

/// One entry of the transcript.
///
/// `text` is always the raw string as typed or received; formatting happens
/// at render time only. Buttons are a render extra and are not persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    pub time: String,
    #[serde(skip)]
    pub buttons: Vec<QuickReply>,
}

impl Message {
    pub fn new(sender: Sender, text: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            time: time.into(),
            buttons: Vec::new(),
        }
    }
}

/// Button as it arrives from the webhook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonSpec {
    pub title: String,
    #[serde(default)]
    pub payload: String,
}

/// One unit of a bot's multi-part answer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplySegment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buttons: Option<Vec<ButtonSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<serde_json::Value>,
}

impl ReplySegment {
    #[cfg(test)]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Webhook reachability as seen by the last probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Work the controller asks the runtime to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send `text` to the webhook now
    Dispatch { epoch: u64, text: String },
    /// Send `text` again once `delay` has passed
    ScheduleRetry {
        epoch: u64,
        text: String,
        delay: Duration,
    },
    /// Render one reply segment once `delay` has passed
    RenderSegment {
        epoch: u64,
        delay: Duration,
        segment: ReplySegment,
    },
    /// Ask the agent to forget the conversation
    Restart { epoch: u64 },
    /// Drop the press highlight on a button
    ClearHighlight { button: ButtonId, delay: Duration },
}

/// Outcomes reported back to the controller by the runtime
#[derive(Debug)]
pub enum AppEvent {
    ReplyReceived {
        epoch: u64,
        text: String,
        result: Result<Vec<ReplySegment>, ClientError>,
    },
    RetryDue { epoch: u64, text: String },
    SegmentDue { epoch: u64, segment: ReplySegment },
    RestartFinished {
        epoch: u64,
        result: Result<(), RestartError>,
    },
    HighlightExpired { button: ButtonId },
    StatusChecked(ConnectionStatus),
}
