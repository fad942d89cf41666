// Push channel envelopes. Every frame is a JSON object; the `type` field
// picks the variant and the body sits under `payload` (or, for older
// channels, directly in the envelope next to `type`).
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::common::models::{Activity, Message, Milestone};
use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    /// A message landed in a thread.
    NewMessage { thread_id: String, message: Message },
    /// Partial contract fields, always carrying the contract `id`.
    ContractUpdate(Map<String, Value>),
    /// A single milestone changed inside a contract.
    MilestoneUpdate { contract_id: Option<String>, milestone: Milestone },
    /// Partial dashboard counters.
    Analytics(Map<String, Value>),
    /// One new entry for the dashboard activity feed.
    Activity(Activity),
    /// Full or partial entity pushed without a discriminator.
    Replace(Map<String, Value>),
    /// Anything we do not understand. Views ignore it.
    Unknown(String),
}

impl PushEvent {
    pub fn kind(&self) -> &str {
        match self {
            PushEvent::NewMessage { .. } => "new_message",
            PushEvent::ContractUpdate(_) => "contract_update",
            PushEvent::MilestoneUpdate { .. } => "milestone_update",
            PushEvent::Analytics(_) => "analytics",
            PushEvent::Activity(_) => "activity",
            PushEvent::Replace(_) => "replace",
            PushEvent::Unknown(kind) => kind,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewMessageBody {
    #[serde(alias = "thread_id")]
    thread_id: String,
    message: Message,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MilestoneBody {
    #[serde(default, alias = "contract_id")]
    contract_id: Option<String>,
    milestone: Milestone,
}

/// Parses one text frame from a push channel.
pub fn parse_push_event(text: &str) -> Result<PushEvent, ClientError> {
    let generic: Value = serde_json::from_str(text)
        .map_err(|e| ClientError::PushPayload(format!("invalid JSON: {}", e)))?;

    let Value::Object(mut envelope) = generic else {
        return Err(ClientError::PushPayload("expected a JSON object".to_string()));
    };

    let kind = match envelope.remove("type") {
        None => return Ok(PushEvent::Replace(envelope)),
        Some(Value::String(kind)) => kind,
        Some(other) => {
            return Err(ClientError::PushPayload(format!("'type' must be a string, got {}", other)))
        }
    };
    let body = take_body(envelope);

    match kind.as_str() {
        "new_message" => {
            let parsed: NewMessageBody = decode_body(&kind, body)?;
            Ok(PushEvent::NewMessage { thread_id: parsed.thread_id, message: parsed.message })
        }
        "contract_update" => Ok(PushEvent::ContractUpdate(object_body(&kind, body)?)),
        "milestone_update" => {
            let parsed: MilestoneBody = decode_body(&kind, body)?;
            Ok(PushEvent::MilestoneUpdate { contract_id: parsed.contract_id, milestone: parsed.milestone })
        }
        "analytics" => Ok(PushEvent::Analytics(object_body(&kind, body)?)),
        "activity" => Ok(PushEvent::Activity(decode_body(&kind, body)?)),
        "replace" => Ok(PushEvent::Replace(object_body(&kind, body)?)),
        _ => Ok(PushEvent::Unknown(kind)),
    }
}

fn take_body(mut envelope: Map<String, Value>) -> Value {
    match envelope.remove("payload") {
        Some(payload) => payload,
        None => Value::Object(envelope),
    }
}

fn object_body(kind: &str, body: Value) -> Result<Map<String, Value>, ClientError> {
    match body {
        Value::Object(map) => Ok(map),
        other => Err(ClientError::PushPayload(format!("{} payload must be an object, got {}", kind, other))),
    }
}

fn decode_body<T: for<'de> Deserialize<'de>>(kind: &str, body: Value) -> Result<T, ClientError> {
    serde_json::from_value(body).map_err(|e| ClientError::PushPayload(format!("bad {} payload: {}", kind, e)))
}
