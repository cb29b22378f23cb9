// Line-delimited JSON protocol shared with the chat worker process.
//
// Every message, in either direction, is a single compact JSON object followed
// by one newline. The codec knows nothing about ordering; the write/read
// pairing discipline lives in the worker supervisor's call lock.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire command tags understood by the worker process and the UI surface.
///
/// The tags are stable strings shared with the worker script and the embedded
/// web app, so they are plain constants rather than an enum.
pub mod cmd {
    /// Worker-side failure response; `data.error` carries the message.
    pub const SUBMODULE_ERROR: &str = "SUBMODULE_ERROR";

    // Host -> UI surface.
    pub const SET_WEBAPP_LOADING_TEXT: &str = "SET_WEBAPP_LOADING_TEXT";
    pub const SET_WEBAPP_LOADING: &str = "SET_WEBAPP_LOADING";
    pub const DID_LOAD_SETTINGS: &str = "DID_LOAD_SETTINGS";
    pub const DID_FINISH_STARTUP: &str = "DID_FINISH_STARTUP";
    pub const STOP_LOADERS: &str = "STOP_LOADERS";
    pub const DID_SELECT_DOCUMENTS: &str = "DID_SELECT_DOCUMENTS";
    pub const DID_CLOSE_DOCUMENT_BROWSER_NO_SELECTIONS: &str =
        "DID_CLOSE_DOCUMENT_BROWSER_NO_SELECTIONS";

    // Host -> worker requests.
    pub const ASK_CONVERSATION_DOCUMENTS: &str = "ASK_CONVERSATION_DOCUMENTS";
    pub const ASK_CONVERSATION_NO_DOCUMENTS: &str = "ASK_CONVERSATION_NO_DOCUMENTS";
    pub const ADD_DOCUMENTS: &str = "ADD_DOCUMENTS";
    pub const SPLIT_DOCUMENT: &str = "SPLIT_DOCUMENT";
    pub const EXPLAIN_TOPIC: &str = "EXPLAIN_TOPIC";
    pub const GENERATE_CARDS: &str = "GENERATE_CARDS";
    pub const CLEAR_CONVERSATION: &str = "CLEAR_CONVERSATION";
    pub const DELETE_ALL_DOCUMENTS: &str = "DELETE_ALL_DOCUMENTS";
    pub const SET_OPENAI_API_KEY: &str = "SET_OPENAI_API_KEY";
    pub const SET_MODEL: &str = "SET_MODEL";
}

/// One protocol message.
///
/// Used for host->worker requests, worker->host responses, and UI-bound
/// pushes. `command_id` correlates a request with a later UI-originated
/// follow-up (e.g. a file-picker result); it does not correlate call/response
/// pairs, which are strictly synchronous on the pipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub cmd: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(
        rename = "commandId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub command_id: Option<i64>,
}

impl CommandMessage {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            data: None,
            command_id: None,
        }
    }

    pub fn with_data(cmd: &str, data: Value) -> Self {
        Self {
            cmd: cmd.to_string(),
            data: Some(data),
            command_id: None,
        }
    }

    /// Pull a string field out of the `data` payload, if present.
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.as_ref()?.get(key)?.as_str()
    }
}

/// Errors from encoding or decoding a protocol line.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid JSON on protocol line: {raw}")]
    InvalidJson {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("protocol message is missing the `cmd` field: {raw}")]
    MissingCmd { raw: String },

    #[error("readiness message has no `status` field: {raw}")]
    MissingStatus { raw: String },

    #[error("failed to serialize protocol message")]
    Serialize(#[source] serde_json::Error),
}

/// Encode one message as a compact JSON object plus a trailing newline.
///
/// Compact serialization escapes any newline inside string values, so the
/// produced bytes contain exactly one `\n`, at the end.
pub fn encode(message: &CommandMessage) -> Result<Vec<u8>, ProtocolError> {
    let mut bytes = serde_json::to_vec(message).map_err(ProtocolError::Serialize)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode one protocol line into a message.
///
/// Fails with [`ProtocolError::InvalidJson`] if the line is not a JSON object
/// and with [`ProtocolError::MissingCmd`] if the object has no `cmd` tag.
pub fn decode(line: &str) -> Result<CommandMessage, ProtocolError> {
    let trimmed = line.trim();

    let value: Value = serde_json::from_str(trimmed).map_err(|source| ProtocolError::InvalidJson {
        raw: trimmed.to_string(),
        source,
    })?;

    if value.get("cmd").and_then(Value::as_str).is_none() {
        return Err(ProtocolError::MissingCmd {
            raw: trimmed.to_string(),
        });
    }

    serde_json::from_value(value).map_err(|source| ProtocolError::InvalidJson {
        raw: trimmed.to_string(),
        source,
    })
}
