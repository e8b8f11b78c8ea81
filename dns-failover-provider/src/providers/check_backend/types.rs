//! Check backend wire types (NDJSON envelope)

use serde::{Deserialize, Serialize};

use crate::types::{ProbeProgress, ProbeReport};

/// `code` of a progress line.
pub const CODE_PROGRESS: i32 = 1;
/// `code` of the terminal line.
pub const CODE_RESULT: i32 = 0;

/// Request body shared by `tcp_checks` and `resolve_ip`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequestBody {
    pub target: String,
    #[serde(default)]
    pub port: u16,
    pub key: String,
}

/// One line of a backend response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendEnvelope<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl BackendEnvelope<ProbeProgress> {
    pub fn progress(progress: ProbeProgress) -> Self {
        Self {
            code: CODE_PROGRESS,
            message: "progress".to_string(),
            data: Some(progress),
        }
    }
}

impl BackendEnvelope<ProbeReport> {
    pub fn result(report: ProbeReport) -> Self {
        Self {
            code: CODE_RESULT,
            message: "success".to_string(),
            data: Some(report),
        }
    }
}

impl BackendEnvelope<()> {
    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// A decoded line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendLine {
    Progress(ProbeProgress),
    Result(ProbeReport),
    /// Any other code: an error reported in-band by the backend.
    Error { code: i32, message: String },
}

impl BackendLine {
    /// Decode one NDJSON line (without its trailing newline).
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let envelope: BackendEnvelope<serde_json::Value> = serde_json::from_str(line)?;
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        match envelope.code {
            CODE_PROGRESS => Ok(Self::Progress(serde_json::from_value(data)?)),
            CODE_RESULT => Ok(Self::Result(serde_json::from_value(data)?)),
            code => Ok(Self::Error {
                code,
                message: envelope.message,
            }),
        }
    }
}
