//! 检测报告类型定义

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::RecordKind;

/// Simplified reason a primary domain could not be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    Timeout,
    Refused,
    Unreachable,
    Other,
}

impl DisconnectReason {
    /// Classify a backend message.
    #[must_use]
    pub fn classify(message: &str) -> Self {
        let message = message.to_ascii_lowercase();
        if message.contains("timeout") || message.contains("timed out") {
            Self::Timeout
        } else if message.contains("refused") {
            Self::Refused
        } else if message.contains("no route") || message.contains("unreachable") {
            Self::Unreachable
        } else {
            Self::Other
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timeout => "connection timed out",
            Self::Refused => "connection refused",
            Self::Unreachable => "network unreachable",
            Self::Other => "cannot connect",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFailure {
    pub domain: String,
    pub port: u16,
    pub reason: DisconnectReason,
}

/// A completed DNS switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSwitch {
    pub domain: String,
    pub port: u16,
    pub record_type: RecordKind,
    /// Content written to the record.
    pub new_record: String,
    pub forward_domain: String,
    pub isp: String,
    pub weight: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoForwardReason {
    /// The domain has no forwards at all.
    NoneConfigured,
    /// Every forward is banned or unreachable.
    NoneAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoForwardEntry {
    pub domain: String,
    pub port: u16,
    pub reason: NoForwardReason,
}

/// A healthy forward was selected but the record could not be rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitFailure {
    pub domain: String,
    pub port: u16,
    pub forward_domain: String,
    pub reason: String,
}

/// Outcomes of one cycle, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CheckReport {
    /// `domain:port` whose primary probe hit an infrastructure failure.
    pub failed_domains: Vec<String>,
    pub disconnected: Vec<DomainFailure>,
    /// Forward domains banned during this cycle.
    pub banned_forwards: Vec<String>,
    pub switched: Vec<DomainSwitch>,
    pub no_forward: Vec<NoForwardEntry>,
    pub commit_failures: Vec<CommitFailure>,
    /// Primaries that answered reachable.
    pub healthy_count: usize,
}

impl CheckReport {
    /// No category has an entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failed_domains.is_empty() && !self.has_incidents()
    }

    /// Anything besides infrastructure failures happened.
    #[must_use]
    pub fn has_incidents(&self) -> bool {
        !self.disconnected.is_empty()
            || !self.banned_forwards.is_empty()
            || !self.switched.is_empty()
            || !self.no_forward.is_empty()
            || !self.commit_failures.is_empty()
    }
}
