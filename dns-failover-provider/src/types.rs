//! Shared request/response types for the remote capabilities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Terminal message fragments emitted by a check backend whose attempts were all used up.
const EXHAUSTED_MARKER: &str = "检测结束";
const UNREACHABLE_MARKER: &str = "无法连接";

/// DNS record kinds the failover controller can point at a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RecordKind {
    /// Content is the candidate's probed IPv4 address.
    #[default]
    A,
    /// Content is the candidate's hostname.
    #[serde(rename = "CNAME")]
    Cname,
}

impl RecordKind {
    /// Upper-case wire name (`A` / `CNAME`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::Cname => "CNAME",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" => Ok(Self::A),
            "CNAME" => Ok(Self::Cname),
            other => Err(ProviderError::UnsupportedRecordType {
                provider: "dns-failover".to_string(),
                record_type: other.to_string(),
            }),
        }
    }
}

/// "Set record content" request keyed by provider record ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordUpdate {
    pub zone_id: String,
    pub record_id: String,
    pub kind: RecordKind,
    /// Fully-qualified record name.
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: bool,
}

/// A DNS record as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    pub id: String,
    pub zone_id: String,
    /// Raw record type string; may be a kind the controller never writes.
    pub record_type: String,
    pub name: String,
    pub content: String,
    pub ttl: u32,
    pub proxied: Option<bool>,
}

/// One progress line from a streaming probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeProgress {
    /// 1-based attempt number.
    pub current: u32,
    pub total: u32,
    pub target: String,
    /// `ip:port` being dialled.
    pub address: String,
}

/// Terminal answer of a reachability probe or IP resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProbeReport {
    /// `true` when a TCP connection was established.
    #[serde(rename = "result")]
    pub reachable: bool,
    pub target: String,
    /// First resolved address, empty if resolution failed.
    #[serde(default)]
    pub target_ip: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub backend_public_ip: String,
    /// Explicit "every attempt failed" flag; absent on older backends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exhausted: Option<bool>,
}

impl ProbeReport {
    /// Whether the backend used up all attempts without connecting.
    ///
    /// This is the only negative answer that justifies an automatic ban. A
    /// resolution failure or any other non-terminal message is not.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        if self.reachable {
            return false;
        }
        match self.exhausted {
            Some(flag) => flag,
            None => {
                self.message.contains(EXHAUSTED_MARKER) && self.message.contains(UNREACHABLE_MARKER)
            }
        }
    }
}

/// Sender half used to stream probe progress to whoever is watching.
pub type ProbeProgressSender = tokio::sync::mpsc::UnboundedSender<ProbeProgress>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_kind_parses_case_insensitively() {
        assert_eq!("a".parse::<RecordKind>().unwrap(), RecordKind::A);
        assert_eq!(" cname ".parse::<RecordKind>().unwrap(), RecordKind::Cname);
        assert!(matches!(
            "AAAA".parse::<RecordKind>(),
            Err(ProviderError::UnsupportedRecordType { record_type, .. }) if record_type == "AAAA"
        ));
    }

    #[test]
    fn exhausted_uses_explicit_flag_first() {
        let report = ProbeReport {
            reachable: false,
            message: "anything".to_string(),
            exhausted: Some(true),
            ..ProbeReport::default()
        };
        assert!(report.is_exhausted());
    }

    #[test]
    fn exhausted_falls_back_to_message_markers() {
        let report = ProbeReport {
            reachable: false,
            message: "检测结束,目标 1.2.3.4:443无法连接: i/o timeout".to_string(),
            ..ProbeReport::default()
        };
        assert!(report.is_exhausted());
    }

    #[test]
    fn resolution_failure_is_not_exhaustion() {
        let report = ProbeReport {
            reachable: false,
            message: "cannot resolve target example.invalid".to_string(),
            ..ProbeReport::default()
        };
        assert!(!report.is_exhausted());
    }

    #[test]
    fn reachable_is_never_exhausted() {
        let report = ProbeReport {
            reachable: true,
            exhausted: Some(true),
            ..ProbeReport::default()
        };
        assert!(!report.is_exhausted());
    }

    #[test]
    fn probe_report_reads_backend_field_names() {
        let json = r#"{"result":true,"target":"a.example.com","target_ip":"1.2.3.4","message":"","backend_public_ip":"5.6.7.8"}"#;
        let report: ProbeReport = serde_json::from_str(json).unwrap();
        assert!(report.reachable);
        assert_eq!(report.target_ip, "1.2.3.4");
        assert_eq!(report.exhausted, None);
    }
}
