//! 转发域名类型定义

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
pub use dns_failover_provider::RecordKind;

/// Whether a forward is the active DNS target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolveStatus {
    #[default]
    Never,
    Success,
    Failed,
}

impl ResolveStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for ResolveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResolveStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "never" => Ok(Self::Never),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(CoreError::ValidationError(format!(
                "unknown resolve status '{other}'"
            ))),
        }
    }
}

/// One failover target backing a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forward {
    pub id: i64,
    pub domain_id: i64,
    pub forward_domain: String,
    /// Last probed IP (also kept for CNAME forwards).
    #[serde(default)]
    pub ip: String,
    /// Free-text carrier label.
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub is_ban: bool,
    /// `None` with `is_ban` set is a permanent ban.
    #[serde(
        rename = "ban_time",
        with = "crate::utils::datetime::zero_none",
        default
    )]
    pub ban_until: Option<DateTime<Utc>>,
    /// Higher wins.
    #[serde(default)]
    pub weight: i32,
    /// Tiebreak for equal weights, lower first.
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub record_type: RecordKind,
    #[serde(with = "crate::utils::datetime::zero_none", default)]
    pub last_resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolve_status: ResolveStatus,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a forward row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewForward {
    pub domain_id: i64,
    pub forward_domain: String,
    pub ip: String,
    pub isp: String,
    pub is_ban: bool,
    pub ban_until: Option<DateTime<Utc>>,
    pub weight: i32,
    pub sort_order: i32,
    pub record_type: RecordKind,
}

/// Editable forward fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardField {
    ForwardDomain,
    Ip,
    Isp,
    Weight,
    SortOrder,
    RecordType,
}

impl FromStr for ForwardField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "domain" | "forward_domain" => Ok(Self::ForwardDomain),
            "ip" => Ok(Self::Ip),
            "isp" => Ok(Self::Isp),
            "weight" => Ok(Self::Weight),
            "sort" | "sort_order" => Ok(Self::SortOrder),
            "type" | "record_type" => Ok(Self::RecordType),
            other => Err(CoreError::ValidationError(format!(
                "unknown forward field '{other}' (expected domain, ip, isp, weight, sort or type)"
            ))),
        }
    }
}

impl fmt::Display for ForwardField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ForwardDomain => "domain",
            Self::Ip => "ip",
            Self::Isp => "isp",
            Self::Weight => "weight",
            Self::SortOrder => "sort",
            Self::RecordType => "type",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_aliases() {
        assert_eq!("type".parse::<ForwardField>().unwrap(), ForwardField::RecordType);
        assert_eq!("SORT".parse::<ForwardField>().unwrap(), ForwardField::SortOrder);
        assert!(matches!(
            "color".parse::<ForwardField>(),
            Err(CoreError::ValidationError(_))
        ));
    }

    #[test]
    fn resolve_status_round_trips_column_values() {
        for status in [ResolveStatus::Never, ResolveStatus::Success, ResolveStatus::Failed] {
            assert_eq!(status.as_str().parse::<ResolveStatus>().unwrap(), status);
        }
        assert_eq!("".parse::<ResolveStatus>().unwrap(), ResolveStatus::Never);
    }

    #[test]
    fn permanent_ban_deserializes_from_zero() {
        let json = r#"{"id":1,"domain_id":2,"forward_domain":"f.example.net","is_ban":true,"ban_time":0,"record_type":"CNAME","created_at":0,"updated_at":0}"#;
        let f: Forward = serde_json::from_str(json).unwrap();
        assert!(f.is_ban);
        assert!(f.ban_until.is_none());
        assert_eq!(f.record_type, RecordKind::Cname);
        assert_eq!(f.resolve_status, ResolveStatus::Never);
    }
}
