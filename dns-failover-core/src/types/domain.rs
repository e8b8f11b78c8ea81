//! 主域名类型定义

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Forward;

/// A managed `hostname:port` under failover control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    pub id: i64,
    /// Fully-qualified name, also the DNS record name that gets rewritten.
    pub domain: String,
    pub port: u16,
    /// Provider record ID; empty until resolved during onboarding.
    #[serde(default)]
    pub record_id: String,
    /// Provider zone ID; empty until resolved during onboarding.
    #[serde(default)]
    pub zone_id: String,
    #[serde(default)]
    pub is_disable_check: bool,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "crate::utils::datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Domain {
    /// `domain:port`, the key used in reports and imports.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.domain, self.port)
    }

    /// Whether both provider ids needed for a commit are known.
    #[must_use]
    pub fn has_dns_target(&self) -> bool {
        !self.record_id.is_empty() && !self.zone_id.is_empty()
    }
}

/// Insert payload for a domain row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewDomain {
    pub domain: String,
    pub port: u16,
    pub record_id: String,
    pub zone_id: String,
    pub is_disable_check: bool,
    pub sort_order: i32,
}

/// Editable domain fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainField {
    Name,
    Port,
    SortOrder,
}

impl FromStr for DomainField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "domain" => Ok(Self::Name),
            "port" => Ok(Self::Port),
            "sort" | "sort_order" => Ok(Self::SortOrder),
            other => Err(CoreError::ValidationError(format!(
                "unknown domain field '{other}' (expected name, port or sort)"
            ))),
        }
    }
}

impl fmt::Display for DomainField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Name => "name",
            Self::Port => "port",
            Self::SortOrder => "sort",
        })
    }
}

/// A domain together with its forwards in selector order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainWithForwards {
    pub domain: Domain,
    pub forwards: Vec<Forward>,
}

/// Result of a domain edit. Renames may leave the provider ids unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainEdit {
    pub domain: Domain,
    pub warning: Option<String>,
}
