//! 导入导出类型定义

use serde::{Deserialize, Serialize};

use crate::types::RecordKind;

/// Field count of one import/export line:
/// `domain|port|is_disable|sort_order|forward_domain|ip|isp|is_ban|weight|forward_sort|record_type`
pub const IMPORT_FIELDS: usize = 11;

/// One parsed import line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    /// 1-based source line.
    pub line: usize,
    pub domain: String,
    pub port: u16,
    pub is_disable_check: bool,
    pub sort_order: i32,
    pub forward_domain: String,
    pub ip: String,
    pub isp: String,
    pub is_ban: bool,
    pub weight: i32,
    pub forward_sort: i32,
    pub record_type: RecordKind,
}

/// Forward part of an import, grouped under its domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportForward {
    pub forward_domain: String,
    pub ip: String,
    pub isp: String,
    pub is_ban: bool,
    pub weight: i32,
    pub sort_order: i32,
    pub record_type: RecordKind,
}

/// Import rows merged by `domain:port`, in first-seen order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDomain {
    pub domain: String,
    pub port: u16,
    pub is_disable_check: bool,
    pub sort_order: i32,
    pub forwards: Vec<ImportForward>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub domains_created: usize,
    pub domains_updated: usize,
    pub forwards_added: usize,
    /// Already present under the same domain.
    pub forwards_skipped: usize,
}
