//! 类型定义模块

mod admin;
mod domain;
mod forward;
mod import;
mod progress;
mod report;

pub use admin::{Access, Admin, ChatUser, ROLE_ADMIN, Registration};
pub use domain::{Domain, DomainEdit, DomainField, DomainWithForwards, NewDomain};
pub use forward::{Forward, ForwardField, NewForward, RecordKind, ResolveStatus};
pub use import::{IMPORT_FIELDS, ImportDomain, ImportForward, ImportRecord, ImportSummary};
pub(crate) use progress::emit;
pub use progress::{CheckEvent, CheckEventReceiver, CheckEventSender};
pub use report::{
    CheckReport, CommitFailure, DisconnectReason, DomainFailure, DomainSwitch, NoForwardEntry,
    NoForwardReason,
};

// Re-export provider 库的公共类型
pub use dns_failover_provider::{DnsRecord, ProbeProgress, ProbeReport};
