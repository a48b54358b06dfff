//! Component C4: the privacy gateway, the audit trail, and the admission
//! path that ties every other component together.

pub mod audit;
pub mod service;

pub use audit::{AuditRecord, AuditSink, AuditStatus, VecAuditSink};
pub use service::{HistoryLookup, PrivacyGateway, QueryResponse, ResetRequest};
