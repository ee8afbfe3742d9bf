//! Audit logging capability used by the audited variant

use tracing::{error, warn};

use crate::error::RetrievalError;

pub const MFA_NOT_VERIFIED: &str = "MFA not verified! Triggering security alert.";

/// Line logged when retrieval fails
pub fn retrieval_failed(err: &RetrievalError) -> String {
    format!("Error retrieving secret: {err}")
}

/// Leveled sink for audit lines, configured once at process start
pub trait AuditLog: Send + Sync {
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

/// Writes audit lines to the process-wide `tracing` subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditLog;

impl AuditLog for TracingAuditLog {
    fn warn(&self, message: &str) {
        warn!(target: "secretfetch::audit", "{message}");
    }

    fn error(&self, message: &str) {
        error!(target: "secretfetch::audit", "{message}");
    }
}
