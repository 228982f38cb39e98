//! Best-effort per-document audit trail
//!
//! One human-readable line per state transition, appended to a text file
//! under the document root. Writes happen after the transaction commits
//! and never fail the caller: an unwritable audit file is logged and
//! swallowed.

use sha2::{Digest, Sha256};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::document::Document;
use crate::logger::{LogLevel, LOGGER};

pub struct AuditTrail;

impl AuditTrail {
    /// Append one line to the document's audit log, best-effort
    pub fn append(document: &Document, line: &str) {
        let path = document.audit_log_path();
        if let Err(e) = Self::try_append(&path, line) {
            LOGGER.log(
                LogLevel::Warn,
                &format!("Audit append failed for {}: {}", path.display(), e),
                "audit",
            );
        }
    }

    fn try_append(path: &Path, line: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)
    }

    /// SHA-256 fingerprint of an artifact file, when readable
    ///
    /// Recorded alongside artifact lines so the trail pins down what was
    /// reviewed; an unreadable file yields no fingerprint rather than an
    /// error.
    pub fn fingerprint(path: &Path) -> Option<String> {
        let bytes = std::fs::read(path).ok()?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Some(hex::encode(hasher.finalize()))
    }
}
