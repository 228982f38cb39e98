//! Documents, actors, and the append-only history log

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::status::{DocumentStatus, Stage};

/// Authenticated staff identity, as handed in by the request layer
///
/// Role eligibility has already been checked upstream; the core only
/// records who acted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub role: String,
}

impl Actor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
        }
    }
}

/// The unit of work routed through the review sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,

    /// Business reference number, e.g. "EXP-2024-0173"
    pub reference: String,

    pub status: DocumentStatus,

    /// Staff id currently reviewing, non-null iff status is in-review
    pub holder_id: Option<String>,

    /// Filesystem root under which stage subfolders live
    pub root_path: PathBuf,
}

impl Document {
    /// Create a new document in the intake status
    pub fn new(reference: impl Into<String>, root_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            reference: reference.into(),
            status: DocumentStatus::Presentado,
            holder_id: None,
            root_path: root_path.into(),
        }
    }

    /// Stage-scoped subfolder where this stage's artifacts live
    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root_path.join(stage.as_str())
    }

    /// Where the per-document audit trail file lives
    pub fn audit_log_path(&self) -> PathBuf {
        self.root_path.join("audit.log")
    }
}

/// Immutable value appended to the document history on every status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub at: DateTime<Utc>,

    /// Status the document ended up in
    pub status: DocumentStatus,

    pub actor_id: String,
    pub actor_name: String,
    pub actor_role: String,

    pub note: String,
}

impl HistoryEntry {
    pub fn record(status: DocumentStatus, actor: &Actor, note: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            status,
            actor_id: actor.id.clone(),
            actor_name: actor.name.clone(),
            actor_role: actor.role.clone(),
            note: note.into(),
        }
    }

    /// One line of human-readable text for the audit trail
    pub fn audit_line(&self) -> String {
        format!(
            "{} [{}] {} ({}) -> {}: {}",
            self.at.to_rfc3339(),
            self.actor_role,
            self.actor_name,
            self.actor_id,
            self.status,
            self.note
        )
    }
}

/// True if the path points at something under the document root
///
/// Artifact paths are recorded verbatim; this is only used by callers that
/// want to sanity-check a slot before display.
pub fn is_under_root(root: &Path, candidate: &Path) -> bool {
    candidate.starts_with(root)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_document_is_presentado() {
        let doc = Document::new("EXP-2024-0001", "/var/conforma/EXP-2024-0001");
        assert_eq!(doc.status, DocumentStatus::Presentado);
        assert!(doc.holder_id.is_none());
    }

    #[test]
    fn test_stage_dir_layout() {
        let doc = Document::new("EXP-2024-0001", "/var/conforma/EXP-2024-0001");
        assert_eq!(
            doc.stage_dir(Stage::Tesoreria),
            PathBuf::from("/var/conforma/EXP-2024-0001/tesoreria")
        );
        assert_eq!(
            doc.audit_log_path(),
            PathBuf::from("/var/conforma/EXP-2024-0001/audit.log")
        );
    }

    #[test]
    fn test_audit_line_contents() {
        let actor = Actor::new("u-7", "Alice Quispe", "tesorero");
        let entry = HistoryEntry::record(DocumentStatus::TesoreriaAprobado, &actor, "pago emitido");
        let line = entry.audit_line();
        assert!(line.contains("Alice Quispe"));
        assert!(line.contains("TESORERIA_APROBADO"));
        assert!(line.contains("pago emitido"));
    }

    #[test]
    fn test_is_under_root() {
        let root = Path::new("/var/conforma/doc1");
        assert!(is_under_root(root, Path::new("/var/conforma/doc1/tesoreria/a.pdf")));
        assert!(!is_under_root(root, Path::new("/var/conforma/doc2/a.pdf")));
    }
}
