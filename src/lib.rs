//! Conforma: staged review workflow for contract payment files
//!
//! A payment file moves through a fixed sequence of review stages
//! (supervisor, auditoria, contabilidad, tesoreria, gerencia, rendicion).
//! At each stage exactly one reviewer at a time holds custody via an
//! exclusive claim, attaches the stage's required artifacts, and finalizes
//! with an approve/observe/reject decision. Approvals at signing stages
//! embed the reviewer's enrolled handwritten signature into the stage's
//! payment voucher PDF.

pub mod audit;
pub mod claim;
pub mod document;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod logger;
pub mod pdf;
pub mod stage_config;
pub mod status;
pub mod store;
pub mod vault;

pub use claim::{ClaimHandle, ClaimState, Decision, StageClaim};
pub use document::{Actor, Document, HistoryEntry};
pub use engine::{SignatureRequest, StageWorkflowEngine};
pub use error::{ConformaError, ConformaResult, ErrorKind};
pub use pdf::{PdfSignatureEmbedder, SignRegion, SignatureKind};
pub use stage_config::StageConfig;
pub use status::{DocumentStatus, Stage};
pub use store::{SignatureRepository, SqliteStore, StoreTransaction, WorkflowStore};
pub use vault::{SignatureArtifact, SignatureVault, StoredSignature};
