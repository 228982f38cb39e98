use thiserror::Error;

/// Stable error classification surfaced to callers
///
/// Every operation either succeeds completely or fails with one of these
/// kinds plus a human-readable reason. Nothing is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Document, claim, or signature absent (or not owned by the actor)
    NotFound,

    /// Claim already held, or the caller lost a claim race
    Conflict,

    /// Operation not valid from the current state (missing artifacts,
    /// missing note, missing signature, unknown slot, undecodable image)
    InvalidState,

    /// Actor lacks the active claim they are trying to act on
    Forbidden,

    /// Signature fails authentication or decrypts implausibly
    DataCorrupt,

    /// PDF load/save or other file/database I/O failed
    StorageFailure,
}

/// Central error type for the conforma workflow core
#[derive(Error, Debug)]
pub enum ConformaError {
    // ============================================================================
    // Workflow Errors
    // ============================================================================
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Document is not claimable at this stage: {0}")]
    NotClaimable(String),

    #[error("No active claim: {0}")]
    NoActiveClaim(String),

    #[error("Document already claimed: {0}")]
    ClaimConflict(String),

    #[error("Actor does not hold the active claim: {0}")]
    NotClaimHolder(String),

    #[error("Required artifact slot is empty: {0}")]
    MissingArtifact(String),

    #[error("Unknown artifact slot: {0}")]
    UnknownSlot(String),

    #[error("Observation required: {0}")]
    ObservationRequired(String),

    #[error("Signature required: {0}")]
    SignatureRequired(String),

    #[error("Invalid claim transition: {0}")]
    InvalidTransition(String),

    // ============================================================================
    // Signature Vault Errors
    // ============================================================================
    #[error("Signature not found: {0}")]
    SignatureNotFound(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Signature data corrupt: {0}")]
    SignatureCorrupt(String),

    // ============================================================================
    // PDF Errors
    // ============================================================================
    #[error("Failed to load PDF: {0}")]
    PdfLoadFailed(String),

    #[error("Failed to save PDF: {0}")]
    PdfSaveFailed(String),

    #[error("Page out of range: {0}")]
    PageOutOfRange(String),

    #[error("Signature image could not be decoded as PNG or JPEG: {0}")]
    ImageDecodeFailed(String),

    #[error("Signature PDF has no pages: {0}")]
    EmptySignaturePdf(String),

    // ============================================================================
    // Storage Errors
    // ============================================================================
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Corrupt stored record: {0}")]
    CorruptRecord(String),

    #[error("Mutex lock error")]
    LockError,
}

impl ConformaError {
    /// Map this error onto the stable caller-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConformaError::DocumentNotFound(_)
            | ConformaError::NotClaimable(_)
            | ConformaError::NoActiveClaim(_)
            | ConformaError::SignatureNotFound(_)
            | ConformaError::PageOutOfRange(_) => ErrorKind::NotFound,

            ConformaError::ClaimConflict(_) => ErrorKind::Conflict,

            ConformaError::MissingArtifact(_)
            | ConformaError::UnknownSlot(_)
            | ConformaError::ObservationRequired(_)
            | ConformaError::SignatureRequired(_)
            | ConformaError::InvalidTransition(_)
            | ConformaError::ImageDecodeFailed(_)
            | ConformaError::EmptySignaturePdf(_) => ErrorKind::InvalidState,

            ConformaError::NotClaimHolder(_) => ErrorKind::Forbidden,

            ConformaError::SignatureCorrupt(_) => ErrorKind::DataCorrupt,

            ConformaError::EncryptionFailed(_)
            | ConformaError::PdfLoadFailed(_)
            | ConformaError::PdfSaveFailed(_)
            | ConformaError::Database(_)
            | ConformaError::Io(_)
            | ConformaError::Json(_)
            | ConformaError::CorruptRecord(_)
            | ConformaError::LockError => ErrorKind::StorageFailure,
        }
    }
}

// Implement conversion from PoisonError for Mutex locks
impl<T> From<std::sync::PoisonError<T>> for ConformaError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        ConformaError::LockError
    }
}

// Automatic conversion from base64::DecodeError
impl From<base64::DecodeError> for ConformaError {
    fn from(err: base64::DecodeError) -> Self {
        ConformaError::SignatureCorrupt(format!("Base64 decode error: {}", err))
    }
}

// Helper type alias for Results
pub type ConformaResult<T> = Result<T, ConformaError>;
