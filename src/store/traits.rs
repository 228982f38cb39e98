//! Store trait definitions
//!
//! These traits define the abstract interfaces for data access operations.
//! Different implementations can provide different storage backends.

use uuid::Uuid;

use crate::claim::StageClaim;
use crate::document::{Document, HistoryEntry};
use crate::error::ConformaResult;
use crate::status::Stage;
use crate::vault::StoredSignature;

/// Store for documents and stage claims
///
/// `transaction` opens an exclusive write transaction; every check-then-act
/// sequence in the engine runs entirely inside one. Readers use the plain
/// methods and never block a writer's invariants.
pub trait WorkflowStore: Send + Sync {
    /// Open an exclusive write transaction
    ///
    /// A store that cannot grant exclusivity right now returns Conflict so
    /// the loser of a claim race observes the documented error, not a wait.
    fn transaction(&self) -> ConformaResult<Box<dyn StoreTransaction + '_>>;

    /// Create a document row (intake)
    fn insert_document(&self, document: &Document) -> ConformaResult<()>;

    /// Load a document by id
    fn document(&self, id: Uuid) -> ConformaResult<Option<Document>>;

    /// Full history of a document, in commit order
    fn history(&self, id: Uuid) -> ConformaResult<Vec<HistoryEntry>>;

    /// All claim rows for a document at a stage
    fn claims_for(&self, id: Uuid, stage: Stage) -> ConformaResult<Vec<StageClaim>>;

    /// Check if a document exists
    fn has_document(&self, id: Uuid) -> ConformaResult<bool> {
        Ok(self.document(id)?.is_some())
    }
}

/// One open exclusive transaction against a `WorkflowStore`
///
/// Dropping an uncommitted transaction rolls back every write.
pub trait StoreTransaction {
    /// Load a document under the transaction's lock
    fn document(&mut self, id: Uuid) -> ConformaResult<Option<Document>>;

    /// Persist status/holder changes to a document
    fn update_document(&mut self, document: &Document) -> ConformaResult<()>;

    /// Append one immutable history entry
    fn append_history(&mut self, document_id: Uuid, entry: &HistoryEntry) -> ConformaResult<()>;

    /// The claim currently in the `claimed` state at this stage, if any
    fn active_claim(&mut self, document_id: Uuid, stage: Stage)
        -> ConformaResult<Option<StageClaim>>;

    /// This actor's claim row at this stage, whatever its state
    fn claim_by_actor(
        &mut self,
        document_id: Uuid,
        stage: Stage,
        actor_id: &str,
    ) -> ConformaResult<Option<StageClaim>>;

    /// Insert or update a claim row, keyed by (document, stage, claimant)
    fn upsert_claim(&mut self, claim: &StageClaim) -> ConformaResult<()>;

    /// Commit every write made under this transaction
    fn commit(self: Box<Self>) -> ConformaResult<()>;
}

/// Store for enrolled, encrypted signatures
///
/// Signatures are created once at enrollment and read-only thereafter, so
/// there is no update or delete surface.
pub trait SignatureRepository: Send + Sync {
    /// Persist an enrolled signature
    fn save_signature(&self, signature: &StoredSignature) -> ConformaResult<()>;

    /// Load a signature by id
    fn load_signature(&self, id: Uuid) -> ConformaResult<Option<StoredSignature>>;

    /// Check if a signature exists
    fn has_signature(&self, id: Uuid) -> ConformaResult<bool> {
        Ok(self.load_signature(id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::SignatureKind;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // Mock implementation exercising the default methods
    struct MockSignatureRepository {
        signatures: Mutex<HashMap<Uuid, StoredSignature>>,
    }

    impl SignatureRepository for MockSignatureRepository {
        fn save_signature(&self, signature: &StoredSignature) -> ConformaResult<()> {
            self.signatures
                .lock()
                .unwrap()
                .insert(signature.id, signature.clone());
            Ok(())
        }

        fn load_signature(&self, id: Uuid) -> ConformaResult<Option<StoredSignature>> {
            Ok(self.signatures.lock().unwrap().get(&id).cloned())
        }
    }

    #[test]
    fn test_signature_repository_default_methods() {
        let repo = MockSignatureRepository {
            signatures: Mutex::new(HashMap::new()),
        };

        let sig = StoredSignature {
            id: Uuid::new_v4(),
            owner_id: "u-1".to_string(),
            kind: SignatureKind::RasterImage,
            algorithm: "AES-256-GCM".to_string(),
            nonce: vec![0u8; 12],
            tag: vec![0u8; 16],
            ciphertext: vec![1, 2, 3],
        };

        assert!(!repo.has_signature(sig.id).unwrap());
        repo.save_signature(&sig).unwrap();
        assert!(repo.has_signature(sig.id).unwrap());

        let loaded = repo.load_signature(sig.id).unwrap().unwrap();
        assert_eq!(loaded.owner_id, "u-1");
    }
}
