//! Stage workflow engine
//!
//! Orchestrates claim -> review -> finalize/release for every stage through
//! one generic implementation parameterized by `StageConfig`. Each
//! operation re-checks its preconditions under an exclusive store
//! transaction (check-then-act runs after the lock is taken), moves the
//! claim and the document ledger together, and commits both or neither.
//! The loser of a claim race always observes Conflict, never a silently
//! overwritten claim.

use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::claim::{ClaimHandle, ClaimState, Decision, StageClaim};
use crate::document::{is_under_root, Actor, Document};
use crate::error::{ConformaError, ConformaResult};
use crate::flow_log;
use crate::ledger::DocumentLedger;
use crate::logger::LogLevel;
use crate::pdf::{PdfSignatureEmbedder, SignRegion};
use crate::stage_config::StageConfig;
use crate::status::Stage;
use crate::store::{StoreTransaction, WorkflowStore};
use crate::vault::SignatureVault;

/// Reference to an enrolled signature plus where to place it
#[derive(Debug, Clone, Copy)]
pub struct SignatureRequest {
    pub signature_id: Uuid,
    pub region: SignRegion,
}

pub struct StageWorkflowEngine {
    store: Arc<dyn WorkflowStore>,
    vault: SignatureVault,
    embedder: PdfSignatureEmbedder,
}

impl StageWorkflowEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, vault: SignatureVault) -> Self {
        Self {
            store,
            vault,
            embedder: PdfSignatureEmbedder::new(),
        }
    }

    /// Register a document arriving from intake, in the `PRESENTADO` status
    pub fn register_document(
        &self,
        reference: impl Into<String>,
        root_path: impl Into<std::path::PathBuf>,
    ) -> ConformaResult<Document> {
        let document = Document::new(reference, root_path);
        self.store.insert_document(&document)?;
        flow_log!(
            LogLevel::Info,
            "Registered document {} ({})",
            document.reference,
            document.id
        );
        Ok(document)
    }

    /// Take exclusive custody of a document at a stage
    ///
    /// First committer wins; there is no queue and no retry. Losers see
    /// Conflict and must re-poll.
    pub fn claim(
        &self,
        document_id: Uuid,
        stage: Stage,
        actor: &Actor,
    ) -> ConformaResult<ClaimHandle> {
        let config = StageConfig::for_stage(stage);
        let mut txn = self.store.transaction()?;

        let mut document = txn
            .document(document_id)?
            .ok_or_else(|| ConformaError::DocumentNotFound(document_id.to_string()))?;

        // Re-check the gate under the lock
        if document.status == config.in_review_status {
            return Err(ConformaError::ClaimConflict(format!(
                "{} already under review at {}",
                document.reference, stage
            )));
        }
        if document.status != config.entry_status {
            return Err(ConformaError::NotClaimable(format!(
                "{} is {} but {} requires {}",
                document.reference, document.status, stage, config.entry_status
            )));
        }
        if let Some(held) = txn.active_claim(document_id, stage)? {
            return Err(ConformaError::ClaimConflict(format!(
                "{} already claimed at {} by {}",
                document.reference, stage, held.actor_id
            )));
        }

        // Re-enter a released row or create one lazily
        let claim = match txn.claim_by_actor(document_id, stage, &actor.id)? {
            Some(mut existing) => {
                if !existing.state.can_transition_to(ClaimState::Claimed) {
                    return Err(ConformaError::InvalidTransition(format!(
                        "claim is {} and cannot be re-claimed",
                        existing.state.as_str()
                    )));
                }
                existing.state = ClaimState::Claimed;
                existing.claimed_at = Some(Utc::now());
                existing.ended_at = None;
                existing
            }
            None => StageClaim::begin(document_id, stage, &actor.id),
        };
        txn.upsert_claim(&claim)?;

        let entry = DocumentLedger::transition(
            txn.as_mut(),
            &mut document,
            config.in_review_status,
            actor,
            &format!("claimed for review at {}", stage),
        )?;
        txn.commit()?;

        AuditTrail::append(&document, &entry.audit_line());
        flow_log!(
            LogLevel::Info,
            "{} claimed {} at {}",
            actor.id,
            document.reference,
            stage
        );

        Ok(ClaimHandle {
            claim_id: claim.id,
            document_id,
            stage,
            actor_id: actor.id.clone(),
            claimed_at: claim.claimed_at.unwrap_or(claim.created_at),
        })
    }

    /// Give up an active claim without a decision
    ///
    /// The document returns to the stage's entry status and becomes
    /// claimable again. Releasing twice raises NotFound: there is no
    /// active claim left to release.
    pub fn release(&self, document_id: Uuid, stage: Stage, actor: &Actor) -> ConformaResult<()> {
        let config = StageConfig::for_stage(stage);
        let mut txn = self.store.transaction()?;

        let mut document = txn
            .document(document_id)?
            .ok_or_else(|| ConformaError::DocumentNotFound(document_id.to_string()))?;
        let mut claim = self.held_claim(txn.as_mut(), document_id, stage, actor)?;

        claim.state = ClaimState::Released;
        claim.ended_at = Some(Utc::now());
        txn.upsert_claim(&claim)?;

        let entry = DocumentLedger::transition(
            txn.as_mut(),
            &mut document,
            config.entry_status,
            actor,
            &format!("released at {}", stage),
        )?;
        txn.commit()?;

        AuditTrail::append(&document, &entry.audit_line());
        flow_log!(
            LogLevel::Info,
            "{} released {} at {}",
            actor.id,
            document.reference,
            stage
        );
        Ok(())
    }

    /// Store an artifact path in one of the stage's named slots
    ///
    /// Slots fill independently and in any order; the document status does
    /// not change.
    pub fn record_artifact(
        &self,
        document_id: Uuid,
        stage: Stage,
        actor: &Actor,
        slot: &str,
        path: &Path,
    ) -> ConformaResult<()> {
        let config = StageConfig::for_stage(stage);
        if !config.declares_slot(slot) {
            return Err(ConformaError::UnknownSlot(format!(
                "{} does not declare slot '{}'",
                stage, slot
            )));
        }

        let mut txn = self.store.transaction()?;
        let document = txn
            .document(document_id)?
            .ok_or_else(|| ConformaError::DocumentNotFound(document_id.to_string()))?;
        let mut claim = self.held_claim(txn.as_mut(), document_id, stage, actor)?;

        // Paths are recorded verbatim; odd locations get flagged, not refused
        if !is_under_root(&document.root_path, path) {
            flow_log!(
                LogLevel::Warn,
                "Artifact {} for {} lies outside the document root",
                path.display(),
                document.reference
            );
        }

        claim
            .slots
            .insert(slot.to_string(), path.to_string_lossy().into_owned());
        txn.upsert_claim(&claim)?;
        txn.commit()?;

        let fingerprint = AuditTrail::fingerprint(path)
            .map(|fp| format!(" sha256={}", fp))
            .unwrap_or_default();
        AuditTrail::append(
            &document,
            &format!(
                "{} [{}] artifact {}/{} = {}{}",
                Utc::now().to_rfc3339(),
                actor.role,
                stage,
                slot,
                path.display(),
                fingerprint
            ),
        );
        Ok(())
    }

    /// Record the reviewer's decision and advance the document
    ///
    /// Completeness checks run before any write: observed/rejected need a
    /// note, approved needs every declared slot filled and, when the stage
    /// mandates it, a signature. The signature is decrypted and embedded
    /// into the stage's designated artifact before the claim and ledger
    /// move; a failure there aborts the finalize with no status change
    /// (the on-disk PDF may already be stamped, a known inconsistency
    /// window inherited from the original system).
    pub fn finalize(
        &self,
        document_id: Uuid,
        stage: Stage,
        actor: &Actor,
        decision: Decision,
        note: &str,
        signature: Option<SignatureRequest>,
    ) -> ConformaResult<Document> {
        let config = StageConfig::for_stage(stage);
        let mut txn = self.store.transaction()?;

        let mut document = txn
            .document(document_id)?
            .ok_or_else(|| ConformaError::DocumentNotFound(document_id.to_string()))?;
        let mut claim = self.held_claim(txn.as_mut(), document_id, stage, actor)?;

        match decision {
            Decision::Observed | Decision::Rejected => {
                if note.trim().is_empty() {
                    return Err(ConformaError::ObservationRequired(format!(
                        "a {} decision needs an explanation",
                        decision.as_str()
                    )));
                }
            }
            Decision::Approved => {
                for slot in config.required_slots {
                    if claim.slot(slot).map_or(true, str::is_empty) {
                        return Err(ConformaError::MissingArtifact(format!(
                            "{}/{}",
                            stage, slot
                        )));
                    }
                }
                if config.signature_required && signature.is_none() {
                    return Err(ConformaError::SignatureRequired(format!(
                        "approval at {} requires a signature",
                        stage
                    )));
                }
            }
        }

        if decision == Decision::Approved && config.signature_required {
            if let (Some(request), Some(slot_name)) = (signature, config.signed_slot) {
                let target = claim.slot(slot_name).ok_or_else(|| {
                    ConformaError::MissingArtifact(format!("{}/{}", stage, slot_name))
                })?;
                let target = Path::new(target).to_path_buf();
                let artifact = self.vault.retrieve_for(request.signature_id, &actor.id)?;
                self.embedder
                    .embed(&target, &artifact.bytes, artifact.kind, request.region)?;
            }
        }

        if !claim.state.can_transition_to(decision.claim_state()) {
            return Err(ConformaError::InvalidTransition(format!(
                "claim is {} and cannot finalize",
                claim.state.as_str()
            )));
        }
        claim.state = decision.claim_state();
        claim.observation = if note.trim().is_empty() {
            None
        } else {
            Some(note.to_string())
        };
        claim.ended_at = Some(Utc::now());
        txn.upsert_claim(&claim)?;

        let entry = DocumentLedger::transition(
            txn.as_mut(),
            &mut document,
            config.status_for(decision),
            actor,
            note,
        )?;
        txn.commit()?;

        AuditTrail::append(&document, &entry.audit_line());
        flow_log!(
            LogLevel::Info,
            "{} finalized {} at {} as {}",
            actor.id,
            document.reference,
            stage,
            decision.as_str()
        );
        Ok(document)
    }

    /// The active claim at this stage, required to be held by `actor`
    ///
    /// No active claim is NotFound; someone else's claim is Forbidden.
    fn held_claim(
        &self,
        txn: &mut dyn StoreTransaction,
        document_id: Uuid,
        stage: Stage,
        actor: &Actor,
    ) -> ConformaResult<StageClaim> {
        let claim = txn
            .active_claim(document_id, stage)?
            .ok_or_else(|| {
                ConformaError::NoActiveClaim(format!("{} at {}", document_id, stage))
            })?;
        if claim.actor_id != actor.id {
            return Err(ConformaError::NotClaimHolder(format!(
                "{} is held by {}",
                document_id, claim.actor_id
            )));
        }
        Ok(claim)
    }
}
