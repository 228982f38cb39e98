//! Data-only configuration for each review stage
//!
//! The source system repeated the claim/release/finalize pattern once per
//! stage; here every per-stage difference (status gates, artifact slots,
//! signature policy) is a plain record consumed by one generic engine.

use crate::status::{DocumentStatus, Stage};

/// Everything the engine needs to know about one stage
#[derive(Debug, Clone, Copy)]
pub struct StageConfig {
    pub stage: Stage,

    /// Status that gates entry to this stage
    pub entry_status: DocumentStatus,

    /// Status while one claimant holds the document
    pub in_review_status: DocumentStatus,

    /// Terminal statuses by decision
    pub approved_status: DocumentStatus,
    pub observed_status: DocumentStatus,
    pub rejected_status: DocumentStatus,

    /// Named artifact slots that must all be filled before finalize(approved)
    pub required_slots: &'static [&'static str],

    /// Whether an approved decision must carry a signature
    pub signature_required: bool,

    /// Slot holding the PDF that receives the signature, when one is required
    pub signed_slot: Option<&'static str>,
}

impl StageConfig {
    /// Look up the configuration for a stage
    pub fn for_stage(stage: Stage) -> &'static StageConfig {
        match stage {
            Stage::Supervisor => &SUPERVISOR,
            Stage::Auditoria => &AUDITORIA,
            Stage::Contabilidad => &CONTABILIDAD,
            Stage::Tesoreria => &TESORERIA,
            Stage::Gerencia => &GERENCIA,
            Stage::Rendicion => &RENDICION,
        }
    }

    /// True if the slot name is declared by this stage
    pub fn declares_slot(&self, slot: &str) -> bool {
        self.required_slots.iter().any(|s| *s == slot)
    }

    /// Terminal status for a decision
    pub fn status_for(&self, decision: crate::claim::Decision) -> DocumentStatus {
        match decision {
            crate::claim::Decision::Approved => self.approved_status,
            crate::claim::Decision::Observed => self.observed_status,
            crate::claim::Decision::Rejected => self.rejected_status,
        }
    }
}

static SUPERVISOR: StageConfig = StageConfig {
    stage: Stage::Supervisor,
    entry_status: DocumentStatus::Presentado,
    in_review_status: DocumentStatus::EnRevisionSupervisor,
    approved_status: DocumentStatus::SupervisorAprobado,
    observed_status: DocumentStatus::SupervisorObservado,
    rejected_status: DocumentStatus::SupervisorRechazado,
    required_slots: &["informe_conformidad"],
    signature_required: true,
    signed_slot: Some("informe_conformidad"),
};

static AUDITORIA: StageConfig = StageConfig {
    stage: Stage::Auditoria,
    entry_status: DocumentStatus::SupervisorAprobado,
    in_review_status: DocumentStatus::EnRevisionAuditoria,
    approved_status: DocumentStatus::AuditoriaAprobado,
    observed_status: DocumentStatus::AuditoriaObservado,
    rejected_status: DocumentStatus::AuditoriaRechazado,
    required_slots: &["informe_auditoria"],
    signature_required: true,
    signed_slot: Some("informe_auditoria"),
};

static CONTABILIDAD: StageConfig = StageConfig {
    stage: Stage::Contabilidad,
    entry_status: DocumentStatus::AuditoriaAprobado,
    in_review_status: DocumentStatus::EnRevisionContabilidad,
    approved_status: DocumentStatus::ContabilidadAprobado,
    observed_status: DocumentStatus::ContabilidadObservado,
    rejected_status: DocumentStatus::ContabilidadRechazado,
    required_slots: &["registro_contable", "comprobante_pago"],
    signature_required: true,
    signed_slot: Some("comprobante_pago"),
};

static TESORERIA: StageConfig = StageConfig {
    stage: Stage::Tesoreria,
    entry_status: DocumentStatus::ContabilidadAprobado,
    in_review_status: DocumentStatus::EnRevisionTesoreria,
    approved_status: DocumentStatus::TesoreriaAprobado,
    observed_status: DocumentStatus::TesoreriaObservado,
    rejected_status: DocumentStatus::TesoreriaRechazado,
    required_slots: &["comprobante_pago", "constancia_transferencia"],
    signature_required: true,
    signed_slot: Some("comprobante_pago"),
};

static GERENCIA: StageConfig = StageConfig {
    stage: Stage::Gerencia,
    entry_status: DocumentStatus::TesoreriaAprobado,
    in_review_status: DocumentStatus::EnRevisionGerencia,
    approved_status: DocumentStatus::GerenciaAprobado,
    observed_status: DocumentStatus::GerenciaObservado,
    rejected_status: DocumentStatus::GerenciaRechazado,
    required_slots: &["oficio_aprobacion"],
    signature_required: true,
    signed_slot: Some("oficio_aprobacion"),
};

static RENDICION: StageConfig = StageConfig {
    stage: Stage::Rendicion,
    entry_status: DocumentStatus::GerenciaAprobado,
    in_review_status: DocumentStatus::EnRevisionRendicion,
    approved_status: DocumentStatus::RendicionAprobado,
    observed_status: DocumentStatus::RendicionObservado,
    rejected_status: DocumentStatus::RendicionRechazado,
    required_slots: &["informe_rendicion", "anexos"],
    signature_required: false,
    signed_slot: None,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjacency_chain() {
        // Each stage's entry status is the previous stage's approved status
        let mut prev_approved = DocumentStatus::Presentado;
        for stage in Stage::SEQUENCE {
            let config = StageConfig::for_stage(stage);
            assert_eq!(config.entry_status, prev_approved, "gate for {}", stage);
            prev_approved = config.approved_status;
        }
    }

    #[test]
    fn test_slot_counts_in_bounds() {
        for stage in Stage::SEQUENCE {
            let config = StageConfig::for_stage(stage);
            assert!(!config.required_slots.is_empty());
            assert!(config.required_slots.len() <= 4);
        }
    }

    #[test]
    fn test_signed_slot_is_declared() {
        for stage in Stage::SEQUENCE {
            let config = StageConfig::for_stage(stage);
            if config.signature_required {
                let slot = config.signed_slot.expect("signing stage needs a target");
                assert!(config.declares_slot(slot));
            } else {
                assert!(config.signed_slot.is_none());
            }
        }
    }

    #[test]
    fn test_declares_slot() {
        let config = StageConfig::for_stage(Stage::Tesoreria);
        assert!(config.declares_slot("comprobante_pago"));
        assert!(!config.declares_slot("informe_auditoria"));
    }
}
