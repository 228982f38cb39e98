//! Review stages and the document status vocabulary
//!
//! Downstream stages gate on the exact status strings, so the whole
//! vocabulary is a closed enumeration with bit-exact wire values. The
//! entry status of each stage is the approved status of the previous one.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One step in the fixed review sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Supervisor,
    Auditoria,
    Contabilidad,
    Tesoreria,
    Gerencia,
    Rendicion,
}

impl Stage {
    /// The fixed review sequence, in order
    pub const SEQUENCE: [Stage; 6] = [
        Stage::Supervisor,
        Stage::Auditoria,
        Stage::Contabilidad,
        Stage::Tesoreria,
        Stage::Gerencia,
        Stage::Rendicion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Supervisor => "supervisor",
            Stage::Auditoria => "auditoria",
            Stage::Contabilidad => "contabilidad",
            Stage::Tesoreria => "tesoreria",
            Stage::Gerencia => "gerencia",
            Stage::Rendicion => "rendicion",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        match s {
            "supervisor" => Some(Stage::Supervisor),
            "auditoria" => Some(Stage::Auditoria),
            "contabilidad" => Some(Stage::Contabilidad),
            "tesoreria" => Some(Stage::Tesoreria),
            "gerencia" => Some(Stage::Gerencia),
            "rendicion" => Some(Stage::Rendicion),
            _ => None,
        }
    }

    /// The stage that follows this one, if any
    pub fn next(&self) -> Option<Stage> {
        let idx = Stage::SEQUENCE.iter().position(|s| s == self)?;
        Stage::SEQUENCE.get(idx + 1).copied()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical document status
///
/// `Presentado` is the intake status; every stage contributes one in-review
/// status and three terminal statuses. The wire strings are a contract with
/// adjacent stages and with external display collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentStatus {
    Presentado,

    EnRevisionSupervisor,
    SupervisorAprobado,
    SupervisorObservado,
    SupervisorRechazado,

    EnRevisionAuditoria,
    AuditoriaAprobado,
    AuditoriaObservado,
    AuditoriaRechazado,

    EnRevisionContabilidad,
    ContabilidadAprobado,
    ContabilidadObservado,
    ContabilidadRechazado,

    EnRevisionTesoreria,
    TesoreriaAprobado,
    TesoreriaObservado,
    TesoreriaRechazado,

    EnRevisionGerencia,
    GerenciaAprobado,
    GerenciaObservado,
    GerenciaRechazado,

    EnRevisionRendicion,
    RendicionAprobado,
    RendicionObservado,
    RendicionRechazado,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Presentado => "PRESENTADO",

            DocumentStatus::EnRevisionSupervisor => "EN_REVISION_SUPERVISOR",
            DocumentStatus::SupervisorAprobado => "SUPERVISOR_APROBADO",
            DocumentStatus::SupervisorObservado => "SUPERVISOR_OBSERVADO",
            DocumentStatus::SupervisorRechazado => "SUPERVISOR_RECHAZADO",

            DocumentStatus::EnRevisionAuditoria => "EN_REVISION_AUDITORIA",
            DocumentStatus::AuditoriaAprobado => "AUDITORIA_APROBADO",
            DocumentStatus::AuditoriaObservado => "AUDITORIA_OBSERVADO",
            DocumentStatus::AuditoriaRechazado => "AUDITORIA_RECHAZADO",

            DocumentStatus::EnRevisionContabilidad => "EN_REVISION_CONTABILIDAD",
            DocumentStatus::ContabilidadAprobado => "CONTABILIDAD_APROBADO",
            DocumentStatus::ContabilidadObservado => "CONTABILIDAD_OBSERVADO",
            DocumentStatus::ContabilidadRechazado => "CONTABILIDAD_RECHAZADO",

            DocumentStatus::EnRevisionTesoreria => "EN_REVISION_TESORERIA",
            DocumentStatus::TesoreriaAprobado => "TESORERIA_APROBADO",
            DocumentStatus::TesoreriaObservado => "TESORERIA_OBSERVADO",
            DocumentStatus::TesoreriaRechazado => "TESORERIA_RECHAZADO",

            DocumentStatus::EnRevisionGerencia => "EN_REVISION_GERENCIA",
            DocumentStatus::GerenciaAprobado => "GERENCIA_APROBADO",
            DocumentStatus::GerenciaObservado => "GERENCIA_OBSERVADO",
            DocumentStatus::GerenciaRechazado => "GERENCIA_RECHAZADO",

            DocumentStatus::EnRevisionRendicion => "EN_REVISION_RENDICION",
            DocumentStatus::RendicionAprobado => "RENDICION_APROBADO",
            DocumentStatus::RendicionObservado => "RENDICION_OBSERVADO",
            DocumentStatus::RendicionRechazado => "RENDICION_RECHAZADO",
        }
    }

    pub fn parse(s: &str) -> Option<DocumentStatus> {
        match s {
            "PRESENTADO" => Some(DocumentStatus::Presentado),

            "EN_REVISION_SUPERVISOR" => Some(DocumentStatus::EnRevisionSupervisor),
            "SUPERVISOR_APROBADO" => Some(DocumentStatus::SupervisorAprobado),
            "SUPERVISOR_OBSERVADO" => Some(DocumentStatus::SupervisorObservado),
            "SUPERVISOR_RECHAZADO" => Some(DocumentStatus::SupervisorRechazado),

            "EN_REVISION_AUDITORIA" => Some(DocumentStatus::EnRevisionAuditoria),
            "AUDITORIA_APROBADO" => Some(DocumentStatus::AuditoriaAprobado),
            "AUDITORIA_OBSERVADO" => Some(DocumentStatus::AuditoriaObservado),
            "AUDITORIA_RECHAZADO" => Some(DocumentStatus::AuditoriaRechazado),

            "EN_REVISION_CONTABILIDAD" => Some(DocumentStatus::EnRevisionContabilidad),
            "CONTABILIDAD_APROBADO" => Some(DocumentStatus::ContabilidadAprobado),
            "CONTABILIDAD_OBSERVADO" => Some(DocumentStatus::ContabilidadObservado),
            "CONTABILIDAD_RECHAZADO" => Some(DocumentStatus::ContabilidadRechazado),

            "EN_REVISION_TESORERIA" => Some(DocumentStatus::EnRevisionTesoreria),
            "TESORERIA_APROBADO" => Some(DocumentStatus::TesoreriaAprobado),
            "TESORERIA_OBSERVADO" => Some(DocumentStatus::TesoreriaObservado),
            "TESORERIA_RECHAZADO" => Some(DocumentStatus::TesoreriaRechazado),

            "EN_REVISION_GERENCIA" => Some(DocumentStatus::EnRevisionGerencia),
            "GERENCIA_APROBADO" => Some(DocumentStatus::GerenciaAprobado),
            "GERENCIA_OBSERVADO" => Some(DocumentStatus::GerenciaObservado),
            "GERENCIA_RECHAZADO" => Some(DocumentStatus::GerenciaRechazado),

            "EN_REVISION_RENDICION" => Some(DocumentStatus::EnRevisionRendicion),
            "RENDICION_APROBADO" => Some(DocumentStatus::RendicionAprobado),
            "RENDICION_OBSERVADO" => Some(DocumentStatus::RendicionObservado),
            "RENDICION_RECHAZADO" => Some(DocumentStatus::RendicionRechazado),

            _ => None,
        }
    }

    /// True for the six in-review statuses
    ///
    /// The document holder is non-null iff this returns true.
    pub fn is_in_review(&self) -> bool {
        matches!(
            self,
            DocumentStatus::EnRevisionSupervisor
                | DocumentStatus::EnRevisionAuditoria
                | DocumentStatus::EnRevisionContabilidad
                | DocumentStatus::EnRevisionTesoreria
                | DocumentStatus::EnRevisionGerencia
                | DocumentStatus::EnRevisionRendicion
        )
    }

    /// The stage currently reviewing, if this is an in-review status
    pub fn reviewing_stage(&self) -> Option<Stage> {
        match self {
            DocumentStatus::EnRevisionSupervisor => Some(Stage::Supervisor),
            DocumentStatus::EnRevisionAuditoria => Some(Stage::Auditoria),
            DocumentStatus::EnRevisionContabilidad => Some(Stage::Contabilidad),
            DocumentStatus::EnRevisionTesoreria => Some(Stage::Tesoreria),
            DocumentStatus::EnRevisionGerencia => Some(Stage::Gerencia),
            DocumentStatus::EnRevisionRendicion => Some(Stage::Rendicion),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
