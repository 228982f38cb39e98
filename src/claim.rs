//! Stage claims: exclusive custody of a document by one actor at one stage
//!
//! The claim state machine is an explicit transition table. `Available` is
//! both the initial state and the state re-entered after a release; the
//! three finalized states are terminal for the claim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::status::Stage;

/// State of one (document, stage, claimant) claim row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimState {
    Available,
    Claimed,
    FinalizedApproved,
    FinalizedObserved,
    FinalizedRejected,
    Released,
}

impl ClaimState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimState::Available => "available",
            ClaimState::Claimed => "claimed",
            ClaimState::FinalizedApproved => "finalized-approved",
            ClaimState::FinalizedObserved => "finalized-observed",
            ClaimState::FinalizedRejected => "finalized-rejected",
            ClaimState::Released => "released",
        }
    }

    pub fn parse(s: &str) -> Option<ClaimState> {
        match s {
            "available" => Some(ClaimState::Available),
            "claimed" => Some(ClaimState::Claimed),
            "finalized-approved" => Some(ClaimState::FinalizedApproved),
            "finalized-observed" => Some(ClaimState::FinalizedObserved),
            "finalized-rejected" => Some(ClaimState::FinalizedRejected),
            "released" => Some(ClaimState::Released),
            _ => None,
        }
    }

    /// Explicit transition table for the claim state machine
    pub fn can_transition_to(&self, next: ClaimState) -> bool {
        matches!(
            (self, next),
            (ClaimState::Available, ClaimState::Claimed)
                | (ClaimState::Claimed, ClaimState::FinalizedApproved)
                | (ClaimState::Claimed, ClaimState::FinalizedObserved)
                | (ClaimState::Claimed, ClaimState::FinalizedRejected)
                | (ClaimState::Claimed, ClaimState::Released)
                | (ClaimState::Released, ClaimState::Available)
                // Released rows are claimable again directly
                | (ClaimState::Released, ClaimState::Claimed)
        )
    }

    /// Terminal states never leave
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ClaimState::FinalizedApproved
                | ClaimState::FinalizedObserved
                | ClaimState::FinalizedRejected
        )
    }
}

/// Reviewer decision at finalize time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approved,
    Observed,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approved => "approved",
            Decision::Observed => "observed",
            Decision::Rejected => "rejected",
        }
    }

    /// Claim state this decision finalizes into
    pub fn claim_state(&self) -> ClaimState {
        match self {
            Decision::Approved => ClaimState::FinalizedApproved,
            Decision::Observed => ClaimState::FinalizedObserved,
            Decision::Rejected => ClaimState::FinalizedRejected,
        }
    }
}

/// One claim row: a claimant's attempt at one stage of one document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageClaim {
    pub id: Uuid,
    pub document_id: Uuid,
    pub stage: Stage,
    pub actor_id: String,
    pub state: ClaimState,

    /// Free-text observation recorded at finalize time
    pub observation: Option<String>,

    /// Named artifact slots filled during review (slot name -> file path)
    pub slots: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl StageClaim {
    /// Create a fresh claim row in the `claimed` state
    ///
    /// Rows are created lazily the first time an actor claims a document at
    /// a stage, so a new row starts claimed rather than available.
    pub fn begin(document_id: Uuid, stage: Stage, actor_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id,
            stage,
            actor_id: actor_id.to_string(),
            state: ClaimState::Claimed,
            observation: None,
            slots: BTreeMap::new(),
            created_at: now,
            claimed_at: Some(now),
            ended_at: None,
        }
    }

    /// The path stored in a slot, if filled
    pub fn slot(&self, name: &str) -> Option<&str> {
        self.slots.get(name).map(|s| s.as_str())
    }
}

/// Handle returned to a successful claimant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimHandle {
    pub claim_id: Uuid,
    pub document_id: Uuid,
    pub stage: Stage,
    pub actor_id: String,
    pub claimed_at: DateTime<Utc>,
}
