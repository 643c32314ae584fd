//! The approval state machine.
//!
//! [`transition`] is pure: it inspects the status, the chain and the acting
//! user and either names the next status or refuses. Persisting the result
//! is the job of [`crate::service::ApprovalService::decide`].
use super::chain::{ApproverChain, Tier};
use super::error::TransitionError;

/// Stable, ordered status labels. Ordering follows the tiers.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum ApprovalStatus {
    #[n(0)]
    Stage1Pending,
    #[n(1)]
    Stage2Pending,
    #[n(2)]
    Stage3Pending,
    #[n(3)]
    Approved,
    #[n(4)]
    Rejected,
}

impl ApprovalStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ApprovalStatus::Approved | ApprovalStatus::Rejected)
    }

    /// The tier whose approver may act on this status.
    pub fn tier(self) -> Option<Tier> {
        match self {
            ApprovalStatus::Stage1Pending => Some(Tier::First),
            ApprovalStatus::Stage2Pending => Some(Tier::Second),
            ApprovalStatus::Stage3Pending => Some(Tier::Third),
            ApprovalStatus::Approved | ApprovalStatus::Rejected => None,
        }
    }

    pub fn pending(tier: Tier) -> Self {
        match tier {
            Tier::First => ApprovalStatus::Stage1Pending,
            Tier::Second => ApprovalStatus::Stage2Pending,
            Tier::Third => ApprovalStatus::Stage3Pending,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ApprovalStatus::Stage1Pending => "stage1_pending",
            ApprovalStatus::Stage2Pending => "stage2_pending",
            ApprovalStatus::Stage3Pending => "stage3_pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    #[n(0)]
    Approve,
    #[n(1)]
    Reject,
}

/// Status a freshly created request starts in, or `None` when the chain has
/// nobody to decide.
pub fn initial_status(chain: &ApproverChain) -> Option<ApprovalStatus> {
    chain.first_populated().map(ApprovalStatus::pending)
}

pub fn transition(
    current: ApprovalStatus,
    actor: &str,
    chain: &ApproverChain,
    decision: Decision,
) -> Result<ApprovalStatus, TransitionError> {
    let Some(tier) = current.tier() else {
        return Err(TransitionError::Conflict { status: current });
    };

    if !chain.is_member(tier, actor) {
        // an approver of an already-passed tier is replaying a stale decision
        return match chain.tier_of(actor) {
            Some(own) if own < tier => Err(TransitionError::Conflict { status: current }),
            _ => Err(TransitionError::Unauthorized {
                actor: actor.to_string(),
                status: current,
            }),
        };
    }

    let next = match decision {
        Decision::Reject => ApprovalStatus::Rejected,
        Decision::Approve => chain
            .next_populated_after(tier)
            .map(ApprovalStatus::pending)
            .unwrap_or(ApprovalStatus::Approved),
    };

    tracing::debug!(?current, ?next, actor, ?decision, "transition computed");
    Ok(next)
}
