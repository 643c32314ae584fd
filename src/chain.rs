//! Approver chains and their resolution from caller input
use super::directory::Directory;
use super::document::DocumentKind;
use super::error::{ApprovalError, DirectoryError};
use std::collections::HashSet;
use std::sync::Arc;

/// One ranked decision stage of a chain.
#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum Tier {
    #[n(0)]
    First,
    #[n(1)]
    Second,
    #[n(2)]
    Third,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::First, Tier::Second, Tier::Third];

    /// The tiers that follow this one, in decision order.
    pub fn later(self) -> &'static [Tier] {
        match self {
            Tier::First => &[Tier::Second, Tier::Third],
            Tier::Second => &[Tier::Third],
            Tier::Third => &[],
        }
    }
}

/// Canonical chain shape. Each tier holds at most one approver; `shared`
/// accounts are only ever notified.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Default, PartialEq, Eq)]
pub struct ApproverChain {
    #[n(0)]
    pub first: Option<String>,
    #[n(1)]
    pub second: Option<String>,
    #[n(2)]
    pub third: Option<String>,
    #[n(3)]
    pub shared: Vec<String>,
}

impl ApproverChain {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_first(mut self, approver: &str) -> Self {
        self.first = Some(approver.to_string());
        self
    }
    pub fn set_second(mut self, approver: &str) -> Self {
        self.second = Some(approver.to_string());
        self
    }
    pub fn set_third(mut self, approver: &str) -> Self {
        self.third = Some(approver.to_string());
        self
    }
    pub fn add_shared(mut self, account: &str) -> Self {
        self.shared.push(account.to_string());
        self
    }

    pub fn approver(&self, tier: Tier) -> Option<&str> {
        match tier {
            Tier::First => self.first.as_deref(),
            Tier::Second => self.second.as_deref(),
            Tier::Third => self.third.as_deref(),
        }
    }

    pub fn is_member(&self, tier: Tier, actor: &str) -> bool {
        self.approver(tier) == Some(actor)
    }

    /// The tier this actor decides for, if any.
    pub fn tier_of(&self, actor: &str) -> Option<Tier> {
        Tier::ALL.into_iter().find(|t| self.is_member(*t, actor))
    }

    pub fn first_populated(&self) -> Option<Tier> {
        Tier::ALL
            .into_iter()
            .find(|t| self.approver(*t).is_some())
    }

    /// Skip-empty-tier scan: the next tier after `tier` that has an approver.
    pub fn next_populated_after(&self, tier: Tier) -> Option<Tier> {
        tier.later()
            .iter()
            .copied()
            .find(|t| self.approver(*t).is_some())
    }

    pub fn has_approver(&self) -> bool {
        self.first_populated().is_some()
    }

    /// Drops blank ids and rejects any account occupying two slots.
    pub fn normalise(self) -> Result<Self, ApprovalError> {
        let keep = |id: Option<String>| id.filter(|s| !s.trim().is_empty());
        let chain = ApproverChain {
            first: keep(self.first),
            second: keep(self.second),
            third: keep(self.third),
            shared: self
                .shared
                .into_iter()
                .filter(|s| !s.trim().is_empty())
                .collect(),
        };

        let mut seen = HashSet::new();
        let slots = [&chain.first, &chain.second, &chain.third]
            .into_iter()
            .flatten()
            .chain(chain.shared.iter());
        for account in slots {
            if !seen.insert(account.as_str()) {
                return Err(ApprovalError::Validation(format!(
                    "{account} appears in more than one slot of the approver chain"
                )));
            }
        }

        Ok(chain)
    }
}

/// Raw approvers as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChainInput {
    #[default]
    Absent,
    /// Positional: index 0 is first, 1 second, 2 third. The rest is ignored.
    Flat(Vec<String>),
    Structured(PartialChain),
}

/// A structured chain where any slot may be missing or over-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialChain {
    pub first: Vec<String>,
    pub second: Vec<String>,
    pub third: Vec<String>,
    pub shared: Vec<String>,
}

impl ChainInput {
    // map the raw shape onto canonical slots without consulting the directory
    fn to_chain(&self) -> Option<ApproverChain> {
        let head = |ids: &[String]| ids.iter().find(|s| !s.trim().is_empty()).cloned();
        match self {
            ChainInput::Absent => None,
            ChainInput::Flat(ids) => Some(ApproverChain {
                first: ids.first().cloned(),
                second: ids.get(1).cloned(),
                third: ids.get(2).cloned(),
                shared: vec![],
            }),
            ChainInput::Structured(partial) => Some(ApproverChain {
                first: head(&partial.first),
                second: head(&partial.second),
                third: head(&partial.third),
                shared: partial.shared.clone(),
            }),
        }
    }
}

pub struct ChainResolver {
    directory: Arc<dyn Directory>,
}

impl ChainResolver {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    /// Produce the canonical chain for a new request. Falls back to the
    /// requester's directory default when the input names no tier approver.
    pub fn resolve(
        &self,
        requester: &str,
        kind: DocumentKind,
        input: &ChainInput,
    ) -> Result<ApproverChain, ApprovalError> {
        if let Some(chain) = input.to_chain() {
            let chain = chain.normalise()?;
            if chain.has_approver() {
                return Ok(chain);
            }
            tracing::debug!(
                requester,
                ?kind,
                "supplied chain is empty, using directory default"
            );
        }

        let chain = match self.directory.find_approver_chain(requester, kind) {
            Ok(chain) => chain.normalise()?,
            Err(DirectoryError::NotFound(_)) => {
                return Err(ApprovalError::not_found("approver chain", requester));
            }
        };

        if !chain.has_approver() {
            return Err(ApprovalError::not_found("approver chain", requester));
        }

        Ok(chain)
    }
}
