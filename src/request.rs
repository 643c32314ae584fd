use super::chain::ApproverChain;
use super::document::DocumentKind;
use super::history::{History, HistoryEntry};
use super::types::TimeStamp;
use super::workflow::ApprovalStatus;
use chrono::Utc;

/// A request as persisted. The typed payload is stored separately under
/// `payload_hash`; nothing in the workflow reads it.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ApprovalRequest {
    #[n(0)]
    pub id: String, // uuid7, bech32 encoded
    #[n(1)]
    pub kind: DocumentKind,
    #[n(2)]
    pub requester: String,
    #[n(3)]
    pub title: String,
    #[n(4)]
    pub payload_hash: String,
    #[n(5)]
    pub chain: ApproverChain,
    #[n(6)]
    pub status: ApprovalStatus,
    #[n(7)]
    pub history: History,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

impl ApprovalRequest {
    pub fn new(
        id: String,
        kind: DocumentKind,
        requester: String,
        title: String,
        payload_hash: String,
        chain: ApproverChain,
        status: ApprovalStatus,
    ) -> Self {
        Self {
            id,
            kind,
            requester,
            title,
            payload_hash,
            chain,
            status,
            history: History::new(),
            created_at: TimeStamp::new(),
        }
    }

    /// The approver the request is waiting on, if it is still open.
    pub fn awaiting(&self) -> Option<&str> {
        self.status.tier().and_then(|t| self.chain.approver(t))
    }

    pub fn record(&mut self, entry: HistoryEntry) {
        self.status = entry.resulting_status;
        self.history.append(entry);
    }

    pub fn encode(&self) -> Result<Vec<u8>, crate::error::ApprovalError> {
        Ok(minicbor::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, crate::error::ApprovalError> {
        Ok(minicbor::decode(bytes)?)
    }
}
