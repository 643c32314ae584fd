//! Append-only decision ledger attached to each request
use super::types::TimeStamp;
use super::workflow::{ApprovalStatus, Decision};
use chrono::Utc;

#[derive(Debug, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct HistoryEntry {
    #[n(0)]
    pub approver_id: String,
    #[n(1)]
    pub decision: Decision,
    #[n(2)]
    pub comment: Option<String>,
    #[n(3)]
    pub timestamp: TimeStamp<Utc>,
    // status the request moved into because of this entry
    #[n(4)]
    pub resulting_status: ApprovalStatus,
}

impl HistoryEntry {
    pub fn new(
        approver_id: String,
        decision: Decision,
        comment: Option<String>,
        resulting_status: ApprovalStatus,
    ) -> Self {
        Self {
            approver_id,
            decision,
            comment: comment.filter(|c| !c.trim().is_empty()),
            timestamp: TimeStamp::new(),
            resulting_status,
        }
    }
}

/// The ledger only grows. There is no way to edit or drop an entry once
/// recorded.
#[derive(Debug, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode, Clone)]
pub struct History(#[n(0)] Vec<HistoryEntry>);

impl History {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn append(&mut self, entry: HistoryEntry) {
        self.0.push(entry);
    }
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    /// Who decided at which point, oldest first.
    pub fn deciders(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|e| e.approver_id.as_str())
    }

    pub fn view_history(&self) {
        for (i, entry) in self.0.iter().enumerate() {
            tracing::info!(
                step = i + 1,
                approver = %entry.approver_id,
                decision = ?entry.decision,
                status = entry.resulting_status.label(),
                comment = entry.comment.as_deref().unwrap_or(""),
                at = %entry.timestamp.to_datetime_utc(),
                "history"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_comment_is_dropped() {
        let entry = HistoryEntry::new(
            "alice".into(),
            Decision::Approve,
            Some("   ".into()),
            ApprovalStatus::Approved,
        );
        assert_eq!(entry.comment, None);
    }

    #[test]
    fn append_grows_by_one() {
        let mut history = History::new();
        history.append(HistoryEntry::new(
            "alice".into(),
            Decision::Approve,
            None,
            ApprovalStatus::Stage2Pending,
        ));
        history.append(HistoryEntry::new(
            "bob".into(),
            Decision::Reject,
            Some("budget".into()),
            ApprovalStatus::Rejected,
        ));

        assert_eq!(history.len(), 2);
        assert_eq!(history.deciders().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }
}
