//! Document kinds, their payloads and the draft used to open a request
use super::balance::DayKind;
use super::chain::ChainInput;
use super::error::ApprovalError;
use super::types::TimeStamp;
use chrono::Utc;

#[derive(
    minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum DocumentKind {
    #[n(0)]
    Vacation,
    #[n(1)]
    Purchase,
    #[n(2)]
    Sales,
    #[n(3)]
    OutsideWork,
    #[n(4)]
    OutsideWorkReport,
    #[n(5)]
    InternalReport,
}

impl DocumentKind {
    /// Whether final approval draws down the requester's leave balance.
    pub fn is_leave_bearing(self) -> bool {
        matches!(self, DocumentKind::Vacation)
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct LeaveDay {
    #[n(0)]
    pub date: TimeStamp<Utc>,
    #[n(1)]
    pub kind: DayKind,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct VacationPayload {
    #[n(0)]
    pub days: Vec<LeaveDay>,
    #[n(1)]
    pub reason: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct PurchasePayload {
    #[n(0)]
    pub item: String,
    #[n(1)]
    pub vendor: String,
    #[n(2)]
    pub amount: u64, // minor currency units
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct SalesPayload {
    #[n(0)]
    pub customer: String,
    #[n(1)]
    pub description: String,
    #[n(2)]
    pub amount: u64,
}

/// Outside work or business trip application.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OutsideWorkPayload {
    #[n(0)]
    pub destination: String,
    #[n(1)]
    pub purpose: String,
    #[n(2)]
    pub start: TimeStamp<Utc>,
    #[n(3)]
    pub end: TimeStamp<Utc>,
    #[n(4)]
    pub overnight_trip: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct OutsideWorkReportPayload {
    // request id of the application this reports on, when there was one
    #[n(0)]
    pub application_id: Option<String>,
    #[n(1)]
    pub summary: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct InternalReportPayload {
    #[n(0)]
    pub body: String,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub enum DocumentPayload {
    #[n(0)]
    Vacation(#[n(0)] VacationPayload),
    #[n(1)]
    Purchase(#[n(0)] PurchasePayload),
    #[n(2)]
    Sales(#[n(0)] SalesPayload),
    #[n(3)]
    OutsideWork(#[n(0)] OutsideWorkPayload),
    #[n(4)]
    OutsideWorkReport(#[n(0)] OutsideWorkReportPayload),
    #[n(5)]
    InternalReport(#[n(0)] InternalReportPayload),
}

impl DocumentPayload {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentPayload::Vacation(_) => DocumentKind::Vacation,
            DocumentPayload::Purchase(_) => DocumentKind::Purchase,
            DocumentPayload::Sales(_) => DocumentKind::Sales,
            DocumentPayload::OutsideWork(_) => DocumentKind::OutsideWork,
            DocumentPayload::OutsideWorkReport(_) => DocumentKind::OutsideWorkReport,
            DocumentPayload::InternalReport(_) => DocumentKind::InternalReport,
        }
    }

    /// Day tags that feed the balance accountant. Empty for every kind that
    /// is not leave-bearing.
    pub fn leave_days(&self) -> Vec<DayKind> {
        match self {
            DocumentPayload::Vacation(v) => v.days.iter().map(|d| d.kind).collect(),
            _ => vec![],
        }
    }

    /// CBOR encoding and its sha256 digest, which is the payload's key.
    pub fn finalise(&self) -> Result<(String, Vec<u8>), ApprovalError> {
        let contents = minicbor::to_vec(self)?;
        let hash = sha256::digest(&contents);

        Ok((hash, contents))
    }
}

/// Caller-side input for [`crate::service::ApprovalService::create`].
#[derive(Debug, Default, Clone)]
pub struct RequestDraft {
    requester: Option<String>,
    title: Option<String>,
    payload: Option<DocumentPayload>,
    approvers: ChainInput,
}

/// A draft that passed validation.
#[derive(Debug, Clone)]
pub struct ValidDraft {
    pub requester: String,
    pub title: String,
    pub payload: DocumentPayload,
    pub approvers: ChainInput,
}

impl RequestDraft {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn set_requester(mut self, requester: &str) -> Self {
        self.requester = Some(requester.to_string());
        self
    }
    pub fn set_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
    pub fn set_payload(mut self, payload: DocumentPayload) -> Self {
        self.payload = Some(payload);
        self
    }
    pub fn set_approvers(mut self, approvers: ChainInput) -> Self {
        self.approvers = approvers;
        self
    }

    // only the fields the workflow needs; form-level checks live with the forms
    pub fn validate(self) -> Result<ValidDraft, ApprovalError> {
        let requester = self
            .requester
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ApprovalError::Validation("requester is required".into()))?;
        let title = self
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ApprovalError::Validation("title is required".into()))?;
        let payload = self
            .payload
            .ok_or_else(|| ApprovalError::Validation("document payload is required".into()))?;

        if let DocumentPayload::Vacation(vacation) = &payload {
            if vacation.days.is_empty() {
                return Err(ApprovalError::Validation(
                    "a vacation request needs at least one day".into(),
                ));
            }
        }

        Ok(ValidDraft {
            requester,
            title,
            payload,
            approvers: self.approvers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> DocumentPayload {
        DocumentPayload::InternalReport(InternalReportPayload {
            body: "weekly numbers".into(),
        })
    }

    #[test]
    fn missing_title_fails_validation() {
        let draft = RequestDraft::new()
            .set_requester("emp_1")
            .set_payload(report());

        assert!(matches!(draft.validate(), Err(ApprovalError::Validation(_))));
    }

    #[test]
    fn identical_payloads_share_a_key() {
        let (a, _) = report().finalise().unwrap();
        let (b, _) = report().finalise().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn only_vacation_is_leave_bearing() {
        assert!(DocumentKind::Vacation.is_leave_bearing());
        assert!(!DocumentKind::Purchase.is_leave_bearing());
        assert!(report().leave_days().is_empty());
    }
}
