//! Sled-backed persistence for requests, payloads, balances and the
//! notification outbox.
use super::balance::VacationBalance;
use super::document::DocumentPayload;
use super::error::ApprovalError;
use super::notify::OutboxEntry;
use super::request::ApprovalRequest;
use sled::Tree;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use std::path::Path;
use std::sync::Arc;

const REQUESTS: &str = "requests";
const PAYLOADS: &str = "payloads";
const BALANCES: &str = "balances";
const OUTBOX: &str = "outbox";

pub type TxResult<T> = Result<T, ConflictableTransactionError<ApprovalError>>;

/// Handle over the four trees. Cheap to clone; every clone sees the same db.
#[derive(Clone)]
pub struct Store {
    pub(crate) requests: Tree,
    pub(crate) payloads: Tree,
    pub(crate) balances: Tree,
    pub(crate) outbox: Tree,
}

impl Store {
    pub fn open(instance: Arc<sled::Db>) -> Result<Self, ApprovalError> {
        Ok(Self {
            requests: instance.open_tree(REQUESTS)?,
            payloads: instance.open_tree(PAYLOADS)?,
            balances: instance.open_tree(BALANCES)?,
            outbox: instance.open_tree(OUTBOX)?,
        })
    }

    /// Open, or create, the database at `path`.
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self, ApprovalError> {
        Self::open(Arc::new(sled::open(path)?))
    }

    pub fn load_request(&self, id: &str) -> Result<ApprovalRequest, ApprovalError> {
        let bytes = self
            .requests
            .get(id.as_bytes())?
            .ok_or_else(|| ApprovalError::not_found("request", id))?;
        ApprovalRequest::decode(&bytes)
    }

    pub fn load_payload(&self, hash: &str) -> Result<DocumentPayload, ApprovalError> {
        let bytes = self
            .payloads
            .get(hash.as_bytes())?
            .ok_or_else(|| ApprovalError::not_found("payload", hash))?;
        Ok(minicbor::decode(&bytes)?)
    }

    pub fn load_balance(&self, employee_id: &str) -> Result<Option<VacationBalance>, ApprovalError> {
        match self.balances.get(employee_id.as_bytes())? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_balance(&self, balance: &VacationBalance) -> Result<(), ApprovalError> {
        self.balances
            .insert(balance.employee_id.as_bytes(), minicbor::to_vec(balance)?)?;
        Ok(())
    }

    /// Every stored request, in key order. Undecodable rows are skipped
    /// with a warning.
    pub fn scan_requests(&self) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        let mut out = vec![];
        for row in self.requests.iter() {
            let (key, bytes) = row?;
            match ApprovalRequest::decode(&bytes) {
                Ok(request) => out.push(request),
                Err(e) => tracing::warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "skipping unreadable request row"
                ),
            }
        }
        Ok(out)
    }
}

// Helpers used inside multi-tree transactions. Decode failures abort.

pub(crate) fn tx_abort<T>(e: ApprovalError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(e))
}

pub(crate) fn tx_load_request(tree: &TransactionalTree, id: &str) -> TxResult<ApprovalRequest> {
    match tree.get(id.as_bytes())? {
        Some(bytes) => ApprovalRequest::decode(&bytes).or_else(tx_abort),
        None => tx_abort(ApprovalError::not_found("request", id)),
    }
}

pub(crate) fn tx_save_request(tree: &TransactionalTree, request: &ApprovalRequest) -> TxResult<()> {
    let bytes = request.encode().or_else(tx_abort)?;
    tree.insert(request.id.as_bytes(), bytes)?;
    Ok(())
}

pub(crate) fn tx_load_payload(tree: &TransactionalTree, hash: &str) -> TxResult<DocumentPayload> {
    match tree.get(hash.as_bytes())? {
        Some(bytes) => minicbor::decode(&bytes).or_else(|e| tx_abort(e.into())),
        None => tx_abort(ApprovalError::not_found("payload", hash)),
    }
}

pub(crate) fn tx_load_balance(
    tree: &TransactionalTree,
    employee_id: &str,
) -> TxResult<Option<VacationBalance>> {
    match tree.get(employee_id.as_bytes())? {
        Some(bytes) => minicbor::decode(&bytes)
            .map(Some)
            .or_else(|e| tx_abort(e.into())),
        None => Ok(None),
    }
}

pub(crate) fn tx_save_balance(tree: &TransactionalTree, balance: &VacationBalance) -> TxResult<()> {
    let bytes = minicbor::to_vec(balance).or_else(|e| tx_abort(e.into()))?;
    tree.insert(balance.employee_id.as_bytes(), bytes)?;
    Ok(())
}

pub(crate) fn tx_save_outbox(tree: &TransactionalTree, entry: &OutboxEntry) -> TxResult<()> {
    let bytes = minicbor::to_vec(entry).or_else(|e| tx_abort(e.into()))?;
    tree.insert(entry.id.as_bytes(), bytes)?;
    Ok(())
}
