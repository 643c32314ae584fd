//! Service layer API for approval workflow operations
use super::balance::{LeaveDays, VacationBalance, deduction};
use super::chain::ChainResolver;
use super::config::EngineConfig;
use super::directory::Directory;
use super::document::{DocumentPayload, RequestDraft};
use super::error::{ApprovalError, ConfigError};
use super::history::HistoryEntry;
use super::notify::{DeliveryReport, Dispatcher, NotificationEvent, Notifier, OutboxEntry};
use super::request::ApprovalRequest;
use super::store::{
    Store, tx_abort, tx_load_balance, tx_load_payload, tx_load_request, tx_save_balance,
    tx_save_outbox, tx_save_request,
};
use super::utils;
use super::workflow::{self, ApprovalStatus, Decision};
use sled::transaction::{ConflictableTransactionError, Transactional};
use std::sync::Arc;

/// Returned by [`ApprovalService::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub id: String,
    pub status: ApprovalStatus,
}

pub struct ApprovalService {
    store: Store,
    resolver: ChainResolver,
    dispatcher: Dispatcher,
    config: EngineConfig,
    allowance: LeaveDays,
}

impl ApprovalService {
    pub fn new(
        store: Store,
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let allowance = config.leave_allowance()?;
        let dispatcher = Dispatcher::new(
            directory.clone(),
            notifier,
            store.outbox.clone(),
            config.notifications.clone(),
        );

        Ok(Self {
            resolver: ChainResolver::new(directory),
            dispatcher,
            store,
            config,
            allowance,
        })
    }

    /// Open a new request at the pending stage of its first populated tier.
    /// Nothing is persisted when validation or chain resolution fails.
    pub fn create(&self, draft: RequestDraft) -> Result<Receipt, ApprovalError> {
        let draft = draft.validate()?;
        let kind = draft.payload.kind();
        let chain = self
            .resolver
            .resolve(&draft.requester, kind, &draft.approvers)?;
        let status = workflow::initial_status(&chain)
            .ok_or_else(|| ApprovalError::not_found("approver chain", draft.requester.as_str()))?;

        let (payload_hash, payload_cbor) = draft.payload.finalise()?;
        let id = new_id("request_")?;
        let request = ApprovalRequest::new(
            id.clone(),
            kind,
            draft.requester.clone(),
            draft.title.clone(),
            payload_hash.clone(),
            chain.clone(),
            status,
        );

        let mut events = vec![NotificationEvent::for_status(
            &id,
            &draft.title,
            &draft.requester,
            &chain,
            status,
        )];
        events.extend(NotificationEvent::cc_on_create(
            &id,
            &draft.title,
            &draft.requester,
            &chain,
            status,
        ));
        let mut entries = Vec::with_capacity(events.len());
        for event in events {
            entries.push(OutboxEntry::new(new_id("notice_")?, event));
        }

        (&self.store.requests, &self.store.payloads, &self.store.outbox).transaction(
            |(requests, payloads, outbox)| {
                // payloads are content addressed, an identical one may already exist
                if payloads.get(payload_hash.as_bytes())?.is_none() {
                    payloads.insert(payload_hash.as_bytes(), payload_cbor.clone())?;
                }
                tx_save_request(requests, &request)?;
                for entry in &entries {
                    tx_save_outbox(outbox, entry)?;
                }
                Ok(())
            },
        )?;

        tracing::info!(
            request_id = %id,
            requester = %draft.requester,
            ?kind,
            status = status.label(),
            "request created"
        );

        self.dispatch(entries.into_iter().map(|e| e.id).collect());

        Ok(Receipt { id, status })
    }

    /// Record a decision by `actor` against the request's current tier.
    pub fn decide(
        &self,
        request_id: &str,
        actor: &str,
        decision: Decision,
        comment: Option<&str>,
    ) -> Result<ApprovalStatus, ApprovalError> {
        self.commit_decision(request_id, actor, decision, comment, None)
    }

    /// Like [`Self::decide`], but fails with `Conflict` unless the request is
    /// still in `expected` when the transaction reads it.
    pub fn decide_if(
        &self,
        request_id: &str,
        actor: &str,
        decision: Decision,
        comment: Option<&str>,
        expected: ApprovalStatus,
    ) -> Result<ApprovalStatus, ApprovalError> {
        self.commit_decision(request_id, actor, decision, comment, Some(expected))
    }

    fn commit_decision(
        &self,
        request_id: &str,
        actor: &str,
        decision: Decision,
        comment: Option<&str>,
        expected: Option<ApprovalStatus>,
    ) -> Result<ApprovalStatus, ApprovalError> {
        let outbox_id = new_id("notice_")?;
        let comment = comment.map(str::to_string);

        // Status is re-read inside the transaction. A racing caller that
        // committed first makes this one see the advanced status and abort.
        let (prior, request, balance) = (
            &self.store.requests,
            &self.store.payloads,
            &self.store.balances,
            &self.store.outbox,
        )
            .transaction(|(requests, payloads, balances, outbox)| {
                let mut request = tx_load_request(requests, request_id)?;
                let prior = request.status;

                if expected.is_some_and(|expected| expected != prior) {
                    return tx_abort(ApprovalError::Conflict {
                        request_id: request_id.to_string(),
                        status: prior,
                    });
                }

                let next = workflow::transition(prior, actor, &request.chain, decision)
                    .map_err(|e| {
                        ConflictableTransactionError::Abort(e.into_approval_error(request_id))
                    })?;

                request.record(HistoryEntry::new(
                    actor.to_string(),
                    decision,
                    comment.clone(),
                    next,
                ));

                let mut balance = None;
                if next == ApprovalStatus::Approved && request.kind.is_leave_bearing() {
                    if prior.is_terminal() {
                        return tx_abort(ApprovalError::Conflict {
                            request_id: request_id.to_string(),
                            status: prior,
                        });
                    }
                    let payload = tx_load_payload(payloads, &request.payload_hash)?;
                    let amount = deduction(&payload.leave_days());
                    let mut current = tx_load_balance(balances, &request.requester)?
                        .unwrap_or_else(|| {
                            VacationBalance::new(request.requester.clone(), self.allowance)
                        });
                    current.apply(amount);
                    tx_save_balance(balances, &current)?;
                    balance = Some((amount, current));
                }

                tx_save_request(requests, &request)?;

                let event = NotificationEvent::for_status(
                    &request.id,
                    &request.title,
                    &request.requester,
                    &request.chain,
                    next,
                );
                tx_save_outbox(outbox, &OutboxEntry::new(outbox_id.clone(), event))?;

                Ok((prior, request, balance))
            })?;

        tracing::info!(
            request_id,
            actor,
            ?decision,
            from = prior.label(),
            to = request.status.label(),
            history = request.history.len(),
            "decision committed"
        );
        if let Some((amount, balance)) = balance {
            tracing::info!(
                employee = %balance.employee_id,
                deducted = %amount,
                remaining = %balance.remaining,
                "leave balance charged"
            );
            if balance.remaining.is_negative() {
                tracing::warn!(
                    employee = %balance.employee_id,
                    remaining = %balance.remaining,
                    "leave balance overdrawn"
                );
            }
        }

        self.dispatch(vec![outbox_id]);

        Ok(request.status)
    }

    pub fn get(&self, request_id: &str) -> Result<ApprovalRequest, ApprovalError> {
        self.store.load_request(request_id)
    }

    /// The typed document behind a request.
    pub fn payload(&self, request_id: &str) -> Result<DocumentPayload, ApprovalError> {
        let request = self.store.load_request(request_id)?;
        self.store.load_payload(&request.payload_hash)
    }

    /// Requests currently waiting on `approver`.
    pub fn pending_for(&self, approver: &str) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        Ok(self
            .store
            .scan_requests()?
            .into_iter()
            .filter(|r| r.awaiting() == Some(approver))
            .collect())
    }

    pub fn list_for_requester(&self, requester: &str) -> Result<Vec<ApprovalRequest>, ApprovalError> {
        Ok(self
            .store
            .scan_requests()?
            .into_iter()
            .filter(|r| r.requester == requester)
            .collect())
    }

    /// Current balance, or the configured allowance if none is recorded.
    pub fn balance(&self, employee_id: &str) -> Result<VacationBalance, ApprovalError> {
        Ok(self
            .store
            .load_balance(employee_id)?
            .unwrap_or_else(|| VacationBalance::new(employee_id.to_string(), self.allowance)))
    }

    pub fn set_balance(
        &self,
        employee_id: &str,
        remaining: LeaveDays,
        used: LeaveDays,
    ) -> Result<VacationBalance, ApprovalError> {
        let balance = VacationBalance {
            employee_id: employee_id.to_string(),
            remaining,
            used,
        };
        self.store.save_balance(&balance)?;
        Ok(balance)
    }

    /// Deliver notifications left in the outbox, e.g. after a crash between
    /// commit and delivery.
    pub fn drain_outbox(&self) -> Vec<DeliveryReport> {
        self.dispatcher.drain()
    }

    // post-commit only; failures are logged by the dispatcher and go no further
    fn dispatch(&self, entry_ids: Vec<String>) {
        if !self.config.notifications.background {
            for id in &entry_ids {
                self.dispatcher.deliver(id);
            }
            return;
        }

        let dispatcher = self.dispatcher.clone();
        let spawned = std::thread::Builder::new()
            .name("approval-notify".into())
            .spawn(move || {
                for id in &entry_ids {
                    dispatcher.deliver(id);
                }
            });
        if let Err(e) = spawned {
            tracing::warn!(
                error = %e,
                "could not start notification thread, entries stay in the outbox"
            );
        }
    }
}

fn new_id(hrp: &str) -> Result<String, ApprovalError> {
    utils::new_uuid_to_bech32(hrp).map_err(|e| ApprovalError::Encoding(e.to_string()))
}
