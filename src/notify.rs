//! Post-commit notification fan-out.
//!
//! A [`NotificationEvent`] is written to the outbox tree in the same
//! transaction as the status change it describes. Once that transaction has
//! committed, the [`Dispatcher`] claims the entry and delivers it. Nothing
//! that happens here can fail or roll back the transition.
use super::chain::ApproverChain;
use super::config::NotificationConfig;
use super::directory::{Contact, Directory};
use super::error::NotifyError;
use super::types::TimeStamp;
use super::workflow::ApprovalStatus;
use chrono::Utc;
use sled::Tree;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct NotificationEvent {
    #[n(0)]
    pub request_id: String,
    #[n(1)]
    pub title: String,
    #[n(2)]
    pub requester: String,
    #[n(3)]
    pub new_status: ApprovalStatus,
    #[n(4)]
    pub target_users: Vec<String>,
    #[n(5)]
    pub action_required: bool,
}

impl NotificationEvent {
    /// Who hears about a request entering `status`.
    pub fn for_status(
        request_id: &str,
        title: &str,
        requester: &str,
        chain: &ApproverChain,
        status: ApprovalStatus,
    ) -> Self {
        let (target_users, action_required) = match status.tier() {
            Some(tier) => (
                chain.approver(tier).map(str::to_string).into_iter().collect(),
                true,
            ),
            None => {
                // a requester who cc'd themselves still hears once
                let mut targets = vec![requester.to_string()];
                for account in &chain.shared {
                    if !targets.contains(account) {
                        targets.push(account.clone());
                    }
                }
                (targets, false)
            }
        };

        Self {
            request_id: request_id.to_string(),
            title: title.to_string(),
            requester: requester.to_string(),
            new_status: status,
            target_users,
            action_required,
        }
    }

    /// Shared accounts copied on a newly opened request.
    pub fn cc_on_create(
        request_id: &str,
        title: &str,
        requester: &str,
        chain: &ApproverChain,
        status: ApprovalStatus,
    ) -> Option<Self> {
        if chain.shared.is_empty() {
            return None;
        }
        Some(Self {
            request_id: request_id.to_string(),
            title: title.to_string(),
            requester: requester.to_string(),
            new_status: status,
            target_users: chain.shared.clone(),
            action_required: false,
        })
    }

    pub fn message(&self) -> Message {
        let subject = match self.new_status {
            ApprovalStatus::Approved => format!("[Approved] {}", self.title),
            ApprovalStatus::Rejected => format!("[Rejected] {}", self.title),
            _ if self.action_required => format!("[Approval required] {}", self.title),
            _ => format!("[Submitted] {}", self.title),
        };
        let body = format!(
            "Request {} from {} is now {}.",
            self.request_id,
            self.requester,
            self.new_status.label()
        );
        Message {
            request_id: self.request_id.clone(),
            subject,
            body,
            action_required: self.action_required,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct OutboxEntry {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub event: NotificationEvent,
    #[n(2)]
    pub created_at: TimeStamp<Utc>,
}

impl OutboxEntry {
    pub fn new(id: String, event: NotificationEvent) -> Self {
        Self {
            id,
            event,
            created_at: TimeStamp::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub request_id: String,
    pub subject: String,
    pub body: String,
    pub action_required: bool,
}

/// Outbound channels. Implementations must be safe to call from several
/// threads at once.
pub trait Notifier: Send + Sync {
    fn send_email(&self, to: &Contact, message: &Message) -> Result<(), NotifyError>;
    fn post_notice(&self, user_id: &str, message: &Message) -> Result<(), NotifyError>;
}

/// Notifier that only writes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_email(&self, to: &Contact, message: &Message) -> Result<(), NotifyError> {
        tracing::info!(to = %to.email, subject = %message.subject, "email");
        Ok(())
    }

    fn post_notice(&self, user_id: &str, message: &Message) -> Result<(), NotifyError> {
        tracing::info!(user_id, subject = %message.subject, "in-app notice");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(Vec<NotifyError>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientOutcome {
    pub user_id: String,
    pub email_sent: bool,
    pub notice_posted: bool,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub request_id: String,
    pub recipients: Vec<RecipientOutcome>,
}

impl DeliveryReport {
    pub fn delivered(&self) -> usize {
        self.recipients
            .iter()
            .filter(|r| r.status == DeliveryStatus::Delivered)
            .count()
    }
    pub fn failed(&self) -> usize {
        self.recipients.len() - self.delivered()
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    directory: Arc<dyn Directory>,
    notifier: Arc<dyn Notifier>,
    outbox: Tree,
    policy: NotificationConfig,
}

impl Dispatcher {
    pub fn new(
        directory: Arc<dyn Directory>,
        notifier: Arc<dyn Notifier>,
        outbox: Tree,
        policy: NotificationConfig,
    ) -> Self {
        Self {
            directory,
            notifier,
            outbox,
            policy,
        }
    }

    /// Claim and deliver one outbox entry. Returns `None` when the entry is
    /// gone, for instance because another dispatcher claimed it first.
    pub fn deliver(&self, entry_id: &str) -> Option<DeliveryReport> {
        let bytes = match self.outbox.remove(entry_id.as_bytes()) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::error!(entry_id, error = %e, "could not claim outbox entry");
                return None;
            }
        };

        let entry: OutboxEntry = match minicbor::decode(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(entry_id, error = %e, "dropping undecodable outbox entry");
                return None;
            }
        };

        Some(self.fan_out(&entry.event))
    }

    /// Deliver everything still sitting in the outbox.
    pub fn drain(&self) -> Vec<DeliveryReport> {
        let ids: Vec<String> = self
            .outbox
            .iter()
            .keys()
            .filter_map(|k| match k {
                Ok(k) => Some(String::from_utf8_lossy(&k).into_owned()),
                Err(e) => {
                    tracing::error!(error = %e, "outbox scan failed");
                    None
                }
            })
            .collect();

        ids.iter().filter_map(|id| self.deliver(id)).collect()
    }

    /// Send to every target concurrently and collect one outcome each.
    pub fn fan_out(&self, event: &NotificationEvent) -> DeliveryReport {
        let message = event.message();

        let recipients = std::thread::scope(|scope| {
            let handles: Vec<_> = event
                .target_users
                .iter()
                .map(|user_id| {
                    let message = &message;
                    scope.spawn(move || self.deliver_to(user_id, message))
                })
                .collect();

            handles
                .into_iter()
                .zip(event.target_users.iter())
                .map(|(handle, user_id)| {
                    handle.join().unwrap_or_else(|_| RecipientOutcome {
                        user_id: user_id.clone(),
                        email_sent: false,
                        notice_posted: false,
                        status: DeliveryStatus::Failed(vec![NotifyError::Notice {
                            recipient: user_id.clone(),
                            reason: "delivery thread panicked".into(),
                        }]),
                    })
                })
                .collect()
        });

        let report = DeliveryReport {
            request_id: event.request_id.clone(),
            recipients,
        };
        tracing::info!(
            request_id = %report.request_id,
            status = event.new_status.label(),
            delivered = report.delivered(),
            failed = report.failed(),
            "notifications dispatched"
        );
        report
    }

    fn deliver_to(&self, user_id: &str, message: &Message) -> RecipientOutcome {
        let mut errors = vec![];

        let email_sent = match self.directory.find_contact(user_id) {
            Ok(contact) => self
                .with_retry(user_id, "email", || {
                    self.notifier.send_email(&contact, message)
                })
                .map_err(|e| errors.push(e))
                .is_ok(),
            Err(_) => {
                errors.push(NotifyError::NoContact(user_id.to_string()));
                false
            }
        };

        let notice_posted = self
            .with_retry(user_id, "notice", || self.notifier.post_notice(user_id, message))
            .map_err(|e| errors.push(e))
            .is_ok();

        let status = if email_sent || notice_posted {
            DeliveryStatus::Delivered
        } else {
            tracing::error!(
                user_id,
                request_id = %message.request_id,
                "recipient could not be reached"
            );
            DeliveryStatus::Failed(errors)
        };

        RecipientOutcome {
            user_id: user_id.to_string(),
            email_sent,
            notice_posted,
            status,
        }
    }

    fn with_retry(
        &self,
        user_id: &str,
        channel: &str,
        send: impl Fn() -> Result<(), NotifyError>,
    ) -> Result<(), NotifyError> {
        let mut attempt = 1;
        loop {
            match send() {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.policy.max_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(user_id, channel, attempt, error = %e, "delivery failed, retrying");
                    attempt += 1;
                    std::thread::sleep(self.policy.backoff());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> ApproverChain {
        ApproverChain::new()
            .set_first("lead")
            .set_second("director")
            .add_shared("hr")
    }

    #[test]
    fn pending_stage_targets_that_tier() {
        let event = NotificationEvent::for_status(
            "request_1",
            "Holiday",
            "emp",
            &chain(),
            ApprovalStatus::Stage2Pending,
        );
        assert_eq!(event.target_users, vec!["director".to_string()]);
        assert!(event.action_required);
    }

    #[test]
    fn terminal_status_targets_requester_and_shared() {
        let event = NotificationEvent::for_status(
            "request_1",
            "Holiday",
            "emp",
            &chain(),
            ApprovalStatus::Rejected,
        );
        assert_eq!(event.target_users, vec!["emp".to_string(), "hr".to_string()]);
        assert!(!event.action_required);
        assert_eq!(event.message().subject, "[Rejected] Holiday");
    }

    #[test]
    fn requester_in_shared_is_targeted_once() {
        let chain = ApproverChain::new()
            .set_first("lead")
            .add_shared("emp")
            .add_shared("hr");
        let event = NotificationEvent::for_status(
            "request_1",
            "Holiday",
            "emp",
            &chain,
            ApprovalStatus::Approved,
        );
        assert_eq!(event.target_users, vec!["emp".to_string(), "hr".to_string()]);
    }

    #[test]
    fn no_cc_without_shared_accounts() {
        let chain = ApproverChain::new().set_first("lead");
        assert!(NotificationEvent::cc_on_create(
            "request_1",
            "t",
            "emp",
            &chain,
            ApprovalStatus::Stage1Pending
        )
        .is_none());
    }
}
