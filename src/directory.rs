//! Directory lookup: default approver chains and contact addresses
use super::chain::ApproverChain;
use super::document::DocumentKind;
use super::error::DirectoryError;
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub user_id: String,
    pub email: String,
}

/// The organisation directory as seen by the approval engine.
pub trait Directory: Send + Sync {
    fn find_approver_chain(
        &self,
        user_id: &str,
        kind: DocumentKind,
    ) -> Result<ApproverChain, DirectoryError>;

    fn find_contact(&self, user_id: &str) -> Result<Contact, DirectoryError>;
}

/// Map-backed directory, for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    // a chain registered for (user, None) applies to every document kind
    chains: RwLock<HashMap<(String, Option<DocumentKind>), ApproverChain>>,
    contacts: RwLock<HashMap<String, String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(self, user_id: &str, email: &str) -> Self {
        self.add_contact(user_id, email);
        self
    }

    pub fn with_default_chain(self, user_id: &str, chain: ApproverChain) -> Self {
        self.set_chain(user_id, None, chain);
        self
    }

    pub fn with_chain_for(self, user_id: &str, kind: DocumentKind, chain: ApproverChain) -> Self {
        self.set_chain(user_id, Some(kind), chain);
        self
    }

    pub fn add_contact(&self, user_id: &str, email: &str) {
        let mut contacts = self.contacts.write().unwrap_or_else(|e| e.into_inner());
        contacts.insert(user_id.to_string(), email.to_string());
    }

    pub fn set_chain(&self, user_id: &str, kind: Option<DocumentKind>, chain: ApproverChain) {
        let mut chains = self.chains.write().unwrap_or_else(|e| e.into_inner());
        chains.insert((user_id.to_string(), kind), chain);
    }
}

impl Directory for InMemoryDirectory {
    fn find_approver_chain(
        &self,
        user_id: &str,
        kind: DocumentKind,
    ) -> Result<ApproverChain, DirectoryError> {
        let chains = self.chains.read().unwrap_or_else(|e| e.into_inner());
        chains
            .get(&(user_id.to_string(), Some(kind)))
            .or_else(|| chains.get(&(user_id.to_string(), None)))
            .cloned()
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))
    }

    fn find_contact(&self, user_id: &str) -> Result<Contact, DirectoryError> {
        let contacts = self.contacts.read().unwrap_or_else(|e| e.into_inner());
        contacts
            .get(user_id)
            .map(|email| Contact {
                user_id: user_id.to_string(),
                email: email.clone(),
            })
            .ok_or_else(|| DirectoryError::NotFound(user_id.to_string()))
    }
}
