//! Sequential multi-tier approval engine.
//!
//! Documents travel through up to three single-approver tiers. Empty tiers
//! are skipped, every decision lands in an append-only history, and side
//! effects (leave deduction, notification) run exactly once per transition.

pub mod balance;
pub mod chain;
pub mod config;
pub mod directory;
pub mod document;
pub mod error;
pub mod history;
pub mod notify;
pub mod request;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod workflow;
