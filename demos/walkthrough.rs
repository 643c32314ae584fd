//! Runs one vacation request through a chain with an empty middle tier.
//!
//! `cargo run --example walkthrough [config.toml]`

use std::sync::Arc;
use tiered_approval::{
    balance::{DayKind, LeaveDays},
    chain::{ApproverChain, ChainInput},
    config::EngineConfig,
    directory::InMemoryDirectory,
    document::{DocumentPayload, LeaveDay, RequestDraft, VacationPayload},
    notify::LogNotifier,
    service::ApprovalService,
    store::Store,
    telemetry,
    types::TimeStamp,
    workflow::Decision,
};

fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1);
    let mut config = match &config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    // keep the demo's output in order
    config.notifications.background = false;
    telemetry::init(&config.logging);

    // without a config file nothing is left on disk
    let store = match config_path {
        Some(_) => Store::open_path(&config.database_path)?,
        None => Store::open(Arc::new(sled::Config::new().temporary(true).open()?))?,
    };

    let directory = InMemoryDirectory::new()
        .with_contact("team_lead", "lead@example.com")
        .with_contact("director", "director@example.com")
        .with_contact("jiwoo", "jiwoo@example.com")
        .with_default_chain(
            "jiwoo",
            ApproverChain::new()
                .set_first("team_lead")
                .set_third("director")
                .add_shared("hr_desk"),
        );

    let service = ApprovalService::new(
        store,
        Arc::new(directory),
        Arc::new(LogNotifier),
        config,
    )?;
    service.set_balance("jiwoo", LeaveDays::whole(12), LeaveDays::ZERO)?;

    let day = |d: u32, kind: DayKind| -> anyhow::Result<LeaveDay> {
        let date = TimeStamp::new_with(2025, 8, d, 0, 0, 0)
            .ok_or_else(|| anyhow::anyhow!("bad date 2025-08-{d}"))?;
        Ok(LeaveDay { date, kind })
    };
    let payload = DocumentPayload::Vacation(VacationPayload {
        days: vec![
            day(4, DayKind::Full)?,
            day(5, DayKind::Half)?,
            day(6, DayKind::Authorized)?,
        ],
        reason: "Chuseok travel".into(),
    });

    let receipt = service.create(
        RequestDraft::new()
            .set_requester("jiwoo")
            .set_title("August leave")
            .set_payload(payload)
            .set_approvers(ChainInput::Absent),
    )?;
    println!("created {} at {:?}", receipt.id, receipt.status);

    let status = service.decide(&receipt.id, "team_lead", Decision::Approve, Some("covered"))?;
    println!("team lead approved -> {status:?}");

    let status = service.decide(&receipt.id, "director", Decision::Approve, None)?;
    println!("director approved -> {status:?}");

    let request = service.get(&receipt.id)?;
    request.history.view_history();
    for entry in request.history.entries() {
        println!(
            "  {} {:?} -> {}",
            entry.approver_id,
            entry.decision,
            entry.resulting_status.label()
        );
    }

    let balance = service.balance("jiwoo")?;
    println!("remaining {} days, used {}", balance.remaining, balance.used);

    Ok(())
}
