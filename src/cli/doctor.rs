//! `maya doctor` - active health diagnostics.
//!
//! Validates the session record and probes the MAYA core so problems show
//! up before `watch` is started. Each check reports pass/fail with the
//! underlying error on failure.

use std::sync::Arc;

use crate::api::{HttpMayaApi, MayaApi};
use crate::config::Config;
use crate::error::ApiError;
use crate::session::{FileSessionStore, SessionStore};

/// Run diagnostic checks and print results.
pub(super) async fn run_doctor(config: &Config) -> anyhow::Result<()> {
    println!("MAYA Doctor");
    println!("===========\n");

    let mut passed = 0u32;
    let mut failed = 0u32;

    check(
        "Session record",
        check_session_record(config),
        &mut passed,
        &mut failed,
    );

    match HttpMayaApi::from_config(&config.api) {
        Ok(api) => {
            let api: Arc<dyn MayaApi> = Arc::new(api);
            check(
                "Agent logs endpoint",
                probe("GET /agents/logs", api.agent_logs().await.map(|l| {
                    format!("{} line(s)", l.len())
                })),
                &mut passed,
                &mut failed,
            );
            check(
                "Proposals endpoint",
                probe(
                    "GET /proposals/pending",
                    api.pending_proposals()
                        .await
                        .map(|p| format!("{} pending", p.len())),
                ),
                &mut passed,
                &mut failed,
            );
            check(
                "Treasury endpoint",
                probe(
                    "GET /treasury",
                    api.treasury()
                        .await
                        .map(|t| format!("{} ETH", t.balance_eth)),
                ),
                &mut passed,
                &mut failed,
            );
        }
        Err(e) => check(
            "MAYA core URL",
            CheckResult::Fail(e.to_string()),
            &mut passed,
            &mut failed,
        ),
    }

    println!();
    println!("  {passed} passed, {failed} failed");

    if failed > 0 {
        anyhow::bail!("doctor found {failed} failing check(s)");
    }
    Ok(())
}

fn check(name: &str, result: CheckResult, passed: &mut u32, failed: &mut u32) {
    match result {
        CheckResult::Pass(detail) => {
            *passed += 1;
            println!("  [pass] {name}: {detail}");
        }
        CheckResult::Fail(detail) => {
            *failed += 1;
            println!("  [FAIL] {name}: {detail}");
        }
        CheckResult::Skip(reason) => {
            println!("  [skip] {name}: {reason}");
        }
    }
}

#[derive(Debug)]
enum CheckResult {
    Pass(String),
    Fail(String),
    Skip(String),
}

fn check_session_record(config: &Config) -> CheckResult {
    let path = &config.wallet.session_path;
    if !path.exists() {
        return CheckResult::Skip(format!("no record at {}", path.display()));
    }
    match FileSessionStore::new(path).load() {
        Ok(record) => match record.restore() {
            Some(session) => CheckResult::Pass(format!(
                "restorable session for {}",
                session.address().unwrap_or_default()
            )),
            None if record.is_empty() => {
                CheckResult::Pass(format!("{} has no session", path.display()))
            }
            None => CheckResult::Fail(format!(
                "{} holds an incomplete session; run `maya wallet disconnect` to reset it",
                path.display()
            )),
        },
        Err(e) => CheckResult::Fail(e.to_string()),
    }
}

fn probe(endpoint: &str, result: Result<String, ApiError>) -> CheckResult {
    match result {
        Ok(detail) => CheckResult::Pass(detail),
        Err(e) if e.is_transport() => {
            CheckResult::Fail(format!("{endpoint} unreachable: {e}. Is the MAYA core running?"))
        }
        Err(e) => CheckResult::Fail(e.to_string()),
    }
}
