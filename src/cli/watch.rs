//! `maya watch` - the interactive companion loop.

use std::future::Future;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::broadcast::error::RecvError;

use crate::gate::GateState;
use crate::runtime::MayaRuntime;
use crate::session::ConnectEvent;

pub(super) async fn run_watch(runtime: MayaRuntime) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin()).lines();
    watch_until(runtime, stdin, tokio::signal::ctrl_c()).await
}

/// Drive the runtime until `shutdown` resolves.
///
/// Answers are read from `input` while it stays open. End of input only
/// stops the prompt; polling goes on until `shutdown`.
async fn watch_until<R, S, T>(
    mut runtime: MayaRuntime,
    mut input: Lines<R>,
    shutdown: S,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    S: Future<Output = T>,
{
    let limit = runtime.config().polling.display_limit;
    let agent_id = runtime.gate().agent_id().to_string();
    let mut telemetry = runtime.poller().subscribe();
    let mut gate = runtime.gate().subscribe();
    let mut connect_events = runtime.session().events();
    let mut input_open = true;
    let mut result = Ok(());
    tokio::pin!(shutdown);

    runtime.start();
    println!(
        "Watching agent {} (polling every {:?}, Ctrl-C to quit)",
        agent_id,
        runtime.poller().interval()
    );

    loop {
        tokio::select! {
            changed = telemetry.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = telemetry.borrow_and_update().clone();
                println!("--- agent logs ---");
                super::print_telemetry(&snapshot, limit);
            }
            changed = gate.changed() => {
                if changed.is_err() {
                    break;
                }
                if *gate.borrow_and_update() == GateState::Prompting {
                    if input_open {
                        println!("Agent {agent_id} needs a decision. Keep it running? [y/n]");
                    } else {
                        println!("Agent {agent_id} needs a decision; answer with `maya agent decide`.");
                    }
                }
            }
            event = connect_events.recv() => match event {
                Ok(ConnectEvent::Established(session)) => {
                    println!("Wallet connected: {}", session.address().unwrap_or_default());
                }
                Ok(ConnectEvent::Failed { reason }) => println!("Wallet connection failed: {reason}"),
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            line = input.next_line(), if input_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        tracing::info!("Input closed; watching without prompts");
                        input_open = false;
                        continue;
                    }
                    Err(e) => {
                        result = Err(e.into());
                        break;
                    }
                };
                if runtime.gate().state() != GateState::Prompting {
                    continue;
                }
                let Some(keep_running) = parse_answer(&line) else {
                    println!("Please answer y or n.");
                    continue;
                };
                let receipt = runtime.gate().on_decision(keep_running).await;
                if receipt.delivered {
                    println!("Sent '{}'.", receipt.decision);
                } else {
                    println!("Could not deliver '{}'; the prompt will return if the agent asks again.", receipt.decision);
                }
            }
            _ = &mut shutdown => break,
        }
    }

    runtime.shutdown().await;
    result
}

fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "continue" => Some(true),
        "n" | "no" | "terminate" => Some(false),
        _ => None,
    }
}
