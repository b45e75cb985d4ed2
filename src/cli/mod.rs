//! Command-line interface for the MAYA companion.

mod doctor;
mod watch;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::Config;
use crate::error::WalletError;
use crate::model::{Proposal, WalletSession};
use crate::runtime::MayaRuntime;
use crate::session::ConnectEvent;
use crate::settings::Settings;
use crate::telemetry::{DerivedTelemetry, PollOutcome};
use crate::wallet::{TransactionRequest, checksum_address};

#[derive(Parser, Debug)]
#[command(name = "maya")]
#[command(about = "Wallet, agent telemetry and proposal companion for the MAYA core", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML config file (defaults to ~/.maya/config.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the MAYA core base URL.
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the companion: stream telemetry and answer decision prompts.
    Watch,

    /// Fetch agent logs once and print the latest lines.
    Logs {
        /// Number of lines to show.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Funding proposals.
    Proposals {
        #[command(subcommand)]
        command: ProposalsCommand,
    },

    /// Show the treasury snapshot.
    Treasury,

    /// Agent control.
    Agent {
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Wallet session and signing.
    Wallet {
        #[command(subcommand)]
        command: WalletCommand,
    },

    /// Config file management.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Check configuration, session record and core reachability.
    Doctor,
}

#[derive(Subcommand, Debug)]
pub enum ProposalsCommand {
    /// List pending proposals.
    List,
    /// Approve a proposal.
    Approve { id: String },
    /// Reject a proposal.
    Reject { id: String },
}

#[derive(Subcommand, Debug)]
pub enum AgentCommand {
    /// Ask the core to start the agent.
    Start {
        #[arg(long)]
        agent_id: Option<String>,
    },
    /// Answer a continue/terminate prompt directly.
    Decide {
        #[arg(value_enum)]
        decision: DecisionArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionArg {
    Continue,
    Terminate,
}

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    /// Show the current session.
    Status {
        /// Also look the session up on the core.
        #[arg(long)]
        verify: bool,
    },
    /// Pair a wallet and wait for approval.
    Connect {
        #[arg(long, default_value = "120")]
        timeout_secs: u64,
    },
    /// Drop the session.
    Disconnect,
    /// Send ETH from the connected wallet.
    Send {
        to: String,
        /// Amount in ETH.
        value: String,
        #[arg(long, default_value = "")]
        data: String,
    },
    /// Sign a JSON transaction, or EIP-712 typed data with --typed-data.
    Sign {
        payload: String,
        #[arg(long)]
        typed_data: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a config file with the default settings.
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the resolved configuration.
    Show,
}

/// Dispatch a parsed command line.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Command::Config { command } = &cli.command {
        return run_config_command(command, cli.config.as_deref());
    }

    let mut config = Config::from_env_with_toml(cli.config.as_deref())?;
    if let Some(url) = cli.api_url {
        config.api.base_url = url;
    }

    if matches!(cli.command, Command::Doctor) {
        return doctor::run_doctor(&config).await;
    }

    let runtime = MayaRuntime::build(config)?;
    match cli.command {
        Command::Watch => watch::run_watch(runtime).await,
        Command::Logs { limit } => run_logs(&runtime, limit).await,
        Command::Proposals { command } => run_proposals(&runtime, command).await,
        Command::Treasury => run_treasury(&runtime).await,
        Command::Agent { command } => run_agent(&runtime, command).await,
        Command::Wallet { command } => run_wallet(&runtime, command).await,
        Command::Config { .. } | Command::Doctor => Ok(()),
    }
}

async fn run_logs(runtime: &MayaRuntime, limit: Option<usize>) -> anyhow::Result<()> {
    if let PollOutcome::Failed(e) = runtime.poller().poll_once().await {
        return Err(e).context("failed to fetch agent logs");
    }
    let limit = limit.unwrap_or(runtime.config().polling.display_limit);
    print_telemetry(&runtime.poller().snapshot(), limit);
    Ok(())
}

pub(crate) fn print_telemetry(telemetry: &DerivedTelemetry, limit: usize) {
    for line in telemetry.recent(limit) {
        println!("  {line}");
    }
    println!("Cumulative profit: {} ETH", telemetry.cumulative_profit);
    if telemetry.decision_pending {
        println!("Decision required: continue or terminate the agent");
    }
}

async fn run_proposals(runtime: &MayaRuntime, command: ProposalsCommand) -> anyhow::Result<()> {
    let sync = runtime.proposals();
    match command {
        ProposalsCommand::List => {
            sync.fetch_pending_proposals()
                .await
                .context("failed to fetch proposals")?;
            let proposals = sync.proposals();
            if proposals.is_empty() {
                println!("No pending proposals.");
            }
            for proposal in &proposals {
                print_proposal(proposal);
            }
        }
        ProposalsCommand::Approve { id } => {
            if !sync.approve(&id).await {
                bail!("proposal {id} was not approved");
            }
            println!("Approved {id}. {} proposal(s) still pending.", sync.proposals().len());
        }
        ProposalsCommand::Reject { id } => {
            if !sync.reject(&id).await {
                bail!("proposal {id} was not rejected");
            }
            println!("Rejected {id}. {} proposal(s) still pending.", sync.proposals().len());
        }
    }
    Ok(())
}

fn print_proposal(proposal: &Proposal) {
    println!(
        "{}  [{}]  agent {}  cost {} ETH",
        proposal.id,
        proposal.status,
        proposal.agent_id.as_deref().unwrap_or("-"),
        proposal.cost_eth
    );
    if let Some(purpose) = &proposal.purpose {
        println!("    {purpose}");
    }
    if let Some(revenue) = proposal.expected_monthly_revenue_eth {
        println!("    expected revenue: {revenue} ETH/month");
    }
    if let Some(roi) = proposal.roi_hrs {
        println!("    ROI: {roi} h");
    }
}

async fn run_treasury(runtime: &MayaRuntime) -> anyhow::Result<()> {
    let sync = runtime.proposals();
    sync.fetch_treasury()
        .await
        .context("failed to fetch treasury")?;
    let Some(treasury) = sync.treasury() else {
        bail!("treasury snapshot unavailable");
    };

    println!("Treasury {}", display_address(&treasury.address));
    println!("  balance: {} ETH", treasury.balance_eth);
    if !treasury.contributor_agent_ids.is_empty() {
        let ids: Vec<&str> = treasury
            .contributor_agent_ids
            .iter()
            .map(String::as_str)
            .collect();
        println!("  contributors: {}", ids.join(", "));
    }
    match treasury.last_updated {
        Some(ts) => println!("  updated: {}", ts.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("  updated: unknown"),
    }
    println!("  wallet connected: {}", treasury.wallet_connected);
    Ok(())
}

async fn run_agent(runtime: &MayaRuntime, command: AgentCommand) -> anyhow::Result<()> {
    match command {
        AgentCommand::Start { agent_id } => {
            let agent_id = agent_id.unwrap_or_else(|| runtime.config().gate.agent_id.clone());
            runtime.proposals().start_agent(&agent_id).await?;
            println!("Start requested for agent {agent_id}.");
        }
        AgentCommand::Decide { decision } => {
            let receipt = runtime
                .gate()
                .on_decision(decision == DecisionArg::Continue)
                .await;
            if !receipt.delivered {
                bail!("decision '{}' was not delivered", receipt.decision);
            }
            println!(
                "Sent '{}' for agent {}.",
                receipt.decision,
                runtime.gate().agent_id()
            );
        }
    }
    Ok(())
}

async fn run_wallet(runtime: &MayaRuntime, command: WalletCommand) -> anyhow::Result<()> {
    let session = runtime.session();
    match command {
        WalletCommand::Status { verify } => {
            let current = session.current();
            if let Some(address) = current.address()
                && let Err(e) = runtime.proposals().refresh_balance(address).await
            {
                eprintln!("Balance unavailable: {e}");
            }
            print_session(&session.current());
            if verify && current.is_connected() {
                let info = session.verify_remote().await?;
                println!(
                    "  server: {} on chain {} (connected {})",
                    display_address(&info.address),
                    info.chain_id,
                    info.connected_at
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "at unknown time".to_string())
                );
            }
        }
        WalletCommand::Connect { timeout_secs } => {
            let mut events = session.events();
            let uri = session.connect().await?;
            println!("Scan or paste this URI into your wallet:\n\n  {uri}\n");
            println!("Waiting for approval...");

            let event = tokio::time::timeout(Duration::from_secs(timeout_secs), events.recv())
                .await
                .context("timed out waiting for wallet approval")??;
            match event {
                ConnectEvent::Established(s) => print_session(&s),
                ConnectEvent::Failed { reason } => bail!("wallet connection failed: {reason}"),
            }
        }
        WalletCommand::Disconnect => {
            let was_connected = session.is_connected();
            session.disconnect().await?;
            if was_connected {
                println!("Wallet disconnected.");
            } else {
                println!("No wallet was connected.");
            }
        }
        WalletCommand::Send { to, value, data } => {
            let current = session.current();
            let from = current.address().ok_or(WalletError::NotConnected)?;
            let request = TransactionRequest::new(&to, from, &value, &data)?;
            match request.value_wei() {
                Some(wei) => println!("Sending {} ETH ({wei} wei) to {}", request.value, request.to),
                None => println!("Sending {} ETH to {}", request.value, request.to),
            }
            let hash = session.send_transaction(request)?.await?;
            println!("Transaction hash: {hash}");
        }
        WalletCommand::Sign {
            payload,
            typed_data,
        } => {
            let pending = if typed_data {
                session.sign_typed_data(payload)?
            } else {
                let tx: serde_json::Value =
                    serde_json::from_str(&payload).context("transaction payload is not JSON")?;
                session.sign_transaction(tx)?
            };
            println!("Signature: {}", pending.await?);
        }
    }
    Ok(())
}

fn print_session(session: &WalletSession) {
    if !session.is_connected() {
        println!("Wallet: not connected");
        return;
    }
    println!(
        "Wallet: {}",
        display_address(session.address().unwrap_or_default())
    );
    println!("  chain: {}", session.chain_id().unwrap_or_default());
    println!("  session: {}", session.session_id().unwrap_or_default());
    match session.balance_eth() {
        Some(balance) => println!("  balance: {balance} ETH"),
        None => println!("  balance: unknown"),
    }
}

fn display_address(address: &str) -> String {
    checksum_address(address).unwrap_or_else(|_| address.to_string())
}

fn run_config_command(
    command: &ConfigCommand,
    toml_path: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    match command {
        ConfigCommand::Init { force } => {
            let path = toml_path
                .map(PathBuf::from)
                .unwrap_or_else(Settings::default_toml_path);
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Settings::default()
                .save_toml(&path)
                .map_err(anyhow::Error::msg)?;
            println!("Wrote {}", path.display());
        }
        ConfigCommand::Show => {
            let config = Config::from_env_with_toml(toml_path)?;
            println!("api.base_url          = {}", config.api.base_url);
            println!("api.timeout           = {:?}", config.api.timeout);
            println!("polling.interval      = {:?}", config.polling.interval);
            println!("polling.display_limit = {}", config.polling.display_limit);
            println!(
                "wallet.session_path   = {}",
                config.wallet.session_path.display()
            );
            println!("wallet.approval_delay = {:?}", config.wallet.approval_delay);
            println!("gate.agent_id         = {}", config.gate.agent_id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_commands() {
        let cli = Cli::parse_from(["maya", "proposals", "approve", "prop_001"]);
        assert!(matches!(
            cli.command,
            Command::Proposals {
                command: ProposalsCommand::Approve { ref id }
            } if id == "prop_001"
        ));

        let cli = Cli::parse_from([
            "maya",
            "--api-url",
            "http://192.168.0.101:8000",
            "agent",
            "decide",
            "terminate",
        ]);
        assert_eq!(cli.api_url.as_deref(), Some("http://192.168.0.101:8000"));
        assert!(matches!(
            cli.command,
            Command::Agent {
                command: AgentCommand::Decide {
                    decision: DecisionArg::Terminate
                }
            }
        ));

        let cli = Cli::parse_from(["maya", "wallet", "sign", "{}", "--typed-data"]);
        assert!(matches!(
            cli.command,
            Command::Wallet {
                command: WalletCommand::Sign {
                    typed_data: true,
                    ..
                }
            }
        ));
    }

    #[test]
    fn config_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        run_config_command(&ConfigCommand::Init { force: false }, Some(&path)).unwrap();
        assert!(Settings::load_toml(&path).unwrap().is_some());

        let err = run_config_command(&ConfigCommand::Init { force: false }, Some(&path))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));

        run_config_command(&ConfigCommand::Init { force: true }, Some(&path)).unwrap();
    }

    #[tokio::test]
    async fn send_without_wallet_reports_not_connected() {
        use crate::api::fake::FakeApi;
        use crate::session::MemorySessionStore;
        use crate::wallet::{DEMO_ADDRESS, MockSigner};
        use std::sync::Arc;

        use crate::config::{ApiConfig, GateConfig, PollingConfig, WalletConfig};

        let config = Config {
            api: ApiConfig {
                base_url: "http://127.0.0.1:1".to_string(),
                timeout: Duration::from_secs(1),
            },
            polling: PollingConfig {
                interval: Duration::from_secs(10),
                display_limit: 10,
            },
            wallet: WalletConfig {
                session_path: PathBuf::from("unused.json"),
                approval_delay: Duration::ZERO,
            },
            gate: GateConfig {
                agent_id: "A-01".to_string(),
            },
        };
        let signer = Arc::new(MockSigner::new(Duration::ZERO));
        let runtime = MayaRuntime::with_components(
            config,
            Arc::new(FakeApi::new()),
            Arc::new(MemorySessionStore::new()),
            signer.clone(),
        );

        let err = run_wallet(
            &runtime,
            WalletCommand::Send {
                to: DEMO_ADDRESS.to_string(),
                value: "0.01".to_string(),
                data: String::new(),
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WalletError>(),
            Some(WalletError::NotConnected)
        ));
        assert_eq!(signer.signer_calls(), 0);
    }

    #[test]
    fn addresses_display_checksummed() {
        assert_eq!(
            display_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed"),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
        assert_eq!(display_address("not-an-address"), "not-an-address");
    }
}
