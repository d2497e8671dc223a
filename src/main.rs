// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0
//! `hector-ops`: operator CLI for Hector bridge splitter deployments.
//!
//! Reads `.env`, an optional JSON config file and the built-in chain
//! profiles, runs the selected work per chain and prints a summary. Exits
//! non-zero when any chain failed.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use alloy_chains::NamedChain;
use alloy_network::Ethereum;
use alloy_primitives::Address;
use alloy_provider::DynProvider;
use alloy_signer_local::PrivateKeySigner;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use hector_ops::chain::addresses::{FANTOM_REGISTRATION_V1, FANTOM_REGISTRATION_V2};
use hector_ops::config::{operator_key, parse_chain, process_env};
use hector_ops::providers::{
    connect, connect_read_only, implementation_address, parse_signer, preflight,
    AlloyBridgeSplitter, AlloyLockRegistry, AlloyOwnable, AlloyRegistration, TokioClock,
};
use hector_ops::traits::{TokenListSource, Verifier};
use hector_ops::{
    collect_candidates, migrate_wallets, run_tasks, AdminStep, ChainPlan, ChainReport,
    ChainSettings, ConfigurationSequencer, EtherscanVerifier, LifiTokenList, ManagingCategory,
    Operator, OpsConfig, OpsError, PlanStage, Result, RunReport, SquidTokenList, StageReport,
    Submitter, VerificationOutcome,
};

type Splitter = AlloyBridgeSplitter<DynProvider<Ethereum>>;

#[derive(Parser)]
#[command(name = "hector-ops", version)]
#[command(about = "Timelocked allow-list and configuration runs for Hector contracts", long_about = None)]
struct Cli {
    /// JSON config file with per-chain overrides
    #[arg(long, global = true, env = "HECTOR_OPS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Full post-deployment plan: configure, whitelist bridges and assets, hand over
    Run {
        #[arg(long = "chain", value_parser = parse_chain)]
        chains: Vec<NamedChain>,

        /// Every chain listed in the config file
        #[arg(long, conflicts_with = "chains")]
        all: bool,
    },

    /// Activate one allow-list category
    Whitelist {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,

        /// `bridges` or `assets`
        #[arg(long)]
        category: ManagingCategory,

        /// Index of the first batch to process, from a previous run's checkpoint
        #[arg(long, default_value_t = 0)]
        resume_from: usize,
    },

    /// Administrative steps only
    Configure {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,
    },

    /// Move proxy admin and splitter ownership to the final owner
    TransferOwnership {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,
    },

    /// Initialize the lock address registry, add its moderators, then verify
    InitLockRegistry {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,
    },

    /// Copy registered wallets from one registration contract to another
    MigrateWallets {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,

        #[arg(long)]
        from: Option<Address>,

        #[arg(long)]
        to: Option<Address>,

        /// Wallets per transaction
        #[arg(long, default_value_t = 20)]
        chunk: usize,

        #[arg(long, default_value_t = 0)]
        resume_from: usize,
    },

    /// Print the implementation behind an EIP-1967 proxy
    Implementation {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,

        #[arg(long)]
        proxy: Address,
    },

    /// Fetch the token lists and print the normalized candidate count
    Tokens {
        #[arg(long, value_parser = parse_chain)]
        chain: NamedChain,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, event = "fatal_error");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,hector_ops=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Returns whether every chain succeeded.
async fn run(cli: Cli) -> Result<bool> {
    let config = match &cli.config {
        Some(path) => OpsConfig::from_path(path)?,
        None => OpsConfig::default(),
    };

    match cli.command {
        Command::Run { chains, all } => {
            let chains = if all { config.chains()? } else { chains };
            if chains.is_empty() {
                return Err(OpsError::InvalidConfig(
                    "select chains with --chain or --all".to_string(),
                ));
            }
            let signer = signer()?;
            let deployer = signer.address();
            let report = run_tasks(chains, |chain| {
                let config = &config;
                let signer = signer.clone();
                async move {
                    let (operator, settings) = splitter_operator(config, chain, signer).await?;
                    let mut plan = ChainPlan::bridge_splitter(&settings.profile, deployer)?;
                    if let Some(request) = settings.verification.clone() {
                        plan = plan.with_stage(PlanStage::Verify(request));
                    }
                    Ok(operator.run(&plan).await)
                }
            })
            .await;
            Ok(finish(report))
        }

        Command::Whitelist {
            chain,
            category,
            resume_from,
        } => {
            let signer = signer()?;
            let report = run_tasks([chain], |chain| {
                let config = &config;
                let signer = signer.clone();
                async move {
                    let (operator, settings) = splitter_operator(config, chain, signer).await?;
                    let plan = ChainPlan::whitelist(&settings.profile, category, resume_from);
                    Ok(operator.run(&plan).await)
                }
            })
            .await;
            Ok(finish(report))
        }

        Command::Configure { chain } => {
            let signer = signer()?;
            let deployer = signer.address();
            let report = run_tasks([chain], |chain| {
                let config = &config;
                let signer = signer.clone();
                async move {
                    let (operator, settings) = splitter_operator(config, chain, signer).await?;
                    let plan = ChainPlan::configure(&settings.profile, deployer)?;
                    Ok(operator.run(&plan).await)
                }
            })
            .await;
            Ok(finish(report))
        }

        Command::TransferOwnership { chain } => {
            let signer = signer()?;
            let report = run_tasks([chain], |chain| {
                let config = &config;
                let signer = signer.clone();
                async move { transfer_ownership(config, chain, signer).await }
            })
            .await;
            Ok(finish(report))
        }

        Command::InitLockRegistry { chain } => {
            let signer = signer()?;
            let report = run_tasks([chain], |chain| {
                let config = &config;
                let signer = signer.clone();
                async move { init_lock_registry(config, chain, signer).await }
            })
            .await;
            Ok(finish(report))
        }

        Command::MigrateWallets {
            chain,
            from,
            to,
            chunk,
            resume_from,
        } => {
            let signer = signer()?;
            let report = run_tasks([chain], |chain| {
                let config = &config;
                let signer = signer.clone();
                async move {
                    let settings = config.resolve(chain, process_env)?;
                    let from = from.unwrap_or(FANTOM_REGISTRATION_V1);
                    let to = match to.or(settings.registration) {
                        Some(to) => to,
                        None if chain == NamedChain::Fantom => FANTOM_REGISTRATION_V2,
                        None => settings.require_registration()?,
                    };
                    let provider = connect(settings.rpc_url.clone(), signer.clone());
                    preflight(&provider, chain as u64, signer.address()).await?;

                    let options = config
                        .migration
                        .with_chunk_limit(chunk)
                        .with_resume_from(resume_from);
                    let submitter = Submitter::new(config.retry, TokioClock::new());
                    let migration = migrate_wallets(
                        &AlloyRegistration::new(from, provider.clone()),
                        &AlloyRegistration::new(to, provider),
                        &submitter,
                        options,
                    )
                    .await?;

                    let mut report = ChainReport::new(chain);
                    if !migration.is_success() {
                        report.error = Some("wallet migration stopped early".to_string());
                    }
                    report.stages.push(StageReport::Migration(migration));
                    Ok(report)
                }
            })
            .await;
            Ok(finish(report))
        }

        Command::Implementation { chain, proxy } => {
            let settings = config.resolve(chain, process_env)?;
            let provider = connect_read_only(settings.rpc_url);
            let implementation = implementation_address(&provider, proxy).await?;
            println!("{implementation}");
            Ok(!implementation.is_zero())
        }

        Command::Tokens { chain } => {
            let profile = config.profile(chain, &process_env)?;
            let candidates = collect_candidates(&token_sources()?, profile.token_list_chain_id).await?;
            for rejected in &candidates.rejected {
                println!("rejected {}: {}", rejected.input, rejected.reason);
            }
            println!(
                "{chain}: {} candidates, {} rejected, {} batches of {}",
                candidates.len(),
                candidates.rejected.len(),
                hector_ops::batch_count(candidates.len(), profile.token_limits.queue),
                profile.token_limits.queue
            );
            Ok(true)
        }
    }
}

fn finish(report: RunReport) -> bool {
    println!("{report}");
    report.is_success()
}

fn signer() -> Result<PrivateKeySigner> {
    parse_signer(&operator_key(process_env)?)
}

fn explorer_verifier(config: &OpsConfig, chain: NamedChain) -> Result<Option<Box<dyn Verifier>>> {
    match config.explorer_api_key(process_env) {
        Some(key) => {
            let etherscan = EtherscanVerifier::etherscan_v2(chain as u64, key, TokioClock::new())?;
            Ok(Some(Box::new(etherscan) as Box<dyn Verifier>))
        }
        None => Ok(None),
    }
}

fn token_sources() -> Result<Vec<Box<dyn TokenListSource>>> {
    let lifi: Box<dyn TokenListSource> = Box::new(LifiTokenList::production()?);
    let squid: Box<dyn TokenListSource> = Box::new(SquidTokenList::production()?);
    Ok(vec![lifi, squid])
}

/// Connects to `chain`, checks the operator account and builds an operator
/// over the configured splitter.
async fn splitter_operator(
    config: &OpsConfig,
    chain: NamedChain,
    signer: PrivateKeySigner,
) -> Result<(Operator<Splitter, Splitter, TokioClock>, ChainSettings)> {
    let settings = config.resolve(chain, process_env)?;
    let splitter_address = settings.require_splitter()?;
    let provider = connect(settings.rpc_url.clone(), signer.clone());
    preflight(&provider, chain as u64, signer.address()).await?;

    let verifier = explorer_verifier(config, chain)?;

    let splitter = AlloyBridgeSplitter::new(splitter_address, provider);
    info!(
        chain = %chain,
        splitter = %splitter_address,
        token_limit_queue = settings.profile.token_limits.queue,
        token_limit_toggle = settings.profile.token_limits.toggle,
        event = "operator_ready"
    );

    let operator = Operator::builder()
        .timelock(splitter.clone())
        .admin(splitter)
        .clock(TokioClock::new())
        .profile(settings.profile.clone())
        .target_address(splitter_address)
        .settle_delay(Duration::from_secs(config.settle_delay_secs))
        .timelock_options(config.timelock.with_retry(config.retry))
        .token_sources(token_sources()?)
        .maybe_verifier(verifier)
        .build();
    Ok((operator, settings))
}

/// Transfers the proxy admin, then the splitter proxy, to the final owner.
async fn transfer_ownership(
    config: &OpsConfig,
    chain: NamedChain,
    signer: PrivateKeySigner,
) -> Result<ChainReport> {
    let settings = config.resolve(chain, process_env)?;
    let owner = settings.profile.final_owner()?;
    let provider = connect(settings.rpc_url.clone(), signer.clone());
    preflight(&provider, chain as u64, signer.address()).await?;

    let steps = [AdminStep::TransferOwnership(owner)];
    let mut report = ChainReport::new(chain);
    for target in [settings.require_proxy_admin()?, settings.require_splitter()?] {
        let sequence = ConfigurationSequencer::builder()
            .target(AlloyOwnable::new(target, provider.clone()))
            .clock(TokioClock::new())
            .target_address(target)
            .settle_delay(Duration::from_secs(config.settle_delay_secs))
            .retry(config.retry)
            .build()
            .run(&steps)
            .await?;
        let succeeded = sequence.is_success();
        report.stages.push(StageReport::Admin(sequence));
        if !succeeded {
            report.error = Some(format!("ownership transfer failed for {target}"));
            break;
        }
    }
    Ok(report)
}

/// Initializes the lock address registry and grants its extra moderators.
/// Verification follows when a request and an explorer key are configured.
async fn init_lock_registry(
    config: &OpsConfig,
    chain: NamedChain,
    signer: PrivateKeySigner,
) -> Result<ChainReport> {
    let settings = config.resolve(chain, process_env)?;
    let registry = settings.require_lock_registry()?;
    let provider = connect(settings.rpc_url.clone(), signer.clone());
    preflight(&provider, chain as u64, signer.address()).await?;

    let sequencer = ConfigurationSequencer::builder()
        .target(AlloyLockRegistry::new(registry.address, provider))
        .clock(TokioClock::new())
        .target_address(registry.address)
        .settle_delay(Duration::from_secs(config.settle_delay_secs))
        .retry(config.retry)
        .build();
    let steps = registry.steps();
    let sequence = match (&registry.verification, explorer_verifier(config, chain)?) {
        (Some(request), Some(verifier)) => {
            sequencer
                .run_then_verify(&steps, verifier.as_ref(), request)
                .await?
        }
        (Some(request), None) => {
            warn!(address = %request.address, event = "verification_skipped");
            let mut sequence = sequencer.run(&steps).await?;
            sequence.verification = Some(VerificationOutcome::Failed {
                reason: "no explorer API key configured".to_string(),
            });
            sequence
        }
        (None, _) => sequencer.run(&steps).await?,
    };

    let mut report = ChainReport::new(chain);
    if !sequence.is_success() {
        report.error = Some(format!(
            "lock registry initialization failed for {}",
            registry.address
        ));
    }
    report.stages.push(StageReport::Admin(sequence));
    Ok(report)
}
