use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use launchsim_core::{
    address::Bech32AddressCodec,
    builder::Incentives,
    gentx::JsonGentxParser,
    ledger::InMemoryLedger,
    runtime::{CliChainRuntimeBuilder, CliChainRuntimeConfig, StartVerdicts},
    simulator::{HttpHealthChecker, SimulationConfig},
    verifier::{RequestVerifier, VerifierConfig},
};
use log::info;
use tokio_util::sync::CancellationToken;

pub type Verifier = RequestVerifier<
    InMemoryLedger,
    CliChainRuntimeBuilder,
    JsonGentxParser,
    Bech32AddressCodec,
    HttpHealthChecker,
>;

#[derive(Debug, Parser)]
pub struct LedgerOptions {
    /// Path to the JSON snapshot of the ledger launches
    #[clap(long = "ledger.snapshot", env = "LEDGER_SNAPSHOT")]
    snapshot: PathBuf,
    /// Address prefix of the ledger
    #[clap(long = "ledger.address-prefix", env = "LEDGER_ADDRESS_PREFIX")]
    #[clap(default_value = "spn")]
    address_prefix: String,
}

#[derive(Debug, Parser)]
pub struct RuntimeOptions {
    /// Path or name of the node binary
    #[clap(long = "runtime.binary", env = "RUNTIME_BINARY", default_value = "simd")]
    binary: PathBuf,
    /// Moniker of the simulated node
    #[clap(long = "runtime.moniker", env = "RUNTIME_MONIKER")]
    #[clap(default_value = "launchsim")]
    moniker: String,
    /// Account address prefix of the chain
    #[clap(long = "runtime.address-prefix", env = "RUNTIME_ADDRESS_PREFIX")]
    #[clap(default_value = "cosmos")]
    address_prefix: String,
    /// Whether the binary exposes genesis commands at the top level, as before SDK v0.47
    #[clap(long = "runtime.legacy-genesis-commands")]
    legacy_genesis_commands: bool,
    /// Subcommand hosting `unsafe-reset-all`
    #[clap(long = "runtime.reset-subcommand", env = "RUNTIME_RESET_SUBCOMMAND")]
    #[clap(default_value = "comet")]
    reset_subcommand: String,
}

#[derive(Debug, Parser)]
pub struct SimulationOptions {
    /// Seconds the chain has to become healthy
    #[clap(long = "simulation.timeout", env = "SIMULATION_TIMEOUT", default_value_t = 60)]
    timeout: u64,
    /// Denomination of the zero minimum gas price
    #[clap(long = "simulation.gas-denom", env = "SIMULATION_GAS_DENOM")]
    #[clap(default_value = "stake")]
    gas_denom: String,
    /// Whether the chain is an incentivized testnet relaying rewards to the ledger
    #[clap(long = "simulation.incentivized")]
    incentivized: bool,
    /// Chain id of the ledger rewards are relayed to
    #[clap(long = "simulation.consumer-chain-id", env = "SIMULATION_CONSUMER_CHAIN_ID")]
    #[clap(default_value = "spn-1")]
    consumer_chain_id: String,
}

/// Options shared by every subcommand.
#[derive(Debug, Parser)]
pub struct VerifierOptions {
    #[clap(flatten)]
    ledger: LedgerOptions,
    #[clap(flatten)]
    runtime: RuntimeOptions,
    #[clap(flatten)]
    simulation: SimulationOptions,
}

impl VerifierOptions {
    pub fn build(self, cancellation: CancellationToken) -> Result<Verifier> {
        let ledger = InMemoryLedger::from_snapshot_file(&self.ledger.snapshot)?;
        info!("Loaded ledger snapshot {}", self.ledger.snapshot.display());

        let config = VerifierConfig {
            ledger_address_prefix: self.ledger.address_prefix,
            simulation: SimulationConfig {
                timeout: Duration::from_secs(self.simulation.timeout),
                minimum_gas_denom: self.simulation.gas_denom,
                ..Default::default()
            },
            incentives: self
                .simulation
                .incentivized
                .then(|| Incentives::dry_run(self.simulation.consumer_chain_id)),
        };

        Ok(RequestVerifier::new(
            ledger,
            CliChainRuntimeBuilder::new(self.runtime.into()),
            JsonGentxParser,
            Bech32AddressCodec,
            HttpHealthChecker::new()?,
            config,
            cancellation,
        ))
    }
}

impl From<RuntimeOptions> for CliChainRuntimeConfig {
    fn from(value: RuntimeOptions) -> Self {
        Self {
            binary: value.binary,
            moniker: value.moniker,
            address_prefix: value.address_prefix,
            genesis_subcommand: !value.legacy_genesis_commands,
            reset_subcommand: value.reset_subcommand,
            verdicts: StartVerdicts::cosmos_sdk(),
        }
    }
}

/// Cancels `cancellation` on Ctrl-C or SIGTERM.
pub fn cancel_on_signal(cancellation: CancellationToken) -> Result<()> {
    let mut sigterm_handle =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm_handle.recv() => {},
            _ = tokio::signal::ctrl_c() => {},
            _ = cancellation.cancelled() => return,
        }

        info!("Interrupted, stopping");
        cancellation.cancel();
    });

    Ok(())
}
