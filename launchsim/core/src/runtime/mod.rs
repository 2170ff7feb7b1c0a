use std::{
    future::Future,
    path::{Path, PathBuf},
};

use anyhow::Result;
use tokio_util::sync::CancellationToken;

mod cli;
pub use cli::{CliChainCommands, CliChainRuntime, CliChainRuntimeBuilder, CliChainRuntimeConfig};

use crate::ledger::ChainLaunch;

/// Number of trailing output lines kept in node failure messages.
const OUTPUT_TAIL_LINES: usize = 20;

/// Messages emitted by Cosmos SDK nodes when the genesis is valid but carries no validator.
pub const VALIDATOR_SET_EMPTY_MESSAGES: [&str; 2] = [
    "validator set is nil in genesis and still empty after InitChain",
    "validator set is empty after InitGenesis",
];

/// A node process that stopped with a failure status.
///
/// The whole stderr output is kept for failure classification, since the meaningful line may be
/// followed by a long stack trace. Only its tail is displayed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("node exited with {status}: {}", tail(.output))]
pub struct NodeExitError {
    pub status: String,
    pub output: String,
}

/// The node software of the chain being launched.
///
/// An instance is bound to a single home directory.
pub trait ChainRuntime: Send + Sync {
    type Commands: ChainCommands;

    /// Full initialization of the home: fresh validator key, node key and default genesis.
    fn init(&self) -> impl Future<Output = Result<()>> + Send;

    /// Makes the node binary available and returns its name.
    fn build(&self) -> impl Future<Output = Result<String>> + Send;

    /// Regenerates a default genesis, preserving the keys already present in the home.
    fn init_genesis(&self) -> impl Future<Output = Result<()>> + Send;

    fn commands(&self) -> impl Future<Output = Result<Self::Commands>> + Send;

    /// Bech32 prefix of account addresses on this chain.
    fn address_prefix(&self) -> &str;

    fn paths(&self) -> &ChainPaths;

    /// Interpretation of known start failure messages.
    fn start_verdicts(&self) -> &StartVerdicts;
}

/// Commands exposed by the node binary.
pub trait ChainCommands: Send + Sync {
    fn add_genesis_account(
        &self,
        address: &str,
        coins: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn add_vesting_account(
        &self,
        address: &str,
        total_balance: &str,
        vesting: &str,
        end_time: i64,
    ) -> impl Future<Output = Result<()>> + Send;

    fn collect_gentxs(&self) -> impl Future<Output = Result<()>> + Send;

    fn validate_genesis(&self) -> impl Future<Output = Result<()>> + Send;

    /// Resets the chain state to height zero.
    fn unsafe_reset(&self) -> impl Future<Output = Result<()>> + Send;

    /// Runs the node until it exits or `cancellation` fires. The node process must not outlive the
    /// returned future, whether it completes or is dropped.
    fn start(&self, cancellation: CancellationToken) -> impl Future<Output = Result<()>> + Send;
}

/// Builds the [`ChainRuntime`] of a launch inside a given home directory.
pub trait ChainRuntimeBuilder {
    type Runtime: ChainRuntime;

    fn build(&self, launch: &ChainLaunch, home: &Path) -> Result<Self::Runtime>;
}

/// Files of a node home touched while preparing a genesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainPaths {
    pub genesis: PathBuf,
    pub app_config: PathBuf,
    pub node_config: PathBuf,
    pub gentx_dir: PathBuf,
    pub tunneled_peers_config: PathBuf,
}

impl ChainPaths {
    /// Standard Cosmos SDK layout under `home`.
    pub fn from_home(home: &Path) -> Self {
        let config = home.join("config");
        Self {
            genesis: config.join("genesis.json"),
            app_config: config.join("app.toml"),
            node_config: config.join("config.toml"),
            gentx_dir: config.join("gentx"),
            tunneled_peers_config: home.join("tunneled-peers.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartVerdict {
    /// The failure still proves the genesis is well formed.
    Benign,
    Fatal,
}

/// Lookup table from failure message fragments to a [`StartVerdict`].
///
/// Messages not matching any entry are fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartVerdicts {
    entries: Vec<(String, StartVerdict)>,
}

impl StartVerdicts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table recognizing empty validator set failures of Cosmos SDK nodes.
    pub fn cosmos_sdk() -> Self {
        VALIDATOR_SET_EMPTY_MESSAGES
            .iter()
            .fold(Self::new(), |verdicts, message| {
                verdicts.with(*message, StartVerdict::Benign)
            })
    }

    pub fn with<S>(mut self, fragment: S, verdict: StartVerdict) -> Self
    where
        S: Into<String>,
    {
        self.entries.push((fragment.into(), verdict));
        self
    }

    /// Verdict of the first entry whose fragment appears in `message`.
    pub fn classify(&self, message: &str) -> StartVerdict {
        self.entries
            .iter()
            .find(|(fragment, _)| message.contains(fragment.as_str()))
            .map(|(_, verdict)| *verdict)
            .unwrap_or(StartVerdict::Fatal)
    }
}

/// Last lines of a process output.
pub(crate) fn tail(output: &str) -> String {
    let lines: Vec<&str> = output.trim().lines().collect();
    lines[lines.len().saturating_sub(OUTPUT_TAIL_LINES)..].join("\n")
}
