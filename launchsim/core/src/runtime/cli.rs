use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
};

use anyhow::{Context, Result};
use log::{debug, trace};
use tokio::{io::AsyncReadExt, process::Command};
use tokio_util::sync::CancellationToken;

use crate::{
    ledger::ChainLaunch,
    runtime::{
        tail, ChainCommands, ChainPaths, ChainRuntime, ChainRuntimeBuilder, NodeExitError,
        StartVerdicts,
    },
};

#[derive(Debug, Clone)]
pub struct CliChainRuntimeConfig {
    /// Path or name of the node binary.
    pub binary: PathBuf,
    pub moniker: String,
    pub address_prefix: String,
    /// Whether genesis commands live under the `genesis` subcommand, as in SDK v0.47 and later.
    pub genesis_subcommand: bool,
    /// Subcommand hosting `unsafe-reset-all`, usually `comet` or `tendermint`.
    pub reset_subcommand: String,
    pub verdicts: StartVerdicts,
}

/// [`ChainRuntime`] driving a Cosmos SDK node binary as a subprocess.
#[derive(Debug, Clone)]
pub struct CliChainRuntime {
    config: CliChainRuntimeConfig,
    chain_id: String,
    home: PathBuf,
    paths: ChainPaths,
}

#[derive(Debug, Clone)]
pub struct CliChainRuntimeBuilder {
    config: CliChainRuntimeConfig,
}

#[derive(Debug, Clone)]
pub struct CliChainCommands {
    binary: PathBuf,
    home: PathBuf,
    genesis_subcommand: bool,
    reset_subcommand: String,
}

impl Default for CliChainRuntimeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("simd"),
            moniker: "launchsim".to_owned(),
            address_prefix: "cosmos".to_owned(),
            genesis_subcommand: true,
            reset_subcommand: "comet".to_owned(),
            verdicts: StartVerdicts::cosmos_sdk(),
        }
    }
}

impl CliChainRuntime {
    pub fn new<S, H>(config: CliChainRuntimeConfig, chain_id: S, home: H) -> Self
    where
        S: Into<String>,
        H: Into<PathBuf>,
    {
        let home = home.into();
        Self {
            config,
            chain_id: chain_id.into(),
            paths: ChainPaths::from_home(&home),
            home,
        }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    async fn init_home(&self, home: &Path) -> Result<()> {
        let mut command = Command::new(&self.config.binary);
        command
            .arg("init")
            .arg(&self.config.moniker)
            .arg("--chain-id")
            .arg(&self.chain_id)
            .arg("--home")
            .arg(home);
        run(command).await
    }
}

impl CliChainRuntimeBuilder {
    pub fn new(config: CliChainRuntimeConfig) -> Self {
        Self { config }
    }
}

impl ChainRuntimeBuilder for CliChainRuntimeBuilder {
    type Runtime = CliChainRuntime;

    fn build(&self, launch: &ChainLaunch, home: &Path) -> Result<Self::Runtime> {
        Ok(CliChainRuntime::new(
            self.config.clone(),
            launch.chain_id.clone(),
            home,
        ))
    }
}

impl ChainRuntime for CliChainRuntime {
    type Commands = CliChainCommands;

    async fn init(&self) -> Result<()> {
        debug!("Initializing chain home {}", self.home.display());
        self.init_home(&self.home).await
    }

    async fn build(&self) -> Result<String> {
        let mut command = Command::new(&self.config.binary);
        command.arg("version");
        run(command)
            .await
            .context("node binary is not available")?;

        Ok(self
            .config
            .binary
            .file_name()
            .unwrap_or(self.config.binary.as_os_str())
            .to_string_lossy()
            .into_owned())
    }

    async fn init_genesis(&self) -> Result<()> {
        // A throwaway home provides a default genesis without touching the existing keys.
        let scratch = tempfile::tempdir()?;
        self.init_home(scratch.path()).await?;

        let default_genesis = ChainPaths::from_home(scratch.path()).genesis;
        if let Some(parent) = self.paths.genesis.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(&default_genesis, &self.paths.genesis)
            .await
            .with_context(|| format!("failed to copy {}", default_genesis.display()))?;

        Ok(())
    }

    async fn commands(&self) -> Result<Self::Commands> {
        Ok(CliChainCommands {
            binary: self.config.binary.clone(),
            home: self.home.clone(),
            genesis_subcommand: self.config.genesis_subcommand,
            reset_subcommand: self.config.reset_subcommand.clone(),
        })
    }

    fn address_prefix(&self) -> &str {
        &self.config.address_prefix
    }

    fn paths(&self) -> &ChainPaths {
        &self.paths
    }

    fn start_verdicts(&self) -> &StartVerdicts {
        &self.config.verdicts
    }
}

impl CliChainCommands {
    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("--home").arg(&self.home);
        command
    }

    fn genesis_command<S>(&self, subcommand: S) -> Command
    where
        S: AsRef<OsStr>,
    {
        let mut command = self.command();
        if self.genesis_subcommand {
            command.arg("genesis");
        }
        command.arg(subcommand);
        command
    }
}

impl ChainCommands for CliChainCommands {
    async fn add_genesis_account(&self, address: &str, coins: &str) -> Result<()> {
        let mut command = self.genesis_command("add-genesis-account");
        command.arg(address).arg(coins);
        run(command).await
    }

    async fn add_vesting_account(
        &self,
        address: &str,
        total_balance: &str,
        vesting: &str,
        end_time: i64,
    ) -> Result<()> {
        let mut command = self.genesis_command("add-genesis-account");
        command
            .arg(address)
            .arg(total_balance)
            .arg("--vesting-amount")
            .arg(vesting)
            .arg("--vesting-end-time")
            .arg(end_time.to_string());
        run(command).await
    }

    async fn collect_gentxs(&self) -> Result<()> {
        run(self.genesis_command("collect-gentxs")).await
    }

    async fn validate_genesis(&self) -> Result<()> {
        let subcommand = if self.genesis_subcommand {
            "validate"
        } else {
            "validate-genesis"
        };
        run(self.genesis_command(subcommand)).await
    }

    async fn unsafe_reset(&self) -> Result<()> {
        let mut command = self.command();
        command.arg(&self.reset_subcommand).arg("unsafe-reset-all");
        run(command).await
    }

    async fn start(&self, cancellation: CancellationToken) -> Result<()> {
        let mut command = self.command();
        command
            .arg("start")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().context("failed to spawn the node")?;
        let stderr = child.stderr.take();
        let stderr_reader = tokio::spawn(async move {
            let mut output = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut output).await;
            }
            output
        });

        let status = tokio::select! {
            _ = cancellation.cancelled() => None,
            status = child.wait() => Some(status?),
        };

        let Some(status) = status else {
            debug!("Stopping node");
            child.kill().await?;
            stderr_reader.abort();
            return Ok(());
        };

        let output = stderr_reader.await.unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(NodeExitError {
                status: status.to_string(),
                output,
            }
            .into())
        }
    }
}

async fn run(mut command: Command) -> Result<()> {
    let description = format!("{:?}", command.as_std());
    trace!("Running {}", description);

    let output = command
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("failed to run {}", description))?;

    if !output.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            description,
            output.status,
            tail(&String::from_utf8_lossy(&output.stderr))
        );
    }

    Ok(())
}
