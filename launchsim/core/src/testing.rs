use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::Result;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::{
    ledger::ChainLaunch,
    runtime::{ChainCommands, ChainPaths, ChainRuntime, ChainRuntimeBuilder, StartVerdicts},
};

const DEFAULT_GENESIS: &str = r#"{"chain_id":"","genesis_time":"","app_state":{"staking":{"params":{"max_validators":100}}}}"#;
const DEFAULT_APP_CONFIG: &str = "minimum-gas-prices = \"\"\n\n[api]\nenable = false\naddress = \"tcp://localhost:1317\"\n\n[grpc]\naddress = \"localhost:9090\"\n";
const DEFAULT_NODE_CONFIG: &str = "moniker = \"fake\"\n\n[rpc]\nladdr = \"tcp://127.0.0.1:26657\"\n\n[p2p]\nladdr = \"tcp://0.0.0.0:26656\"\npersistent_peers = \"\"\n\n[consensus]\ntimeout_commit = \"5s\"\n";

/// Node output of a chain started without validators: the panic comes first, the trace after it.
pub(crate) const EMPTY_VALIDATOR_SET_PANIC: &str = r#"echo "panic: validator set is empty after InitGenesis, please ensure at least one validator is initialized with a delegation greater than or equal to the DefaultPowerReduction" >&2
i=0
while [ $i -lt 30 ]; do
  echo "goroutine frame $i" >&2
  i=$((i + 1))
done
exit 2"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RecordedCommand {
    Init,
    Build,
    InitGenesis,
    AddGenesisAccount {
        address: String,
        coins: String,
    },
    AddVestingAccount {
        address: String,
        total_balance: String,
        vesting: String,
        end_time: i64,
    },
    CollectGentxs,
    ValidateGenesis,
    UnsafeReset,
    Start,
}

/// How the fake node behaves once started.
#[derive(Debug, Clone, Default)]
pub(crate) enum StartBehavior {
    #[default]
    RunUntilCancelled,
    Exit,
    Fail(String),
}

#[derive(Debug, Default)]
struct FakeState {
    recorded: Vec<RecordedCommand>,
    failures: Vec<RecordedCommand>,
    start: StartBehavior,
}

type SharedState = Arc<Mutex<FakeState>>;

fn record(state: &SharedState, command: RecordedCommand) -> Result<()> {
    let mut state = state.lock().unwrap();
    let fails = state.failures.contains(&command);
    state.recorded.push(command.clone());

    if fails {
        anyhow::bail!("{:?} failed", command);
    }
    Ok(())
}

/// Scripted [`ChainRuntime`] writing minimal home files instead of running a node binary.
#[derive(Debug, Clone)]
pub(crate) struct FakeRuntime {
    _scratch: Option<Arc<TempDir>>,
    paths: ChainPaths,
    verdicts: StartVerdicts,
    state: SharedState,
}

#[derive(Debug, Clone)]
pub(crate) struct FakeCommands {
    state: SharedState,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeRuntimeBuilder {
    state: SharedState,
}

impl FakeRuntime {
    /// Runtime bound to a fresh scratch home.
    pub(crate) fn new() -> Self {
        let scratch = tempfile::tempdir().unwrap();
        let paths = ChainPaths::from_home(scratch.path());
        Self {
            _scratch: Some(Arc::new(scratch)),
            paths,
            verdicts: StartVerdicts::cosmos_sdk(),
            state: SharedState::default(),
        }
    }

    pub(crate) fn fail_on(self, command: RecordedCommand) -> Self {
        self.state.lock().unwrap().failures.push(command);
        self
    }

    pub(crate) fn start_with(self, behavior: StartBehavior) -> Self {
        self.state.lock().unwrap().start = behavior;
        self
    }

    pub(crate) fn recorded(&self) -> Vec<RecordedCommand> {
        self.state.lock().unwrap().recorded.clone()
    }

    pub(crate) fn clear_recorded(&self) {
        self.state.lock().unwrap().recorded.clear();
    }

    fn write_genesis(&self) -> Result<()> {
        if let Some(parent) = self.paths.genesis.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.paths.genesis, DEFAULT_GENESIS)?;
        Ok(())
    }
}

impl FakeRuntimeBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_on(self, command: RecordedCommand) -> Self {
        self.state.lock().unwrap().failures.push(command);
        self
    }

    pub(crate) fn start_with(self, behavior: StartBehavior) -> Self {
        self.state.lock().unwrap().start = behavior;
        self
    }

    pub(crate) fn recorded(&self) -> Vec<RecordedCommand> {
        self.state.lock().unwrap().recorded.clone()
    }
}

impl ChainRuntimeBuilder for FakeRuntimeBuilder {
    type Runtime = FakeRuntime;

    fn build(&self, _launch: &ChainLaunch, home: &Path) -> Result<Self::Runtime> {
        Ok(FakeRuntime {
            _scratch: None,
            paths: ChainPaths::from_home(home),
            verdicts: StartVerdicts::cosmos_sdk(),
            state: self.state.clone(),
        })
    }
}

impl ChainRuntime for FakeRuntime {
    type Commands = FakeCommands;

    async fn init(&self) -> Result<()> {
        record(&self.state, RecordedCommand::Init)?;
        self.write_genesis()?;
        std::fs::write(&self.paths.app_config, DEFAULT_APP_CONFIG)?;
        std::fs::write(&self.paths.node_config, DEFAULT_NODE_CONFIG)?;
        Ok(())
    }

    async fn build(&self) -> Result<String> {
        record(&self.state, RecordedCommand::Build)?;
        Ok("fakechaind".to_owned())
    }

    async fn init_genesis(&self) -> Result<()> {
        record(&self.state, RecordedCommand::InitGenesis)?;
        self.write_genesis()
    }

    async fn commands(&self) -> Result<Self::Commands> {
        Ok(FakeCommands {
            state: self.state.clone(),
        })
    }

    fn address_prefix(&self) -> &str {
        "cosmos"
    }

    fn paths(&self) -> &ChainPaths {
        &self.paths
    }

    fn start_verdicts(&self) -> &StartVerdicts {
        &self.verdicts
    }
}

impl ChainCommands for FakeCommands {
    async fn add_genesis_account(&self, address: &str, coins: &str) -> Result<()> {
        record(
            &self.state,
            RecordedCommand::AddGenesisAccount {
                address: address.to_owned(),
                coins: coins.to_owned(),
            },
        )
    }

    async fn add_vesting_account(
        &self,
        address: &str,
        total_balance: &str,
        vesting: &str,
        end_time: i64,
    ) -> Result<()> {
        record(
            &self.state,
            RecordedCommand::AddVestingAccount {
                address: address.to_owned(),
                total_balance: total_balance.to_owned(),
                vesting: vesting.to_owned(),
                end_time,
            },
        )
    }

    async fn collect_gentxs(&self) -> Result<()> {
        record(&self.state, RecordedCommand::CollectGentxs)
    }

    async fn validate_genesis(&self) -> Result<()> {
        record(&self.state, RecordedCommand::ValidateGenesis)
    }

    async fn unsafe_reset(&self) -> Result<()> {
        record(&self.state, RecordedCommand::UnsafeReset)
    }

    async fn start(&self, cancellation: CancellationToken) -> Result<()> {
        record(&self.state, RecordedCommand::Start)?;
        let behavior = self.state.lock().unwrap().start.clone();

        match behavior {
            StartBehavior::RunUntilCancelled => {
                cancellation.cancelled().await;
                Ok(())
            }
            StartBehavior::Exit => Ok(()),
            StartBehavior::Fail(message) => Err(anyhow::anyhow!(message)),
        }
    }
}

/// Writes an executable `fakechaind` shell script into `dir`.
///
/// Every invocation appends its arguments to `dir/calls.log`. A leading `--home <path>` is
/// consumed into `$home` before `body` runs.
#[cfg(unix)]
pub(crate) fn node_script(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fakechaind");
    let script = format!(
        "#!/bin/sh\necho \"$*\" >> \"{}\"\nif [ \"$1\" = \"--home\" ]; then home=\"$2\"; shift 2; fi\n{}\n",
        dir.join("calls.log").display(),
        body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
