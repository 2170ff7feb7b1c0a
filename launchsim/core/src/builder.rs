use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat};
use log::{debug, info};

use crate::{
    address::AddressCodec,
    config::{TomlFile, TunneledPeer, TunneledPeersConfig},
    errors::Error,
    genesis::{self, GenesisFile},
    genesis_information::{
        GenesisAccount, GenesisInformation, GenesisValidator, ParamChange, VestingAccount,
    },
    peer::PeerConnection,
    runtime::{ChainCommands, ChainRuntime},
};

/// First local port handed out to tunneled peers.
const TUNNEL_BASE_PORT: u16 = 22000;

/// Reward relay parameters of an incentivized testnet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Incentives {
    pub consumer_chain_id: String,
    /// Reward related fields are only written when this is positive.
    pub last_block_height: i64,
    pub consumer_unbonding_period: i64,
    pub revision_height: u64,
    pub consensus_state: ConsensusState,
}

impl Incentives {
    /// Incentives of a launch simulated before any block of the consumer chain exists.
    pub fn dry_run<S>(consumer_chain_id: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            consumer_chain_id: consumer_chain_id.into(),
            last_block_height: 1,
            consumer_unbonding_period: 2,
            revision_height: 1,
            consensus_state: ConsensusState::default(),
        }
    }
}

/// Consensus state of the ledger the rewards are relayed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusState {
    pub timestamp: String,
    pub next_validators_hash: String,
    pub root_hash: String,
}

/// Turns a [`GenesisInformation`] into a genesis file and node configuration, using the chain's own
/// commands wherever possible.
#[derive(Debug)]
pub struct GenesisBuilder<'a, R, C> {
    runtime: &'a R,
    codec: C,
    chain_id: String,
    launch_time: i64,
}

impl<'a, R, C> GenesisBuilder<'a, R, C>
where
    R: ChainRuntime,
    C: AddressCodec,
{
    pub fn new<S>(runtime: &'a R, codec: C, chain_id: S, launch_time: i64) -> Self
    where
        S: Into<String>,
    {
        Self {
            runtime,
            codec,
            chain_id: chain_id.into(),
            launch_time,
        }
    }

    /// Prepares the chain home so that it can be started from the genesis described by `gi`.
    ///
    /// Any failure aborts the whole preparation; nothing is rolled back and the caller is expected
    /// to start over in a fresh home.
    pub async fn prepare(
        &self,
        gi: &GenesisInformation,
        incentives: Option<&Incentives>,
    ) -> Result<(), Error> {
        self.initialize().await.map_err(Error::Build)?;
        self.build_genesis(gi, incentives).await?;

        let commands = self.runtime.commands().await.map_err(Error::Build)?;
        commands
            .validate_genesis()
            .await
            .context("genesis is invalid")
            .map_err(Error::Build)?;

        // The home may have been started before.
        commands
            .unsafe_reset()
            .await
            .context("failed to reset chain state")
            .map_err(Error::Build)
    }

    /// Checks that a single param change applied to a default genesis yields a valid genesis.
    pub async fn check_param_change(
        &self,
        module: &str,
        param: &str,
        value: &[u8],
    ) -> Result<(), Error> {
        info!("Checking the param change {}.{}", module, param);
        self.runtime.init_genesis().await.map_err(Error::Build)?;

        let mut genesis = GenesisFile::load(&self.runtime.paths().genesis)
            .await
            .map_err(Error::Build)?;
        apply_param_changes(
            &mut genesis,
            &[ParamChange {
                module: module.to_owned(),
                param: param.to_owned(),
                value: value.to_vec(),
            }],
        )?;
        genesis.save().await.map_err(Error::Build)?;

        let commands = self.runtime.commands().await.map_err(Error::Build)?;
        commands
            .validate_genesis()
            .await
            .map_err(|err| Error::InvalidParamChange {
                module: module.to_owned(),
                param: param.to_owned(),
                reason: format!("{err:#}"),
            })?;

        info!("Param change verified");
        Ok(())
    }

    async fn initialize(&self) -> Result<()> {
        let genesis_path = &self.runtime.paths().genesis;

        if tokio::fs::try_exists(genesis_path).await? {
            // Keep the existing validator key, only start again from a default genesis.
            debug!("Chain home already initialized, rebuilding genesis");
            let binary = self.runtime.build().await?;
            debug!("Using node binary {}", binary);
            self.runtime.init_genesis().await
        } else {
            debug!("Initializing chain home");
            self.runtime.init().await
        }
    }

    async fn build_genesis(
        &self,
        gi: &GenesisInformation,
        incentives: Option<&Incentives>,
    ) -> Result<(), Error> {
        info!("Building the genesis");

        let prefix = self.runtime.address_prefix();
        self.apply_genesis_accounts(&gi.genesis_accounts, prefix)
            .await
            .context("error applying genesis accounts to genesis")
            .map_err(Error::Build)?;
        self.apply_vesting_accounts(&gi.vesting_accounts, prefix)
            .await
            .context("error applying vesting accounts to genesis")
            .map_err(Error::Build)?;
        self.apply_genesis_validators(&gi.genesis_validators)
            .await
            .context("error applying genesis validators to genesis")
            .map_err(Error::Build)?;

        let mut genesis = GenesisFile::load(&self.runtime.paths().genesis)
            .await
            .map_err(Error::Build)?;
        self.apply_metadata(&mut genesis, incentives)
            .context("genesis cannot be updated")
            .map_err(Error::Build)?;

        // Applied last so that they override runtime defaults.
        apply_param_changes(&mut genesis, &gi.param_changes)?;
        genesis.save().await.map_err(Error::Build)?;

        info!("Genesis built");
        Ok(())
    }

    async fn apply_genesis_accounts(
        &self,
        accounts: &[GenesisAccount],
        prefix: &str,
    ) -> Result<()> {
        let commands = self.runtime.commands().await?;

        for account in accounts {
            let address = self.codec.change_prefix(&account.address, prefix)?;
            debug!("Adding genesis account {}", address);
            commands
                .add_genesis_account(&address, &account.coins.to_string())
                .await
                .with_context(|| format!("cannot add genesis account {}", account.address))?;
        }

        Ok(())
    }

    async fn apply_vesting_accounts(
        &self,
        accounts: &[VestingAccount],
        prefix: &str,
    ) -> Result<()> {
        let commands = self.runtime.commands().await?;

        for account in accounts {
            let address = self.codec.change_prefix(&account.address, prefix)?;
            debug!("Adding vesting account {}", address);
            commands
                .add_vesting_account(
                    &address,
                    &account.total_balance.to_string(),
                    &account.vesting.to_string(),
                    account.end_time,
                )
                .await
                .with_context(|| format!("cannot add vesting account {}", account.address))?;
        }

        Ok(())
    }

    /// Gathers the validator gentxs into the genesis and registers their peers in the node config.
    async fn apply_genesis_validators(&self, validators: &[GenesisValidator]) -> Result<()> {
        let gentx_dir = &self.runtime.paths().gentx_dir;

        // Gentxs left over from a previous run must never be collected.
        if tokio::fs::try_exists(gentx_dir).await? {
            tokio::fs::remove_dir_all(gentx_dir).await?;
        }
        tokio::fs::create_dir_all(gentx_dir).await?;

        if validators.is_empty() {
            return Ok(());
        }

        for (ind, validator) in validators.iter().enumerate() {
            let gentx_path = gentx_dir.join(format!("gentx{ind}.json"));
            tokio::fs::write(&gentx_path, &validator.gentx)
                .await
                .with_context(|| format!("cannot write gentx of {}", validator.address))?;
        }

        let commands = self.runtime.commands().await?;
        commands.collect_gentxs().await?;

        self.update_config_from_validators(validators).await
    }

    async fn update_config_from_validators(&self, validators: &[GenesisValidator]) -> Result<()> {
        let (persistent_peers, tunneled_peers) = peer_entries(validators)?;
        let paths = self.runtime.paths();

        if !persistent_peers.is_empty() {
            let mut config = TomlFile::load(&paths.node_config).await?;
            config.set("p2p.persistent_peers", persistent_peers.join(","))?;

            // Tunnel clients all connect through localhost.
            if !tunneled_peers.is_empty() {
                config.set("p2p.allow_duplicate_ip", true)?;
            }
            config.save().await?;
        }

        if !tunneled_peers.is_empty() {
            TunneledPeersConfig { tunneled_peers }
                .save(&paths.tunneled_peers_config)
                .await?;
        }

        Ok(())
    }

    fn apply_metadata(
        &self,
        genesis: &mut GenesisFile,
        incentives: Option<&Incentives>,
    ) -> Result<()> {
        let genesis_time = DateTime::from_timestamp(self.launch_time, 0)
            .ok_or_else(|| anyhow::anyhow!("invalid launch time {}", self.launch_time))?
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        genesis.set(genesis::FIELD_CHAIN_ID, self.chain_id.as_str())?;
        genesis.set(genesis::FIELD_GENESIS_TIME, genesis_time)?;

        if let Some(incentives) = incentives.filter(|incentives| incentives.last_block_height > 0) {
            genesis.set(
                genesis::FIELD_CONSUMER_CHAIN_ID,
                incentives.consumer_chain_id.as_str(),
            )?;
            genesis.set(
                genesis::FIELD_LAST_BLOCK_HEIGHT,
                incentives.last_block_height,
            )?;
            genesis.set(
                genesis::FIELD_CONSENSUS_TIMESTAMP,
                incentives.consensus_state.timestamp.as_str(),
            )?;
            genesis.set(
                genesis::FIELD_CONSENSUS_NEXT_VALIDATORS_HASH,
                incentives.consensus_state.next_validators_hash.as_str(),
            )?;
            genesis.set(
                genesis::FIELD_CONSENSUS_ROOT_HASH,
                incentives.consensus_state.root_hash.as_str(),
            )?;
            genesis.set(
                genesis::FIELD_CONSUMER_UNBONDING_PERIOD,
                incentives.consumer_unbonding_period,
            )?;
            genesis.set(
                genesis::FIELD_CONSUMER_REVISION_HEIGHT,
                incentives.revision_height,
            )?;
        }

        Ok(())
    }
}

fn apply_param_changes(genesis: &mut GenesisFile, changes: &[ParamChange]) -> Result<(), Error> {
    for change in changes {
        genesis
            .set_raw(
                &genesis::module_param_field(&change.module, &change.param),
                &change.value,
            )
            .map_err(|err| Error::InvalidParamChange {
                module: change.module.clone(),
                param: change.param.clone(),
                reason: format!("{err:#}"),
            })?;
    }

    Ok(())
}

/// Persistent peer entries of the validators, plus the tunnels needed to reach some of them.
fn peer_entries(validators: &[GenesisValidator]) -> Result<(Vec<String>, Vec<TunneledPeer>)> {
    let mut persistent_peers = Vec::with_capacity(validators.len());
    let mut tunneled_peers = Vec::new();

    for (ind, validator) in validators.iter().enumerate() {
        let peer = &validator.peer;
        if !peer.is_valid_format() {
            anyhow::bail!("invalid peer: {}", peer.id);
        }

        match &peer.connection {
            PeerConnection::TcpAddress(address) => {
                persistent_peers.push(format!("{}@{}", peer.id, address));
            }
            PeerConnection::HttpTunnel { name, address } => {
                let local_port = u16::try_from(ind)
                    .ok()
                    .and_then(|ind| TUNNEL_BASE_PORT.checked_add(ind))
                    .ok_or_else(|| anyhow::anyhow!("too many tunneled peers"))?;

                persistent_peers.push(format!("{}@127.0.0.1:{}", peer.id, local_port));
                tunneled_peers.push(TunneledPeer {
                    name: name.clone(),
                    address: address.clone(),
                    node_id: peer.id.clone(),
                    local_port,
                });
            }
        }
    }

    Ok((persistent_peers, tunneled_peers))
}
