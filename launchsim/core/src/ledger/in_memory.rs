use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    genesis_information::GenesisInformation,
    ledger::{ChainLaunch, Ledger},
    request::Request,
};

/// An entirely in-memory ledger useful for development and testing purposes.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLedger {
    launches: HashMap<u64, LaunchSnapshot>,
}

/// Serializable content of an [`InMemoryLedger`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub launches: Vec<LaunchSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSnapshot {
    pub launch: ChainLaunch,
    #[serde(default)]
    pub genesis: GenesisInformation,
    #[serde(default)]
    pub requests: Vec<Request>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a JSON encoded [`LedgerSnapshot`].
    pub fn from_snapshot_file<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let contents = std::fs::read(path)
            .with_context(|| format!("failed to read ledger snapshot {}", path.display()))?;
        let snapshot: LedgerSnapshot = serde_json::from_slice(&contents)
            .with_context(|| format!("invalid ledger snapshot {}", path.display()))?;

        Ok(snapshot.into())
    }

    pub fn insert_launch(&mut self, launch: LaunchSnapshot) {
        self.launches.insert(launch.launch.launch_id, launch);
    }

    fn launch(&self, launch_id: u64) -> Result<&LaunchSnapshot> {
        self.launches
            .get(&launch_id)
            .ok_or_else(|| anyhow::anyhow!("launch {} not found", launch_id))
    }
}

impl From<LedgerSnapshot> for InMemoryLedger {
    fn from(value: LedgerSnapshot) -> Self {
        let mut ledger = Self::new();
        for launch in value.launches {
            ledger.insert_launch(launch);
        }
        ledger
    }
}

impl Ledger for InMemoryLedger {
    async fn chain_launch(&self, launch_id: u64) -> Result<ChainLaunch> {
        Ok(self.launch(launch_id)?.launch.clone())
    }

    async fn genesis_information(&self, launch_id: u64) -> Result<GenesisInformation> {
        Ok(self.launch(launch_id)?.genesis.clone())
    }

    async fn requests(&self, launch_id: u64, request_ids: &[u64]) -> Result<Vec<Request>> {
        let launch = self.launch(launch_id)?;

        request_ids
            .iter()
            .map(|request_id| {
                launch
                    .requests
                    .iter()
                    .find(|request| request.request_id == *request_id)
                    .cloned()
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "request {} not found for launch {}",
                            request_id,
                            launch_id
                        )
                    })
            })
            .collect()
    }
}
