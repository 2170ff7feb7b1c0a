use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

pub const FIELD_CHAIN_ID: &str = "chain_id";
pub const FIELD_GENESIS_TIME: &str = "genesis_time";
pub const FIELD_CONSUMER_CHAIN_ID: &str = "app_state.monitoringp.params.consumerChainID";
pub const FIELD_LAST_BLOCK_HEIGHT: &str = "app_state.monitoringp.params.lastBlockHeight";
pub const FIELD_CONSUMER_UNBONDING_PERIOD: &str =
    "app_state.monitoringp.params.consumerUnbondingPeriod";
pub const FIELD_CONSUMER_REVISION_HEIGHT: &str =
    "app_state.monitoringp.params.consumerRevisionHeight";
pub const FIELD_CONSENSUS_TIMESTAMP: &str =
    "app_state.monitoringp.params.consumerConsensusState.timestamp";
pub const FIELD_CONSENSUS_NEXT_VALIDATORS_HASH: &str =
    "app_state.monitoringp.params.consumerConsensusState.nextValidatorsHash";
pub const FIELD_CONSENSUS_ROOT_HASH: &str =
    "app_state.monitoringp.params.consumerConsensusState.root.hash";

/// Path of a module parameter inside the genesis.
pub fn module_param_field(module: &str, param: &str) -> String {
    format!("app_state.{module}.params.{param}")
}

/// A genesis file loaded in memory for key path updates.
#[derive(Debug, Clone)]
pub struct GenesisFile {
    path: PathBuf,
    document: Value,
}

impl GenesisFile {
    pub async fn load<P>(path: P) -> Result<Self>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        let contents = tokio::fs::read(&path)
            .await
            .with_context(|| format!("genesis {} can't be read", path.display()))?;
        let document = serde_json::from_slice(&contents)
            .with_context(|| format!("genesis {} can't be parsed", path.display()))?;

        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key_path: &str) -> Option<&Value> {
        key_path
            .split('.')
            .try_fold(&self.document, |value, key| value.get(key))
    }

    /// Sets the value at a dot separated key path, creating missing objects along the way.
    pub fn set<V>(&mut self, key_path: &str, value: V) -> Result<()>
    where
        V: Into<Value>,
    {
        let mut current = &mut self.document;
        let mut keys = key_path.split('.').peekable();

        while let Some(key) = keys.next() {
            let Some(object) = current.as_object_mut() else {
                anyhow::bail!("cannot set {}: parent of {} is not an object", key_path, key);
            };

            if keys.peek().is_none() {
                object.insert(key.to_owned(), value.into());
                return Ok(());
            }

            current = object
                .entry(key.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
        }

        anyhow::bail!("empty genesis key path")
    }

    /// Sets the value at `key_path` from raw JSON bytes.
    pub fn set_raw(&mut self, key_path: &str, raw: &[u8]) -> Result<()> {
        let value: Value = serde_json::from_slice(raw)
            .with_context(|| format!("value for {} is not valid JSON", key_path))?;
        self.set(key_path, value)
    }

    pub async fn save(&self) -> Result<()> {
        let contents = serde_json::to_vec_pretty(&self.document)?;
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("genesis {} can't be written", self.path.display()))
    }
}
