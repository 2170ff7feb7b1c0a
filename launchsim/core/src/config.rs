use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml::{Table, Value};

/// A TOML configuration file (`app.toml`, `config.toml`) loaded in memory for key path updates.
#[derive(Debug, Clone)]
pub struct TomlFile {
    path: PathBuf,
    table: Table,
}

impl TomlFile {
    pub async fn load<P>(path: P) -> Result<Self>
    where
        P: Into<PathBuf>,
    {
        let path = path.into();
        let contents = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("config {} can't be read", path.display()))?;
        let table = contents
            .parse::<Table>()
            .with_context(|| format!("config {} can't be parsed", path.display()))?;

        Ok(Self { path, table })
    }

    pub fn get(&self, key_path: &str) -> Option<&Value> {
        let mut keys = key_path.split('.');
        let first = self.table.get(keys.next()?)?;
        keys.try_fold(first, |value, key| value.get(key))
    }

    /// Sets the value at a dot separated key path, creating missing tables along the way.
    pub fn set<V>(&mut self, key_path: &str, value: V) -> Result<()>
    where
        V: Into<Value>,
    {
        let (parents, key) = match key_path.rsplit_once('.') {
            Some((parents, key)) => (Some(parents), key),
            None => (None, key_path),
        };

        let mut table = &mut self.table;
        for parent in parents.into_iter().flat_map(|parents| parents.split('.')) {
            let entry = table
                .entry(parent.to_owned())
                .or_insert_with(|| Value::Table(Table::new()));
            table = match entry {
                Value::Table(table) => table,
                _ => anyhow::bail!("cannot set {}: {} is not a table", key_path, parent),
            };
        }

        table.insert(key.to_owned(), value.into());
        Ok(())
    }

    pub async fn save(&self) -> Result<()> {
        let contents = toml::to_string(&self.table)?;
        tokio::fs::write(&self.path, contents)
            .await
            .with_context(|| format!("config {} can't be written", self.path.display()))
    }
}

/// A peer reached through a local HTTP tunnel client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunneledPeer {
    pub name: String,
    pub address: String,
    pub node_id: String,
    pub local_port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunneledPeersConfig {
    pub tunneled_peers: Vec<TunneledPeer>,
}

impl TunneledPeersConfig {
    pub async fn load<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let contents = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&contents)?)
    }

    pub async fn save<P>(&self, path: P) -> Result<()>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_vec_pretty(self)?)
            .await
            .with_context(|| format!("tunneled peers config {} can't be written", path.display()))
    }
}
