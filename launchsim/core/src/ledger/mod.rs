use std::future::Future;

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod in_memory;
pub use in_memory::{InMemoryLedger, LaunchSnapshot, LedgerSnapshot};

use crate::{genesis_information::GenesisInformation, request::Request};

/// Read access to the coordination ledger, the source of truth for launches and their requests.
pub trait Ledger {
    fn chain_launch(&self, launch_id: u64) -> impl Future<Output = Result<ChainLaunch>> + Send;

    /// Genesis information built from the requests already approved for the launch.
    fn genesis_information(
        &self,
        launch_id: u64,
    ) -> impl Future<Output = Result<GenesisInformation>> + Send;

    /// Requests of the launch, in the order of `request_ids`.
    fn requests(
        &self,
        launch_id: u64,
        request_ids: &[u64],
    ) -> impl Future<Output = Result<Vec<Request>>> + Send;
}

/// Launch metadata written into the genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLaunch {
    pub launch_id: u64,
    pub chain_id: String,
    /// Genesis time as a Unix timestamp in seconds.
    pub launch_time: i64,
}
