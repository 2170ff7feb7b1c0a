use std::{future::Future, time::Duration};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::{
    config::TomlFile,
    errors::Error,
    runtime::{ChainCommands, ChainRuntime, NodeExitError, StartVerdict},
    utils::{find_available_ports, poll_until},
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Ports needed by a node: API, gRPC, RPC, P2P and pprof, in that order.
const NODE_PORT_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Maximum time for the node to become healthy.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
    #[serde(with = "duration_secs")]
    pub poll_interval: Duration,
    /// Denomination of the zero minimum gas price set in the app config.
    pub minimum_gas_denom: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            minimum_gas_denom: "stake".to_owned(),
        }
    }
}

/// Probes whether a started node serves requests.
pub trait HealthChecker: Send + Sync {
    /// Whether the node whose RPC listens on `rpc_address` (`host:port`) reports healthy.
    fn check(&self, rpc_address: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// [`HealthChecker`] querying the `/health` endpoint of the node RPC.
#[derive(Debug, Clone)]
pub struct HttpHealthChecker {
    client: reqwest::Client,
}

impl HttpHealthChecker {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HEALTH_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl HealthChecker for HttpHealthChecker {
    async fn check(&self, rpc_address: &str) -> Result<bool> {
        let url = Url::parse(&format!("http://{rpc_address}"))?.join("health")?;
        let response = self.client.get(url).send().await?;
        Ok(response.status().is_success())
    }
}

/// Local ports assigned to a simulated node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NodePorts {
    api: u16,
    grpc: u16,
    rpc: u16,
    p2p: u16,
    pprof: u16,
}

impl NodePorts {
    fn allocate() -> Result<Self> {
        let [api, grpc, rpc, p2p, pprof]: [u16; NODE_PORT_COUNT] =
            find_available_ports(NODE_PORT_COUNT)?
                .try_into()
                .map_err(|ports: Vec<u16>| {
                    anyhow::anyhow!("expected {} ports, got {}", NODE_PORT_COUNT, ports.len())
                })?;

        Ok(Self {
            api,
            grpc,
            rpc,
            p2p,
            pprof,
        })
    }
}

/// Starts a prepared chain to prove that its genesis boots.
#[derive(Debug)]
pub struct LaunchSimulator<'a, R, H> {
    runtime: &'a R,
    health: &'a H,
    config: &'a SimulationConfig,
}

impl<'a, R, H> LaunchSimulator<'a, R, H>
where
    R: ChainRuntime,
    H: HealthChecker,
{
    pub fn new(runtime: &'a R, health: &'a H, config: &'a SimulationConfig) -> Self {
        Self {
            runtime,
            health,
            config,
        }
    }

    /// Runs the node until it either reports healthy or stops, then shuts it down.
    ///
    /// A node stopping on a known benign failure (no validator in the genesis) still counts as
    /// a successful simulation.
    pub async fn simulate(&self, cancellation: &CancellationToken) -> Result<(), Error> {
        let ports = NodePorts::allocate()
            .context("failed to find available ports")
            .map_err(Error::Simulation)?;
        self.configure(&ports)
            .await
            .context("failed to configure the node")
            .map_err(Error::Simulation)?;

        let commands = self.runtime.commands().await.map_err(Error::Simulation)?;
        let rpc_address = format!("127.0.0.1:{}", ports.rpc);

        // The node is stopped as soon as this function returns.
        let node_cancellation = cancellation.child_token();
        let _guard = node_cancellation.clone().drop_guard();

        info!("Starting the chain, RPC at {}", rpc_address);
        let outcome = tokio::select! {
            result = commands.start(node_cancellation.clone()) => {
                self.start_outcome(result, cancellation)
            }
            healthy = poll_until(
                || self.health.check(&rpc_address),
                "node health",
                self.config.poll_interval,
                &node_cancellation,
            ) => {
                if healthy {
                    info!("Chain is healthy");
                    Ok(())
                } else {
                    Err(Error::Cancelled)
                }
            }
            _ = tokio::time::sleep(self.config.timeout) => Err(Error::Timeout(self.config.timeout)),
        };

        debug!("Stopping the chain");
        node_cancellation.cancel();
        outcome
    }

    fn start_outcome(
        &self,
        result: Result<()>,
        cancellation: &CancellationToken,
    ) -> Result<(), Error> {
        if cancellation.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match result {
            Ok(()) => {
                info!("Chain exited cleanly");
                Ok(())
            }
            Err(err) => {
                let message = format!("{err:#}");
                // The benign messages may sit above a long trace, so match the whole output.
                let output = err
                    .downcast_ref::<NodeExitError>()
                    .map_or(message.as_str(), |exit| exit.output.as_str());
                match self.runtime.start_verdicts().classify(output) {
                    StartVerdict::Benign => {
                        warn!("Chain stopped on a benign failure: {}", message);
                        Ok(())
                    }
                    StartVerdict::Fatal => Err(Error::Simulation(err)),
                }
            }
        }
    }

    /// Points every listener of the node to its own port and relaxes settings slowing down
    /// startup.
    async fn configure(&self, ports: &NodePorts) -> Result<()> {
        let paths = self.runtime.paths();

        let mut app = TomlFile::load(&paths.app_config).await?;
        app.set("api.enable", true)?;
        app.set("api.enabled-unsafe-cors", true)?;
        app.set("api.address", format!("tcp://0.0.0.0:{}", ports.api))?;
        app.set("grpc.address", format!("0.0.0.0:{}", ports.grpc))?;
        app.set("rpc.cors_allowed_origins", vec!["*"])?;
        app.set(
            "minimum-gas-prices",
            format!("0{}", self.config.minimum_gas_denom),
        )?;
        app.save().await?;

        let mut node = TomlFile::load(&paths.node_config).await?;
        node.set("rpc.cors_allowed_origins", vec!["*"])?;
        node.set("consensus.timeout_commit", "1s")?;
        node.set("consensus.timeout_propose", "1s")?;
        node.set("rpc.laddr", format!("tcp://0.0.0.0:{}", ports.rpc))?;
        node.set("p2p.laddr", format!("tcp://0.0.0.0:{}", ports.p2p))?;
        node.set("rpc.pprof_laddr", format!("0.0.0.0:{}", ports.pprof))?;
        node.save().await?;

        debug!("Node configured with ports {:?}", ports);
        Ok(())
    }
}

/// (De)serializes a [`Duration`] as whole seconds.
mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
