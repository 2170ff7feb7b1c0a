use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::{
    address::AddressCodec,
    builder::{GenesisBuilder, Incentives},
    errors::Error,
    genesis_information::GenesisInformation,
    gentx::GentxParser,
    ledger::{ChainLaunch, Ledger},
    request::{Request, RequestContent, RequestValidator},
    runtime::ChainRuntimeBuilder,
    simulator::{HealthChecker, LaunchSimulator, SimulationConfig},
};

const DEFAULT_LEDGER_ADDRESS_PREFIX: &str = "spn";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Address prefix of the coordination ledger.
    pub ledger_address_prefix: String,
    pub simulation: SimulationConfig,
    /// Reward relay fields written into the genesis of incentivized testnets.
    pub incentives: Option<Incentives>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            ledger_address_prefix: DEFAULT_LEDGER_ADDRESS_PREFIX.to_owned(),
            simulation: SimulationConfig::default(),
            incentives: None,
        }
    }
}

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub launch_id: u64,
    pub chain_id: String,
    /// Ids of the verified requests, in application order.
    pub request_ids: Vec<u64>,
}

/// Checks that a batch of requests, applied on top of the current state of a launch, yields a
/// genesis the chain boots from.
///
/// Nothing is ever written to the ledger. Every verification runs in its own scratch home which
/// is removed once the verification ends.
#[derive(Debug)]
pub struct RequestVerifier<L, B, P, C, H> {
    ledger: L,
    runtime_builder: B,
    validator: RequestValidator<P, C>,
    codec: C,
    health: H,
    config: VerifierConfig,
    cancellation: CancellationToken,
}

impl<L, B, P, C, H> RequestVerifier<L, B, P, C, H>
where
    L: Ledger,
    B: ChainRuntimeBuilder,
    P: GentxParser,
    C: AddressCodec + Clone,
    H: HealthChecker,
{
    pub fn new(
        ledger: L,
        runtime_builder: B,
        parser: P,
        codec: C,
        health: H,
        config: VerifierConfig,
        cancellation: CancellationToken,
    ) -> Self {
        let validator =
            RequestValidator::new(parser, codec.clone(), config.ledger_address_prefix.clone());

        Self {
            ledger,
            runtime_builder,
            validator,
            codec,
            health,
            config,
            cancellation,
        }
    }

    /// Verifies requests already submitted to the ledger, in the order of `request_ids`.
    pub async fn verify_requests(
        &self,
        launch_id: u64,
        request_ids: &[u64],
    ) -> Result<VerificationReport, Error> {
        let requests = self
            .ledger
            .requests(launch_id, request_ids)
            .await
            .map_err(Error::Ledger)?;

        self.verify(launch_id, &requests).await
    }

    /// Verifies contents that have not been submitted yet. They are numbered from `0` in the given
    /// order, which is the id reported on failure.
    pub async fn verify_request_contents(
        &self,
        launch_id: u64,
        contents: Vec<RequestContent>,
    ) -> Result<VerificationReport, Error> {
        let requests = Request::from_contents(launch_id, contents);
        self.verify(launch_id, &requests).await
    }

    /// Checks a single param change against the default genesis of the launch's chain.
    pub async fn check_param_change(
        &self,
        launch_id: u64,
        module: &str,
        param: &str,
        value: &[u8],
    ) -> Result<(), Error> {
        let launch = self.chain_launch(launch_id).await?;
        let home = tempfile::tempdir()
            .context("failed to create the working directory")
            .map_err(Error::Build)?;
        let runtime = self
            .runtime_builder
            .build(&launch, home.path())
            .map_err(Error::Build)?;

        let builder = GenesisBuilder::new(
            &runtime,
            self.codec.clone(),
            &launch.chain_id,
            launch.launch_time,
        );
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(Error::Cancelled),
            result = builder.check_param_change(module, param, value) => result,
        }
    }

    async fn verify(
        &self,
        launch_id: u64,
        requests: &[Request],
    ) -> Result<VerificationReport, Error> {
        info!(
            "Verifying {} request(s) of launch {}",
            requests.len(),
            launch_id
        );

        let launch = self.chain_launch(launch_id).await?;
        let genesis = self
            .ledger
            .genesis_information(launch_id)
            .await
            .map_err(Error::Ledger)?;

        let genesis = self.apply_requests(genesis, requests)?;

        // Dropped on every exit path, taking the node home with it.
        let home = tempfile::tempdir()
            .context("failed to create the working directory")
            .map_err(Error::Build)?;
        debug!("Working directory {}", home.path().display());

        let runtime = self
            .runtime_builder
            .build(&launch, home.path())
            .map_err(Error::Build)?;

        let builder = GenesisBuilder::new(
            &runtime,
            self.codec.clone(),
            &launch.chain_id,
            launch.launch_time,
        );
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => return Err(Error::Cancelled),
            result = builder.prepare(&genesis, self.config.incentives.as_ref()) => result?,
        }

        LaunchSimulator::new(&runtime, &self.health, &self.config.simulation)
            .simulate(&self.cancellation)
            .await?;

        for request in requests {
            debug!(
                "Request #{} verified: {}",
                request.request_id,
                request.content.action_result_description()
            );
        }
        info!("Requests of launch {} verified", launch_id);
        Ok(VerificationReport {
            launch_id,
            chain_id: launch.chain_id,
            request_ids: requests.iter().map(|request| request.request_id).collect(),
        })
    }

    /// Validates and applies requests one at a time, stopping at the first failure.
    fn apply_requests(
        &self,
        genesis: GenesisInformation,
        requests: &[Request],
    ) -> Result<GenesisInformation, Error> {
        requests.iter().try_fold(genesis, |genesis, request| {
            debug!(
                "Applying request #{}: {}",
                request.request_id,
                request.content.action_description()
            );
            self.validator.verify_request(request)?;
            genesis.apply_request(request)
        })
    }

    async fn chain_launch(&self, launch_id: u64) -> Result<ChainLaunch, Error> {
        self.ledger
            .chain_launch(launch_id)
            .await
            .map_err(Error::Ledger)
    }
}
