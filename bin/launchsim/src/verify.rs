use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use launchsim_core::request::RequestContent;
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::common::{cancel_on_signal, VerifierOptions};

#[derive(Debug, Parser)]
pub struct Verify {
    /// Id of the launch the requests belong to
    #[clap(long, env)]
    launch_id: u64,
    /// Comma separated ids of requests submitted to the ledger, in application order
    #[clap(long, value_delimiter = ',', required_unless_present = "contents")]
    request_ids: Vec<u64>,
    /// Path to a JSON list of request contents not submitted yet
    #[clap(long, conflicts_with = "request_ids")]
    contents: Option<PathBuf>,
    #[clap(flatten)]
    options: VerifierOptions,
}

impl Verify {
    pub async fn run(self) -> Result<()> {
        let cancellation = CancellationToken::new();
        cancel_on_signal(cancellation.clone())?;
        let verifier = self.options.build(cancellation)?;

        let result = match &self.contents {
            Some(path) => {
                let contents = std::fs::read(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let contents: Vec<RequestContent> = serde_json::from_slice(&contents)
                    .with_context(|| format!("invalid request contents in {}", path.display()))?;

                for content in &contents {
                    info!("Request to {}", content.action_description());
                }
                verifier
                    .verify_request_contents(self.launch_id, contents)
                    .await
            }
            None => {
                verifier
                    .verify_requests(self.launch_id, &self.request_ids)
                    .await
            }
        };

        match result {
            Ok(report) => {
                info!(
                    "Request(s) {:?} of launch {} can be approved",
                    report.request_ids, report.launch_id
                );
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Err(err) => {
                if err.is_invalid_request() {
                    error!("Invalid request #{:?}", err.request_id());
                }
                Err(err.into())
            }
        }
    }
}
