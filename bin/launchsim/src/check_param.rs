use anyhow::Result;
use clap::Parser;
use log::info;
use tokio_util::sync::CancellationToken;

use crate::common::{cancel_on_signal, VerifierOptions};

#[derive(Debug, Parser)]
pub struct CheckParam {
    /// Id of the launch of the chain
    #[clap(long, env)]
    launch_id: u64,
    /// Module owning the param
    #[clap(long)]
    module: String,
    /// Name of the param
    #[clap(long)]
    param: String,
    /// New value of the param, as JSON
    #[clap(long)]
    value: String,
    #[clap(flatten)]
    options: VerifierOptions,
}

impl CheckParam {
    pub async fn run(self) -> Result<()> {
        let cancellation = CancellationToken::new();
        cancel_on_signal(cancellation.clone())?;
        let verifier = self.options.build(cancellation)?;

        verifier
            .check_param_change(
                self.launch_id,
                &self.module,
                &self.param,
                self.value.as_bytes(),
            )
            .await?;

        info!("Param {}.{} can be changed", self.module, self.param);
        Ok(())
    }
}
