use anyhow::Result;
use rigfleet::agent::{Agent, HostInfo};
use rigfleet::{config, shutdown, telemetry, version};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();

    let agent_config = config::AgentConfig::load()?;
    let host = HostInfo::detect().await?;
    tracing::info!(
        version = version::VERSION,
        hostname = %host.hostname,
        cpu = %host.cpu_model,
        cores = host.cores,
        miner_api = %agent_config.miner.api_url,
        "Host detected"
    );

    let agent = Arc::new(Agent::new(&agent_config, host)?);
    agent.run(shutdown::token_on_signal()).await;
    Ok(())
}
