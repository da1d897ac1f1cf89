use leastcount::{LeastCountError, LeastCountServerBuilder, ServerConfig, telemetry};

#[tokio::main]
async fn main() -> Result<(), LeastCountError> {
    telemetry::init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind = %config.bind_addr,
        idle_timeout = ?config.idle_timeout,
        sweep_interval = ?config.rooms.sweep.interval,
        "starting"
    );

    let server = LeastCountServerBuilder::from_config(config).build().await?;
    server.run().await
}
