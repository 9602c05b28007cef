use anyhow::Result;
use socialite::cli::{actions, actions::Action, start, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    let (action, config) = start()?;

    match action {
        Action::Server { .. } => actions::server::handle(action, config).await?,
    }

    telemetry::shutdown_tracer();

    Ok(())
}
