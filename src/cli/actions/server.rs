use crate::api;
use crate::cli::{actions::Action, globals::Config};
use anyhow::Result;

/// Handle the server action
pub async fn handle(action: Action, config: Config) -> Result<()> {
    match action {
        Action::Server { port } => {
            api::new(port, config).await?;
        }
    }

    Ok(())
}
