use crate::commands::Out;
use crate::{server, Config, Result};

/// Runs the dashboard web server until it is interrupted.
pub async fn serve(config: Config) -> Result<Out<()>> {
    server::serve(&config).await?;
    Ok("The dashboard server has stopped".into())
}
