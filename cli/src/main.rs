mod config;
mod logging;

use anyhow::{bail, Result};
use clap::Parser;
use relay_core::{Endpoint, RelayClient};
use tracing::info;

use crate::config::{Cli, FileConfig, Settings};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let file = match cli.config.as_deref() {
        Some(path) => config::load_file(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(&cli, file)?;
    let _guard = logging::init_logging(settings.log_file.as_deref(), settings.json_logs)?;

    let body = config::read_body(&cli)?;
    let endpoint = Endpoint::new(&settings.host, &settings.port, settings.use_tls);
    info!(
        host = %endpoint.host,
        port = %endpoint.port,
        tls = endpoint.use_tls,
        target = %settings.target,
        "relaying {} bytes",
        body.len()
    );

    let client = RelayClient::new(endpoint, &settings.api_key).with_version(settings.http_version);
    match client.send_text(&settings.target, &body) {
        Ok(text) => {
            println!("{text}");
            Ok(())
        }
        Err(err) => bail!("relay to {}:{} failed: {err}", settings.host, settings.port),
    }
}
