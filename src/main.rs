//! `bff-relay` binary: loads `BFF_*` settings, installs tracing, and serves the `/bff` routes.

// self
use bff_relay::{
	config::BffConfig,
	error::{ConfigError, Result},
	obs, server,
};

#[tokio::main]
async fn main() -> Result<()> {
	obs::init_tracing();

	let config = BffConfig::from_env().map_err(ConfigError::from)?;

	server::serve(config).await
}
