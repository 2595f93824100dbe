//! Portal broker HTTP service.
//!
//! Usage: `portal-broker [config.toml]`; the path may also come from `PORTAL_CONFIG`.

// std
use std::{env, path::PathBuf, sync::Arc};
// crates.io
use color_eyre::{Result, eyre::eyre};
// self
use portal_broker::{
	config::PortalConfig,
	controller::{ControllerBroker, ControllerStrategy},
	ledger::CreditLedger,
	membership::{MembershipDirectory, MemoryDirectory},
	obs,
	orchestrator::Orchestrator,
	server,
	store::{FileStore, KvStore, MemoryStore},
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;
	obs::init_subscriber().map_err(|e| eyre!(e))?;

	let path = env::args_os().nth(1).or_else(|| env::var_os("PORTAL_CONFIG")).map(PathBuf::from);
	let config = PortalConfig::load(path.as_deref())?;
	let store: Arc<dyn KvStore> = match &config.store.path {
		Some(path) => Arc::new(FileStore::open(path)?),
		None => Arc::new(MemoryStore::default()),
	};
	let directory: Arc<dyn MembershipDirectory> = match &config.store.members_path {
		Some(path) => Arc::new(MemoryDirectory::from_json_file(path)?),
		None => Arc::new(MemoryDirectory::default()),
	};
	let strategy: Arc<dyn ControllerStrategy> = Arc::new(config.controller_strategy());
	let broker = ControllerBroker::new(
		store.clone(),
		config.controller_descriptor()?,
		strategy,
		config.controller_timeout(),
	)?
	.with_retry_policy(config.retry_policy());
	let orchestrator = Orchestrator::new(
		directory,
		config.entitlement_rules(),
		config.access_policy()?,
		CreditLedger::new(store, config.ledger_settings()?),
		broker,
	);

	server::serve(config.server.bind, Arc::new(orchestrator)).await?;

	Ok(())
}
