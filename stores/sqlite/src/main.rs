use anyhow::Result;
use metriks_common::{ config::Config, server::{ init_tracing, run_server } };
use metriks_sqlite::SqliteStore;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	init_tracing();
	info!("Starting Metriks on SQLite");

	let config = Config::from_env()?;
	let store = SqliteStore::new(&config.database_path, config.pool_size).await?;

	if config.seed_demo_data {
		store.seed_demo_data().await?;
	}

	run_server(store, &config).await?;

	Ok(())
}
