use anyhow::Context;
use pharmasub::{config::Config, sql, AppState};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// a missing .env is fine, the variables may come from the environment
	dotenvy::dotenv().ok();
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let config = Config::from_env().context("reading configuration")?;

	// set up connection pool
	let db = sql::connect(&config.database_url, config.max_connections)
		.await
		.context("can't connect to database")?;
	sql::schema(&db).await.context("can't create tables")?;

	let listener = tokio::net::TcpListener::bind(config.bind_addr)
		.await
		.with_context(|| format!("can't bind {}", config.bind_addr))?;
	info!(addr = %config.bind_addr, deletion = %config.pharmacy_deletion, "listening");

	let app = pharmasub::app(AppState { db, config: Arc::new(config) });
	axum::serve(listener, app).await.context("server stopped")?;
	Ok(())
}
