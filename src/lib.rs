// pharmacy shift marketplace

pub mod auth;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod gateway;
pub mod pages;
pub mod profile;
pub mod routes;
pub mod scope;
pub mod sql;
pub mod types;
pub mod view;

use crate::config::Config;
use crate::sql::Db;
use axum::Router;
use std::sync::Arc;
use tower_cookies::CookieManagerLayer;
use tower_http::{services::ServeDir, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
	pub db: Db,
	pub config: Arc<Config>,
}

pub fn app(state: AppState) -> Router {
	let assets = ServeDir::new(&state.config.static_dir);
	routes::router()
		.nest_service("/static", assets)
		.layer(CookieManagerLayer::new())
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}
