use crate::auth::AuthError;
use crate::gateway::GatewayError;
use crate::pages;
use crate::profile::ResolveError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum AppError {
	#[error("not signed in")]
	Unauthenticated,
	#[error("admin only")]
	AdminOnly,
	#[error("only an admin may {0}")]
	AdminRequired(&'static str),
	#[error(transparent)]
	Auth(#[from] AuthError),
	#[error("could not load profile: {0}")]
	Resolve(#[from] ResolveError),
	#[error(transparent)]
	Gateway(#[from] GatewayError),
	#[error("database error: {0}")]
	Db(#[from] sqlx::Error),
}

impl AppError {
	pub fn status(&self) -> StatusCode {
		match self {
			AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
			AppError::AdminOnly | AppError::AdminRequired(_) => StatusCode::FORBIDDEN,
			AppError::Auth(AuthError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
			AppError::Auth(AuthError::EmailTaken(_)) => StatusCode::CONFLICT,
			AppError::Auth(AuthError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
			AppError::Auth(AuthError::Hash(_) | AuthError::Db(_)) => StatusCode::INTERNAL_SERVER_ERROR,
			AppError::Resolve(_) | AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
			AppError::Gateway(e) => match e {
				e if e.is_refusal() => StatusCode::FORBIDDEN,
				GatewayError::PharmacyNotFound(_) | GatewayError::ShiftNotFound(_) | GatewayError::ProfileNotFound(_) => {
					StatusCode::NOT_FOUND
				}
				GatewayError::AlreadyBooked(_) | GatewayError::NotBooked(_) => StatusCode::CONFLICT,
				GatewayError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
				_ => StatusCode::INTERNAL_SERVER_ERROR,
			},
		}
	}

	/// Text shown to the user. Storage details stay in the log.
	pub fn public_message(&self) -> String {
		match self {
			AppError::Resolve(_) => "Could not load profile.".into(),
			AppError::Db(_)
			| AppError::Auth(AuthError::Db(_) | AuthError::Hash(_))
			| AppError::Gateway(GatewayError::Db(_)) => "Something went wrong. Please try again later.".into(),
			other => other.to_string(),
		}
	}
}

impl IntoResponse for AppError {
	fn into_response(self) -> Response {
		match self {
			AppError::Unauthenticated => return Redirect::to("/login").into_response(),
			AppError::AdminOnly => return Redirect::to("/").into_response(),
			_ => {}
		}
		let status = self.status();
		if status.is_server_error() {
			error!("{self}");
		}
		(status, pages::error_page(status, &self.public_message())).into_response()
	}
}
