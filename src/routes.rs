use crate::auth::{self, AuthError, SESSION_COOKIE};
use crate::dashboard::{Dashboard, PublicCalendar};
use crate::error::AppError;
use crate::gateway::{self, NewPharmacy, NewShift};
use crate::pages;
use crate::profile::{self, Actor};
use crate::types::{
	DayParam, FormLogin, FormRegister, NewPharmacyForm, NewShiftForm, Pid, ProfileForm, ReturnTo, Sid, Uid,
};
use crate::AppState;
use axum::{
	extract::{FromRequestParts, Path, Query, State},
	http::request::Parts,
	response::{IntoResponse, Redirect, Response},
	routing::{get, post},
	Form, Router,
};
use chrono::NaiveDate;
use maud::Markup;
use tower_cookies::{cookie::SameSite, Cookie, Cookies};
use tracing::warn;

pub fn router() -> Router<AppState> {
	Router::new()
		.route("/", get(display_dashboard))
		.route("/login", get(display_login).post(perform_login))
		.route("/register", post(perform_register))
		.route("/logout", post(perform_logout))
		.route("/profile", post(save_own_profile))
		.route("/pharmacies", post(create_pharmacy))
		.route("/pharmacies/:id/delete", post(delete_pharmacy))
		.route("/shifts", post(create_shift))
		.route("/shifts/:id/book", post(book_shift))
		.route("/shifts/:id/cancel", post(cancel_booking))
		.route("/admin", get(display_admin))
		.route("/admin/profiles/:id", post(save_any_profile))
		.route("/public/:id", get(display_public))
}

/// Identity behind the session cookie. Requests without a live session
/// are sent to the login page.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uid);

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
	type Rejection = AppError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
		let cookies = Cookies::from_request_parts(parts, state)
			.await
			.map_err(|_| AppError::Unauthenticated)?;
		let token = cookies
			.get(SESSION_COOKIE)
			.map(|c| c.value().to_string())
			.ok_or(AppError::Unauthenticated)?;
		let uid = auth::session_identity(&state.db, &token)
			.await?
			.ok_or(AppError::Unauthenticated)?;
		Ok(CurrentUser(uid))
	}
}

async fn actor(state: &AppState, uid: Uid) -> Result<Actor, AppError> {
	Ok(profile::resolve(&state.db, &state.config.admin, uid).await?)
}

fn today() -> NaiveDate {
	chrono::Local::now().date_naive()
}

/// Redirect target from a form's hidden `back` field. Only local paths
/// are followed.
fn back_to(ret: &ReturnTo, fallback: &str) -> Redirect {
	match ret.back.as_deref() {
		Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.starts_with("/\\") => {
			Redirect::to(path)
		}
		_ => Redirect::to(fallback),
	}
}

async fn start_session(state: &AppState, cookies: &Cookies, uid: Uid) -> Result<(), AppError> {
	let token = auth::open_session(&state.db, uid, state.config.session_ttl).await?;
	let cookie = Cookie::build((SESSION_COOKIE, token))
		.path("/")
		.http_only(true)
		.same_site(SameSite::Lax);
	cookies.add(cookie.into());
	Ok(())
}

fn login_failure(err: AuthError) -> Response {
	let err = AppError::from(err);
	(err.status(), pages::login_page(Some(&err.public_message()))).into_response()
}

async fn display_login() -> Markup {
	pages::login_page(None)
}

async fn perform_login(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(login): Form<FormLogin>,
) -> Result<Response, AppError> {
	match auth::login(&state.db, &login).await {
		Ok(uid) => {
			start_session(&state, &cookies, uid).await?;
			Ok(Redirect::to("/").into_response())
		}
		Err(AuthError::InvalidCredentials) => {
			warn!("failed sign in");
			Ok(login_failure(AuthError::InvalidCredentials))
		}
		Err(err) => Err(err.into()),
	}
}

async fn perform_register(
	State(state): State<AppState>,
	cookies: Cookies,
	Form(register): Form<FormRegister>,
) -> Result<Response, AppError> {
	match auth::register(&state.db, &state.config.admin, register).await {
		Ok(uid) => {
			start_session(&state, &cookies, uid).await?;
			Ok(Redirect::to("/").into_response())
		}
		Err(err @ (AuthError::Invalid(_) | AuthError::EmailTaken(_))) => Ok(login_failure(err)),
		Err(err) => Err(err.into()),
	}
}

async fn perform_logout(State(state): State<AppState>, cookies: Cookies) -> Result<Redirect, AppError> {
	if let Some(cookie) = cookies.get(SESSION_COOKIE) {
		auth::close_session(&state.db, cookie.value()).await?;
	}
	cookies.remove(Cookie::build(SESSION_COOKIE).path("/").into());
	Ok(Redirect::to("/login"))
}

async fn display_dashboard(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Query(day): Query<DayParam>,
) -> Result<Markup, AppError> {
	let dash = Dashboard::load(&state.db, &state.config.admin, uid).await?;
	Ok(pages::dashboard_page(&dash, day.day.unwrap_or_else(today)))
}

async fn save_own_profile(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	gateway::save_profile(&state.db, &actor, uid, form).await?;
	Ok(Redirect::to("/"))
}

async fn create_pharmacy(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Form(form): Form<NewPharmacyForm>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	let new = NewPharmacy::try_from(form)?;
	gateway::create_pharmacy(&state.db, &actor, new).await?;
	Ok(Redirect::to("/"))
}

async fn delete_pharmacy(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Path(pid): Path<Pid>,
	Form(ret): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	gateway::delete_pharmacy(&state.db, &actor, pid, state.config.pharmacy_deletion).await?;
	Ok(back_to(&ret, "/"))
}

async fn create_shift(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Form(form): Form<NewShiftForm>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	let new = NewShift::try_from(form)?;
	let day = new.date;
	gateway::create_shift(&state.db, &actor, new).await?;
	Ok(Redirect::to(&format!("/?day={day}")))
}

async fn book_shift(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Path(sid): Path<Sid>,
	Form(ret): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	gateway::book_shift(&state.db, &actor, sid).await?;
	Ok(back_to(&ret, "/"))
}

async fn cancel_booking(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Path(sid): Path<Sid>,
	Form(ret): Form<ReturnTo>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	gateway::cancel_booking(&state.db, &actor, sid).await?;
	Ok(back_to(&ret, "/"))
}

async fn display_admin(State(state): State<AppState>, CurrentUser(uid): CurrentUser) -> Result<Markup, AppError> {
	let dash = Dashboard::load(&state.db, &state.config.admin, uid).await?;
	if !dash.actor.admin {
		warn!(uid, "admin page refused");
		return Err(AppError::AdminOnly);
	}
	Ok(pages::admin_page(&dash))
}

async fn save_any_profile(
	State(state): State<AppState>,
	CurrentUser(uid): CurrentUser,
	Path(target): Path<Uid>,
	Form(form): Form<ProfileForm>,
) -> Result<Redirect, AppError> {
	let actor = actor(&state, uid).await?;
	if !actor.admin {
		warn!(uid, target, "profile edit refused");
		return Err(AppError::AdminRequired("edit profiles from the admin page"));
	}
	gateway::save_profile(&state.db, &actor, target, form).await?;
	Ok(Redirect::to("/admin"))
}

async fn display_public(
	State(state): State<AppState>,
	Path(owner): Path<Uid>,
	Query(day): Query<DayParam>,
) -> Result<Markup, AppError> {
	let cal = PublicCalendar::load(&state.db, owner).await?;
	Ok(pages::public_page(&cal, owner, day.day.unwrap_or_else(today)))
}
