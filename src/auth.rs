use crate::config::MAX_SESSION_TTL_HOURS;
use crate::profile::{self, normalize_email, AdminPolicy};
use crate::sql::Db;
use crate::types::{Account, FormLogin, FormRegister, Uid};
use argon2::{
	password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
	Argon2, PasswordHash, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "pharmasub_session";

#[derive(Debug, Error)]
pub enum AuthError {
	#[error("invalid email or password")]
	InvalidCredentials,
	#[error("an account for {0} already exists")]
	EmailTaken(String),
	#[error("{0}")]
	Invalid(String),
	#[error("password hashing failed: {0}")]
	Hash(String),
	#[error("database error: {0}")]
	Db(#[from] sqlx::Error),
}

pub fn hash_password(pass: &str) -> Result<String, AuthError> {
	let salt = SaltString::generate(&mut OsRng);
	Argon2::default()
		.hash_password(pass.as_bytes(), &salt)
		.map(|hash| hash.to_string())
		.map_err(|e| AuthError::Hash(e.to_string()))
}

pub fn verify_password(pass: &str, hashed: &str) -> Result<bool, AuthError> {
	let parsed = PasswordHash::new(hashed).map_err(|e| AuthError::Hash(e.to_string()))?;
	match Argon2::default().verify_password(pass.as_bytes(), &parsed) {
		Ok(()) => Ok(true),
		Err(argon2::password_hash::Error::Password) => Ok(false),
		Err(e) => Err(AuthError::Hash(e.to_string())),
	}
}

fn check_registration(form: &FormRegister) -> Result<(), AuthError> {
	if form.name.trim().chars().count() < 2 {
		return Err(AuthError::Invalid("name must be at least 2 characters".into()));
	}
	let email = form.email.trim();
	match email.split_once('@') {
		Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
		_ => return Err(AuthError::Invalid(format!("{email:?} is not a valid email address"))),
	}
	if form.pass.chars().count() < 6 {
		return Err(AuthError::Invalid("password must be at least 6 characters".into()));
	}
	if form.pass != form.confirm {
		return Err(AuthError::Invalid("passwords don't match".into()));
	}
	Ok(())
}

/// Creates the account and its profile together.
pub async fn register(db: &Db, policy: &AdminPolicy, form: FormRegister) -> Result<Uid, AuthError> {
	check_registration(&form)?;
	let email = normalize_email(&form.email);
	let pass = hash_password(&form.pass)?;

	let mut tx = db.begin().await?;
	let taken: Option<Uid> = sqlx::query_scalar("SELECT id FROM accounts WHERE email = ?;")
		.bind(&email)
		.fetch_optional(&mut *tx)
		.await?;
	if taken.is_some() {
		return Err(AuthError::EmailTaken(email));
	}
	let uid = insert_account(&mut *tx, &email, &pass).await?;
	let role = policy.initial_role(&email, form.role);
	profile::provision(&mut *tx, uid, form.name.trim(), &email, role).await?;
	tx.commit().await?;

	info!(uid, %role, "account registered");
	Ok(uid)
}

/// A concurrent sign-up can pass the lookup in `register` and still lose on
/// the `UNIQUE` email column; that loss is reported as a taken email.
async fn insert_account<'e, E>(db: E, email: &str, pass: &str) -> Result<Uid, AuthError>
where
	E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
	match sqlx::query("INSERT INTO accounts (email, pass) VALUES (?, ?);")
		.bind(email)
		.bind(pass)
		.execute(db)
		.await
	{
		Ok(done) => Ok(done.last_insert_rowid()),
		Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(AuthError::EmailTaken(email.to_string())),
		Err(e) => Err(e.into()),
	}
}

pub async fn login(db: &Db, form: &FormLogin) -> Result<Uid, AuthError> {
	let account = sqlx::query_as::<_, Account>("SELECT id, email, pass FROM accounts WHERE email = ?;")
		.bind(normalize_email(&form.email))
		.fetch_optional(db)
		.await?
		.ok_or(AuthError::InvalidCredentials)?;
	if !verify_password(&form.pass, &account.pass)? {
		return Err(AuthError::InvalidCredentials);
	}
	info!(uid = account.id, "signed in");
	Ok(account.id)
}

/// Opens a session and sweeps out every expired one.
pub async fn open_session(db: &Db, uid: Uid, ttl: chrono::Duration) -> Result<String, sqlx::Error> {
	let now = Utc::now();
	let swept = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?;")
		.bind(now)
		.execute(db)
		.await?
		.rows_affected();
	if swept > 0 {
		debug!(swept, "expired sessions removed");
	}

	let token = Uuid::new_v4().simple().to_string();
	let cap = chrono::Duration::hours(MAX_SESSION_TTL_HOURS);
	let expires_at = now + ttl.clamp(-cap, cap);
	sqlx::query("INSERT INTO sessions (token, account_id, expires_at) VALUES (?, ?, ?);")
		.bind(&token)
		.bind(uid)
		.bind(expires_at)
		.execute(db)
		.await?;
	Ok(token)
}

/// The identity behind a session token, if the session is live.
/// Expired sessions are removed on sight.
pub async fn session_identity(db: &Db, token: &str) -> Result<Option<Uid>, sqlx::Error> {
	let row: Option<(Uid, DateTime<Utc>)> = sqlx::query_as("SELECT account_id, expires_at FROM sessions WHERE token = ?;")
		.bind(token)
		.fetch_optional(db)
		.await?;
	match row {
		Some((uid, expires_at)) if expires_at > Utc::now() => Ok(Some(uid)),
		Some(_) => {
			close_session(db, token).await?;
			Ok(None)
		}
		None => Ok(None),
	}
}

pub async fn close_session(db: &Db, token: &str) -> Result<(), sqlx::Error> {
	sqlx::query("DELETE FROM sessions WHERE token = ?;").bind(token).execute(db).await?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::Role;

	fn form(email: &str, role: Role) -> FormRegister {
		FormRegister {
			name: "Alice Substitute".into(),
			email: email.into(),
			pass: "hunter22".into(),
			confirm: "hunter22".into(),
			role,
		}
	}

	#[test]
	fn password_round_trip() {
		let hashed = hash_password("correct horse").unwrap();
		assert!(hashed.starts_with("$argon2"));
		assert!(verify_password("correct horse", &hashed).unwrap());
		assert!(!verify_password("battery staple", &hashed).unwrap());
		assert!(matches!(verify_password("x", "not a hash"), Err(AuthError::Hash(_))));
	}

	#[test]
	fn registration_rules() {
		assert!(check_registration(&form("alice@example.com", Role::Substitute)).is_ok());
		assert!(check_registration(&form("alice", Role::Substitute)).is_err());
		assert!(check_registration(&form("@example.com", Role::Substitute)).is_err());

		let mut short = form("alice@example.com", Role::Substitute);
		short.pass = "abc".into();
		short.confirm = "abc".into();
		assert!(matches!(check_registration(&short), Err(AuthError::Invalid(_))));

		let mut mismatch = form("alice@example.com", Role::Substitute);
		mismatch.confirm = "hunter23".into();
		assert!(matches!(check_registration(&mismatch), Err(AuthError::Invalid(_))));
	}

	#[tokio::test]
	async fn register_then_login() {
		let db = crate::testing::db().await;
		let policy = AdminPolicy::default();
		let uid = register(&db, &policy, form("Alice@Example.com", Role::Pharmacy)).await.unwrap();

		let stored = profile::find(&db, uid).await.unwrap().unwrap();
		assert_eq!(stored.email, "alice@example.com");
		assert_eq!(stored.role, Role::Pharmacy);

		let ok = login(&db, &FormLogin { email: " alice@example.COM".into(), pass: "hunter22".into() }).await.unwrap();
		assert_eq!(ok, uid);
		let bad = login(&db, &FormLogin { email: "alice@example.com".into(), pass: "hunter23".into() }).await;
		assert!(matches!(bad, Err(AuthError::InvalidCredentials)));
		let nobody = login(&db, &FormLogin { email: "bob@example.com".into(), pass: "hunter22".into() }).await;
		assert!(matches!(nobody, Err(AuthError::InvalidCredentials)));
	}

	#[tokio::test]
	async fn duplicate_email_rejected() {
		let db = crate::testing::db().await;
		let policy = AdminPolicy::default();
		register(&db, &policy, form("alice@example.com", Role::Substitute)).await.unwrap();
		let err = register(&db, &policy, form("ALICE@example.com", Role::Pharmacy)).await.unwrap_err();
		assert!(matches!(err, AuthError::EmailTaken(_)));
	}

	#[tokio::test]
	async fn admin_role_only_through_policy() {
		let db = crate::testing::db().await;
		let policy = AdminPolicy::new(["boss@example.com"]);
		let sneaky = register(&db, &policy, form("sneaky@example.com", Role::Admin)).await.unwrap();
		assert_eq!(profile::find(&db, sneaky).await.unwrap().unwrap().role, Role::Substitute);
		let boss = register(&db, &policy, form("boss@example.com", Role::Substitute)).await.unwrap();
		assert_eq!(profile::find(&db, boss).await.unwrap().unwrap().role, Role::Admin);
	}

	#[tokio::test]
	async fn unique_email_loss_reads_as_taken() {
		let db = crate::testing::db().await;
		insert_account(&db, "twice@example.com", "x").await.unwrap();
		let err = insert_account(&db, "twice@example.com", "y").await.unwrap_err();
		assert!(matches!(err, AuthError::EmailTaken(ref e) if e == "twice@example.com"));
	}

	#[tokio::test]
	async fn opening_a_session_sweeps_expired_ones() {
		let db = crate::testing::db().await;
		let uid = crate::testing::account(&db, "u@pharma.test", Role::Substitute).await;
		open_session(&db, uid, chrono::Duration::seconds(-1)).await.unwrap();
		open_session(&db, uid, chrono::Duration::seconds(-1)).await.unwrap();
		let live = open_session(&db, uid, chrono::Duration::hours(1)).await.unwrap();

		let tokens: Vec<String> = sqlx::query_scalar("SELECT token FROM sessions;").fetch_all(&db).await.unwrap();
		assert_eq!(tokens, vec![live]);
	}

	#[tokio::test]
	async fn huge_ttl_is_capped() {
		let db = crate::testing::db().await;
		let uid = crate::testing::account(&db, "u@pharma.test", Role::Substitute).await;
		let token = open_session(&db, uid, chrono::Duration::weeks(52 * 1000)).await.unwrap();
		assert_eq!(session_identity(&db, &token).await.unwrap(), Some(uid));

		let expires_at: DateTime<Utc> = sqlx::query_scalar("SELECT expires_at FROM sessions WHERE token = ?;")
			.bind(&token)
			.fetch_one(&db)
			.await
			.unwrap();
		assert!(expires_at <= Utc::now() + chrono::Duration::hours(MAX_SESSION_TTL_HOURS));
	}

	#[tokio::test]
	async fn sessions_expire() {
		let db = crate::testing::db().await;
		let uid = crate::testing::account(&db, "u@pharma.test", Role::Substitute).await;

		let live = open_session(&db, uid, chrono::Duration::hours(1)).await.unwrap();
		assert_eq!(session_identity(&db, &live).await.unwrap(), Some(uid));

		let stale = open_session(&db, uid, chrono::Duration::seconds(-1)).await.unwrap();
		assert_eq!(session_identity(&db, &stale).await.unwrap(), None);
		let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE token = ?;")
			.bind(&stale)
			.fetch_one(&db)
			.await
			.unwrap();
		assert_eq!(left, 0);

		close_session(&db, &live).await.unwrap();
		assert_eq!(session_identity(&db, &live).await.unwrap(), None);
		assert_eq!(session_identity(&db, "made-up").await.unwrap(), None);
	}
}
