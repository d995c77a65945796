use crate::sql::Db;
use crate::types::{Profile, Role, Uid};
use std::collections::HashSet;
use thiserror::Error;
use tracing::info;

/// Decides who is an admin. The one place that question is answered.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
	emails: HashSet<String>,
}

impl AdminPolicy {
	pub fn new<'a>(emails: impl IntoIterator<Item = &'a str>) -> Self {
		let emails = emails
			.into_iter()
			.map(normalize_email)
			.filter(|e| !e.is_empty())
			.collect();
		AdminPolicy { emails }
	}

	pub fn names_email(&self, email: &str) -> bool {
		self.emails.contains(&normalize_email(email))
	}

	pub fn is_admin(&self, profile: &Profile) -> bool {
		profile.role == Role::Admin || self.names_email(&profile.email)
	}

	/// Role a new profile starts with. Admin is never self-assigned.
	pub fn initial_role(&self, email: &str, requested: Role) -> Role {
		if self.names_email(email) {
			Role::Admin
		} else if requested == Role::Admin {
			Role::Substitute
		} else {
			requested
		}
	}
}

pub fn normalize_email(email: &str) -> String {
	email.trim().to_lowercase()
}

/// An authenticated identity with its resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
	pub profile: Profile,
	pub admin: bool,
}

impl Actor {
	pub fn uid(&self) -> Uid {
		self.profile.account_id
	}

	pub fn role(&self) -> Role {
		if self.admin {
			Role::Admin
		} else {
			self.profile.role
		}
	}

	pub fn name(&self) -> &str {
		&self.profile.name
	}
}

#[derive(Debug, Error)]
pub enum ResolveError {
	#[error("identity {0} has no account")]
	UnknownIdentity(Uid),
	#[error("database error: {0}")]
	Db(#[from] sqlx::Error),
}

pub async fn find(db: &Db, uid: Uid) -> Result<Option<Profile>, sqlx::Error> {
	sqlx::query_as::<_, Profile>("SELECT account_id, name, email, role FROM profiles WHERE account_id = ?;")
		.bind(uid)
		.fetch_optional(db)
		.await
}

/// Inserts a profile unless one exists. Returns whether a row was written.
pub async fn provision<'e, E>(db: E, uid: Uid, name: &str, email: &str, role: Role) -> Result<bool, sqlx::Error>
where
	E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
	let done = sqlx::query("INSERT OR IGNORE INTO profiles (account_id, name, email, role) VALUES (?, ?, ?, ?);")
		.bind(uid)
		.bind(name)
		.bind(email)
		.bind(role)
		.execute(db)
		.await?;
	Ok(done.rows_affected() == 1)
}

/// Maps an identity to its actor, creating a default profile when the
/// account exists but never got one.
pub async fn resolve(db: &Db, policy: &AdminPolicy, uid: Uid) -> Result<Actor, ResolveError> {
	let profile = match find(db, uid).await? {
		Some(profile) => profile,
		None => {
			let email: Option<String> = sqlx::query_scalar("SELECT email FROM accounts WHERE id = ?;")
				.bind(uid)
				.fetch_optional(db)
				.await?;
			let email = email.ok_or(ResolveError::UnknownIdentity(uid))?;
			let name = email.split('@').next().unwrap_or_default().to_string();
			let role = policy.initial_role(&email, Role::Substitute);
			if provision(db, uid, &name, &email, role).await? {
				info!(uid, %role, "provisioned missing profile");
			}
			find(db, uid).await?.ok_or(ResolveError::UnknownIdentity(uid))?
		}
	};
	let admin = policy.is_admin(&profile);
	Ok(Actor { profile, admin })
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing;

	#[test]
	fn policy_is_case_insensitive() {
		let policy = AdminPolicy::new(["Admin@Pharma.test", " ", ""]);
		assert!(policy.names_email("admin@pharma.test"));
		assert!(policy.names_email("  ADMIN@pharma.test"));
		assert!(!policy.names_email(""));
	}

	#[test]
	fn initial_role_never_self_grants_admin() {
		let policy = AdminPolicy::new(["boss@pharma.test"]);
		assert_eq!(policy.initial_role("sub@pharma.test", Role::Admin), Role::Substitute);
		assert_eq!(policy.initial_role("ph@pharma.test", Role::Pharmacy), Role::Pharmacy);
		assert_eq!(policy.initial_role("boss@pharma.test", Role::Pharmacy), Role::Admin);
	}

	#[test]
	fn role_field_or_email_makes_admin() {
		let policy = AdminPolicy::new(["boss@pharma.test"]);
		let mut profile = Profile {
			account_id: 1,
			name: "Boss".into(),
			email: "boss@pharma.test".into(),
			role: Role::Substitute,
		};
		assert!(policy.is_admin(&profile));
		profile.email = "other@pharma.test".into();
		assert!(!policy.is_admin(&profile));
		profile.role = Role::Admin;
		assert!(policy.is_admin(&profile));
	}

	#[tokio::test]
	async fn resolves_existing_profile() {
		let db = testing::db().await;
		let uid = testing::account(&db, "ph@pharma.test", Role::Pharmacy).await;
		let actor = resolve(&db, &AdminPolicy::default(), uid).await.unwrap();
		assert_eq!(actor.uid(), uid);
		assert_eq!(actor.role(), Role::Pharmacy);
		assert!(!actor.admin);
	}

	#[tokio::test]
	async fn provisions_missing_profile_as_substitute() {
		let db = testing::db().await;
		let uid = testing::bare_account(&db, "alice@pharma.test").await;
		let actor = resolve(&db, &AdminPolicy::default(), uid).await.unwrap();
		assert_eq!(actor.role(), Role::Substitute);
		assert_eq!(actor.name(), "alice");
		assert_eq!(find(&db, uid).await.unwrap(), Some(actor.profile.clone()));

		// second resolve reads the stored row
		let again = resolve(&db, &AdminPolicy::default(), uid).await.unwrap();
		assert_eq!(again, actor);
	}

	#[tokio::test]
	async fn provisions_configured_admin() {
		let db = testing::db().await;
		let uid = testing::bare_account(&db, "boss@pharma.test").await;
		let actor = resolve(&db, &AdminPolicy::new(["boss@pharma.test"]), uid).await.unwrap();
		assert!(actor.admin);
		assert_eq!(actor.profile.role, Role::Admin);
	}

	#[tokio::test]
	async fn unknown_identity_is_an_error() {
		let db = testing::db().await;
		let err = resolve(&db, &AdminPolicy::default(), 404).await.unwrap_err();
		assert!(matches!(err, ResolveError::UnknownIdentity(404)));
	}
}
