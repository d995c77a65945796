//! Dependency-ordered reads: identity, then profile, then scope, then the
//! collections that scope allows.

use crate::error::AppError;
use crate::profile::{self, Actor, AdminPolicy};
use crate::scope::Scope;
use crate::sql::Db;
use crate::types::{Pharmacy, Profile, Shift, Uid};

#[derive(Debug, Clone)]
pub struct Dashboard {
	pub actor: Actor,
	pub pharmacies: Vec<Pharmacy>,
	pub shifts: Vec<Shift>,
	pub profiles: Vec<Profile>,
}

impl Dashboard {
	pub async fn load(db: &Db, policy: &AdminPolicy, uid: Uid) -> Result<Self, AppError> {
		let actor = profile::resolve(db, policy, uid).await?;
		let scope = Scope::of(&actor);
		let pharmacies = scope.pharmacies(db).await?;
		let shifts = scope.shifts(db).await?;
		let profiles = scope.profiles(db).await?;
		Ok(Dashboard { actor, pharmacies, shifts, profiles })
	}

	pub fn profile_name(&self, uid: Uid) -> Option<&str> {
		self.profiles.iter().find(|p| p.account_id == uid).map(|p| p.name.as_str())
	}

	/// Shifts the actor holds, soonest first.
	pub fn bookings(&self) -> impl Iterator<Item = &Shift> {
		let uid = self.actor.uid();
		self.shifts.iter().filter(move |s| s.status.is_held_by(uid))
	}
}

/// Read-only calendar of one owner, for visitors without an account.
#[derive(Debug, Clone)]
pub struct PublicCalendar {
	pub owner: Option<Profile>,
	pub pharmacies: Vec<Pharmacy>,
	pub shifts: Vec<Shift>,
}

impl PublicCalendar {
	pub async fn load(db: &Db, owner: Uid) -> Result<Self, sqlx::Error> {
		let scope = Scope::public(owner);
		let owner = scope.profiles(db).await?.into_iter().next();
		let pharmacies = scope.pharmacies(db).await?;
		let shifts = scope.shifts(db).await?;
		Ok(PublicCalendar { owner, pharmacies, shifts })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gateway::{self, NewPharmacy, NewShift};
	use crate::testing;
	use crate::types::{Role, ShiftRole};
	use chrono::{NaiveDate, NaiveTime};

	#[tokio::test]
	async fn pipeline_follows_role() {
		let db = testing::db().await;
		let p = testing::actor(&db, "p@pharma.test", Role::Pharmacy).await;
		let u = testing::actor(&db, "u@pharma.test", Role::Substitute).await;
		testing::actor(&db, "a@pharma.test", Role::Admin).await;

		let pid = gateway::create_pharmacy(
			&db,
			&p,
			NewPharmacy { name: "City Central".into(), address: "123 Main St, Downtown".into(), email: None },
		)
		.await
		.unwrap();
		let sid = gateway::create_shift(
			&db,
			&p,
			NewShift {
				pharmacy_id: pid,
				date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
				start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
				end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
				pay_rate: 55,
				role: ShiftRole::Pharmacist,
			},
		)
		.await
		.unwrap();
		gateway::book_shift(&db, &u, sid).await.unwrap();

		let policy = AdminPolicy::default();
		let sub = Dashboard::load(&db, &policy, u.uid()).await.unwrap();
		assert_eq!(sub.bookings().count(), 1);
		assert_eq!(sub.profiles.len(), 1);

		let pharmacy = Dashboard::load(&db, &policy, p.uid()).await.unwrap();
		assert_eq!(pharmacy.pharmacies.len(), 1);
		assert_eq!(pharmacy.bookings().count(), 0);

		let admin_uid = sqlx::query_scalar::<_, i64>("SELECT id FROM accounts WHERE email = 'a@pharma.test';")
			.fetch_one(&db)
			.await
			.unwrap();
		let admin = Dashboard::load(&db, &policy, admin_uid).await.unwrap();
		assert_eq!(admin.profiles.len(), 3);
		assert_eq!(admin.profile_name(u.uid()), Some(u.name()));
	}

	#[tokio::test]
	async fn missing_account_fails_to_load() {
		let db = testing::db().await;
		let err = Dashboard::load(&db, &AdminPolicy::default(), 41).await.unwrap_err();
		assert!(matches!(err, AppError::Resolve(_)));
	}

	#[tokio::test]
	async fn public_calendar_of_unknown_owner_is_empty() {
		let db = testing::db().await;
		let cal = PublicCalendar::load(&db, 77).await.unwrap();
		assert!(cal.owner.is_none());
		assert!(cal.shifts.is_empty());
	}
}
