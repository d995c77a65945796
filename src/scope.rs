use crate::profile::Actor;
use crate::sql::Db;
use crate::types::{Pharmacy, Profile, Role, Shift, ShiftQuery, StatusTag, Uid};
use sqlx::{QueryBuilder, Sqlite};

const PHARMACY_COLUMNS: &str = "SELECT id, owner_id, name, address, email FROM pharmacies";
const SHIFT_COLUMNS: &str =
	"SELECT id, pharmacy_id, owner_id, date, start_time, end_time, pay_rate, role, status, booked_by FROM shifts";
const PROFILE_COLUMNS: &str = "SELECT account_id, name, email, role FROM profiles";

/// The slice of the store one viewer is allowed to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
	/// A pharmacy: only what it owns.
	Owner(Uid),
	/// A substitute: every open shift plus the ones it holds.
	Substitute(Uid),
	Admin,
	/// Unauthenticated calendar of one owner's shifts.
	Public(Uid),
}

impl Scope {
	pub fn of(actor: &Actor) -> Self {
		match actor.role() {
			Role::Admin => Scope::Admin,
			Role::Pharmacy => Scope::Owner(actor.uid()),
			Role::Substitute => Scope::Substitute(actor.uid()),
		}
	}

	pub fn public(owner: Uid) -> Self {
		Scope::Public(owner)
	}

	fn pharmacies_query(&self) -> QueryBuilder<'static, Sqlite> {
		let mut qb = QueryBuilder::new(PHARMACY_COLUMNS);
		match *self {
			Scope::Owner(uid) | Scope::Public(uid) => {
				qb.push(" WHERE owner_id = ").push_bind(uid);
			}
			Scope::Substitute(_) | Scope::Admin => {}
		}
		qb.push(" ORDER BY name, id;");
		qb
	}

	fn shifts_query(&self) -> QueryBuilder<'static, Sqlite> {
		let mut qb = QueryBuilder::new(SHIFT_COLUMNS);
		match *self {
			Scope::Owner(uid) | Scope::Public(uid) => {
				qb.push(" WHERE owner_id = ").push_bind(uid);
			}
			Scope::Substitute(uid) => {
				qb.push(" WHERE status = ")
					.push_bind(StatusTag::Available)
					.push(" OR booked_by = ")
					.push_bind(uid);
			}
			Scope::Admin => {}
		}
		qb.push(" ORDER BY date, start_time, id;");
		qb
	}

	fn profiles_query(&self) -> QueryBuilder<'static, Sqlite> {
		let mut qb = QueryBuilder::new(PROFILE_COLUMNS);
		match *self {
			Scope::Admin => {}
			Scope::Owner(uid) | Scope::Substitute(uid) | Scope::Public(uid) => {
				qb.push(" WHERE account_id = ").push_bind(uid);
			}
		}
		qb.push(" ORDER BY name, account_id;");
		qb
	}

	pub async fn pharmacies(&self, db: &Db) -> Result<Vec<Pharmacy>, sqlx::Error> {
		self.pharmacies_query().build_query_as::<Pharmacy>().fetch_all(db).await
	}

	pub async fn shifts(&self, db: &Db) -> Result<Vec<Shift>, sqlx::Error> {
		self.shifts_query()
			.build_query_as::<ShiftQuery>()
			.fetch_all(db)
			.await?
			.into_iter()
			.map(Shift::from_query)
			.collect()
	}

	pub async fn profiles(&self, db: &Db) -> Result<Vec<Profile>, sqlx::Error> {
		self.profiles_query().build_query_as::<Profile>().fetch_all(db).await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::gateway::{self, NewPharmacy, NewShift};
	use crate::types::{ShiftRole, ShiftStatus};
	use chrono::{NaiveDate, NaiveTime};

	async fn post(db: &Db, owner: &Actor, days: &[u32]) -> Vec<i64> {
		let pid = gateway::create_pharmacy(
			db,
			owner,
			NewPharmacy {
				name: format!("{} Pharmacy", owner.name()),
				address: "456 Oak Ave, Anytown".into(),
				email: None,
			},
		)
		.await
		.unwrap();
		let mut ids = Vec::new();
		for day in days {
			let new = NewShift {
				pharmacy_id: pid,
				date: NaiveDate::from_ymd_opt(2024, 6, *day).unwrap(),
				start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
				end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
				pay_rate: 60,
				role: ShiftRole::Assistant,
			};
			ids.push(gateway::create_shift(db, owner, new).await.unwrap());
		}
		ids
	}

	#[test]
	fn scope_follows_role() {
		let actor = |role, admin| Actor {
			profile: Profile { account_id: 9, name: "x".into(), email: "x@x".into(), role },
			admin,
		};
		assert_eq!(Scope::of(&actor(Role::Pharmacy, false)), Scope::Owner(9));
		assert_eq!(Scope::of(&actor(Role::Substitute, false)), Scope::Substitute(9));
		assert_eq!(Scope::of(&actor(Role::Admin, true)), Scope::Admin);
		assert_eq!(Scope::of(&actor(Role::Substitute, true)), Scope::Admin);
	}

	#[test]
	fn filters_are_in_sql() {
		assert!(Scope::Owner(1).shifts_query().sql().contains("WHERE owner_id = "));
		assert!(Scope::Substitute(1).shifts_query().sql().contains("WHERE status = ? OR booked_by = ?"));
		assert!(!Scope::Admin.shifts_query().sql().contains("WHERE"));
		assert!(!Scope::Substitute(1).pharmacies_query().sql().contains("WHERE"));
	}

	#[tokio::test]
	async fn pharmacy_sees_only_own() {
		let db = crate::testing::db().await;
		let p = crate::testing::actor(&db, "p@pharma.test", Role::Pharmacy).await;
		let q = crate::testing::actor(&db, "q@pharma.test", Role::Pharmacy).await;
		post(&db, &p, &[1, 2]).await;
		post(&db, &q, &[1, 3, 4]).await;

		for who in [&p, &q] {
			let shifts = Scope::of(who).shifts(&db).await.unwrap();
			assert!(!shifts.is_empty());
			assert!(shifts.iter().all(|s| s.owner_id == who.uid()));
			let pharmacies = Scope::of(who).pharmacies(&db).await.unwrap();
			assert_eq!(pharmacies.len(), 1);
			assert_eq!(pharmacies[0].owner_id, who.uid());
		}
		assert_eq!(Scope::of(&q).shifts(&db).await.unwrap().len(), 3);
	}

	#[tokio::test]
	async fn substitute_never_sees_foreign_bookings() {
		let db = crate::testing::db().await;
		let p = crate::testing::actor(&db, "p@pharma.test", Role::Pharmacy).await;
		let u = crate::testing::actor(&db, "u@pharma.test", Role::Substitute).await;
		let v = crate::testing::actor(&db, "v@pharma.test", Role::Substitute).await;
		let ids = post(&db, &p, &[1, 2, 3, 4]).await;

		gateway::book_shift(&db, &u, ids[0]).await.unwrap();
		gateway::book_shift(&db, &v, ids[1]).await.unwrap();

		let seen_by_u = Scope::of(&u).shifts(&db).await.unwrap();
		assert_eq!(seen_by_u.len(), 3);
		assert!(seen_by_u.iter().all(|s| s.status.is_available() || s.status.is_held_by(u.uid())));
		assert!(seen_by_u.iter().any(|s| s.id == ids[0]));
		assert!(!seen_by_u.iter().any(|s| s.id == ids[1]));

		// all pharmacies are visible to substitutes
		assert_eq!(Scope::of(&u).pharmacies(&db).await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn admin_sees_everything() {
		let db = crate::testing::db().await;
		let p = crate::testing::actor(&db, "p@pharma.test", Role::Pharmacy).await;
		let q = crate::testing::actor(&db, "q@pharma.test", Role::Pharmacy).await;
		let u = crate::testing::actor(&db, "u@pharma.test", Role::Substitute).await;
		let a = crate::testing::actor(&db, "a@pharma.test", Role::Admin).await;
		let ids = post(&db, &p, &[1, 2]).await;
		post(&db, &q, &[5]).await;
		gateway::book_shift(&db, &u, ids[0]).await.unwrap();

		let scope = Scope::of(&a);
		let shifts = scope.shifts(&db).await.unwrap();
		assert_eq!(shifts.len(), 3);
		assert_eq!(shifts.iter().filter(|s| s.status == ShiftStatus::Booked(u.uid())).count(), 1);
		assert_eq!(scope.pharmacies(&db).await.unwrap().len(), 2);
		assert_eq!(scope.profiles(&db).await.unwrap().len(), 4);

		// everyone else only gets their own profile
		let own = Scope::of(&u).profiles(&db).await.unwrap();
		assert_eq!(own.len(), 1);
		assert_eq!(own[0].account_id, u.uid());
	}

	#[tokio::test]
	async fn public_scope_is_one_owner() {
		let db = crate::testing::db().await;
		let p = crate::testing::actor(&db, "p@pharma.test", Role::Pharmacy).await;
		let q = crate::testing::actor(&db, "q@pharma.test", Role::Pharmacy).await;
		post(&db, &p, &[1, 2]).await;
		post(&db, &q, &[3]).await;

		let shifts = Scope::public(p.uid()).shifts(&db).await.unwrap();
		assert_eq!(shifts.len(), 2);
		assert!(shifts.iter().all(|s| s.owner_id == p.uid()));
		assert!(Scope::public(12345).shifts(&db).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn shifts_come_back_in_calendar_order() {
		let db = crate::testing::db().await;
		let p = crate::testing::actor(&db, "p@pharma.test", Role::Pharmacy).await;
		post(&db, &p, &[9, 3, 6]).await;
		let days: Vec<u32> = Scope::of(&p)
			.shifts(&db)
			.await
			.unwrap()
			.iter()
			.map(|s| chrono::Datelike::day(&s.date))
			.collect();
		assert_eq!(days, vec![3, 6, 9]);
	}
}
