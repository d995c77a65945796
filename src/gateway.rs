//! Role-gated writes. Every operation checks the actor before touching a row
//! and reports a refusal as an error instead of quietly doing nothing.

use crate::profile::Actor;
use crate::sql::Db;
use crate::types::{parse_clock, NewPharmacyForm, NewShiftForm, Pid, ProfileForm, Role, ShiftRole, ShiftStatus, Sid, StatusTag, Uid};
use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("{action} requires the {required} role")]
	WrongRole { action: &'static str, required: Role },
	#[error("pharmacy {0} belongs to someone else")]
	NotOwner(Pid),
	#[error("only the holder or an admin may cancel the booking of shift {0}")]
	NotHolder(Sid),
	#[error("profile {0} can only be edited by its owner or an admin")]
	NotSelf(Uid),
	#[error("role can only be changed by an admin")]
	RoleLocked,
	#[error("pharmacy {0} not found")]
	PharmacyNotFound(Pid),
	#[error("shift {0} not found")]
	ShiftNotFound(Sid),
	#[error("profile {0} not found")]
	ProfileNotFound(Uid),
	#[error("shift {0} is already booked")]
	AlreadyBooked(Sid),
	#[error("shift {0} is not booked")]
	NotBooked(Sid),
	#[error("{0}")]
	Invalid(String),
	#[error("database error: {0}")]
	Db(#[from] sqlx::Error),
}

impl GatewayError {
	pub fn is_refusal(&self) -> bool {
		matches!(
			self,
			GatewayError::WrongRole { .. }
				| GatewayError::NotOwner(_)
				| GatewayError::NotHolder(_)
				| GatewayError::NotSelf(_)
				| GatewayError::RoleLocked
		)
	}
}

/// What happens to a pharmacy's shifts when the pharmacy is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PharmacyDeletion {
	#[default]
	Cascade,
	Orphan,
}

impl FromStr for PharmacyDeletion {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"cascade" => Ok(PharmacyDeletion::Cascade),
			"orphan" => Ok(PharmacyDeletion::Orphan),
			other => Err(format!("expected \"cascade\" or \"orphan\", got {other:?}")),
		}
	}
}

impl fmt::Display for PharmacyDeletion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			PharmacyDeletion::Cascade => "cascade",
			PharmacyDeletion::Orphan => "orphan",
		})
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deleted {
	pub pharmacy: Pid,
	pub shifts_removed: u64,
	pub shifts_orphaned: u64,
}

fn require(actor: &Actor, required: Role, action: &'static str) -> Result<(), GatewayError> {
	if actor.role() == required {
		Ok(())
	} else {
		warn!(uid = actor.uid(), role = %actor.role(), action, "refused");
		Err(GatewayError::WrongRole { action, required })
	}
}

fn refuse(actor: &Actor, err: GatewayError) -> GatewayError {
	warn!(uid = actor.uid(), role = %actor.role(), "refused: {err}");
	err
}

/// Validated pharmacy input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPharmacy {
	pub name: String,
	pub address: String,
	pub email: Option<String>,
}

impl TryFrom<NewPharmacyForm> for NewPharmacy {
	type Error = GatewayError;

	fn try_from(form: NewPharmacyForm) -> Result<Self, Self::Error> {
		let name = form.name.trim().to_string();
		let address = form.address.trim().to_string();
		let email = form.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty());
		if name.chars().count() < 2 {
			return Err(GatewayError::Invalid("name must be at least 2 characters".into()));
		}
		if address.chars().count() < 5 {
			return Err(GatewayError::Invalid("address must be at least 5 characters".into()));
		}
		if let Some(email) = &email {
			if !email.contains('@') {
				return Err(GatewayError::Invalid(format!("{email:?} is not an email address")));
			}
		}
		Ok(NewPharmacy { name, address, email })
	}
}

/// Validated shift input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShift {
	pub pharmacy_id: Pid,
	pub date: NaiveDate,
	pub start: NaiveTime,
	pub end: NaiveTime,
	pub pay_rate: i64,
	pub role: ShiftRole,
}

impl TryFrom<NewShiftForm> for NewShift {
	type Error = GatewayError;

	fn try_from(form: NewShiftForm) -> Result<Self, Self::Error> {
		let start = parse_clock(&form.start_time)
			.ok_or_else(|| GatewayError::Invalid(format!("start time {:?} is not HH:MM", form.start_time)))?;
		let end = parse_clock(&form.end_time)
			.ok_or_else(|| GatewayError::Invalid(format!("end time {:?} is not HH:MM", form.end_time)))?;
		if start == end {
			return Err(GatewayError::Invalid("shift starts and ends at the same time".into()));
		}
		if form.pay_rate < 1 {
			return Err(GatewayError::Invalid("pay rate must be a positive number".into()));
		}
		Ok(NewShift {
			pharmacy_id: form.pharmacy_id,
			date: form.date,
			start,
			end,
			pay_rate: form.pay_rate,
			role: form.role,
		})
	}
}

pub async fn create_pharmacy(db: &Db, actor: &Actor, new: NewPharmacy) -> Result<Pid, GatewayError> {
	require(actor, Role::Pharmacy, "creating a pharmacy")?;
	let id = sqlx::query("INSERT INTO pharmacies (owner_id, name, address, email) VALUES (?, ?, ?, ?);")
		.bind(actor.uid())
		.bind(&new.name)
		.bind(&new.address)
		.bind(&new.email)
		.execute(db)
		.await?
		.last_insert_rowid();
	info!(uid = actor.uid(), pharmacy = id, "pharmacy created");
	Ok(id)
}

async fn pharmacy_owner(db: &Db, pid: Pid) -> Result<Uid, GatewayError> {
	sqlx::query_scalar("SELECT owner_id FROM pharmacies WHERE id = ?;")
		.bind(pid)
		.fetch_optional(db)
		.await?
		.ok_or(GatewayError::PharmacyNotFound(pid))
}

pub async fn delete_pharmacy(db: &Db, actor: &Actor, pid: Pid, policy: PharmacyDeletion) -> Result<Deleted, GatewayError> {
	require(actor, Role::Pharmacy, "deleting a pharmacy")?;
	if pharmacy_owner(db, pid).await? != actor.uid() {
		return Err(refuse(actor, GatewayError::NotOwner(pid)));
	}

	let mut tx = db.begin().await?;
	let mut deleted = Deleted { pharmacy: pid, shifts_removed: 0, shifts_orphaned: 0 };
	match policy {
		PharmacyDeletion::Cascade => {
			deleted.shifts_removed = sqlx::query("DELETE FROM shifts WHERE pharmacy_id = ?;")
				.bind(pid)
				.execute(&mut *tx)
				.await?
				.rows_affected();
		}
		PharmacyDeletion::Orphan => {
			let left: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shifts WHERE pharmacy_id = ?;")
				.bind(pid)
				.fetch_one(&mut *tx)
				.await?;
			deleted.shifts_orphaned = left as u64;
		}
	}
	let gone = sqlx::query("DELETE FROM pharmacies WHERE id = ? AND owner_id = ?;")
		.bind(pid)
		.bind(actor.uid())
		.execute(&mut *tx)
		.await?
		.rows_affected();
	if gone == 0 {
		// deleted by a concurrent request; the transaction is rolled back on drop
		return Err(GatewayError::PharmacyNotFound(pid));
	}
	tx.commit().await?;

	if deleted.shifts_orphaned > 0 {
		warn!(uid = actor.uid(), pharmacy = pid, orphaned = deleted.shifts_orphaned, "pharmacy deleted, shifts left orphaned");
	} else {
		info!(uid = actor.uid(), pharmacy = pid, removed = deleted.shifts_removed, "pharmacy deleted");
	}
	Ok(deleted)
}

pub async fn create_shift(db: &Db, actor: &Actor, new: NewShift) -> Result<Sid, GatewayError> {
	require(actor, Role::Pharmacy, "posting a shift")?;
	if pharmacy_owner(db, new.pharmacy_id).await? != actor.uid() {
		return Err(refuse(actor, GatewayError::NotOwner(new.pharmacy_id)));
	}
	let id = sqlx::query(
		"INSERT INTO shifts (pharmacy_id, owner_id, date, start_time, end_time, pay_rate, role, status) \
		VALUES (?, ?, ?, ?, ?, ?, ?, ?);",
	)
	.bind(new.pharmacy_id)
	.bind(actor.uid())
	.bind(new.date)
	.bind(new.start)
	.bind(new.end)
	.bind(new.pay_rate)
	.bind(new.role)
	.bind(StatusTag::Available)
	.execute(db)
	.await?
	.last_insert_rowid();
	info!(uid = actor.uid(), shift = id, date = %new.date, "shift created");
	Ok(id)
}

async fn shift_status(db: &Db, sid: Sid) -> Result<ShiftStatus, GatewayError> {
	let row: Option<(StatusTag, Option<Uid>)> = sqlx::query_as("SELECT status, booked_by FROM shifts WHERE id = ?;")
		.bind(sid)
		.fetch_optional(db)
		.await?;
	let (tag, holder) = row.ok_or(GatewayError::ShiftNotFound(sid))?;
	ShiftStatus::from(tag, holder)
		.ok_or_else(|| GatewayError::Db(sqlx::Error::Decode(format!("shift {sid} has inconsistent booking columns").into())))
}

/// Books an available shift for the acting substitute. The update is
/// conditional on the shift still being available, so of several concurrent
/// bookers exactly one wins.
pub async fn book_shift(db: &Db, actor: &Actor, sid: Sid) -> Result<(), GatewayError> {
	require(actor, Role::Substitute, "booking a shift")?;
	let done = sqlx::query("UPDATE shifts SET status = ?, booked_by = ? WHERE id = ? AND status = ?;")
		.bind(StatusTag::Booked)
		.bind(actor.uid())
		.bind(sid)
		.bind(StatusTag::Available)
		.execute(db)
		.await?;
	if done.rows_affected() == 0 {
		// tell a missing shift apart from one somebody else got first
		shift_status(db, sid).await?;
		return Err(GatewayError::AlreadyBooked(sid));
	}
	info!(uid = actor.uid(), shift = sid, "shift booked");
	Ok(())
}

pub async fn cancel_booking(db: &Db, actor: &Actor, sid: Sid) -> Result<(), GatewayError> {
	let holder = match shift_status(db, sid).await? {
		ShiftStatus::Available => return Err(GatewayError::NotBooked(sid)),
		ShiftStatus::Booked(holder) => holder,
	};
	if holder != actor.uid() && !actor.admin {
		return Err(refuse(actor, GatewayError::NotHolder(sid)));
	}
	let done = sqlx::query("UPDATE shifts SET status = ?, booked_by = NULL WHERE id = ? AND status = ? AND booked_by = ?;")
		.bind(StatusTag::Available)
		.bind(sid)
		.bind(StatusTag::Booked)
		.bind(holder)
		.execute(db)
		.await?;
	if done.rows_affected() == 0 {
		return Err(GatewayError::NotBooked(sid));
	}
	info!(uid = actor.uid(), shift = sid, holder, "booking cancelled");
	Ok(())
}

/// Saves a profile. Actors edit their own name; role changes and edits of
/// other profiles are admin only.
pub async fn save_profile(db: &Db, actor: &Actor, target: Uid, form: ProfileForm) -> Result<(), GatewayError> {
	if target != actor.uid() && !actor.admin {
		return Err(refuse(actor, GatewayError::NotSelf(target)));
	}
	let current = crate::profile::find(db, target).await?.ok_or(GatewayError::ProfileNotFound(target))?;

	let name = form.name.trim().to_string();
	if name.chars().count() < 2 {
		return Err(GatewayError::Invalid("name must be at least 2 characters".into()));
	}
	let role = match form.role {
		Some(role) if role != current.role => {
			if !actor.admin {
				return Err(refuse(actor, GatewayError::RoleLocked));
			}
			role
		}
		_ => current.role,
	};

	sqlx::query("UPDATE profiles SET name = ?, role = ? WHERE account_id = ?;")
		.bind(&name)
		.bind(role)
		.bind(target)
		.execute(db)
		.await?;
	info!(uid = actor.uid(), profile = target, %role, "profile saved");
	Ok(())
}
