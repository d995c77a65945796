use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Identity id, the primary key of `accounts`.
pub type Uid = i64;
pub type Pid = i64;
pub type Sid = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
	Pharmacy,
	#[default]
	Substitute,
	Admin,
}

impl Role {
	pub fn as_str(self) -> &'static str {
		match self {
			Role::Pharmacy => "pharmacy",
			Role::Substitute => "substitute",
			Role::Admin => "admin",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Role {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"pharmacy" => Ok(Role::Pharmacy),
			"substitute" => Ok(Role::Substitute),
			"admin" => Ok(Role::Admin),
			other => Err(format!("unknown role {other:?}")),
		}
	}
}

/// Which kind of worker a shift is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ShiftRole {
	Pharmacist,
	Assistant,
}

impl fmt::Display for ShiftRole {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ShiftRole::Pharmacist => "pharmacist",
			ShiftRole::Assistant => "assistant",
		})
	}
}

/// Column value of `shifts.status`. Paired with `booked_by` it becomes a [`ShiftStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum StatusTag {
	Available,
	Booked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftStatus {
	Available,
	Booked(Uid),
}

impl ShiftStatus {
	/// `None` when the columns disagree, which the table `CHECK` rules out.
	pub fn from(tag: StatusTag, booked_by: Option<Uid>) -> Option<Self> {
		match (tag, booked_by) {
			(StatusTag::Available, None) => Some(ShiftStatus::Available),
			(StatusTag::Booked, Some(uid)) => Some(ShiftStatus::Booked(uid)),
			_ => None,
		}
	}

	pub fn is_available(self) -> bool {
		matches!(self, ShiftStatus::Available)
	}

	pub fn is_booked(self) -> bool {
		matches!(self, ShiftStatus::Booked(_))
	}

	pub fn holder(self) -> Option<Uid> {
		match self {
			ShiftStatus::Available => None,
			ShiftStatus::Booked(uid) => Some(uid),
		}
	}

	pub fn is_held_by(self, viewer: Uid) -> bool {
		self.holder() == Some(viewer)
	}
}

impl fmt::Display for ShiftStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			ShiftStatus::Available => "available",
			ShiftStatus::Booked(_) => "booked",
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Account {
	pub id: Uid,
	pub email: String,
	pub pass: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Profile {
	pub account_id: Uid,
	pub name: String,
	pub email: String,
	pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Pharmacy {
	pub id: Pid,
	pub owner_id: Uid,
	pub name: String,
	pub address: String,
	pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shift {
	pub id: Sid,
	pub pharmacy_id: Pid,
	pub owner_id: Uid,
	pub date: NaiveDate,
	pub start: NaiveTime,
	pub end: NaiveTime,
	pub pay_rate: i64,
	pub role: ShiftRole,
	pub status: ShiftStatus,
}

#[derive(Debug, Clone, FromRow)]
pub struct ShiftQuery {
	pub id: Sid,
	pub pharmacy_id: Pid,
	pub owner_id: Uid,
	pub date: NaiveDate,
	pub start_time: NaiveTime,
	pub end_time: NaiveTime,
	pub pay_rate: i64,
	pub role: ShiftRole,
	pub status: StatusTag,
	pub booked_by: Option<Uid>,
}

impl Shift {
	pub fn from_query(info: ShiftQuery) -> Result<Self, sqlx::Error> {
		let status = ShiftStatus::from(info.status, info.booked_by).ok_or_else(|| {
			sqlx::Error::Decode(format!("shift {} has status {:?} with holder {:?}", info.id, info.status, info.booked_by).into())
		})?;
		Ok(Shift {
			id: info.id,
			pharmacy_id: info.pharmacy_id,
			owner_id: info.owner_id,
			date: info.date,
			start: info.start_time,
			end: info.end_time,
			pay_rate: info.pay_rate,
			role: info.role,
			status,
		})
	}

	pub fn time_range(&self) -> String {
		format!("{} - {}", self.start.format("%H:%M"), self.end.format("%H:%M"))
	}
}

/// Parses `H:MM` or `HH:MM`, 24 hour clock.
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
	let (h, m) = s.trim().split_once(':')?;
	if h.is_empty() || h.len() > 2 || m.len() != 2 {
		return None;
	}
	let h: u32 = h.parse().ok()?;
	let m: u32 = m.parse().ok()?;
	NaiveTime::from_hms_opt(h, m, 0)
}

#[derive(Deserialize, Debug)]
pub struct FormLogin {
	pub email: String,
	pub pass: String,
}

#[derive(Deserialize, Debug)]
pub struct FormRegister {
	pub name: String,
	pub email: String,
	pub pass: String,
	pub confirm: String,
	#[serde(default)]
	pub role: Role,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewPharmacyForm {
	pub name: String,
	pub address: String,
	#[serde(default)]
	pub email: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct NewShiftForm {
	pub pharmacy_id: Pid,
	pub date: NaiveDate,
	pub start_time: String,
	pub end_time: String,
	pub pay_rate: i64,
	pub role: ShiftRole,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ProfileForm {
	pub name: String,
	#[serde(default)]
	pub role: Option<Role>,
}

/// Hidden field on action forms naming where to land afterwards.
#[derive(Deserialize, Debug, Default)]
pub struct ReturnTo {
	#[serde(default)]
	pub back: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct DayParam {
	#[serde(default)]
	pub day: Option<NaiveDate>,
}
