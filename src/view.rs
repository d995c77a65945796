use crate::profile::Actor;
use crate::types::{Pharmacy, Pid, Role, Shift, ShiftStatus};
use chrono::{Datelike, Months, NaiveDate};
use std::collections::{BTreeSet, HashMap};

/// Shifts on `day`, open ones first, then by start time.
pub fn day_view(shifts: &[Shift], day: NaiveDate) -> Vec<&Shift> {
	let mut on_day: Vec<&Shift> = shifts.iter().filter(|s| s.date == day).collect();
	on_day.sort_by_key(|s| (s.status.is_booked(), s.start, s.id));
	on_day
}

/// Days holding at least one open shift; the calendar marks these.
pub fn open_days(shifts: &[Shift]) -> BTreeSet<NaiveDate> {
	shifts
		.iter()
		.filter(|s| s.status.is_available())
		.map(|s| s.date)
		.collect()
}

/// What a viewer may do with a shift card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAction {
	Book,
	Cancel,
	None,
}

pub fn action_for(viewer: Option<&Actor>, shift: &Shift) -> ShiftAction {
	let Some(viewer) = viewer else {
		return ShiftAction::None;
	};
	match shift.status {
		ShiftStatus::Available if viewer.role() == Role::Substitute => ShiftAction::Book,
		ShiftStatus::Booked(holder) if holder == viewer.uid() || viewer.admin => ShiftAction::Cancel,
		_ => ShiftAction::None,
	}
}

pub fn pharmacy_index(pharmacies: &[Pharmacy]) -> HashMap<Pid, &Pharmacy> {
	pharmacies.iter().map(|p| (p.id, p)).collect()
}

/// One calendar month laid out in Monday-first weeks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
	pub first: NaiveDate,
	pub weeks: Vec<[Option<NaiveDate>; 7]>,
}

impl MonthGrid {
	pub fn containing(day: NaiveDate) -> Self {
		let first = day.with_day(1).unwrap_or(day);
		let lead = first.weekday().num_days_from_monday() as usize;

		let mut weeks = Vec::new();
		let mut week = [None; 7];
		let mut slot = lead;
		let mut cursor = Some(first);
		while let Some(day) = cursor.filter(|d| d.month() == first.month()) {
			week[slot] = Some(day);
			slot += 1;
			if slot == 7 {
				weeks.push(week);
				week = [None; 7];
				slot = 0;
			}
			// `None` past the last representable date
			cursor = day.succ_opt();
		}
		if slot != 0 {
			weeks.push(week);
		}
		MonthGrid { first, weeks }
	}

	pub fn title(&self) -> String {
		self.first.format("%B %Y").to_string()
	}

	pub fn previous(&self) -> NaiveDate {
		self.first.checked_sub_months(Months::new(1)).unwrap_or(self.first)
	}

	pub fn next(&self) -> NaiveDate {
		self.first.checked_add_months(Months::new(1)).unwrap_or(self.first)
	}
}
