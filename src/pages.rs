use crate::dashboard::{Dashboard, PublicCalendar};
use crate::profile::Actor;
use crate::types::{Pharmacy, Pid, Role, Shift, ShiftStatus, Uid};
use crate::view::{self, MonthGrid, ShiftAction};
use axum::http::StatusCode;
use chrono::NaiveDate;
use maud::{html, Markup, DOCTYPE};
use std::collections::{BTreeSet, HashMap};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn layout(title: &str, actor: Option<&Actor>, body: Markup) -> Markup {
	html! {
		(DOCTYPE)
		html lang="en" {
			head {
				meta charset="utf-8";
				meta name="viewport" content="width=device-width, initial-scale=1";
				title { (title) " · PharmaSub Calendar" }
				link rel="stylesheet" href="/static/style.css";
			}
			body {
				header.top {
					a.brand href="/" { "PharmaSub Calendar" }
					@if let Some(actor) = actor {
						nav {
							span.who { (actor.name()) " " span.badge { (actor.role()) } }
							@if actor.admin {
								a href="/admin" { "Admin" }
							}
							@if actor.role() == Role::Pharmacy {
								a href=(format!("/public/{}", actor.uid())) { "Public calendar" }
							}
							form.inline method="post" action="/logout" {
								button type="submit" { "Sign out" }
							}
						}
					}
				}
				main { (body) }
			}
		}
	}
}

pub fn error_page(status: StatusCode, message: &str) -> Markup {
	layout(status.canonical_reason().unwrap_or("Error"), None, html! {
		section.card.error {
			h1 { (status.as_u16()) " " (status.canonical_reason().unwrap_or("Error")) }
			p { (message) }
			a href="/" { "Back to the calendar" }
		}
	})
}

pub fn login_page(error: Option<&str>) -> Markup {
	layout("Sign in", None, html! {
		@if let Some(error) = error {
			p.flash.error { (error) }
		}
		div.columns {
			section.card {
				h2 { "Sign in" }
				form method="post" action="/login" {
					label { "Email" input type="email" name="email" required; }
					label { "Password" input type="password" name="pass" required; }
					button type="submit" { "Sign in" }
				}
			}
			section.card {
				h2 { "Create an account" }
				form method="post" action="/register" {
					label { "Full name / pharmacy name" input type="text" name="name" required minlength="2"; }
					label { "Email" input type="email" name="email" required; }
					label { "Password" input type="password" name="pass" required minlength="6"; }
					label { "Confirm password" input type="password" name="confirm" required minlength="6"; }
					fieldset {
						legend { "My role is…" }
						label.radio { input type="radio" name="role" value="pharmacy"; "Pharmacy" }
						label.radio { input type="radio" name="role" value="substitute" checked; "Substitute" }
					}
					button type="submit" { "Sign up" }
				}
			}
		}
	})
}

fn day_link(base: &str, day: NaiveDate) -> String {
	format!("{base}?day={day}")
}

fn calendar(base: &str, selected: NaiveDate, open: &BTreeSet<NaiveDate>) -> Markup {
	let grid = MonthGrid::containing(selected);
	html! {
		section.card.calendar {
			div.month {
				a href=(day_link(base, grid.previous())) { "‹" }
				h2 { (grid.title()) }
				a href=(day_link(base, grid.next())) { "›" }
			}
			table {
				thead { tr { @for name in WEEKDAYS { th { (name) } } } }
				tbody {
					@for week in &grid.weeks {
						tr {
							@for cell in week {
								@match cell {
									Some(day) => {
										td.day.open[open.contains(day)].selected[*day == selected] {
											a href=(day_link(base, *day)) { (day.format("%-d")) }
										}
									}
									None => { td {} }
								}
							}
						}
					}
				}
			}
			p.hint { "Days with available shifts are marked." }
		}
	}
}

fn shift_card(shift: &Shift, pharmacy: Option<&Pharmacy>, action: ShiftAction, back: &str) -> Markup {
	html! {
		article.shift.booked[shift.status.is_booked()] {
			div.head {
				div {
					h3 { (pharmacy.map_or("Pharmacy", |p| p.name.as_str())) }
					p.address { (pharmacy.map_or("…", |p| p.address.as_str())) }
				}
				span.status { (shift.status) }
			}
			p.meta {
				span { (shift.date.format("%A, %B %-d")) }
				span { (shift.time_range()) }
				span { (shift.pay_rate) "/hr" }
				span.role { (shift.role) }
			}
			@match action {
				ShiftAction::Book => {
					form method="post" action=(format!("/shifts/{}/book", shift.id)) {
						input type="hidden" name="back" value=(back);
						button type="submit" { "Book shift" }
					}
				}
				ShiftAction::Cancel => {
					form method="post" action=(format!("/shifts/{}/cancel", shift.id)) {
						input type="hidden" name="back" value=(back);
						button.secondary type="submit" { "Cancel booking" }
					}
				}
				ShiftAction::None => {}
			}
		}
	}
}

fn day_list(
	shifts: &[Shift],
	pharmacies: &HashMap<Pid, &Pharmacy>,
	day: NaiveDate,
	viewer: Option<&Actor>,
	back: &str,
) -> Markup {
	let on_day = view::day_view(shifts, day);
	html! {
		section.card.day {
			h2 { "Shifts for " (day.format("%B %-d")) }
			@if on_day.is_empty() {
				p.empty { "No shifts for this day." }
			}
			@for shift in on_day {
				(shift_card(shift, pharmacies.get(&shift.pharmacy_id).copied(), view::action_for(viewer, shift), back))
			}
		}
	}
}

fn profile_form(actor: &Actor) -> Markup {
	html! {
		section.card {
			h2 { "Profile" }
			form method="post" action="/profile" {
				label { "Full name / pharmacy name" input type="text" name="name" value=(actor.name()) required minlength="2"; }
				label { "Email" input type="email" value=(actor.profile.email) readonly disabled; }
				(role_select(actor.profile.role, actor.admin, !actor.admin))
				button type="submit" { "Save profile" }
			}
		}
	}
}

fn role_select(current: Role, offer_admin: bool, locked: bool) -> Markup {
	html! {
		label {
			"Role"
			select name="role" disabled[locked] {
				@if offer_admin || current == Role::Admin {
					option value="admin" selected[current == Role::Admin] { "Admin" }
				}
				option value="pharmacy" selected[current == Role::Pharmacy] { "Pharmacy" }
				option value="substitute" selected[current == Role::Substitute] { "Substitute" }
			}
		}
	}
}

fn pharmacy_panel(dash: &Dashboard, back: &str) -> Markup {
	html! {
		section.card {
			h2 { "My pharmacies" }
			@if dash.pharmacies.is_empty() {
				p.empty { "No pharmacies yet." }
			}
			ul.pharmacies {
				@for pharmacy in &dash.pharmacies {
					li {
						strong { (pharmacy.name) }
						" " span.address { (pharmacy.address) }
						@if let Some(email) = &pharmacy.email {
							" " span.email { (email) }
						}
						form.inline method="post" action=(format!("/pharmacies/{}/delete", pharmacy.id)) {
							input type="hidden" name="back" value=(back);
							button.danger type="submit" { "Delete" }
						}
					}
				}
			}
			h3 { "New pharmacy" }
			form method="post" action="/pharmacies" {
				label { "Name" input type="text" name="name" required minlength="2"; }
				label { "Address" input type="text" name="address" placeholder="Street, number, city" required minlength="5"; }
				label { "Contact email" input type="email" name="email"; }
				button type="submit" { "Create pharmacy" }
			}
		}
		@if !dash.pharmacies.is_empty() {
			section.card {
				h2 { "Post a shift" }
				form method="post" action="/shifts" {
					label {
						"Pharmacy"
						select name="pharmacy_id" required {
							@for pharmacy in &dash.pharmacies {
								option value=(pharmacy.id) { (pharmacy.name) }
							}
						}
					}
					label { "Date" input type="date" name="date" required; }
					label { "Start time" input type="text" name="start_time" placeholder="HH:MM" required; }
					label { "End time" input type="text" name="end_time" placeholder="HH:MM" required; }
					label { "Pay rate (per hour)" input type="number" name="pay_rate" min="1" required; }
					label {
						"Role"
						select name="role" {
							option value="pharmacist" { "Pharmacist" }
							option value="assistant" { "Assistant" }
						}
					}
					button type="submit" { "Create shift" }
				}
			}
		}
	}
}

fn bookings_panel(dash: &Dashboard, pharmacies: &HashMap<Pid, &Pharmacy>, back: &str) -> Markup {
	let bookings: Vec<&Shift> = dash.bookings().collect();
	html! {
		section.card {
			h2 { "My bookings" }
			@if bookings.is_empty() {
				p.empty { "You have not booked any shifts." }
			}
			@for shift in bookings {
				(shift_card(shift, pharmacies.get(&shift.pharmacy_id).copied(), ShiftAction::Cancel, back))
			}
		}
	}
}

pub fn dashboard_page(dash: &Dashboard, day: NaiveDate) -> Markup {
	let actor = &dash.actor;
	let pharmacies = view::pharmacy_index(&dash.pharmacies);
	let back = day_link("/", day);
	layout("Dashboard", Some(actor), html! {
		div.columns {
			(calendar("/", day, &view::open_days(&dash.shifts)))
			(day_list(&dash.shifts, &pharmacies, day, Some(actor), &back))
		}
		div.columns {
			@match actor.role() {
				Role::Pharmacy => { (pharmacy_panel(dash, &back)) }
				Role::Substitute => { (bookings_panel(dash, &pharmacies, &back)) }
				Role::Admin => {
					section.card {
						h2 { "Administration" }
						p { "Every shift is visible here. " a href="/admin" { "Manage shifts and users" } }
					}
				}
			}
			(profile_form(actor))
		}
	})
}

pub fn admin_page(dash: &Dashboard) -> Markup {
	let pharmacies = view::pharmacy_index(&dash.pharmacies);
	layout("Admin", Some(&dash.actor), html! {
		h1 { "Admin dashboard" }
		section.card {
			h2 { "All shifts" }
			table.list {
				thead { tr { th { "Date" } th { "Time" } th { "Pharmacy" } th { "Role" } th { "Status" } th { "Booked by" } th {} } }
				tbody {
					@if dash.shifts.is_empty() {
						tr { td colspan="7" { "No shifts found." } }
					}
					@for shift in &dash.shifts {
						tr {
							td { (shift.date) }
							td { (shift.time_range()) }
							td { (pharmacies.get(&shift.pharmacy_id).map_or("(deleted)", |p| p.name.as_str())) }
							td { (shift.role) }
							td { (shift.status) }
							td {
								@match shift.status {
									ShiftStatus::Booked(holder) => { (dash.profile_name(holder).unwrap_or("Unknown user")) }
									ShiftStatus::Available => { "N/A" }
								}
							}
							td {
								@if shift.status.is_booked() {
									form.inline method="post" action=(format!("/shifts/{}/cancel", shift.id)) {
										input type="hidden" name="back" value="/admin";
										button.secondary type="submit" { "Cancel booking" }
									}
								}
							}
						}
					}
				}
			}
		}
		section.card {
			h2 { "Users" }
			table.list {
				thead { tr { th { "Email" } th { "Name and role" } } }
				tbody {
					@if dash.profiles.is_empty() {
						tr { td colspan="2" { "No users found." } }
					}
					@for profile in &dash.profiles {
						tr {
							td { (profile.email) }
							td {
								form.inline method="post" action=(format!("/admin/profiles/{}", profile.account_id)) {
									input type="text" name="name" value=(profile.name) required minlength="2";
									(role_select(profile.role, true, false))
									button type="submit" { "Save" }
								}
							}
						}
					}
				}
			}
		}
	})
}

pub fn public_page(cal: &PublicCalendar, owner: Uid, day: NaiveDate) -> Markup {
	let pharmacies = view::pharmacy_index(&cal.pharmacies);
	let base = format!("/public/{owner}");
	let title = cal.owner.as_ref().map_or("Shift calendar".to_string(), |p| format!("{}: shift calendar", p.name));
	layout(&title, None, html! {
		h1 { (title) }
		div.columns {
			(calendar(&base, day, &view::open_days(&cal.shifts)))
			(day_list(&cal.shifts, &pharmacies, day, None, &base))
		}
	})
}
