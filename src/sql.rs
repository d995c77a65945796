use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

pub type Db = Pool<Sqlite>;

/*
DROP TABLE IF EXISTS shifts;
DROP TABLE IF EXISTS pharmacies;
DROP TABLE IF EXISTS profiles;
DROP TABLE IF EXISTS sessions;
DROP TABLE IF EXISTS accounts;
*/

pub const TABLE_SCHEMA: &str = r#"

CREATE TABLE IF NOT EXISTS accounts (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	email TEXT NOT NULL UNIQUE,
	pass TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
	token TEXT NOT NULL PRIMARY KEY,
	account_id INTEGER NOT NULL,
	expires_at TEXT NOT NULL,
	FOREIGN KEY(account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS profiles (
	account_id INTEGER NOT NULL PRIMARY KEY,
	name TEXT NOT NULL,
	email TEXT NOT NULL,
	role TEXT NOT NULL CHECK(role IN ('pharmacy', 'substitute', 'admin')),
	FOREIGN KEY(account_id) REFERENCES accounts(id)
);

CREATE TABLE IF NOT EXISTS pharmacies (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	owner_id INTEGER NOT NULL,
	name TEXT NOT NULL,
	address TEXT NOT NULL,
	email TEXT DEFAULT NULL,
	FOREIGN KEY(owner_id) REFERENCES accounts(id)
);

-- pharmacy_id carries no foreign key: the orphan deletion policy keeps shifts
-- whose pharmacy is gone
CREATE TABLE IF NOT EXISTS shifts (
	id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
	pharmacy_id INTEGER NOT NULL,
	owner_id INTEGER NOT NULL,
	date DATE NOT NULL,
	start_time TEXT NOT NULL,
	end_time TEXT NOT NULL,
	pay_rate INTEGER NOT NULL CHECK(pay_rate > 0),
	role TEXT NOT NULL CHECK(role IN ('pharmacist', 'assistant')),
	status TEXT NOT NULL DEFAULT 'available' CHECK(status IN ('available', 'booked')),
	booked_by INTEGER DEFAULT NULL,
	CHECK((status == 'booked') == (booked_by IS NOT NULL)),
	FOREIGN KEY(owner_id) REFERENCES accounts(id),
	FOREIGN KEY(booked_by) REFERENCES accounts(id)
);

CREATE INDEX IF NOT EXISTS shifts_by_owner ON shifts(owner_id);
CREATE INDEX IF NOT EXISTS shifts_by_holder ON shifts(booked_by);
CREATE INDEX IF NOT EXISTS shifts_by_pharmacy ON shifts(pharmacy_id);
CREATE INDEX IF NOT EXISTS pharmacies_by_owner ON pharmacies(owner_id);

"#;

pub async fn connect(url: &str, max_connections: u32) -> Result<Db, sqlx::Error> {
	let options = SqliteConnectOptions::from_str(url)?
		.create_if_missing(true)
		.foreign_keys(true);

	SqlitePoolOptions::new()
		.max_connections(max_connections)
		.acquire_timeout(Duration::from_secs(3))
		.connect_with(options)
		.await
}

pub async fn schema(db: &Db) -> Result<(), sqlx::Error> {
	db.execute(TABLE_SCHEMA).await?;
	Ok(())
}

/*

[pharmacy] create shift
INSERT INTO shifts
	(pharmacy_id, owner_id, date, start_time, end_time, pay_rate, role)
VALUES
	(?, ?, ?, ?, ?, ?, ?);

[substitute] book shift -- loses cleanly against a concurrent booker
UPDATE shifts SET
	status = 'booked', booked_by = ?
WHERE
	id = ? AND status = 'available';

[holder|admin] cancel booking
UPDATE shifts SET
	status = 'available', booked_by = NULL
WHERE
	id = ? AND status = 'booked' AND booked_by = ?;

*/
