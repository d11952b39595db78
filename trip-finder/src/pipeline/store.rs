//! Durable trip storage.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;

use super::error::StoreError;
use crate::domain::{Flight, Trip};

/// A sink for batches of trips, owned by exactly one storage worker.
pub trait TripStore {
    /// Write every trip in `trips` atomically. Returns the number written.
    ///
    /// On error nothing from the batch may remain visible.
    fn write_batch(&mut self, trips: &[Trip]) -> Result<usize, StoreError>;
}

/// Several worker connections may write the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS flights (
        flight_key TEXT PRIMARY KEY,
        origin TEXT NOT NULL,
        destination TEXT NOT NULL,
        departure_time TEXT NOT NULL,
        arrival_time TEXT NOT NULL,
        cost REAL NOT NULL,
        currency TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS paths (
        path_id INTEGER PRIMARY KEY AUTOINCREMENT,
        origin TEXT NOT NULL,
        total_cost REAL NOT NULL,
        num_flights INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS path_flights (
        path_id INTEGER NOT NULL REFERENCES paths (path_id),
        flight_key TEXT NOT NULL REFERENCES flights (flight_key),
        sequence_num INTEGER NOT NULL,
        PRIMARY KEY (path_id, sequence_num)
    );
    CREATE INDEX IF NOT EXISTS idx_flights_origin_dest ON flights (origin, destination);
    CREATE INDEX IF NOT EXISTS idx_paths_cost ON paths (total_cost);
";

const DROP_SCHEMA: &str = "
    DROP TABLE IF EXISTS path_flights;
    DROP TABLE IF EXISTS paths;
    DROP TABLE IF EXISTS flights;
";

/// A persisted trip row.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPath {
    pub path_id: i64,
    pub origin: String,
    pub total_cost: f64,
    pub num_flights: i64,
}

/// SQLite-backed [`TripStore`].
pub struct SqliteStore {
    conn: Connection,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// With `reset`, existing tables are dropped first. Only one store per
    /// file should reset, before the others open.
    pub fn open(path: impl AsRef<Path>, reset: bool) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        if reset {
            conn.execute_batch(DROP_SCHEMA)?;
        }
        conn.execute_batch(SCHEMA)?;

        debug!(path = %path.as_ref().display(), reset, "opened trip store");
        Ok(Self { conn })
    }

    /// Number of stored trips.
    pub fn trip_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM paths", [], |row| row.get(0))?;
        Ok(n.unsigned_abs())
    }

    /// Number of distinct stored flights.
    pub fn flight_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM flights", [], |row| row.get(0))?;
        Ok(n.unsigned_abs())
    }

    /// Flight keys of one trip, in leg order.
    pub fn path_flight_keys(&self, path_id: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT flight_key FROM path_flights WHERE path_id = ?1 ORDER BY sequence_num",
        )?;
        let keys = stmt
            .query_map([path_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// The `limit` cheapest trips.
    pub fn cheapest_paths(&self, limit: usize) -> Result<Vec<StoredPath>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare_cached(
            "SELECT path_id, origin, total_cost, num_flights FROM paths
             ORDER BY total_cost, path_id LIMIT ?1",
        )?;
        let paths = stmt
            .query_map([limit], |row| {
                Ok(StoredPath {
                    path_id: row.get(0)?,
                    origin: row.get(1)?,
                    total_cost: row.get(2)?,
                    num_flights: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(paths)
    }

    /// Price stored for a flight key, if present.
    pub fn flight_cost(&self, flight_key: &str) -> Result<Option<f64>, StoreError> {
        let cost = self
            .conn
            .query_row(
                "SELECT cost FROM flights WHERE flight_key = ?1",
                [flight_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(cost)
    }
}

fn format_time(t: NaiveDateTime) -> String {
    t.format(TIME_FORMAT).to_string()
}

fn leg_count(trip: &Trip) -> Result<i64, StoreError> {
    i64::try_from(trip.leg_count()).map_err(|_| StoreError::TooManyFlights(trip.leg_count()))
}

impl TripStore for SqliteStore {
    fn write_batch(&mut self, trips: &[Trip]) -> Result<usize, StoreError> {
        // Take the write lock up front so concurrent writers wait on the busy
        // timeout. Dropped without commit on any error, which rolls back.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut insert_flight = tx.prepare_cached(
                "INSERT OR IGNORE INTO flights
                 (flight_key, origin, destination, departure_time, arrival_time, cost, currency)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            let mut insert_path = tx.prepare_cached(
                "INSERT INTO paths (origin, total_cost, num_flights) VALUES (?1, ?2, ?3)",
            )?;
            let mut insert_leg = tx.prepare_cached(
                "INSERT INTO path_flights (path_id, flight_key, sequence_num) VALUES (?1, ?2, ?3)",
            )?;

            let mut seen: HashSet<String> = HashSet::new();
            let mut write_flight = |flight: &Flight, key: &str| -> Result<(), StoreError> {
                if seen.insert(key.to_string()) {
                    insert_flight.execute(params![
                        key,
                        flight.origin.as_str(),
                        flight.destination.as_str(),
                        format_time(flight.departure),
                        format_time(flight.arrival),
                        flight.price,
                        flight.currency,
                    ])?;
                }
                Ok(())
            };

            for trip in trips {
                let keys: Vec<String> = trip.flights().iter().map(|f| f.key().to_string()).collect();
                for (flight, key) in trip.flights().iter().zip(&keys) {
                    write_flight(flight, key)?;
                }

                insert_path.execute(params![
                    trip.origin().as_str(),
                    trip.total_cost(),
                    leg_count(trip)?,
                ])?;
                let path_id = tx.last_insert_rowid();

                for (seq, key) in (0_i64..).zip(&keys) {
                    insert_leg.execute(params![path_id, key, seq])?;
                }
            }
        }
        tx.commit()?;
        Ok(trips.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectionRule, Iata};
    use chrono::NaiveDate;

    fn code(s: &str) -> Iata {
        Iata::parse(s).unwrap()
    }

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn flight(from: &str, to: &str, day: u32, price: f64) -> Flight {
        Flight::new(code(from), code(to), at(day, 8), at(day, 10), price, -1, "EUR").unwrap()
    }

    fn trip(via: [&str; 2], price: f64) -> Trip {
        let legs = vec![
            flight("TRS", via[0], 1, price),
            flight(via[0], via[1], 2, 10.0),
            flight(via[1], "TRS", 3, 10.0),
        ];
        Trip::new(legs, &ConnectionRule::new(0, 3).unwrap()).unwrap()
    }

    #[test]
    fn batch_is_retrievable_in_leg_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join("trips.db"), true).unwrap();
        let t = trip(["BGY", "STN"], 5.0);

        assert_eq!(store.write_batch(std::slice::from_ref(&t)).unwrap(), 1);
        assert_eq!(store.trip_count().unwrap(), 1);

        let stored = store.cheapest_paths(10).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].origin, "TRS");
        assert_eq!(stored[0].num_flights, 3);
        assert!((stored[0].total_cost - 25.0).abs() < 1e-9);

        let expected: Vec<String> = t.flight_keys().iter().map(ToString::to_string).collect();
        assert_eq!(store.path_flight_keys(stored[0].path_id).unwrap(), expected);
    }

    #[test]
    fn shared_flights_are_stored_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join("trips.db"), true).unwrap();

        // Same TRS->BGY flight in both trips, within one batch and across batches.
        let a = trip(["BGY", "STN"], 5.0);
        let b = trip(["BGY", "CIA"], 5.0);
        store.write_batch(&[a.clone(), b]).unwrap();
        store.write_batch(&[a]).unwrap();

        assert_eq!(store.trip_count().unwrap(), 3);
        // TRS-BGY, BGY-STN, STN-TRS, BGY-CIA, CIA-TRS
        assert_eq!(store.flight_count().unwrap(), 5);
    }

    #[test]
    fn first_price_wins_for_a_flight_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join("trips.db"), true).unwrap();
        let cheap = trip(["BGY", "STN"], 5.0);
        let pricey = trip(["BGY", "STN"], 9.0);
        store.write_batch(&[cheap.clone(), pricey]).unwrap();

        let key = cheap.flights()[0].key().to_string();
        assert_eq!(store.flight_cost(&key).unwrap(), Some(5.0));
        assert_eq!(store.flight_cost("nope").unwrap(), None);
    }

    #[test]
    fn cheapest_paths_orders_by_cost() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::open(dir.path().join("trips.db"), true).unwrap();
        store
            .write_batch(&[
                trip(["BGY", "STN"], 30.0),
                trip(["BGY", "CIA"], 1.0),
                trip(["STN", "BGY"], 15.0),
            ])
            .unwrap();

        let costs: Vec<f64> = store
            .cheapest_paths(2)
            .unwrap()
            .iter()
            .map(|p| p.total_cost)
            .collect();
        assert_eq!(costs, vec![21.0, 35.0]);
    }

    #[test]
    fn reopen_keeps_or_resets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trips.db");
        {
            let mut store = SqliteStore::open(&path, true).unwrap();
            store.write_batch(&[trip(["BGY", "STN"], 5.0)]).unwrap();
        }
        assert_eq!(SqliteStore::open(&path, false).unwrap().trip_count().unwrap(), 1);
        assert_eq!(SqliteStore::open(&path, true).unwrap().trip_count().unwrap(), 0);
    }

    #[test]
    fn two_connections_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trips.db");
        let mut first = SqliteStore::open(&path, true).unwrap();
        let mut second = SqliteStore::open(&path, false).unwrap();

        first.write_batch(&[trip(["BGY", "STN"], 5.0)]).unwrap();
        second.write_batch(&[trip(["BGY", "STN"], 5.0)]).unwrap();

        assert_eq!(first.trip_count().unwrap(), 2);
        assert_eq!(first.flight_count().unwrap(), 3);
    }
}
