//! Reading repository: SQL for the `sensor_readings` table.
//!
//! Timestamps are stored as RFC 3339 text with as many fractional digits as
//! the value carries, so a row reads back exactly as it was written.

use chrono::{DateTime, SecondsFormat, Utc};
use ews_core::{Reading, StoredReading};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::errors::Result;

const SELECT_COLUMNS: &str = "id, created_at, updated_at, timestamp, temperature, humidity, \
     pressure, altitude, co2, distance, wind_speed, wind_direction, rainfall, voltage, bus_voltage, current";

/// Reading repository. Stateless; every method takes `&Connection`.
pub struct ReadingRepo;

impl ReadingRepo {
    /// Insert a reading, stamping `created_at` and `updated_at` with the current time.
    pub fn insert(conn: &Connection, reading: &Reading) -> Result<StoredReading> {
        Self::insert_at(conn, reading, Utc::now())
    }

    /// Insert a reading with an explicit `created_at`, which also seeds `updated_at`.
    pub fn insert_at(
        conn: &Connection,
        reading: &Reading,
        created_at: DateTime<Utc>,
    ) -> Result<StoredReading> {
        let created = format_ts(created_at);
        let _ = conn.execute(
            "INSERT INTO sensor_readings (created_at, updated_at, timestamp, temperature,
                 humidity, pressure, altitude, co2, distance, wind_speed, wind_direction,
                 rainfall, voltage, bus_voltage, current)
             VALUES (?1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                created,
                format_ts(reading.timestamp),
                reading.temperature,
                reading.humidity,
                reading.pressure,
                reading.altitude,
                reading.co2,
                reading.distance,
                reading.wind_speed,
                reading.wind_direction,
                reading.rainfall,
                reading.voltage,
                reading.bus_voltage,
                reading.current,
            ],
        )?;
        Ok(StoredReading {
            id: conn.last_insert_rowid(),
            created_at,
            updated_at: created_at,
            reading: reading.clone(),
        })
    }

    /// Number of stored readings.
    pub fn count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM sensor_readings", [], |row| row.get(0))?)
    }

    /// Most recently inserted reading, if any.
    pub fn latest(conn: &Connection) -> Result<Option<StoredReading>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sensor_readings ORDER BY id DESC LIMIT 1");
        Ok(conn.query_row(&sql, [], map_row).optional()?)
    }

    /// Fetch a reading by id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<StoredReading>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM sensor_readings WHERE id = ?1");
        Ok(conn.query_row(&sql, params![id], map_row).optional()?)
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<StoredReading> {
    Ok(StoredReading {
        id: row.get(0)?,
        created_at: parse_ts(row, 1)?,
        updated_at: parse_ts(row, 2)?,
        reading: Reading {
            timestamp: parse_ts(row, 3)?,
            temperature: row.get(4)?,
            humidity: row.get(5)?,
            pressure: row.get(6)?,
            altitude: row.get(7)?,
            co2: row.get(8)?,
            distance: row.get(9)?,
            wind_speed: row.get(10)?,
            wind_direction: row.get(11)?,
            rainfall: row.get(12)?,
            voltage: row.get(13)?,
            bus_voltage: row.get(14)?,
            current: row.get(15)?,
        },
    })
}
