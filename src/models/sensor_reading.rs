use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Column, ColumnKind, Table};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct SensorReading {
    pub id: i64,
    pub sensor_id: i64,
    pub value: Option<f64>,
    #[serde(with = "iso8601")]
    pub datetime: DateTime<Utc>,
}

impl SensorReading {
    pub fn columns() -> &'static [Column] {
        &[
            Column {
                name: "id",
                kind: ColumnKind::Integer,
                nullable: false,
                primary_key: true,
                unique: true,
            },
            Column {
                name: "sensor_id",
                kind: ColumnKind::Integer,
                nullable: false,
                primary_key: false,
                unique: false,
            },
            Column {
                name: "value",
                kind: ColumnKind::Float,
                nullable: true,
                primary_key: false,
                unique: false,
            },
            Column {
                name: "datetime",
                kind: ColumnKind::DateTime,
                nullable: false,
                primary_key: false,
                unique: false,
            },
        ]
    }
}

pub struct SensorReadingTable;

impl Table for SensorReadingTable {
    fn name(&self) -> &'static str {
        "sensor_readings"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS sensor_readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sensor_id INTEGER NOT NULL,
                value REAL,
                datetime DATETIME NOT NULL,
                FOREIGN KEY (sensor_id) REFERENCES sensors (id)
                    ON DELETE CASCADE ON UPDATE CASCADE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS sensor_readings;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["sensors"]
    }
}

/// ISO-8601 UTC with second precision, the wire format for all reading
/// timestamps in responses.
pub mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

    pub fn serialize<S>(datetime: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&datetime.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;

        if let Ok(datetime) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(datetime.with_timezone(&Utc));
        }

        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S")
            .map(|naive| naive.and_utc())
            .map_err(serde::de::Error::custom)
    }
}
