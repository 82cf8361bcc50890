use serde::{Deserialize, Serialize};

use crate::models::{Column, ColumnKind, Table};

#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Sensor {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Sensor {
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
                name: "user_id",
                kind: ColumnKind::Integer,
                nullable: false,
                primary_key: false,
                unique: false,
            },
            Column {
                name: "name",
                kind: ColumnKind::Text,
                nullable: false,
                primary_key: false,
                unique: false,
            },
            Column {
                name: "unit",
                kind: ColumnKind::Text,
                nullable: true,
                primary_key: false,
                unique: false,
            },
            Column {
                name: "description",
                kind: ColumnKind::Text,
                nullable: true,
                primary_key: false,
                unique: false,
            },
        ]
    }
}

pub struct SensorTable;

impl Table for SensorTable {
    fn name(&self) -> &'static str {
        "sensors"
    }

    fn create(&self) -> String {
        String::from(
            r#"
            CREATE TABLE IF NOT EXISTS sensors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                unit TEXT,
                description TEXT,
                FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
            );
            "#,
        )
    }

    fn dispose(&self) -> String {
        String::from("DROP TABLE IF EXISTS sensors;")
    }

    fn dependencies(&self) -> Vec<&'static str> {
        vec!["users"]
    }
}
