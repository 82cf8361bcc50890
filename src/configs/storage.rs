use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Error, SqlitePool};

use crate::configs::schema::SchemaManager;
use crate::configs::settings::Database;

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(database: Database, schema_manager: SchemaManager) -> Result<Self, Error> {
        let options = SqliteConnectOptions::from_str(&database.url)?
            .create_if_missing(true)
            // cascading deletes and updates rely on this pragma
            .foreign_keys(true);

        // every pooled connection to an in-memory database sees its own
        // distinct database, so cap the pool at one connection there
        let max_connections = if database.url.contains(":memory:") { 1 } else { 10 };

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::create_schema(&pool, &schema_manager, &database).await?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn create_schema(
        pool: &SqlitePool,
        schema: &SchemaManager,
        database: &Database,
    ) -> Result<(), Error> {
        if database.clean_start {
            for statement in schema.dispose_schema() {
                sqlx::query(&statement).execute(pool).await?;
            }

            tracing::warn!("perform a clean boot: dispose and recreate schema");
        }

        for statement in schema.create_schema() {
            sqlx::query(&statement).execute(pool).await?;
        }

        Ok(())
    }
}
