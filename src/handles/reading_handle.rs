use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::configs::Storage;
use crate::errors::ApiError;
use crate::middlewares::CurrentUser;
use crate::models::{iso8601, SensorReading};
use crate::services::aggregate::{self, AggregateFunction, AggregatedReading};
use crate::services::filter::SqlValue;
use crate::services::time_window::{self, parse_timestamp, TimeWindow};

#[derive(Clone)]
pub struct ReadingState {
    pub storage: Arc<Storage>,
}

/// Minimal reading row for unaggregated responses.
#[derive(Serialize)]
struct ReadingPoint {
    value: Option<f64>,
    #[serde(with = "iso8601")]
    datetime: DateTime<Utc>,
}

/// Time-windowed readings for one or more owned sensors, keyed by sensor id.
///
/// `sensor_id[]` picks the sensors (defaulting to all of the caller's),
/// `timedelta`/`days`/`minutes` set the window, and `timeinterval` plus
/// `timeinterval_function` switch the response to per-bucket aggregates.
pub async fn get_readings(
    State(state): State<ReadingState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    // duplicate ids collapse before the existence and ownership checks
    let mut sensor_ids = BTreeSet::new();
    for (key, value) in &params {
        if key != "sensor_id[]" {
            continue;
        }
        let id: i64 = value
            .parse()
            .map_err(|_| ApiError::validation("sensor_id needs to be integers"))?;
        sensor_ids.insert(id);
    }

    for &sensor_id in &sensor_ids {
        let owner: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM sensors WHERE id = ?")
            .bind(sensor_id)
            .fetch_optional(state.storage.get_pool())
            .await?;

        match owner {
            None => {
                return Err(ApiError::validation(format!("Unknown sensor id {sensor_id}")))
            }
            Some((user_id,)) if user_id != user.id => {
                return Err(ApiError::forbidden(format!(
                    "No permission to collect readings from sensor {sensor_id}"
                )))
            }
            Some(_) => {}
        }
    }

    if sensor_ids.is_empty() {
        let owned: Vec<(i64,)> = sqlx::query_as("SELECT id FROM sensors WHERE user_id = ?")
            .bind(user.id)
            .fetch_all(state.storage.get_pool())
            .await?;
        sensor_ids = owned.into_iter().map(|(id,)| id).collect();
    }

    let window = time_window::resolve(&params)?;

    let interval = single_param(&params, "timeinterval")
        .map(aggregate::parse_interval)
        .transpose()?;

    let function = single_param(&params, "timeinterval_function")
        .map(str::parse::<AggregateFunction>)
        .transpose()?
        .unwrap_or(AggregateFunction::Avg);

    match interval {
        Some(bucket_seconds) => {
            let mut readings = Vec::new();
            for &sensor_id in &sensor_ids {
                readings.extend(fetch_window(&state.storage, sensor_id, &window).await?);
            }

            let mut body: BTreeMap<String, Vec<AggregatedReading>> = sensor_ids
                .iter()
                .map(|id| (id.to_string(), Vec::new()))
                .collect();

            for row in aggregate::aggregate(&readings, bucket_seconds, function) {
                if let Some(rows) = body.get_mut(&row.sensor_id.to_string()) {
                    rows.push(row);
                }
            }

            Ok(Json(body).into_response())
        }
        None => {
            let mut body: BTreeMap<String, Vec<ReadingPoint>> = BTreeMap::new();
            for &sensor_id in &sensor_ids {
                let points = fetch_window(&state.storage, sensor_id, &window)
                    .await?
                    .into_iter()
                    .map(|reading| ReadingPoint {
                        value: reading.value,
                        datetime: reading.datetime,
                    })
                    .collect();
                body.insert(sensor_id.to_string(), points);
            }

            Ok(Json(body).into_response())
        }
    }
}

async fn fetch_window(
    storage: &Storage,
    sensor_id: i64,
    window: &TimeWindow,
) -> Result<Vec<SensorReading>, ApiError> {
    let readings = sqlx::query_as(
        r#"
        SELECT * FROM sensor_readings
        WHERE sensor_id = ? AND datetime >= ? AND datetime <= ?
        ORDER BY datetime ASC
        "#,
    )
    .bind(sensor_id)
    .bind(window.start)
    .bind(window.end)
    .fetch_all(storage.get_pool())
    .await?;

    Ok(readings)
}

pub async fn reading_columns() -> impl IntoResponse {
    Json(SensorReading::columns())
}

/// Creates one reading or a batch. The whole payload is validated, element
/// by element, before anything is staged; one transaction wraps the batch so
/// a late failure persists nothing.
pub async fn create_readings(
    State(state): State<ReadingState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = match body {
        Value::Array(entries) => entries,
        single => vec![single],
    };

    let mut staged = Vec::with_capacity(entries.len());
    for entry in &entries {
        let data = entry
            .as_object()
            .ok_or_else(|| ApiError::validation("Request body needs to be a JSON object"))?;

        let mut fields = reading_write_fields(data)?;

        let sensor_id = fields
            .iter()
            .find_map(|(name, value)| match (name, value) {
                (&"sensor_id", SqlValue::Int(id)) => Some(*id),
                _ => None,
            })
            .ok_or_else(|| ApiError::validation("'sensor_id' not set or invalid"))?;

        check_sensor_target(&state.storage, sensor_id, user.id, "add readings to").await?;

        if !fields.iter().any(|(name, _)| *name == "datetime") {
            fields.push(("datetime", SqlValue::DateTime(Utc::now())));
        }

        staged.push(fields);
    }

    let mut tx = state.storage.get_pool().begin().await?;

    let mut created = Vec::with_capacity(staged.len());
    for fields in staged {
        let columns: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO sensor_readings ({}) VALUES ({}) RETURNING *",
            columns.join(", "),
            placeholders
        );

        let mut query = sqlx::query_as::<_, SensorReading>(&sql);
        for (_, value) in fields {
            query = value.bind_as(query);
        }

        let reading = query.fetch_one(&mut *tx).await.map_err(|e| {
            ApiError::validation(format!("Could not create sensor reading(s): '{e}'"))
        })?;
        created.push(reading);
    }

    tx.commit()
        .await
        .map_err(|e| ApiError::validation(format!("Could not create sensor reading(s): '{e}'")))?;

    Ok(Json(created))
}

pub async fn update_reading(
    State(state): State<ReadingState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(reading_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let reading = find_owned_reading(&state.storage, reading_id, user.id, "modify").await?;

    let data = body
        .as_object()
        .ok_or_else(|| ApiError::validation("Request body needs to be a JSON object"))?;
    let fields = reading_write_fields(data)?;

    // a reading may only move between sensors of the same owner
    for (name, value) in &fields {
        if let (&"sensor_id", SqlValue::Int(target)) = (name, value) {
            check_sensor_target(&state.storage, *target, user.id, "move readings to").await?;
        }
    }

    if fields.is_empty() {
        return Ok(Json(reading));
    }

    let assignments: Vec<String> = fields
        .iter()
        .map(|(name, _)| format!("{name} = ?"))
        .collect();
    let sql = format!(
        "UPDATE sensor_readings SET {} WHERE id = ? RETURNING *",
        assignments.join(", ")
    );

    let mut tx = state.storage.get_pool().begin().await?;

    let mut query = sqlx::query_as::<_, SensorReading>(&sql);
    for (_, value) in fields {
        query = value.bind_as(query);
    }

    let updated = query
        .bind(reading_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::validation(format!("Could not update sensor reading: '{e}'")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::validation(format!("Could not update sensor reading: '{e}'")))?;

    Ok(Json(updated))
}

pub async fn delete_reading(
    State(state): State<ReadingState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(reading_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    find_owned_reading(&state.storage, reading_id, user.id, "delete").await?;

    let mut tx = state.storage.get_pool().begin().await?;

    sqlx::query("DELETE FROM sensor_readings WHERE id = ?")
        .bind(reading_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::validation(format!("Could not delete sensor reading: '{e}'")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::validation(format!("Could not delete sensor reading: '{e}'")))?;

    Ok(())
}

/// Ownership of a reading is transitive through its parent sensor.
async fn find_owned_reading(
    storage: &Storage,
    reading_id: i64,
    user_id: i64,
    action: &str,
) -> Result<SensorReading, ApiError> {
    let reading: SensorReading = sqlx::query_as("SELECT * FROM sensor_readings WHERE id = ?")
        .bind(reading_id)
        .fetch_optional(storage.get_pool())
        .await?
        .ok_or_else(|| {
            ApiError::validation(format!("Sensor reading with id {reading_id} does not exist"))
        })?;

    let (owner_id,): (i64,) = sqlx::query_as("SELECT user_id FROM sensors WHERE id = ?")
        .bind(reading.sensor_id)
        .fetch_one(storage.get_pool())
        .await?;

    if owner_id != user_id {
        return Err(ApiError::forbidden(format!(
            "No permissions to {action} sensor reading"
        )));
    }

    Ok(reading)
}

async fn check_sensor_target(
    storage: &Storage,
    sensor_id: i64,
    user_id: i64,
    action: &str,
) -> Result<(), ApiError> {
    let owner: Option<(i64,)> = sqlx::query_as("SELECT user_id FROM sensors WHERE id = ?")
        .bind(sensor_id)
        .fetch_optional(storage.get_pool())
        .await?;

    match owner {
        None => Err(ApiError::validation(format!(
            "'sensor_id' not set or invalid: '{sensor_id}'"
        ))),
        Some((owner_id,)) if owner_id != user_id => Err(ApiError::forbidden(format!(
            "No permissions to {action} sensor {sensor_id}"
        ))),
        Some(_) => Ok(()),
    }
}

fn single_param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

/// The explicit field table for reading mutations.
fn reading_write_fields(
    data: &Map<String, Value>,
) -> Result<Vec<(&'static str, SqlValue)>, ApiError> {
    let mut fields = Vec::with_capacity(data.len());

    for (key, value) in data {
        let field = match key.as_str() {
            "sensor_id" => match value.as_i64() {
                Some(id) => ("sensor_id", SqlValue::Int(id)),
                None => {
                    return Err(ApiError::validation(format!(
                        "'sensor_id' not set or invalid: '{value}'"
                    )))
                }
            },
            "value" => match value {
                Value::Null => ("value", SqlValue::Null),
                Value::Number(number) => match number.as_f64() {
                    Some(float) => ("value", SqlValue::Float(float)),
                    None => {
                        return Err(ApiError::validation(format!(
                            "Invalid value for column 'value': '{value}'"
                        )))
                    }
                },
                other => {
                    return Err(ApiError::validation(format!(
                        "Invalid value for column 'value': '{other}'"
                    )))
                }
            },
            "datetime" => match parse_timestamp(value) {
                Some(datetime) => ("datetime", SqlValue::DateTime(datetime)),
                None => {
                    return Err(ApiError::validation(format!(
                        "Invalid value for column 'datetime': '{value}'"
                    )))
                }
            },
            _ => {
                return Err(ApiError::validation(format!(
                    "Invalid column: '{key}' - column cannot be set"
                )))
            }
        };
        fields.push(field);
    }

    Ok(fields)
}
