use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde_json::{Map, Value};

use crate::configs::Storage;
use crate::errors::ApiError;
use crate::middlewares::CurrentUser;
use crate::models::Sensor;
use crate::services::filter::{self, SqlValue};

#[derive(Clone)]
pub struct SensorState {
    pub storage: Arc<Storage>,
}

/// All sensors of the caller, optionally narrowed by repeated
/// `column[]=value` parameters over the declared sensor columns.
pub async fn get_sensors(
    State(state): State<SensorState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = filter::build(Sensor::columns(), &params)?;

    let mut sql = String::from("SELECT * FROM sensors WHERE user_id = ?");
    for clause in &filter.clauses {
        sql.push_str(" AND ");
        sql.push_str(clause);
    }

    let mut query = sqlx::query_as::<_, Sensor>(&sql).bind(user.id);
    for bind in filter.binds {
        query = bind.bind_as(query);
    }

    let sensors = query.fetch_all(state.storage.get_pool()).await?;

    let body: BTreeMap<String, Sensor> = sensors
        .into_iter()
        .map(|sensor| (sensor.id.to_string(), sensor))
        .collect();

    Ok(Json(body))
}

pub async fn sensor_columns() -> impl IntoResponse {
    Json(Sensor::columns())
}

pub async fn create_sensor(
    State(state): State<SensorState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let fields = sensor_write_fields(as_object(&body)?)?;

    let mut columns = vec!["user_id"];
    columns.extend(fields.iter().map(|(name, _)| *name));
    let placeholders = vec!["?"; columns.len()].join(", ");

    let sql = format!(
        "INSERT INTO sensors ({}) VALUES ({}) RETURNING *",
        columns.join(", "),
        placeholders
    );

    let mut tx = state.storage.get_pool().begin().await?;

    let mut query = sqlx::query_as::<_, Sensor>(&sql).bind(user.id);
    for (_, value) in fields {
        query = value.bind_as(query);
    }

    let sensor = query
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::validation(format!("Could not create sensor: '{e}'")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::validation(format!("Could not create sensor: '{e}'")))?;

    Ok(Json(sensor))
}

pub async fn update_sensor(
    State(state): State<SensorState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(sensor_id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let sensor = find_owned_sensor(&state.storage, sensor_id, user.id, "change").await?;

    let fields = sensor_write_fields(as_object(&body)?)?;
    if fields.is_empty() {
        return Ok(Json(sensor));
    }

    let assignments: Vec<String> = fields
        .iter()
        .map(|(name, _)| format!("{name} = ?"))
        .collect();
    let sql = format!(
        "UPDATE sensors SET {} WHERE id = ? RETURNING *",
        assignments.join(", ")
    );

    let mut tx = state.storage.get_pool().begin().await?;

    let mut query = sqlx::query_as::<_, Sensor>(&sql);
    for (_, value) in fields {
        query = value.bind_as(query);
    }

    let updated = query
        .bind(sensor_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ApiError::validation(format!("Could not update sensor: '{e}'")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::validation(format!("Could not update sensor: '{e}'")))?;

    Ok(Json(updated))
}

pub async fn delete_sensor(
    State(state): State<SensorState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(sensor_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    find_owned_sensor(&state.storage, sensor_id, user.id, "delete").await?;

    let mut tx = state.storage.get_pool().begin().await?;

    // readings cascade via the foreign key
    sqlx::query("DELETE FROM sensors WHERE id = ?")
        .bind(sensor_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| ApiError::validation(format!("Could not delete sensor: '{e}'")))?;

    tx.commit()
        .await
        .map_err(|e| ApiError::validation(format!("Could not delete sensor: '{e}'")))?;

    Ok(())
}

/// Missing sensors and foreign sensors stay distinguishable: the former is a
/// client error naming the id, the latter a forbidden response.
async fn find_owned_sensor(
    storage: &Storage,
    sensor_id: i64,
    user_id: i64,
    action: &str,
) -> Result<Sensor, ApiError> {
    let sensor: Sensor = sqlx::query_as("SELECT * FROM sensors WHERE id = ?")
        .bind(sensor_id)
        .fetch_optional(storage.get_pool())
        .await?
        .ok_or_else(|| ApiError::validation(format!("Sensor with id {sensor_id} does not exist")))?;

    if sensor.user_id != user_id {
        return Err(ApiError::forbidden(format!(
            "You do not have permissions to {action} this sensor"
        )));
    }

    Ok(sensor)
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ApiError> {
    body.as_object()
        .ok_or_else(|| ApiError::validation("Request body needs to be a JSON object"))
}

/// The explicit field table for sensor mutations: every key must be in the
/// allow-list and carry a correctly typed value.
fn sensor_write_fields(data: &Map<String, Value>) -> Result<Vec<(&'static str, SqlValue)>, ApiError> {
    let mut fields = Vec::with_capacity(data.len());

    for (key, value) in data {
        let field = match key.as_str() {
            "name" => ("name", text_value(value, "name")?),
            "unit" => ("unit", text_value(value, "unit")?),
            "description" => ("description", text_value(value, "description")?),
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

fn text_value(value: &Value, column: &str) -> Result<SqlValue, ApiError> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(text) => Ok(SqlValue::Text(text.clone())),
        other => Err(ApiError::validation(format!(
            "Invalid value for column '{column}': '{other}'"
        ))),
    }
}
