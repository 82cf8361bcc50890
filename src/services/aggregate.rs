use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::ApiError;
use crate::models::{iso8601, SensorReading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Avg,
    Min,
    Max,
    Sum,
}

impl FromStr for AggregateFunction {
    type Err = ApiError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input {
            "avg" | "average" => Ok(AggregateFunction::Avg),
            "min" | "minimum" => Ok(AggregateFunction::Min),
            "max" | "maximum" => Ok(AggregateFunction::Max),
            "sum" => Ok(AggregateFunction::Sum),
            _ => Err(ApiError::validation(format!(
                "Unknown aggregation function '{input}', expected one of: avg, min, max, sum"
            ))),
        }
    }
}

impl AggregateFunction {
    fn reduce(self, values: &[f64]) -> f64 {
        match self {
            AggregateFunction::Avg => values.iter().sum::<f64>() / values.len() as f64,
            AggregateFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            AggregateFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggregateFunction::Sum => values.iter().sum(),
        }
    }
}

/// Parses a `timeinterval` parameter: a positive bucket width in seconds,
/// or one of the named calendar units.
pub fn parse_interval(input: &str) -> Result<i64, ApiError> {
    let seconds = match input {
        "minute" => 60,
        "hour" => 3600,
        "day" => 86400,
        raw => raw.parse().map_err(|_| {
            ApiError::validation(format!(
                "'timeinterval' needs to be a number of seconds or one of: minute, hour, day, got '{raw}'"
            ))
        })?,
    };

    if seconds <= 0 {
        return Err(ApiError::validation(format!(
            "'timeinterval' needs to be positive, got '{input}'"
        )));
    }

    Ok(seconds)
}

/// One reduced bucket for one sensor.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AggregatedReading {
    pub sensor_id: i64,
    #[serde(with = "iso8601")]
    pub datetime: DateTime<Utc>,
    pub value: f64,
    pub count: usize,
}

/// Buckets readings into fixed, epoch-aligned intervals of `bucket_seconds`
/// and reduces each `(bucket, sensor_id)` group with `function`. Output is
/// ordered by bucket then sensor id; groups without readings are omitted,
/// as are readings with no value.
pub fn aggregate(
    readings: &[SensorReading],
    bucket_seconds: i64,
    function: AggregateFunction,
) -> Vec<AggregatedReading> {
    let mut groups: BTreeMap<(i64, i64), Vec<f64>> = BTreeMap::new();

    for reading in readings {
        let Some(value) = reading.value else {
            continue;
        };

        let bucket = reading.datetime.timestamp().div_euclid(bucket_seconds) * bucket_seconds;
        groups
            .entry((bucket, reading.sensor_id))
            .or_default()
            .push(value);
    }

    groups
        .into_iter()
        .filter_map(|((bucket, sensor_id), values)| {
            Some(AggregatedReading {
                sensor_id,
                datetime: DateTime::from_timestamp(bucket, 0)?,
                value: function.reduce(&values),
                count: values.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(sensor_id: i64, value: Option<f64>, epoch: i64) -> SensorReading {
        SensorReading {
            id: 0,
            sensor_id,
            value,
            datetime: DateTime::from_timestamp(epoch, 0).unwrap(),
        }
    }

    #[test]
    fn test_average_and_sum_within_one_bucket() {
        let readings: Vec<_> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| reading(1, Some(v), 7200 + i as i64))
            .collect();

        let averaged = aggregate(&readings, 3600, AggregateFunction::Avg);
        assert_eq!(averaged.len(), 1);
        assert_eq!(averaged[0].value, 2.5);
        assert_eq!(averaged[0].count, 4);
        assert_eq!(averaged[0].datetime.timestamp(), 7200);

        let summed = aggregate(&readings, 3600, AggregateFunction::Sum);
        assert_eq!(summed[0].value, 10.0);
    }

    #[test]
    fn test_min_and_max() {
        let readings = vec![
            reading(1, Some(4.0), 10),
            reading(1, Some(-2.0), 20),
            reading(1, Some(7.5), 30),
        ];

        assert_eq!(aggregate(&readings, 60, AggregateFunction::Min)[0].value, -2.0);
        assert_eq!(aggregate(&readings, 60, AggregateFunction::Max)[0].value, 7.5);
    }

    #[test]
    fn test_bucket_truncation_and_sparse_output() {
        // two readings an hour apart plus one far in the future
        let readings = vec![
            reading(1, Some(1.0), 3599),
            reading(1, Some(2.0), 3600),
            reading(1, Some(3.0), 90000),
        ];

        let rows = aggregate(&readings, 3600, AggregateFunction::Avg);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].datetime.timestamp(), 0);
        assert_eq!(rows[1].datetime.timestamp(), 3600);
        assert_eq!(rows[2].datetime.timestamp(), 90000 - 90000 % 3600);
    }

    #[test]
    fn test_groups_split_by_sensor() {
        let readings = vec![
            reading(1, Some(1.0), 100),
            reading(2, Some(2.0), 100),
            reading(1, Some(3.0), 101),
        ];

        let rows = aggregate(&readings, 3600, AggregateFunction::Sum);

        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].sensor_id, rows[0].value), (1, 4.0));
        assert_eq!((rows[1].sensor_id, rows[1].value), (2, 2.0));
    }

    #[test]
    fn test_null_values_are_excluded() {
        let readings = vec![reading(1, Some(1.0), 10), reading(1, None, 11)];

        let rows = aggregate(&readings, 60, AggregateFunction::Avg);

        assert_eq!(rows[0].value, 1.0);
        assert_eq!(rows[0].count, 1);
    }

    #[test]
    fn test_function_and_interval_parsing() {
        assert_eq!("avg".parse::<AggregateFunction>().unwrap(), AggregateFunction::Avg);
        assert_eq!("average".parse::<AggregateFunction>().unwrap(), AggregateFunction::Avg);
        assert_eq!("maximum".parse::<AggregateFunction>().unwrap(), AggregateFunction::Max);
        assert!(matches!(
            "median".parse::<AggregateFunction>(),
            Err(ApiError::Validation(message)) if message.contains("avg, min, max, sum")
        ));

        assert_eq!(parse_interval("hour").unwrap(), 3600);
        assert_eq!(parse_interval("900").unwrap(), 900);
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("weekly").is_err());
    }
}
