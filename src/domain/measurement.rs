// Measurement domain models
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

/// Live event pushed by the backend as `new:measurement`.
///
/// Carries names and codes, never catalog ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMeasurement {
    pub work_center: String,
    pub area: String,
    pub sensor_id: String,
    pub voltage: f64,
    pub current: f64,
    pub date: String,
    pub time: String,
}

/// Timestamp of a historical record, normalized at the ingestion boundary.
///
/// The backend sends either an ISO-8601 string or a MongoDB extended JSON
/// object (`{"$date": ...}`). Shapes that cannot be parsed are kept as
/// `Invalid` with the raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum MeasurementDate {
    Parsed(DateTime<Utc>),
    Invalid(String),
}

impl MeasurementDate {
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            MeasurementDate::Parsed(dt) => Some(*dt),
            MeasurementDate::Invalid(_) => None,
        }
    }

    fn from_value(value: &Value) -> Self {
        let parsed = match value {
            Value::String(s) => parse_timestamp(s),
            Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            Value::Object(map) => match map.get("$date") {
                Some(inner @ (Value::String(_) | Value::Number(_))) => {
                    return Self::from_value(inner);
                }
                Some(Value::Object(long)) => long
                    .get("$numberLong")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<i64>().ok())
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
                _ => None,
            },
            _ => None,
        };

        match parsed {
            Some(dt) => MeasurementDate::Parsed(dt),
            None => {
                warn!(raw = %value, "Unsupported measurement date format");
                MeasurementDate::Invalid(value.to_string())
            }
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

impl<'de> Deserialize<'de> for MeasurementDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(MeasurementDate::from_value(&value))
    }
}

impl Serialize for MeasurementDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_datetime() {
            Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            None => serializer.serialize_none(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkCenterRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaRef {
    pub id: String,
    pub name: String,
    pub work_center: WorkCenterRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorRef {
    pub id: String,
    pub sensor_id: String,
    pub area: AreaRef,
}

/// Stored measurement returned by `GET /measurements`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub id: String,
    pub voltage: f64,
    pub current: f64,
    pub date: MeasurementDate,
    pub sensor: SensorRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub last_page: u32,
    pub has_next_page: bool,
    pub has_previous_page: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn empty(page: u32) -> Self {
        Self {
            data: Vec::new(),
            meta: PageMeta {
                total: 0,
                page,
                last_page: 1,
                has_next_page: false,
                has_previous_page: false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stat {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

/// Aggregates from `GET /statistics`; zero-filled by default
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub voltage: Stat,
    pub current: Stat,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_json(date: &str) -> String {
        format!(
            r#"{{"id":"m1","voltage":110.5,"current":24.9,"date":{},
                "sensor":{{"id":"s1","sensorId":"S-001","area":{{"id":"a1","name":"Assembly",
                "workCenter":{{"id":"wc1","name":"Plant A"}}}}}}}}"#,
            date
        )
    }

    #[test]
    fn test_iso_and_mongo_dates_normalize_to_same_instant() {
        let iso: MeasurementRecord = serde_json::from_str(&record_json(r#""2024-05-01T10:30:00.000Z""#)).unwrap();
        let mongo: MeasurementRecord =
            serde_json::from_str(&record_json(r#"{"$date":"2024-05-01T10:30:00.000Z"}"#)).unwrap();

        assert!(iso.date.as_datetime().is_some());
        assert_eq!(iso.date, mongo.date);
        assert_eq!(iso.sensor.area.work_center.name, "Plant A");
    }

    #[test]
    fn test_mongo_number_long_date() {
        let record: MeasurementRecord =
            serde_json::from_str(&record_json(r#"{"$date":{"$numberLong":"1714559400000"}}"#)).unwrap();
        let dt = record.date.as_datetime().unwrap();
        assert_eq!(dt.timestamp_millis(), 1_714_559_400_000);
    }

    #[test]
    fn test_unparseable_date_is_kept_invalid() {
        let record: MeasurementRecord = serde_json::from_str(&record_json(r#""yesterday""#)).unwrap();
        assert_eq!(record.date, MeasurementDate::Invalid("\"yesterday\"".to_string()));
        assert!(record.date.as_datetime().is_none());
    }

    #[test]
    fn test_empty_page() {
        let page: Page<MeasurementRecord> = Page::empty(3);
        assert!(page.data.is_empty());
        assert_eq!(page.meta.page, 3);
        assert_eq!(page.meta.last_page, 1);
    }
}
