//! Device position types

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Device telemetry at a point in time
///
/// Deserialization expects lower-cased keys, see [`crate::graphql`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct PositionRecord {
    /// The transporter this device is installed on
    #[serde(default, rename(deserialize = "transporterid"))]
    pub transporter_id: String,

    /// The event that produced this position
    #[serde(default, rename(deserialize = "eventid"))]
    pub event_id: Option<i64>,

    #[serde(default)]
    pub latitude: f64,

    #[serde(default)]
    pub longitude: f64,

    #[serde(default)]
    pub altitude: Option<f64>,

    /// Speed in km/h
    #[serde(default)]
    pub speed: Option<f64>,

    /// Heading in degrees
    #[serde(default)]
    pub course: Option<f64>,

    /// Reported state, passed through as text
    #[serde(default, deserialize_with = "text_or_number")]
    pub state: Option<String>,

    /// Device clock at the time of the fix
    #[serde(default, rename(deserialize = "devicedatetime"), deserialize_with = "device_time")]
    pub device_date_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub attributes: Option<PositionAttributes>,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub city: Option<String>,

    #[serde(default)]
    pub country: Option<String>,

    #[serde(default, rename(deserialize = "devicename"))]
    pub device_name: Option<String>,

    #[serde(default, rename(deserialize = "transportertype"), deserialize_with = "text_or_number")]
    pub transporter_type: Option<String>,
}

/// Sensor values attached to a position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct PositionAttributes {
    #[serde(default)]
    pub temperature: Option<f64>,

    #[serde(default)]
    pub satellites: Option<i32>,

    #[serde(default)]
    pub mileage: Option<f64>,

    #[serde(default)]
    pub ignition: Option<bool>,

    #[serde(default, rename(deserialize = "hobbsmeter"))]
    pub hobbs_meter: Option<f64>,
}

/// Speed above which a transporter is counted as moving
const MOVING_SPEED: f64 = 0.0;

/// Speed above which a transporter is counted as speeding
const SPEEDING_SPEED: f64 = 80.0;

/// Age after which a device without a fix is counted as offline
const OFFLINE_AFTER_HOURS: i64 = 2;

/// Dashboard counters over one set of positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FleetSummary {
    pub total: usize,
    pub in_movement: usize,
    pub offline: usize,
    pub speeding: usize,
}

impl FleetSummary {
    /// Count the positions against the given clock
    pub fn from_positions(positions: &[PositionRecord], now: DateTime<Utc>) -> Self {
        let offline_before = now - Duration::hours(OFFLINE_AFTER_HOURS);
        let speed = |p: &PositionRecord| p.speed.unwrap_or_default();

        Self {
            total: positions.len(),
            in_movement: positions.iter().filter(|p| speed(p) > MOVING_SPEED).count(),
            offline: positions
                .iter()
                .filter(|p| p.device_date_time.is_some_and(|t| t < offline_before))
                .count(),
            speeding: positions.iter().filter(|p| speed(p) > SPEEDING_SPEED).count(),
        }
    }
}

/// Accept a JSON string or number as text
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Flag(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
        Raw::Flag(flag) => flag.to_string(),
    }))
}

/// Accept RFC 3339 timestamps and offset-less ones, the latter read as UTC
fn device_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
