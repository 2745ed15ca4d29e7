//! Data models shared by the reading source, history store and chart presenter.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

// ---

/// One temperature/humidity sample as produced by a reading source.
///
/// `timestamp` is epoch milliseconds, the same unit the device firmware
/// reports on `/api/latest`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    // ---
    pub temperature: f64,
    pub humidity: f64,
    pub timestamp: i64,
}

/// Error returned when a string is not a `YYYY-MM-DD` calendar date.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid date '{0}', expected YYYY-MM-DD")]
pub struct DateKeyError(pub String);

/// Calendar date used to bucket history, rendered as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    // ---
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Today's date in the local time zone.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Calendar date of an epoch-millisecond timestamp as seen in `tz`.
    pub fn from_timestamp_ms<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> Option<Self> {
        let utc = DateTime::from_timestamp_millis(timestamp)?;
        Some(Self(utc.with_timezone(tz).date_naive()))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // ---
        // chrono accepts signed or short years; the wire format does not
        if s.len() != 10 {
            return Err(DateKeyError(s.to_string()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| DateKeyError(s.to_string()))
    }
}

impl TryFrom<String> for DateKey {
    type Error = DateKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_string()
    }
}

/// All readings recorded for one calendar day.
///
/// The three series are index-aligned: entry `i` of each describes the same
/// sample. Fields are private so `push` is the only way to grow them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayHistory {
    // ---
    date: DateKey,
    timestamps: Vec<i64>,
    temperature: Vec<f64>,
    humidity: Vec<f64>,
}

impl DayHistory {
    // ---
    pub fn new(date: DateKey) -> Self {
        Self {
            date,
            timestamps: Vec::new(),
            temperature: Vec::new(),
            humidity: Vec::new(),
        }
    }

    /// Rebuild a bucket from stored series. Returns `None` if the series
    /// lengths disagree.
    pub fn from_series(
        date: DateKey,
        timestamps: Vec<i64>,
        temperature: Vec<f64>,
        humidity: Vec<f64>,
    ) -> Option<Self> {
        // ---
        if timestamps.len() != temperature.len() || timestamps.len() != humidity.len() {
            return None;
        }
        Some(Self {
            date,
            timestamps,
            temperature,
            humidity,
        })
    }

    pub fn push(&mut self, reading: &Reading) {
        self.timestamps.push(reading.timestamp);
        self.temperature.push(reading.temperature);
        self.humidity.push(reading.humidity);
    }

    pub fn date(&self) -> DateKey {
        self.date
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn temperature(&self) -> &[f64] {
        &self.temperature
    }

    pub fn humidity(&self) -> &[f64] {
        &self.humidity
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Entry `i` reassembled as a reading.
    pub fn get(&self, i: usize) -> Option<Reading> {
        Some(Reading {
            temperature: *self.temperature.get(i)?,
            humidity: *self.humidity.get(i)?,
            timestamp: *self.timestamps.get(i)?,
        })
    }

    pub fn last(&self) -> Option<Reading> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }
}

/// Hourly aggregate served by the device on `/api/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlySeries {
    // ---
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateKey>,
    pub hours: Vec<u32>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
}

impl HourlySeries {
    // ---
    pub fn is_aligned(&self) -> bool {
        self.hours.len() == self.temperature.len() && self.hours.len() == self.humidity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }
}

/// What a history query found for a date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryResult {
    /// Server-side hourly aggregate, one point per hour.
    Hourly(HourlySeries),
    /// Every sample recorded locally for the day.
    Samples(DayHistory),
    /// Nothing recorded for the date. Not an error.
    NoData { date: DateKey },
}

impl HistoryResult {
    // ---
    pub fn is_empty(&self) -> bool {
        match self {
            HistoryResult::Hourly(series) => series.is_empty(),
            HistoryResult::Samples(day) => day.is_empty(),
            HistoryResult::NoData { .. } => true,
        }
    }
}

/// Humidity comfort band shown next to the humidity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comfort {
    Dry,
    Comfortable,
    Humid,
}

impl Comfort {
    // ---
    /// Strict comparisons: 30 and 70 are both comfortable.
    pub fn from_humidity(humidity: f64) -> Self {
        if humidity < 30.0 {
            Comfort::Dry
        } else if humidity > 70.0 {
            Comfort::Humid
        } else {
            Comfort::Comfortable
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Comfort::Dry => "dry",
            Comfort::Comfortable => "comfortable",
            Comfort::Humid => "humid",
        }
    }
}

impl fmt::Display for Comfort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Values currently shown in the "last reading" panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    // ---
    pub temperature: String,
    pub humidity: String,
    pub comfort: Comfort,
    pub last_updated: String,
    pub reading: Reading,
}

impl DisplaySnapshot {
    // ---
    pub fn from_reading<Tz: TimeZone>(reading: Reading, tz: &Tz) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            temperature: format!("{:.1}", (reading.temperature * 10.0).round() / 10.0),
            humidity: format!("{}", reading.humidity.round() as i64),
            comfort: Comfort::from_humidity(reading.humidity),
            last_updated: format_clock(reading.timestamp, tz),
            reading,
        }
    }
}

/// Zero-padded `HH:MM:SS` of an epoch-millisecond timestamp in `tz`.
///
/// Out-of-range timestamps render as `--:--:--`.
pub fn format_clock<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    match DateTime::from_timestamp_millis(timestamp) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{FixedOffset, Utc};

    fn reading(temperature: f64, humidity: f64) -> Reading {
        Reading {
            temperature,
            humidity,
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_comfort_bands() {
        // ---
        assert_eq!(Comfort::from_humidity(0.0), Comfort::Dry);
        assert_eq!(Comfort::from_humidity(29.99), Comfort::Dry);
        assert_eq!(Comfort::from_humidity(45.0), Comfort::Comfortable);
        assert_eq!(Comfort::from_humidity(70.01), Comfort::Humid);
        assert_eq!(Comfort::from_humidity(100.0), Comfort::Humid);

        // Boundaries are comfortable
        assert_eq!(Comfort::from_humidity(30.0), Comfort::Comfortable);
        assert_eq!(Comfort::from_humidity(70.0), Comfort::Comfortable);
    }

    #[test]
    fn test_comfort_serializes_as_label() {
        // ---
        let json = serde_json::to_string(&Comfort::Humid).unwrap();
        assert_eq!(json, "\"humid\"");
        assert_eq!(Comfort::Dry.to_string(), "dry");
    }

    #[test]
    fn test_date_key_parsing() {
        // ---
        let key: DateKey = "2023-11-14".parse().unwrap();
        assert_eq!(key.to_string(), "2023-11-14");

        assert!("2023-11-1".parse::<DateKey>().is_err());
        assert!("2023-13-01".parse::<DateKey>().is_err());
        assert!("2023-02-30".parse::<DateKey>().is_err());
        assert!("14/11/2023".parse::<DateKey>().is_err());
        assert!("".parse::<DateKey>().is_err());
    }

    #[test]
    fn test_date_key_from_timestamp_uses_zone() {
        // ---
        // 2023-11-14T22:13:20Z
        let ts = 1_700_000_000_000;
        let utc = DateKey::from_timestamp_ms(ts, &Utc).unwrap();
        assert_eq!(utc.to_string(), "2023-11-14");

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = DateKey::from_timestamp_ms(ts, &tokyo).unwrap();
        assert_eq!(local.to_string(), "2023-11-15");
    }

    #[test]
    fn test_day_history_push_keeps_series_aligned() {
        // ---
        let mut day = DayHistory::new("2023-11-14".parse().unwrap());
        assert!(day.is_empty());

        day.push(&reading(22.3, 45.0));
        day.push(&reading(23.1, 50.0));

        assert_eq!(day.len(), 2);
        assert_eq!(day.timestamps().len(), day.temperature().len());
        assert_eq!(day.temperature().len(), day.humidity().len());
        assert_eq!(day.last().unwrap().temperature, 23.1);
        assert_eq!(day.get(0).unwrap().humidity, 45.0);
        assert!(day.get(2).is_none());
    }

    #[test]
    fn test_day_history_rejects_misaligned_series() {
        // ---
        let date = "2023-11-14".parse().unwrap();
        assert!(DayHistory::from_series(date, vec![1, 2], vec![20.0], vec![40.0, 41.0]).is_none());
        assert!(DayHistory::from_series(date, vec![1], vec![20.0], vec![40.0]).is_some());
    }

    #[test]
    fn test_display_snapshot_formatting() {
        // ---
        let snapshot = DisplaySnapshot::from_reading(reading(22.34, 45.6), &Utc);
        assert_eq!(snapshot.temperature, "22.3");
        assert_eq!(snapshot.humidity, "46");
        assert_eq!(snapshot.comfort, Comfort::Comfortable);
        assert_eq!(snapshot.last_updated, "22:13:20");
    }

    #[test]
    fn test_display_temperature_rounds_halves_up() {
        // ---
        let cases = [(22.25, "22.3"), (0.25, "0.3"), (-0.25, "-0.3"), (19.0, "19.0")];
        for (temperature, shown) in cases {
            let snapshot = DisplaySnapshot::from_reading(reading(temperature, 50.0), &Utc);
            assert_eq!(snapshot.temperature, shown, "temperature {temperature}");
        }
    }

    #[test]
    fn test_format_clock_pads_fields() {
        // ---
        // 1970-01-01T01:02:03Z
        assert_eq!(format_clock(3_723_000, &Utc), "01:02:03");

        let minus_three = FixedOffset::west_opt(3 * 3600).unwrap();
        assert_eq!(format_clock(3_723_000, &minus_three), "22:02:03");
    }

    #[test]
    fn test_history_result_emptiness() {
        // ---
        let date: DateKey = "2023-11-14".parse().unwrap();
        assert!(HistoryResult::NoData { date }.is_empty());
        assert!(HistoryResult::Samples(DayHistory::new(date)).is_empty());

        let hourly = HourlySeries {
            date: Some(date),
            hours: vec![0],
            temperature: vec![20.0],
            humidity: vec![50.0],
        };
        assert!(hourly.is_aligned());
        assert!(!HistoryResult::Hourly(hourly).is_empty());
    }
}
