//! Simulated sensor device.
//!
//! Produces the values the device firmware serves when no sensor is wired
//! up: a daily sine wave for temperature and humidity plus seeded noise.
//! History is deterministic per date (seeded from an FNV-1a hash of the
//! date string), so the same date always charts the same curve.

use std::f64::consts::PI;

use chrono::{DateTime, TimeZone, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{DateKey, HourlySeries, Reading};

// ---

pub const HUMIDITY_FLOOR: f64 = 15.0;
pub const HUMIDITY_CEILING: f64 = 95.0;

/// 32-bit FNV-1a hash of `s`.
pub fn hash_date(s: &str) -> u32 {
    // ---
    s.bytes().fold(2_166_136_261u32, |h, b| {
        (h ^ u32::from(b)).wrapping_mul(16_777_619)
    })
}

/// 24 ± 6 °C over the day, plus ±0.5 °C of noise.
pub fn sim_temperature(hour: f64, seed: u32) -> f64 {
    // ---
    let base = 24.0 + 6.0 * ((hour / 24.0) * 2.0 * PI).sin();
    let mut rng = StdRng::seed_from_u64(u64::from(seed.wrapping_add(hour as u32)));
    base + f64::from(rng.gen_range(-50i32..=50)) / 100.0
}

/// 55 ± 20 % over the day (peaking six hours before temperature), plus
/// ±10 % of noise, clamped to [15, 95].
pub fn sim_humidity(hour: f64, seed: u32) -> f64 {
    // ---
    let base = 55.0 + 20.0 * (((hour + 6.0) / 24.0) * 2.0 * PI).sin();
    let noise_seed = seed.wrapping_add(1000).wrapping_add(hour as u32);
    let mut rng = StdRng::seed_from_u64(u64::from(noise_seed));
    let noisy = base + f64::from(rng.gen_range(-100i32..=100)) / 10.0;
    noisy.clamp(HUMIDITY_FLOOR, HUMIDITY_CEILING)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Hourly series for `date`. Temperature has one decimal, humidity none.
pub fn hourly(date: DateKey) -> HourlySeries {
    // ---
    let seed = hash_date(&date.to_string());
    let hours: Vec<u32> = (0..24).collect();

    HourlySeries {
        date: Some(date),
        temperature: hours
            .iter()
            .map(|&h| round_to(sim_temperature(f64::from(h), seed), 1))
            .collect(),
        humidity: hours
            .iter()
            .map(|&h| round_to(sim_humidity(f64::from(h), seed), 0))
            .collect(),
        hours,
    }
}

/// Current reading at `now`. Seeded by the epoch second, so successive
/// calls within the same second agree.
pub fn latest<Tz: TimeZone>(now: DateTime<Tz>) -> Reading {
    // ---
    let hour = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
    let seconds = now.timestamp();
    let seed = seconds as u32;

    Reading {
        temperature: round_to(sim_temperature(hour, seed), 1),
        humidity: round_to(sim_humidity(hour, seed), 0),
        timestamp: seconds * 1000,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::Utc;

    fn date(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_fnv1a_reference_values() {
        // ---
        assert_eq!(hash_date(""), 0x811c_9dc5);
        assert_eq!(hash_date("a"), 0xe40c_292c);
        assert_eq!(hash_date("foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_hourly_is_deterministic_per_date() {
        // ---
        let a = hourly(date("2023-11-14"));
        let b = hourly(date("2023-11-14"));
        let c = hourly(date("2023-11-15"));

        assert_eq!(a, b);
        assert_ne!(a.temperature, c.temperature);
        assert_eq!(a.date, Some(date("2023-11-14")));
    }

    #[test]
    fn test_hourly_shape_and_bounds() {
        // ---
        let series = hourly(date("2024-06-01"));

        assert!(series.is_aligned());
        assert_eq!(series.hours, (0..24).collect::<Vec<_>>());
        for (&t, &h) in series.temperature.iter().zip(&series.humidity) {
            assert!((17.5..=30.5).contains(&t), "temperature {t}");
            assert!((HUMIDITY_FLOOR..=HUMIDITY_CEILING).contains(&h), "humidity {h}");
            assert_eq!(h, h.round());
            assert_eq!(t, round_to(t, 1));
        }
    }

    #[test]
    fn test_latest_uses_whole_seconds() {
        // ---
        let now = Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap();
        let reading = latest(now);

        assert_eq!(reading.timestamp, 1_700_000_000_000);
        assert_eq!(reading, latest(now));
        assert!((HUMIDITY_FLOOR..=HUMIDITY_CEILING).contains(&reading.humidity));
    }
}
