// CF-style time decoding ("<unit> since <reference>")

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

const STRICT_CALENDARS: [&str; 3] = ["standard", "gregorian", "proleptic_gregorian"];

/// Seconds per unit for the supported unit names
fn unit_seconds(unit: &str) -> Option<f64> {
    match unit.trim().to_ascii_lowercase().as_str() {
        "days" | "day" => Some(86_400.0),
        "hours" | "hour" => Some(3_600.0),
        "minutes" | "minute" => Some(60.0),
        "seconds" | "second" => Some(1.0),
        _ => None,
    }
}

fn split_units(units: &str) -> Option<(f64, &str)> {
    let lower = units.to_ascii_lowercase();
    let at = lower.find(" since ")?;
    let scale = unit_seconds(&units[..at])?;
    Some((scale, units[at + " since ".len()..].trim()))
}

fn strip_zone(reference: &str) -> &str {
    let r = reference.trim();
    r.strip_suffix("UTC")
        .or_else(|| r.strip_suffix('Z'))
        .unwrap_or(r)
        .trim()
}

/// Reference in the canonical `YYYY-MM-DD hh:mm:ss` layout only
fn parse_reference_strict(reference: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(strip_zone(reference), "%Y-%m-%d %H:%M:%S").ok()
}

/// Reference in any of the common layouts
fn parse_reference_lenient(reference: &str) -> Option<NaiveDateTime> {
    let r = strip_zone(reference);
    const LAYOUTS: [&str; 5] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y%m%d%H%M%S",
    ];
    LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(r, layout).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(r, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
}

fn offset(reference: NaiveDateTime, value: f64, scale: f64) -> Option<DateTime<Utc>> {
    let millis = (value * scale * 1_000.0).round();
    // roughly +/- 30 million years
    if !millis.is_finite() || millis.abs() > 1.0e18 {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(millis as i64)?;
    reference.checked_add_signed(delta).map(|t| t.and_utc())
}

/// Decode a time offset to UTC
///
/// The strict strategy requires a Gregorian-family calendar and the canonical
/// reference layout. The lenient strategy accepts any calendar name and the
/// other common reference layouts. `None` when both fail.
pub fn decode_time(value: f64, units: Option<&str>, calendar: Option<&str>) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let (scale, reference) = split_units(units?)?;
    let calendar = calendar.unwrap_or("standard").trim().to_ascii_lowercase();

    let strict = STRICT_CALENDARS
        .contains(&calendar.as_str())
        .then(|| parse_reference_strict(reference))
        .flatten()
        .and_then(|r| offset(r, value, scale));

    strict.or_else(|| parse_reference_lenient(reference).and_then(|r| offset(r, value, scale)))
}
