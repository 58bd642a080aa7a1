//! Duration parsing utilities.
//!
//! Scenario files write times as strings ("20s", "500ms", "1.5s", "2m")
//! which are parsed into [`SimTime`].

use crate::sim::SimTime;

/// Parse a duration string into simulated time.
///
/// Supported formats:
/// - Raw seconds: "20", "1.5"
/// - Nanoseconds: "250ns"
/// - Microseconds: "80us", "80µs"
/// - Milliseconds: "500ms"
/// - Seconds: "20s", "20sec", "20secs", "20second", "20seconds"
/// - Minutes: "2m", "2min", "2mins", "2minute", "2minutes"
/// - Hours: "1h", "1hr", "1hrs", "1hour", "1hours"
///
/// Fractional values are rounded to the nearest nanosecond.
///
/// # Examples
/// ```
/// use pacesim::sim::SimTime;
/// use pacesim::utils::duration::parse_sim_duration;
///
/// assert_eq!(parse_sim_duration("20s"), Ok(SimTime::from_secs(20)));
/// assert_eq!(parse_sim_duration("1.5s"), Ok(SimTime::from_millis(1500)));
/// assert_eq!(parse_sim_duration("500ms"), Ok(SimTime::from_millis(500)));
/// assert!(parse_sim_duration("soon").is_err());
/// ```
pub fn parse_sim_duration(duration: &str) -> Result<SimTime, String> {
    let duration = duration.trim();
    let (number, unit) = split_number_part(duration);
    if number.is_empty() {
        return Err(format!("Invalid duration format: {}", duration));
    }

    let nanos_per_unit: u64 = match unit.trim() {
        "ns" => 1,
        "us" | "µs" => 1_000,
        "ms" => 1_000_000,
        "" | "s" | "sec" | "secs" | "second" | "seconds" => 1_000_000_000,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000_000_000,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000_000_000,
        _ => return Err(format!("Invalid duration format: {}", duration)),
    };

    if let Ok(whole) = number.parse::<u64>() {
        return whole
            .checked_mul(nanos_per_unit)
            .map(SimTime::from_nanos)
            .ok_or_else(|| format!("Duration out of range: {}", duration));
    }

    let value: f64 = number
        .parse()
        .map_err(|_| format!("Invalid duration format: {}", duration))?;
    let nanos = (value * nanos_per_unit as f64).round();
    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return Err(format!("Duration out of range: {}", duration));
    }
    Ok(SimTime::from_nanos(nanos as u64))
}

/// Split at the first character that cannot be part of an unsigned decimal.
fn split_number_part(duration: &str) -> (&str, &str) {
    for (i, c) in duration.char_indices() {
        if !c.is_ascii_digit() && c != '.' {
            return duration.split_at(i);
        }
    }
    (duration, "")
}
