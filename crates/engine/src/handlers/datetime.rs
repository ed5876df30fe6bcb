//! Timezone-aware datetime handlers.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

use a2e_error::{A2eError, Result};
use a2e_workflow::{
    ConvertTimezoneConfig, DataModel, DateCalculationConfig, DateOp, GetCurrentDateTimeConfig,
    TimeFormat,
};

/// Read the clock in the configured timezone.
pub fn get_current_datetime(config: &GetCurrentDateTimeConfig, _model: &DataModel) -> Result<Value> {
    let now = Utc::now();
    let zoned = match &config.timezone {
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => now.with_timezone(&tz).fixed_offset(),
            Err(_) => {
                // Unknown zones fall back to UTC rather than failing the
                // whole execution.
                warn!(timezone = %name, "unknown timezone, using UTC");
                now.fixed_offset()
            }
        },
        None => now.fixed_offset(),
    };

    format_datetime(&zoned, config.format, config.format_string.as_deref())
}

/// Re-express a datetime in another timezone.
pub fn convert_timezone(config: &ConvertTimezoneConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;

    let parsed = parse_datetime(input, config.from_timezone.as_deref())?;
    let target: Tz = config
        .to_timezone
        .parse()
        .map_err(|_| A2eError::validation(format!("Unknown timezone: {}", config.to_timezone)))?;

    let converted = parsed.with_timezone(&target).fixed_offset();
    format_datetime(&converted, config.format, config.format_string.as_deref())
}

/// Add or subtract a delta from a datetime.
///
/// Months count as exactly 30 days and years as exactly 365 days; the
/// approximation is part of the operation's contract.
pub fn date_calculation(config: &DateCalculationConfig, model: &DataModel) -> Result<Value> {
    let input = model
        .get(&config.input_path)
        .ok_or_else(|| A2eError::missing_input(&config.input_path))?;

    let parsed = parse_datetime(input, config.timezone.as_deref())?;

    let days = config.years.unwrap_or(0) * 365
        + config.months.unwrap_or(0) * 30
        + config.days.unwrap_or(0);
    let delta = Duration::days(days)
        + Duration::hours(config.hours.unwrap_or(0))
        + Duration::minutes(config.minutes.unwrap_or(0))
        + Duration::seconds(config.seconds.unwrap_or(0));

    let result = match config.operation {
        DateOp::Add => parsed + delta,
        DateOp::Subtract => parsed - delta,
    };

    format_datetime(&result.fixed_offset(), config.format, config.format_string.as_deref())
}

/// Parse a datetime from a timestamp, an ISO-8601 string, a
/// `"%Y-%m-%d %H:%M:%S"` string, or a `{year, month, day, ...}` object.
/// Naive inputs are localized to `zone` (UTC when absent).
fn parse_datetime(value: &Value, zone: Option<&str>) -> Result<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            let secs = n
                .as_f64()
                .ok_or_else(|| A2eError::data("timestamp out of range"))?;
            DateTime::from_timestamp(secs as i64, 0)
                .map(|dt| dt.to_utc())
                .ok_or_else(|| A2eError::data(format!("timestamp out of range: {secs}")))
        }
        Value::String(raw) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw.replace('Z', "+00:00")) {
                return Ok(parsed.to_utc());
            }
            let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map_err(|_| A2eError::data(format!("Unable to parse date string: {raw}")))?;
            localize(naive, zone)
        }
        Value::Object(map) => {
            let field = |name: &str, default: i64| {
                map.get(name).and_then(Value::as_i64).unwrap_or(default)
            };
            let current_year = i64::from(chrono::Datelike::year(&Utc::now()));
            let date = NaiveDate::from_ymd_opt(
                field("year", current_year) as i32,
                field("month", 1) as u32,
                field("day", 1) as u32,
            )
            .ok_or_else(|| A2eError::data("invalid date components"))?;
            let naive = date
                .and_hms_opt(
                    field("hour", 0) as u32,
                    field("minute", 0) as u32,
                    field("second", 0) as u32,
                )
                .ok_or_else(|| A2eError::data("invalid time components"))?;
            localize(naive, zone)
        }
        other => Err(A2eError::data(format!(
            "Unsupported date value: {other}"
        ))),
    }
}

fn localize(naive: NaiveDateTime, zone: Option<&str>) -> Result<DateTime<Utc>> {
    let Some(name) = zone else {
        return Ok(Utc.from_utc_datetime(&naive));
    };
    match name.parse::<Tz>() {
        Ok(tz) => tz
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.to_utc())
            .ok_or_else(|| A2eError::data(format!("ambiguous local time in {name}"))),
        Err(_) => {
            warn!(timezone = %name, "unknown timezone, assuming UTC");
            Ok(Utc.from_utc_datetime(&naive))
        }
    }
}

fn format_datetime(
    value: &DateTime<chrono::FixedOffset>,
    format: TimeFormat,
    pattern: Option<&str>,
) -> Result<Value> {
    Ok(match format {
        TimeFormat::Timestamp => Value::from(value.timestamp()),
        TimeFormat::Custom => {
            let pattern = pattern.ok_or_else(|| {
                A2eError::validation("custom datetime format requires formatString")
            })?;
            Value::String(value.format(pattern).to_string())
        }
        TimeFormat::Iso8601 => Value::String(value.to_rfc3339()),
    })
}
