use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::config::DatesConfig;
use crate::error::ExportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateStyle {
    Date,
    DateTime,
}

/// Converts API timestamps into the configured zone and display patterns.
#[derive(Debug, Clone)]
pub struct DateFormatter {
    from_zone: Tz,
    to_zone: Tz,
    date_format: String,
    datetime_format: String,
}

impl DateFormatter {
    pub fn new(config: &DatesConfig) -> Self {
        Self {
            from_zone: config.from_zone,
            to_zone: config.to_zone,
            date_format: config.date_format.clone(),
            datetime_format: config.datetime_format.clone(),
        }
    }

    /// Read the wall-clock time of `raw` as a time in the source zone and
    /// move it to the display zone.
    pub fn localize(&self, raw: &str) -> Result<DateTime<Tz>, ExportError> {
        let naive = parse_wall_clock(raw)?;
        let source = self
            .from_zone
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.from_zone.from_utc_datetime(&naive));
        Ok(source.with_timezone(&self.to_zone))
    }

    pub fn format(&self, raw: &str, style: DateStyle) -> Result<String, ExportError> {
        let pattern = match style {
            DateStyle::Date => &self.date_format,
            DateStyle::DateTime => &self.datetime_format,
        };
        Ok(self.localize(raw)?.format(pattern).to_string())
    }

    /// Absent dates render as an empty string.
    pub fn format_opt(&self, raw: Option<&str>, style: DateStyle) -> Result<String, ExportError> {
        match raw {
            Some(raw) if !raw.is_empty() => self.format(raw, style),
            _ => Ok(String::new()),
        }
    }
}

fn parse_wall_clock(raw: &str) -> Result<NaiveDateTime, ExportError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => Ok(parsed.naive_local()),
        Err(source) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map_err(|_| {
            ExportError::Timestamp {
                value: raw.to_string(),
                source,
            }
        }),
    }
}

/// Instant of an RFC 3339 timestamp, used to order actions.
pub fn instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok()
}
