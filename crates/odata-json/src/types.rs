//! Identity and temporal value types with OData textual formats.
//!
//! The wire formats are fixed for interoperability: GUIDs are lowercase
//! hex in 8-4-4-4-12 grouping, dates and times follow the ISO-8601-derived
//! shapes OData mandates, durations are XML-schema `dayTimeDuration`.

use core::fmt;

/// A 128-bit GUID, formatted as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid([u8; 16]);

impl Guid {
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Parses the canonical 36-character form.
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 36 {
            return None;
        }
        let mut out = [0u8; 16];
        let mut idx = 0;
        let mut pos = 0;
        while pos < 36 {
            if pos == 8 || pos == 13 || pos == 18 || pos == 23 {
                if bytes[pos] != b'-' {
                    return None;
                }
                pos += 1;
                continue;
            }
            let hi = (bytes[pos] as char).to_digit(16)?;
            let lo = (bytes[pos + 1] as char).to_digit(16)?;
            out[idx] = ((hi << 4) | lo) as u8;
            idx += 1;
            pos += 2;
        }
        Some(Self(out))
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i == 4 || i == 6 || i == 8 || i == 10 {
                f.write_str("-")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// A calendar date, formatted `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    year: i32,
    month: u8,
    day: u8,
}

impl Date {
    pub fn new(year: i32, month: u8, day: u8) -> Option<Self> {
        if !(1..=9999).contains(&year) || !(1..=12).contains(&month) {
            return None;
        }
        if day < 1 || day > days_in_month(year, month) {
            return None;
        }
        Some(Self { year, month, day })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

fn days_in_month(year: i32, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if year % 4 == 0 && (year % 100 != 0 || year % 400 == 0) {
                29
            } else {
                28
            }
        }
        _ => 0,
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02}", self.year, self.month, self.day)
    }
}

/// A time of day with 100-nanosecond resolution, formatted
/// `HH:MM:SS[.fffffff]` with trailing fractional zeros trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
    second: u8,
    /// Sub-second part in nanoseconds, truncated to 100ns ticks on output.
    nanosecond: u32,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8, second: u8, nanosecond: u32) -> Option<Self> {
        if hour > 23 || minute > 59 || second > 59 || nanosecond >= 1_000_000_000 {
            return None;
        }
        Some(Self {
            hour,
            minute,
            second,
            nanosecond,
        })
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)?;
        let ticks = self.nanosecond / 100;
        if ticks > 0 {
            let mut frac = format!("{ticks:07}");
            while frac.ends_with('0') {
                frac.pop();
            }
            write!(f, ".{frac}")?;
        }
        Ok(())
    }
}

/// A date and time with a UTC offset, formatted
/// `YYYY-MM-DDTHH:MM:SS[.fffffff]Z` or with a `±HH:MM` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeOffset {
    date: Date,
    time: TimeOfDay,
    /// Offset from UTC in minutes, in `-14:00..=+14:00`.
    offset_minutes: i16,
}

impl DateTimeOffset {
    pub fn new(date: Date, time: TimeOfDay, offset_minutes: i16) -> Option<Self> {
        if !(-14 * 60..=14 * 60).contains(&offset_minutes) {
            return None;
        }
        Some(Self {
            date,
            time,
            offset_minutes,
        })
    }
}

impl fmt::Display for DateTimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)?;
        if self.offset_minutes == 0 {
            f.write_str("Z")
        } else {
            let sign = if self.offset_minutes < 0 { '-' } else { '+' };
            let abs = self.offset_minutes.unsigned_abs();
            write!(f, "{}{:02}:{:02}", sign, abs / 60, abs % 60)
        }
    }
}

/// A signed day-time duration, formatted `[-]PnDTnHnMn.nnnnnnnS`.
///
/// Zero-valued components are omitted; the zero duration is `PT0S`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration {
    negative: bool,
    seconds: u64,
    /// Sub-second part in nanoseconds, truncated to 100ns ticks on output.
    nanosecond: u32,
}

impl Duration {
    pub fn new(negative: bool, seconds: u64, nanosecond: u32) -> Option<Self> {
        if nanosecond >= 1_000_000_000 {
            return None;
        }
        Some(Self {
            negative,
            seconds,
            nanosecond,
        })
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds == 0 && self.nanosecond < 100 {
            return f.write_str("PT0S");
        }
        if self.negative {
            f.write_str("-")?;
        }
        f.write_str("P")?;
        let days = self.seconds / 86_400;
        let hours = (self.seconds % 86_400) / 3_600;
        let minutes = (self.seconds % 3_600) / 60;
        let seconds = self.seconds % 60;
        let ticks = self.nanosecond / 100;
        if days > 0 {
            write!(f, "{days}D")?;
        }
        if hours > 0 || minutes > 0 || seconds > 0 || ticks > 0 {
            f.write_str("T")?;
            if hours > 0 {
                write!(f, "{hours}H")?;
            }
            if minutes > 0 {
                write!(f, "{minutes}M")?;
            }
            if seconds > 0 || ticks > 0 {
                if ticks > 0 {
                    let mut frac = format!("{ticks:07}");
                    while frac.ends_with('0') {
                        frac.pop();
                    }
                    write!(f, "{seconds}.{frac}S")?;
                } else {
                    write!(f, "{seconds}S")?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guid_round_trip() {
        let g = Guid::parse("01234567-89ab-cdef-0123-456789abcdef").unwrap();
        assert_eq!(g.to_string(), "01234567-89ab-cdef-0123-456789abcdef");
    }

    #[test]
    fn guid_rejects_malformed() {
        assert!(Guid::parse("0123456789abcdef0123456789abcdef").is_none());
        assert!(Guid::parse("01234567-89ab-cdef-0123-456789abcdeg").is_none());
    }

    #[test]
    fn date_formats_padded() {
        assert_eq!(Date::new(7, 3, 9).unwrap().to_string(), "0007-03-09");
        assert!(Date::new(2021, 2, 29).is_none());
        assert!(Date::new(2020, 2, 29).is_some());
    }

    #[test]
    fn time_of_day_trims_fraction() {
        assert_eq!(TimeOfDay::new(1, 2, 3, 0).unwrap().to_string(), "01:02:03");
        assert_eq!(
            TimeOfDay::new(23, 59, 59, 500_000_000).unwrap().to_string(),
            "23:59:59.5"
        );
    }

    #[test]
    fn date_time_offset_formats() {
        let d = Date::new(2014, 11, 5).unwrap();
        let t = TimeOfDay::new(8, 30, 0, 0).unwrap();
        assert_eq!(
            DateTimeOffset::new(d, t, 0).unwrap().to_string(),
            "2014-11-05T08:30:00Z"
        );
        assert_eq!(
            DateTimeOffset::new(d, t, -330).unwrap().to_string(),
            "2014-11-05T08:30:00-05:30"
        );
    }

    #[test]
    fn duration_formats() {
        assert_eq!(Duration::new(false, 0, 0).unwrap().to_string(), "PT0S");
        assert_eq!(Duration::new(false, 12, 0).unwrap().to_string(), "PT12S");
        assert_eq!(
            Duration::new(true, 90_061, 100).unwrap().to_string(),
            "-P1DT1H1M1.0000001S"
        );
    }
}
