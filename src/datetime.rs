use bitfield::bitfield;
#[cfg(all(feature = "chrono", feature = "std"))]
use chrono::Local;
#[cfg(feature = "chrono")]
use chrono::{Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use derive_more::Into;

bitfield! {
    /// Packed date and time as stored in directory entries,
    /// date in the upper half and time in the lower half
    #[derive(Copy, Clone, Debug, Default, Into, PartialEq, Eq, PartialOrd, Ord)]
    pub struct Timestamp(u32);
    year_offset, set_year_offset: 31, 25;
    pub month, set_month: 24, 21;
    pub day, set_day: 20, 16;
    pub hour, set_hour: 15, 11;
    pub minute, set_minute: 10, 5;
    pub double_second, set_double_second: 4, 0;
}

impl Timestamp {
    pub fn new(year: u32, month: u32, day: u32, hour: u32, minute: u32, second: u32) -> Self {
        let mut timestamp = Self::default();
        timestamp.set_year(year);
        timestamp.set_month(month);
        timestamp.set_day(day);
        timestamp.set_hour(hour);
        timestamp.set_minute(minute);
        timestamp.set_second(second);
        timestamp
    }

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn year(&self) -> u32 {
        self.year_offset() + 1980
    }

    pub fn set_year(&mut self, year: u32) {
        self.set_year_offset(year.saturating_sub(1980))
    }

    pub fn second(&self) -> u32 {
        self.double_second() * 2
    }

    pub fn set_second(&mut self, second: u32) {
        self.set_double_second(second / 2)
    }

    pub fn date(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn time(&self) -> u16 {
        self.0 as u16
    }
}

impl core::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let (year, month, day) = (self.year(), self.month(), self.day());
        let (hour, minute, second) = (self.hour(), self.minute(), self.second());
        write!(f, "{:04}-{:02}-{:02} {:02}:{:02}:{:02}", year, month, day, hour, minute, second)
    }
}

#[cfg(feature = "chrono")]
impl From<Timestamp> for NaiveDateTime {
    fn from(timestamp: Timestamp) -> NaiveDateTime {
        let date = NaiveDate::from_ymd_opt(timestamp.year() as i32, timestamp.month(), timestamp.day());
        let (hour, minute, second) = (timestamp.hour(), timestamp.minute(), timestamp.second());
        let time = NaiveTime::from_hms_opt(hour, minute, second);
        NaiveDateTime::new(date.unwrap_or_default(), time.unwrap_or_default())
    }
}

#[cfg(feature = "chrono")]
impl From<NaiveDateTime> for Timestamp {
    fn from(datetime: NaiveDateTime) -> Self {
        let (year, month, day) = (datetime.year() as u32, datetime.month(), datetime.day());
        Self::new(year, month, day, datetime.hour(), datetime.minute(), datetime.second())
    }
}

/// exFAT only, offset from UTC in 15 minutes increments
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct UTCOffset(u8);

impl UTCOffset {
    pub fn new(minutes: i16) -> Self {
        Self(((minutes / 15) as u8 & 0x7F) | 0x80)
    }

    pub(crate) fn raw(&self) -> u8 {
        self.0
    }

    pub(crate) fn from_raw(raw: u8) -> Self {
        Self(raw)
    }

    pub fn minutes(&self) -> i16 {
        match self.0 & 0x80 > 0 {
            true => (((self.0 & 0x7F) << 1) as i8 >> 1) as i16 * 15,
            false => 0,
        }
    }
}

#[cfg(feature = "chrono")]
impl TryFrom<UTCOffset> for FixedOffset {
    type Error = ();
    fn try_from(offset: UTCOffset) -> Result<Self, Self::Error> {
        FixedOffset::east_opt(offset.minutes() as i32 * 60).ok_or(())
    }
}

/// Value produced by the real-time clock
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DateTime {
    pub timestamp: Timestamp,
    pub millisecond: u16,
    pub utc_offset: UTCOffset,
}

#[cfg(feature = "extern-datetime-now")]
unsafe extern "Rust" {
    pub(crate) fn fat_datetime_now() -> DateTime;
}

impl DateTime {
    /// Fallback clock value when the host provides no clock, 2024-01-01 00:00:00
    pub const FIXED: Self = Self {
        timestamp: Timestamp((44 << 25) | (1 << 21) | (1 << 16)),
        millisecond: 0,
        utc_offset: UTCOffset(0),
    };

    pub fn now() -> Self {
        match () {
            #[cfg(feature = "extern-datetime-now")]
            () => unsafe { fat_datetime_now() },
            #[cfg(not(feature = "extern-datetime-now"))]
            () => Self::FIXED,
        }
    }
}

#[cfg(all(feature = "chrono", feature = "std"))]
impl DateTime {
    pub fn localtime(&self) -> Result<chrono::DateTime<Local>, ()> {
        use chrono::TimeZone;
        let naive: NaiveDateTime = self.timestamp.into();
        let naive = naive.with_nanosecond(self.millisecond as u32 * 1_000_000).ok_or(())?;
        let offset: FixedOffset = self.utc_offset.try_into()?;
        let datetime = offset.from_local_datetime(&naive).single().ok_or(())?;
        Ok(datetime.with_timezone(&Local))
    }
}

#[cfg(feature = "chrono")]
impl<TZ: chrono::TimeZone> From<chrono::DateTime<TZ>> for DateTime {
    fn from(datetime: chrono::DateTime<TZ>) -> Self {
        use chrono::Offset;
        let seconds = datetime.offset().fix().local_minus_utc();
        let utc_offset = UTCOffset::new((seconds / 60) as i16);
        let naive = datetime.naive_local();
        let millisecond = (naive.nanosecond() / 1_000_000).min(999) as u16;
        Self { timestamp: naive.into(), millisecond, utc_offset }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_timestamp_layout() {
        let timestamp = Timestamp::new(2024, 3, 15, 13, 45, 31);
        assert_eq!(timestamp.year(), 2024);
        assert_eq!(timestamp.second(), 30);
        assert_eq!(timestamp.date(), ((2024 - 1980) << 9 | 3 << 5 | 15) as u16);
        assert_eq!(timestamp.time(), (13 << 11 | 45 << 5 | 15) as u16);
        assert_eq!(DateTime::FIXED.timestamp, Timestamp::new(2024, 1, 1, 0, 0, 0));
    }

    #[test]
    fn test_utc_offset() {
        assert_eq!(UTCOffset::new(-480).minutes(), -480);
        assert_eq!(UTCOffset::new(330).minutes(), 330);
        assert_eq!(UTCOffset::default().minutes(), 0);
    }
}
