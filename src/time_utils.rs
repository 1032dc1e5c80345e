use chrono::{DateTime, Datelike, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};

/// The wall clock reports are written against.
///
/// Day boundaries, rendered times and the working window are all computed in
/// this zone. `Local` follows the host; `Fixed` pins an explicit UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Local,
    Fixed(FixedOffset),
}

impl Zone {
    /// Build a zone from an optional offset in minutes east of UTC.
    /// Returns `None` when the offset is out of range.
    pub fn from_offset_minutes(minutes: Option<i32>) -> Option<Self> {
        match minutes {
            None => Some(Zone::Local),
            Some(m) => FixedOffset::east_opt(m.checked_mul(60)?).map(Zone::Fixed),
        }
    }

    pub fn now_unix() -> i64 {
        Utc::now().timestamp()
    }

    /// Epoch seconds of 00:00 on `day` in this zone.
    pub fn midnight(&self, day: NaiveDate) -> i64 {
        let naive = day.and_time(NaiveTime::MIN);
        let resolved = match self {
            Zone::Local => Local.from_local_datetime(&naive).earliest().map(|dt| dt.timestamp()),
            Zone::Fixed(offset) => offset
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.timestamp()),
        };
        // A DST gap swallowing midnight leaves no local instant; fall back to UTC.
        resolved.unwrap_or_else(|| naive.and_utc().timestamp())
    }

    /// `[oldest, latest)` bounds of `day`.
    pub fn day_window(&self, day: NaiveDate) -> (i64, i64) {
        let oldest = self.midnight(day);
        let latest = day
            .succ_opt()
            .map(|next| self.midnight(next))
            .unwrap_or(oldest + 86_400);
        (oldest, latest)
    }

    fn wall_clock(&self, ts: i64) -> NaiveDateTime {
        let utc = DateTime::<Utc>::from_timestamp(ts, 0).unwrap_or_default();
        match self {
            Zone::Local => utc.with_timezone(&Local).naive_local(),
            Zone::Fixed(offset) => utc.with_timezone(offset).naive_local(),
        }
    }

    pub fn date_of(&self, ts: i64) -> NaiveDate {
        self.wall_clock(ts).date()
    }

    pub fn today(&self) -> NaiveDate {
        self.date_of(Self::now_unix())
    }

    pub fn yesterday(&self) -> NaiveDate {
        let today = self.today();
        today.pred_opt().unwrap_or(today)
    }

    pub fn weekday_and_hour(&self, ts: i64) -> (Weekday, u32) {
        let clock = self.wall_clock(ts);
        (clock.weekday(), clock.hour())
    }

    pub fn format(&self, ts: i64, pattern: &str) -> String {
        self.wall_clock(ts).format(pattern).to_string()
    }
}
