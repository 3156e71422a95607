//! Life statistics
//!
//! Pure calculations behind the home and stats views: days alive, remaining
//! years, check-in streaks and the mood chart. Nothing here touches the
//! backend; callers pass in records they already fetched.
//!
//! Functions that depend on the current time come in two forms: an `_at`
//! variant taking "now" explicitly, and a wrapper that uses the local clock.
//! Day boundaries are taken in the time zone of the supplied `now`.

use crate::config::{
    AVG_LIFESPAN_DAYS, AVG_LIFE_EXPECTANCY_YEARS, DEFAULT_AGE_YEARS, DEFAULT_PEER_PERCENTILE,
    MAX_PEER_PERCENTILE, NEUTRAL_MOOD_VALUE,
};
use crate::database::{CheckIn, Mood, MoodKind, WillItem, WillStatus};
use crate::error::{AppError, Result};
use chrono::{DateTime, Datelike, Days, Duration, Local, NaiveDate, TimeZone, Utc, Weekday};
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;
const DAYS_PER_YEAR: f64 = 365.0;

/// Something that happened at a point in time
pub trait Dated {
    fn occurred_at(&self) -> DateTime<Utc>;
}

impl Dated for CheckIn {
    fn occurred_at(&self) -> DateTime<Utc> {
        self.checked_at
    }
}

impl Dated for Mood {
    fn occurred_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

impl Dated for DateTime<Utc> {
    fn occurred_at(&self) -> DateTime<Utc> {
        *self
    }
}

/// Parse a stored birthday: `YYYY-MM-DD` (midnight UTC) or RFC 3339.
pub fn parse_birthday(text: &str) -> Result<DateTime<Utc>> {
    let text = text.trim();

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }

    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| AppError::InvalidDate(text.to_string()))
}

/// Days since birth, rounded up to whole days.
///
/// The distance is absolute, so a birthday in the future counts the days
/// until it instead of going negative. With no birthday the user is assumed
/// to be 34.
pub fn days_alive_at(birthday: Option<&str>, now: DateTime<Utc>) -> Result<i64> {
    let Some(text) = birthday.filter(|b| !b.trim().is_empty()) else {
        return Ok(DEFAULT_AGE_YEARS * 365);
    };

    let born = parse_birthday(text)?;
    let millis = (now - born).num_milliseconds().abs();

    Ok((millis + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY)
}

pub fn days_alive(birthday: Option<&str>) -> Result<i64> {
    days_alive_at(birthday, Utc::now())
}

/// Expected years left, never below zero
pub fn remaining_years(days_alive: i64, avg_life_expectancy_years: f64) -> i64 {
    let age_years = days_alive as f64 / DAYS_PER_YEAR;
    (avg_life_expectancy_years - age_years).round().max(0.0) as i64
}

/// Cosmetic "you've outlived N% of your peers" figure.
///
/// `50 + age / 2` plus up to ten points of jitter, capped at 99. Not a
/// statistic; do not use it for anything but display.
pub fn peer_percentile_with<R: Rng + ?Sized>(age_years: f64, rng: &mut R) -> u8 {
    let jitter: f64 = rng.gen_range(0.0..10.0);
    let value = (50.0 + age_years.max(0.0) / 2.0 + jitter).round();
    value.clamp(0.0, MAX_PEER_PERCENTILE as f64) as u8
}

pub fn peer_percentile(age_years: f64) -> u8 {
    peer_percentile_with(age_years, &mut rand::thread_rng())
}

/// Headline numbers for the home view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LifeStats {
    pub days_alive: i64,
    pub remaining_years: i64,
    pub peer_percentile: u8,
}

pub fn life_stats_at<R: Rng + ?Sized>(
    birthday: Option<&str>,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Result<LifeStats> {
    let days_alive = days_alive_at(birthday, now)?;
    let remaining_years = remaining_years(days_alive, AVG_LIFE_EXPECTANCY_YEARS);

    let has_birthday = birthday.is_some_and(|b| !b.trim().is_empty());
    let peer_percentile = if has_birthday {
        peer_percentile_with(days_alive as f64 / DAYS_PER_YEAR, rng)
    } else {
        DEFAULT_PEER_PERCENTILE
    };

    Ok(LifeStats {
        days_alive,
        remaining_years,
        peer_percentile,
    })
}

pub fn life_stats(birthday: Option<&str>) -> Result<LifeStats> {
    life_stats_at(birthday, Utc::now(), &mut rand::thread_rng())
}

/// Lived vs. remaining days for the life grid
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LifeProgress {
    pub days_alive: i64,
    pub remaining_days: i64,
    /// Share of an average lifespan already lived, 0-100
    pub percent_lived: f64,
}

pub fn life_progress(days_alive: i64) -> LifeProgress {
    let days_alive = days_alive.max(0);
    let remaining_days = (AVG_LIFESPAN_DAYS - days_alive).max(0);
    let total = days_alive + remaining_days;

    let percent_lived = if total == 0 {
        0.0
    } else {
        days_alive as f64 / total as f64 * 100.0
    };

    LifeProgress {
        days_alive,
        remaining_days,
        percent_lived,
    }
}

/// Consecutive days with a check-in, ending today.
///
/// Events are bucketed into calendar days in `now`'s time zone. Counting
/// walks back from today and stops at the first day without a check-in, so
/// a missing check-in today yields 0.
pub fn check_in_streak_at<T, Tz>(history: &[T], now: &DateTime<Tz>) -> u32
where
    T: Dated,
    Tz: TimeZone,
{
    let tz = now.timezone();
    let days: HashSet<NaiveDate> = history
        .iter()
        .map(|event| event.occurred_at().with_timezone(&tz).date_naive())
        .collect();

    let mut streak = 0;
    let mut day = now.date_naive();
    while days.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }

    streak
}

pub fn check_in_streak<T: Dated>(history: &[T]) -> u32 {
    check_in_streak_at(history, &Local::now())
}

/// One point of the mood chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoodPoint {
    /// Short weekday label, `Sun`..`Sat`
    pub day: &'static str,
    /// 0-100
    pub value: u8,
}

fn weekday_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "Sun",
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
    }
}

fn window_out_of_range(days: u32) -> AppError {
    AppError::Validation(format!("a window of {} days reaches past the calendar", days))
}

/// Start of the look-back window of `days` days ending at `now`
pub fn window_start(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    Duration::try_days(i64::from(days))
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(|| window_out_of_range(days))
}

/// Mood chart series covering the last `window_days` days.
///
/// Recorded moods are averaged per weekday; each day of the window takes the
/// average of its weekday, or the neutral value when that weekday has no
/// data. The series always has `window_days` points, oldest first. The
/// caller is expected to pass moods from the same window.
pub fn mood_stats_at<Tz: TimeZone>(
    history: &[Mood],
    window_days: u32,
    now: &DateTime<Tz>,
) -> Result<Vec<MoodPoint>> {
    let tz = now.timezone();

    let mut totals: HashMap<Weekday, (u32, u32)> = HashMap::new();
    for mood in history {
        let weekday = mood.recorded_at.with_timezone(&tz).weekday();
        let entry = totals.entry(weekday).or_insert((0, 0));
        entry.0 += u32::from(mood.mood.score());
        entry.1 += 1;
    }

    let today = now.date_naive();
    (0..window_days)
        .rev()
        .map(|offset| {
            let weekday = today
                .checked_sub_days(Days::new(u64::from(offset)))
                .ok_or_else(|| window_out_of_range(window_days))?
                .weekday();
            let value = match totals.get(&weekday) {
                Some(&(total, count)) if count > 0 => {
                    (f64::from(total) / f64::from(count)).round() as u8
                }
                _ => NEUTRAL_MOOD_VALUE,
            };

            Ok(MoodPoint {
                day: weekday_label(weekday),
                value,
            })
        })
        .collect()
}

pub fn mood_stats(history: &[Mood], window_days: u32) -> Result<Vec<MoodPoint>> {
    mood_stats_at(history, window_days, &Local::now())
}

/// Most frequently recorded mood.
///
/// Ties go to the mood declared first in [`MoodKind`]; callers should not
/// depend on which of the tied moods wins.
pub fn dominant_mood(history: &[Mood]) -> Option<MoodKind> {
    let mut counts: BTreeMap<MoodKind, usize> = BTreeMap::new();
    for mood in history {
        *counts.entry(mood.mood).or_default() += 1;
    }

    let best = counts.values().copied().max()?;
    counts
        .into_iter()
        .find(|&(_, count)| count == best)
        .map(|(kind, _)| kind)
}

/// Will items by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WillSummary {
    pub total: usize,
    pub ready: usize,
    pub draft: usize,
    pub unconfigured: usize,
}

pub fn will_summary(items: &[WillItem]) -> WillSummary {
    items.iter().fold(
        WillSummary {
            total: items.len(),
            ..Default::default()
        },
        |mut summary, item| {
            match item.status {
                WillStatus::Ready => summary.ready += 1,
                WillStatus::Draft => summary.draft += 1,
                WillStatus::Unconfigured => summary.unconfigured += 1,
            }
            summary
        },
    )
}
