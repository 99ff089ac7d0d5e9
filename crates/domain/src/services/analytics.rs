//! Pure calculations behind the reporting and capacity monitors.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Base health score before trend, rating and flag adjustments.
pub const BASE_HEALTH_SCORE: f64 = 70.0;

/// Largest bonus a single growth trend can contribute to the health score.
pub const MAX_TREND_BONUS: f64 = 15.0;

/// Rounds to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Period-over-period growth in percent, rounded to two decimals.
///
/// Growth from zero is reported as 100% and zero-to-zero as 0%.
pub fn growth_percentage(previous: i64, current: i64) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    round2((current - previous) as f64 / previous as f64 * 100.0)
}

/// Inputs of the overall health score.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthInputs {
    pub booking_growth: f64,
    pub user_growth: f64,
    pub revenue_growth: f64,
    /// Average review rating for the week; `None` without reviews.
    pub average_rating: Option<f64>,
    pub security_flags: i64,
}

/// Overall marketplace health in `[0, 100]`.
///
/// Each growth trend adds a tenth of its percentage capped at +15 (declines
/// subtract without a floor), each star above 3 adds 5, each security flag
/// subtracts 2. A week without reviews contributes nothing for rating.
pub fn health_score(inputs: &HealthInputs) -> i64 {
    let trend = |growth: f64| (growth / 10.0).min(MAX_TREND_BONUS);

    let mut score = BASE_HEALTH_SCORE;
    score += trend(inputs.booking_growth);
    score += trend(inputs.user_growth);
    score += trend(inputs.revenue_growth);
    if let Some(rating) = inputs.average_rating {
        score += (rating - 3.0) * 5.0;
    }
    score -= inputs.security_flags as f64 * 2.0;

    score.round().clamp(0.0, 100.0) as i64
}

/// The reporting week a moment falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekBoundary {
    /// Local calendar date of the Sunday closing the week.
    pub week_ending: NaiveDate,
    /// Sunday 23:59:59 local time.
    pub end: DateTime<Utc>,
    /// Seven days before `end`.
    pub start: DateTime<Utc>,
}

impl WeekBoundary {
    /// The same boundary one week earlier.
    pub fn previous(&self) -> WeekBoundary {
        WeekBoundary {
            week_ending: self.week_ending - Duration::days(7),
            end: self.start,
            start: self.start - Duration::days(7),
        }
    }
}

/// Week boundary for `now` in `tz`: the coming Sunday at 23:59:59, or today
/// when today is already Sunday.
pub fn week_boundary(now: DateTime<Utc>, tz: Tz) -> WeekBoundary {
    let local_date = now.with_timezone(&tz).date_naive();
    let days_until_sunday = (7 - local_date.weekday().num_days_from_sunday()) % 7;
    let sunday = local_date + Duration::days(days_until_sunday as i64);

    let end_local = sunday.and_time(NaiveTime::MIN) + Duration::seconds(86_399);
    let end = match tz.from_local_datetime(&end_local).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => Utc.from_utc_datetime(&end_local),
    };

    WeekBoundary {
        week_ending: sunday,
        end,
        start: end - Duration::days(7),
    }
}

/// Utilization in percent of the daily capacity of `providers`, each able
/// to take `per_provider_daily` bookings. Zero when there is no capacity.
pub fn utilization_percent(bookings_per_day: f64, providers: i64, per_provider_daily: f64) -> f64 {
    let capacity = providers as f64 * per_provider_daily;
    if capacity <= 0.0 {
        0.0
    } else {
        bookings_per_day / capacity * 100.0
    }
}
