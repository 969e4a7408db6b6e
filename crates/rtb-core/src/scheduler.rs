//! Cron-driven reminder broadcasts.
//!
//! Expressions use the standard 5 fields (`min hour dom mon dow`) with `*`,
//! lists, ranges and steps, and are evaluated in UTC.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, Timelike, Utc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Instrument, Span};

use crate::{reminders::ReminderBroadcaster, Error, Result};

pub struct ReminderScheduler {
    expr: CronExpr,
    broadcaster: Arc<ReminderBroadcaster>,
    span: Span,
}

impl ReminderScheduler {
    pub fn new(expr: CronExpr, broadcaster: Arc<ReminderBroadcaster>, span: Span) -> Self {
        Self {
            expr,
            broadcaster,
            span,
        }
    }

    /// Spawn the schedule loop; it exits once `cancel` fires.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        let span = self.span.clone();
        tokio::spawn(self.run(cancel).instrument(span))
    }

    async fn run(self, cancel: CancellationToken) {
        info!(schedule = %self.expr, "reminder scheduler started");
        loop {
            let now = Utc::now();
            let Some(next) = self.expr.next_after(now) else {
                warn!(schedule = %self.expr, "schedule has no next run, stopping");
                break;
            };
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(wait) => {
                    if let Err(e) = self.broadcaster.broadcast().await {
                        warn!(error = %e, "reminder broadcast failed");
                    }
                }
            }
        }
        info!("reminder scheduler stopped");
    }
}

#[derive(Clone, Debug)]
pub struct CronExpr {
    source: String,
    minute: Field,
    hour: Field,
    dom: Field,
    month: Field,
    dow: Field,
}

#[derive(Clone, Debug)]
struct Field {
    min: u32,
    max: u32,
    /// Every value in `min..=max` is allowed.
    any: bool,
    allowed: Vec<bool>, // index = value
}

impl CronExpr {
    pub fn parse(expr: &str) -> Result<Self> {
        let parts = expr.split_whitespace().collect::<Vec<_>>();
        let [minute, hour, dom, month, dow] = parts[..] else {
            return Err(Error::Config(format!(
                "expected 5 cron fields, got {}",
                parts.len()
            )));
        };

        Ok(Self {
            source: parts.join(" "),
            minute: Field::parse(minute, 0, 59, false)?,
            hour: Field::parse(hour, 0, 23, false)?,
            dom: Field::parse(dom, 1, 31, false)?,
            month: Field::parse(month, 1, 12, false)?,
            dow: Field::parse(dow, 0, 6, true)?,
        })
    }

    pub fn matches(&self, dt: DateTime<Utc>) -> bool {
        if !self.minute.contains(dt.minute())
            || !self.hour.contains(dt.hour())
            || !self.month.contains(dt.month())
        {
            return false;
        }

        // Standard cron semantics: if both DOM and DOW are restricted, match when EITHER matches.
        let dom_match = self.dom.contains(dt.day());
        let dow_match = self.dow.contains(dt.weekday().num_days_from_sunday());
        match (self.dom.any, self.dow.any) {
            (true, true) => true,
            (true, false) => dow_match,
            (false, true) => dom_match,
            (false, false) => dom_match || dow_match,
        }
    }

    /// First matching minute strictly after `now`.
    pub fn next_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut t = (now + chrono::Duration::minutes(1))
            .with_second(0)?
            .with_nanosecond(0)?;

        // Impossible expressions (e.g. Feb 30) would never match; give up after a year.
        for _ in 0..366 * 24 * 60 {
            if self.matches(t) {
                return Some(t);
            }
            t += chrono::Duration::minutes(1);
        }
        None
    }

    /// Short human description for the greeting.
    pub fn describe(&self) -> String {
        let single = |f: &Field| {
            let mut it = (f.min..=f.max).filter(|v| f.contains(*v));
            match (it.next(), it.next()) {
                (Some(v), None) => Some(v),
                _ => None,
            }
        };
        match (single(&self.minute), single(&self.hour)) {
            (Some(m), Some(h)) if self.dom.any && self.month.any && self.dow.any => {
                format!("every day at {h:02}:{m:02} UTC")
            }
            _ => format!("on schedule \"{}\" UTC", self.source),
        }
    }
}

impl std::fmt::Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Field {
    /// `fold_sunday` accepts `7` as an alias of `0` (day-of-week field).
    fn parse(raw: &str, min: u32, max: u32, fold_sunday: bool) -> Result<Self> {
        let upper = if fold_sunday { max + 1 } else { max };
        let mut allowed = vec![false; (upper + 1) as usize];

        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (base, step) = match part.split_once('/') {
                Some((base, step)) => {
                    let step: u32 = step
                        .trim()
                        .parse()
                        .map_err(|_| Error::Config(format!("invalid step: {step}")))?;
                    if step == 0 {
                        return Err(Error::Config("step must be > 0".to_string()));
                    }
                    (base.trim(), step)
                }
                None => (part, 1),
            };

            let (start, end) = if base == "*" {
                (min, max)
            } else if let Some((a, b)) = base.split_once('-') {
                (parse_value(a)?, parse_value(b)?)
            } else {
                let v = parse_value(base)?;
                // `5/15` means "from 5 to the end, every 15".
                (v, if step > 1 { max } else { v })
            };

            if start < min || end > upper || start > end {
                return Err(Error::Config(format!(
                    "value out of range {min}-{upper}: {part}"
                )));
            }

            for v in (start..=end).step_by(step as usize) {
                allowed[v as usize] = true;
            }
        }

        if fold_sunday && allowed[upper as usize] {
            allowed[min as usize] = true;
        }
        allowed.truncate((max + 1) as usize);

        if !allowed.iter().any(|a| *a) {
            return Err(Error::Config(format!("empty cron field: {raw:?}")));
        }
        // Only a bare `*` relaxes the day-of-month / day-of-week rule.
        let any = raw.trim() == "*";

        Ok(Self {
            min,
            max,
            any,
            allowed,
        })
    }

    fn contains(&self, v: u32) -> bool {
        (self.min..=self.max).contains(&v) && self.allowed.get(v as usize).copied().unwrap_or(false)
    }
}

fn parse_value(s: &str) -> Result<u32> {
    s.trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid number: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn daily_reminder_fires_at_five_pm_utc() {
        let expr = CronExpr::parse("0 17 * * *").unwrap();
        assert!(expr.matches(at(2026, 3, 4, 17, 0)));
        assert!(!expr.matches(at(2026, 3, 4, 17, 1)));

        let next = expr.next_after(at(2026, 3, 4, 17, 0)).unwrap();
        assert_eq!(next, at(2026, 3, 5, 17, 0));
        assert_eq!(expr.describe(), "every day at 17:00 UTC");
    }

    #[test]
    fn steps_and_ranges() {
        let expr = CronExpr::parse("*/15 9-10 * * *").unwrap();
        let next = expr.next_after(at(2026, 1, 1, 9, 1)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 9, 15));
        let next = expr.next_after(at(2026, 1, 1, 10, 45)).unwrap();
        assert_eq!(next, at(2026, 1, 2, 9, 0));
        assert!(expr.describe().contains("*/15 9-10 * * *"));
    }

    #[test]
    fn weekday_seven_is_sunday() {
        // 2026-01-04 is a Sunday.
        let expr = CronExpr::parse("0 8 * * 7").unwrap();
        assert!(expr.matches(at(2026, 1, 4, 8, 0)));
        assert!(!expr.matches(at(2026, 1, 5, 8, 0)));

        let weekend = CronExpr::parse("0 8 * * 6-7").unwrap();
        assert!(weekend.matches(at(2026, 1, 3, 8, 0)));
        assert!(weekend.matches(at(2026, 1, 4, 8, 0)));
        assert!(!weekend.matches(at(2026, 1, 5, 8, 0)));
    }

    #[test]
    fn full_range_day_fields_still_count_as_restricted() {
        // 2026-01-05 is a Monday, 2026-01-06 a Tuesday.
        let mondays = CronExpr::parse("0 12 * * 1").unwrap();
        assert!(mondays.matches(at(2026, 1, 5, 12, 0)));
        assert!(!mondays.matches(at(2026, 1, 6, 12, 0)));

        // Both day fields restricted: either one matching is enough.
        let spelled_out = CronExpr::parse("0 12 1-31 * 1").unwrap();
        assert!(spelled_out.matches(at(2026, 1, 6, 12, 0)));
        let first_or_any_weekday = CronExpr::parse("0 12 1 * 0-6").unwrap();
        assert!(first_or_any_weekday.matches(at(2026, 1, 6, 12, 0)));
        assert!(spelled_out.describe().starts_with("on schedule"));
    }

    #[test]
    fn rejects_malformed_expressions() {
        for bad in ["", "0 17 * *", "60 * * * *", "*/0 * * * *", "a * * * *", "5-1 * * * *"] {
            assert!(CronExpr::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn impossible_dates_have_no_next_run() {
        let expr = CronExpr::parse("0 0 30 2 *").unwrap();
        assert!(expr.next_after(at(2026, 1, 1, 0, 0)).is_none());
    }
}
