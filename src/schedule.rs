//! Cron-driven cache refresh.
//!
//! Expressions use the standard 5-field syntax (minute, hour, day-of-month,
//! month, day-of-week, Sunday = 0 or 7).  The `L`, `W` and `#` extensions
//! are rejected by [`validate`].
//!
//! [`ScheduleController::reconcile`] runs on every lookup.  It owns the one
//! background job and replaces it when the desired expression changes.
//! Aborting a job only stops future ticks; a refresh already started by a
//! tick runs in its own task and is left to finish.  A tick that fires while
//! a pass is still running is skipped.

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use regex::Regex;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::error::ValidationError;
use crate::refresh::Refresher;

/// Option key the cron expression is configured under.
pub const UPDATE_CRON_FIELD: &str = "updateCron";

/// Runs once a day at midnight.
pub const DEFAULT_UPDATE_CRON: &str = "0 0 * * *";

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

fn unsupported_modifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\d*(L|W|LW)(-\d+)?$").expect("unsupported modifier pattern is valid")
    })
}

/// Check a cron expression, returning one entry per problem found.
pub fn validate(expression: &str) -> Vec<ValidationError> {
    match CronSchedule::parse(expression) {
        Ok(_) => Vec::new(),
        Err(errors) => errors,
    }
}

/// A parsed 5-field cron expression.
///
/// When both day-of-month and day-of-week are restricted a day matches if
/// either field matches, as in standard cron.  The `cron` crate requires
/// both, so that case is held as two schedules and the earlier trigger wins.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    schedules: Vec<cron::Schedule>,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self, Vec<ValidationError>> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(vec![ValidationError::new(
                UPDATE_CRON_FIELD,
                format!(
                    "expected 5 fields (minute hour day-of-month month day-of-week), found {}",
                    fields.len()
                ),
            )]);
        }

        let mut errors = Vec::new();
        for item in fields[2].split(',').chain(fields[4].split(',')) {
            if unsupported_modifier().is_match(item) {
                errors.push(ValidationError::new(
                    UPDATE_CRON_FIELD,
                    format!(
                        "`{}`: W (nearest weekday) and L (last day of month/week) are not supported",
                        item
                    ),
                ));
            }
        }
        if fields[4].contains('#') {
            errors.push(ValidationError::new(
                UPDATE_CRON_FIELD,
                format!("`{}`: nth weekday (#) is not supported", fields[4]),
            ));
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let day_of_week = translate_day_of_week(fields[4]);
        let day_fields = if is_restricted(fields[2]) && is_restricted(fields[4]) {
            vec![(fields[2], "*".to_string()), ("*", day_of_week)]
        } else {
            vec![(fields[2], day_of_week)]
        };

        let mut schedules = Vec::with_capacity(day_fields.len());
        for (day_of_month, day_of_week) in day_fields {
            let translated = format!(
                "0 {} {} {} {} {}",
                fields[0], fields[1], day_of_month, fields[3], day_of_week
            );
            let schedule = cron::Schedule::from_str(&translated).map_err(|e| {
                vec![ValidationError::new(
                    UPDATE_CRON_FIELD,
                    format!("invalid cron expression `{}`: {}", expression, e),
                )]
            })?;
            schedules.push(schedule);
        }

        Ok(Self {
            expression: fields.join(" "),
            schedules,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First trigger strictly after `after`.
    pub fn next_after(&self, after: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedules
            .iter()
            .filter_map(|schedule| schedule.after(after).next())
            .min()
    }
}

/// Rewrite numeric days (0-7, Sunday = 0 or 7) as names, since the cron
/// crate numbers days 1-7 from Sunday.
fn translate_day_of_week(field: &str) -> String {
    let mut out = Vec::new();
    for item in field.split(',') {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => (range, Some(step)),
            None => (item, None),
        };
        let suffix = step.map(|s| format!("/{}", s)).unwrap_or_default();

        match range.split_once('-') {
            Some((start, end)) => match (day_number(start), day_number(end)) {
                (Some(0), Some(7)) => out.push(format!("*{}", suffix)),
                (Some(7), Some(7)) => out.push(DAY_NAMES[0].to_string()),
                (Some(start), Some(7)) => {
                    if start == 6 {
                        out.push(DAY_NAMES[6].to_string());
                    } else {
                        out.push(format!("{}-SAT{}", DAY_NAMES[start as usize], suffix));
                    }
                    let stride = step.and_then(|s| s.parse::<u8>().ok()).unwrap_or(1).max(1);
                    if (7 - start) % stride == 0 {
                        out.push(DAY_NAMES[0].to_string());
                    }
                }
                (Some(start), Some(end)) if start % 7 == end % 7 => {
                    out.push(DAY_NAMES[(start % 7) as usize].to_string())
                }
                (Some(start), Some(end)) => out.push(format!(
                    "{}-{}{}",
                    DAY_NAMES[(start % 7) as usize],
                    DAY_NAMES[(end % 7) as usize],
                    suffix
                )),
                _ => out.push(item.to_string()),
            },
            None => match day_number(range) {
                Some(day) => out.push(format!("{}{}", DAY_NAMES[(day % 7) as usize], suffix)),
                None => out.push(item.to_string()),
            },
        }
    }
    out.join(",")
}

fn is_restricted(field: &str) -> bool {
    !field.starts_with('*')
}

fn day_number(value: &str) -> Option<u8> {
    value.parse::<u8>().ok().filter(|d| *d <= 7)
}

struct ScheduledJob {
    expression: String,
    handle: JoinHandle<()>,
}

enum JobState {
    Unscheduled,
    Scheduled(ScheduledJob),
}

struct ScheduleState {
    active_expression: Option<String>,
    job: JobState,
}

/// Counters of job transitions, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleStats {
    pub jobs_created: usize,
    pub jobs_cancelled: usize,
}

pub struct ScheduleController {
    refresher: Arc<Refresher>,
    state: Mutex<ScheduleState>,
    jobs_created: AtomicUsize,
    jobs_cancelled: AtomicUsize,
}

impl ScheduleController {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self {
            refresher,
            state: Mutex::new(ScheduleState {
                active_expression: None,
                job: JobState::Unscheduled,
            }),
            jobs_created: AtomicUsize::new(0),
            jobs_cancelled: AtomicUsize::new(0),
        }
    }

    /// Bring the running job in line with `desired`.
    ///
    /// The expression is expected to have passed [`validate`]; one that does
    /// not parse leaves the controller unscheduled and is retried on the next
    /// call.
    pub async fn reconcile(&self, desired: &str) {
        let mut state = self.state.lock().await;

        let stale = matches!(&state.job, JobState::Scheduled(job) if job.expression != desired);
        if stale {
            if let JobState::Scheduled(job) =
                std::mem::replace(&mut state.job, JobState::Unscheduled)
            {
                info!(
                    "Cache update schedule changed from `{}` to `{}`",
                    job.expression, desired
                );
                job.handle.abort();
                self.jobs_cancelled.fetch_add(1, Ordering::SeqCst);
            }
        }

        if matches!(state.job, JobState::Unscheduled) {
            match CronSchedule::parse(desired) {
                Ok(schedule) => {
                    info!("Scheduling instance cache update with cron `{}`", desired);
                    state.job = JobState::Scheduled(ScheduledJob {
                        expression: desired.to_string(),
                        handle: self.spawn_job(schedule),
                    });
                    self.jobs_created.fetch_add(1, Ordering::SeqCst);
                }
                Err(errors) => {
                    for e in &errors {
                        warn!("Not scheduling cache update: {}", e);
                    }
                }
            }
        }

        state.active_expression = Some(desired.to_string());
    }

    fn spawn_job(&self, schedule: CronSchedule) -> JoinHandle<()> {
        let refresher = Arc::clone(&self.refresher);
        tokio::spawn(async move {
            let mut after = Utc::now();
            loop {
                let Some(next) = schedule.next_after(&after) else {
                    warn!("Cron `{}` has no upcoming trigger", schedule.expression());
                    return;
                };
                debug!("Next instance cache update at {}", next);
                sleep((next - Utc::now()).to_std().unwrap_or_default()).await;
                after = next;

                let refresher = Arc::clone(&refresher);
                tokio::spawn(async move {
                    refresher.refresh_if_idle().await;
                });
            }
        })
    }

    /// Expression recorded by the last [`reconcile`](Self::reconcile).
    pub async fn active_expression(&self) -> Option<String> {
        self.state.lock().await.active_expression.clone()
    }

    /// Expression the live job was created with, if one is running.
    pub async fn scheduled_expression(&self) -> Option<String> {
        match &self.state.lock().await.job {
            JobState::Scheduled(job) => Some(job.expression.clone()),
            JobState::Unscheduled => None,
        }
    }

    pub fn stats(&self) -> ScheduleStats {
        ScheduleStats {
            jobs_created: self.jobs_created.load(Ordering::SeqCst),
            jobs_cancelled: self.jobs_cancelled.load(Ordering::SeqCst),
        }
    }

    /// Cancel the live job, if any.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        if let JobState::Scheduled(job) = std::mem::replace(&mut state.job, JobState::Unscheduled)
        {
            job.handle.abort();
            self.jobs_cancelled.fetch_add(1, Ordering::SeqCst);
            info!("Cancelled instance cache update job `{}`", job.expression);
        }
    }
}

impl Drop for ScheduleController {
    fn drop(&mut self) {
        if let JobState::Scheduled(job) = &self.state.get_mut().job {
            job.handle.abort();
        }
    }
}
