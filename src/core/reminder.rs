//! Daily reminder to record transactions.
//!
//! Fires at most once per local calendar day, once the configured time of day has
//! passed. The day it last fired is kept in the `system_state` table so restarts do not
//! repeat it. Budget alerts neither suppress nor trigger it.

use super::monitor::{Alert, Notifier};
use crate::{
    errors::{Error, Result},
    store::RecordStore,
};
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone};
use std::sync::Arc;
use tracing::{debug, error, info};

const LAST_DAILY_REMINDER_KEY: &str = "last_daily_reminder";

/// Sends [`Alert::DailyReminder`] once a day.
#[derive(Clone)]
pub struct DailyReminder {
    store: RecordStore,
    notifier: Arc<dyn Notifier>,
    remind_at: NaiveTime,
}

impl DailyReminder {
    /// Creates a reminder that fires once a day after `remind_at`, local time.
    #[must_use]
    pub fn new(store: RecordStore, notifier: Arc<dyn Notifier>, remind_at: NaiveTime) -> Self {
        Self {
            store,
            notifier,
            remind_at,
        }
    }

    /// The local date the reminder last fired, if ever.
    pub async fn last_sent(&self) -> Result<Option<NaiveDate>> {
        match self.store.get_state_value(LAST_DAILY_REMINDER_KEY).await? {
            Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                .map(Some)
                .map_err(|e| Error::Config {
                    message: format!("Failed to parse last reminder date: {e}"),
                }),
            None => Ok(None),
        }
    }

    /// Sends the reminder if `now` is past the reminder time and it has not yet been sent
    /// today. Returns whether it was sent. A failed delivery is logged and retried on the
    /// next call.
    pub async fn run_if_due<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<bool> {
        let local = now.naive_local();
        let today = local.date();
        if local.time() < self.remind_at {
            return Ok(false);
        }
        if self.last_sent().await? == Some(today) {
            debug!("Daily reminder already sent for {}", today);
            return Ok(false);
        }

        if let Err(e) = self.notifier.notify(&Alert::DailyReminder { date: today }) {
            error!("Failed to deliver daily reminder: {}", e);
            return Ok(false);
        }
        self.store
            .set_state_value(LAST_DAILY_REMINDER_KEY, &today.format("%Y-%m-%d").to_string())
            .await?;
        info!("Daily reminder sent for {}", today);
        Ok(true)
    }
}
