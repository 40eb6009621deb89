//! Budget monitor - decides when a budget alert is warranted.
//!
//! Each evaluation reads the budget for the *current* month (never the month a screen
//! happens to display), sums that month's expenses and classifies the percentage
//! consumed. An alert goes out only on a crossing event: the first time a month reaches
//! `NearThreshold`, or climbs from a lower state to `OverThreshold`. Re-evaluating
//! without a qualitative change stays silent. Dropping back below a threshold re-arms it.
//!
//! Evaluation never fails loudly: a missing budget means `NoBudgetSet`, and a store read
//! failure is logged and produces no alert.

use super::window::MonthWindow;
use crate::{
    config::MonitorConfig,
    errors::Result,
    store::{EntityKind, RecordStore},
};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

/// Qualitative budget state for one month. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BudgetState {
    /// No budget row for the month, or its amount is not positive
    NoBudgetSet,
    /// Below the near threshold
    UnderThreshold,
    /// At or above the near threshold, below the over threshold
    NearThreshold,
    /// At or above the over threshold
    OverThreshold,
}

impl BudgetState {
    /// Whether this state warrants an alert when first reached.
    #[must_use]
    pub const fn is_alerting(self) -> bool {
        matches!(self, Self::NearThreshold | Self::OverThreshold)
    }
}

/// Percentage boundaries between states.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Percentage at which spending is "near" the budget
    pub near_percent: f64,
    /// Percentage at which spending is "over" the budget
    pub over_percent: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            near_percent: 80.0,
            over_percent: 100.0,
        }
    }
}

impl From<&MonitorConfig> for Thresholds {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            near_percent: config.near_threshold_percent,
            over_percent: config.over_threshold_percent,
        }
    }
}

impl Thresholds {
    /// Maps a percentage of budget consumed onto a state.
    #[must_use]
    pub fn classify(&self, percentage: f64) -> BudgetState {
        if percentage >= self.over_percent {
            BudgetState::OverThreshold
        } else if percentage >= self.near_percent {
            BudgetState::NearThreshold
        } else {
            BudgetState::UnderThreshold
        }
    }
}

/// Result of one evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetStatus {
    /// The month evaluated
    pub window: MonthWindow,
    /// Qualitative state
    pub state: BudgetState,
    /// Expenses recorded in the month
    pub spent: f64,
    /// The month's budget, when one is set
    pub budget: Option<f64>,
    /// `spent / budget * 100`, when a positive budget is set
    pub percentage: Option<f64>,
}

/// A user-facing alert handed to the [`Notifier`].
#[derive(Debug, Clone, PartialEq)]
pub enum Alert {
    /// Spending reached the near threshold
    BudgetNear {
        /// Month, 1 = January
        month: u32,
        /// Year
        year: i32,
        /// Percentage of the budget consumed
        percentage: f64,
    },
    /// Spending reached the over threshold
    BudgetExceeded {
        /// Month, 1 = January
        month: u32,
        /// Year
        year: i32,
        /// Percentage of the budget consumed
        percentage: f64,
    },
    /// The once-a-day nudge to record the day's transactions
    DailyReminder {
        /// Day the reminder is for
        date: NaiveDate,
    },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BudgetNear {
                month,
                year,
                percentage,
            } => write!(
                f,
                "Budget warning: {percentage:.1}% of the {month:02}/{year} budget used"
            ),
            Self::BudgetExceeded {
                month,
                year,
                percentage,
            } => write!(
                f,
                "Budget exceeded: {percentage:.1}% of the {month:02}/{year} budget used"
            ),
            Self::DailyReminder { date } => {
                write!(f, "Don't forget to record today's transactions ({date})")
            }
        }
    }
}

/// The alerting collaborator. Delivery and platform permissions are its business; the
/// monitor only decides *whether* to alert.
pub trait Notifier: Send + Sync {
    /// Delivers one alert.
    fn notify(&self, alert: &Alert) -> Result<()>;
}

/// Default notifier: writes alerts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, alert: &Alert) -> Result<()> {
        info!(alert = ?alert, "{}", alert);
        Ok(())
    }
}

/// One evaluation's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// State computed from the store
    pub status: BudgetStatus,
    /// The alert raised by this evaluation, if it was a crossing event
    pub alert: Option<Alert>,
}

/// Evaluates spending against the current month's budget.
#[derive(Clone)]
pub struct BudgetMonitor {
    store: RecordStore,
    notifier: Arc<dyn Notifier>,
    thresholds: Thresholds,
    // Last state seen per (month, year); held for the whole evaluation so evaluations
    // are serialized.
    last_states: Arc<Mutex<HashMap<(i32, i32), BudgetState>>>,
}

impl fmt::Debug for BudgetMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetMonitor")
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl BudgetMonitor {
    /// Creates a monitor with no alert history.
    #[must_use]
    pub fn new(store: RecordStore, notifier: Arc<dyn Notifier>, thresholds: Thresholds) -> Self {
        Self {
            store,
            notifier,
            thresholds,
            last_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Computes the month's status without touching alert history.
    pub async fn status_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<BudgetStatus> {
        let window = MonthWindow::containing(now);
        let (month, year) = window.budget_key();
        let budget = self.store.get_budget(month, year).await?;
        let spent = self
            .store
            .sum_expenses(window.start_ms, window.end_ms)
            .await?;

        let budget_amount = budget.map(|b| b.amount);
        let (state, percentage) = match budget_amount {
            Some(amount) if amount > 0.0 => {
                let percentage = spent / amount * 100.0;
                (self.thresholds.classify(percentage), Some(percentage))
            }
            _ => (BudgetState::NoBudgetSet, None),
        };

        Ok(BudgetStatus {
            window,
            state,
            spent,
            budget: budget_amount,
            percentage,
        })
    }

    /// Evaluates the month containing `now` and raises an alert on a crossing event.
    /// Returns `None` when the store could not be read.
    #[instrument(skip(self, now))]
    pub async fn evaluate_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<Evaluation> {
        let mut last_states = self.last_states.lock().await;

        let status = match self.status_at(now).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Budget evaluation skipped, store read failed: {}", e);
                return None;
            }
        };

        let key = status.window.budget_key();
        let previous = last_states.insert(key, status.state);
        let crossed =
            status.state.is_alerting() && previous.is_none_or(|previous| previous < status.state);

        let alert = if crossed {
            let alert = budget_alert(&status);
            if let Some(alert) = &alert {
                if let Err(e) = self.notifier.notify(alert) {
                    error!("Failed to deliver budget alert: {}", e);
                }
            }
            alert
        } else {
            None
        };

        debug!(
            state = ?status.state,
            previous = ?previous,
            spent = status.spent,
            alerted = alert.is_some(),
            "Budget evaluated"
        );
        Some(Evaluation { status, alert })
    }

    /// Evaluates the current local month.
    pub async fn evaluate(&self) -> Option<Evaluation> {
        self.evaluate_at(&Local::now()).await
    }

    /// Re-evaluation when the host application comes to the foreground.
    pub async fn on_foreground(&self) -> Option<Evaluation> {
        self.evaluate().await
    }

    /// Spawns a task that re-evaluates after every committed transaction or budget write.
    pub fn spawn_watcher(&self) -> JoinHandle<()> {
        let monitor = self.clone();
        let mut changes = self.store.changes();
        tokio::spawn(async move {
            let watched = [EntityKind::Transactions, EntityKind::Budgets];
            let mut seen = *changes.borrow_and_update();
            while changes.changed().await.is_ok() {
                let current = *changes.borrow_and_update();
                if current.changed_since(&seen, &watched) {
                    seen = current;
                    monitor.evaluate().await;
                }
            }
        })
    }
}

fn budget_alert(status: &BudgetStatus) -> Option<Alert> {
    let percentage = status.percentage?;
    let (month, year) = (status.window.month, status.window.year);
    match status.state {
        BudgetState::NearThreshold => Some(Alert::BudgetNear {
            month,
            year,
            percentage,
        }),
        BudgetState::OverThreshold => Some(Alert::BudgetExceeded {
            month,
            year,
            percentage,
        }),
        BudgetState::NoBudgetSet | BudgetState::UnderThreshold => None,
    }
}
