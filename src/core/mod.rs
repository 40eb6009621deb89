//! Derived views and policies built on top of the record store.
//!
//! Nothing in here owns persisted data: every value is recomputed from the store.

/// Category breakdowns, summaries and filtered lists over a monthly window
pub mod aggregate;
/// JSON backup and restore of the transaction set
pub mod backup;
/// Budget threshold evaluation and alert de-duplication
pub mod monitor;
/// Once-a-day reminder, independent of budget alerts
pub mod reminder;
/// Calendar month windows in a caller-chosen time zone
pub mod window;

pub use aggregate::{MonthlySummary, TransactionFilter};
pub use monitor::{Alert, BudgetMonitor, BudgetState, BudgetStatus, Notifier, TracingNotifier};
pub use window::MonthWindow;
