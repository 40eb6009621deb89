#![allow(clippy::result_large_err)]

use budget_buddy::{
    config::{self, AppConfig, database::get_database_url},
    core::{
        BudgetMonitor, MonthWindow, Notifier, TracingNotifier, TransactionFilter, aggregate,
        backup, monitor::Thresholds, reminder::DailyReminder,
        window::local_midnight_ms,
    },
    entities::{BudgetModel, TransactionModel},
    errors::Result,
    store::RecordStore,
};
use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "budget-buddy")]
#[command(about = "Local transaction ledger with monthly summaries and budget alerts")]
struct Cli {
    /// Path to config.toml (default: ./config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the budget monitor and daily reminder until interrupted
    Watch,
    /// Evaluate the current month's budget once
    Check,
    /// Print income, expenses and the category breakdown for a month
    Summary {
        /// Month, 1-12 (default: current)
        #[arg(long)]
        month: Option<u32>,
        /// Year (default: current)
        #[arg(long)]
        year: Option<i32>,
        /// all (five most recent), expenses or income
        #[arg(long, default_value = "all")]
        filter: TransactionFilter,
    },
    /// Write every transaction to a JSON backup file
    Export { path: PathBuf },
    /// Merge transactions from a JSON backup file
    Import { path: PathBuf },
    /// Record a transaction
    Add {
        title: String,
        amount: f64,
        #[arg(long, default_value = "Other")]
        category: String,
        /// Record as income instead of an expense
        #[arg(long)]
        income: bool,
        /// Date as YYYY-MM-DD (default: now)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a transaction by id
    Delete { id: String },
    /// Manage monthly budgets
    Budget {
        #[command(subcommand)]
        command: BudgetCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BudgetCommand {
    /// Set (or replace) the budget for a month
    Set {
        amount: f64,
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },
}

fn window_for(month: Option<u32>, year: Option<i32>) -> Result<MonthWindow> {
    let now = Local::now();
    MonthWindow::for_month(
        &Local,
        month.unwrap_or_else(|| now.month()),
        year.unwrap_or_else(|| now.year()),
    )
}

async fn watch(store: RecordStore, app_config: &AppConfig) -> Result<()> {
    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier);
    let monitor = BudgetMonitor::new(
        store.clone(),
        Arc::clone(&notifier),
        Thresholds::from(&app_config.monitor),
    );
    let reminder = DailyReminder::new(store, notifier, app_config.monitor.reminder_time()?);

    let watcher = monitor.spawn_watcher();
    let mut ticker = tokio::time::interval(app_config.monitor.evaluation_interval());
    info!("Watching for budget changes. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                monitor.on_foreground().await;
                if let Err(e) = reminder.run_if_due(&Local::now()).await {
                    warn!("Daily reminder check failed: {}", e);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
        }
    }

    watcher.abort();
    info!("Stopped watching.");
    Ok(())
}

async fn run(command: Command, store: RecordStore, app_config: &AppConfig) -> Result<ExitCode> {
    match command {
        Command::Watch => watch(store, app_config).await?,
        Command::Check => {
            let monitor = BudgetMonitor::new(
                store,
                Arc::new(TracingNotifier),
                Thresholds::from(&app_config.monitor),
            );
            match monitor.evaluate().await {
                Some(evaluation) => {
                    let status = evaluation.status;
                    println!(
                        "{:02}/{}: spent {:.2} of {} {}({:?})",
                        status.window.month,
                        status.window.year,
                        status.spent,
                        status
                            .budget
                            .map_or_else(|| "no budget".to_string(), |b| format!("{b:.2}")),
                        status
                            .percentage
                            .map_or_else(String::new, |p| format!("= {p:.1}% ")),
                        status.state
                    );
                }
                None => {
                    println!("Budget check failed, see log for details");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        Command::Summary {
            month,
            year,
            filter,
        } => {
            let window = window_for(month, year)?;
            let summary = aggregate::monthly_summary(&store, &window).await?;
            println!("{:02}/{}", window.month, window.year);
            println!("  Income:   {:.2}", summary.income);
            println!("  Expenses: {:.2}", summary.expenses);
            println!("  Balance:  {:.2}", summary.balance);

            let mut breakdown: Vec<(String, f64)> = aggregate::category_breakdown(&store, &window)
                .await?
                .into_iter()
                .collect();
            breakdown.sort_by(|a, b| b.1.total_cmp(&a.1));
            for (category, total) in breakdown {
                println!("  {category:<14} {total:.2}");
            }

            let listed = if filter == TransactionFilter::All {
                println!("Recent:");
                aggregate::recent_transactions(&store, &window).await?
            } else {
                println!("{filter:?}:");
                aggregate::filtered_transactions(&store, &window, filter).await?
            };
            for t in listed {
                let sign = if t.is_expense { '-' } else { '+' };
                println!("  {} {}{:.2} {} [{}]", t.id, sign, t.amount, t.title, t.category);
            }
        }
        Command::Export { path } => {
            if backup::backup_to_file(&store, &path).await {
                println!("Backup written to {}", path.display());
            } else {
                println!("Backup failed");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Import { path } => {
            if backup::restore_from_file(&store, &path).await {
                println!("Restored from {}", path.display());
            } else {
                println!("Restore failed");
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Add {
            title,
            amount,
            category,
            income,
            date,
        } => {
            let date = date.map_or_else(
                || Local::now().timestamp_millis(),
                |date| local_midnight_ms(&Local, date),
            );
            let transaction = TransactionModel::new(title, amount, category, date, !income);
            let id = transaction.id.clone();
            if let Err(e) = store.put_transaction(transaction).await {
                println!("Could not save transaction: {e}");
                return Ok(ExitCode::FAILURE);
            }
            println!("Added {id}");
        }
        Command::Delete { id } => match store.delete_transaction(&id).await {
            Ok(true) => println!("Deleted {id}"),
            Ok(false) => println!("No transaction with id {id}"),
            Err(e) => {
                println!("Could not delete transaction: {e}");
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Budget {
            command: BudgetCommand::Set {
                amount,
                month,
                year,
            },
        } => {
            let window = window_for(month, year)?;
            let (month, year) = window.budget_key();
            if let Err(e) = store.put_budget(BudgetModel { month, year, amount }).await {
                println!("Could not save budget: {e}");
                return Ok(ExitCode::FAILURE);
            }
            println!("Budget for {month:02}/{year} set to {amount:.2}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    let cli = Cli::parse();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration(cli.config.as_deref())
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Open the store
    let database_url = get_database_url(app_config.database_url.as_deref());
    let store = RecordStore::open(&database_url)
        .await
        .inspect(|_| info!("Record store opened."))
        .inspect_err(|e| error!("Failed to open record store: {}", e))?;

    // 5. Seed default categories on first run
    store
        .seed_default_categories(&app_config.categories.defaults)
        .await
        .inspect_err(|e| error!("Failed to seed categories: {}", e))?;

    run(cli.command, store, &app_config)
        .await
        .inspect_err(|e| error!("{}", e))
}
