//! bankcore - batch runner
//!
//! ```text
//! ┌──────────┐    ┌──────────┐    ┌──────────────┐    ┌──────────┐
//! │  Config  │───▶│ Register │───▶│ Process NEW  │───▶│  Output  │
//! │(YAML+CSV)│    │(validate)│    │(lock+execute)│    │  (CSV)   │
//! └──────────┘    └──────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Flags: `--env/-e <name>` (default `dev`), `--input <dir>`,
//! `--output <dir>`, `--parallel`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use bankcore::config::AppConfig;
use bankcore::csv_io::{
    ACCOUNTS_CSV, BALANCES_FINAL_CSV, IBAN_TRANSFERS_CSV, TRANSACTIONS_CSV,
    TRANSACTIONS_FINAL_CSV, dump_balances, dump_transactions, load_accounts, load_iban_transfers,
    load_transactions,
};
use bankcore::{
    BatchReport, InMemoryAccountStore, InMemoryTransactionRepository, LockStatsSnapshot,
    TransactionService,
};

// ============================================================
// ARGUMENTS
// ============================================================

fn arg_value(names: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1).cloned())
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn use_parallel_mode() -> bool {
    std::env::args().any(|a| a == "--parallel")
}

// ============================================================
// SUMMARY
// ============================================================

#[derive(Debug, Serialize)]
struct RunSummary {
    env: String,
    accounts: usize,
    registered: usize,
    rejected: usize,
    batch: BatchReport,
    locks: LockStatsSnapshot,
    total_balance: String,
    elapsed_ms: u64,
}

// ============================================================
// MAIN
// ============================================================

fn main() -> Result<()> {
    let env = get_env();
    let app_config = AppConfig::load(&env)?;
    let _log_guard = bankcore::logging::init_logging(&app_config);

    let input_dir = PathBuf::from(
        arg_value(&["--input"]).unwrap_or_else(|| app_config.fixtures.input_dir.clone()),
    );
    let output_dir = PathBuf::from(
        arg_value(&["--output"]).unwrap_or_else(|| app_config.fixtures.output_dir.clone()),
    );

    info!(env = %env, input = %input_dir.display(), output = %output_dir.display(), "Starting bankcore");
    let start_time = Instant::now();

    // Step 1: Load accounts
    let accounts = load_accounts(&input_dir.join(ACCOUNTS_CSV))?;
    let account_count = accounts.len();
    let store = Arc::new(InMemoryAccountStore::with_accounts(accounts));
    let repo = Arc::new(InMemoryTransactionRepository::new());

    let service = TransactionService::new(
        store.clone(),
        repo,
        app_config.locking_config(),
        app_config.engine.clone(),
    )
    .context("Failed to initialise transaction service")?;

    // Step 2: Register transactions
    let mut registered = 0usize;
    let mut rejected = 0usize;
    for (row, tx) in load_transactions(&input_dir.join(TRANSACTIONS_CSV))?
        .into_iter()
        .enumerate()
    {
        match service.register_transaction(tx) {
            Ok(_) => registered += 1,
            Err(e) => {
                rejected += 1;
                warn!(row = row + 1, code = e.code(), error = %e, "Transaction rejected at registration");
            }
        }
    }

    for (row, transfer) in load_iban_transfers(&input_dir.join(IBAN_TRANSFERS_CSV))?
        .into_iter()
        .enumerate()
    {
        match service.register_iban_transfer(
            &transfer.source_iban,
            &transfer.destination_iban,
            transfer.amount,
            &transfer.title,
        ) {
            Ok(out) => registered += 1 + usize::from(out.fee.is_some()),
            Err(e) => {
                rejected += 1;
                warn!(row = row + 1, code = e.code(), error = %e, "IBAN transfer rejected at registration");
            }
        }
    }

    // Step 3: Process
    let batch = if use_parallel_mode() {
        service.process_all_new_parallel(service.config().worker_threads)?
    } else {
        service.process_all_new()?
    };

    // Step 4: Output
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    dump_balances(&store.all(), &output_dir.join(BALANCES_FINAL_CSV))?;
    dump_transactions(
        &service.all_transactions()?,
        &output_dir.join(TRANSACTIONS_FINAL_CSV),
    )?;

    let summary = RunSummary {
        env,
        accounts: account_count,
        registered,
        rejected,
        batch,
        locks: service.lock_stats(),
        total_balance: store.total_balance().to_string(),
        elapsed_ms: start_time.elapsed().as_millis() as u64,
    };
    info!(
        batch = %summary.batch,
        locks = %summary.locks,
        "Run complete"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
