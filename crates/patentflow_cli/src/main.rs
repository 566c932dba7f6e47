//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `patentflow_core` linkage.
//! - Report the schema version of a store, migrating it on open.
//!
//! Usage: `patentflow_cli [DB_PATH]`. Without a path an in-memory store is
//! probed.

use patentflow_core::db::{latest_version, open_db, open_db_in_memory, schema_version};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("patentflow_core ping={}", patentflow_core::ping());
    println!("patentflow_core version={}", patentflow_core::core_version());
    println!("patentflow_core latest_schema={}", latest_version());

    let opened = match std::env::args().nth(1) {
        Some(path) => open_db(path),
        None => open_db_in_memory(),
    };
    let version = opened.and_then(|conn| schema_version(&conn));

    match version {
        Ok(version) => {
            println!("patentflow_core store_schema={version}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("patentflow_core store_error={err}");
            ExitCode::FAILURE
        }
    }
}
