//! Migrates book files to the canonical field names.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pulpit_backend::library::normalize::normalize_dir;
use pulpit_backend::logging;

#[derive(Parser, Debug)]
#[command(name = "library-normalize")]
#[command(about = "Rename legacy fields and fix trap lists in practice books")]
#[command(version)]
struct Args {
    /// Directory holding the book files
    #[arg(env = "DATA_DIR", default_value = "assets/bible_data")]
    data_dir: PathBuf,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let args = Args::parse();
    logging::init_cli_tracing(args.verbose);

    let report = match normalize_dir(&args.data_dir, args.dry_run) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "normalization failed");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        fixed = report.fixed.len(),
        unchanged = report.unchanged.len(),
        errors = report.errors.len(),
        items = report.items_touched,
        dry_run = args.dry_run,
        "normalization finished"
    );
    for (file, error) in &report.errors {
        tracing::warn!(file = %file, error = %error, "file left as is");
    }

    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
