// ─────────────────────────────────────────────────────────────────────
// SCPN Transport — Command-Line Driver
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! `transport CASE.json` runs one case and writes `CASE.npz`,
//! `CASE.json` results next to it (or under `--output`). Log lines go to
//! stderr and to `CASE.log`.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use env_logger::{Builder, Env, Target};
use transport_core::driver::run_case;
use transport_types::error::{TransportError, TransportResult};

#[derive(Parser)]
#[command(name = "transport")]
#[command(about = "Deterministic neutron transport: MoC, Sn and 2D/3D with CMFD")]
#[command(version)]
struct Cli {
    /// Case file (JSON)
    input: PathBuf,

    /// Base path of the result files (default: the case file stem)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of threads (default: all available cores)
    #[arg(short, long)]
    threads: Option<usize>,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

/// Log sink writing every record to stderr and the run's log file.
struct Tee {
    file: Mutex<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        if let Ok(mut file) = self.file.lock() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        if let Ok(mut file) = self.file.lock() {
            file.flush()?;
        }
        Ok(())
    }
}

fn init_logging(input: &Path, verbose: bool) -> TransportResult<()> {
    let level = if verbose { "debug" } else { "info" };
    let log_path = input.with_extension("log");
    let file = File::create(&log_path).map_err(|e| TransportError::file(&log_path, e))?;
    Builder::from_env(Env::default().default_filter_or(level))
        .target(Target::Pipe(Box::new(Tee {
            file: Mutex::new(file),
        })))
        .init();
    Ok(())
}

fn run(cli: &Cli) -> TransportResult<()> {
    init_logging(&cli.input, cli.verbose)?;

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .map_err(|e| TransportError::config(format!("Failed to set thread pool size: {e}")))?;
    }
    log::info!(
        "transport v{} on {} threads",
        env!("CARGO_PKG_VERSION"),
        rayon::current_num_threads()
    );

    let outcome = run_case(&cli.input, cli.output.as_deref())?;
    let s = &outcome.summary;
    match s.k_eff {
        Some(k) => println!(
            "{}: k-eff = {k:.6} after {} outer iterations{}",
            s.case_name,
            s.iterations,
            if s.converged { "" } else { " (not converged)" }
        ),
        None => println!(
            "{}: fixed-source solve finished after {} iterations{}",
            s.case_name,
            s.iterations,
            if s.converged { "" } else { " (not converged)" }
        ),
    }
    println!("Results: {}", outcome.npz_path.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
