mod commands;
mod logging;
mod reporter;

use std::io::{self, Write};
use std::path::Path;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, Inputs};
use dotenv::dotenv;
use recsync::capture::{ensure_logged_in, CaptureDriver, CurlDownloader, HarBrowser};
use recsync::config::load_configuration;
use recsync::scanner::compile_ignore_patterns;
use recsync::{
    audit, rename, report, AppConfig, DateNormalizer, LoadOptions, RecordLoader, SessionRecord,
};
use reporter::CliReporter;
use tracing::{error, info, warn};

fn main() {
    dotenv().ok();

    let guard = logging::init_logger();

    let args = Cli::parse();

    let mut config = match load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            drop(guard);
            process::exit(1);
        }
    };
    if let Some(year) = args.year {
        config.year = Some(year);
    }

    let result = match args.command {
        Some(Commands::Check { inputs, no_reports }) => run_check(&config, &inputs, no_reports),
        Some(Commands::Download { inputs, har }) => run_download(&config, &inputs, &har),
        Some(Commands::Rename { inputs, dry_run }) => run_rename(&config, &inputs, dry_run),
        Some(Commands::Audit { inputs }) => run_audit(&config, &inputs),
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        drop(guard);
        process::exit(1);
    }
}

fn print_banner(title: &str, inputs: &Inputs) {
    println!("{}", "=".repeat(70));
    println!("{}", title.bold());
    println!("{}", "=".repeat(70));
    println!("CSV: {}", inputs.csv.display());
    println!("Directory: {}", inputs.dir.display());
}

fn load_records(config: &AppConfig, path: &Path, options: LoadOptions) -> Result<Vec<SessionRecord>> {
    let loader = RecordLoader::new(DateNormalizer::from_config(config), options);
    let records = loader
        .load_path(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    info!("Loaded {} sessions from {}", records.len(), path.display());
    Ok(records)
}

fn run_check(config: &AppConfig, inputs: &Inputs, no_reports: bool) -> Result<()> {
    print_banner("RECORDING CHECK", inputs);

    let records = load_records(config, &inputs.csv, LoadOptions::linked())?;
    let ignore = compile_ignore_patterns(&config.ignore_patterns);
    let scan = recsync::scan_media_files(&inputs.dir, &config.media_extension, &ignore)
        .with_context(|| format!("Failed to scan {}", inputs.dir.display()))?;
    info!(
        "Found {} files in {} groups",
        scan.total_files(),
        scan.group_count()
    );

    let result = recsync::reconcile(&records, &scan);
    report::print_summary(&result);

    if no_reports {
        return Ok(());
    }
    let paths = report::write_reports(&result, &inputs.dir).context("Failed to write reports")?;
    for path in [paths.missing_all, paths.missing_pair, paths.orphans]
        .into_iter()
        .flatten()
    {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn run_download(config: &AppConfig, inputs: &Inputs, har: &Path) -> Result<()> {
    print_banner("RECORDING DOWNLOAD", inputs);

    let records = load_records(config, &inputs.csv, LoadOptions::linked())?;
    if records.is_empty() {
        warn!("No sessions with a link in {}", inputs.csv.display());
        return Ok(());
    }

    let mut browser = HarBrowser::open(har)?;
    ensure_logged_in(&mut browser, || {
        println!(
            "Log in to the recording site, export a fresh HAR to {} and confirm.",
            har.display()
        );
        if prompt_confirm("Logged in and exported?", Some(true))? {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::Interrupted, "login aborted"))
        }
    })?;

    let downloader = CurlDownloader::from_config(&config.download);
    let reporter = CliReporter::new();
    let report = CaptureDriver::new(
        &mut browser,
        &downloader,
        &config.download,
        &inputs.dir,
        &config.media_extension,
    )
    .run(&records, &reporter);

    report.print_summary();
    for path in report
        .write_reports(&inputs.dir)
        .context("Failed to write download reports")?
    {
        println!("Saved: {}", path.display());
    }
    Ok(())
}

fn run_rename(config: &AppConfig, inputs: &Inputs, dry_run: bool) -> Result<()> {
    print_banner("BATCH RENAME", inputs);

    let records = load_records(config, &inputs.csv, LoadOptions::positional())?;
    let ignore = compile_ignore_patterns(&config.ignore_patterns);
    let plan = rename::plan_renames(&records, &inputs.dir, &config.media_extension, &ignore)?;
    plan.validate()?;

    for mv in &plan.moves {
        println!(
            "  {} -> {}",
            mv.from.file_name().unwrap_or_default().to_string_lossy(),
            mv.to.file_name().unwrap_or_default().to_string_lossy().green()
        );
    }

    if dry_run {
        println!("Dry run: {} files would be renamed", plan.len());
        return Ok(());
    }
    if !prompt_confirm(&format!("Rename {} files?", plan.len()), Some(false))? {
        bail!("Rename cancelled");
    }
    let renamed = plan.apply()?;
    println!("{} Renamed {} files", "✓".green(), renamed);
    Ok(())
}

fn run_audit(config: &AppConfig, inputs: &Inputs) -> Result<()> {
    print_banner("TRACK AUDIT", inputs);

    let records = load_records(config, &inputs.csv, LoadOptions::positional())?;
    let mismatches = audit::run_audit(&records, &inputs.dir, &config.media_extension)?;

    if mismatches.is_empty() {
        println!("{} All files match", "✓".green());
        return Ok(());
    }
    for mismatch in &mismatches {
        println!("{} [{}]", "✗".red(), mismatch.track);
        println!("    Found:    {}", mismatch.found);
        println!("    Expected: {}", mismatch.expected);
    }
    println!("{} mismatched files", mismatches.len());
    Ok(())
}

fn print_config(config: &AppConfig) -> Result<()> {
    let rendered = config.to_toml().context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

fn prompt_confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    let mut input = String::new();

    loop {
        input.clear();

        match default {
            Some(true) => print!("{} (Y/n): ", prompt),
            Some(false) | None => print!("{} (y/N): ", prompt),
        }
        io::stdout().flush()?;

        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(default.unwrap_or(false));
        }

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            _ => {}
        }
    }
}
