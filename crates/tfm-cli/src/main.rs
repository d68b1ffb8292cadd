mod commands;
mod logging;
mod progress;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands, ResolveStrategy};
use dotenv::dotenv;
use progress::CliReporter;
use tfm_core::{
    ActivityLogPlugin, AppConfig, ConflictResolutionStrategy, ConflictResolver, DuplicateScanner,
    FileOperations, FileOrganizer, PluginRegistry, SilentReporter,
};
use tracing::{error, info};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let _guard = logging::init_logger(&logging::LogSettings::from_env());

    let config = match tfm_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    let mut registry = PluginRegistry::new();
    registry.register(Box::new(ActivityLogPlugin));
    let plugins = Arc::new(registry);
    let ops = FileOperations::new(&config.trash_dir).with_plugins(Arc::clone(&plugins));

    let result = match args.command {
        Some(Commands::Organize {
            source,
            target,
            by_type,
            by_date: _,
            date_format,
            move_files,
            dry_run,
        }) => run_organize(
            &ops,
            &plugins,
            &config,
            &source,
            &target,
            by_type,
            date_format,
            move_files,
            dry_run,
        ),
        Some(Commands::Duplicates {
            dir,
            no_recursive,
            resolve,
            dry_run,
            yes,
        }) => run_duplicates(
            &ops,
            &plugins,
            &config,
            &dir,
            !no_recursive,
            resolve,
            dry_run,
            yes,
        ),
        Some(Commands::Cleanup {
            dir,
            days,
            recursive,
            dry_run,
            yes,
        }) => run_cleanup(&ops, &dir, days, recursive, dry_run, yes),
        Some(Commands::Rename {
            dir,
            pattern,
            replacement,
            recursive,
            dry_run,
        }) => run_rename(&ops, &dir, &pattern, &replacement, recursive, dry_run),
        Some(Commands::PrintConfig) => print_config(&config),
        None => {
            let _ = Cli::command().print_long_help();
            Ok(())
        }
    };

    if let Err(err) = result {
        error!("Error: {:#}", err);
        process::exit(1);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_organize(
    ops: &FileOperations,
    plugins: &Arc<PluginRegistry>,
    config: &AppConfig,
    source: &Path,
    target: &Path,
    by_type: bool,
    date_format: Option<String>,
    move_files: bool,
    dry_run: bool,
) -> Result<()> {
    let reporter = CliReporter::new();
    reporter.start_spinner("Organizing...");
    let organizer = FileOrganizer::new(ops)
        .with_plugins(Arc::clone(plugins))
        .with_reporter(&reporter)
        .with_dry_run(dry_run);

    let result = if by_type {
        organizer.organize_by_type(source, target, &config.category_table(), move_files)
    } else {
        let pattern = date_format.unwrap_or_else(|| config.date_format.clone());
        organizer.organize_by_date(source, target, &pattern, move_files)
    };
    reporter.finish();
    let result = result.with_context(|| format!("Failed to organize {}", source.display()))?;

    let verb = match (dry_run, move_files) {
        (true, _) => "Would place",
        (false, true) => "Moved",
        (false, false) => "Copied",
    };
    for (key, paths) in result.iter() {
        println!("{} ({})", key.cyan().bold(), paths.len());
        for path in paths {
            println!("  {}", path.display());
        }
    }
    let skipped = result.entries().len() - result.total_placed();
    info!(
        "{} {} files, {} left in place",
        verb,
        format!("{}", result.total_placed()).green(),
        format!("{}", skipped).yellow(),
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_duplicates(
    ops: &FileOperations,
    plugins: &PluginRegistry,
    config: &AppConfig,
    dir: &Path,
    recursive: bool,
    resolve: Option<ResolveStrategy>,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let scanner = DuplicateScanner::new(config);
    let reporter = CliReporter::new();
    let groups = scanner
        .find_duplicates(dir, recursive, &reporter)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    println!();
    for (i, group) in groups.iter().enumerate() {
        println!(
            "{} {} ({} bytes each)",
            format!("Group {}:", i + 1).bold(),
            &group.hash[..12.min(group.hash.len())],
            group.size
        );
        for path in &group.paths {
            println!("  {}", path.display());
        }
    }
    info!(
        "{} duplicate groups, {} files with duplicates, {} bytes wasted",
        format!("{}", groups.len()).red(),
        format!("{}", groups.duplicate_files()).red(),
        format!("{}", groups.wasted_bytes()).red(),
    );

    let found: Vec<PathBuf> = groups.iter().flat_map(|g| g.paths.clone()).collect();
    plugins.on_search_complete(&format!("duplicates in {}", dir.display()), &found);

    let Some(resolve) = resolve else {
        return Ok(());
    };
    if groups.is_empty() {
        return Ok(());
    }

    let strategy = ConflictResolutionStrategy::from(resolve);
    if strategy != ConflictResolutionStrategy::Interactive && !dry_run && !yes {
        let extra_copies = groups.duplicate_files() - groups.len();
        let confirmed = prompt_confirm(
            &format!("Move {} duplicate files to the trash?", extra_copies),
            Some(false),
        )?;
        if !confirmed {
            return Ok(());
        }
    }

    let resolver = ConflictResolver::new(ops).with_dry_run(dry_run);
    let mut select = |members: &[PathBuf]| prompt_keep(members).unwrap_or_default();
    let deleted = if strategy == ConflictResolutionStrategy::Interactive {
        resolver.resolve(&groups, strategy, Some(&mut select), &SilentReporter)
    } else {
        resolver.resolve(&groups, strategy, None, &SilentReporter)
    };

    for path in &deleted {
        println!("  {} {}", "-".red(), path.display());
    }
    info!(
        "{} {} files (trash: {})",
        if dry_run { "Would remove" } else { "Removed" },
        format!("{}", deleted.len()).green(),
        ops.trash_dir().display(),
    );
    Ok(())
}

fn run_cleanup(
    ops: &FileOperations,
    dir: &Path,
    days: u64,
    recursive: bool,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    let preview = FileOrganizer::new(ops)
        .with_dry_run(true)
        .cleanup_old_files(dir, days, recursive)
        .with_context(|| format!("Failed to scan {}", dir.display()))?;

    for path in &preview {
        println!("  {}", path.display());
    }
    if dry_run || preview.is_empty() {
        info!(
            "{} files older than {} days",
            format!("{}", preview.len()).yellow(),
            days
        );
        return Ok(());
    }

    if !yes
        && !prompt_confirm(
            &format!("Move {} files to the trash?", preview.len()),
            Some(false),
        )?
    {
        return Ok(());
    }

    let reporter = CliReporter::new();
    reporter.start_spinner("Cleaning up...");
    let removed = FileOrganizer::new(ops)
        .with_reporter(&reporter)
        .cleanup_old_files(dir, days, recursive);
    reporter.finish();
    let removed = removed.with_context(|| format!("Failed to clean up {}", dir.display()))?;

    info!(
        "Removed {} files (trash: {})",
        format!("{}", removed.len()).green(),
        ops.trash_dir().display()
    );
    Ok(())
}

fn run_rename(
    ops: &FileOperations,
    dir: &Path,
    pattern: &str,
    replacement: &str,
    recursive: bool,
    dry_run: bool,
) -> Result<()> {
    let renamed = FileOrganizer::new(ops)
        .with_dry_run(dry_run)
        .batch_rename(dir, pattern, replacement, recursive)
        .with_context(|| format!("Failed to rename files in {}", dir.display()))?;

    for path in &renamed {
        println!("  {} {}", "→".cyan(), path.display());
    }
    info!(
        "{} {} files",
        if dry_run { "Would rename" } else { "Renamed" },
        format!("{}", renamed.len()).green()
    );
    Ok(())
}

fn print_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

/// Ask which member of a duplicate group to keep. Empty input keeps every copy;
/// `s` skips the group.
fn prompt_keep(members: &[PathBuf]) -> io::Result<Vec<PathBuf>> {
    println!();
    for (i, path) in members.iter().enumerate() {
        let modified = std::fs::metadata(path)
            .and_then(|m| m.modified())
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        println!("  [{}] {} ({})", i + 1, path.display(), modified.dimmed());
    }

    let mut input = String::new();
    loop {
        input.clear();
        print!("Number of the file to keep (Enter keeps all, s skips): ");
        io::stdout().flush()?;
        if io::stdin().read_line(&mut input)? == 0 {
            return Ok(Vec::new());
        }

        match input.trim() {
            "" => return Ok(members.to_vec()),
            "s" | "S" => return Ok(Vec::new()),
            choice => match choice.parse::<usize>() {
                Ok(n) if (1..=members.len()).contains(&n) => {
                    return Ok(vec![members[n - 1].clone()])
                }
                _ => continue,
            },
        }
    }
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

        io::stdin().read_line(&mut input)?;

        match input.trim().to_uppercase().as_str() {
            "Y" => return Ok(true),
            "N" => return Ok(false),
            "" => match default {
                Some(default) => return Ok(default),
                None => continue,
            },
            _ => continue,
        }
    }
}
