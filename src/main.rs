use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use picbin::advisor::{self, GroupPlan};
use picbin::cull::{self, Outcome, Step};
use picbin::exact::{self, DEFAULT_PREFIX_LEN, ExactOptions, ExactReport};
use picbin::history::{HistoryLog, Selection};
use picbin::months::{self, YearMonth};
use picbin::similar::{self, Clustering, DEFAULT_MAX_DISTANCE, DctHasher, SimilarOptions, SimilarReport};
use picbin::{DuplicateGroup, Skipped, logging, scanner};
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "picbin", version, about = "Find and clear out duplicate photos")]
struct Cli {
    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// History file (default: `<data dir>/picbin/history.jsonl`)
    #[arg(long, value_name = "FILE", global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List images found under the given folders, oldest first
    Scan {
        #[arg(required = true, value_name = "FOLDER")]
        folders: Vec<PathBuf>,
    },

    /// Count images per month
    Months {
        #[arg(required = true, value_name = "FOLDER")]
        folders: Vec<PathBuf>,
    },

    /// Duplicate workflows
    Duplicates {
        #[command(subcommand)]
        command: Dups,
    },

    /// Work with cull history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Args, Debug)]
struct AnalysisArgs {
    /// Folders to scan (a leading `~` is expanded)
    #[arg(required = true, value_name = "FOLDER")]
    folders: Vec<PathBuf>,

    /// Largest Hamming distance between similar images
    #[arg(long, default_value_t = DEFAULT_MAX_DISTANCE)]
    max_distance: u32,

    /// Bytes hashed from the start of same-size files
    #[arg(
        long,
        default_value_t = DEFAULT_PREFIX_LEN as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    prefix_bytes: u64,

    /// Confirm exact duplicates by hashing whole files
    #[arg(long)]
    verify_full: bool,

    /// Group similar images transitively instead of by seed
    #[arg(long)]
    transitive: bool,

    /// Skip the perceptual similarity pass
    #[arg(long)]
    no_similar: bool,

    /// Directory to leave out of the scan (repeatable)
    #[arg(long, value_name = "DIR")]
    exclude: Vec<PathBuf>,

    /// Only consider images modified in this month (YYYY-MM)
    #[arg(long, value_name = "YYYY-MM")]
    month: Option<YearMonth>,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Dups {
    /// Find and list duplicate and similar groups
    Scan {
        #[command(flatten)]
        args: AnalysisArgs,
    },

    /// Print the files that would be deleted
    Suggest {
        #[command(flatten)]
        args: AnalysisArgs,
    },

    /// Move suggested files into a separate directory
    Cull {
        #[command(flatten)]
        args: AnalysisArgs,
        /// Only show what would be moved
        #[arg(long)]
        dry_run: bool,
        /// Directory to move duplicates into (default: `<first folder>/.duplicates`)
        #[arg(long, value_name = "DIR")]
        target_dir: Option<PathBuf>,
    },

    /// Permanently delete suggested files
    Delete {
        #[command(flatten)]
        args: AnalysisArgs,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List all cull history records
    List,

    /// Move culled files back to where they came from
    Restore {
        /// Directory the files were culled into
        #[arg(long, value_name = "DIR")]
        from: PathBuf,
        /// Restore a specific record index
        #[arg(long, conflicts_with = "all")]
        record: Option<usize>,
        /// Restore all records
        #[arg(long, conflicts_with = "record")]
        all: bool,
    },
}

struct Analysis {
    exact: ExactReport,
    similar: SimilarReport,
}

impl Analysis {
    fn groups(&self) -> impl Iterator<Item = &DuplicateGroup> {
        self.exact.groups.iter().chain(&self.similar.groups)
    }

    fn skipped(&self) -> impl Iterator<Item = &Skipped> {
        self.exact.skipped.iter().chain(&self.similar.skipped)
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    exact: &'a [DuplicateGroup],
    similar: &'a [DuplicateGroup],
    skipped: Vec<&'a Skipped>,
    plans: &'a [GroupPlan],
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    let history = HistoryLog::open(cli.history.unwrap_or_else(HistoryLog::default_path));

    match cli.command {
        Commands::Scan { folders } => {
            for path in scan_images(&folders, &[])? {
                println!("{}", path.display());
            }
        }

        Commands::Months { folders } => {
            let images = scan_images(&folders, &[])?;
            for (month, count) in months::month_counts(&images) {
                println!("{}  {:<16} {} photo(s)", month, month.label(), count);
            }
        }

        Commands::Duplicates { command } => match command {
            Dups::Scan { args } => {
                let analysis = analyze(&args)?;
                if args.json {
                    print_json(&analysis, &advisor::plan(analysis.groups()))?;
                } else {
                    print_groups(&analysis);
                }
            }

            Dups::Suggest { args } => {
                let analysis = analyze(&args)?;
                if args.json {
                    let plans = advisor::plan(analysis.groups());
                    print_json(&analysis, &plans)?;
                } else {
                    let suggestions = advisor::get_deletion_suggestions(
                        &analysis.exact.groups,
                        &analysis.similar.groups,
                    );
                    for path in suggestions {
                        println!("{}", path.display());
                    }
                }
            }

            Dups::Cull {
                mut args,
                dry_run,
                target_dir,
            } => {
                let dup_dir = target_dir.unwrap_or_else(|| cull::default_cull_dir(&args.folders[0]));
                args.exclude.push(dup_dir.clone());
                let analysis = analyze(&args)?;
                let plans = cull::actionable(advisor::plan(analysis.groups()));
                if plans.is_empty() {
                    println!("No duplicates found.");
                    return Ok(());
                }

                let outcome = cull::move_duplicates(&plans, &dup_dir, dry_run, &history)?;
                print_outcome(&outcome);

                if dry_run {
                    println!("\n⚠️  Dry-run only; no files were changed.");
                } else if outcome.records_written > 0 {
                    println!("\n✅ Recorded cull history in {}", history.path().display());
                } else {
                    println!("\n⚠️  No files were moved.");
                }
            }

            Dups::Delete { args, yes } => {
                let analysis = analyze(&args)?;
                let plans = cull::actionable(advisor::plan(analysis.groups()));
                if plans.is_empty() {
                    println!("No duplicates found.");
                    return Ok(());
                }

                let total: usize = plans.iter().map(|p| p.discard.len()).sum();
                if !yes {
                    let confirmed = Confirm::new()
                        .with_prompt(format!("Permanently delete {} file(s)?", total))
                        .default(false)
                        .interact()?;
                    if !confirmed {
                        println!("Nothing deleted.");
                        return Ok(());
                    }
                }

                let outcome = cull::delete_duplicates(&plans, &history)?;
                print_outcome(&outcome);

                if outcome.records_written > 0 {
                    println!("\n✅ Recorded cull history in {}", history.path().display());
                } else {
                    println!("\n⚠️  No files were deleted.");
                }
            }
        },

        Commands::History { command } => match command {
            HistoryCmd::List => {
                println!("🗂️  Cull History:");
                for entry in history.entries()? {
                    match entry.record {
                        Ok(rec) => {
                            let restore = entry
                                .restore_index
                                .map(|i| format!("  (restore --record {})", i))
                                .unwrap_or_default();
                            println!(
                                "[{}] {}{}\n     kept: {}\n     culled: {:?}\n     action: {:?}\n",
                                entry.index, rec.timestamp, restore, rec.retained, rec.culled, rec.action
                            )
                        }
                        Err(err) => eprintln!("⚠️  Skipping malformed entry {}: {}", entry.index, err),
                    }
                }
            }

            HistoryCmd::Restore { from, record, all } => {
                let selection = match (all, record) {
                    (true, _) => Selection::All,
                    (false, Some(index)) => Selection::Index(index),
                    (false, None) => Selection::Latest,
                };
                let summary = history.restore(selection, &from)?;
                for (src, dest) in &summary.restored {
                    println!("🔄 Restored {:?} → {:?}", src, dest);
                }
                for src in &summary.missing {
                    eprintln!("⚠️ Source file {:?} does not exist; skipping", src);
                }
                println!("🧹 Updated history, removed {} record(s)", summary.records);
            }
        },
    }

    Ok(())
}

/// Walk `folders` behind a spinner.
fn scan_images(folders: &[PathBuf], excluded: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
    spinner.set_message("Scanning for images…");
    spinner.enable_steady_tick(Duration::from_millis(100));
    let images = scanner::scan_folders_excluding(folders, excluded);
    spinner.finish_with_message(format!("Found {} image(s)", images.len()));
    Ok(images)
}

fn analyze(args: &AnalysisArgs) -> Result<Analysis> {
    let mut images = scan_images(&args.folders, &args.exclude)?;
    if let Some(month) = args.month {
        images = months::filter_by_month(&images, month);
    }

    let exact_options = ExactOptions {
        prefix_len: args.prefix_bytes as usize,
        verify_full: args.verify_full,
    };
    let exact = benchmark("exact duplicate search", || exact::scan(&images, &exact_options));

    let similar = if args.no_similar {
        SimilarReport::default()
    } else {
        let options = SimilarOptions {
            max_distance: args.max_distance,
            clustering: if args.transitive {
                Clustering::Transitive
            } else {
                Clustering::Seeded
            },
            ..SimilarOptions::default()
        };
        let hasher = DctHasher::new();
        benchmark("similar image search", || similar::scan(&images, &options, &hasher))
    };

    Ok(Analysis { exact, similar })
}

fn print_outcome(outcome: &Outcome) {
    for (i, group) in outcome.groups.iter().enumerate() {
        println!("\n✨ Group {}:", i + 1);
        println!("   🏆 Keeping → {}", group.keep.display());
        for step in &group.steps {
            match step {
                Step::Moved { from, to } => println!("   📦 Moved {} → {}", from.display(), to.display()),
                Step::WouldMove { from, to } => {
                    println!("   📦 [dry-run] MOVE {} → {}", from.display(), to.display())
                }
                Step::Collision { from, to } => eprintln!(
                    "⚠️  {} already exists; leaving {} in place",
                    to.display(),
                    from.display()
                ),
                Step::Deleted(path) => println!("   🗑️  Deleted {}", path.display()),
                Step::Failed { path, error } => eprintln!("⚠️  Could not handle {}: {}", path.display(), error),
            }
        }
    }
}

fn print_groups(analysis: &Analysis) {
    let sections = [
        ("duplicate", &analysis.exact.groups),
        ("similar", &analysis.similar.groups),
    ];
    for (label, groups) in sections {
        if groups.is_empty() {
            println!("No {} groups found.", label);
            continue;
        }
        println!("Found {} {} group(s):", groups.len(), label);
        for (i, group) in groups.iter().enumerate() {
            println!(" Group {}:", i + 1);
            for file in &group.paths {
                println!("   ▶ {}", file.display());
            }
        }
    }

    let skipped: Vec<&Skipped> = analysis.skipped().collect();
    if !skipped.is_empty() {
        println!("Skipped {} file(s):", skipped.len());
        for s in skipped {
            println!("   ⚠️  {} ({})", s.path.display(), s.reason);
        }
    }
}

fn print_json(analysis: &Analysis, plans: &[GroupPlan]) -> Result<()> {
    let report = JsonReport {
        exact: &analysis.exact.groups,
        similar: &analysis.similar.groups,
        skipped: analysis.skipped().collect(),
        plans,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Run `f()`, log how long it took (with `label`), and return its result.
fn benchmark<T, F: FnOnce() -> T>(label: &str, f: F) -> T {
    let start = Instant::now();
    let result = f();
    tracing::info!("⏱ {} took {:.2?}", label, start.elapsed());
    result
}
