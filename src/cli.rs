use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use chrono::Local;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::{settings::Style, Table, Tabled};
use tracing::info;

use crate::{
    cli_types::{DetailsArgs, InitArgs, ListArgs, ScanArgs, SummaryArgs},
    config::{default_config_path, AppConfig},
    engine::{DiscoveryEngine, ScanRequest},
    git::{normalize_remote_url, GitCli, GitClient},
    scanner::{CancelToken, ChannelSink, ScanReport, SkipReason},
    storage::{JsonStore, MemoryCache, ScanCache},
    summary::SummaryEngine,
    types::{FileChangeKind, RepoDetails, RepoEntry, RepoStatus, SummaryError},
};

pub struct CliApp {
    config: AppConfig,
    store: Arc<JsonStore>,
    git: Arc<GitCli>,
    engine: DiscoveryEngine,
    verbose: bool,
}

impl CliApp {
    pub fn new(config: AppConfig, verbose: bool) -> Result<Self> {
        info!("initializing rempo CLI");

        let store = Arc::new(JsonStore::load(&config.cache.path));
        let git = Arc::new(GitCli::new());
        let cache: Arc<dyn ScanCache> = if config.cache.enabled {
            Arc::clone(&store) as Arc<dyn ScanCache>
        } else {
            Arc::new(MemoryCache::new())
        };

        let engine = DiscoveryEngine::builder()
            .git_client(Arc::clone(&git) as Arc<dyn GitClient>)
            .cache(cache)
            .scan_options(config.scanning.to_options())
            .build()
            .context("failed to assemble the discovery engine")?;

        Ok(Self {
            config,
            store,
            git,
            engine,
            verbose,
        })
    }

    pub async fn scan(&self, args: ScanArgs) -> Result<()> {
        let start = Instant::now();
        if !args.json {
            print_header("Repository scan");
        }

        let mut options = self.config.scanning.to_options();
        if let Some(depth) = args.max_depth {
            options.max_depth = depth;
        }
        if args.include_hidden {
            options.include_hidden = true;
        }
        options.extra_ignore_patterns.extend(args.ignore.iter().cloned());

        if self.verbose {
            print_info(&format!("root: {}", args.path.display()));
            print_info(&format!(
                "max depth: {}, hidden: {}, extra patterns: {:?}",
                options.max_depth, options.include_hidden, options.extra_ignore_patterns
            ));
        }

        // Ctrl-C turns into a cooperative cancellation: the walk stops at
        // the next directory and the partial report is still printed.
        let cancel = CancelToken::new();
        let cancel_task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            }
        });

        let (sink, mut rx) = ChannelSink::new();
        let spinner = if args.json {
            None
        } else {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg}")
                    .context("invalid progress template")?,
            );
            bar.enable_steady_tick(Duration::from_millis(100));
            Some(bar)
        };
        let progress_task = tokio::spawn({
            let spinner = spinner.clone();
            async move {
                while let Some(event) = rx.recv().await {
                    if let Some(bar) = &spinner {
                        bar.set_message(format!(
                            "{} folders scanned, {} repositories",
                            event.folders_scanned, event.repos_found
                        ));
                    }
                }
            }
        });

        let request = ScanRequest::new()
            .with_options(options)
            .refresh(args.refresh)
            .with_cancel(cancel)
            .with_sink(&sink);
        let report = self.engine.scan_with(&args.path, request).await?;

        drop(sink);
        let _ = progress_task.await;
        cancel_task.abort();
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to encode scan report")?
            );
            return Ok(());
        }

        if report.repos.is_empty() {
            print_warning("no repositories found");
        } else {
            let rows: Vec<RepoRow> = report.repos.iter().map(RepoRow::from_entry).collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        if report.cancelled {
            print_warning("scan cancelled; results are partial and were not cached");
        }
        if report.from_cache {
            print_info("served from cache; pass --refresh to walk the tree again");
        } else {
            print_info(&format!(
                "{} folders in {:.2?}",
                report.stats.folders_scanned,
                start.elapsed()
            ));
        }

        if !report.skipped.is_empty() {
            print_warning(&format!("{} directories skipped", report.skipped.len()));
            if self.verbose {
                for skip in &report.skipped {
                    let reason = match &skip.reason {
                        SkipReason::Unreadable { detail } => format!("unreadable: {detail}"),
                        SkipReason::GitQuery { detail } => format!("git: {detail}"),
                    };
                    print_info(&format!("  {} ({reason})", skip.path.display()));
                }
            }
        }

        self.auto_summarize(&report).await;
        Ok(())
    }

    pub async fn list(&self, args: ListArgs) -> Result<()> {
        match args.path {
            Some(path) => {
                let key = path.canonicalize().unwrap_or_else(|_| path.clone());
                let Some(entry) = self.store.get(&key) else {
                    bail!(
                        "no cached scan for {}; run `rempo scan` first",
                        path.display()
                    );
                };

                if args.json {
                    println!("{}", serde_json::to_string_pretty(&entry)?);
                    return Ok(());
                }

                print_header(&format!("Cached scan of {}", key.display()));
                print_info(&format!(
                    "scanned at {}",
                    entry
                        .scanned_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                ));
                let rows: Vec<RepoRow> = entry.repos.iter().map(RepoRow::from_entry).collect();
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
            None => {
                let entries = self.store.cache_entries();
                if entries.is_empty() {
                    print_warning("the scan cache is empty; run `rempo scan` first");
                    return Ok(());
                }

                if args.json {
                    let map: BTreeMap<_, _> = entries.into_iter().collect();
                    println!("{}", serde_json::to_string_pretty(&map)?);
                    return Ok(());
                }

                print_header("Cached roots");
                let rows: Vec<RootRow> = entries
                    .iter()
                    .map(|(root, entry)| RootRow {
                        root: root.clone(),
                        repos: entry.repos.len(),
                        scanned_at: entry
                            .scanned_at
                            .with_timezone(&Local)
                            .format("%Y-%m-%d %H:%M")
                            .to_string(),
                    })
                    .collect();
                println!("{}", Table::new(rows).with(Style::rounded()));
            }
        }
        Ok(())
    }

    pub async fn details(&self, args: DetailsArgs) -> Result<()> {
        if !self.git.is_work_tree(&args.path).await {
            bail!("{} is not inside a git working tree", args.path.display());
        }

        let (commits, files, remote) = futures::try_join!(
            self.git.recent_commits(&args.path, args.commits.max(1)),
            self.git.status(&args.path),
            self.git.remote_url(&args.path),
        )?;
        let details = RepoDetails { commits, files };

        if args.json {
            println!("{}", serde_json::to_string_pretty(&details)?);
            return Ok(());
        }

        print_header(&format!("{}", args.path.display()));
        if let Some(url) = remote {
            print_info(&format!("remote: {}", normalize_remote_url(&url)));
        }

        if details.commits.is_empty() {
            print_warning("no commits yet");
        } else {
            let rows: Vec<CommitRow> = details
                .commits
                .iter()
                .map(|commit| CommitRow {
                    id: commit.id.clone(),
                    author: commit.author.clone(),
                    time: commit.time.clone(),
                    message: truncate(&commit.message, 60),
                })
                .collect();
            println!("{}", Table::new(rows).with(Style::rounded()));
        }

        if details.files.is_empty() {
            print_info("working tree clean");
        } else {
            println!("\n{}", "Changed files".bold());
            for file in &details.files {
                let marker = match file.kind {
                    FileChangeKind::Added => "+".green(),
                    FileChangeKind::Deleted => "-".red(),
                    FileChangeKind::Modified => "~".yellow(),
                };
                println!("  {} {}", marker, file.path);
            }
        }
        Ok(())
    }

    pub async fn summary(&self, args: SummaryArgs) -> Result<()> {
        if !self.git.is_work_tree(&args.path).await {
            bail!("{} is not inside a git working tree", args.path.display());
        }

        let engine = self.summary_engine(args.api_key.clone())?;
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("asking the model...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        let text = engine.summarize(&args.path).await;
        spinner.finish_and_clear();

        print_header(&format!("Summary of {}", args.path.display()));
        println!("{}", text?);
        Ok(())
    }

    pub fn show_config(&self) -> Result<()> {
        print_header("Configuration");
        let mut shown = self.config.clone();
        if shown.ai.api_key.is_some() {
            shown.ai.api_key = Some("<redacted>".to_string());
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&shown).context("failed to serialize configuration")?
        );
        print_info(&format!("store: {}", self.store.path().display()));
        Ok(())
    }

    pub fn init(&self, args: InitArgs) -> Result<()> {
        let path = args
            .path
            .or_else(default_config_path)
            .context("no config directory available on this platform")?;
        if path.exists() && !args.force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let rendered = AppConfig::default()
            .to_toml()
            .context("failed to render default configuration")?;
        std::fs::write(&path, rendered)
            .with_context(|| format!("failed to write {}", path.display()))?;
        print_success(&format!("wrote {}", path.display()));
        Ok(())
    }

    async fn auto_summarize(&self, report: &ScanReport) {
        if !self.config.ai.auto_summarize_on_scan || report.repos.is_empty() {
            return;
        }
        let engine = match self.summary_engine(None) {
            Ok(engine) => engine,
            Err(err) => {
                print_warning(&format!("summaries unavailable: {err}"));
                return;
            }
        };

        print_header("Summaries");
        for repo in &report.repos {
            match engine.summarize(&repo.path).await {
                Ok(text) => {
                    println!("{}", repo.name.bold());
                    println!("  {text}\n");
                }
                Err(err) => print_warning(&format!("{}: {err}", repo.name)),
            }
        }
    }

    fn summary_engine(&self, key_override: Option<String>) -> Result<SummaryEngine, SummaryError> {
        let engine = SummaryEngine::from_config(
            &self.config.ai,
            key_override,
            Arc::clone(&self.git) as Arc<dyn GitClient>,
        )?;
        Ok(engine.with_store(Arc::clone(&self.store)))
    }
}

#[derive(Tabled)]
struct RepoRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Branch")]
    branch: String,
    #[tabled(rename = "Last commit")]
    last_commit: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl RepoRow {
    fn from_entry(entry: &RepoEntry) -> Self {
        let status = match entry.status {
            RepoStatus::Clean => entry.status.to_string().green().to_string(),
            RepoStatus::Uncommitted => entry.status.to_string().yellow().to_string(),
        };
        Self {
            name: entry.name.clone(),
            status,
            branch: entry.branch.clone(),
            last_commit: truncate(&entry.last_commit, 40),
            path: entry.path.display().to_string(),
        }
    }
}

#[derive(Tabled)]
struct RootRow {
    #[tabled(rename = "Root")]
    root: String,
    #[tabled(rename = "Repos")]
    repos: usize,
    #[tabled(rename = "Scanned at")]
    scanned_at: String,
}

#[derive(Tabled)]
struct CommitRow {
    #[tabled(rename = "Hash")]
    id: String,
    #[tabled(rename = "Author")]
    author: String,
    #[tabled(rename = "Date")]
    time: String,
    #[tabled(rename = "Subject")]
    message: String,
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(max.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

fn print_header(title: &str) {
    println!("\n{}", title.bold().underline());
}

fn print_success(message: &str) {
    println!("{} {}", "ok:".green().bold(), message);
}

fn print_info(message: &str) {
    println!("{}", message.dimmed());
}

fn print_warning(message: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), message);
}
