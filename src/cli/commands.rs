//! Command implementations

use crate::callgraph::{CallGraph, CallGraphBuilder, CallGraphOptions};
use crate::drift::{DriftDetectionResult, DriftDetector, DriftSeverity};
use crate::extract::{CodeExtractor, FileStructure};
use crate::llm::{LlmClient, SemanticReviewer};
use crate::repo::Project;
use crate::snapshot::{DriftSnapshot, SnapshotStore};
use crate::storage::{Database, SuggestionStatus};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{CallgraphArgs, OutputFormat};

/// Outcome of one `detect` run
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Detection {
    /// No usable snapshot existed; the current state became the baseline
    Baseline { snapshot: PathBuf, reason: String },
    /// The current state was compared against the latest snapshot
    Compared {
        baseline: String,
        results: Vec<DriftDetectionResult>,
        stored_suggestions: usize,
        saved_snapshot: Option<PathBuf>,
    },
}

fn open_initialized(path: &Path) -> Result<Project> {
    let project = Project::open(path)?;
    if !project.is_initialized() {
        anyhow::bail!("DocDrift not initialized. Run 'docdrift init' first.");
    }
    Ok(project)
}

fn open_database(project: &Project) -> Result<Database> {
    Database::open(project.database_path())
}

/// Initialize DocDrift in a project
pub fn init(path: &Path, force: bool) -> Result<()> {
    let project = Project::open(path)?;

    if project.is_initialized() && !force {
        anyhow::bail!("DocDrift already initialized. Use --force to re-initialize.");
    }

    let state_dir = project.init_state_dir()?;
    project.config().save(project.root())?;
    let _db = open_database(&project)?;

    let snapshot = SnapshotStore::for_project(&project)
        .create(&project)
        .context("Failed to create baseline snapshot")?;

    println!("✓ Initialized DocDrift in {:?}", project.root());
    println!("  Config: {:?}", state_dir.join("config.toml"));
    println!("  Database: {:?}", project.database_path());
    println!(
        "  Baseline: {} ({} source files, {} documentation files)",
        snapshot.file_name(),
        snapshot.files.len(),
        snapshot.docs.len()
    );

    Ok(())
}

/// Capture and persist a snapshot
pub fn snapshot(path: &Path) -> Result<(PathBuf, DriftSnapshot)> {
    let project = open_initialized(path)?;
    let store = SnapshotStore::for_project(&project);

    let snapshot = DriftSnapshot::capture(&project)?;
    let saved = store.save(&snapshot)?;
    Ok((saved, snapshot))
}

/// Compare the current state against the latest snapshot
pub fn detect(path: &Path, save: bool, with_llm: bool) -> Result<Detection> {
    let project = open_initialized(path)?;
    let store = SnapshotStore::for_project(&project);

    let baseline = match store.load_latest() {
        Ok(snapshot) => snapshot,
        Err(e) if e.is_recoverable() => {
            warn!("{}; capturing a new baseline", e);
            let snapshot = DriftSnapshot::capture(&project)?;
            let saved = store.save(&snapshot)?;
            return Ok(Detection::Baseline {
                snapshot: saved,
                reason: e.to_string(),
            });
        }
        Err(e) => return Err(e).context("Failed to load the latest snapshot"),
    };

    let current = DriftSnapshot::capture(&project)?;
    let mut results = DriftDetector::new().detect(&baseline, &current);

    if with_llm && !results.is_empty() {
        review_with_llm(&project, &mut results)?;
    }

    let db = open_database(&project)?;
    let cleared = db.clear_pending_suggestions()?;
    if cleared > 0 {
        info!("Replaced {} pending suggestion(s) from the previous run", cleared);
    }
    let stored_suggestions = db.record_results(&results, current.git_commit.as_deref())?;

    let saved_snapshot = if save {
        Some(store.save(&current)?)
    } else {
        None
    };

    Ok(Detection::Compared {
        baseline: baseline.file_name(),
        results,
        stored_suggestions,
        saved_snapshot,
    })
}

/// Run the semantic review over every suggestion
fn review_with_llm(project: &Project, results: &mut [DriftDetectionResult]) -> Result<()> {
    let Some(client) = LlmClient::from_config(&project.config().llm)? else {
        warn!("No LLM endpoint configured; skipping semantic review");
        return Ok(());
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        if !client.is_available().await {
            warn!("LLM endpoint is not reachable; suggestions will be degraded");
        }
        SemanticReviewer::new(Box::new(client))
            .review_results(results)
            .await;
    });

    Ok(())
}

/// Build the call graph of a symbol
pub fn callgraph(path: &Path, args: &CallgraphArgs) -> Result<CallGraph> {
    let project = Project::open(path)?;

    let mut options = CallGraphOptions::from_config(project.config());
    if let Some(depth) = args.max_depth {
        options = options.with_max_depth(depth);
    }
    options.resolve_imports &= !args.no_imports;
    options.extract_conditionals &= !args.no_conditionals;
    options.track_exceptions &= !args.no_exceptions;

    CallGraphBuilder::new(project.root(), options).build(&args.symbol)
}

/// Extract the structural model of one file
pub fn extract(path: &Path, file: &str) -> Result<FileStructure> {
    let project = Project::open(path)?;

    let candidate = Path::new(file);
    let target = if candidate.is_absolute() || candidate.exists() {
        candidate.to_path_buf()
    } else {
        project.root().join(candidate)
    };
    if !target.is_file() {
        anyhow::bail!("File not found: {}", file);
    }

    let mut extractor = CodeExtractor::new()?;
    extractor.extract_path(&target)
}

/// Show history statistics and pending suggestions
pub fn status(path: &Path, format: OutputFormat) -> Result<()> {
    let project = open_initialized(path)?;
    let db = open_database(&project)?;

    let stats = db.get_stats()?;
    let pending = db.get_pending_suggestions()?;

    if format == OutputFormat::Json {
        let json = serde_json::json!({
            "stats": stats,
            "pending": pending,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    println!("DocDrift Status");
    println!("===============\n");

    println!("Project: {:?}", project.root());
    if let Some(commit) = db.get_last_scan_commit()? {
        println!("Last detection commit: {}", commit);
    }
    println!("Drift results: {}", stats.drift_results);
    println!(
        "Suggestions: {} ({} pending, {} applied, {} ignored)",
        stats.suggestions,
        stats.pending_suggestions,
        stats.applied_suggestions,
        stats.ignored_suggestions
    );

    if pending.is_empty() {
        println!("\n✓ No pending suggestions!");
        return Ok(());
    }

    println!("\nPending Suggestions:");
    println!("--------------------\n");

    for stored in &pending {
        let s = &stored.suggestion;
        println!("[{}] {} in {}", short_id(&s.id), s.symbol_name, stored.file_path);
        println!("   Doc: {} § {}", project.relative_path(Path::new(&s.doc_file)), s.section_heading);
        println!("   Confidence: {:.0}%", s.confidence * 100.0);
        if s.auto_applicable {
            println!("   Auto-applicable");
        }
        println!("   {}", s.reasoning);
        println!();
    }

    Ok(())
}

/// Write a suggested edit into its documentation file
pub fn apply(path: &Path, suggestion_id: &str, dry_run: bool) -> Result<()> {
    let project = open_initialized(path)?;
    let db = open_database(&project)?;

    let stored = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| anyhow::anyhow!("Suggestion not found: {}", suggestion_id))?;
    if stored.status != SuggestionStatus::Pending {
        anyhow::bail!("Suggestion {} is already {}", short_id(&stored.suggestion.id), stored.status);
    }
    let suggestion = &stored.suggestion;

    let doc_path = project.root().join(&suggestion.doc_file);
    let current = std::fs::read_to_string(&doc_path)
        .with_context(|| format!("Failed to read {:?}", doc_path))?;
    if !current.contains(&suggestion.original_content) {
        anyhow::bail!(
            "Section '{}' in {:?} changed since detection. Run 'docdrift detect' again.",
            suggestion.section_heading,
            doc_path
        );
    }

    if dry_run {
        print!("{}", suggestion.unified_diff());
        return Ok(());
    }

    let updated = current.replacen(&suggestion.original_content, &suggestion.suggested_content, 1);
    std::fs::write(&doc_path, updated)
        .with_context(|| format!("Failed to write {:?}", doc_path))?;
    db.update_suggestion_status(&suggestion.id, SuggestionStatus::Applied)?;

    println!("✓ Updated {:?}", doc_path);
    Ok(())
}

/// Ignore a suggestion
pub fn ignore(path: &Path, suggestion_id: &str) -> Result<()> {
    let project = open_initialized(path)?;
    let db = open_database(&project)?;

    let stored = db
        .get_suggestion(suggestion_id)?
        .ok_or_else(|| anyhow::anyhow!("Suggestion not found: {}", suggestion_id))?;
    db.update_suggestion_status(&stored.suggestion.id, SuggestionStatus::Ignored)?;

    println!("✓ Ignored suggestion: {}", short_id(&stored.suggestion.id));
    Ok(())
}

/// Re-run detection whenever a tracked file changes
pub fn watch(path: &Path, debounce_ms: u64, format: OutputFormat) -> Result<()> {
    use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    let project = open_initialized(path)?;

    println!("Watching for changes in {:?}...", project.root());
    println!("Press Ctrl+C to stop.\n");

    let (tx, rx) = channel();
    let debounce = Duration::from_millis(debounce_ms);
    let config = Config::default().with_poll_interval(debounce);

    let mut watcher = RecommendedWatcher::new(tx, config)?;
    watcher.watch(project.root(), RecursiveMode::Recursive)?;

    let mut last_run: Option<Instant> = None;

    for event in rx {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("Watch error: {}", e);
                continue;
            }
        };

        if last_run.is_some_and(|at| at.elapsed() < debounce) {
            continue;
        }
        if !event.paths.iter().any(|p| project.is_tracked(p)) {
            continue;
        }

        println!("\n📝 Changes detected, detecting drift...");
        match detect(project.root(), false, false) {
            Ok(detection) => print_detection(&detection, format)?,
            Err(e) => eprintln!("Detection error: {:#}", e),
        }
        last_run = Some(Instant::now());
    }

    Ok(())
}

/// Print a detection outcome
pub fn print_detection(detection: &Detection, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(detection)?);
        }
        OutputFormat::Text => match detection {
            Detection::Baseline { snapshot, reason } => {
                println!("No usable snapshot ({}).", reason);
                println!("✓ Created baseline snapshot {:?}", snapshot);
            }
            Detection::Compared {
                baseline,
                results,
                stored_suggestions,
                saved_snapshot,
            } => {
                println!("Compared against {}", baseline);
                print_results_text(results);
                if *stored_suggestions > 0 {
                    println!("{} suggestion(s) recorded. Run 'docdrift status' to review.", stored_suggestions);
                }
                if let Some(saved) = saved_snapshot {
                    println!("✓ Saved snapshot {:?}", saved);
                }
            }
        },
    }
    Ok(())
}

/// Print drift results in text format
pub fn print_results_text(results: &[DriftDetectionResult]) {
    if results.is_empty() {
        println!("✓ No documentation drift detected.");
        return;
    }

    println!("\nDetected Drift:");
    println!("===============\n");

    for result in results {
        println!(
            "{} [{}] {} ({} change(s), {} effort)",
            severity_icon(result.severity),
            result.severity,
            result.file_path,
            result.drifts.len(),
            result.impact.effort
        );
        if result.impact.requires_manual_review {
            println!("   Requires manual review");
        }
        for drift in &result.drifts {
            println!(
                "   - {} {} `{}`: {}",
                drift.diff.kind, drift.diff.category, drift.diff.symbol_name, drift.diff.details
            );
            for doc in &drift.affected_docs {
                println!("       affects {}", doc);
            }
        }
        for suggestion in &result.suggestions {
            println!(
                "   → [{}] {} § {} ({:.0}%)",
                short_id(&suggestion.id),
                suggestion.doc_file,
                suggestion.section_heading,
                suggestion.confidence * 100.0
            );
        }
        println!();
    }
}

/// Print a structural model in text format
pub fn print_structure_text(structure: &FileStructure) {
    println!("Code Analysis: {}", structure.file_path);
    println!("================\n");

    if let Some(ref error) = structure.parse_error {
        println!("⚠ {}", error);
        return;
    }
    if let Some(language) = structure.language {
        println!("Language: {}", language);
    }
    println!("Lines: {}\n", structure.line_count);

    for function in &structure.functions {
        println!(
            "fn {}{}  (lines {}-{}, complexity {})",
            function.signature_text(),
            if function.is_exported { "  [exported]" } else { "" },
            function.start_line,
            function.end_line,
            function.complexity
        );
    }
    for class in &structure.classes {
        println!(
            "class {}{}  ({} methods, {} properties)",
            class.name,
            if class.is_exported { "  [exported]" } else { "" },
            class.methods.len(),
            class.properties.len()
        );
        for method in &class.methods {
            println!("    {}", method.signature_text());
        }
    }
    for interface in &structure.interfaces {
        println!("interface {}", interface.name);
    }
    for alias in &structure.types {
        println!("type {} = {}", alias.name, alias.definition);
    }
    for import in &structure.imports {
        println!("import {}", import.source);
    }
}

fn severity_icon(severity: DriftSeverity) -> &'static str {
    match severity {
        DriftSeverity::Critical => "🔴",
        DriftSeverity::High => "🟠",
        DriftSeverity::Medium => "🟡",
        DriftSeverity::Low => "🟢",
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
