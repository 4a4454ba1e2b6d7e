//! Command implementations for the memory-ann CLI.
//!
//! The CLI is the single writer of its snapshot file: every invocation opens
//! the index from the file, applies one command, and persists after any
//! mutation.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::info;

use memory_ann::{FileSnapshotStore, GraphIndex, SnapshotStore, VectorIndex};

use crate::cli::{parse_vector, Cli, Commands};
use crate::settings::Settings;

/// One line of an import file
#[derive(Debug, Deserialize)]
struct ImportRecord {
    id: String,
    vector: Vec<f64>,
}

/// Load settings and apply CLI overrides (highest precedence).
pub fn resolve_settings(cli: &Cli) -> Result<Settings> {
    let mut settings =
        Settings::load(cli.config.as_deref()).context("Failed to load configuration")?;

    if let Some(path) = &cli.snapshot {
        settings.snapshot_path = path.clone();
    }
    if let Some(dimension) = cli.dimension {
        settings.dimension = dimension;
    }
    if let Some(level) = &cli.log_level {
        settings.log_level = level.clone();
    }
    Ok(settings)
}

/// Install the tracing subscriber.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open the index backed by the configured snapshot file.
///
/// An existing snapshot decides the dimension. Asking for a different one
/// explicitly is an error rather than a silent reset of the stored index.
pub async fn open_index(settings: &Settings, dimension_flag: Option<usize>) -> Result<GraphIndex> {
    let path = settings.expanded_snapshot_path();
    let store = FileSnapshotStore::new(&path);

    let existing = store
        .load()
        .await
        .with_context(|| format!("Failed to read snapshot {:?}", path))?;

    // The file is read once; the store is attached afterwards for saving only.
    let index = match existing {
        Some(snapshot) => {
            if let Some(flag) = dimension_flag.filter(|&flag| flag != snapshot.dimension) {
                bail!(
                    "Snapshot {:?} has dimension {}, but --dimension {} was given",
                    path,
                    snapshot.dimension,
                    flag
                );
            }
            GraphIndex::from_snapshot(&snapshot)
                .with_context(|| format!("Failed to open index at {:?}", path))?
        }
        None => GraphIndex::new(settings.graph_config())
            .with_context(|| format!("Invalid index settings for {:?}", path))?,
    };
    info!(path = ?path, vectors = index.size(), "Opened index");

    let hooks: Arc<dyn SnapshotStore> = Arc::new(store);
    Ok(index.with_persistence(hooks))
}

/// Run a single command against `index`, returning the text to print.
pub async fn execute(
    command: Commands,
    index: &mut GraphIndex,
    settings: &Settings,
) -> Result<String> {
    let mut out = String::new();

    match command {
        Commands::Add { id, vector } => {
            let vector = parse_vector(&vector).map_err(anyhow::Error::msg)?;
            index.add(&id, vector)?;
            index.persist().await.context("Failed to persist index")?;
            writeln!(out, "Added {} ({} vectors)", id, index.size())?;
        }
        Commands::Remove { id } => {
            if index.remove(&id) {
                index.persist().await.context("Failed to persist index")?;
                writeln!(out, "Removed {} ({} vectors)", id, index.size())?;
            } else {
                writeln!(out, "{} not found", id)?;
            }
        }
        Commands::Search {
            vector,
            k,
            threshold,
        } => {
            let query = parse_vector(&vector).map_err(anyhow::Error::msg)?;
            let k = k.unwrap_or(settings.default_k);
            let threshold = threshold.unwrap_or(settings.default_threshold);
            let results = index.search(&query, k, threshold)?;
            if results.is_empty() {
                writeln!(out, "No results")?;
            }
            for result in results {
                writeln!(out, "{}\t{:.6}", result.id, result.similarity)?;
            }
        }
        Commands::Stats => {
            let stats = index.stats();
            writeln!(out, "Vectors:        {}", stats.vector_count)?;
            writeln!(out, "Links:          {}", stats.edge_count)?;
            writeln!(out, "Dimension:      {}", stats.dimension)?;
            writeln!(out, "Max neighbors:  {}", stats.max_neighbors)?;
            writeln!(out, "Search width:   {}", stats.search_width)?;
            writeln!(out, "Average degree: {:.2}", stats.average_degree)?;
            writeln!(
                out,
                "Entry point:    {}",
                stats.entry_point.as_deref().unwrap_or("-")
            )?;
        }
        Commands::Import { path } => {
            let records = read_import_file(&path).await?;
            let count = records.len();
            index.add_batch(records)?;
            index.persist().await.context("Failed to persist index")?;
            info!(count, path = ?path, "Imported records");
            writeln!(out, "Imported {} records ({} vectors)", count, index.size())?;
        }
        Commands::Export { pretty } => {
            let snapshot = index.snapshot();
            let json = if pretty {
                serde_json::to_string_pretty(&snapshot)?
            } else {
                serde_json::to_string(&snapshot)?
            };
            writeln!(out, "{}", json)?;
        }
    }

    Ok(out)
}

/// Parse a JSON-lines import file. Blank lines are skipped.
async fn read_import_file(path: &Path) -> Result<Vec<(String, Vec<f64>)>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;

    let mut records = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: ImportRecord = serde_json::from_str(line)
            .with_context(|| format!("{:?} line {}: invalid record", path, line_no + 1))?;
        records.push((record.id, record.vector));
    }
    Ok(records)
}

/// Entry point used by `main`.
pub async fn run(cli: Cli) -> Result<()> {
    let settings = resolve_settings(&cli)?;
    init_logging(&settings.log_level)?;

    let mut index = open_index(&settings, cli.dimension).await?;
    let output = execute(cli.command, &mut index, &settings).await?;
    print!("{}", output);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_for(temp: &TempDir) -> Settings {
        Settings {
            snapshot_path: temp
                .path()
                .join("index.json")
                .to_string_lossy()
                .to_string(),
            dimension: 3,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_persists_and_search_reads_back() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);

        let mut index = open_index(&settings, None).await.unwrap();
        let command = Commands::Add {
            id: "v1".to_string(),
            vector: "1,0,0".to_string(),
        };
        let out = execute(command, &mut index, &settings).await.unwrap();
        assert!(out.contains("Added v1"));

        let mut reopened = open_index(&settings, None).await.unwrap();
        let command = Commands::Search {
            vector: "1,0,0".to_string(),
            k: Some(1),
            threshold: Some(0.9),
        };
        let out = execute(command, &mut reopened, &settings).await.unwrap();
        assert!(out.starts_with("v1\t1.000000"));
    }

    #[tokio::test]
    async fn test_add_rejects_wrong_dimension() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);
        let mut index = open_index(&settings, None).await.unwrap();

        let command = Commands::Add {
            id: "x".to_string(),
            vector: "1,0".to_string(),
        };
        let err = execute(command, &mut index, &settings).await.unwrap_err();
        assert!(err.to_string().contains("expected 3, got 2"));
        assert_eq!(index.size(), 0);
    }

    #[tokio::test]
    async fn test_add_rejects_nan_and_snapshot_stays_readable() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);
        let mut index = open_index(&settings, None).await.unwrap();

        let command = Commands::Add {
            id: "ok".to_string(),
            vector: "1,0,0".to_string(),
        };
        execute(command, &mut index, &settings).await.unwrap();

        let command = Commands::Add {
            id: "bad".to_string(),
            vector: "nan,0,0".to_string(),
        };
        let err = execute(command, &mut index, &settings).await.unwrap_err();
        assert!(err.to_string().contains("not a finite number"));

        let reopened = open_index(&settings, None).await.unwrap();
        assert_eq!(reopened.size(), 1);
        assert!(!reopened.contains("bad"));
    }

    #[tokio::test]
    async fn test_existing_snapshot_decides_dimension() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);
        let mut index = open_index(&settings, None).await.unwrap();
        index.add("a", vec![1.0, 0.0, 0.0]).unwrap();
        index.persist().await.unwrap();

        let other = Settings {
            dimension: 5,
            ..settings.clone()
        };
        let reopened = open_index(&other, None).await.unwrap();
        assert_eq!(reopened.dimension(), 3);
        assert_eq!(reopened.size(), 1);

        assert!(open_index(&other, Some(5)).await.is_err());
    }

    #[tokio::test]
    async fn test_import_and_export() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);
        let input = temp.path().join("records.jsonl");
        std::fs::write(
            &input,
            "{\"id\": \"a\", \"vector\": [1, 0, 0]}\n\n{\"id\": \"b\", \"vector\": [0, 1, 0]}\n",
        )
        .unwrap();

        let mut index = open_index(&settings, None).await.unwrap();
        let out = execute(Commands::Import { path: input }, &mut index, &settings)
            .await
            .unwrap();
        assert!(out.contains("Imported 2 records"));

        let out = execute(Commands::Export { pretty: false }, &mut index, &settings)
            .await
            .unwrap();
        let snapshot: memory_ann::Snapshot = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.edges, vec![("a".to_string(), "b".to_string())]);
    }

    #[tokio::test]
    async fn test_import_reports_bad_line() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);
        let input = temp.path().join("records.jsonl");
        std::fs::write(&input, "{\"id\": \"a\", \"vector\": [1, 0, 0]}\nnot json\n").unwrap();

        let mut index = open_index(&settings, None).await.unwrap();
        let err = execute(Commands::Import { path: input }, &mut index, &settings)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert_eq!(index.size(), 0);
    }

    #[tokio::test]
    async fn test_remove_missing_and_stats() {
        let temp = TempDir::new().unwrap();
        let settings = settings_for(&temp);
        let mut index = open_index(&settings, None).await.unwrap();

        let out = execute(
            Commands::Remove {
                id: "ghost".to_string(),
            },
            &mut index,
            &settings,
        )
        .await
        .unwrap();
        assert!(out.contains("ghost not found"));

        let out = execute(Commands::Stats, &mut index, &settings).await.unwrap();
        assert!(out.contains("Vectors:        0"));
        assert!(out.contains("Entry point:    -"));
    }
}
