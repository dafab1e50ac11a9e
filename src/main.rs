//! microblock-prefetch: interactive block scanner over a Parquet file.
//!
//! Reads SQL statements from stdin, one per line, prunes the file's row
//! groups by the WHERE clause, serves the survivors through the LRU cache and
//! lets the background prefetcher warm the cache from the access history.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use microblock_prefetch::cache::BlockCache;
use microblock_prefetch::config::{Cli, Config};
use microblock_prefetch::engine::StorageEngine;
use microblock_prefetch::history::{AccessLogger, GlobalHistory};
use microblock_prefetch::prefetch::{
    PredictionMapping, PrefetchScheduler, PrefetchService, Prefetcher, TransitionModel,
};
use microblock_prefetch::prune::Pruner;
use microblock_prefetch::store::parquet_file::ParquetStore;
use microblock_prefetch::GLOBAL_QUERY_ID;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "microblock_prefetch=debug"
    } else {
        "microblock_prefetch=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("microblock-prefetch v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config)?;
    if let Some(path) = cli.parquet {
        config.storage.parquet_path = path;
    }

    let store = Arc::new(
        ParquetStore::open(&config.storage.parquet_path).with_context(|| {
            format!("opening {}", config.storage.parquet_path.display())
        })?,
    );
    info!(
        path = %store.path().display(),
        rows = store.num_rows(),
        columns = ?store.column_names(),
        "Opened Parquet file"
    );

    let cache = Arc::new(BlockCache::new(config.cache.capacity)?);
    let history = Arc::new(GlobalHistory::new(config.history.global_capacity)?);
    let access_log = Arc::new(AccessLogger::open(&config.history.access_log_path));

    let mut engine = StorageEngine::new(config.storage.table_id.clone(), store.clone())
        .with_pruner(Pruner::new(config.pruning.empty_result))
        .with_cache(cache.clone())
        .with_history(history.clone())
        .with_access_log(access_log.clone());

    let mut service = None;
    match load_mapping(&config, &access_log)? {
        Some(mapping) => {
            let vocab_size = mapping.vocab_size();
            let model = TransitionModel::fit(&mapping, &access_log.block_sequence());
            let scheduler = Arc::new(PrefetchScheduler::new(
                model,
                mapping,
                vocab_size,
                &config.scheduler,
            )?);
            engine = engine.with_scheduler(scheduler.clone());

            let prefetcher = Arc::new(Prefetcher::new(store.clone(), cache.clone()));
            let svc = PrefetchService::new(history.clone(), scheduler, prefetcher, &config.service)?;
            if config.service.enabled {
                svc.start();
            }
            service = Some(svc);
        }
        None => warn!("No block vocabulary yet, prefetching disabled for this session"),
    }

    let engine = Arc::new(engine);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let sql = line.trim().to_string();
        if sql.is_empty() {
            continue;
        }

        let engine = engine.clone();
        let result = tokio::task::spawn_blocking(move || {
            engine.execute(GLOBAL_QUERY_ID, &sql, engine.store().as_ref())
        })
        .await?;

        match result {
            Ok((scan, merged)) => println!(
                "blocks={:?} hits={:?} misses={:?} unavailable={:?} rows={}",
                scan.candidates,
                scan.cache_hits,
                scan.cache_misses,
                scan.unavailable,
                merged.num_rows()
            ),
            Err(e) => warn!(error = %e, "Failed to merge scanned blocks"),
        }
    }

    if let Some(service) = service {
        service.stop().await;
    }

    let stats = cache.stats();
    info!(
        size = stats.size,
        capacity = stats.capacity,
        hits = stats.hits,
        misses = stats.misses,
        "Final cache state"
    );
    Ok(())
}

/// The persisted mapping if there is one, otherwise a vocabulary over the
/// blocks seen in the access log (saved for the next run). `None` when no
/// block has been accessed yet.
fn load_mapping(
    config: &Config,
    access_log: &AccessLogger,
) -> anyhow::Result<Option<PredictionMapping>> {
    let path = &config.scheduler.mapping_path;
    if path.exists() {
        let mapping = PredictionMapping::load(path)
            .with_context(|| format!("loading mapping from {}", path.display()))?;
        return Ok(Some(mapping));
    }

    let sequence = access_log.block_sequence();
    if sequence.is_empty() {
        return Ok(None);
    }

    let mapping = PredictionMapping::from_block_sequence(&sequence);
    if let Err(e) = mapping.save(path) {
        warn!(path = %path.display(), error = %e, "Failed to save derived mapping");
    }
    info!(blocks = mapping.len(), "Derived mapping from access log");
    Ok(Some(mapping))
}
