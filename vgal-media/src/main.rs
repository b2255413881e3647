//! Gallery simulation (vgal-media) - Main entry point
//!
//! Builds a synthetic catalog, scrolls a viewport across it and drives a
//! `Gallery` over the scripted backend, logging resource stats per step.
//! Useful for tuning capacity tiers and retry parameters against a config
//! file before shipping them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;
use vgal_common::config::{self, ConfigSource};
use vgal_common::events::EventBus;
use vgal_common::CapacityMode;
use vgal_media::failure::{MEDIA_ERR_DECODE, MEDIA_ERR_NETWORK, MEDIA_ERR_SRC_NOT_SUPPORTED};
use vgal_media::simulate::{Outcome, ScriptedBackend};
use vgal_media::source_url::resource_url;
use vgal_media::{CatalogItem, Gallery};

/// Command-line arguments for vgal-media
#[derive(Parser, Debug)]
#[command(name = "vgal-media")]
#[command(about = "Scroll simulation for the video gallery resource manager")]
#[command(version)]
struct Args {
    /// Number of catalog items
    #[arg(short, long, default_value = "500")]
    items: usize,

    /// Capacity mode (overrides the config file)
    #[arg(short, long)]
    mode: Option<CapacityMode>,

    /// Every K-th item is a remote URL (0 = all local)
    #[arg(long, default_value = "7")]
    remote_every: usize,

    /// Every K-th item fails to load (0 = no failures)
    #[arg(long, default_value = "11")]
    fail_every: usize,

    /// Scroll steps to simulate
    #[arg(long, default_value = "40")]
    steps: usize,

    /// Items visible at once
    #[arg(long, default_value = "12")]
    window: usize,

    /// Wall time per scroll step in milliseconds
    #[arg(long, default_value = "250")]
    step_ms: u64,

    /// Config file (falls back to VGAL_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();

    // Config first: it supplies the default log level
    let (toml_config, source) =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = &toml_config.logging.level;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vgal_media={level},vgal_common={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &source {
        ConfigSource::File(path) => info!("Configuration: {}", path.display()),
        ConfigSource::BuiltInDefaults => info!("Configuration: built-in defaults"),
    }

    let mut params = toml_config.params;
    if let Some(mode) = args.mode {
        params.capacity.mode = mode;
    }

    info!(
        "Simulating {} items, window {}, {} steps ({} mode)",
        args.items, args.window, args.steps, params.capacity.mode
    );

    let backend = Arc::new(
        ScriptedBackend::new(Duration::from_millis(40)).with_jitter(Duration::from_millis(120)),
    );
    let catalog = build_catalog(&args, &backend);
    let ids: Vec<_> = catalog.iter().map(|item| item.id).collect();

    let events = EventBus::new(1024);
    let counter = tokio::spawn(count_events(events.subscribe()));

    let mut gallery = Gallery::new(&params, Arc::clone(&backend), events.clone())
        .context("Invalid gallery parameters")?;
    gallery.set_catalog(catalog, None);

    let step = Duration::from_millis(args.step_ms);
    let stride = (args.window / 2).max(1);
    let mut visible: Vec<Uuid> = Vec::new();
    let mut playing: Option<Uuid> = None;

    for step_index in 0..args.steps {
        let start = (step_index * stride) % ids.len().max(1);
        let next: Vec<Uuid> = ids
            .iter()
            .cycle()
            .skip(start)
            .take(args.window.min(ids.len()))
            .copied()
            .collect();

        for id in visible.iter().filter(|id| !next.contains(*id)) {
            gallery.report_intersection(*id, false)?;
            gallery.mark_visible(*id, false)?;
        }
        for (offset, id) in next.iter().enumerate() {
            // Every fifth slot only gets the owner's mark (intersection never fires)
            if offset % 5 == 4 {
                gallery.mark_visible(*id, true)?;
            } else {
                gallery.report_intersection(*id, true)?;
            }
        }
        // Autoplay the top item; whatever played before stops
        if let Some(&first) = next.first() {
            if let Some(previous) = playing.filter(|previous| *previous != first) {
                gallery.request_pause(previous)?;
            }
            match gallery.request_play(first) {
                Ok(()) => playing = Some(first),
                Err(e) => warn!("Play request for {} rejected: {}", first, e),
            }
        }
        visible = next;

        run_for(&mut gallery, step).await;
        let evicted = gallery.tick();
        info!(
            "Step {:>3}: {} evicted={} backend_attached={}",
            step_index,
            gallery.stats(),
            evicted.len(),
            backend.attached_count()
        );
        if let Err(violation) = gallery.manager().check_invariants() {
            warn!("Invariant violated: {}", violation);
        }
    }

    gallery.settle().await;
    info!(
        "Done: {} load attempts, {} detaches, final {}",
        backend.total_load_attempts(),
        backend.detach_count(),
        gallery.stats()
    );

    drop(gallery);
    drop(events);
    let counts = counter.await.context("Event counter task failed")?;
    let mut names: Vec<_> = counts.into_iter().collect();
    names.sort();
    for (name, count) in names {
        info!("  {:<18} {}", name, count);
    }

    Ok(())
}

/// Synthetic catalog with scripted failures
fn build_catalog(args: &Args, backend: &ScriptedBackend) -> Vec<CatalogItem> {
    (0..args.items)
        .map(|index| {
            let item = if is_every(index, args.remote_every) {
                CatalogItem::remote(format!("https://media.example.com/clips/{:05}.mp4", index))
            } else {
                CatalogItem::local(format!("/srv/gallery/clip #{:05}.mp4", index))
            };

            if is_every(index, args.fail_every) {
                let url = resource_url(&item);
                if !item.is_local {
                    backend.set_default(url, Outcome::Fail(MEDIA_ERR_SRC_NOT_SUPPORTED));
                } else if index % 3 == 0 {
                    backend.set_default(url, Outcome::Fail(MEDIA_ERR_DECODE));
                } else {
                    backend.script(url, [Outcome::Fail(MEDIA_ERR_NETWORK)]);
                }
            }
            item
        })
        .collect()
}

fn is_every(index: usize, every: usize) -> bool {
    every > 0 && index % every == every - 1
}

/// Apply completions until `duration` elapses
async fn run_for(gallery: &mut Gallery<ScriptedBackend>, duration: Duration) {
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if !gallery.has_pending_work() {
            tokio::time::sleep_until(deadline).await;
            return;
        }
        if tokio::time::timeout_at(deadline, gallery.process_next()).await.is_err() {
            return;
        }
    }
}

async fn count_events(
    mut rx: tokio::sync::broadcast::Receiver<vgal_common::events::MediaEvent>,
) -> HashMap<&'static str, usize> {
    use tokio::sync::broadcast::error::RecvError;

    let mut counts = HashMap::new();
    loop {
        match rx.recv().await {
            Ok(event) => *counts.entry(event.name()).or_insert(0) += 1,
            Err(RecvError::Lagged(skipped)) => warn!("Event counter lagged by {}", skipped),
            Err(RecvError::Closed) => return counts,
        }
    }
}
