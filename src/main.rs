use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info, warn};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use lapsa::cli::Args;
use lapsa::config::PaneConfig;
use lapsa::dataset::Dataset;
use lapsa::events::ViewerEvent;
use lapsa::loader::LoadBounds;
use lapsa::viewer::Viewer;

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env().filter_level(level).init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbosity);

    let dataset_arg = args.dataset.to_string_lossy();
    let dataset = if dataset_arg.contains('*') {
        Dataset::from_glob(&dataset_arg)
    } else {
        Dataset::from_dir(&args.dataset).or_else(|_| Dataset::discover(&args.dataset))
    }
    .with_context(|| format!("no usable dataset at {}", args.dataset.display()))?;
    info!("{}: {} frames", args.dataset.display(), dataset.len());

    let mut viewer = Viewer::new(dataset);

    let base = args.tier.clone().unwrap_or_else(|| PathBuf::from("."));
    let mut config = PaneConfig::new(args.capacity, base)
        .with_strategy(args.strategy)
        .with_delay_ms(args.delay_ms);
    if let Some(thumbs) = &args.thumbs {
        config = config.with_thumbs(thumbs);
    }

    let bounds = LoadBounds { start: args.start, end: args.end, step: args.step };
    let now = Instant::now();
    for _ in 0..args.panes.max(1) {
        let id = viewer.add_pane(&config)?;
        viewer.start_load(id, bounds, now)?;
    }

    let events = viewer.events();
    let started = Instant::now();
    while viewer.is_loading() {
        viewer.pump_blocking(Duration::from_millis(10));
        for ev in events.try_iter() {
            match ev {
                ViewerEvent::ResourceReady { pane, tier, slot } => {
                    info!("pane {} {:?} slot {} ready", pane, tier, slot);
                }
                ViewerEvent::SessionFinished { pane, tier } => {
                    info!("pane {} {:?} finished", pane, tier);
                }
                ViewerEvent::FetchFailed { pane, tier, slot, error } => {
                    warn!("pane {} {:?} slot {} failed: {}", pane, tier, slot, error);
                }
            }
        }
    }

    println!("Loaded in {:.2}s", started.elapsed().as_secs_f64());
    for pane in viewer.panes() {
        let loaded = pane.frames().num_loaded();
        let capacity = pane.frames().capacity();
        let stamp = pane
            .current_global_index()
            .and_then(|g| viewer.dataset().timestamp(g))
            .unwrap_or("-");
        println!(
            "  pane {}: {}/{} frames, current index {:?} @ {}",
            pane.id(),
            loaded,
            capacity,
            pane.current_slot(),
            stamp
        );
    }
    Ok(())
}
