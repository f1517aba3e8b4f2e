use clap::Parser;
use std::path::PathBuf;

use crate::config::{DEFAULT_INTER_FETCH_DELAY_MS, LoadStrategy};

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Formats: PNG, JPEG, TIFF (image crate)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Progressive timelapse sequence viewer (headless driver)
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Dataset directory: frames.txt + timestamps.txt, or plain image files
    #[arg(value_name = "DATASET")]
    pub dataset: PathBuf,

    /// Slots to fill per pane
    #[arg(short = 'n', long = "capacity", value_name = "N", default_value_t = 40)]
    pub capacity: usize,

    /// Load order strategy
    #[arg(short = 's', long = "strategy", value_enum, default_value_t = LoadStrategy::Fill)]
    pub strategy: LoadStrategy,

    /// Number of panes loading the dataset (arbitrated one at a time)
    #[arg(short = 'p', long = "panes", value_name = "N", default_value_t = 1)]
    pub panes: usize,

    /// Resolution tier subdirectory the frame names resolve against
    #[arg(short = 't', long = "tier", value_name = "DIR")]
    pub tier: Option<PathBuf>,

    /// Thumbnail tier subdirectory (adds a second loader per pane)
    #[arg(long = "thumbs", value_name = "DIR")]
    pub thumbs: Option<PathBuf>,

    /// Milliseconds between consecutive fetches
    #[arg(short = 'd', long = "delay", value_name = "MS", default_value_t = DEFAULT_INTER_FETCH_DELAY_MS)]
    pub delay_ms: u64,

    /// Global start frame (default: 0)
    #[arg(long = "start", value_name = "N")]
    pub start: Option<usize>,

    /// Global end frame, exclusive (default: full range)
    #[arg(long = "end", value_name = "N")]
    pub end: Option<usize>,

    /// Stride between consecutive slots (default: computed from range)
    #[arg(long = "step", value_name = "N")]
    pub step: Option<usize>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
