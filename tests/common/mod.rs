//! Shared helpers for the integration tests: tracing setup and tree checks.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ...
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `olc_btree=debug`)
//! - `OLC_LOG_DIR`: Log directory (default: `logs/`)
//! - `OLC_LOG_CONSOLE`: Set to "0" to disable console output
//!
//! Library events are only emitted with `--features tracing`.
//!
//! # Log Files
//!
//! Logs are appended to `logs/olc_btree.jsonl` as NDJSON:
//!
//! ```bash
//! # Splits that were abandoned and retried
//! cat logs/olc_btree.jsonl | jq 'select(.fields.message == "split abandoned, discarding siblings")'
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use olc_btree::{BTreeGeneric, Key, TreeShape};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Tree with 4-entry nodes: splits and growth after a handful of keys.
pub type SmallTree = BTreeGeneric<4, 4>;

static INIT: Once = Once::new();

/// Install the console and file subscribers. Only the first call counts.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

#[derive(Debug, Clone)]
struct TracingConfig {
    log_dir: PathBuf,
    log_file: String,
    console_enabled: bool,
    default_level: Level,
}

impl TracingConfig {
    fn from_env() -> Self {
        Self {
            log_dir: env::var("OLC_LOG_DIR").map_or_else(|_| PathBuf::from("logs"), PathBuf::from),
            log_file: "olc_btree.jsonl".to_string(),
            console_enabled: !env::var("OLC_LOG_CONSOLE").is_ok_and(|v| v == "0"),
            default_level: Level::INFO,
        }
    }
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(format!("{default_level}")))
}

#[expect(clippy::expect_used)]
fn setup_tracing() {
    let config = TracingConfig::from_env();

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create log directory");

    // Append: nextest runs each test in its own process.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_dir.join(&config.log_file))
        .expect("Failed to open log file");

    let console_layer = config.console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
            .compact()
            .with_filter(make_filter(config.default_level))
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .json()
        .with_filter(make_filter(config.default_level));

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Verify the tree and panic with the violation if it is malformed.
pub fn verified<const L: usize, const I: usize>(tree: &BTreeGeneric<L, I>) -> TreeShape {
    match tree.verify() {
        Ok(shape) => shape,
        Err(violation) => panic!("tree invariant broken: {violation}"),
    }
}

/// Panic listing (up to 20) keys whose lookup does not return `expected(key)`.
pub fn assert_all_present<const L: usize, const I: usize>(
    tree: &BTreeGeneric<L, I>,
    keys: impl IntoIterator<Item = Key>,
    expected: impl Fn(Key) -> u64,
    test_name: &str,
) {
    let wrong: Vec<(Key, Option<u64>)> = keys
        .into_iter()
        .filter_map(|k| {
            let got = tree.lookup(k);
            (got != Some(expected(k))).then_some((k, got))
        })
        .collect();

    assert!(
        wrong.is_empty(),
        "{test_name}: {} keys wrong (first 20: {:?}), len={}",
        wrong.len(),
        &wrong[..wrong.len().min(20)],
        tree.len()
    );
}
