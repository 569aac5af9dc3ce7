//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;
use tierconf::{EnvSnapshot, ResolutionContext, Resolver};

static TRACING: Once = Once::new();

/// Install a test subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Write `contents` to `dir/relative`, creating parent directories.
pub fn write(dir: &Path, relative: &str, contents: &str) -> PathBuf {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(&path, contents).expect("write fixture");
    path
}

/// A resolver that sees only `env` and, optionally, a fake home directory.
pub fn resolver(env: &[(&str, &str)], home: Option<&Path>) -> Resolver {
    init_tracing();
    let ctx = ResolutionContext::new()
        .with_env(env.iter().copied().collect::<EnvSnapshot>())
        .with_home_dir(home.map(Path::to_path_buf));
    Resolver::new(ctx)
}
