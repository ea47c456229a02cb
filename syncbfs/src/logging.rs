use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Used when `RUST_LOG` is unset. Every binary logs under its own crate name.
const DEFAULT_FILTER: &str = "syncbfs=info,gentopology=info,simulate=info,syncbfs_lib=info";

/// Logs go to stderr, stdout carries the configuration and the tree.
pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
