use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod settings;

pub use settings::ClientSettings;

/// Initialize logging with structured output and environment-based level
/// filtering. `default_level` applies when RUST_LOG is unset.
pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("ledgerline={},tokio=warn,rustls=warn", default_level))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(false)
                .with_level(true)
                .compact(),
        )
        .try_init()?;

    Ok(())
}

/// Initialize logging for tests; safe to call more than once
pub fn init_test_logging() -> anyhow::Result<()> {
    let env_filter = EnvFilter::new("ledgerline=debug");

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_test_writer().compact())
        .try_init()
        .or_else(|_| Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_test_logging_is_reentrant() {
        let _ = init_test_logging();
        assert!(init_test_logging().is_ok());
    }
}
