use configs::TelemetrySettings;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let layer = if settings.json {
        fmt::layer().json().with_filter(filter).boxed()
    } else {
        fmt::layer().with_target(true).with_filter(filter).boxed()
    };

    tracing_subscriber::registry().with(layer).try_init()?;
    Ok(())
}
