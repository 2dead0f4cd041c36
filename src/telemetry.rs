use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the JSON tracing subscriber.
///
/// `RUST_LOG` overrides `default_filter`. `log` records (request logging) are
/// bridged into the same output. Calling this more than once is harmless,
/// which lets every integration test initialise logging.
pub fn init_telemetry(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    let formatting_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stdout)
        .json();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(formatting_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_initialization_is_repeatable() {
        init_telemetry("debug");
        init_telemetry("info");
        tracing::info!("telemetry initialised twice without panicking");
    }
}
