use crate::config::{LogFormat, LoggingConfig};
use std::sync::Once;
use tracing_subscriber::layer::Layered;
use tracing_subscriber::{prelude::*, EnvFilter, Layer, Registry};

type Filtered = Layered<EnvFilter, Registry>;

fn do_init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Framed messages go to stdout, diagnostics to stderr.
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let layer: Box<dyn Layer<Filtered> + Send + Sync> = match config.format {
        LogFormat::Json => fmt.json().boxed(),
        LogFormat::Pretty => fmt.pretty().boxed(),
        LogFormat::Compact => fmt.compact().boxed(),
    };

    // Another subscriber may already be installed by an embedding application.
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

/// Initialize tracing.
///
/// Will only initialize once, so tests may call this.
pub fn init(config: &LoggingConfig) {
    static TRACING_INIT: Once = Once::new();
    TRACING_INIT.call_once(|| do_init(config));
}
