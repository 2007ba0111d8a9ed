use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

pub(super) struct LoggerConfig {
    pub format: LoggerFormat,
    pub filter: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self { format: LoggerFormat::default(), filter: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_owned()) }
    }
}

#[derive(Default)]
pub(super) enum LoggerFormat {
    #[default]
    Json,
}

pub(super) fn init_logger(config: LoggerConfig) {
    let builder = SubscriberBuilder::default().with_env_filter(EnvFilter::new(config.filter));

    match config.format {
        LoggerFormat::Json => builder.json().init(),
    }
}
