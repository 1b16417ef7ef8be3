use meanrev_runner::LogFormat;

/// Install the global subscriber. `MEANREV_LOG` overrides the configured level.
pub fn init_tracing(log_level: &str, log_format: LogFormat) -> Result<(), String> {
    let filter = std::env::var("MEANREV_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    match log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init(),
    }
    .map_err(|err| format!("failed to install tracing subscriber: {err}"))
}
