use tracing::{error, info, warn};
use tracing_subscriber::{fmt::time::ChronoUtc, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize logging. `RUST_LOG` overrides the default `windowscan=info`;
/// `WINDOWSCAN_LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_logger() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("windowscan=info"));

    let json = std::env::var("WINDOWSCAN_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let format_layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_timer(ChronoUtc::rfc_3339())
            .with_current_span(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_timer(ChronoUtc::rfc_3339())
            .with_target(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(format_layer)
        .try_init()?;
    Ok(())
}

/// Component-scoped logger; every event carries the component name as a field.
#[derive(Debug, Clone)]
pub struct Logger {
    component: &'static str,
}

impl Logger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn info(&self, message: &str) {
        info!(component = self.component, "{}", message);
    }

    pub fn warn(&self, message: &str) {
        warn!(component = self.component, "{}", message);
    }

    pub fn error(&self, message: &str) {
        error!(component = self.component, "{}", message);
    }

    pub fn error_with_error(&self, message: &str, error: &dyn std::error::Error) {
        error!(component = self.component, error = %error, "{}", message);
    }
}

/// Dispatcher state transition logging
pub fn log_state_transition(from: &str, to: &str, reason: &str) {
    let now = chrono::Utc::now();
    info!(
        "[TRANSITION] [{}] {} -> {} ({})",
        now.format("%Y-%m-%d %H:%M:%S UTC"),
        from,
        to,
        reason
    );
}

/// [PARTITION] - per-partition kernel progress
pub fn log_partition(message: &str) {
    info!("PARTITION: {}", message);
}

/// [PREFLIGHT] - configuration checks before dispatch
pub fn log_preflight(message: &str) {
    info!("PREFLIGHT: {}", message);
}

/// [LOAD] - matrix loading
pub fn log_load(message: &str) {
    info!("LOAD: {}", message);
}

/// Format an end-date range for logging
pub fn format_date_range_info(start: &str, end: &str, count: usize) -> String {
    if start == end {
        format!("{} (1 date)", start)
    } else {
        format!("{} to {} ({} dates)", start, end, count)
    }
}

/// Performance timing helper
pub struct Timer {
    start: std::time::Instant,
    name: String,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            start: std::time::Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    pub fn log_elapsed(&self, context: &str) {
        info!(component = context, "{} completed in {}", self.name, format_elapsed(self.elapsed_ms()));
    }
}

/// Human-readable elapsed time: milliseconds, seconds, then `XmYYs`.
pub fn format_elapsed(ms: f64) -> String {
    match ms {
        ms if ms < 1_000.0 => format!("{:.1}ms", ms),
        ms if ms < 60_000.0 => format!("{:.2}s", ms / 1_000.0),
        ms => {
            let secs = (ms / 1_000.0) as u64;
            format!("{}m{:02}s", secs / 60, secs % 60)
        }
    }
}
