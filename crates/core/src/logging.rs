//! Logging and observability
//!
//! Structured logging via `tracing-subscriber`, in either human-readable text or
//! JSON lines. All log output goes to stderr so stdout stays reserved for the run
//! report.

use anyhow::Result;
use std::{io, sync::Once};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Environment variable selecting the log format ("json" or "text")
pub const LOG_FORMAT_ENV: &str = "LIFELINE_LOG_FORMAT";
/// Environment variable holding the log filter directive
pub const LOG_FILTER_ENV: &str = "LIFELINE_LOG";
/// Environment variable overriding which span lifecycle events are logged
pub const LOG_SPAN_EVENTS_ENV: &str = "LIFELINE_LOG_SPAN_EVENTS";

/// Initialize the logging system.
///
/// `format` takes precedence over `LIFELINE_LOG_FORMAT`; anything other than
/// `"json"` selects the text formatter. The filter comes from `LIFELINE_LOG`,
/// then `RUST_LOG`, then defaults to `info`. Repeated calls are no-ops.
///
/// In JSON mode every stage span is reported on open and close, which makes
/// the per-stage timings available to log processors:
///
/// ```json
/// {"timestamp":"2026-10-18T09:12:01.120Z","level":"INFO","fields":{"message":"close","time.busy":"41.2s"},"target":"lifeline_core::script","span":{"name":"stage","stage":"backup-and-restore"}}
/// ```
pub fn init(format: Option<&str>) -> Result<()> {
    INIT.call_once(|| {
        let filter = create_env_filter();

        let env_format = std::env::var(LOG_FORMAT_ENV).ok();
        let effective_format = format.or(env_format.as_deref()).unwrap_or("text");
        let span_events = span_events_for_format(effective_format);

        match effective_format {
            "json" => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .json()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
            _ => {
                tracing_subscriber::registry()
                    .with(
                        fmt::layer()
                            .with_target(true)
                            .with_span_events(span_events)
                            .with_writer(io::stderr),
                    )
                    .with(filter)
                    .init();
            }
        }

        tracing::debug!("Logging initialized with format: {}", effective_format);
    });

    Ok(())
}

fn create_env_filter() -> EnvFilter {
    if let Ok(spec) = std::env::var(LOG_FILTER_ENV) {
        EnvFilter::try_new(&spec).unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid {} specification '{}', using default 'info'",
                LOG_FILTER_ENV,
                spec
            );
            EnvFilter::new("info")
        })
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Span lifecycle events to log; the env var overrides the per-format default
fn span_events_for_format(format: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    if let Ok(raw) = std::env::var(LOG_SPAN_EVENTS_ENV) {
        return parse_span_events(&raw);
    }

    match format {
        "json" => FmtSpan::NEW | FmtSpan::CLOSE,
        _ => FmtSpan::NONE,
    }
}

fn parse_span_events(raw: &str) -> fmt::format::FmtSpan {
    use fmt::format::FmtSpan;

    let mut acc = FmtSpan::NONE;
    for token in raw.split(&[',', '|'][..]).map(|t| t.trim().to_lowercase()) {
        acc |= match token.as_str() {
            "new" => FmtSpan::NEW,
            "close" => FmtSpan::CLOSE,
            "enter" => FmtSpan::ENTER,
            "exit" => FmtSpan::EXIT,
            "active" => FmtSpan::ACTIVE,
            "full" => FmtSpan::FULL,
            _ => FmtSpan::NONE,
        };
    }
    acc
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    INIT.is_completed()
}
