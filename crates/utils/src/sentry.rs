use sentry_tracing::{EventFilter, SentryLayer};
use tracing::{Level, Subscriber};
use tracing_subscriber::registry::LookupSpan;

/// Environment variable holding the DSN. Reporting stays disabled when unset.
pub const SENTRY_DSN_ENV: &str = "SENTRY_DSN";

/// Forwards errors as sentry events and warnings as breadcrumbs.
///
/// Without an initialized sentry client the layer records nothing, so it can
/// be installed unconditionally.
pub fn sentry_layer<S>() -> SentryLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    sentry_tracing::layer().event_filter(|metadata| match *metadata.level() {
        Level::ERROR => EventFilter::Event,
        Level::WARN => EventFilter::Breadcrumb,
        _ => EventFilter::Ignore,
    })
}

/// Reads and parses the DSN from the environment, ignoring blank or malformed values.
pub fn dsn_from_env() -> Option<sentry::types::Dsn> {
    let raw = std::env::var(SENTRY_DSN_ENV).ok()?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(dsn) => Some(dsn),
        Err(err) => {
            eprintln!("Ignoring invalid {SENTRY_DSN_ENV}: {err}");
            None
        }
    }
}
