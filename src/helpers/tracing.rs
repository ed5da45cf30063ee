//! Human-readable logs on stderr, errors and breadcrumbs to Sentry.

use std::borrow::Cow;

use sentry::integrations::tracing::EventFilter;
use sentry::{ClientInitGuard, ClientOptions};
use tracing::{Level, Metadata};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::opts::TracingOpts;
use crate::prelude::*;

const LOG_VAR: &str = "MONGO_BOOTSTRAP_LOG";
const DEFAULT_LOG: &str = "mongo_bootstrap=info,mongodb=warn";

const SENTRY_LOG_VAR: &str = "MONGO_BOOTSTRAP_SENTRY_LOG";
const DEFAULT_SENTRY_LOG: &str = "mongo_bootstrap=debug";

/// Installs the global subscriber. Keep the guard alive until exit, so that pending events get sent.
pub fn init(opts: &TracingOpts) -> Result<ClientInitGuard> {
    let guard = sentry::init((opts.sentry_dsn.as_deref(), client_options(opts)));

    let sentry_layer = sentry::integrations::tracing::layer()
        .event_filter(sentry_event_filter)
        .span_filter(|metadata| metadata.level() <= &Level::DEBUG)
        .with_filter(env_filter(SENTRY_LOG_VAR, DEFAULT_SENTRY_LOG)?);

    // Stdout is left to the subcommands.
    let format_layer = tracing_subscriber::fmt::layer()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(LOG_VAR, DEFAULT_LOG)?);

    tracing_subscriber::Registry::default()
        .with(sentry_layer)
        .with(format_layer)
        .try_init()
        .context("failed to install the tracing subscriber")?;

    Ok(guard)
}

fn client_options(opts: &TracingOpts) -> ClientOptions {
    ClientOptions {
        release: sentry::release_name!(),
        environment: opts.sentry_environment.clone().map(Cow::Owned),
        traces_sample_rate: opts.traces_sample_rate,
        ..Default::default()
    }
}

/// Only errors become Sentry events, the provisioning steps are kept as breadcrumbs.
fn sentry_event_filter(metadata: &Metadata) -> EventFilter {
    match *metadata.level() {
        Level::ERROR => EventFilter::Event,
        Level::WARN | Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
        Level::TRACE => EventFilter::Ignore,
    }
}

/// Reads the directives from the variable, falling back to the defaults when it is unset.
fn env_filter(var: &str, default: &str) -> Result<EnvFilter> {
    match std::env::var(var) {
        Ok(directives) => EnvFilter::try_new(&directives).with_context(|| format!("invalid `{}`", var)),
        Err(_) => Ok(EnvFilter::try_new(default)?),
    }
}

pub fn format_elapsed(instant: Instant) -> String {
    humantime::format_duration(instant.elapsed()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_options_ok() {
        let opts = TracingOpts {
            sentry_dsn: None,
            sentry_environment: Some("staging".to_string()),
            traces_sample_rate: 0.5,
        };
        let options = client_options(&opts);
        assert!(options.release.unwrap().starts_with("mongo-bootstrap@"));
        assert_eq!(options.environment.as_deref(), Some("staging"));
        assert_eq!(options.traces_sample_rate, 0.5);
    }

    #[test]
    fn env_filter_default_ok() -> Result {
        let filter = env_filter("MONGO_BOOTSTRAP_UNSET_LOG", DEFAULT_LOG)?;
        assert!(filter.to_string().contains("mongo_bootstrap=info"));
        Ok(())
    }

    #[test]
    fn default_sentry_log_ok() -> Result {
        EnvFilter::try_new(DEFAULT_SENTRY_LOG)?;
        Ok(())
    }
}
