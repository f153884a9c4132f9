//! Tracing setup for binaries and examples embedding the crate.

use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the default subscriber: env-filtered fmt output on stderr with
/// span open/close events and error-context capture.
///
/// `RUST_LOG` overrides the filter; the fallback keeps the crate at `info`.
/// Calling this twice panics (the global subscriber is already set), so hosts
/// that install their own subscriber should simply not call it.
pub fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,atelier=info"))
        .expect("static filter directive parses");

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(ErrorLayer::default())
        .init();
}

/// Install miette's pretty panic reports alongside tracing.
pub fn init_miette() {
    miette::set_panic_hook();
}
