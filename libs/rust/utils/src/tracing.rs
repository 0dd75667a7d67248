use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn setup_tracing() {
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        // HTTP/networking crates
        .add_directive("hyper_util=off".parse().unwrap())
        .add_directive("reqwest=off".parse().unwrap())
        .add_directive("rustls=off".parse().unwrap());

    // Ensure the fmt layer logs to the console
    let fmt_layer = fmt::layer()
        .with_line_number(true)
        .compact()
        .with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .init();
}

/// Same filter as `setup_tracing`, but JSON-formatted for log shippers.
pub fn setup_json_tracing() {
    let filter_layer = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive("hyper_util=off".parse().unwrap())
        .add_directive("reqwest=off".parse().unwrap())
        .add_directive("rustls=off".parse().unwrap());

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}
