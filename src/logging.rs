use tracing_subscriber::EnvFilter;

fn default_directives(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "dashctl_lib=info,warn",
        _ => "dashctl_lib=debug,info",
    }
}

/// Route `log` records to stderr. `RUST_LOG` wins over `-v`.
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbosity)));

    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_raises_crate_level() {
        assert_eq!(default_directives(0), "warn");
        assert!(default_directives(1).contains("dashctl_lib=info"));
        assert!(default_directives(5).contains("dashctl_lib=debug"));
    }
}
