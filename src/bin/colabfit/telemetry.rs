//! Log output for the command-line tool.
//!
//! Library events go to stderr through a `fmt` subscriber. The filter is read
//! from `COLABFIT_LOG` using the usual `EnvFilter` directive syntax and
//! defaults to `warn`.

use tracing_subscriber::EnvFilter;

const ENV_VAR: &str = "COLABFIT_LOG";

pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
