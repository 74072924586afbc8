use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

const ENV_NAME: &str = "BENCHTOP_LOG";

/// Install the global subscriber. The filter comes from `BENCHTOP_LOG` and
/// defaults to INFO.
pub fn init() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var(ENV_NAME)
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
