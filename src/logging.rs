use tracing_subscriber::{fmt, prelude::*, EnvFilter};


/// Install the stderr log subscriber. stdout is reserved for the groups.
///
/// RUST_LOG overrides the level picked by `verbose`.
pub fn init( verbose: bool ) {
	let default_level = if verbose { "debug" } else { "warn" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::registry()
		.with(filter)
		.with(
			fmt::layer()
				.with_target(false)
				.with_writer(std::io::stderr),
		)
		.init();
}
