//! Logging setup for the `kintree` binary

use tracing::Level;

/// Install a stderr `tracing` subscriber
///
/// `default_level` applies unless `RUST_LOG` says otherwise, e.g.
/// `RUST_LOG=kinematic_tree_urdf=debug kintree info robot.urdf`.
/// Output goes to stderr so reports on stdout stay machine-readable.
pub fn init_logger(default_level: Level) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
