//! scamera - camera capture core.
//!
//! Opens and switches cameras, exposes zoom and torch only where the
//! hardware supports them, takes photos and records chunked video that
//! survives storage failures. Platform media APIs sit behind the traits in
//! [`capture::traits`]; the optional `native` feature provides a desktop
//! backend.

pub mod capture;
pub mod controls;
pub mod photo;
pub mod recorder;
pub mod settings;
pub mod share;
pub mod utils;

pub use controls::{CameraControls, ZoomLevel};
pub use utils::error::{CameraError, CameraResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default `scamera=debug` filter. Calling this
/// twice is harmless.
pub fn init_logging() {
    let result = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scamera=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if result.is_ok() {
        tracing::info!("scamera v{} logging initialised", env!("CARGO_PKG_VERSION"));
    }
}
