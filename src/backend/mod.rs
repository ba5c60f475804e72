/// Draw path with the cached / reused / created / fallback chain.
pub mod bitmap_backend;
/// Backend assembly from options.
pub mod factory;
/// Inactivity detection.
pub mod inactivity;
/// Diagnostic listeners.
pub mod listener;
/// Backend configuration.
pub mod opts;
/// Frame renderers.
pub mod renderer;
