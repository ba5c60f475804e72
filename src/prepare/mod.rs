/// Result events posted back to the render thread.
pub mod dispatch;
/// Background execution contexts.
pub mod executor;
/// Renders single frames ahead of time.
pub mod preparer;
/// Chooses which frames to prepare.
pub mod strategy;
