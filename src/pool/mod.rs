/// Reference-counted pool with exclusivity tracking.
pub mod counting;
/// Shared value handles.
pub mod reference;
