/// Walk-back compositing of full frames.
pub mod compositor;
/// Eager decoding of all frames or a preview.
pub mod decode;
/// Single-frame drawing, scaling and scratch management.
pub mod drawer;
