/// Pixel buffers.
pub mod bitmap;
/// Premultiplied pixel blending.
pub mod blend;
/// Buffer allocation.
pub mod factory;
/// Drawing surfaces.
pub mod target;
