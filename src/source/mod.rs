/// Frame placement and compositing metadata.
pub mod frame_info;
/// GIF decoding through the `image` crate.
pub mod gif;
/// Decoder boundary traits and the shared image handle.
pub mod image;
/// Pre-decoded in-memory images.
pub mod memory;
/// Decoded image plus eagerly rendered frames.
pub mod result;
