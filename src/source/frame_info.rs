use serde::{Deserialize, Serialize};

use crate::foundation::core::{IntRect, Size, clamp_to_i32};

/// How a frame's pixels combine with the canvas beneath.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendOperation {
    /// Alpha-blend over the existing canvas.
    #[default]
    BlendWithPrevious,
    /// Clear the frame rectangle, then draw.
    NoBlend,
}

/// What happens to a frame's rectangle before the next frame is drawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposalMethod {
    /// Leave the pixels in place.
    #[default]
    DoNotDispose,
    /// Clear the frame rectangle to transparent.
    DisposeToBackground,
    /// Restore the canvas to its state before this frame.
    DisposeToPrevious,
}

/// Placement and compositing metadata of one frame, in canvas coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameInfo {
    /// 0-based frame index.
    pub frame_number: usize,
    /// Left edge on the canvas.
    pub x_offset: i32,
    /// Top edge on the canvas.
    pub y_offset: i32,
    /// Frame width; non-positive means invisible.
    pub width: i32,
    /// Frame height; non-positive means invisible.
    pub height: i32,
    /// Blend with the canvas or replace.
    pub blend_operation: BlendOperation,
    /// Disposal before the next frame.
    pub disposal_method: DisposalMethod,
}

impl FrameInfo {
    /// Frame rectangle on the canvas.
    pub fn rect(&self) -> IntRect {
        IntRect::from_xywh(self.x_offset, self.y_offset, self.width, self.height)
    }

    /// Return `false` for frames with a non-positive dimension.
    pub fn is_visible(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Return `true` when the frame rectangle covers the whole canvas.
    pub fn covers(&self, canvas: Size) -> bool {
        self.x_offset == 0
            && self.y_offset == 0
            && self.width == clamp_to_i32(canvas.width)
            && self.height == clamp_to_i32(canvas.height)
    }

    /// A full-canvas frame that ignores everything drawn before it.
    pub fn is_keyframe(&self, canvas: Size) -> bool {
        self.blend_operation == BlendOperation::NoBlend && self.covers(canvas)
    }
}
