use crate::foundation::math::mul_div255_u8;

/// One premultiplied RGBA8 pixel in memory order.
pub type PremulRgba8 = [u8; 4];

/// How source pixels combine with the destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// Porter-Duff source-over.
    SrcOver,
    /// Source replaces the destination.
    Src,
}

/// Premultiplied source-over.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    match src[3] {
        0 => dst,
        255 => src,
        sa => {
            let inv = 255u16 - u16::from(sa);
            let mut out = [0u8; 4];
            for i in 0..4 {
                out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
            }
            out
        }
    }
}

pub(crate) fn blend_px(dst: &mut [u8], src: &[u8], mode: BlendMode) {
    match mode {
        BlendMode::Src => dst.copy_from_slice(src),
        BlendMode::SrcOver => {
            let out = over([dst[0], dst[1], dst[2], dst[3]], [src[0], src[1], src[2], src[3]]);
            dst.copy_from_slice(&out);
        }
    }
}

pub(crate) fn premultiply(px: [u8; 4]) -> PremulRgba8 {
    let a = u16::from(px[3]);
    [
        mul_div255_u8(u16::from(px[0]), a),
        mul_div255_u8(u16::from(px[1]), a),
        mul_div255_u8(u16::from(px[2]), a),
        px[3],
    ]
}

pub(crate) fn unpremultiply(px: PremulRgba8) -> [u8; 4] {
    let a = u32::from(px[3]);
    if a == 0 {
        return [0, 0, 0, 0];
    }
    let un = |c: u8| (((u32::from(c) * 255) + a / 2) / a).min(255) as u8;
    [un(px[0]), un(px[1]), un(px[2]), px[3]]
}

#[cfg(test)]
#[path = "../../tests/unit/render/blend.rs"]
mod tests;
