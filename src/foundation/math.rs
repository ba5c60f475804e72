pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Scale `value` by `num / den`, rounding half up (towards positive infinity on ties).
///
/// Every geometry mapping in the crate goes through this function so frame rectangles, disposal
/// rectangles and scratch sizes agree to the pixel. Returns 0 when `den` is 0.
pub(crate) fn scale_round(value: i32, num: u32, den: u32) -> i32 {
    if den == 0 {
        return 0;
    }
    let v = i64::from(value) * i64::from(num);
    let d = i64::from(den);
    let scaled = (2 * v + d).div_euclid(2 * d);
    scaled.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
