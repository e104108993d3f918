//! Linear mapping between 16-bit wire values and floats.
//!
//! Positions and velocities are sent as `u16` spread over `[-40, 40]`.

/// Lower bound of the position range.
pub const POSITION_MIN: f32 = -40.0;
/// Upper bound of the position range.
pub const POSITION_MAX: f32 = 40.0;

/// Map a normalized value in `[0, 1]` onto `[min, max]`. Out-of-range input is clamped.
pub fn lerp(t: f32, min: f32, max: f32) -> f32 {
    min + (max - min) * t.clamp(0.0, 1.0)
}

/// Inverse of [`lerp`], unclamped.
pub fn unlerp(value: f32, min: f32, max: f32) -> f32 {
    (value - min) / (max - min)
}

/// Decode a wire `u16` into a position component.
pub fn u16_to_position(raw: u16) -> f32 {
    lerp(raw as f32 / u16::MAX as f32, POSITION_MIN, POSITION_MAX)
}

/// Encode a position component as a wire `u16`, saturating at the range ends.
pub fn position_to_u16(value: f32) -> u16 {
    let t = unlerp(value, POSITION_MIN, POSITION_MAX).clamp(0.0, 1.0);
    (t * u16::MAX as f32).round() as u16
}
