//! Table-driven IEEE 754 half-precision conversion.
//!
//! Tables follow the classic base/shift and mantissa/exponent/offset layout so
//! that each conversion is a pair of lookups and an add.

struct ToHalf {
    base: [u16; 512],
    shift: [u8; 512],
}

struct ToSingle {
    mantissa: [u32; 2048],
    exponent: [u32; 64],
    offset: [u16; 64],
}

const TO_HALF: ToHalf = build_to_half();
const TO_SINGLE: ToSingle = build_to_single();

const fn build_to_half() -> ToHalf {
    let mut base = [0u16; 512];
    let mut shift = [0u8; 512];
    let mut i = 0;
    while i < 256 {
        let e = i as i32 - 127;
        let (b, s): (u16, u8) = if e < -24 {
            (0x0000, 24)
        } else if e < -14 {
            (0x0400 >> (-e - 14), (-e - 1) as u8)
        } else if e <= 15 {
            (((e + 15) << 10) as u16, 13)
        } else if e < 128 {
            (0x7C00, 24)
        } else {
            (0x7C00, 13)
        };
        base[i] = b;
        base[i | 0x100] = b | 0x8000;
        shift[i] = s;
        shift[i | 0x100] = s;
        i += 1;
    }
    ToHalf { base, shift }
}

const fn build_to_single() -> ToSingle {
    let mut mantissa = [0u32; 2048];
    let mut i = 1;
    while i < 1024 {
        let mut m: u32 = (i as u32) << 13;
        let mut e: u32 = 0;
        while m & 0x0080_0000 == 0 {
            e = e.wrapping_sub(0x0080_0000);
            m <<= 1;
        }
        m &= !0x0080_0000;
        e = e.wrapping_add(0x3880_0000);
        mantissa[i] = m | e;
        i += 1;
    }
    while i < 2048 {
        mantissa[i] = 0x3800_0000 + (((i - 1024) as u32) << 13);
        i += 1;
    }

    let mut exponent = [0u32; 64];
    let mut i = 1;
    while i < 31 {
        exponent[i] = (i as u32) << 23;
        i += 1;
    }
    exponent[31] = 0x4780_0000;
    exponent[32] = 0x8000_0000;
    let mut i = 33;
    while i < 63 {
        exponent[i] = 0x8000_0000 + (((i - 32) as u32) << 23);
        i += 1;
    }
    exponent[63] = 0xC780_0000;

    let mut offset = [1024u16; 64];
    offset[0] = 0;
    offset[32] = 0;

    ToSingle {
        mantissa,
        exponent,
        offset,
    }
}

/// Convert an `f32` to half-precision bits. Rounds toward zero.
pub fn f32_to_f16(value: f32) -> u16 {
    let bits = value.to_bits();
    let index = ((bits >> 23) & 0x1FF) as usize;
    TO_HALF.base[index] + ((bits & 0x007F_FFFF) >> TO_HALF.shift[index]) as u16
}

/// Convert half-precision bits to an `f32`.
pub fn f16_to_f32(half: u16) -> f32 {
    let high = (half >> 10) as usize;
    let index = TO_SINGLE.offset[high] as usize + (half & 0x3FF) as usize;
    f32::from_bits(TO_SINGLE.mantissa[index].wrapping_add(TO_SINGLE.exponent[high]))
}
