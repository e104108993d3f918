//! Six-letter room codes.
//!
//! Codes travel as a signed 32-bit integer. The first two letters form a base-26
//! number in the low 10 bits, the last four letters a base-26 number in the next
//! 20 bits, and the top bit marks the six-letter scheme.

use thiserror::Error;

const ALPHABET: &[u8; 26] = b"QWXRTYLPESDFGHUJKZOCVBINMA";

/// Maps `letter - 'A'` to the letter's index in [`ALPHABET`].
const LETTER_INDEX: [u32; 26] = [
    25, 21, 19, 10, 8, 11, 12, 13, 22, 15, 16, 6, 24, 23, 18, 7, 0, 3, 9, 4, 14, 20, 1, 2, 5, 17,
];

/// Error returned when a string cannot be turned into a room code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeError {
    /// The code did not have exactly six characters.
    #[error("room code must be 6 letters, got {0}")]
    Length(usize),
    /// A character outside `A-Z`.
    #[error("invalid room code character {0:?}")]
    Character(char),
}

/// Encode a six-letter room code. Lower-case input is accepted.
pub fn encode_code(code: &str) -> Result<i32, CodeError> {
    let len = code.chars().count();
    if len != 6 {
        return Err(CodeError::Length(len));
    }

    let mut digits = [0u32; 6];
    for (slot, ch) in digits.iter_mut().zip(code.chars()) {
        let upper = ch.to_ascii_uppercase();
        if !upper.is_ascii_uppercase() {
            return Err(CodeError::Character(ch));
        }
        *slot = LETTER_INDEX[(upper as u8 - b'A') as usize];
    }

    let [a, b, c, d, e, f] = digits;
    let one = (a + 26 * b) & 0x3FF;
    let two = c + 26 * (d + 26 * (e + 26 * f));

    Ok((one | ((two << 10) & 0x3FFF_FC00) | 0x8000_0000) as i32)
}

/// Decode a room code integer back into its six letters.
pub fn decode_code(value: i32) -> String {
    let value = value as u32;
    let a = value & 0x3FF;
    let b = (value >> 10) & 0xFFFFF;

    let letter = |index: u32| ALPHABET[(index % 26) as usize] as char;

    [
        letter(a),
        letter(a / 26),
        letter(b),
        letter(b / 26),
        letter(b / (26 * 26)),
        letter(b / (26 * 26 * 26)),
    ]
    .iter()
    .collect()
}
