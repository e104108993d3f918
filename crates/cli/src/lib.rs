#![warn(missing_docs)]
//! Helpers shared by the debug binaries: hex text, packet direction
//! arguments, and the hex ⇄ JSON conversions behind `parse` and `compose`.

use anyhow::{bail, Context, Result};
use auproxy_net::{decode_packet, encode_packet, Bound, Packet};

/// Split a leading `server` argument off `args`.
///
/// Packets are client-bound unless the first argument is `server`.
pub fn split_bound(args: &[String]) -> (Bound, &[String]) {
    match args.split_first() {
        Some((first, rest)) if first.eq_ignore_ascii_case("server") => (Bound::Server, rest),
        _ => (Bound::Client, args),
    }
}

/// Read bytes from hex text. Any non-hex character separates groups, and
/// each group is read two digits at a time, so `"01 00 05"`, `"010005"` and
/// `"01:00:5"` are all accepted.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for group in text.split(|c: char| !c.is_ascii_hexdigit()) {
        let digits = group.as_bytes();
        for pair in digits.chunks(2) {
            let pair = std::str::from_utf8(pair).context("Hex digits are ASCII")?;
            bytes.push(
                u8::from_str_radix(pair, 16)
                    .with_context(|| format!("Invalid hex byte {:?}", pair))?,
            );
        }
    }
    if bytes.is_empty() {
        bail!("No hex bytes in input");
    }
    Ok(bytes)
}

/// Space-separated lowercase hex.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Decode hex text into a packet and render it as pretty JSON.
pub fn parse_to_json(hex: &str, bound: Bound) -> Result<String> {
    let bytes = parse_hex(hex)?;
    let packet = decode_packet(&bytes, bound)
        .with_context(|| format!("Failed to decode {}-bound packet", bound.as_str()))?;
    Ok(serde_json::to_string_pretty(&packet)?)
}

/// Read a JSON packet and encode it as hex.
pub fn compose_from_json(json: &str, bound: Bound) -> Result<String> {
    let packet: Packet = serde_json::from_str(json).context("Invalid packet JSON")?;
    let bytes = encode_packet(&packet, bound)
        .with_context(|| format!("Failed to encode {}-bound packet", bound.as_str()))?;
    Ok(to_hex(&bytes))
}
