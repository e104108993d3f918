//! Encode a JSON packet and print its bytes as hex.
//!
//! Usage:
//!   compose '{"op":"Ping","nonce":1}'
//!   compose server '{"op":"Reliable","nonce":1,"payloads":[{"type":"RemoveGame"}]}'
//!
//! With no JSON argument the packet is read from stdin.

use anyhow::{Context, Result};
use auproxy_cli::{compose_from_json, split_bound};
use std::io::Read;
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> Result<()> {
    let _ = fmt().with_max_level(Level::INFO).try_init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (bound, rest) = split_bound(&args);

    let json = if rest.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read packet JSON from stdin")?;
        input
    } else {
        rest.join(" ")
    };

    println!("{}", compose_from_json(&json, bound)?);
    Ok(())
}
