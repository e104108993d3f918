//! Decode a hex dump into a packet and print it as JSON.
//!
//! Usage:
//!   parse 0a 00 01 ff
//!   parse server 08 00 01 00 4a e2 02 03 04 6e 61 6d 65

use anyhow::Result;
use auproxy_cli::{parse_to_json, split_bound};
use tracing::Level;
use tracing_subscriber::fmt;

fn main() -> Result<()> {
    let _ = fmt().with_max_level(Level::INFO).try_init();
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (bound, rest) = split_bound(&args);
    tracing::debug!("Parsing {}-bound packet", bound.as_str());
    println!("{}", parse_to_json(&rest.join(""), bound)?);
    Ok(())
}
