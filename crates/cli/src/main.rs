use anyhow::{Context, Result};
use auproxy_core::{decode_code, encode_code, VersionInfo};
use auproxy_net::Region;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt;

#[derive(Parser, Debug)]
#[command(author, version, about = "Room code, version and server helpers for auproxy", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a six-letter room code to its wire integer
    EncodeCode {
        /// Room code, e.g. ABCDEF
        code: String,
    },
    /// Convert a wire integer to its room code
    DecodeCode {
        /// Signed wire value
        #[arg(allow_hyphen_values = true)]
        value: i32,
    },
    /// Pack a client version into its wire integer
    EncodeVersion {
        /// Release year
        year: u32,
        /// Release month
        month: u32,
        /// Release day
        day: u32,
        /// Build number
        #[arg(default_value_t = 0)]
        build: u32,
    },
    /// Unpack a client version integer
    DecodeVersion {
        /// Wire value
        value: u32,
    },
    /// List the official master servers of a region
    Servers {
        /// NA, EU or AS
        #[arg(default_value = "NA")]
        region: Region,
    },
}

fn main() -> Result<()> {
    let _ = fmt().with_max_level(Level::INFO).try_init();
    let args = Args::parse();
    for line in run(args.command)? {
        println!("{}", line);
    }
    Ok(())
}

fn run(command: Command) -> Result<Vec<String>> {
    let lines = match command {
        Command::EncodeCode { code } => {
            let value = encode_code(&code).with_context(|| format!("Invalid room code {:?}", code))?;
            vec![value.to_string()]
        }
        Command::DecodeCode { value } => vec![decode_code(value)],
        Command::EncodeVersion {
            year,
            month,
            day,
            build,
        } => vec![VersionInfo::new(year, month, day, build).encode().to_string()],
        Command::DecodeVersion { value } => {
            let version = VersionInfo::decode(value);
            vec![format!("{} (build {})", version, version.build)]
        }
        Command::Servers { region } => {
            let mut lines = vec![format!("default: {}", region.default_server())];
            lines.extend(region.official().iter().map(|addr| addr.to_string()));
            lines
        }
    };
    Ok(lines)
}
