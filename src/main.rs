//! auproxy - mirrors a public lobby and streams what happens in it
//!
//! Joins once to learn the room, then watches it as a spectator and reports
//! player poses, colours, host changes and game phases.

mod config;

use anyhow::Result;
use auproxy_client::LobbyMirror;
use auproxy_net::Region;
use auproxy_testkit::{EventRecord, JsonlSink};
use config::{ProxyConfig, DEFAULT_CONFIG_PATH};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    game_code: Option<String>,
    region: Option<Region>,
    server: Option<String>,
    event_log: Option<PathBuf>,
    write_config: bool,
}

impl CliOptions {
    fn parse<I: Iterator<Item = String>>(mut args: I) -> Self {
        let mut opts = CliOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" => opts.config = args.next().map(PathBuf::from),
                "--code" => opts.game_code = args.next(),
                "--region" => {
                    opts.region = args.next().and_then(|value| match value.parse() {
                        Ok(region) => Some(region),
                        Err(err) => {
                            eprintln!("Ignoring --region: {err}");
                            None
                        }
                    })
                }
                "--server" => opts.server = args.next(),
                "--event-log" => opts.event_log = args.next().map(PathBuf::from),
                "--write-config" => opts.write_config = true,
                other => eprintln!("Ignoring unknown argument {other:?}"),
            }
        }
        opts
    }

    fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(code) = &self.game_code {
            config.game_code = code.clone();
        }
        if let Some(region) = self.region {
            config.region = region;
        }
        if let Some(server) = &self.server {
            config.server = Some(server.clone());
        }
        if let Some(path) = &self.event_log {
            config.event_log = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CliOptions::parse(env::args().skip(1));
    let path = cli.config_path();

    // RUST_LOG wins over the [debug] table.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            ProxyConfig::read(&path)
                .map(|config| config.log_filter())
                .unwrap_or_else(|_| "warn".to_string()),
        )
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting auproxy v{}", env!("CARGO_PKG_VERSION"));

    let mut config = ProxyConfig::load_from_path(&path);
    cli.apply(&mut config);

    if cli.write_config {
        config.save_to_path(&path)?;
        info!("Wrote config to {}", path.display());
        return Ok(());
    }

    let (mut mirror, mut events) = LobbyMirror::new(config.mirror_config()?);
    let mut sink = config.event_log.as_ref().map(JsonlSink::append).transpose()?;
    let recorder = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            info!("Mirror event: {:?}", event);
            if let Some(sink) = sink.as_mut() {
                if let Err(err) = sink.write(&EventRecord::now(event.kind(), &event)) {
                    warn!("Failed to record event: {err:#}");
                }
            }
        }
    });

    mirror.start().await?;
    let interrupted = tokio::select! {
        result = mirror.run() => {
            result?;
            false
        }
        _ = tokio::signal::ctrl_c() => true,
    };
    if interrupted {
        info!("Interrupted, leaving the lobby");
        mirror.shutdown().await?;
    }

    drop(mirror);
    if let Err(err) = recorder.await {
        warn!("Event recorder stopped: {err}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliOptions {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn cli_defaults_to_config_dir() {
        let cli = parse(&[]);
        assert_eq!(cli, CliOptions::default());
        assert_eq!(cli.config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn cli_overrides_config_values() {
        let cli = parse(&[
            "--code",
            "REDSUS",
            "--region",
            "as",
            "--event-log",
            "out.jsonl",
            "--bogus",
        ]);
        let mut config = ProxyConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.game_code, "REDSUS");
        assert_eq!(config.region, Region::As);
        assert_eq!(config.event_log, Some(PathBuf::from("out.jsonl")));
        assert!(!cli.write_config);
    }

    #[test]
    fn bad_region_is_ignored() {
        let cli = parse(&["--region", "moon"]);
        assert_eq!(cli.region, None);
    }
}
