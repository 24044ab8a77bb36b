use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Runtime configuration for the `uidpool-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults suitable for a single-node
/// deployment.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "uidpool-server",
    version,
    about = "An HTTP service handing out durable, unique, monotonic 64-bit IDs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// File recording the last issued ID.
    ///
    /// Created on first start. Deleting it resets the pool, which breaks
    /// uniqueness against every ID issued before.
    ///
    /// Environment variable: `STATE_FILE`
    #[arg(long, env = "STATE_FILE", default_value = "last-used-id.txt")]
    pub state_file: PathBuf,

    /// Seconds in-flight requests are given to finish after a termination
    /// signal before the process exits anyway.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_SECS`
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = 10)]
    pub shutdown_grace_secs: u64,

    /// Maximum milliseconds a request waits for the allocator. `0` waits
    /// indefinitely.
    ///
    /// Environment variable: `REQUEST_TIMEOUT_MS`
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 0)]
    pub request_timeout_ms: u64,

    /// Skip `fsync` when persisting. Faster, but an OS crash or power loss
    /// may roll the state file back and lead to reissued IDs.
    ///
    /// Environment variable: `NO_SYNC`
    #[arg(long, env = "NO_SYNC", default_value_t = false)]
    pub no_sync: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub state_file: PathBuf,
    pub shutdown_grace: Duration,
    pub request_timeout: Option<Duration>,
    pub sync: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.state_file.as_os_str().is_empty() {
            bail!("STATE_FILE must not be empty");
        }

        if args.state_file.is_dir() {
            bail!(
                "STATE_FILE ({}) is a directory, expected a file path",
                args.state_file.display()
            );
        }

        let request_timeout =
            (args.request_timeout_ms > 0).then(|| Duration::from_millis(args.request_timeout_ms));

        Ok(Self {
            server_addr: args.server_addr,
            state_file: args.state_file,
            shutdown_grace: Duration::from_secs(args.shutdown_grace_secs),
            request_timeout,
            sync: !args.no_sync,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let argv = std::iter::once("uidpool-server").chain(args.iter().copied());
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn explicit_arguments() {
        let config = parse(&[
            "--server-addr",
            "127.0.0.1:9000",
            "--state-file",
            "/var/lib/uidpool/last-id",
            "--shutdown-grace-secs",
            "3",
            "--request-timeout-ms",
            "250",
            "--no-sync",
        ])
        .unwrap();

        assert_eq!(config.server_addr, "127.0.0.1:9000");
        assert_eq!(config.state_file, PathBuf::from("/var/lib/uidpool/last-id"));
        assert_eq!(config.shutdown_grace, Duration::from_secs(3));
        assert_eq!(config.request_timeout, Some(Duration::from_millis(250)));
        assert!(!config.sync);
    }

    #[test]
    fn zero_timeout_waits_indefinitely() {
        let config = parse(&["--request-timeout-ms", "0"]).unwrap();
        assert_eq!(config.request_timeout, None);
    }

    #[test]
    fn rejects_directory_state_file() {
        let dir = std::env::temp_dir();
        let err = parse(&["--state-file", dir.to_str().unwrap()]).unwrap_err();
        assert!(err.to_string().contains("is a directory"));
    }

    #[test]
    fn rejects_empty_state_file() {
        assert!(parse(&["--state-file", ""]).is_err());
    }
}
