//! Process configuration
//!
//! Every setting comes from a flag with an environment variable fallback.
//! Durations use humantime syntax (`15s`, `1m`, `1h30m`).

use crate::error::ConfigError;
use crate::observability::{LogFormat, LoggingConfig};
use crate::reconciler::Target;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SERVICE_NAME: &str = "exips";
pub const DEFAULT_NAMESPACE: &str = "exips";

#[derive(Parser, Debug)]
#[command(name = "exips-operator")]
#[command(about = "Publishes the external IPs of eligible nodes on a Kubernetes Service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the Service manifest to stdout
    Manifest(TargetArgs),
    /// Run the operator
    Run(RunArgs),
}

#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Name of the published Service
    #[arg(long, env = "SERVICENAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Namespace of the published Service
    #[arg(long, env = "NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Path to a kubeconfig; in-cluster config is used when unset
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Time between reconcile passes
    #[arg(long, env = "INTERVAL", default_value = "15s", value_parser = humantime::parse_duration)]
    pub interval: Duration,

    /// Time between full node re-lists
    #[arg(long, env = "RESYNC", default_value = "1m", value_parser = humantime::parse_duration)]
    pub resync: Duration,

    /// Log at debug level unless RUST_LOG says otherwise. The env value
    /// accepts 1/0, t/f, true/false, yes/no and on/off.
    #[arg(long, env = "DEBUG", action = ArgAction::SetTrue, value_parser = BoolishValueParser::new())]
    pub debug: bool,

    /// Console log format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// Validated settings for `run`.
#[derive(Debug, Clone)]
pub struct Config {
    pub target: Target,
    pub kubeconfig: Option<PathBuf>,
    pub interval: Duration,
    pub resync: Duration,
    pub logging: LoggingConfig,
}

impl TryFrom<RunArgs> for Config {
    type Error = ConfigError;

    fn try_from(args: RunArgs) -> Result<Self, Self::Error> {
        if args.target.service_name.is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        if args.target.namespace.is_empty() {
            return Err(ConfigError::EmptyNamespace);
        }
        if args.interval.is_zero() {
            return Err(ConfigError::ZeroInterval("interval"));
        }
        if args.resync.is_zero() {
            return Err(ConfigError::ZeroInterval("resync"));
        }

        Ok(Self {
            target: Target::new(args.target.service_name, args.target.namespace),
            kubeconfig: args.kubeconfig,
            interval: args.interval,
            resync: args.resync,
            logging: LoggingConfig {
                format: args.log_format,
                debug: args.debug,
            },
        })
    }
}

impl Config {
    /// Builds a client from the kubeconfig file when one is set, otherwise
    /// from the in-cluster service account.
    pub async fn client(&self) -> Result<Client, ConfigError> {
        let config = match &self.kubeconfig {
            Some(path) => {
                let kubeconfig_error = |source| ConfigError::Kubeconfig {
                    path: path.display().to_string(),
                    source,
                };
                let kubeconfig = Kubeconfig::read_from(path).map_err(kubeconfig_error)?;
                kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                    .await
                    .map_err(kubeconfig_error)?
            }
            None => kube::Config::incluster().map_err(ConfigError::InCluster)?,
        };
        Client::try_from(config).map_err(ConfigError::Client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["exips-operator", "run"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags() {
        let args = run_args(&[
            "--service-name",
            "ingress-ips",
            "--namespace",
            "ingress",
            "--interval",
            "30s",
            "--resync",
            "5m",
            "--log-format",
            "json",
        ]);
        let config = Config::try_from(args).unwrap();
        assert_eq!(config.target, Target::new("ingress-ips", "ingress"));
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.resync, Duration::from_secs(300));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result = Cli::try_parse_from(["exips-operator", "run", "--interval", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let args = run_args(&["--interval", "0s"]);
        assert!(matches!(
            Config::try_from(args),
            Err(ConfigError::ZeroInterval("interval"))
        ));
    }

    #[test]
    fn test_empty_service_name_is_rejected() {
        let args = run_args(&["--service-name", ""]);
        assert!(matches!(
            Config::try_from(args),
            Err(ConfigError::EmptyServiceName)
        ));
    }

    #[test]
    fn test_debug_env_accepts_numeric_bools() {
        std::env::set_var("DEBUG", "1");
        let on = run_args(&[]);
        std::env::set_var("DEBUG", "0");
        let off = run_args(&[]);
        std::env::remove_var("DEBUG");

        assert!(on.debug);
        assert!(!off.debug);
        assert!(run_args(&["--debug"]).debug);
    }

    #[test]
    fn test_manifest_command() {
        let cli = Cli::try_parse_from(["exips-operator", "manifest", "--namespace", "edge"]).unwrap();
        match cli.command {
            Commands::Manifest(target) => assert_eq!(target.namespace, "edge"),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
