use clap::Parser;
use std::net::IpAddr;
use std::path::PathBuf;

/// Issue team-scoped sessions through OAuth login
#[derive(Parser, Debug, Clone)]
#[command(name = "teamgate-server")]
#[command(about = "Issue team-scoped sessions through OAuth login")]
#[command(version)]
pub struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, value_name = "FILE", default_value = "teamgate.toml")]
    pub config: PathBuf,

    /// Address to bind to, overriding server.host
    #[arg(long, value_name = "ADDR")]
    pub host: Option<IpAddr>,

    /// Port to bind to, overriding server.port
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Validate the configuration and signing key, then exit
    #[arg(long)]
    pub check: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["teamgate-server"]);
        assert_eq!(args.config, PathBuf::from("teamgate.toml"));
        assert_eq!(args.host, None);
        assert_eq!(args.port, None);
        assert!(!args.check);
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "teamgate-server",
            "--config",
            "/etc/teamgate.toml",
            "--host",
            "0.0.0.0",
            "-p",
            "9090",
            "--check",
        ]);
        assert_eq!(args.config, PathBuf::from("/etc/teamgate.toml"));
        assert_eq!(args.host, Some("0.0.0.0".parse().unwrap()));
        assert_eq!(args.port, Some(9090));
        assert!(args.check);
    }
}
