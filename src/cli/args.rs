//! Command-line argument parsing

use crate::config::{ClientConfig, MAX_ATTEMPTS_LIMIT};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ceph-rest")]
#[command(about = "Manage RBD images, namespaces and CephFS through the Ceph dashboard REST API")]
#[command(version, author)]
pub struct Args {
    /// Dashboard host name or IP
    #[arg(long = "address", short = 'a', help = "Dashboard address (default: $CEPH_ADDRESS or localhost)")]
    pub address: Option<String>,

    #[arg(long = "port", help = "Dashboard port (default: 8443)")]
    pub port: Option<u16>,

    #[arg(long = "protocol", help = "http or https")]
    pub protocol: Option<String>,

    #[arg(long = "api-path", help = "API base path (default: api)")]
    pub api_path: Option<String>,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    #[arg(long = "username", short = 'u', help = "Dashboard user")]
    pub username: Option<String>,

    #[arg(long = "password", short = 'p', help = "Dashboard password")]
    pub password: Option<String>,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print command results and errors"
    )]
    pub quiet: bool,

    #[arg(
        long = "max-attempts",
        help = "How often a failed background task is resubmitted before giving up"
    )]
    pub max_attempts: Option<u32>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// RBD image operations
    #[command(subcommand)]
    Image(ImageCommand),
    /// RBD snapshot operations
    #[command(subcommand)]
    Snapshot(SnapshotCommand),
    /// RBD namespace operations
    #[command(subcommand)]
    Namespace(NamespaceCommand),
    /// CephFS operations
    #[command(subcommand)]
    Fs(FsCommand),
    /// Show running and finished background tasks
    Tasks {
        #[arg(long, help = "Only tasks with this name, e.g. rbd/delete")]
        name: Option<String>,
    },
}

/// Pool and optional namespace an image lives in
#[derive(clap::Args, Debug, Clone)]
pub struct ImageLocation {
    #[arg(long, short = 'P')]
    pub pool: String,

    #[arg(long, short = 'n')]
    pub namespace: Option<String>,
}

impl ImageLocation {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }
}

#[derive(Subcommand, Debug)]
pub enum ImageCommand {
    /// List images
    List {
        #[arg(long, short = 'P')]
        pool: Option<String>,
    },
    /// Show one image
    Get {
        #[command(flatten)]
        location: ImageLocation,
        name: String,
    },
    /// Create an image
    Create {
        #[command(flatten)]
        location: ImageLocation,
        name: String,
        #[arg(long, short = 's', value_parser = parse_size, help = "Size, e.g. 10G or 512M")]
        size: u64,
        #[arg(long, value_parser = parse_size, default_value = "4M")]
        obj_size: u64,
        #[arg(long = "feature", help = "Image feature, may be repeated")]
        features: Vec<String>,
    },
    /// Delete one or more images concurrently
    Delete {
        #[command(flatten)]
        location: ImageLocation,
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Move an image to the trash
    Trash {
        #[command(flatten)]
        location: ImageLocation,
        name: String,
        #[arg(long, default_value = "0", help = "Seconds before the image may be purged")]
        delay: u64,
    },
    /// Copy an image
    Copy {
        #[command(flatten)]
        location: ImageLocation,
        name: String,
        dest_name: String,
        #[arg(long, help = "Destination pool (default: source pool)")]
        dest_pool: Option<String>,
        #[arg(long)]
        dest_namespace: Option<String>,
    },
    /// Rename an image
    Rename {
        #[command(flatten)]
        location: ImageLocation,
        name: String,
        new_name: String,
    },
    /// Resize an image
    Resize {
        #[command(flatten)]
        location: ImageLocation,
        name: String,
        #[arg(long, short = 's', value_parser = parse_size)]
        size: u64,
    },
}

#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// Snapshot an image
    Create {
        #[command(flatten)]
        location: ImageLocation,
        image: String,
        snapshot: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum NamespaceCommand {
    List {
        #[arg(long, short = 'P')]
        pool: String,
    },
    Create {
        #[arg(long, short = 'P')]
        pool: String,
        namespace: String,
    },
    Delete {
        #[arg(long, short = 'P')]
        pool: String,
        namespace: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum FsCommand {
    /// List filesystems
    List,
    /// List directories
    Ls {
        #[arg(long, default_value = "1")]
        fs_id: i64,
        #[arg(default_value = "/")]
        path: String,
        #[arg(long, default_value = "1")]
        depth: u32,
    },
    /// Create a directory
    Mkdir {
        #[arg(long, default_value = "1")]
        fs_id: i64,
        path: String,
    },
    /// Remove a directory
    Rmdir {
        #[arg(long, default_value = "1")]
        fs_id: i64,
        path: String,
    },
    /// Show a quota, or set it when a limit is given
    Quota {
        #[arg(long, default_value = "1")]
        fs_id: i64,
        path: String,
        #[arg(long, value_parser = parse_size)]
        max_bytes: Option<u64>,
        #[arg(long)]
        max_files: Option<u64>,
    },
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(attempts) = self.max_attempts {
            if attempts == 0 || attempts > MAX_ATTEMPTS_LIMIT {
                return Err(format!(
                    "--max-attempts must be between 1 and {}",
                    MAX_ATTEMPTS_LIMIT
                ));
            }
        }
        if let Some(protocol) = &self.protocol {
            if protocol != "http" && protocol != "https" {
                return Err("--protocol must be http or https".to_string());
            }
        }
        if self.username.is_none() || self.password.is_none() {
            return Err("--username and --password are required".to_string());
        }
        Ok(())
    }

    /// Environment defaults overridden by the flags given on the command line
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();

        if let Some(address) = &self.address {
            config.server.address = address.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(protocol) = &self.protocol {
            config.server.protocol = protocol.clone();
        }
        if let Some(api_path) = &self.api_path {
            config.server.api_path = api_path.clone();
        }
        if self.skip_tls {
            config.server.skip_tls = true;
        }
        if let Some(attempts) = self.max_attempts {
            config.engine.max_attempts = attempts;
        }
        config.verbose = config.verbose || self.verbose;
        config
    }
}

/// Parse sizes like `1024`, `512K`, `4M`, `10G`, `1T` (binary units)
pub fn parse_size(value: &str) -> Result<u64, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let number: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size: {}", value))?;
    let shift = match unit.trim_end_matches(['B', 'b', 'i']).to_ascii_uppercase().as_str() {
        "" => 0,
        "K" => 10,
        "M" => 20,
        "G" => 30,
        "T" => 40,
        _ => return Err(format!("invalid size unit in {}", value)),
    };

    number
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size too large: {}", value))
}
