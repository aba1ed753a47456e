use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "tenant-storage")]
#[command(about = "Route per-user file uploads to local disk or S3")]
#[command(long_about = "Binds users to storage backends and moves files through the bound backend")]
#[command(version)]
pub struct Cli {
    /// Bind a user to a backend, as USER=TAG (repeatable)
    #[arg(short, long = "bind", value_name = "USER=TAG", value_parser = parse_binding)]
    pub bindings: Vec<(String, String)>,

    /// Upload a local file, as USER:NAME=PATH
    #[arg(long, value_name = "USER:NAME=PATH", value_parser = parse_put)]
    pub put: Vec<PutRequest>,

    /// Download a file to stdout, as USER:NAME
    #[arg(long, value_name = "USER:NAME", value_parser = parse_get)]
    pub get: Vec<(String, String)>,

    /// Root directory for local-disk users
    #[arg(long)]
    pub local_root: Option<PathBuf>,

    /// S3 bucket name
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// S3 key prefix
    #[arg(long)]
    pub s3_prefix: Option<String>,

    /// AWS region
    #[arg(long)]
    pub aws_region: Option<String>,

    /// Custom S3 endpoint URL (enables path-style addressing)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Reject unknown backend tags instead of falling back to local
    #[arg(long)]
    pub strict_tags: bool,

    /// Print collected metrics (Prometheus text format) to stderr on exit
    #[arg(long)]
    pub metrics: bool,

    /// Configuration file path (JSON format)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PutRequest {
    pub user_id: String,
    pub file_name: String,
    pub path: PathBuf,
}

fn parse_binding(arg: &str) -> Result<(String, String), String> {
    let (user, tag) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected USER=TAG, got {:?}", arg))?;
    if user.is_empty() {
        return Err("user id must not be empty".to_string());
    }
    Ok((user.to_string(), tag.to_string()))
}

fn parse_get(arg: &str) -> Result<(String, String), String> {
    let (user, name) = arg
        .split_once(':')
        .ok_or_else(|| format!("expected USER:NAME, got {:?}", arg))?;
    Ok((user.to_string(), name.to_string()))
}

fn parse_put(arg: &str) -> Result<PutRequest, String> {
    let (target, path) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected USER:NAME=PATH, got {:?}", arg))?;
    let (user_id, file_name) = parse_get(target)?;
    Ok(PutRequest {
        user_id,
        file_name,
        path: PathBuf::from(path),
    })
}

impl Cli {
    /// Parse command line arguments
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Bindings to apply, defaulting to the two-user demo when none are given.
    pub fn effective_bindings(&self) -> Vec<(String, String)> {
        if self.bindings.is_empty() {
            vec![
                ("user1".to_string(), "local".to_string()),
                ("user2".to_string(), "s3".to_string()),
            ]
        } else {
            self.bindings.clone()
        }
    }
}
