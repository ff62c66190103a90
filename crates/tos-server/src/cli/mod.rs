pub mod document;
pub mod staff_cache;

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "tos")]
#[command(version, about = "Terms-of-service acceptance gate")]
pub struct Cli {
    /// Path to tos.toml
    #[arg(long, global = true, env = "TOS_CONFIG", default_value = "tos.toml")]
    pub config: PathBuf,

    /// Path to data directory (overrides config file)
    #[arg(long, global = true, env = "TOS_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Staff skip-cache maintenance
    #[command(subcommand)]
    StaffCache(StaffCacheCommands),
    /// Terms documents
    #[command(subcommand)]
    Document(DocumentCommands),
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// HTTP listen address (overrides config file)
    #[arg(long, env = "TOS_HTTP_ADDR")]
    pub http_addr: Option<SocketAddr>,
}

#[derive(Subcommand, Debug)]
pub enum StaffCacheCommands {
    /// Re-add every staff and superuser account to the skip cache
    Rebuild(RebuildArgs),
}

#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Running server to call
    #[arg(long, env = "TOS_ADDR", default_value = "http://localhost:9191")]
    pub server: String,

    /// Admin bearer token
    #[arg(long, env = "TOS_ADMIN_TOKEN")]
    pub token: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum DocumentCommands {
    /// Save a new document from a file. Opens the database directly, so the
    /// server must be stopped.
    Publish(PublishArgs),
    /// List every document, newest last
    List,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// File holding the document text
    #[arg(long)]
    pub file: PathBuf,

    /// Store as an inactive draft instead of activating it
    #[arg(long)]
    pub draft: bool,
}

/// Shorten for table output.
pub fn truncate(s: &str, max: usize) -> String {
    let single_line = s.replace('\n', " ");
    if single_line.chars().count() <= max {
        single_line
    } else {
        let cut: String = single_line.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_publish() {
        let cli = Cli::parse_from(["tos", "document", "publish", "--file", "terms.txt", "--draft"]);
        match cli.command {
            Commands::Document(DocumentCommands::Publish(args)) => {
                assert_eq!(args.file, PathBuf::from("terms.txt"));
                assert!(args.draft);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_staff_cache_rebuild() {
        let cli = Cli::parse_from([
            "tos",
            "--data-dir",
            "/tmp/tos",
            "staff-cache",
            "rebuild",
            "--server",
            "http://tos.internal:9191",
        ]);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/tos")));
        match cli.command {
            Commands::StaffCache(StaffCacheCommands::Rebuild(args)) => {
                assert_eq!(args.server, "http://tos.internal:9191");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("line one\nline two", 8), "line on…");
    }
}
