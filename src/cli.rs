//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::config::StoreBackend;
use crate::dispatch::DispatchRequest;
use crate::models::CallbackMethod;
use crate::store::StatsPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// MediaDispatch - fan media analysis jobs out to an Analyzer and
/// correlate their results
///
/// Examples:
///   mediadispatch --analyzer-url http://localhost:9000/analyze serve --port 8080
///   mediadispatch --analyzer-url http://localhost:9000/analyze dispatch https://cdn.example/a.mp4 https://cdn.example/b.mp4
///   mediadispatch dispatch https://cdn.example/a.mp4 --callback-url https://me.example/callback
///   mediadispatch query --batch 0b6f... --store-path callback_results.jsonl
///   mediadispatch --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .mediadispatch.toml in the current directory
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Analyzer endpoint URL
    #[arg(long, value_name = "URL", global = true, env = "MEDIADISPATCH_ANALYZER_URL")]
    pub analyzer_url: Option<String>,

    /// Time budget of one blocking Analyzer invocation, in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run in quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Generate a default .mediadispatch.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the dispatch and callback HTTP surfaces
    Serve(ServeArgs),
    /// Dispatch files once and print the response
    Dispatch(DispatchArgs),
    /// Read stored callback results from a JSON-lines store
    Query(QueryArgs),
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Result store backend
    #[arg(long, value_name = "BACKEND")]
    pub store: Option<StoreBackend>,

    /// File used by the jsonl store
    #[arg(long, value_name = "FILE")]
    pub store_path: Option<PathBuf>,

    /// How batch statistics count repeated callbacks
    #[arg(long, value_name = "POLICY")]
    pub stats_policy: Option<StatsPolicy>,

    /// Reject callbacks that carry no task id
    #[arg(long)]
    pub reject_orphans: bool,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct DispatchArgs {
    /// Media file URLs to analyze
    #[arg(required = true, value_name = "FILE_URL")]
    pub file_urls: Vec<String>,

    /// Base callback URL; selects async mode
    ///
    /// Each task's result is delivered to <CALLBACK_URL>/<task_id>.
    #[arg(long, value_name = "URL")]
    pub callback_url: Option<String>,

    /// Batch id (generated if omitted)
    #[arg(long, value_name = "ID")]
    pub batch_id: Option<String>,

    /// Task id for a single file (generated if omitted)
    #[arg(long, value_name = "ID")]
    pub task_id: Option<String>,

    /// Method the Analyzer uses for callbacks (POST or PUT)
    #[arg(long, value_name = "METHOD")]
    pub method: Option<CallbackMethod>,

    /// Concurrent blocking invocations
    #[arg(long, value_name = "NUM")]
    pub pool_size: Option<usize>,

    /// Output format (json, markdown)
    #[arg(long, default_value = "json", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Write the response to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit with code 2 when any task failed
    #[arg(long)]
    pub fail_on_error: bool,
}

impl DispatchArgs {
    /// Build the same request the HTTP surface would receive.
    pub fn to_request(&self) -> DispatchRequest {
        let (file_url, files_url) = match self.file_urls.as_slice() {
            [single] => (Some(single.clone()), None),
            many => (None, Some(many.to_vec())),
        };

        DispatchRequest {
            file_url,
            files_url,
            jobs: None,
            callback_url: self.callback_url.clone(),
            task_id: self.task_id.clone(),
            batch_id: self.batch_id.clone(),
            method: self.method,
        }
    }
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Show the most recent records of a task
    #[arg(long, value_name = "ID", required_unless_present = "batch", conflicts_with = "batch")]
    pub task: Option<String>,

    /// Show every record of a batch with statistics
    #[arg(long, value_name = "ID")]
    pub batch: Option<String>,

    /// Records to show for a task (at most 10)
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,

    /// JSON-lines store to read
    #[arg(long, value_name = "FILE")]
    pub store_path: Option<PathBuf>,

    /// How batch statistics count repeated callbacks
    #[arg(long, value_name = "POLICY")]
    pub stats_policy: Option<StatsPolicy>,
}

/// Output format for dispatch responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON format (default)
    #[default]
    Json,
    /// Markdown format
    Markdown,
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.command.is_none() {
            return Err("A command is required: serve, dispatch or query".to_string());
        }

        if let Some(ref url) = self.analyzer_url {
            if !is_http_url(url) {
                return Err("Analyzer URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(timeout) = self.timeout {
            if timeout == 0 {
                return Err("Timeout must be at least 1 second".to_string());
            }
        }

        match &self.command {
            Some(Command::Dispatch(dispatch)) => {
                if let Some(ref callback) = dispatch.callback_url {
                    if !is_http_url(callback) {
                        return Err(
                            "Callback URL must start with 'http://' or 'https://'".to_string()
                        );
                    }
                }
                if dispatch.pool_size == Some(0) {
                    return Err("Pool size must be at least 1".to_string());
                }
            }
            Some(Command::Query(query)) => {
                if query.limit == Some(0) {
                    return Err("Limit must be at least 1".to_string());
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("mediadispatch").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_dispatch_parsing() {
        let args = parse(&[
            "dispatch",
            "https://cdn.example/a.mp4",
            "https://cdn.example/b.mp4",
            "--callback-url",
            "https://me.example/hook",
            "--method",
            "put",
        ]);

        let Some(Command::Dispatch(dispatch)) = args.command else {
            panic!("expected dispatch command");
        };
        assert_eq!(dispatch.file_urls.len(), 2);
        assert_eq!(dispatch.method, Some(CallbackMethod::Put));
        assert_eq!(dispatch.format, OutputFormat::Json);

        let request = dispatch.to_request();
        assert_eq!(request.file_url, None);
        assert_eq!(request.files_url.map(|f| f.len()), Some(2));
    }

    #[test]
    fn test_single_file_becomes_file_url() {
        let dispatch = DispatchArgs {
            file_urls: vec!["https://cdn.example/a.mp4".into()],
            task_id: Some("mine".into()),
            ..Default::default()
        };
        let batch = dispatch.to_request().into_batch().unwrap();
        assert_eq!(batch.jobs[0].task_id.as_deref(), Some("mine"));
    }

    #[test]
    fn test_invalid_method_is_rejected() {
        let result = Args::try_parse_from([
            "mediadispatch",
            "dispatch",
            "https://cdn.example/a.mp4",
            "--method",
            "PATCH",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_query_requires_task_or_batch() {
        assert!(Args::try_parse_from(["mediadispatch", "query"]).is_err());
        assert!(Args::try_parse_from(["mediadispatch", "query", "--task", "a", "--batch", "b"]).is_err());

        let args = parse(&["query", "--batch", "b1", "--stats-policy", "raw-records"]);
        let Some(Command::Query(query)) = args.command else {
            panic!("expected query command");
        };
        assert_eq!(query.batch.as_deref(), Some("b1"));
        assert_eq!(query.stats_policy, Some(StatsPolicy::RawRecords));
    }

    #[test]
    fn test_validation() {
        assert!(parse(&["serve"]).validate().is_ok());
        assert!(parse(&["--init-config"]).validate().is_ok());
        assert!(parse(&[]).validate().is_err());
        assert!(parse(&["--analyzer-url", "ftp://x", "serve"]).validate().is_err());
        assert!(parse(&["-v", "-q", "serve"]).validate().is_err());
        assert!(parse(&["--timeout", "0", "serve"]).validate().is_err());
        assert!(parse(&[
            "dispatch",
            "https://cdn.example/a.mp4",
            "--callback-url",
            "cb.example/hook"
        ])
        .validate()
        .is_err());
        assert!(parse(&["dispatch", "https://cdn.example/a.mp4", "--pool-size", "0"])
            .validate()
            .is_err());
    }

    #[test]
    fn test_log_level() {
        let mut args = parse(&["serve"]);
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
