use clap::Parser;

#[derive(Parser, Debug)]
#[command(version)]
pub(crate) struct Cli {
    #[arg(long)]
    pub listen: bool,
    #[arg(long)]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    /// Run diagnostics on the provided files and print results to stdout
    #[arg(long)]
    pub diagnose: Vec<std::path::PathBuf>,
    /// Keyword dictionary to use instead of the bundled one
    #[arg(long)]
    pub builtins: Option<std::path::PathBuf>,
    /// Verbosity of the log written to stderr
    #[arg(long, default_value = "warn")]
    pub log_level: tracing::Level,
}
