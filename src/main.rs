use std::path::PathBuf;

use clap::{ArgAction, Parser};
use tracing::Level;
use treeplay::{Config, Dialect, Layout, ReplayMode, Settings};

#[derive(Parser)]
#[command(name = "treeplay")]
#[command(about = "Flatten a note tree export into one document, replaying its history as git commits")]
struct Cli {
    /// CherryTree XML export to convert
    input: PathBuf,

    /// Directory that receives the document and its git history
    output: PathBuf,

    /// Markup dialect of the output document (default: org)
    #[arg(long, value_enum)]
    format: Option<Dialect>,

    /// Order of sections in the document (default: chronological)
    #[arg(long, value_enum)]
    layout: Option<Layout>,

    /// One commit per node, or separate commits for creation and modification (default: node)
    #[arg(long, value_enum)]
    replay: Option<ReplayMode>,

    /// Output file name (default: notes.org or notes.md)
    #[arg(long, value_name = "NAME")]
    document: Option<String>,

    /// Write .gitattributes/.gitignore and an `init` commit first
    #[arg(long, overrides_with = "no_scaffold")]
    scaffold: bool,

    /// Skip the scaffold commit even if the config file asks for it
    #[arg(long, overrides_with = "scaffold")]
    no_scaffold: bool,

    /// Author and committer name (default: from git config)
    #[arg(long)]
    author_name: Option<String>,

    /// Author and committer email (default: from git config)
    #[arg(long)]
    author_email: Option<String>,

    /// TOML file with default settings; command-line flags take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log more (repeat for even more)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();

    let file_settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    let settings = Settings {
        format: cli.format,
        layout: cli.layout,
        replay: cli.replay,
        document: cli.document,
        scaffold: match (cli.scaffold, cli.no_scaffold) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        },
        author_name: cli.author_name,
        author_email: cli.author_email,
    }
    .or(file_settings);

    let config = Config::from_settings(cli.input, cli.output, settings);
    let summary = treeplay::convert(&config)?;

    println!(
        "{} notes, {} commits -> {}",
        summary.nodes,
        summary.commits,
        summary.document.display()
    );
    Ok(())
}
