//! CLI argument parsing using clap.

use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser, Debug)]
#[command(name = "tplindex", version, styles = clap_cargo_style())]
#[command(about = "Scan, compile and live-reload a directory of templates")]
pub struct Cli {
    /// Configuration file (defaults to ./tplindex.toml)
    #[arg(short, long, global = true, env = "TPLINDEX_CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Template root directory (overrides config)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Allowed template extension, repeatable (overrides config)
    #[arg(short = 'e', long = "ext", global = true)]
    pub extensions: Vec<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a default tplindex.toml
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Display active settings
    Config,

    /// Scan the root and list template names and paths
    List,

    /// Render one template to stdout
    Render {
        /// Template name, e.g. "emails/welcome"
        name: String,

        /// Render data as a JSON object
        #[arg(short, long)]
        data: Option<String>,
    },

    /// Scan, then keep the index in sync with the filesystem until Ctrl-C
    Watch,
}
