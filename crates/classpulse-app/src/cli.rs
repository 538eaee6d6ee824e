use clap::Parser;

/// classpulse -- live classroom coordination from the terminal.
#[derive(Parser, Debug)]
#[command(name = "classpulse", version, about)]
pub struct Args {
    /// Room key to join (case/whitespace-insensitive, e.g. "5A2").
    #[arg(short, long)]
    pub room: String,

    /// Display name shown to the room.
    #[arg(short, long)]
    pub name: String,

    /// Join as the teacher. Requires --passphrase.
    #[arg(long)]
    pub teacher: bool,

    /// Shared teacher passphrase.
    #[arg(long)]
    pub passphrase: Option<String>,

    /// Group label (students only).
    #[arg(short, long)]
    pub group: Option<String>,

    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn parse() -> Args {
    Args::parse()
}
