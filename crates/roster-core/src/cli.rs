use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "roster",
    version,
    about = "Roster: attendance calendars from HR attendance history"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rosterrc", global = true)]
    pub rosterrc: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show the month calendar with each day's attendance status.
    Month(MonthArgs),

    /// Show one week of raw attendance records.
    Week(WeekArgs),

    /// Manage the stored sign-in session.
    #[command(subcommand)]
    Session(SessionCommand),

    /// Poll the unread notification count.
    Unread(UnreadArgs),
}

#[derive(Args, Debug, Clone)]
pub struct MonthArgs {
    /// Month to show, as YYYY-MM. Defaults to the current month.
    #[arg(long)]
    pub month: Option<String>,

    /// Months to move from the selected month; negative goes back.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i32,

    /// Attendance history export to read instead of the configured one.
    #[arg(long)]
    pub history: Option<PathBuf>,

    /// Joining date (YYYY-MM-DD) to use instead of the session's.
    #[arg(long)]
    pub joined: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct WeekArgs {
    /// Any day of the week to show, as YYYY-MM-DD. Defaults to today.
    #[arg(long)]
    pub date: Option<String>,

    /// Weeks to move from the selected week; negative goes back.
    #[arg(long, default_value_t = 0, allow_hyphen_values = true)]
    pub offset: i64,

    #[arg(long)]
    pub history: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Store a session for an employee.
    Login {
        #[arg(long)]
        employee: String,

        #[arg(long)]
        token: String,

        #[arg(long)]
        name: Option<String>,

        /// Joining date, YYYY-MM-DD.
        #[arg(long)]
        joined: Option<String>,
    },

    /// Print the stored session.
    Show,

    /// Remove the stored session.
    Logout,
}

#[derive(Args, Debug, Clone)]
pub struct UnreadArgs {
    /// JSON file holding the unread count.
    #[arg(long)]
    pub source: PathBuf,

    /// Number of polls before exiting.
    #[arg(long, default_value_t = 1)]
    pub polls: u32,

    /// Seconds between polls, overriding notifications.poll_seconds.
    #[arg(long)]
    pub every: Option<u64>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
