use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info, instrument, warn};

use crate::api::{JsonHistoryFile, load_lookup};
use crate::calendar::{build_month_grid, build_week_strip, shift_months, shift_weeks};
use crate::cli::{Command, MonthArgs, SessionCommand, UnreadArgs, WeekArgs};
use crate::config::Config;
use crate::datetime::{parse_day, parse_month, today_in};
use crate::poller::{JsonUnreadFile, UnreadCountSource, UnreadPoller};
use crate::record::RecordLookup;
use crate::render::Renderer;
use crate::session::{Session, SessionContext, SessionStore, SessionUser};
use crate::summary::MonthSummary;

/// Everything a command needs, resolved once in [`crate::run`].
#[derive(Debug)]
pub struct CommandContext {
    pub cfg: Config,
    pub timezone: Tz,
    pub history_path: PathBuf,
    pub sessions: SessionStore,
    pub session: SessionContext,
    pub renderer: Renderer,
}

#[instrument(skip(ctx, command))]
pub fn dispatch(ctx: &CommandContext, command: Command) -> anyhow::Result<()> {
    let today = today_in(ctx.timezone);
    debug!(%today, timezone = %ctx.timezone, signed_in = ctx.session.is_signed_in(), "dispatching");

    match command {
        Command::Month(args) => cmd_month(ctx, args, today),
        Command::Week(args) => cmd_week(ctx, args, today),
        Command::Session(action) => cmd_session(ctx, action),
        Command::Unread(args) => cmd_unread(ctx, args),
    }
}

fn cmd_month(ctx: &CommandContext, args: MonthArgs, today: NaiveDate) -> anyhow::Result<()> {
    let selected = match args.month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => today,
    };
    let anchor = shift_months(selected, args.offset)
        .ok_or_else(|| anyhow!("month offset {} out of range", args.offset))?;

    let joining_date = match args.joined.as_deref() {
        Some(raw) => Some(parse_day(raw)?),
        None => ctx.session.joining_date(),
    };
    if joining_date.is_none() {
        warn!("no joining date known; every day will be blank");
    }

    let records = load_records(ctx, args.history.as_deref())?;
    let grid = build_month_grid(anchor, &records, joining_date, today);
    let summary = MonthSummary::from_grid(&grid, &records);

    info!(month = %grid.month_start().format("%Y-%m"), "rendering month");
    ctx.renderer.print_month(&grid, &summary)
}

fn cmd_week(ctx: &CommandContext, args: WeekArgs, today: NaiveDate) -> anyhow::Result<()> {
    let selected = match args.date.as_deref() {
        Some(raw) => parse_day(raw)?,
        None => today,
    };
    let anchor = shift_weeks(selected, args.offset)
        .ok_or_else(|| anyhow!("week offset {} out of range", args.offset))?;
    let strip = build_week_strip(anchor);
    let records = load_records(ctx, args.history.as_deref())?;

    info!(start = %strip.start(), "rendering week");
    ctx.renderer.print_week(&strip, &records)
}

fn load_records(ctx: &CommandContext, history: Option<&Path>) -> anyhow::Result<RecordLookup> {
    let path = history.unwrap_or(&ctx.history_path);
    load_lookup(&JsonHistoryFile::new(path))
        .with_context(|| format!("failed to load attendance history from {}", path.display()))
}

fn cmd_session(ctx: &CommandContext, action: SessionCommand) -> anyhow::Result<()> {
    match action {
        SessionCommand::Login {
            employee,
            token,
            name,
            joined,
        } => {
            let joining_date = joined.as_deref().map(parse_day).transpose()?;
            let user = SessionUser {
                employee_id: employee,
                name,
                joining_date,
            };
            let session = Session::new(token, user, Utc::now())?;
            ctx.sessions.persist(&session)?;
            println!(
                "Signed in as {} (session {})",
                session.user.employee_id, session.session_id
            );
        }
        SessionCommand::Show => match ctx.session.session() {
            Some(session) => {
                println!("Employee: {}", session.user.employee_id);
                if let Some(name) = &session.user.name {
                    println!("Name:     {name}");
                }
                match session.user.joining_date {
                    Some(date) => println!("Joined:   {date}"),
                    None => println!("Joined:   unknown"),
                }
                println!(
                    "Issued:   {}",
                    session
                        .issued_at
                        .with_timezone(&ctx.timezone)
                        .format("%Y-%m-%d %H:%M %Z")
                );
                println!("Session:  {}", session.session_id);
            }
            None => println!("Not signed in"),
        },
        SessionCommand::Logout => {
            if ctx.sessions.clear()? {
                println!("Signed out");
            } else {
                println!("Not signed in");
            }
        }
    }
    Ok(())
}

fn cmd_unread(ctx: &CommandContext, args: UnreadArgs) -> anyhow::Result<()> {
    if args.polls == 0 {
        return Err(anyhow!("--polls must be at least 1"));
    }
    let period = match args.every {
        Some(0) => return Err(anyhow!("--every must be positive")),
        Some(secs) => Duration::from_secs(secs),
        None => ctx.cfg.poll_period()?,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to build tokio runtime")?;

    let printed = runtime.block_on(watch_counts(
        JsonUnreadFile::new(&args.source),
        period,
        args.polls,
        |count| println!("{count}"),
    ))?;
    debug!(printed, "unread polling finished");
    Ok(())
}

/// Runs the poller for `polls` attempts, handing each fresh count to
/// `on_count`. Fails when no attempt produced a count.
pub async fn watch_counts<S, F>(
    source: S,
    period: Duration,
    polls: u32,
    mut on_count: F,
) -> anyhow::Result<u32>
where
    S: UnreadCountSource,
    F: FnMut(u64),
{
    let handle = UnreadPoller::start(source, period);
    let mut updates = handle.subscribe();
    let mut printed = 0;
    let mut last_error = None;

    loop {
        if updates.changed().await.is_err() {
            warn!("poller stopped before finishing");
            break;
        }
        let state = updates.borrow_and_update().clone();
        match (state.last_error, state.latest) {
            (Some(err), _) => last_error = Some(err),
            (None, Some(count)) => {
                printed += 1;
                on_count(count);
            }
            (None, None) => {}
        }
        if state.attempts >= u64::from(polls) {
            break;
        }
    }

    handle.stop().await;

    if printed == 0 {
        return Err(anyhow!(
            "no unread count after {polls} poll(s): {}",
            last_error.unwrap_or_else(|| "poller stopped".to_string())
        ));
    }
    Ok(printed)
}
