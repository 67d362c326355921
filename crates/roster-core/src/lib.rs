pub mod api;
pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod poller;
pub mod record;
pub mod render;
pub mod session;
pub mod severity;
pub mod summary;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting roster CLI"
  );
  debug!(command = ?cli.command, "parsed command");

  let mut cfg = config::Config::load(
    cli.rosterrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let timezone =
    datetime::resolve_timezone(
      cfg.get("timezone").as_deref()
    );

  let sessions =
    session::SessionStore::new(
      config::resolve_session_path(
        &cfg, &data_dir
      )
    );
  let session = sessions
    .rehydrate()
    .with_context(|| {
      format!(
        "failed to load session from \
         {}",
        sessions.path().display()
      )
    })?;

  let renderer =
    render::Renderer::new(
      &cfg, timezone
    )?;

  let ctx = commands::CommandContext {
    history_path:
      config::resolve_history_path(
        &cfg, &data_dir
      ),
    cfg,
    timezone,
    sessions,
    session,
    renderer
  };

  commands::dispatch(
    &ctx,
    cli.command
  )?;

  info!("done");
  Ok(())
}
