use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};
use std::time::Duration;

use anyhow::{
  Context,
  anyhow
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::poller::DEFAULT_POLL_PERIOD;

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Config {
  #[tracing::instrument(skip(
    rosterrc_override
  ))]
  pub fn load(
    rosterrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::defaults();

    let rosterrc =
      resolve_rosterrc_path(
        rosterrc_override
      )?;
    if let Some(path) = rosterrc {
      info!(rosterrc = %path.display(), "loading rosterrc");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no rosterrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  pub fn defaults() -> Self {
    let mut map = HashMap::new();
    map.insert(
      "data.location".to_string(),
      "~/.roster".to_string()
    );
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "notifications.poll_seconds"
        .to_string(),
      DEFAULT_POLL_PERIOD
        .as_secs()
        .to_string()
    );

    Config {
      map,
      loaded_files: vec![]
    }
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  /// `None` when the key is unset; an
  /// error when it is set to something
  /// other than an on/off word.
  pub fn get_bool(
    &self,
    key: &str
  ) -> anyhow::Result<Option<bool>> {
    let Some(raw) = self.map.get(key)
    else {
      return Ok(None);
    };
    parse_bool(raw)
      .map(Some)
      .ok_or_else(|| {
        anyhow!(
          "invalid {key} setting: {raw}"
        )
      })
  }

  /// Interval between unread-count
  /// polls.
  pub fn poll_period(
    &self
  ) -> anyhow::Result<Duration> {
    let Some(raw) = self
      .map
      .get("notifications.poll_seconds")
    else {
      return Ok(DEFAULT_POLL_PERIOD);
    };

    let secs: u64 =
      raw.trim().parse().with_context(
        || {
          format!(
            "invalid \
             notifications.poll_seconds: \
             {raw}"
          )
        }
      )?;
    if secs == 0 {
      return Err(anyhow!(
        "notifications.poll_seconds \
         must be positive"
      ));
    }
    Ok(Duration::from_secs(secs))
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }
      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        if self
          .loaded_files
          .contains(&include_path)
        {
          warn!(include = %include_path.display(), "include already loaded; skipping");
          continue;
        }
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  cfg,
  override_dir
))]
pub fn resolve_data_dir(
  cfg: &Config,
  override_dir: Option<&Path>
) -> anyhow::Result<PathBuf> {
  let dir = if let Some(path) =
    override_dir
  {
    path.to_path_buf()
  } else if let Some(cfg_value) =
    cfg.get("data.location")
  {
    expand_tilde(Path::new(&cfg_value))
  } else {
    default_data_dir()?
  };

  if !dir.exists() {
    info!(dir = %dir.display(), "creating data directory");
    fs::create_dir_all(&dir)
      .with_context(|| {
        format!(
          "failed to create {}",
          dir.display()
        )
      })?;
  }

  Ok(dir)
}

pub fn resolve_history_path(
  cfg: &Config,
  data_dir: &Path
) -> PathBuf {
  cfg
    .get("history.location")
    .map(|raw| {
      expand_tilde(Path::new(&raw))
    })
    .unwrap_or_else(|| {
      data_dir.join("history.json")
    })
}

pub fn resolve_session_path(
  cfg: &Config,
  data_dir: &Path
) -> PathBuf {
  cfg
    .get("session.location")
    .map(|raw| {
      expand_tilde(Path::new(&raw))
    })
    .unwrap_or_else(|| {
      data_dir.join("session.json")
    })
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_rosterrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(rosterrc_env) =
    std::env::var("ROSTERRC")
  {
    if rosterrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      rosterrc_env
    )));
  }

  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  let candidate =
    home.join(".rosterrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn default_data_dir()
-> anyhow::Result<PathBuf> {
  let home = dirs::home_dir()
    .ok_or_else(|| {
      anyhow!(
        "cannot determine home \
         directory"
      )
    })?;
  Ok(home.join(".roster"))
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(
  s: &str
) -> Option<bool> {
  match s
    .trim()
    .to_ascii_lowercase()
    .as_str()
  {
    | "1" | "y" | "yes" | "on"
    | "true" => Some(true),
    | "0" | "n" | "no" | "off"
    | "false" => Some(false),
    | _ => None
  }
}

#[cfg(test)]
mod tests {
  use tempfile::tempdir;

  use super::*;

  #[test]
  fn loads_file_with_include_and_comments()
  {
    let dir =
      tempdir().expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "timezone = Europe/Berlin\n"
    )
    .expect("write include");

    let main = dir.path().join("rosterrc");
    fs::write(
      &main,
      "# roster settings\n\
       color = off # no ansi\n\
       \n\
       include extra.rc\n\
       notifications.poll_seconds = 60\n"
    )
    .expect("write rosterrc");

    let cfg = Config::load(Some(&main))
      .expect("load config");
    assert_eq!(
      cfg.get("color").as_deref(),
      Some("off")
    );
    assert_eq!(
      cfg.get("timezone").as_deref(),
      Some("Europe/Berlin")
    );
    assert_eq!(
      cfg
        .poll_period()
        .expect("poll period"),
      Duration::from_secs(60)
    );
    assert_eq!(cfg.loaded_files.len(), 2);
  }

  #[test]
  fn rejects_lines_without_equals() {
    let dir =
      tempdir().expect("tempdir");
    let main = dir.path().join("rosterrc");
    fs::write(&main, "color off\n")
      .expect("write rosterrc");
    assert!(
      Config::load(Some(&main)).is_err()
    );
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::defaults();
    cfg.apply_overrides(vec![
      (
        "rc.color".to_string(),
        "no".to_string()
      ),
      (
        "history.location".to_string(),
        "/tmp/h.json".to_string()
      ),
    ]);
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("color flag"),
      Some(false)
    );
    assert_eq!(
      resolve_history_path(
        &cfg,
        Path::new("/data")
      ),
      PathBuf::from("/tmp/h.json")
    );
    assert_eq!(
      resolve_session_path(
        &cfg,
        Path::new("/data")
      ),
      PathBuf::from("/data/session.json")
    );
  }

  #[test]
  fn bool_settings_are_validated() {
    let mut cfg = Config::defaults();
    assert_eq!(
      cfg
        .get_bool("color")
        .expect("default color"),
      Some(true)
    );
    assert_eq!(
      cfg
        .get_bool("missing")
        .expect("unset key"),
      None
    );

    cfg.apply_overrides(vec![(
      "color".to_string(),
      "purple".to_string()
    )]);
    assert!(
      cfg.get_bool("color").is_err()
    );
  }

  #[test]
  fn poll_period_must_be_positive() {
    let mut cfg = Config::defaults();
    assert_eq!(
      cfg
        .poll_period()
        .expect("default period"),
      DEFAULT_POLL_PERIOD
    );

    cfg.apply_overrides(vec![(
      "notifications.poll_seconds"
        .to_string(),
      "0".to_string()
    )]);
    assert!(cfg.poll_period().is_err());

    cfg.apply_overrides(vec![(
      "notifications.poll_seconds"
        .to_string(),
      "soon".to_string()
    )]);
    assert!(cfg.poll_period().is_err());
  }
}
