use std::collections::HashMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::Duration;
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::deadline::DEFAULT_CLOSE_DAYS;
use crate::task::Priority;
use crate::view::{
  FilterMode,
  SortMode
};

const CONFIG_ENV_VAR: &str = "TODORC";
const CONFIG_FILE_NAME: &str =
  ".todorc";

#[derive(Debug, Clone)]
pub struct Config {
  map: HashMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = HashMap::new();
    for (key, value) in [
      ("data.location", "~/.todo"),
      ("default.command", "list"),
      ("default.priority", "medium"),
      ("default.sort", "priority-high"),
      ("default.filter", "all"),
      ("deadline.close_days", "2"),
      ("color", "on")
    ] {
      map.insert(
        key.to_string(),
        value.to_string()
      );
    }
    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    config_override
  ))]
  pub fn load(
    config_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let path = resolve_config_path(
      config_override
    )?;
    if let Some(path) = path {
      info!(config = %path.display(), "loading config");
      cfg.load_file(&path)?;
    } else {
      debug!(
        "no config file found; using \
         defaults"
      );
    }

    Ok(cfg)
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

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn default_priority(
    &self
  ) -> anyhow::Result<Priority> {
    self
      .parsed("default.priority")
      .map(Option::unwrap_or_default)
  }

  pub fn default_sort(
    &self
  ) -> anyhow::Result<SortMode> {
    self
      .parsed("default.sort")
      .map(Option::unwrap_or_default)
  }

  pub fn default_filter(
    &self
  ) -> anyhow::Result<FilterMode> {
    self
      .parsed("default.filter")
      .map(Option::unwrap_or_default)
  }

  /// How far ahead a deadline still
  /// counts as close.
  pub fn close_window(
    &self
  ) -> anyhow::Result<Duration> {
    let days = self
      .parsed::<i64>(
        "deadline.close_days"
      )?
      .unwrap_or(DEFAULT_CLOSE_DAYS);
    if days < 0 {
      return Err(anyhow!(
        "deadline.close_days must not \
         be negative, got {days}"
      ));
    }
    Duration::try_days(days).ok_or_else(
      || {
        anyhow!(
          "deadline.close_days is out \
           of range: {days}"
        )
      }
    )
  }

  fn parsed<T>(
    &self,
    key: &str
  ) -> anyhow::Result<Option<T>>
  where
    T: std::str::FromStr,
    T::Err: std::fmt::Display
  {
    self
      .map
      .get(key)
      .map(|raw| {
        raw.trim().parse::<T>().map_err(
          |err| {
            anyhow!(
              "invalid value for \
               {key}: {err}"
            )
          }
        )
      })
      .transpose()
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    if self.loaded_files.contains(&path) {
      warn!(file = %path.display(), "config file already loaded; skipping");
      return Ok(());
    }
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

#[tracing::instrument(skip(
  override_path
))]
fn resolve_config_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(env_path) =
    std::env::var(CONFIG_ENV_VAR)
  {
    if env_path == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      env_path
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; using defaults"
    );
    return Ok(None);
  };
  let candidate =
    home.join(CONFIG_FILE_NAME);
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
  Ok(home.join(".todo"))
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
