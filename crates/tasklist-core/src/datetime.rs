use std::fmt::Display;
use std::sync::OnceLock;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  Duration,
  Local,
  LocalResult,
  NaiveDate,
  NaiveDateTime,
  TimeZone,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;

const TIMEZONE_ENV_VAR: &str =
  "TODO_TIMEZONE";

/// Zone used to interpret
/// zone-less input and to display
/// deadlines.
#[derive(Debug, Clone, Copy)]
pub enum DisplayZone {
  Local,
  Named(Tz)
}

impl DisplayZone {
  pub fn to_utc(
    &self,
    local_naive: NaiveDateTime,
    context: &str
  ) -> anyhow::Result<DateTime<Utc>> {
    match self {
      | Self::Local => {
        resolve_local(
          Local.from_local_datetime(
            &local_naive
          ),
          context
        )
      }
      | Self::Named(tz) => {
        resolve_local(
          tz.from_local_datetime(
            &local_naive
          ),
          context
        )
      }
    }
  }

  pub fn date_of(
    &self,
    dt: DateTime<Utc>
  ) -> NaiveDate {
    match self {
      | Self::Local => {
        dt.with_timezone(&Local)
          .date_naive()
      }
      | Self::Named(tz) => {
        dt.with_timezone(tz)
          .date_naive()
      }
    }
  }

  pub fn format(
    &self,
    dt: DateTime<Utc>,
    fmt: &str
  ) -> String {
    match self {
      | Self::Local => {
        dt.with_timezone(&Local)
          .format(fmt)
          .to_string()
      }
      | Self::Named(tz) => {
        dt.with_timezone(tz)
          .format(fmt)
          .to_string()
      }
    }
  }
}

static DISPLAY_ZONE: OnceLock<
  DisplayZone
> = OnceLock::new();

pub fn display_zone() -> &'static DisplayZone
{
  DISPLAY_ZONE
    .get_or_init(resolve_default_zone)
}

/// Pins the process-wide zone from
/// the `timezone` config key. Only the
/// first call has an effect.
#[tracing::instrument]
pub fn init_display_zone(
  configured: Option<&str>
) -> anyhow::Result<()> {
  let zone = match configured
    .map(str::trim)
    .filter(|raw| !raw.is_empty())
  {
    | Some(raw) => {
      DisplayZone::Named(
        raw.parse::<Tz>().map_err(
          |err| {
            anyhow!(
              "invalid timezone \
               {raw:?}: {err}"
            )
          }
        )?
      )
    }
    | None => resolve_default_zone()
  };

  if DISPLAY_ZONE.set(zone).is_err() {
    tracing::debug!(
      "display zone already \
       initialised, keeping it"
    );
  }
  Ok(())
}

#[must_use]
pub fn format_deadline(
  dt: DateTime<Utc>
) -> String {
  display_zone()
    .format(dt, "%Y-%m-%d %H:%M")
}

fn resolve_default_zone() -> DisplayZone
{
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    match raw.trim().parse::<Tz>() {
      | Ok(tz) => {
        return DisplayZone::Named(tz);
      }
      | Err(err) => {
        tracing::error!(
          timezone = %raw,
          error = %err,
          "failed to parse timezone \
           from environment; using \
           system local"
        );
      }
    }
  }
  DisplayZone::Local
}

fn resolve_local<Z>(
  result: LocalResult<DateTime<Z>>,
  context: &str
) -> anyhow::Result<DateTime<Utc>>
where
  Z: TimeZone,
  Z::Offset: Display
{
  match result {
    | LocalResult::Single(local_dt) => {
      Ok(local_dt.with_timezone(&Utc))
    }
    | LocalResult::Ambiguous(
      first,
      second
    ) => {
      tracing::warn!(
        context,
        first = %first,
        second = %second,
        "ambiguous local datetime; using earliest"
      );
      let chosen = if first <= second {
        first
      } else {
        second
      };
      Ok(chosen.with_timezone(&Utc))
    }
    | LocalResult::None => {
      Err(anyhow!(
        "local datetime does not \
         exist in display zone: \
         {context}"
      ))
    }
  }
}

fn relative_offset_regex() -> &'static Regex
{
  static RE: OnceLock<Regex> =
    OnceLock::new();
  RE.get_or_init(|| {
    Regex::new(
      r"^\+?(\d+)\s*(m|min|mins|h|hr|hrs|d|day|days|w|wk|wks|week|weeks)$"
    )
    .unwrap_or_else(|_| {
      unreachable!(
        "relative offset pattern is \
         a literal"
      )
    })
  })
}

/// Parses a deadline expression as
/// typed on the command line.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_deadline_expr(
  input: &str,
  now: DateTime<Utc>
) -> anyhow::Result<DateTime<Utc>> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();
  let zone = display_zone();

  match lower.as_str() {
    | "now" => return Ok(now),
    | "today" | "tomorrow" => {
      let mut date = zone.date_of(now);
      if lower == "tomorrow" {
        date = date
          .succ_opt()
          .ok_or_else(|| {
            anyhow!(
              "failed to advance to \
               tomorrow"
            )
          })?;
      }
      let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| {
          anyhow!(
            "failed to construct \
             midnight for {lower}"
          )
        })?;
      return zone
        .to_utc(midnight, &lower);
    }
    | _ => {}
  }

  if let Some(caps) =
    relative_offset_regex()
      .captures(&lower)
  {
    let amount: i64 = caps[1]
      .parse()
      .context(
        "invalid relative offset"
      )?;
    let delta = match &caps[2] {
      | "m" | "min" | "mins" => {
        Duration::minutes(amount)
      }
      | "h" | "hr" | "hrs" => {
        Duration::hours(amount)
      }
      | "d" | "day" | "days" => {
        Duration::days(amount)
      }
      | _ => Duration::weeks(amount)
    };
    return Ok(now + delta);
  }

  parse_iso_like(token)
}

/// Accepts the shapes a deadline can
/// take in stored data or input:
/// RFC 3339, `YYYY-MM-DDTHH:MM[:SS]`
/// (display zone), and `YYYY-MM-DD`.
pub fn parse_iso_like(
  raw: &str
) -> anyhow::Result<DateTime<Utc>> {
  let token = raw.trim();

  if let Ok(dt) =
    DateTime::parse_from_rfc3339(token)
  {
    return Ok(dt.with_timezone(&Utc));
  }

  for fmt in [
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S"
  ] {
    if let Ok(naive) =
      NaiveDateTime::parse_from_str(
        token, fmt
      )
    {
      return display_zone()
        .to_utc(naive, token);
    }
  }

  let date = NaiveDate::parse_from_str(
    token, "%Y-%m-%d"
  )
  .with_context(|| {
    format!(
      "unrecognised date \
       expression: {token}"
    )
  })?;
  let midnight = date
    .and_hms_opt(0, 0, 0)
    .ok_or_else(|| {
      anyhow!(
        "failed to construct \
         midnight for {token}"
      )
    })?;
  Ok(Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
  use chrono::{
    Duration,
    TimeZone,
    Utc
  };

  use super::{
    parse_deadline_expr,
    parse_iso_like
  };

  fn fixed_now()
  -> chrono::DateTime<Utc> {
    Utc
      .with_ymd_and_hms(
        2026, 2, 17, 12, 0, 0
      )
      .single()
      .expect("valid now")
  }

  #[test]
  fn parses_rfc3339() {
    let parsed = parse_iso_like(
      "2026-03-01T09:30:00.000Z"
    )
    .expect("parse rfc3339");
    assert_eq!(
      parsed,
      Utc
        .with_ymd_and_hms(
          2026, 3, 1, 9, 30, 0
        )
        .single()
        .expect("valid expected")
    );
  }

  #[test]
  fn date_only_is_utc_midnight() {
    let parsed =
      parse_iso_like("2026-03-01")
        .expect("parse date");
    assert_eq!(
      parsed
        .format("%Y-%m-%dT%H:%M")
        .to_string(),
      "2026-03-01T00:00"
    );
  }

  #[test]
  fn parses_relative_offsets() {
    let now = fixed_now();
    assert_eq!(
      parse_deadline_expr("+3d", now)
        .expect("parse days"),
      now + Duration::days(3)
    );
    assert_eq!(
      parse_deadline_expr("90min", now)
        .expect("parse minutes"),
      now + Duration::minutes(90)
    );
    assert_eq!(
      parse_deadline_expr("2w", now)
        .expect("parse weeks"),
      now + Duration::weeks(2)
    );
  }

  #[test]
  fn now_is_identity() {
    let now = fixed_now();
    assert_eq!(
      parse_deadline_expr("NOW", now)
        .expect("parse now"),
      now
    );
  }

  #[test]
  fn tomorrow_is_after_today() {
    let now = fixed_now();
    let today =
      parse_deadline_expr("today", now)
        .expect("parse today");
    let tomorrow = parse_deadline_expr(
      "tomorrow", now
    )
    .expect("parse tomorrow");
    assert!(tomorrow > today);
    assert!(today <= now);
  }

  #[test]
  fn rejects_garbage() {
    assert!(
      parse_deadline_expr(
        "next blue moon",
        fixed_now()
      )
      .is_err()
    );
  }
}

/// Serde adapter for the stored
/// timestamp shape,
/// `YYYY-MM-DDTHH:MM:SS.sssZ`.
pub mod iso_date_serde {
  use chrono::{
    DateTime,
    SecondsFormat,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.to_rfc3339_opts(
        SecondsFormat::Millis,
        true
      )
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_iso_like(&raw)
      .map_err(serde::de::Error::custom)
  }

  pub mod option {
    use chrono::{
      DateTime,
      Utc
    };
    use serde::{
      Deserialize,
      Deserializer,
      Serializer
    };

    pub fn serialize<S>(
      dt: &Option<DateTime<Utc>>,
      serializer: S
    ) -> Result<S::Ok, S::Error>
    where
      S: Serializer
    {
      match dt {
        | Some(value) => {
          super::serialize(
            value, serializer
          )
        }
        | None => {
          serializer.serialize_none()
        }
      }
    }

    pub fn deserialize<'de, D>(
      deserializer: D
    ) -> Result<
      Option<DateTime<Utc>>,
      D::Error
    >
    where
      D: Deserializer<'de>
    {
      let opt =
        Option::<String>::deserialize(
          deserializer
        )?;
      match opt {
        | Some(raw)
          if !raw.trim().is_empty() =>
        {
          super::super::parse_iso_like(
            &raw
          )
          .map(Some)
          .map_err(
            serde::de::Error::custom
          )
        }
        | _ => Ok(None)
      }
    }
  }
}
