//! Template filters and functions.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, SecondsFormat, Utc};
use tera::{Error, Value};

use crate::assets::AssetMap;

/// Build the `asset(path="...")` template function.
///
/// Returns the site-absolute URL of the hashed output for an original asset
/// path. An unknown path is an error so that a page never ships with a
/// reference to an asset that was not published.
pub fn asset_function(map: Arc<AssetMap>) -> impl tera::Function {
  move |args: &HashMap<String, Value>| -> tera::Result<Value> {
    let path = args
      .get("path")
      .and_then(|v| v.as_str())
      .ok_or_else(|| Error::msg("asset function requires a string 'path' parameter"))?;

    match map.get(path) {
      Some(output) => Ok(Value::String(format!("/{}", output))),
      None => Err(Error::msg(format!("unknown asset '{}'", path))),
    }
  }
}

fn value_to_date(value: &Value, filter: &str) -> tera::Result<NaiveDate> {
  let text = value
    .as_str()
    .ok_or_else(|| Error::msg(format!("{} expects a date string, got {}", filter, value)))?;

  if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
    return Ok(dt.with_timezone(&Utc).date_naive());
  }

  text
    .get(..10)
    .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
    .ok_or_else(|| Error::msg(format!("{} could not parse date '{}'", filter, text)))
}

fn ordinal_suffix(day: u32) -> &'static str {
  match (day % 10, day % 100) {
    (_, 11..=13) => "th",
    (1, _) => "st",
    (2, _) => "nd",
    (3, _) => "rd",
    _ => "th",
  }
}

/// `{{ date | nicedate }}` -> `Wednesday January 3rd, 2024`.
pub fn nicedate(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
  let date = value_to_date(value, "nicedate")?;
  Ok(Value::String(format!(
    "{} {}{}, {}",
    date.format("%A %B"),
    date.day(),
    ordinal_suffix(date.day()),
    date.year()
  )))
}

/// `{{ date | isodate }}` -> `2024-01-03T00:00:00.000Z`.
///
/// Full timestamps keep their time of day; plain dates are taken as midnight UTC.
pub fn isodate(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
  let text = value.as_str().unwrap_or_default();
  if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
    return Ok(Value::String(
      dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Millis, true),
    ));
  }

  let date = value_to_date(value, "isodate")?;
  Ok(Value::String(format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn s(v: &str) -> Value {
    Value::String(v.to_string())
  }

  #[test]
  fn nicedate_formats_with_ordinal() {
    let args = HashMap::new();
    assert_eq!(nicedate(&s("2024-01-03"), &args).unwrap(), s("Wednesday January 3rd, 2024"));
    assert_eq!(nicedate(&s("2024-02-11"), &args).unwrap(), s("Sunday February 11th, 2024"));
    assert_eq!(nicedate(&s("2024-03-22"), &args).unwrap(), s("Friday March 22nd, 2024"));
    assert_eq!(nicedate(&s("2024-03-01"), &args).unwrap(), s("Friday March 1st, 2024"));
  }

  #[test]
  fn isodate_plain_date() {
    let args = HashMap::new();
    assert_eq!(isodate(&s("2024-01-03"), &args).unwrap(), s("2024-01-03T00:00:00.000Z"));
  }

  #[test]
  fn isodate_timestamp() {
    let args = HashMap::new();
    assert_eq!(
      isodate(&s("2024-01-03T10:20:30+02:00"), &args).unwrap(),
      s("2024-01-03T08:20:30.000Z")
    );
  }

  #[test]
  fn date_filters_reject_garbage() {
    let args = HashMap::new();
    assert!(nicedate(&s("soon"), &args).is_err());
    assert!(isodate(&Value::Bool(true), &args).is_err());
  }

  #[test]
  fn asset_function_resolves_and_rejects() {
    let mut map = AssetMap::new();
    map.insert("_assets/a.css".to_string(), "assets/styles/0123.css".to_string());
    let f = asset_function(Arc::new(map));

    let mut args = HashMap::new();
    args.insert("path".to_string(), s("_assets/a.css"));
    assert_eq!(tera::Function::call(&f, &args).unwrap(), s("/assets/styles/0123.css"));

    args.insert("path".to_string(), s("_assets/missing.css"));
    let err = tera::Function::call(&f, &args).unwrap_err();
    assert!(err.to_string().contains("unknown asset '_assets/missing.css'"));
  }
}
