//! Logger initialization.
//!
//! Log lines name the component that produced them (`probe::relay`,
//! `turn`, `speed`, ...) instead of the full module path, so a run can be
//! followed region by region. Per-region results themselves are rendered by
//! the console sink; the logger only carries diagnostics.

use std::io::Write;

use chrono::{DateTime, Local, Utc};
use colored::*;
use log::{Level, LevelFilter};

use crate::config::LogFormat;
use crate::error_handling::InitializationError;

const CRATE_TARGET: &str = "readiness_check";

/// STUN retransmits every 250 ms per relay host; only shown at trace.
const TURN_TARGET: &str = "readiness_check::turn";

const DEPENDENCY_FILTERS: &[(&str, LevelFilter)] = &[
    ("reqwest", LevelFilter::Info),
    ("hyper", LevelFilter::Info),
    ("hyper_util", LevelFilter::Info),
    ("wiremock", LevelFilter::Warn),
];

/// Initializes the logger with the specified level and format.
///
/// `RUST_LOG` is read first and the CLI `level` then overrides it for this
/// crate. The relay negotiation module is capped at `Info` unless `level` is
/// `Trace`.
///
/// # Errors
///
/// Returns `InitializationError::LoggerError` if a logger is already installed.
///
/// # Examples
///
/// ```bash
/// # Region-by-region diagnostics
/// readiness_check --log-level debug network
///
/// # Include every STUN Allocate sent to the relays
/// readiness_check --log-level trace network
///
/// # One JSON object per line, for collection
/// readiness_check --log-format json network
/// ```
pub fn init_logger_with(level: LevelFilter, format: LogFormat) -> Result<(), InitializationError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.filter_level(level);
    for (module, filter) in crate_filters(level) {
        builder.filter_module(module, filter);
    }

    match format {
        LogFormat::Json => {
            builder.format(|buf, record| {
                writeln!(
                    buf,
                    "{}",
                    json_line(
                        Utc::now(),
                        record.level(),
                        record.target(),
                        &record.args().to_string()
                    )
                )
            });
        }
        LogFormat::Plain => {
            builder.format(|buf, record| {
                let level = match record.level() {
                    Level::Error => "ERROR".red().bold(),
                    Level::Warn => "WARN ".yellow(),
                    Level::Info => "INFO ".normal(),
                    Level::Debug => "DEBUG".dimmed(),
                    Level::Trace => "TRACE".dimmed(),
                };
                writeln!(
                    buf,
                    "{} {} {:<14} {}",
                    Local::now().format("%H:%M:%S%.3f").to_string().dimmed(),
                    level,
                    component(record.target()),
                    record.args()
                )
            });
        }
    }

    builder.try_init()?;
    Ok(())
}

/// Module filters applied on top of `RUST_LOG`.
fn crate_filters(level: LevelFilter) -> Vec<(&'static str, LevelFilter)> {
    let turn = if level == LevelFilter::Trace {
        level
    } else {
        level.min(LevelFilter::Info)
    };
    let mut filters = DEPENDENCY_FILTERS.to_vec();
    filters.push((CRATE_TARGET, level));
    filters.push((TURN_TARGET, turn));
    filters
}

/// Short component name for a log target; foreign targets pass through.
fn component(target: &str) -> &str {
    if target == CRATE_TARGET {
        return "main";
    }
    target
        .strip_prefix(CRATE_TARGET)
        .and_then(|rest| rest.strip_prefix("::"))
        .unwrap_or(target)
}

fn json_line(ts: DateTime<Utc>, level: Level, target: &str, msg: &str) -> String {
    serde_json::json!({
        "ts": ts.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "level": level.as_str(),
        "component": component(target),
        "msg": msg,
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_component_strips_crate_prefix() {
        assert_eq!(component("readiness_check::probe::relay"), "probe::relay");
        assert_eq!(component("readiness_check::turn"), "turn");
        assert_eq!(component("readiness_check"), "main");
        assert_eq!(component("hyper_util::client"), "hyper_util::client");
        assert_eq!(component("readiness_checker::x"), "readiness_checker::x");
    }

    #[test]
    fn test_turn_capped_below_trace() {
        let turn_filter = |level| {
            crate_filters(level)
                .into_iter()
                .find(|(module, _)| *module == TURN_TARGET)
                .map(|(_, f)| f)
        };
        assert_eq!(turn_filter(LevelFilter::Debug), Some(LevelFilter::Info));
        assert_eq!(turn_filter(LevelFilter::Warn), Some(LevelFilter::Warn));
        assert_eq!(turn_filter(LevelFilter::Trace), Some(LevelFilter::Trace));
    }

    #[test]
    fn test_crate_and_dependency_filters() {
        let filters = crate_filters(LevelFilter::Debug);
        assert!(filters.contains(&(CRATE_TARGET, LevelFilter::Debug)));
        assert!(filters.contains(&("wiremock", LevelFilter::Warn)));
    }

    #[test]
    fn test_json_line_fields() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let line = json_line(
            ts,
            Level::Warn,
            "readiness_check::probe::latency",
            "Ping to \"eu-west-2\" hit the 10s bound",
        );
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["ts"], "2024-05-01T12:00:00.000Z");
        assert_eq!(value["level"], "WARN");
        assert_eq!(value["component"], "probe::latency");
        assert_eq!(value["msg"], "Ping to \"eu-west-2\" hit the 10s bound");
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_second_init_reports_error() {
        let first = init_logger_with(LevelFilter::Info, LogFormat::Plain);
        let second = init_logger_with(LevelFilter::Debug, LogFormat::Json);
        assert!(first.is_err() || second.is_err());
        assert!(matches!(second, Err(InitializationError::LoggerError(_))));
    }
}
