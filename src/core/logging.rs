//! Logging setup on top of flexi_logger
//!
//! Three output formats are supported: `text` (timestamp, level, message and
//! the emitting module as a source path, which the coloured variant drops),
//! `ext` (always with the source path) and `json` (one compact object per
//! line). Colour applies to the two text formats only.

use flexi_logger::{DeferredNow, FileSpec, Logger, LoggerHandle};
use std::sync::{Mutex, OnceLock};

static LOGGER_HANDLE: OnceLock<Mutex<LoggerHandle>> = OnceLock::new();

/// Start the global logger. Only the first call in a process takes effect.
pub fn init_logging(
    log_level: Option<&str>,
    log_format: Option<&str>,
    log_file: Option<&str>,
    color_enabled: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let level_str = log_level.unwrap_or("info");
    let mut logger = Logger::try_with_str(level_str)?;

    logger = match (log_format.unwrap_or("text"), color_enabled) {
        ("json", _) => logger.format(json_format),
        ("ext", true) => logger.format(extended_color_format),
        ("ext", false) => logger.format(extended_format),
        (_, true) => logger.format(simple_color_format),
        (_, false) => logger.format(simple_format),
    };

    if let Some(file_path) = log_file {
        let file_spec = FileSpec::try_from(std::path::Path::new(file_path))?;
        logger = logger.log_to_file(file_spec);
    }

    let handle = logger.start()?;
    let _ = LOGGER_HANDLE.set(Mutex::new(handle));
    Ok(())
}

/// Change the log level of an already started logger
///
/// Format, colour and file output are fixed when the logger starts; only the
/// level can move afterwards.
pub fn reconfigure_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle_mutex = LOGGER_HANDLE
        .get()
        .ok_or("Logger handle not initialised. Call init_logging first.")?;
    let mut handle = handle_mutex
        .lock()
        .map_err(|_| "Could not acquire logger handle lock")?;
    handle.parse_and_push_temp_spec(log_level)?;
    Ok(())
}

fn level_abbr(level: log::Level) -> &'static str {
    match level {
        log::Level::Error => "ERR",
        log::Level::Warn => "WRN",
        log::Level::Info => "INF",
        log::Level::Debug => "DBG",
        log::Level::Trace => "TRC",
    }
}

fn level_colored(level: log::Level) -> colored::ColoredString {
    use colored::*;

    match level {
        log::Level::Error => "ERR".red().bold(),
        log::Level::Warn => "WRN".yellow(),
        log::Level::Info => "INF".green(),
        log::Level::Debug => "DBG".blue(),
        log::Level::Trace => "TRC".magenta(),
    }
}

fn simple_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn simple_color_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::*;

    write!(
        w,
        "{} {} {}",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        level_colored(record.level()),
        record.args()
    )
}

// "YYYY-MM-DD HH:mm:ss.fff INF message (bundle/engine.rs:42)"
fn extended_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f"),
        level_abbr(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line())
    )
}

fn extended_color_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    use colored::*;

    write!(
        w,
        "{} {} {} ({})",
        now.format("%Y-%m-%d %H:%M:%S%.3f").to_string().dimmed(),
        level_colored(record.level()),
        record.args(),
        format_target_as_path(record.target(), record.line()).dimmed()
    )
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &log::Record,
) -> Result<(), std::io::Error> {
    let json_obj = serde_json::json!({
        "timestamp": now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        "level": level_abbr(record.level()),
        "message": record.args().to_string(),
        "target": format_target_as_path(record.target(), record.line())
    });

    match serde_json::to_string(&json_obj) {
        Ok(json_string) => w.write_all(json_string.as_bytes()),
        Err(_) => w.write_all(b"{\"error\":\"Failed to serialize log message\"}"),
    }
}

// bundlesync::bundle::engine -> bundle/engine.rs
fn format_target_as_path(target: &str, line: Option<u32>) -> String {
    let path_like = match target.strip_prefix("bundlesync::") {
        Some(without_prefix) => without_prefix.replace("::", "/") + ".rs",
        None => target.replace("::", "/"),
    };

    match line {
        Some(line_num) => format!("{}:{}", path_like, line_num),
        None => path_like,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(
        format: fn(&mut dyn std::io::Write, &mut DeferredNow, &log::Record) -> std::io::Result<()>,
        target: &str,
        line: Option<u32>,
    ) -> String {
        let mut buffer = Vec::new();
        let mut now = DeferredNow::new();
        let record = log::Record::builder()
            .level(log::Level::Warn)
            .target(target)
            .line(line)
            .args(format_args!("Bundle expired"))
            .build();

        format(&mut buffer, &mut now, &record).expect("format should succeed");
        String::from_utf8(buffer).expect("output should be valid UTF-8")
    }

    #[test]
    fn test_target_formatting() {
        assert_eq!(
            format_target_as_path("bundlesync::bundle::engine", Some(42)),
            "bundle/engine.rs:42"
        );
        assert_eq!(format_target_as_path("reqwest::connect", None), "reqwest/connect");
    }

    #[test]
    fn test_simple_format() {
        let output = render(simple_format, "bundlesync::scan::orchestrator", Some(7));
        assert!(output.contains("WRN Bundle expired ("), "got: {}", output);

        let colored = render(simple_color_format, "bundlesync::scan::orchestrator", Some(7));
        assert!(colored.contains("Bundle expired"));
        assert!(!colored.contains("orchestrator"));
    }

    #[test]
    fn test_extended_format_includes_source_path() {
        let output = render(extended_format, "bundlesync::scan::orchestrator", Some(7));

        assert!(
            output.ends_with("WRN Bundle expired (scan/orchestrator.rs:7)"),
            "got: {}",
            output
        );
    }

    #[test]
    fn test_json_format_is_one_object() {
        let output = render(json_format, "bundlesync::ignore::engine", Some(3));

        assert!(!output.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["level"], "WRN");
        assert_eq!(value["message"], "Bundle expired");
        assert_eq!(value["target"], "ignore/engine.rs:3");
    }

    #[test]
    fn test_reconfigure_before_init_fails_or_applies() {
        // Another test binary may already have started the logger
        let result = reconfigure_logging("debug");
        if LOGGER_HANDLE.get().is_none() {
            assert!(result.is_err());
        }
    }
}
