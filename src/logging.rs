//! Log line format: a coloured four-letter level, the timestamp, the message
//! padded to 40 columns, then the event's fields sorted by name.
//!
//! ```text
//! INFO[2024-01-01T12:00:00.000000Z] executing command                        command=["cl", "/nologo"]
//! ```

use std::{
    fmt,
    io::{self, IsTerminal},
};

use tracing::{
    field::{Field, Visit},
    Event, Level, Subscriber,
};
use tracing_subscriber::{
    fmt::{
        format::Writer,
        time::{FormatTime, SystemTime},
        FmtContext, FormatEvent, FormatFields,
    },
    registry::LookupSpan,
    EnvFilter,
};

/// Filter directives in this variable override the default level.
pub const LOG_ENV: &str = "WITHVS_LOG";

/// Installs the global subscriber, writing to stderr. `verbose` lowers the
/// default level from INFO to DEBUG.
pub fn init(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .event_format(LineFormat::new(io::stderr().is_terminal()))
        .init();
}

#[derive(Debug, Clone, Copy)]
pub struct LineFormat {
    ansi: bool,
}

impl LineFormat {
    pub fn new(ansi: bool) -> Self {
        Self { ansi }
    }
}

fn level_color(level: &Level) -> u8 {
    match *level {
        Level::ERROR => 31,
        Level::WARN => 33,
        Level::INFO => 36,
        _ => 35,
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let level = event.metadata().level();
        let (start, end) = if self.ansi {
            (format!("\x1b[{}m", level_color(level)), "\x1b[0m")
        } else {
            (String::new(), "")
        };

        let mut fields = Fields::default();
        event.record(&mut fields);
        fields.pairs.sort_by(|a, b| a.0.cmp(b.0));

        write!(writer, "{start}{}{end}[", &level.as_str()[..4])?;
        SystemTime.format_time(&mut writer)?;
        write!(writer, "] {:<40}", fields.message)?;
        for (key, value) in &fields.pairs {
            write!(writer, " {start}{key}{end}={value}")?;
        }
        writeln!(writer)
    }
}

#[derive(Default)]
struct Fields {
    message: String,
    pairs: Vec<(&'static str, String)>,
}

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_owned();
        } else {
            self.pairs.push((field.name(), value.to_owned()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.pairs.push((field.name(), format!("{value:?}")));
        }
    }
}
