// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::{Args, ValueEnum};
use owo_colors::{OwoColorize, Style, style};
use std::{
    fmt,
    io::{self, BufWriter, Stdout, Write},
    marker::PhantomData,
};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer,
    filter::Targets,
    fmt::{FmtContext, FormatEvent, FormatFields, format},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

/// The environment variable holding the log filter, in `tracing_subscriber::filter::Targets`
/// syntax.
pub(crate) const LOG_ENV: &str = "PHPUNIT_BRIDGE_LOG";

pub(crate) mod clap_styles {
    use clap::builder::{
        Styles,
        styling::{AnsiColor, Effects, Style},
    };

    const HEADER: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const USAGE: Style = AnsiColor::Green.on_default().effects(Effects::BOLD);
    const LITERAL: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const PLACEHOLDER: Style = AnsiColor::Cyan.on_default();
    const ERROR: Style = AnsiColor::Red.on_default().effects(Effects::BOLD);
    const VALID: Style = AnsiColor::Cyan.on_default().effects(Effects::BOLD);
    const INVALID: Style = AnsiColor::Yellow.on_default().effects(Effects::BOLD);

    pub(crate) const fn style() -> Styles {
        Styles::styled()
            .header(HEADER)
            .usage(USAGE)
            .literal(LITERAL)
            .placeholder(PLACEHOLDER)
            .error(ERROR)
            .valid(VALID)
            .invalid(INVALID)
    }
}

#[derive(Copy, Clone, Debug, Args)]
#[must_use]
pub(crate) struct OutputOpts {
    /// Verbose output
    #[arg(long, short, global = true, env = "PHPUNIT_BRIDGE_VERBOSE")]
    pub(crate) verbose: bool,

    /// Produce color output: auto, always, never
    #[arg(
        long,
        value_enum,
        default_value_t,
        hide_possible_values = true,
        global = true,
        value_name = "WHEN"
    )]
    pub(crate) color: Color,
}

impl OutputOpts {
    pub(crate) fn init(self) -> OutputContext {
        let OutputOpts { verbose, color } = self;

        color.init(verbose);

        OutputContext { verbose, color }
    }
}

/// Output settings resolved from the command line.
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct OutputContext {
    pub(crate) verbose: bool,
    pub(crate) color: Color,
}

impl OutputContext {
    /// Returns general stderr styles for the current output context.
    pub fn stderr_styles(&self) -> StderrStyles {
        let mut styles = StderrStyles::default();

        if self.color.should_colorize(supports_color::Stream::Stderr) {
            styles.colorize();
        }

        styles
    }

    pub(crate) fn stdout_styles(&self) -> SummaryStyles {
        let mut styles = SummaryStyles::default();

        if self.color.should_colorize(supports_color::Stream::Stdout) {
            styles.colorize();
        }

        styles
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
#[must_use]
pub(crate) enum Color {
    #[default]
    Auto,
    Always,
    Never,
}

static INIT_LOGGER: std::sync::Once = std::sync::Once::new();

struct SimpleFormatter {
    styles: LogStyles,
}

impl<S, N> FormatEvent<S, N> for SimpleFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();

        match *metadata.level() {
            Level::ERROR => write!(writer, "{}: ", "error".style(self.styles.error))?,
            Level::WARN => write!(writer, "{}: ", "warning".style(self.styles.warning))?,
            Level::INFO => write!(writer, "{}: ", "info".style(self.styles.info))?,
            Level::DEBUG => write!(writer, "{}: ", "debug".style(self.styles.debug))?,
            Level::TRACE => write!(writer, "{}: ", "trace".style(self.styles.trace))?,
        }

        let mut visitor = MessageVisitor {
            writer: &mut writer,
            error: None,
        };

        event.record(&mut visitor);

        if let Some(error) = visitor.error {
            return Err(error);
        }

        writeln!(writer)
    }
}

static MESSAGE_FIELD: &str = "message";

/// Writes the message, followed by the other fields as `key=value`.
struct MessageVisitor<'writer, 'a> {
    writer: &'a mut format::Writer<'writer>,
    error: Option<fmt::Error>,
}

impl Visit for MessageVisitor<'_, '_> {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        let res = if field.name() == MESSAGE_FIELD {
            write!(self.writer, "{value:?}")
        } else {
            write!(self.writer, " {}={value:?}", field.name())
        };
        if let Err(error) = res {
            self.error = Some(error);
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == MESSAGE_FIELD {
            self.record_debug(field, &format_args!("{value}"));
        } else {
            self.record_debug(field, &value);
        }
    }
}

impl Color {
    pub(crate) fn init(self, verbose: bool) {
        // Pass the styles in as a stylesheet to ensure we use the latest supports-color here.
        let mut log_styles = LogStyles::default();
        if self.should_colorize(supports_color::Stream::Stderr) {
            log_styles.colorize();
        }

        INIT_LOGGER.call_once(|| {
            let default_level = if verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            };

            let level_str = std::env::var(LOG_ENV).unwrap_or_default();
            // If the level string is empty or invalid, use the standard level filter instead.
            let (targets, parse_error) = if level_str.is_empty() {
                (Targets::new().with_default(default_level), None)
            } else {
                match level_str.parse::<Targets>() {
                    Ok(targets) => (targets, None),
                    Err(error) => (Targets::new().with_default(default_level), Some(error)),
                }
            };

            let layer = tracing_subscriber::fmt::layer()
                .event_format(SimpleFormatter { styles: log_styles })
                .with_writer(std::io::stderr)
                .with_filter(targets);

            // Tests may install their own subscriber first.
            if tracing_subscriber::registry().with(layer).try_init().is_ok() {
                if let Some(error) = parse_error {
                    tracing::warn!("ignoring invalid {LOG_ENV} `{level_str}`: {error}");
                }
            }
        });
    }

    pub(crate) fn should_colorize(self, stream: supports_color::Stream) -> bool {
        match self {
            Color::Auto => supports_color::on_cached(stream).is_some(),
            Color::Always => true,
            Color::Never => false,
        }
    }
}

#[derive(Debug, Default)]
struct LogStyles {
    error: Style,
    warning: Style,
    info: Style,
    debug: Style,
    trace: Style,
}

impl LogStyles {
    fn colorize(&mut self) {
        self.error = style().red().bold();
        self.warning = style().yellow().bold();
        self.info = style().bold();
        self.debug = style().bold();
        self.trace = style().dimmed();
    }
}

/// Styles for messages written to stderr.
#[derive(Debug, Default)]
pub struct StderrStyles {
    pub(crate) bold: Style,
    pub(crate) warning_text: Style,
}

impl StderrStyles {
    fn colorize(&mut self) {
        self.bold = style().bold();
        self.warning_text = style().yellow();
    }
}

/// Styles for the result summaries written to stdout.
#[derive(Debug, Default)]
pub(crate) struct SummaryStyles {
    pub(crate) file: Style,
    pub(crate) running: Style,
    pub(crate) passed: Style,
    pub(crate) failed: Style,
    pub(crate) skipped: Style,
    pub(crate) errored: Style,
}

impl SummaryStyles {
    fn colorize(&mut self) {
        self.file = style().bold();
        self.running = style().cyan();
        self.passed = style().green().bold();
        self.failed = style().red().bold();
        self.skipped = style().yellow();
        self.errored = style().magenta().bold();
    }
}

/// A helper for capturing output in tests.
///
/// The test variant is gated by `#[cfg(test)]` so release binaries only write to the terminal.
#[derive(Default)]
pub enum OutputWriter {
    /// No capture.
    #[default]
    Normal,
    /// Output captured.
    #[cfg(test)]
    Test {
        /// stdout capture
        stdout: Vec<u8>,
    },
}

impl OutputWriter {
    pub(crate) fn stdout_writer(&mut self) -> StdoutWriter<'_> {
        match self {
            Self::Normal => StdoutWriter::Normal {
                buf: BufWriter::new(std::io::stdout()),
                _lifetime: PhantomData,
            },
            #[cfg(test)]
            Self::Test { stdout } => StdoutWriter::Test { buf: stdout },
        }
    }
}

pub(crate) enum StdoutWriter<'a> {
    Normal {
        buf: BufWriter<Stdout>,
        _lifetime: PhantomData<&'a ()>,
    },
    #[cfg(test)]
    Test { buf: &'a mut Vec<u8> },
}

impl Write for StdoutWriter<'_> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self {
            Self::Normal { buf, .. } => buf.write(data),
            #[cfg(test)]
            Self::Test { buf } => buf.write(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Normal { buf, .. } => buf.flush(),
            #[cfg(test)]
            Self::Test { .. } => Ok(()),
        }
    }
}
