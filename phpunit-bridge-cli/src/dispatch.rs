// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    output::{OutputContext, OutputOpts, OutputWriter, SummaryStyles, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use owo_colors::OwoColorize;
use phpunit_bridge::{
    bridge::SessionBridge,
    channel::MemoryChannel,
    config::{BridgeConfig, Configuration},
    index::{ResultIndex, SharedResultIndex},
    resolver::{ExecutableResolver, UnlinkOutcome},
};
use phpunit_metadata::{BridgeExitCode, Message, TestOutcomeState};
use serde::Deserialize;
use serde_json::Value;
use std::{
    io::Write,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, warn};

/// Tools for the PHPUnit test explorer bridge.
///
/// Resolves executables the way the editor extension does, deletes stale artifacts, replays
/// recorded language server sessions, and queries stored results.
#[derive(Debug, Parser)]
#[command(version, name = "phpunit-bridge", styles = clap_styles::style())]
pub struct BridgeApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(subcommand)]
    command: Command,
}

impl BridgeApp {
    /// Initializes logging and colors, and returns the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(
        self,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        match self.command {
            Command::Resolve { names, exists } => {
                let config = self.config_opts.make_config()?;
                let resolver = ExecutableResolver::new(config.unlink());
                exec_resolve(&resolver, &names, exists, output_writer)
            }
            Command::Unlink { path } => {
                let config = self.config_opts.make_config()?;
                let resolver = ExecutableResolver::new(config.unlink());
                exec_unlink(&resolver, &path, output_writer)
            }
            Command::Replay { transcript } => {
                let config = self.config_opts.make_config()?;
                exec_replay(&transcript, &config, output, output_writer)
            }
            Command::Settings { settings, scope } => {
                exec_settings(&settings, &scope, output_writer)
            }
            Command::Query {
                results,
                file,
                message_format,
            } => exec_query(&results, &file, message_format, output, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: .config/phpunit-bridge.toml in the current directory]
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<BridgeConfig, ExpectedError> {
        let current_dir = std::env::current_dir()
            .map_err(|err| ExpectedError::CurrentDirInvalid { err })?;
        let current_dir = Utf8PathBuf::try_from(current_dir).map_err(|err| {
            ExpectedError::CurrentDirInvalid {
                err: err.into_io_error(),
            }
        })?;

        let config =
            BridgeConfig::from_sources(&current_dir, self.config.as_deref(), |file, unknown| {
                warn!(
                    "ignoring unknown configuration keys in `{file}`: {}",
                    unknown.iter().join(", ")
                );
            })?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Find executables by name
    ///
    /// Prints the resolved path of each name. Exits with status 1 if any name could not be
    /// found.
    Resolve {
        /// Names or paths to look up, e.g. `php` or `vendor/bin/phpunit`
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,

        /// Only check whether each name exists, trying platform extensions
        #[arg(long)]
        exists: bool,
    },
    /// Delete a file, waiting for it to be unlocked
    ///
    /// Retries according to the `[unlink]` section of the config.
    Unlink {
        /// The file to delete
        path: Utf8PathBuf,
    },
    /// Replay a recorded session
    ///
    /// Reads a JSON-lines file of `{"method": ..., "params": ...}` notifications, feeds them
    /// through a session bridge, and prints every emitted event followed by a summary of the
    /// recorded results.
    Replay {
        /// The transcript to replay
        transcript: Utf8PathBuf,
    },
    /// Show the effective PHPUnit settings
    ///
    /// Reads a JSON object of settings sections, as the editor would supply them, applies the
    /// `phpunit` section over the defaults and prints the result.
    Settings {
        /// A JSON file containing settings sections
        settings: Utf8PathBuf,

        /// The workspace the settings are scoped to
        #[arg(long, default_value = "file:///", value_name = "URI")]
        scope: String,
    },
    /// Show stored results for a file
    ///
    /// Reads a JSON array of result messages and prints the ones for FILE, grouped by state.
    Query {
        /// A JSON file containing an array of result messages
        results: Utf8PathBuf,

        /// The source file to look up. A drive prefix such as `C:` is ignored
        file: String,

        /// Output format
        #[arg(short = 'T', long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormatOpts,
    },
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum MessageFormatOpts {
    #[default]
    Human,
    Json,
}

fn exec_resolve(
    resolver: &ExecutableResolver,
    names: &[String],
    exists: bool,
    output_writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let mut writer = output_writer.stdout_writer();
    let mut missing = Vec::new();

    for name in names {
        if exists {
            if resolver.exists(name) {
                writeln!(writer, "{name}").map_err(ExpectedError::write_output_error)?;
            } else {
                missing.push(name.as_str());
            }
        } else {
            let path = resolver.find(name);
            if path.is_empty() {
                missing.push(name.as_str());
            } else {
                writeln!(writer, "{name}: {path}").map_err(ExpectedError::write_output_error)?;
            }
        }
    }
    writer.flush().map_err(ExpectedError::write_output_error)?;

    if missing.is_empty() {
        Ok(BridgeExitCode::OK)
    } else {
        warn!("not found: {}", missing.iter().join(", "));
        Ok(BridgeExitCode::NOT_FOUND)
    }
}

fn exec_unlink(
    resolver: &ExecutableResolver,
    path: &Utf8Path,
    output_writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|err| ExpectedError::RuntimeBuildError { err })?;
    let outcome = runtime.block_on(resolver.unlink(path))?;

    let mut writer = output_writer.stdout_writer();
    match outcome {
        UnlinkOutcome::Removed { attempts } => {
            writeln!(writer, "removed {path} (attempts: {attempts})")
        }
        UnlinkOutcome::NotPresent => writeln!(writer, "{path} is not present"),
    }
    .and_then(|()| writer.flush())
    .map_err(ExpectedError::write_output_error)?;

    Ok(BridgeExitCode::OK)
}

#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    method: String,
    #[serde(default)]
    params: Value,
}

fn read_transcript(transcript: &Utf8Path) -> Result<Vec<TranscriptEntry>, ExpectedError> {
    let contents = fs_err::read_to_string(transcript)
        .map_err(|err| ExpectedError::argument_file_read_error("transcript", transcript, err))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .map_err(|err| ExpectedError::transcript_parse_error(transcript, n + 1, err))
        })
        .collect()
}

fn exec_replay(
    transcript: &Utf8Path,
    config: &BridgeConfig,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let entries = read_transcript(transcript)?;
    debug!(count = entries.len(), "read transcript");

    let bridge = SessionBridge::new(MemoryChannel::new(), SharedResultIndex::default(), config);

    // Listeners must be 'static, so events are serialized into a shared buffer.
    let lines = Arc::new(Mutex::new(Vec::new()));
    let tests_lines = lines.clone();
    let _tests = bridge.tests().subscribe(move |event| {
        push_json_line(&tests_lines, event);
    });
    let states_lines = lines.clone();
    let _test_states = bridge.test_states().subscribe(move |event| {
        push_json_line(&states_lines, event);
    });

    for entry in entries {
        if !bridge.channel().push(&entry.method, entry.params) {
            warn!(method = %entry.method, "no handler for transcript entry, skipping");
        }
    }

    let mut writer = output_writer.stdout_writer();
    let lines = std::mem::take(&mut *lines.lock().unwrap_or_else(PoisonError::into_inner));
    for line in lines {
        writeln!(writer, "{line}").map_err(ExpectedError::write_output_error)?;
    }

    let styles = output.stdout_styles();
    let view = bridge.index();
    let index = view.read();
    for (file, _) in index.iter() {
        let summary = summarize(&index.get_by_state(file), &styles);
        writeln!(writer, "{}: {summary}", file.style(styles.file))
            .map_err(ExpectedError::write_output_error)?;
    }
    writer.flush().map_err(ExpectedError::write_output_error)?;

    Ok(BridgeExitCode::OK)
}

fn exec_settings(
    settings: &Utf8Path,
    scope: &str,
    output_writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let contents = fs_err::read_to_string(settings)
        .map_err(|err| ExpectedError::argument_file_read_error("settings", settings, err))?;
    let source: Value = serde_json::from_str(&contents)
        .map_err(|err| ExpectedError::argument_json_parse_error("settings", settings, err))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|err| ExpectedError::RuntimeBuildError { err })?;
    let mut configuration = Configuration::default();
    runtime
        .block_on(configuration.update(&source, scope, true))
        .map_err(|err| ExpectedError::SettingsError {
            file_name: settings.to_owned(),
            err,
        })?;
    debug!(scope, "applied settings");

    let mut writer = output_writer.stdout_writer();
    serde_json::to_writer_pretty(&mut writer, &configuration)
        .map_err(|err| ExpectedError::write_output_error(err.into()))?;
    writeln!(writer)
        .and_then(|()| writer.flush())
        .map_err(ExpectedError::write_output_error)?;

    Ok(BridgeExitCode::OK)
}

fn push_json_line<T: serde::Serialize>(lines: &Mutex<Vec<String>>, event: &T) {
    match serde_json::to_string(event) {
        Ok(line) => lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line),
        Err(error) => warn!(%error, "failed to serialize event"),
    }
}

fn exec_query(
    results: &Utf8Path,
    file: &str,
    message_format: MessageFormatOpts,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32, ExpectedError> {
    let contents = fs_err::read_to_string(results)
        .map_err(|err| ExpectedError::argument_file_read_error("results", results, err))?;
    let messages: Vec<Message> = serde_json::from_str(&contents)
        .map_err(|err| ExpectedError::argument_json_parse_error("results", results, err))?;

    let index = ResultIndex::new(messages);
    let by_state = index.get_by_state(file);

    let mut writer = output_writer.stdout_writer();
    match message_format {
        MessageFormatOpts::Human => {
            let styles = output.stdout_styles();
            writeln!(writer, "{}: {}", file.style(styles.file), summarize(&by_state, &styles))
                .map_err(ExpectedError::write_output_error)?;
            for message in by_state.values().flatten() {
                let name = message.name().unwrap_or("<unnamed>");
                match message.line() {
                    Some(line) => writeln!(writer, "  {} {name} (line {line})", message.state()),
                    None => writeln!(writer, "  {} {name}", message.state()),
                }
                .map_err(ExpectedError::write_output_error)?;
            }
        }
        MessageFormatOpts::Json => {
            serde_json::to_writer_pretty(&mut writer, &by_state)
                .map_err(|err| ExpectedError::write_output_error(err.into()))?;
            writeln!(writer).map_err(ExpectedError::write_output_error)?;
        }
    }
    writer.flush().map_err(ExpectedError::write_output_error)?;

    Ok(BridgeExitCode::OK)
}

/// Formats non-empty buckets as e.g. `2 passed, 1 failed`.
fn summarize(
    by_state: &std::collections::BTreeMap<TestOutcomeState, Vec<Message>>,
    styles: &SummaryStyles,
) -> String {
    let parts = by_state
        .iter()
        .filter(|(_, messages)| !messages.is_empty())
        .map(|(state, messages)| {
            let style = match state {
                TestOutcomeState::Running => styles.running,
                TestOutcomeState::Passed => styles.passed,
                TestOutcomeState::Failed => styles.failed,
                TestOutcomeState::Skipped => styles.skipped,
                TestOutcomeState::Errored => styles.errored,
            };
            format!("{} {}", messages.len(), state.style(style))
        })
        .join(", ");
    if parts.is_empty() {
        "no results".to_owned()
    } else {
        parts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn output() -> OutputContext {
        OutputContext {
            verbose: false,
            color: Color::Never,
        }
    }

    fn run(args: &[&str]) -> (Result<i32, ExpectedError>, String) {
        let args = std::iter::once("phpunit-bridge").chain(args.iter().copied());
        let app = BridgeApp::try_parse_from(args).expect("arguments are valid");
        let mut writer = OutputWriter::Test { stdout: Vec::new() };
        let result = app.exec(output(), &mut writer);
        let OutputWriter::Test { stdout } = writer else {
            unreachable!("test writer was used");
        };
        (result, String::from_utf8(stdout).expect("output is UTF-8"))
    }

    #[test]
    fn verify_app() {
        BridgeApp::command().debug_assert();
    }

    #[test]
    fn replay_transcript() {
        let dir = Utf8TempDir::new().unwrap();
        let transcript = dir.path().join("session.jsonl");
        fs_err::write(
            &transcript,
            indoc! {r#"
                {"method": "TestLoadFinishedEvent", "params": {"suite": {"type": "suite", "id": "root", "label": "PHPUnit", "debuggable": false}}}

                {"method": "TestRunStartedEvent", "params": {"tests": ["root"]}}
                {"method": "window/logMessage", "params": {}}
                {"method": "TestRunFinishedEvent", "params": {"events": [{"type": "test", "test": "A::a", "state": "passed", "file": "C:\\A.php"}, {"type": "test", "test": "A::b", "state": "failed", "file": "C:\\A.php"}]}}
            "#},
        )
        .unwrap();

        let (result, stdout) = run(&["replay", transcript.as_str()]);
        assert_eq!(result.unwrap(), BridgeExitCode::OK);
        assert_eq!(
            stdout,
            indoc! {r#"
                {"type":"finished","suite":{"id":"root","label":"PHPUnit","children":[],"debuggable":false,"type":"suite"}}
                {"type":"started","tests":["root"]}
                {"type":"test","test":"A::a","state":"passed","file":"C:\\A.php"}
                {"type":"test","test":"A::b","state":"failed","file":"C:\\A.php"}
                {"type":"finished"}
                \A.php: 1 passed, 1 failed
            "#}
        );
    }

    #[test]
    fn replay_invalid_line() {
        let dir = Utf8TempDir::new().unwrap();
        let transcript = dir.path().join("session.jsonl");
        fs_err::write(&transcript, "{\"method\": \"TestRunFinishedEvent\"}\nnot json\n").unwrap();

        let (result, _) = run(&["replay", transcript.as_str()]);
        let err = result.unwrap_err();
        assert!(
            matches!(err, ExpectedError::TranscriptParseError { line_number: 2, .. }),
            "unexpected error: {err:?}"
        );
        assert_eq!(err.process_exit_code(), BridgeExitCode::INPUT_ERROR);
    }

    #[test]
    fn replay_reads_config() {
        let dir = Utf8TempDir::new().unwrap();
        let transcript = dir.path().join("session.jsonl");
        fs_err::write(&transcript, "").unwrap();
        let config = dir.path().join("bridge.toml");
        fs_err::write(&config, "ready-timeout = \"not a duration\"\n").unwrap();

        let (result, _) = run(&["--config", config.as_str(), "replay", transcript.as_str()]);
        let err = result.unwrap_err();
        assert!(
            matches!(err, ExpectedError::ConfigParseError { .. }),
            "unexpected error: {err:?}"
        );
    }

    #[test]
    fn settings_applies_section() {
        let dir = Utf8TempDir::new().unwrap();
        let settings = dir.path().join("settings.json");
        fs_err::write(
            &settings,
            r#"{"phpunit": {"php": "/usr/bin/php", "args": ["--stop-on-failure"]}, "editor": {}}"#,
        )
        .unwrap();

        let (result, stdout) = run(&["settings", settings.as_str()]);
        assert_eq!(result.unwrap(), BridgeExitCode::OK);
        let parsed: Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({
                "maxNumberOfProblems": 10000,
                "files": "**/*.php",
                "relativeFilePath": false,
                "remoteCwd": "",
                "shell": "",
                "php": "/usr/bin/php",
                "args": ["--stop-on-failure"],
            })
        );

        fs_err::write(&settings, r#"{"phpunit": {"maxNumberOfProblems": "many"}}"#).unwrap();
        let (result, _) = run(&["settings", settings.as_str()]);
        let err = result.unwrap_err();
        assert!(
            matches!(err, ExpectedError::SettingsError { .. }),
            "unexpected error: {err:?}"
        );
        assert_eq!(err.process_exit_code(), BridgeExitCode::INPUT_ERROR);
    }

    #[test]
    fn query_results() {
        let dir = Utf8TempDir::new().unwrap();
        let results = dir.path().join("results.json");
        fs_err::write(
            &results,
            indoc! {r#"
                [
                    {"fileName": "C:/FooTest.php", "state": "passed", "name": "test_a", "line": 3},
                    {"fileName": "C:/FooTest.php", "state": "failed", "name": "test_b", "line": 9},
                    {"fileName": "/BarTest.php", "state": "passed", "name": "test_c"}
                ]
            "#},
        )
        .unwrap();

        let (result, stdout) = run(&["query", results.as_str(), "D:/FooTest.php"]);
        assert_eq!(result.unwrap(), BridgeExitCode::OK);
        assert_eq!(
            stdout,
            indoc! {"
                D:/FooTest.php: 1 passed, 1 failed
                  passed test_a (line 3)
                  failed test_b (line 9)
            "}
        );

        let (result, stdout) = run(&["query", results.as_str(), "/Missing.php", "-T", "json"]);
        assert_eq!(result.unwrap(), BridgeExitCode::OK);
        let parsed: Value = serde_json::from_str(&stdout).unwrap();
        assert_eq!(
            parsed,
            serde_json::json!({
                "running": [], "passed": [], "failed": [], "skipped": [], "errored": [],
            })
        );
    }

    #[test]
    fn resolve_missing_exits_with_not_found() {
        let (result, stdout) = run(&["resolve", "phpunit-bridge-definitely-missing"]);
        assert_eq!(result.unwrap(), BridgeExitCode::NOT_FOUND);
        assert_eq!(stdout, "");
    }
}
