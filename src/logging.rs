/*
 *   Copyright (c) 2024 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Structured logging setup, trimmed from the teacher crate's `tracing_logging`
//! module down to the display/file layers this crate has a use for (no
//! OpenTelemetry/Jaeger exporters).
//!
//! Because [`crate::Editor`] owns the output endpoint exclusively while
//! [`crate::Editor::run`] is executing, writing trace events to the same stream the
//! editor is repainting would corrupt the display. The default [`LoggingConfig`]
//! therefore routes to a file; a host that wants stdout/stderr tracing is expected to
//! enable it only outside the event loop, or `tail -f` the log file from a second
//! terminal.

use std::path::{Path, PathBuf};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::error::{EditorError, EditorResult};

/// Where to mirror log events for human consumption, in addition to the file sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTarget {
    Stdout,
    Stderr,
    None,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub display: DisplayTarget,
    /// File path and prefix for the rolling file appender, e.g. `/tmp/shelline.log`.
    /// `None` disables file logging entirely.
    pub file: Option<PathBuf>,
    pub level: tracing::Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { display: DisplayTarget::None, file: Some(PathBuf::from("shelline.log")), level: tracing::Level::DEBUG }
    }
}

pub type DynLayer<S> = dyn Layer<S> + Send + Sync + 'static;

/// Avoids gnarly type annotations at every call site: one shared `fmt` layer shape,
/// specialised only by its writer.
fn fmt_layer<S, W>(writer: W) -> Box<DynLayer<S>>
where
    S: tracing_core::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    Box::new(
        tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_thread_ids(true)
            .with_thread_names(false)
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(false)
            .with_writer(writer),
    )
}

/// Builds and installs the global tracing subscriber from `config`. Fails if a
/// subscriber has already been installed, if `config.file` names a path with no file
/// component, or if the configured directory cannot be created.
pub fn init(config: LoggingConfig) -> EditorResult<()> {
    let level_filter = tracing_subscriber::filter::LevelFilter::from_level(config.level);
    let mut layers: Vec<Box<DynLayer<tracing_subscriber::Registry>>> = vec![Box::new(level_filter)];

    match config.display {
        DisplayTarget::Stdout => layers.push(fmt_layer(std::io::stdout)),
        DisplayTarget::Stderr => layers.push(fmt_layer(std::io::stderr)),
        DisplayTarget::None => {}
    }

    if let Some(path) = &config.file {
        layers.push(fmt_layer(try_create_rolling_appender(path)?));
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| EditorError::invalid_argument(format!("tracing subscriber already installed: {e}")))
}

fn try_create_rolling_appender(path: &Path) -> EditorResult<tracing_appender::rolling::RollingFileAppender> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| EditorError::invalid_argument(format!("log path has no file name: {}", path.display())))?;
    std::fs::create_dir_all(parent)?;
    Ok(tracing_appender::rolling::never(parent, file_name))
}
