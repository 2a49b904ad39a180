use crate::collectors::Snapshot;
use crossterm::cursor::MoveTo;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to write report: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait Renderer {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Terminal when stdout is a tty, plain otherwise.
    #[default]
    Auto,
    Terminal,
    Plain,
    Json,
}

/// Fixed four-line report block, terminated by a blank line.
pub fn format_report(snapshot: &Snapshot) -> String {
    format!(
        "Time: {}\nCPU Usage: {:.1}%\nRAM Usage: {:.1}%\n\n",
        humantime::format_rfc3339_micros(snapshot.taken_at),
        snapshot.cpu_percent,
        snapshot.mem_percent
    )
}

/// Redraws the report in place on a clearable terminal.
pub struct TerminalRenderer<W: Write> {
    out: W,
    clear_supported: bool,
}

impl<W: Write> TerminalRenderer<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            clear_supported: true,
        }
    }

    fn clear(&mut self) -> io::Result<()> {
        self.out.queue(Clear(ClearType::All))?;
        self.out.queue(MoveTo(0, 0))?;
        Ok(())
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), RenderError> {
        if self.clear_supported {
            if let Err(err) = self.clear() {
                warn!(error = %err, "terminal clear failed, appending output from now on");
                self.clear_supported = false;
            }
        }
        self.out.write_all(format_report(snapshot).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

pub struct PlainRenderer<W: Write> {
    out: W,
}

impl<W: Write> PlainRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for PlainRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), RenderError> {
        self.out.write_all(format_report(snapshot).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport {
    time: String,
    cpu_percent: f64,
    mem_percent: f64,
}

/// One JSON object per line, for piping into other tools.
pub struct JsonLinesRenderer<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Renderer for JsonLinesRenderer<W> {
    fn render(&mut self, snapshot: &Snapshot) -> Result<(), RenderError> {
        let report = JsonReport {
            time: humantime::format_rfc3339_micros(snapshot.taken_at).to_string(),
            cpu_percent: snapshot.cpu_percent,
            mem_percent: snapshot.mem_percent,
        };
        serde_json::to_writer(&mut self.out, &report)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

pub fn select_renderer<W>(mode: OutputMode, is_terminal: bool, out: W) -> Box<dyn Renderer>
where
    W: Write + 'static,
{
    match mode {
        OutputMode::Auto if is_terminal => Box::new(TerminalRenderer::new(out)),
        OutputMode::Auto | OutputMode::Plain => Box::new(PlainRenderer::new(out)),
        OutputMode::Terminal => Box::new(TerminalRenderer::new(out)),
        OutputMode::Json => Box::new(JsonLinesRenderer::new(out)),
    }
}
