//! Terminal rendering of a generation.
//!
//! The decoder knows nothing about presentation; this module reacts to its
//! events. Phase changes print a banner, section updates print only the text
//! appended since the last update.

use std::{
    collections::HashMap,
    io::{self, Write},
};

use tracing::warn;

use crate::{
    section_decoder::{DecoderEvent, Phase, Section, SectionValue},
    workspace::GenerationObserver,
};

pub struct TerminalView<W: Write> {
    out: W,
    show_code: bool,
    printed: HashMap<Section, String>,
    write_failed: bool,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, show_code: bool) -> Self {
        Self {
            out,
            show_code,
            printed: HashMap::new(),
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn visible(&self, section: Section) -> bool {
        self.show_code || section != Section::Code
    }

    fn banner(&mut self, phase: Phase) -> io::Result<()> {
        let title = match phase {
            Phase::Input => "Ready",
            Phase::Analysis => "Analysis",
            Phase::Code => "Code",
            Phase::Summary => "Summary",
        };
        writeln!(self.out, "\n== {} ==", title)
    }

    fn write_section(&mut self, section: Section, value: &SectionValue) -> io::Result<()> {
        let Some(text) = value.text() else {
            return Ok(());
        };
        let previous = self.printed.entry(section).or_default();
        let written = match text.strip_prefix(previous.as_str()) {
            Some(delta) => write!(self.out, "{}", delta),
            // Earlier output was replaced (e.g. by the error placeholder).
            None => write!(self.out, "\n[{} updated]\n{}", section, text),
        };
        *previous = text.to_string();
        written?;
        self.out.flush()
    }

    fn render(&mut self, event: &DecoderEvent) -> io::Result<()> {
        match event {
            DecoderEvent::PhaseChanged {
                to,
                activates_code_view,
                ..
            } => {
                self.banner(*to)?;
                if *activates_code_view && !self.show_code {
                    writeln!(self.out, "(streaming code, use --show-code to display)")?;
                }
                Ok(())
            }
            DecoderEvent::SectionChanged { section, value } => {
                if self.visible(*section) {
                    self.write_section(*section, value)?;
                }
                Ok(())
            }
            DecoderEvent::Truncated { sections } => {
                let names: Vec<String> = sections.iter().map(|s| s.to_string()).collect();
                writeln!(
                    self.out,
                    "\nwarning: stream ended inside {}",
                    names.join(", ")
                )
            }
            DecoderEvent::Error { reason } => writeln!(self.out, "\nerror: {}", reason),
        }
    }
}

impl<W: Write> GenerationObserver for TerminalView<W> {
    /// Terminal output is best effort; the first write failure is logged and
    /// the generation carries on.
    fn on_event(&mut self, generation: u64, event: &DecoderEvent) {
        if let Err(e) = self.render(event) {
            if !self.write_failed {
                warn!(generation, error = %e, "Failed to write to terminal");
                self.write_failed = true;
            }
        }
    }
}

/// Collects every event it sees.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub events: Vec<(u64, DecoderEvent)>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.events
            .iter()
            .filter_map(|(_, event)| match event {
                DecoderEvent::PhaseChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    /// Every code text published, in order.
    pub fn code_updates(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|(_, event)| match event {
                DecoderEvent::SectionChanged {
                    section: Section::Code,
                    value,
                } => value.text(),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|(_, event)| match event {
                DecoderEvent::Error { reason } => Some(reason.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl GenerationObserver for RecordingObserver {
    fn on_event(&mut self, generation: u64, event: &DecoderEvent) {
        self.events.push((generation, event.clone()));
    }
}
