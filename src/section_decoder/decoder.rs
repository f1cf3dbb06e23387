use tracing::{debug, warn};

use crate::section_decoder::{
    scanner,
    traits::{DecodeError, DecoderConfig, DecoderEvent, Phase, Section, SectionValue, Sections},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    Streaming,
    Finished,
    Failed,
}

/// Incremental decoder for one generation stream.
///
/// Owns the append-only response buffer. Every `feed` recomputes all three
/// sections from the whole buffer, so the values are a pure function of what
/// has been received and recomputation is idempotent.
#[derive(Debug, Clone)]
pub struct SectionDecoder {
    config: DecoderConfig,
    buffer: String,
    sections: Sections,
    phase: Phase,
    state: DecoderState,
    /// Offset of the in-band error marker, once seen.
    interrupted_at: Option<usize>,
}

impl SectionDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            buffer: String::new(),
            sections: Sections::default(),
            phase: Phase::Input,
            state: DecoderState::Streaming,
            interrupted_at: None,
        }
    }

    /// Append a chunk and recompute.
    ///
    /// Returns events for every section whose value changed and for each phase
    /// entered. Fails without touching the buffer if the chunk would exceed
    /// `max_buffer_size`.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<DecoderEvent>, DecodeError> {
        if self.state != DecoderState::Streaming {
            return Err(DecodeError::Terminated);
        }

        let new_len = self.buffer.len() + chunk.len();
        if new_len > self.config.max_buffer_size {
            return Err(DecodeError::BufferOverflow(new_len));
        }

        let previous_len = self.buffer.len();
        self.buffer.push_str(chunk);
        self.detect_interruption(previous_len);
        self.recompute()
    }

    /// Final recomputation at end of stream.
    ///
    /// Sections closed in the last chunk are captured exactly; sections still
    /// open keep their partial text and are reported as truncated. Calling
    /// this again after it succeeded is a no-op.
    ///
    /// A stream that carried the backend's error marker ends in
    /// `DecodeError::Interrupted` with the reported reason.
    pub fn finalize(&mut self) -> Result<Vec<DecoderEvent>, DecodeError> {
        match self.state {
            DecoderState::Finished => return Ok(Vec::new()),
            DecoderState::Failed => return Err(DecodeError::Terminated),
            DecoderState::Streaming => {}
        }

        if let Some(reason) = self.interruption() {
            return Err(DecodeError::Interrupted(reason));
        }

        let mut events = self.recompute()?;
        self.state = DecoderState::Finished;

        let truncated = self.sections.unterminated();
        if !truncated.is_empty() {
            warn!(sections = ?truncated, "Stream ended before closing sentinels");
            events.push(DecoderEvent::Truncated {
                sections: truncated,
            });
        }
        Ok(events)
    }

    /// Abort the generation.
    ///
    /// The code section is replaced with the error placeholder and the phase
    /// returns to `Input`. The decoder stops accepting data.
    pub fn fail(&mut self, reason: &str) -> Vec<DecoderEvent> {
        if self.state == DecoderState::Failed {
            return Vec::new();
        }
        self.state = DecoderState::Failed;

        let mut events = vec![DecoderEvent::Error {
            reason: reason.to_string(),
        }];

        let placeholder = SectionValue::Complete(self.config.code_error_placeholder.clone());
        if self.sections.code != placeholder {
            self.sections.code = placeholder.clone();
            events.push(DecoderEvent::SectionChanged {
                section: Section::Code,
                value: placeholder,
            });
        }

        if self.phase != Phase::Input {
            events.push(DecoderEvent::PhaseChanged {
                from: self.phase,
                to: Phase::Input,
                activates_code_view: false,
            });
            self.phase = Phase::Input;
        }
        events
    }

    pub fn current_sections(&self) -> &Sections {
        &self.sections
    }

    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn is_terminated(&self) -> bool {
        self.state != DecoderState::Streaming
    }

    /// Reason reported in-band by the backend, if the marker has arrived.
    pub fn interruption(&self) -> Option<String> {
        let pos = self.interrupted_at?;
        let marker_len = self.config.error_marker.as_deref().map_or(0, str::len);
        let reason = self.buffer[pos + marker_len..].trim();
        Some(if reason.is_empty() {
            "Stream interrupted".to_string()
        } else {
            reason.to_string()
        })
    }

    /// Look for the error marker in the text appended after `previous_len`,
    /// including a marker split across the chunk boundary.
    fn detect_interruption(&mut self, previous_len: usize) {
        if self.interrupted_at.is_some() {
            return;
        }
        let Some(marker) = self.config.error_marker.as_deref() else {
            return;
        };
        let mut start = previous_len.saturating_sub(marker.len().saturating_sub(1));
        while !self.buffer.is_char_boundary(start) {
            start -= 1;
        }
        if let Some(offset) = self.buffer[start..].find(marker) {
            warn!("Backend reported an error in the stream");
            self.interrupted_at = Some(start + offset);
        }
    }

    fn recompute(&mut self) -> Result<Vec<DecoderEvent>, DecodeError> {
        let content_end = self.interrupted_at.unwrap_or(self.buffer.len());
        let scan = scanner::scan(&self.buffer[..content_end], &self.config.sentinels)?;
        let mut events = Vec::new();

        // Phase events first so a view can switch tabs before content lands.
        for section in Section::ALL {
            let entered = Phase::entered_by(section);
            if entered > self.phase && scan.sections.get(section).is_set() {
                events.push(DecoderEvent::PhaseChanged {
                    from: self.phase,
                    to: entered,
                    activates_code_view: entered == Phase::Code,
                });
                debug!(from = %self.phase, to = %entered, "Phase advanced");
                self.phase = entered;
            }
        }

        for section in Section::ALL {
            let value = scan.sections.get(section);
            if value.is_set() && value != self.sections.get(section) {
                self.sections.set(section, value.clone());
                events.push(DecoderEvent::SectionChanged {
                    section,
                    value: value.clone(),
                });
            }
        }

        Ok(events)
    }
}

impl Default for SectionDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}
