use std::fmt;

use serde::Serialize;

/// Placeholder written into the code section when a generation fails, so the
/// editor holds deterministic content instead of a half-written fragment.
pub const CODE_ERROR_PLACEHOLDER: &str = "<!-- Error occurred while generating code -->";

/// Line the backend writes into the stream when generation breaks upstream,
/// before closing the response normally.
pub const STREAM_ERROR_MARKER: &str = "\n[ERROR]:";

/// Default upper bound on the accumulated response buffer.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 8 * 1024 * 1024; // 8MB

/// One logical section of a generation stream, in declared wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Analysis,
    Code,
    Summary,
}

impl Section {
    /// All sections in the order the generator emits them.
    pub const ALL: [Section; 3] = [Section::Analysis, Section::Code, Section::Summary];

    /// Upper-case marker name used inside sentinels (`ANALYSIS`, `CODE`, ...).
    pub fn marker(self) -> &'static str {
        match self {
            Section::Analysis => "ANALYSIS",
            Section::Code => "CODE",
            Section::Summary => "SUMMARY",
        }
    }

    fn index(self) -> usize {
        match self {
            Section::Analysis => 0,
            Section::Code => 1,
            Section::Summary => 2,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::Analysis => "analysis",
            Section::Code => "code",
            Section::Summary => "summary",
        };
        write!(f, "{}", s)
    }
}

/// Coarse stage of a generation, used to drive which part of the UI is active.
///
/// Ordering follows the stream: `Input < Analysis < Code < Summary`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Input,
    Analysis,
    Code,
    Summary,
}

impl Phase {
    /// The phase entered when `section`'s start sentinel is observed.
    pub fn entered_by(section: Section) -> Phase {
        match section {
            Section::Analysis => Phase::Analysis,
            Section::Code => Phase::Code,
            Section::Summary => Phase::Summary,
        }
    }

    /// User-facing label for the phase.
    pub fn alias(self) -> &'static str {
        match self {
            Phase::Input => "input",
            Phase::Analysis => "explanation",
            Phase::Code => "generating",
            Phase::Summary => "summary",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.alias())
    }
}

/// Current extracted value of a section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "text", rename_all = "snake_case")]
pub enum SectionValue {
    /// Start sentinel not seen yet.
    #[default]
    Unset,
    /// Start sentinel seen, end sentinel still outstanding.
    Partial(String),
    /// Both sentinels seen; the text is final.
    Complete(String),
}

impl SectionValue {
    pub fn text(&self) -> Option<&str> {
        match self {
            SectionValue::Unset => None,
            SectionValue::Partial(text) | SectionValue::Complete(text) => Some(text),
        }
    }

    pub fn is_set(&self) -> bool {
        !matches!(self, SectionValue::Unset)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SectionValue::Complete(_))
    }
}

/// The three section values of one generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sections {
    pub analysis: SectionValue,
    pub code: SectionValue,
    pub summary: SectionValue,
}

impl Sections {
    pub fn get(&self, section: Section) -> &SectionValue {
        match section {
            Section::Analysis => &self.analysis,
            Section::Code => &self.code,
            Section::Summary => &self.summary,
        }
    }

    pub fn set(&mut self, section: Section, value: SectionValue) {
        match section {
            Section::Analysis => self.analysis = value,
            Section::Code => self.code = value,
            Section::Summary => self.summary = value,
        }
    }

    /// Sections whose start sentinel arrived but whose end sentinel did not.
    pub fn unterminated(&self) -> Vec<Section> {
        Section::ALL
            .into_iter()
            .filter(|s| matches!(self.get(*s), SectionValue::Partial(_)))
            .collect()
    }
}

/// A literal marker in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sentinel {
    Start(Section),
    End(Section),
}

impl fmt::Display for Sentinel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentinel::Start(section) => write!(f, "{}_START", section.marker()),
            Sentinel::End(section) => write!(f, "{}_END", section.marker()),
        }
    }
}

/// The six sentinel literals used to split a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentinelSet {
    starts: [String; 3],
    ends: [String; 3],
}

impl SentinelSet {
    /// Markers carrying a per-request boundary tag, e.g. `===CODE_START:7f3a===`.
    ///
    /// Only useful when the caller also controls the prompt that tells the
    /// generator which markers to emit.
    pub fn with_boundary(tag: &str) -> Self {
        Self {
            starts: Section::ALL.map(|s| format!("==={}_START:{}===", s.marker(), tag)),
            ends: Section::ALL.map(|s| format!("==={}_END:{}===", s.marker(), tag)),
        }
    }

    pub fn start(&self, section: Section) -> &str {
        &self.starts[section.index()]
    }

    pub fn end(&self, section: Section) -> &str {
        &self.ends[section.index()]
    }

    pub fn literal(&self, sentinel: Sentinel) -> &str {
        match sentinel {
            Sentinel::Start(section) => self.start(section),
            Sentinel::End(section) => self.end(section),
        }
    }

    /// All sentinels in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (Sentinel, &str)> + '_ {
        Section::ALL.into_iter().flat_map(move |section| {
            [
                (Sentinel::Start(section), self.start(section)),
                (Sentinel::End(section), self.end(section)),
            ]
        })
    }
}

impl Default for SentinelSet {
    fn default() -> Self {
        Self {
            starts: Section::ALL.map(|s| format!("==={}_START===", s.marker())),
            ends: Section::ALL.map(|s| format!("==={}_END===", s.marker())),
        }
    }
}

/// Notification emitted by the decoder after a recomputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DecoderEvent {
    SectionChanged {
        section: Section,
        value: SectionValue,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
        /// Set when the code output should become the active view.
        activates_code_view: bool,
    },
    /// Stream ended while these sections were still open.
    Truncated { sections: Vec<Section> },
    Error { reason: String },
}

/// Error types for section decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Buffer overflow: {0} bytes exceeds maximum")]
    BufferOverflow(usize),

    #[error("Sentinel {found} arrived out of order (current phase: {after})")]
    OutOfOrder { found: Sentinel, after: Phase },

    #[error("Decoder already terminated")]
    Terminated,

    /// The backend reported a failure in-band.
    #[error("{0}")]
    Interrupted(String),
}

/// Configuration for decoder behavior.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub sentinels: SentinelSet,

    /// Maximum buffer size in bytes.
    pub max_buffer_size: usize,

    /// Code section content after a failed generation.
    pub code_error_placeholder: String,

    /// In-band failure line; text from here on is never section content.
    pub error_marker: Option<String>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            sentinels: SentinelSet::default(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            code_error_placeholder: CODE_ERROR_PLACEHOLDER.to_string(),
            error_marker: Some(STREAM_ERROR_MARKER.to_string()),
        }
    }
}
