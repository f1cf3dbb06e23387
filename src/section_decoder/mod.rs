pub mod decoder;
pub mod scanner;
pub mod traits;

pub use decoder::SectionDecoder;
pub use scanner::{ScanResult, derive_phase, scan};
pub use traits::{
    CODE_ERROR_PLACEHOLDER, DEFAULT_MAX_BUFFER_SIZE, DecodeError, DecoderConfig, DecoderEvent,
    Phase, STREAM_ERROR_MARKER, Section, SectionValue, Sections, Sentinel, SentinelSet,
};
