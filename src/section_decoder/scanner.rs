// Single-pass scanner that splits a response buffer into sections.
// Sentinels are matched as literals; there is no regex and no backtracking.

use crate::section_decoder::traits::{
    DecodeError, Phase, Section, SectionValue, Sections, Sentinel, SentinelSet,
};

/// Result of scanning one buffer state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub sections: Sections,
    /// Latest section whose start sentinel was seen.
    pub last_opened: Option<Section>,
    /// Section still waiting for its end sentinel, if any.
    pub open: Option<Section>,
}

/// Scan `buffer` and extract every section that has started.
///
/// Between sections, the earliest sentinel decides what happens next: a start
/// sentinel of a later section opens it, anything else is an ordering error.
/// Inside an open section only its own end sentinel is recognised, so marker
/// text belonging to other sections is treated as content. An open section
/// runs to the end of the buffer.
pub fn scan(buffer: &str, sentinels: &SentinelSet) -> Result<ScanResult, DecodeError> {
    let mut result = ScanResult::default();
    let mut cursor = 0;

    while let Some((pos, sentinel)) = earliest_sentinel(buffer, cursor, sentinels) {
        let section = match sentinel {
            Sentinel::Start(section) if result.last_opened.is_none_or(|last| section > last) => {
                section
            }
            found => {
                return Err(DecodeError::OutOfOrder {
                    found,
                    after: derive_phase(result.last_opened),
                });
            }
        };
        result.last_opened = Some(section);

        let body_start = pos + sentinels.start(section).len();
        let end = sentinels.end(section);
        match buffer[body_start..].find(end) {
            Some(offset) => {
                let body = &buffer[body_start..body_start + offset];
                result
                    .sections
                    .set(section, SectionValue::Complete(body.trim().to_string()));
                cursor = body_start + offset + end.len();
            }
            None => {
                let body = &buffer[body_start..];
                result
                    .sections
                    .set(section, SectionValue::Partial(body.trim().to_string()));
                result.open = Some(section);
                break;
            }
        }
    }

    Ok(result)
}

/// Phase implied by the latest opened section.
pub fn derive_phase(last_opened: Option<Section>) -> Phase {
    last_opened.map_or(Phase::Input, Phase::entered_by)
}

/// Find the first sentinel of any kind at or after `from`.
fn earliest_sentinel(buffer: &str, from: usize, sentinels: &SentinelSet) -> Option<(usize, Sentinel)> {
    let haystack = &buffer[from..];
    sentinels
        .iter()
        .filter_map(|(sentinel, literal)| haystack.find(literal).map(|pos| (from + pos, sentinel)))
        .min_by_key(|(pos, _)| *pos)
}
