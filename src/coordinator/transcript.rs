//! Transcript assembly for one capture session.
//!
//! Capture backends deliver results indexed by a monotonically increasing
//! cursor; each result is either interim or final.  [`TranscriptAssembler`]
//! keeps the interim fragments seen since the last final result and
//! produces, per event batch:
//!
//! * a live preview — all current interim fragments concatenated in cursor
//!   order (interim fragments may be revised in place at the same cursor),
//! * or a finalised utterance — the batch's final fragments concatenated
//!   and trimmed.
//!
//! A final fragment that trims to the empty string closes the utterance but
//! yields nothing; the coordinator drops it silently.

use std::collections::BTreeMap;

use crate::capture::CaptureResult;

// ---------------------------------------------------------------------------
// Assembly
// ---------------------------------------------------------------------------

/// What one batch of capture results amounted to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assembly {
    /// Concatenated interim fragments, present when the batch refined the
    /// in-progress utterance without finishing it.
    pub preview: Option<String>,

    /// The trimmed final utterance, present when the batch contained final
    /// fragments with any text left after trimming.
    pub finalized: Option<String>,
}

// ---------------------------------------------------------------------------
// TranscriptAssembler
// ---------------------------------------------------------------------------

/// Accumulates interim capture fragments between final results.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    /// Interim fragments by cursor, so revisions at a cursor replace the
    /// earlier hypothesis instead of duplicating it.
    interim: BTreeMap<u64, String>,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one batch of results (starting at `cursor`) into the assembler.
    pub fn ingest(&mut self, cursor: u64, results: &[CaptureResult]) -> Assembly {
        let mut finals = String::new();
        let mut saw_final = false;

        for (offset, result) in results.iter().enumerate() {
            let index = cursor + offset as u64;
            if result.is_final {
                saw_final = true;
                finals.push_str(&result.transcript);
            } else {
                self.interim.insert(index, result.transcript.clone());
            }
        }

        if saw_final {
            // A final result closes the utterance; pending interim
            // hypotheses were drafts of it.
            self.interim.clear();
            let trimmed = finals.trim();
            return Assembly {
                preview: None,
                finalized: (!trimmed.is_empty()).then(|| trimmed.to_string()),
            };
        }

        let preview = if self.interim.is_empty() {
            None
        } else {
            Some(self.interim.values().cloned().collect::<Vec<_>>().concat())
        };

        Assembly {
            preview,
            finalized: None,
        }
    }

    /// Drop all accumulated fragments (new capture session or reset).
    pub fn reset(&mut self) {
        self.interim.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn interim(text: &str) -> CaptureResult {
        CaptureResult {
            transcript: text.into(),
            is_final: false,
        }
    }

    fn fin(text: &str) -> CaptureResult {
        CaptureResult {
            transcript: text.into(),
            is_final: true,
        }
    }

    #[test]
    fn interim_fragments_build_a_preview() {
        let mut asm = TranscriptAssembler::new();

        let a = asm.ingest(0, &[interim("hel")]);
        assert_eq!(a.preview.as_deref(), Some("hel"));
        assert!(a.finalized.is_none());
    }

    #[test]
    fn interim_revision_replaces_at_same_cursor() {
        let mut asm = TranscriptAssembler::new();

        asm.ingest(0, &[interim("hel")]);
        let a = asm.ingest(0, &[interim("hello")]);
        assert_eq!(a.preview.as_deref(), Some("hello"));
    }

    #[test]
    fn interim_fragments_concatenate_in_cursor_order() {
        let mut asm = TranscriptAssembler::new();

        asm.ingest(1, &[interim(" world")]);
        let a = asm.ingest(0, &[interim("hello")]);
        assert_eq!(a.preview.as_deref(), Some("hello world"));
    }

    #[test]
    fn final_result_is_trimmed_and_clears_interim() {
        let mut asm = TranscriptAssembler::new();

        asm.ingest(0, &[interim("hel")]);
        let a = asm.ingest(0, &[fin("  hello  ")]);
        assert_eq!(a.finalized.as_deref(), Some("hello"));
        assert!(a.preview.is_none());

        // Next batch starts a fresh utterance.
        let b = asm.ingest(1, &[interim("again")]);
        assert_eq!(b.preview.as_deref(), Some("again"));
    }

    #[test]
    fn batch_mixing_interim_and_final_finalises() {
        let mut asm = TranscriptAssembler::new();

        let a = asm.ingest(0, &[fin("turn it"), fin(" down")]);
        assert_eq!(a.finalized.as_deref(), Some("turn it down"));
    }

    #[test]
    fn empty_final_yields_nothing() {
        let mut asm = TranscriptAssembler::new();

        asm.ingest(0, &[interim("uh")]);
        let a = asm.ingest(0, &[fin("   ")]);
        assert!(a.finalized.is_none());
        assert!(a.preview.is_none());

        // The empty final still closed the utterance: the stale interim is
        // gone.
        let b = asm.ingest(1, &[interim("next")]);
        assert_eq!(b.preview.as_deref(), Some("next"));
    }

    #[test]
    fn reset_drops_pending_interim() {
        let mut asm = TranscriptAssembler::new();

        asm.ingest(0, &[interim("half a tho")]);
        asm.reset();

        let a = asm.ingest(0, &[interim("fresh")]);
        assert_eq!(a.preview.as_deref(), Some("fresh"));
    }

    #[test]
    fn empty_batch_is_inert() {
        let mut asm = TranscriptAssembler::new();
        let a = asm.ingest(0, &[]);
        assert_eq!(a, Assembly::default());
    }
}
