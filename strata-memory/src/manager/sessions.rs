//! Session delta tracking: incremental transcript indexing.

use tracing::{debug, info};

use super::{BatchItem, MemoryManager};
use crate::memory::{select_new_turns, DeltaIndexResult, SessionDeltaState, Tier, TranscriptEntry};

impl MemoryManager {
    /// Index the transcript turns of `session_id` not indexed before.
    ///
    /// Only turns above the session watermark are written (as episodic
    /// `interaction` entries, in one batch). The watermark then advances to
    /// the highest turn written and pending turns reset. If the batch writes
    /// nothing the watermark stays put.
    #[tracing::instrument(skip(self, entries), fields(turns = entries.len()))]
    pub fn index_session_transcript(
        &mut self,
        session_id: &str,
        entries: &[TranscriptEntry],
    ) -> DeltaIndexResult {
        let watermark = self
            .session_deltas
            .get(session_id)
            .map_or(0, |state| state.last_indexed_turn);
        let fresh = select_new_turns(watermark, entries);
        let skipped = entries.len() - fresh.len();

        let Some(max_turn) = fresh.iter().map(|t| t.turn_number).max() else {
            debug!(session_id, watermark, "nothing new to index");
            return DeltaIndexResult {
                indexed: 0,
                skipped: entries.len(),
            };
        };

        let now = self.time.now();
        let items: Vec<BatchItem> = fresh
            .iter()
            .map(|turn| BatchItem::from(turn.to_memory_entry(session_id, now)))
            .collect();
        let batch = self.batch_upsert(items, Tier::Episodic);
        if batch.applied() == 0 {
            return DeltaIndexResult {
                indexed: 0,
                skipped,
            };
        }

        self.session_deltas
            .entry(session_id.to_string())
            .or_insert_with(|| SessionDeltaState::unseen(now))
            .advance(max_turn, now);
        self.persist_delta(session_id);

        info!(
            session_id,
            indexed = batch.applied(),
            skipped,
            watermark = max_turn,
            "session transcript indexed"
        );
        DeltaIndexResult {
            indexed: batch.applied(),
            skipped,
        }
    }

    /// Note `count` turns that happened since the last indexing.
    ///
    /// Returns the updated state.
    pub fn record_pending_turns(&mut self, session_id: &str, count: u64) -> SessionDeltaState {
        let now = self.time.now();
        let state = self
            .session_deltas
            .entry(session_id.to_string())
            .or_insert_with(|| SessionDeltaState::unseen(now));
        state.pending_turns = state.pending_turns.saturating_add(count);
        let snapshot = state.clone();
        self.persist_delta(session_id);
        snapshot
    }

    /// Watermark state of a session, if it was ever indexed or noted.
    #[must_use]
    pub fn session_delta(&self, session_id: &str) -> Option<&SessionDeltaState> {
        self.session_deltas.get(session_id)
    }
}
