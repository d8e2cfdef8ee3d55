//! Memory - Entry Model, Scratchpad and Session Deltas
//!
//! The in-memory value types the manager owns. Nothing here touches storage.

mod delta;
mod entry;
mod scratchpad;

pub use delta::{
    select_new_turns, DeltaIndexResult, SessionDeltaState, TranscriptEntry, TRANSCRIPT_SOURCE,
};
pub use entry::{
    content_hash, generate_id, truncate_to_ms, EntryType, MemoryEntry, Metadata, Tier,
};
pub use scratchpad::{Scratchpad, ScratchpadError, ScratchpadResult};
