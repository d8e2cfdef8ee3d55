//! Manager compaction: applying archive plans to tiers, cache and store.

use tracing::info;

use super::{MemoryError, MemoryManager, MemoryResult};
use crate::compaction::{
    auto_summary, group_summaries, should_auto_compact, split_oldest, CompactionResult,
};
use crate::memory::{MemoryEntry, Tier};

impl MemoryManager {
    /// Archive the oldest episodic entries into one summary once episodic
    /// crosses the configured threshold.
    pub(super) fn maybe_auto_compact(&mut self) -> Option<CompactionResult> {
        let max_results = self.config.max_results;
        if !should_auto_compact(
            self.episodic.len(),
            max_results,
            self.config.compaction_threshold,
        ) {
            return None;
        }

        let before = self.episodic.len();
        let (archived, kept) = split_oldest(std::mem::take(&mut self.episodic), max_results);
        self.episodic = kept;

        let summary = auto_summary(&archived, self.time.now());
        self.retire(&archived);
        self.push_summary(summary);

        let result = CompactionResult {
            archived: archived.len(),
            summaries_created: 1,
            entries_before: before,
            entries_after: self.episodic.len(),
        };
        info!(
            archived = result.archived,
            kept = result.entries_after,
            "automatic compaction"
        );
        Some(result)
    }

    /// Archive the oldest entries of `tier` down to `target_size` (default
    /// `max_results`), one summary per entry type.
    ///
    /// # Errors
    /// Returns `MemoryError::CompactionUnsupported` for the scratchpad and
    /// semantic tiers.
    #[tracing::instrument(skip(self))]
    pub fn run_compaction(
        &mut self,
        tier: Tier,
        target_size: Option<usize>,
    ) -> MemoryResult<CompactionResult> {
        if tier != Tier::Episodic {
            return Err(MemoryError::CompactionUnsupported { tier });
        }

        let target = target_size.unwrap_or(self.config.max_results);
        let before = self.episodic.len();
        if before <= target {
            return Ok(CompactionResult::unchanged(before));
        }

        let (archived, kept) = split_oldest(std::mem::take(&mut self.episodic), target);
        self.episodic = kept;

        let summaries = group_summaries(&archived, self.time.now());
        let summaries_created = summaries.len();
        self.retire(&archived);
        for summary in summaries {
            self.push_summary(summary);
        }

        let result = CompactionResult {
            archived: archived.len(),
            summaries_created,
            entries_before: before,
            entries_after: self.episodic.len(),
        };

        // Postconditions
        debug_assert_eq!(result.entries_before, result.entries_after + result.archived);
        debug_assert!(result.archived == 0 || result.summaries_created >= 1);

        info!(
            archived = result.archived,
            summaries = result.summaries_created,
            target,
            "explicit compaction"
        );
        Ok(result)
    }

    /// Drop archived originals from the cache and the store. They are
    /// already gone from the tier.
    fn retire(&mut self, archived: &[MemoryEntry]) {
        for entry in archived {
            self.cache.delete(&entry.id);
            self.delete_persisted_entry(&entry.id);
        }
    }

    fn push_summary(&mut self, summary: MemoryEntry) {
        self.persist_entry(&summary, Tier::Semantic);
        self.place(summary, Tier::Semantic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::MemoryConfig;
    use crate::memory::EntryType;
    use crate::storage::FallbackBackend;
    use strata_core::SimClock;

    fn manager(max_results: usize) -> (MemoryManager, SimClock) {
        let clock = SimClock::at_ms(1_704_067_200_000);
        let memory = MemoryManager::builder()
            .with_config(MemoryConfig::default().with_max_results(max_results))
            .with_backend(Box::new(FallbackBackend::new()))
            .with_time_source(clock.clone().into())
            .build();
        (memory, clock)
    }

    fn add(memory: &mut MemoryManager, clock: &SimClock, content: &str, entry_type: EntryType) {
        let entry = memory.new_entry(content, entry_type);
        memory.add_episodic(entry).unwrap();
        clock.advance_ms(1_000);
    }

    #[test]
    fn test_auto_compaction_fires_once() {
        let (mut memory, clock) = manager(5);
        for i in 0..10 {
            add(&mut memory, &clock, &format!("turn {i}"), EntryType::Interaction);
        }
        assert_eq!(memory.episodic().len(), 10);
        assert!(memory.semantic().is_empty());

        add(&mut memory, &clock, "turn 10", EntryType::Interaction);
        assert_eq!(memory.episodic().len(), 5);
        assert_eq!(memory.semantic().len(), 1);
        assert!(memory.semantic()[0]
            .content
            .contains("Archived summary of 6 interactions"));
        // newest kept
        assert_eq!(memory.episodic()[4].content, "turn 10");
        assert_eq!(memory.episodic()[0].content, "turn 6");
    }

    #[test]
    fn test_archived_entries_leave_cache() {
        let (mut memory, clock) = manager(2);
        let first = memory.new_entry("oldest", EntryType::Interaction);
        let first_id = memory.add_episodic(first).unwrap();
        clock.advance_ms(1_000);
        for i in 0..4 {
            add(&mut memory, &clock, &format!("later {i}"), EntryType::Interaction);
        }

        assert!(memory.tier_of(&first_id).is_none());
        assert!(memory.get_entry_by_id(&first_id).is_none());
    }

    #[test]
    fn test_explicit_compaction_groups_by_type() {
        let (mut memory, clock) = manager(50);
        add(&mut memory, &clock, "said hi", EntryType::Interaction);
        add(&mut memory, &clock, "saw rain", EntryType::Observation);
        add(&mut memory, &clock, "said bye", EntryType::Interaction);
        add(&mut memory, &clock, "latest", EntryType::Interaction);

        let result = memory.run_compaction(Tier::Episodic, Some(1)).unwrap();
        assert_eq!(result.archived, 3);
        assert_eq!(result.summaries_created, 2);
        assert_eq!(result.entries_before, 4);
        assert_eq!(result.entries_after, 1);
        assert_eq!(memory.episodic()[0].content, "latest");
        assert_eq!(memory.semantic().len(), 2);
    }

    #[test]
    fn test_explicit_compaction_noop_under_target() {
        let (mut memory, clock) = manager(5);
        add(&mut memory, &clock, "only", EntryType::Interaction);

        let result = memory.run_compaction(Tier::Episodic, None).unwrap();
        assert_eq!(result, CompactionResult::unchanged(1));
        assert!(memory.semantic().is_empty());
    }

    #[test]
    fn test_unsupported_tiers_rejected() {
        let (mut memory, _) = manager(5);
        for tier in [Tier::Scratchpad, Tier::Semantic] {
            assert!(matches!(
                memory.run_compaction(tier, None),
                Err(MemoryError::CompactionUnsupported { .. })
            ));
        }
    }

    #[test]
    fn test_semantic_never_shrinks() {
        let (mut memory, clock) = manager(2);
        let fact = memory.new_entry("fact", EntryType::Knowledge);
        memory.add_semantic(fact).unwrap();
        for i in 0..12 {
            add(&mut memory, &clock, &format!("turn {i}"), EntryType::Interaction);
        }
        memory.run_compaction(Tier::Episodic, Some(0)).unwrap();

        assert!(memory.semantic().iter().any(|e| e.content == "fact"));
        assert!(memory.episodic().is_empty());
    }
}
