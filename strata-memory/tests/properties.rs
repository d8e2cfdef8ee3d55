//! Property Tests
//!
//! Seeded random operation sequences checked against the engine's
//! invariants. A failing seed reproduces exactly.

use std::collections::HashSet;

use strata_memory::dst::{DeterministicRng, SimClock, SimConfig};
use strata_memory::retrieval::merge_hybrid_results;
use strata_memory::storage::FallbackBackend;
use strata_memory::{
    EntryType, MatchType, MemoryConfig, MemoryEntry, MemoryManager, MemorySearchResult,
    MemorySnapshot, Tier, TranscriptEntry,
};

const SEED_COUNT: u64 = 24;
const STEPS: usize = 200;

fn sim() -> SimConfig {
    SimConfig::from_env(SEED_COUNT, STEPS)
}

fn manager(clock: &SimClock, max_results: usize, cache: i64) -> MemoryManager {
    MemoryManager::builder()
        .with_config(
            MemoryConfig::default()
                .with_max_results(max_results)
                .with_lru_cache_size(cache),
        )
        .with_backend(Box::new(FallbackBackend::new()))
        .with_time_source(clock.clone().into())
        .build()
}

fn random_type(rng: &mut DeterministicRng) -> EntryType {
    let types = [
        EntryType::Interaction,
        EntryType::Knowledge,
        EntryType::Observation,
        EntryType::Custom("note".to_string()),
    ];
    rng.choose(&types[..]).clone()
}

/// Apply one random operation. Returns ids that were deleted.
fn random_step(
    memory: &mut MemoryManager,
    clock: &SimClock,
    rng: &mut DeterministicRng,
    known: &mut Vec<String>,
) -> Option<String> {
    clock.advance_ms(rng.next_usize(0, 50) as u64);
    match rng.next_usize(0, 5) {
        0 | 1 => {
            let entry = memory.new_entry(format!("episode {}", rng.next_u64()), random_type(rng));
            known.push(memory.add_episodic(entry).unwrap());
        }
        2 => {
            let entry = memory
                .new_entry(format!("fact {}", rng.next_u64()), EntryType::Knowledge)
                .with_embedding(rng.next_vector(4));
            known.push(memory.add_semantic(entry).unwrap());
        }
        3 if !known.is_empty() => {
            // Re-add an existing id to a random tier
            let id = rng.choose(known.as_slice()).clone();
            if let Some(existing) = memory.get_entry_by_id(&id) {
                let moved = MemoryEntry {
                    content: format!("{} (moved)", existing.content),
                    ..existing
                };
                if rng.next_bool(0.5) {
                    memory.add_semantic(moved).unwrap();
                } else {
                    memory.add_episodic(moved).unwrap();
                }
            }
        }
        4 if !known.is_empty() => {
            let id = rng.choose(known.as_slice()).clone();
            if memory.delete_entry(&id) {
                return Some(id);
            }
        }
        _ => {
            if let Some(id) = known.last() {
                let _ = memory.get_entry_by_id(id);
            }
        }
    }
    None
}

fn assert_tiers_exclusive(memory: &MemoryManager) {
    let episodic: HashSet<&str> = memory.episodic().iter().map(|e| e.id.as_str()).collect();
    let semantic: HashSet<&str> = memory.semantic().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(episodic.len(), memory.episodic().len(), "duplicate id in episodic");
    assert_eq!(semantic.len(), memory.semantic().len(), "duplicate id in semantic");
    assert!(episodic.is_disjoint(&semantic), "id in both tiers");
}

// =============================================================================
// Tier exclusivity and cache coherence
// =============================================================================

#[test]
fn test_property_tier_exclusivity_and_cache_coherence() {
    for seed in sim().seeds() {
        let clock = SimClock::at_ms(1_000_000);
        let mut rng = DeterministicRng::new(seed);
        let mut memory = manager(&clock, 8, 4);
        let mut known: Vec<String> = Vec::new();
        let mut deleted: HashSet<String> = HashSet::new();

        for _ in 0..sim().steps() {
            if let Some(id) = random_step(&mut memory, &clock, &mut rng, &mut known) {
                deleted.insert(id);
            }
            assert_tiers_exclusive(&memory);
        }

        // Every lookup agrees with the tiers
        for id in &known {
            let from_lookup = memory.get_entry_by_id(id);
            let from_tier = memory
                .episodic()
                .iter()
                .chain(memory.semantic())
                .find(|e| &e.id == id)
                .cloned();
            assert_eq!(from_lookup, from_tier, "seed {seed}: stale cache for {id}");
        }
        for id in &deleted {
            if memory.tier_of(id).is_none() {
                assert!(memory.get_entry_by_id(id).is_none(), "seed {seed}: deleted {id} served");
            }
        }
    }
}

// =============================================================================
// Compaction conservation
// =============================================================================

#[test]
fn test_property_compaction_conserves_entries() {
    for seed in sim().seeds() {
        let clock = SimClock::at_ms(1_000_000);
        let mut rng = DeterministicRng::new(seed);
        // Large max_results keeps automatic compaction out of the way
        let mut memory = manager(&clock, 1_000, 100);

        let count = rng.next_usize(0, 40);
        for i in 0..count {
            clock.advance_ms(rng.next_usize(1, 1_000) as u64);
            let entry = memory.new_entry(format!("event {i}"), random_type(&mut rng));
            memory.add_episodic(entry).unwrap();
        }

        let target = rng.next_usize(0, 30);
        let semantic_before = memory.semantic().len();
        let survivors: Vec<String> = {
            let mut sorted: Vec<&MemoryEntry> = memory.episodic().iter().collect();
            sorted.sort_by_key(|e| e.timestamp);
            sorted
                .iter()
                .rev()
                .take(target)
                .map(|e| e.id.clone())
                .collect()
        };

        let result = memory.run_compaction(Tier::Episodic, Some(target)).unwrap();

        assert_eq!(result.entries_before, count, "seed {seed}");
        assert_eq!(result.entries_before, result.entries_after + result.archived);
        assert_eq!(result.entries_after, count.min(target));
        assert_eq!(memory.episodic().len(), result.entries_after);
        assert_eq!(memory.semantic().len(), semantic_before + result.summaries_created);
        if result.archived > 0 {
            assert!(result.summaries_created >= 1);
        }
        for id in &survivors {
            assert_eq!(memory.tier_of(id), Some(Tier::Episodic), "seed {seed}: newest archived");
        }
        assert_tiers_exclusive(&memory);
    }
}

// =============================================================================
// Delta monotonicity
// =============================================================================

#[test]
fn test_property_delta_watermark_never_decreases() {
    for seed in sim().seeds() {
        let clock = SimClock::at_ms(1_000_000);
        let mut rng = DeterministicRng::new(seed);
        let mut memory = manager(&clock, 1_000, 100);
        let mut indexed_turns: HashSet<(String, u64)> = HashSet::new();

        for _ in 0..40 {
            clock.advance_ms(100);
            let session = format!("s{}", rng.next_usize(0, 2));
            let start = rng.next_usize(1, 10) as u64;
            let end = start + rng.next_usize(0, 10) as u64;
            let turns: Vec<TranscriptEntry> = (start..=end)
                .map(|n| TranscriptEntry::new(n, "user", format!("turn {n}")))
                .collect();

            let before = memory
                .session_delta(&session)
                .map_or(0, |s| s.last_indexed_turn);
            let result = memory.index_session_transcript(&session, &turns);
            let after = memory
                .session_delta(&session)
                .map_or(0, |s| s.last_indexed_turn);

            assert!(after >= before, "seed {seed}: watermark moved back");
            assert_eq!(result.indexed + result.skipped, turns.len());
            let fresh = turns.iter().filter(|t| t.turn_number > before).count();
            assert_eq!(result.indexed, fresh, "seed {seed}");

            for turn in turns.iter().filter(|t| t.turn_number > before) {
                assert!(
                    indexed_turns.insert((session.clone(), turn.turn_number)),
                    "seed {seed}: turn {} of {session} indexed twice",
                    turn.turn_number
                );
            }
        }
    }
}

// =============================================================================
// Snapshot round-trip
// =============================================================================

#[test]
fn test_property_snapshot_roundtrip() {
    for seed in sim().seeds() {
        let clock = SimClock::at_ms(1_000_000);
        let mut rng = DeterministicRng::new(seed);
        let mut source = manager(&clock, 8, 4);
        let mut known = Vec::new();
        for _ in 0..60 {
            random_step(&mut source, &clock, &mut rng, &mut known);
        }
        source
            .store_scratchpad("seed", serde_json::json!(seed))
            .unwrap();
        source.index_session_transcript("s", &[TranscriptEntry::new(1, "user", "hello")]);

        let exported = source.export_snapshot();
        let json = exported.to_json().unwrap();

        let mut target = manager(&clock, 8, 4);
        target
            .import_snapshot(MemorySnapshot::from_json(&json).unwrap())
            .unwrap();

        let reexported = target.export_snapshot();
        assert_eq!(reexported.episodic, exported.episodic, "seed {seed}");
        assert_eq!(reexported.semantic, exported.semantic, "seed {seed}");
        assert_eq!(reexported.scratchpad, exported.scratchpad);
        assert_eq!(reexported.session_deltas, exported.session_deltas);
        assert!(target.error_log().is_empty(), "seed {seed}");
    }
}

// =============================================================================
// Fusion monotonicity
// =============================================================================

fn ranked(ids: &[&str], match_type: MatchType) -> Vec<MemorySearchResult> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            let entry =
                MemoryEntry::new(format!("content {id}"), EntryType::Knowledge).with_id(*id);
            MemorySearchResult::new(entry, 1.0 - i as f64 * 0.01, Tier::Semantic, match_type)
        })
        .collect()
}

#[test]
fn test_property_rrf_rewards_presence_in_both_lists() {
    for seed in sim().seeds() {
        let mut rng = DeterministicRng::new(seed);
        let pool: Vec<String> = (0..12).map(|i| format!("id{i}")).collect();

        let pick = |rng: &mut DeterministicRng| -> Vec<String> {
            let mut ids: Vec<String> = Vec::new();
            for _ in 0..rng.next_usize(1, 8) {
                let id = rng.choose(pool.as_slice()).clone();
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            ids
        };
        let keyword_ids = pick(&mut rng);
        let vector_ids = pick(&mut rng);
        let keyword_refs: Vec<&str> = keyword_ids.iter().map(String::as_str).collect();
        let vector_refs: Vec<&str> = vector_ids.iter().map(String::as_str).collect();

        let keyword = ranked(&keyword_refs, MatchType::Keyword);
        let vector = ranked(&vector_refs, MatchType::Vector);
        let merged = merge_hybrid_results(&keyword, &vector, 0.5, 0.5);

        let union: HashSet<&str> = keyword_refs.iter().chain(&vector_refs).copied().collect();
        assert_eq!(merged.len(), union.len(), "seed {seed}");
        assert!(merged.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(merged.iter().all(|r| (0.0..=1.0).contains(&r.score)));
        assert!((merged[0].score - 1.0).abs() < 1e-9);

        // An id at the same position in both lists beats one only in a single
        // list at that position
        let position = |ids: &[&str], id: &str| ids.iter().position(|x| *x == id);
        let score = |id: &str| {
            merged
                .iter()
                .find(|r| r.entry.id == id)
                .map(|r| r.score)
                .unwrap_or(0.0)
        };
        for id in union.iter().copied() {
            let (Some(k), Some(v)) = (position(&keyword_refs, id), position(&vector_refs, id))
            else {
                continue;
            };
            for other in union.iter().copied() {
                let in_keyword = position(&keyword_refs, other);
                let in_vector = position(&vector_refs, other);
                let single = match (in_keyword, in_vector) {
                    (Some(p), None) | (None, Some(p)) => p,
                    _ => continue,
                };
                if single >= k.max(v) {
                    assert!(score(id) > score(other), "seed {seed}: {id} vs {other}");
                }
            }
        }
    }
}
