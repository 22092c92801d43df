use log::debug;

use super::filter::FilterCondition;
use crate::gis::FeatureKey;

/// Splits a sequence of identifiers into `IN` conditions of at most
/// `chunk_size` values each. Duplicates are dropped so every identifier lands
/// in exactly one chunk. An empty input yields no chunks.
pub fn chunk_in_conditions<S: AsRef<str>>(
    column: &str,
    ids: &[S],
    chunk_size: usize,
) -> Vec<Vec<FilterCondition>> {
    let chunk_size = chunk_size.max(1);
    let mut seen = std::collections::HashSet::new();
    let unique = ids
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| seen.insert(*id))
        .collect::<Vec<_>>();

    let chunks = unique
        .chunks(chunk_size)
        .map(|chunk| vec![FilterCondition::in_list(column, chunk.iter().copied())])
        .collect::<Vec<_>>();
    debug!(
        "Chunked {} {} value(s) into {} condition group(s) of <= {}",
        unique.len(),
        column,
        chunks.len(),
        chunk_size
    );
    chunks
}

/// Convenience for the common `incid IN (...)` chunking.
pub fn chunk_incid_conditions<S: AsRef<str>>(
    incids: &[S],
    chunk_size: usize,
) -> Vec<Vec<FilterCondition>> {
    chunk_in_conditions("incid", incids, chunk_size)
}

/// Builds OR-joined `(toid = ? AND toid_fragment_id = ?)` clauses, at most
/// `chunk_size` feature clauses per group.
pub fn chunk_feature_conditions(
    features: &[FeatureKey],
    chunk_size: usize,
) -> Vec<Vec<FilterCondition>> {
    let chunk_size = chunk_size.max(1);
    features
        .chunks(chunk_size)
        .map(|chunk| {
            let mut conditions = Vec::with_capacity(chunk.len() * 2);
            for (i, feature) in chunk.iter().enumerate() {
                let mut toid = FilterCondition::eq("toid", feature.toid.as_str()).open();
                if i > 0 {
                    toid = toid.or();
                }
                conditions.push(toid);
                conditions.push(
                    FilterCondition::eq("toid_fragment_id", feature.toid_fragment_id.as_str())
                        .close(),
                );
            }
            conditions
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{evaluate_conditions, ConditionValue, SqlValue};
    use std::collections::HashSet;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("HLU:{:07}", i)).collect()
    }

    #[test]
    fn chunk_count_is_ceiling_of_n_over_c() {
        for (n, c) in [(0, 240), (1, 240), (240, 240), (241, 240), (1000, 250), (7, 3)] {
            let chunks = chunk_incid_conditions(&ids(n), c);
            assert_eq!(chunks.len(), n.div_ceil(c), "n={n} c={c}");
        }
    }

    #[test]
    fn every_id_appears_exactly_once_and_no_chunk_exceeds_limit() {
        let input = ids(1003);
        let chunks = chunk_incid_conditions(&input, 250);
        let mut seen = HashSet::new();
        for chunk in &chunks {
            assert_eq!(chunk.len(), 1);
            let condition = &chunk[0];
            assert!(condition.value_count() <= 250);
            if let ConditionValue::List(values) = &condition.value {
                for value in values {
                    assert!(seen.insert(value.as_text().unwrap().to_string()));
                }
            } else {
                panic!("expected list value");
            }
        }
        assert_eq!(seen.len(), input.len());
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_incid_conditions::<String>(&[], 240).is_empty());
        assert!(chunk_feature_conditions(&[], 240).is_empty());
    }

    #[test]
    fn feature_chunks_match_only_listed_pairs() {
        let features = vec![
            FeatureKey::new("HLU:0000001", "t1", "00001"),
            FeatureKey::new("HLU:0000001", "t2", "00001"),
            FeatureKey::new("HLU:0000001", "t2", "00002"),
        ];
        let chunks = chunk_feature_conditions(&features, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4);

        let lookup = |toid: &str, frag: &str| {
            let toid = toid.to_string();
            let frag = frag.to_string();
            move |column: &str| match column {
                "toid" => Some(SqlValue::from(toid.clone())),
                "toid_fragment_id" => Some(SqlValue::from(frag.clone())),
                _ => None,
            }
        };
        assert!(evaluate_conditions(&chunks[0], lookup("t2", "00001")));
        assert!(!evaluate_conditions(&chunks[0], lookup("t1", "00002")));
        assert!(evaluate_conditions(&chunks[1], lookup("t2", "00002")));
    }
}
