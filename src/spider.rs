//! Bounded neighborhood expansion from a seed set (§4.H).

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::MeshlinkError;
use crate::store::UnipartiteStore;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpiderEdge {
    pub a: String,
    pub b: String,
}

impl SpiderEdge {
    fn new(a: &str, b: &str) -> Self {
        if a <= b {
            SpiderEdge {
                a: a.to_string(),
                b: b.to_string(),
            }
        } else {
            SpiderEdge {
                a: b.to_string(),
                b: a.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpiderResult {
    /// Every visited entity, with its distance from the nearest seed and
    /// whether it was itself a seed.
    pub visited: BTreeMap<String, (u32, bool)>,
    pub edges: BTreeSet<SpiderEdge>,
}

/// Breadth-first expansion from all seeds simultaneously, stopping beyond
/// distance `max_steps`. Seeds absent from `store` still appear at distance
/// 0 with no edges.
pub fn spider(
    store: &dyn UnipartiteStore,
    seeds: &BTreeSet<String>,
    max_steps: u32,
) -> Result<SpiderResult, MeshlinkError> {
    let mut visited: BTreeMap<String, (u32, bool)> = BTreeMap::new();
    let mut edges: BTreeSet<SpiderEdge> = BTreeSet::new();
    let mut queue: VecDeque<(String, u32)> = VecDeque::new();

    for seed in seeds {
        visited.insert(seed.clone(), (0, true));
        queue.push_back((seed.clone(), 0));
    }

    while let Some((node, depth)) = queue.pop_front() {
        if depth >= max_steps || !store.has_entity(&node)? {
            continue;
        }
        let mut neighbors: Vec<String> = store.neighbors(&node)?.into_iter().collect();
        neighbors.sort();
        for neighbor in neighbors {
            edges.insert(SpiderEdge::new(&node, &neighbor));
            let next_depth = depth + 1;
            match visited.get(&neighbor) {
                Some((existing_depth, _)) if *existing_depth <= next_depth => {}
                _ => {
                    let is_seed = seeds.contains(&neighbor);
                    visited.insert(neighbor.clone(), (next_depth, is_seed));
                    queue.push_back((neighbor, next_depth));
                }
            }
        }
    }

    Ok(SpiderResult { visited, edges })
}
