//! Closed path enumeration over the route topology.
//!
//! Every simple cycle through the origin with between
//! [`MIN_CLOSED_PATH_EDGES`] and `cutoff` edges is found by depth-first
//! search. The search is split by first hop: two paths with different first
//! hops can never coincide, so each hop runs on its own worker with its own
//! path state and the results are concatenated afterwards.

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{ClosedPath, Iata, MIN_CLOSED_PATH_EDGES};

use super::adjacency::AdjacencyMap;
use super::config::{ConfigError, cpu_count};
use super::error::PlannerError;

/// Enumerate all simple closed paths from `origin` with at most `cutoff`
/// edges. No ordering guarantee.
///
/// # Errors
///
/// Returns [`ConfigError::ZeroCutoff`] for a zero cutoff, or an error if the
/// worker pool cannot be built.
pub fn find_closed_paths(
    adjacency: &AdjacencyMap,
    origin: Iata,
    cutoff: usize,
) -> Result<Vec<ClosedPath>, PlannerError> {
    if cutoff == 0 {
        return Err(ConfigError::ZeroCutoff.into());
    }

    let first_hops: Vec<Iata> = adjacency
        .neighbors(&origin)
        .copied()
        .filter(|hop| *hop != origin)
        .collect();
    if first_hops.is_empty() || cutoff < MIN_CLOSED_PATH_EDGES {
        info!(%origin, cutoff, "no closed paths possible");
        return Ok(Vec::new());
    }

    let workers = cpu_count().min(first_hops.len());
    info!(%origin, cutoff, first_hops = first_hops.len(), workers, "enumerating closed paths");

    let pool = ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("cycles-{i}"))
        .build()?;

    let raw: Vec<Vec<Vec<Iata>>> = pool.install(|| {
        first_hops
            .par_iter()
            .map(|hop| {
                let mut path = vec![origin, *hop];
                let mut found = Vec::new();
                extend(adjacency, origin, cutoff, &mut path, &mut found);
                debug!(%hop, paths = found.len(), "first hop done");
                found
            })
            .collect()
    });

    let paths = raw
        .into_iter()
        .flatten()
        .map(ClosedPath::new)
        .collect::<Result<Vec<_>, _>>()?;

    info!(%origin, paths = paths.len(), "closed paths found");
    Ok(paths)
}

/// Depth-first extension of `path`, whose last element is the current node.
///
/// `path` is owned by a single worker: pushed on descent, popped on return.
fn extend(
    adjacency: &AdjacencyMap,
    origin: Iata,
    cutoff: usize,
    path: &mut Vec<Iata>,
    found: &mut Vec<Vec<Iata>>,
) {
    let Some(&current) = path.last() else {
        return;
    };
    let edges = path.len() - 1;

    for &next in adjacency.neighbors(&current) {
        if next == origin {
            // Closing edges are terminal.
            if edges + 1 >= MIN_CLOSED_PATH_EDGES {
                let mut closed = path.clone();
                closed.push(origin);
                found.push(closed);
            }
        } else if !path.contains(&next) && edges + 1 < cutoff {
            // Only extend if a closing edge could still fit under the cutoff.
            path.push(next);
            extend(adjacency, origin, cutoff, path, found);
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn code(s: &str) -> Iata {
        Iata::parse(s).unwrap()
    }

    fn adjacency(edges: &[(&str, &str)]) -> AdjacencyMap {
        edges.iter().map(|(a, b)| (code(a), code(b))).collect()
    }

    fn as_strings(paths: &[ClosedPath]) -> BTreeSet<String> {
        paths.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn single_three_edge_cycle() {
        let map = adjacency(&[
            ("AAA", "BBB"),
            ("AAA", "CCC"),
            ("BBB", "AAA"),
            ("BBB", "DDD"),
            ("CCC", "AAA"),
            ("DDD", "BBB"),
            ("DDD", "AAA"),
        ]);

        let paths = find_closed_paths(&map, code("AAA"), 3).unwrap();
        assert_eq!(as_strings(&paths), BTreeSet::from(["AAA-BBB-DDD-AAA".to_string()]));
    }

    #[test]
    fn zero_cutoff_rejected() {
        let map = adjacency(&[("AAA", "BBB")]);
        assert!(matches!(
            find_closed_paths(&map, code("AAA"), 0),
            Err(PlannerError::InvalidConfig(ConfigError::ZeroCutoff))
        ));
    }

    #[test]
    fn small_cutoff_yields_nothing() {
        let map = adjacency(&[("AAA", "BBB"), ("BBB", "CCC"), ("CCC", "AAA")]);
        assert!(find_closed_paths(&map, code("AAA"), 2).unwrap().is_empty());
        assert_eq!(find_closed_paths(&map, code("AAA"), 3).unwrap().len(), 1);
    }

    #[test]
    fn origin_without_routes() {
        let map = adjacency(&[("BBB", "CCC")]);
        assert!(find_closed_paths(&map, code("AAA"), 4).unwrap().is_empty());
    }

    #[test]
    fn node_next_to_origin_still_explored() {
        // CCC can close directly but AAA-BBB-CCC-DDD-AAA must still be found.
        let map = adjacency(&[
            ("AAA", "BBB"),
            ("BBB", "CCC"),
            ("CCC", "AAA"),
            ("CCC", "DDD"),
            ("DDD", "AAA"),
        ]);
        let paths = find_closed_paths(&map, code("AAA"), 4).unwrap();
        assert_eq!(
            as_strings(&paths),
            BTreeSet::from([
                "AAA-BBB-CCC-AAA".to_string(),
                "AAA-BBB-CCC-DDD-AAA".to_string()
            ])
        );
    }

    const CODES: [&str; 5] = ["AAA", "BBB", "CCC", "DDD", "EEE"];

    /// Every simple cycle through CODES[0], by exhaustive permutation.
    fn brute_force(map: &AdjacencyMap, cutoff: usize) -> BTreeSet<String> {
        fn go(
            map: &AdjacencyMap,
            cutoff: usize,
            path: &mut Vec<Iata>,
            out: &mut BTreeSet<String>,
        ) {
            let origin = path[0];
            let last = path[path.len() - 1];
            let edges = path.len() - 1;
            if edges >= 2 && edges < cutoff && map.contains_edge(&last, &origin) {
                let mut closed = path.clone();
                closed.push(origin);
                out.insert(ClosedPath::new(closed).unwrap().to_string());
            }
            for c in CODES.iter().map(|s| Iata::parse(s).unwrap()) {
                if !path.contains(&c) && map.contains_edge(&last, &c) {
                    path.push(c);
                    go(map, cutoff, path, out);
                    path.pop();
                }
            }
        }
        let mut out = BTreeSet::new();
        go(map, cutoff, &mut vec![code(CODES[0])], &mut out);
        out
    }

    proptest! {
        #[test]
        fn closed_path_invariants(
            edges in prop::collection::vec((0..5usize, 0..5usize), 0..20),
            cutoff in 1..7usize,
        ) {
            let map: AdjacencyMap = edges
                .iter()
                .filter(|(a, b)| a != b)
                .map(|&(a, b)| (code(CODES[a]), code(CODES[b])))
                .collect();
            let origin = code(CODES[0]);

            let paths = find_closed_paths(&map, origin, cutoff).unwrap();

            for path in &paths {
                let codes = path.codes();
                prop_assert_eq!(codes[0], origin);
                prop_assert_eq!(codes[codes.len() - 1], origin);
                prop_assert!(path.edge_count() >= 3 && path.edge_count() <= cutoff);
                let inner: BTreeSet<_> = codes[..codes.len() - 1].iter().collect();
                prop_assert_eq!(inner.len(), codes.len() - 1);
                for (from, to) in path.hops() {
                    prop_assert!(map.contains_edge(&from, &to));
                }
            }

            let found = as_strings(&paths);
            prop_assert_eq!(found.len(), paths.len(), "duplicate paths");
            prop_assert_eq!(found, brute_force(&map, cutoff));
        }
    }
}
