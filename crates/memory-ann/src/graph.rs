//! Single-layer proximity graph.
//!
//! Each stored id owns a bounded set of undirected links to its approximate
//! nearest neighbors. Links live in a flat `id -> neighbors` map, so removing
//! a node is a map removal plus a scrub of the neighbor sets that point at it.
//!
//! Invariants maintained by every mutation:
//! - links are symmetric and never point at a missing record
//! - no node has more than `max_neighbors` links
//! - the entry point is a stored id, or `None` iff the graph is empty

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashSet};

use tracing::debug;

use crate::config::GraphConfig;
use crate::error::VectorError;
use crate::index::SearchResult;
use crate::store::{cosine_similarity, VectorStore};

/// A scored node. Orders by similarity, then by *smaller* id, so the
/// greatest candidate is the best match with a deterministic tie-break.
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    id: &'a str,
    similarity: f64,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.id.cmp(self.id))
    }
}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort best-first: similarity descending, id ascending.
fn sort_best_first(candidates: &mut [Candidate<'_>]) {
    candidates.sort_by(|a, b| b.cmp(a));
}

/// Proximity graph over the ids of a [`VectorStore`].
#[derive(Debug, Clone)]
pub struct ProximityGraph {
    max_neighbors: usize,
    search_width: usize,
    links: BTreeMap<String, BTreeSet<String>>,
    entry_point: Option<String>,
}

impl ProximityGraph {
    pub fn new(config: &GraphConfig) -> Self {
        Self {
            max_neighbors: config.max_neighbors,
            search_width: config.search_width,
            links: BTreeMap::new(),
            entry_point: None,
        }
    }

    /// Rebuild a graph from a flat edge list over the records of `store`.
    ///
    /// Fails with `InvalidSnapshot` if an edge is dangling or a self loop,
    /// a node exceeds `max_neighbors`, or the entry point is inconsistent.
    pub fn from_edges<'e>(
        config: &GraphConfig,
        store: &VectorStore,
        edges: impl IntoIterator<Item = (&'e str, &'e str)>,
        entry_point: Option<String>,
    ) -> Result<Self, VectorError> {
        let mut graph = Self::new(config);
        for (id, _) in store.iter() {
            graph.links.insert(id.to_string(), BTreeSet::new());
        }

        for (a, b) in edges {
            if a == b {
                return Err(VectorError::InvalidSnapshot(format!("self loop on {a}")));
            }
            if !store.contains(a) || !store.contains(b) {
                return Err(VectorError::InvalidSnapshot(format!(
                    "edge {a} - {b} references a missing record"
                )));
            }
            graph.link(a, b);
        }

        graph.entry_point = entry_point;
        graph
            .check_invariants(store)
            .map_err(VectorError::InvalidSnapshot)?;
        Ok(graph)
    }

    pub fn max_neighbors(&self) -> usize {
        self.max_neighbors
    }

    pub fn search_width(&self) -> usize {
        self.search_width
    }

    pub fn entry_point(&self) -> Option<&str> {
        self.entry_point.as_deref()
    }

    /// Linked ids of `id`, in ascending order.
    pub fn neighbors(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.links.get(id)
    }

    pub fn degree(&self, id: &str) -> usize {
        self.links.get(id).map_or(0, BTreeSet::len)
    }

    /// Undirected edges, each reported once as `(lo, hi)` in ascending order.
    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.links.iter().flat_map(|(a, set)| {
            set.iter()
                .filter(move |b| a.as_str() < b.as_str())
                .map(move |b| (a.as_str(), b.as_str()))
        })
    }

    pub fn edge_count(&self) -> usize {
        self.links.values().map(BTreeSet::len).sum::<usize>() / 2
    }

    pub fn clear(&mut self) {
        self.links.clear();
        self.entry_point = None;
    }

    /// Insert or replace `id`, linking it to its nearest existing nodes.
    ///
    /// The vector is validated before anything is touched, so a rejected
    /// insert leaves both the store and the graph unchanged.
    pub fn insert(
        &mut self,
        store: &mut VectorStore,
        id: &str,
        vector: Vec<f64>,
    ) -> Result<(), VectorError> {
        store.check(&vector)?;

        if store.contains(id) {
            self.remove(store, id);
        }
        store.put(id, vector)?;
        self.links.insert(id.to_string(), BTreeSet::new());

        if self.entry_point.is_none() {
            self.entry_point = Some(id.to_string());
            debug!(id, "Inserted first node as entry point");
            return Ok(());
        }

        let selected: Vec<String> = match store.get(id) {
            Some(query) => {
                let mut candidates: Vec<Candidate<'_>> = self
                    .collect_candidates(store, query, self.search_width)
                    .into_iter()
                    .filter(|c| c.id != id)
                    .collect();
                sort_best_first(&mut candidates);
                candidates
                    .into_iter()
                    .take(self.max_neighbors)
                    .map(|c| c.id.to_string())
                    .collect()
            }
            None => Vec::new(),
        };

        for neighbor in &selected {
            self.link(id, neighbor);
            if self.degree(neighbor) > self.max_neighbors {
                self.prune(store, neighbor);
            }
        }

        debug!(id, links = self.degree(id), "Inserted node");
        Ok(())
    }

    /// Remove `id` and every link touching it. Returns false if absent.
    pub fn remove(&mut self, store: &mut VectorStore, id: &str) -> bool {
        if !store.delete(id) {
            return false;
        }

        let former = self.links.remove(id).unwrap_or_default();
        for neighbor in &former {
            if let Some(set) = self.links.get_mut(neighbor) {
                set.remove(id);
            }
        }
        self.repair(store, &former);

        if self.entry_point.as_deref() == Some(id) {
            self.entry_point = former
                .iter()
                .next()
                .cloned()
                .or_else(|| store.first_id().map(str::to_string));
        }

        debug!(id, former_links = former.len(), "Removed node");
        true
    }

    /// Top `k` stored ids with `similarity >= threshold`, best first.
    ///
    /// The caller is responsible for checking the query dimension.
    pub fn search(
        &self,
        store: &VectorStore,
        query: &[f64],
        k: usize,
        threshold: f64,
    ) -> Vec<SearchResult> {
        if k == 0 || store.is_empty() {
            return Vec::new();
        }

        let width = self.search_width.max(k);
        let mut candidates: Vec<Candidate<'_>> = self
            .collect_candidates(store, query, width)
            .into_iter()
            .filter(|c| c.similarity >= threshold)
            .collect();
        sort_best_first(&mut candidates);
        candidates.truncate(k);

        candidates
            .into_iter()
            .map(|c| SearchResult::new(c.id, c.similarity))
            .collect()
    }

    /// Every node scored during a best-first expansion from the entry point.
    ///
    /// The expansion keeps a pool of the `width` best nodes seen so far and
    /// stops once the frontier can no longer improve it. A store no larger
    /// than the pool is scanned in full instead.
    fn collect_candidates<'a>(
        &'a self,
        store: &'a VectorStore,
        query: &[f64],
        width: usize,
    ) -> Vec<Candidate<'a>> {
        let Some(entry) = self.entry_point.as_deref() else {
            return Vec::new();
        };

        if store.len() <= width {
            return store
                .iter()
                .map(|(id, vector)| Candidate {
                    id,
                    similarity: cosine_similarity(query, vector),
                })
                .collect();
        }

        let Some(entry_similarity) = store.similarity_to(query, entry) else {
            return Vec::new();
        };
        let start = Candidate {
            id: entry,
            similarity: entry_similarity,
        };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut scored = vec![start];
        let mut frontier = BinaryHeap::from([start]);
        let mut pool: BinaryHeap<Reverse<Candidate<'_>>> = BinaryHeap::from([Reverse(start)]);
        visited.insert(entry);

        while let Some(best) = frontier.pop() {
            if let Some(Reverse(worst)) = pool.peek() {
                if pool.len() >= width && best < *worst {
                    break;
                }
            }

            let Some(neighbors) = self.links.get(best.id) else {
                continue;
            };
            for neighbor in neighbors {
                if !visited.insert(neighbor.as_str()) {
                    continue;
                }
                let Some(similarity) = store.similarity_to(query, neighbor) else {
                    continue;
                };
                let candidate = Candidate {
                    id: neighbor.as_str(),
                    similarity,
                };
                scored.push(candidate);

                let improves = match pool.peek() {
                    Some(Reverse(worst)) => pool.len() < width || candidate > *worst,
                    None => true,
                };
                if improves {
                    frontier.push(candidate);
                    pool.push(Reverse(candidate));
                    if pool.len() > width {
                        pool.pop();
                    }
                }
            }
        }

        scored
    }

    fn link(&mut self, a: &str, b: &str) {
        self.links
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        self.links
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    }

    fn unlink(&mut self, a: &str, b: &str) {
        if let Some(set) = self.links.get_mut(a) {
            set.remove(b);
        }
        if let Some(set) = self.links.get_mut(b) {
            set.remove(a);
        }
    }

    /// Keep the `max_neighbors` strongest links of `id`, dropping the rest.
    fn prune(&mut self, store: &VectorStore, id: &str) {
        let Some(set) = self.links.get(id) else {
            return;
        };
        let mut ranked: Vec<Candidate<'_>> = set
            .iter()
            .map(|n| Candidate {
                id: n.as_str(),
                similarity: store.similarity(id, n),
            })
            .collect();
        sort_best_first(&mut ranked);

        let dropped: Vec<String> = ranked
            .into_iter()
            .skip(self.max_neighbors)
            .map(|c| c.id.to_string())
            .collect();
        for other in &dropped {
            self.unlink(id, other);
        }
    }

    /// Offer each former neighbor of a removed node one replacement link to
    /// another former neighbor, where both sides still have spare degree.
    fn repair(&mut self, store: &VectorStore, former: &BTreeSet<String>) {
        for a in former {
            if self.degree(a) >= self.max_neighbors {
                continue;
            }
            let best = former
                .iter()
                .filter(|b| *b != a && self.degree(b) < self.max_neighbors)
                .filter(|b| !self.links.get(a).is_some_and(|set| set.contains(*b)))
                .map(|b| Candidate {
                    id: b.as_str(),
                    similarity: store.similarity(a, b),
                })
                .max()
                .map(|c| c.id.to_string());
            if let Some(b) = best {
                self.link(a, &b);
            }
        }
    }

    /// Verify the graph against `store`, returning the first violation found.
    pub fn check_invariants(&self, store: &VectorStore) -> Result<(), String> {
        if self.links.len() != store.len() {
            return Err(format!(
                "graph has {} nodes but store has {} records",
                self.links.len(),
                store.len()
            ));
        }

        for (id, set) in &self.links {
            if !store.contains(id) {
                return Err(format!("node {id} has no record"));
            }
            if set.len() > self.max_neighbors {
                return Err(format!(
                    "node {id} has {} links, max is {}",
                    set.len(),
                    self.max_neighbors
                ));
            }
            for neighbor in set {
                if neighbor == id {
                    return Err(format!("node {id} links to itself"));
                }
                let symmetric = self
                    .links
                    .get(neighbor)
                    .is_some_and(|back| back.contains(id));
                if !symmetric {
                    return Err(format!("link {id} -> {neighbor} is not symmetric"));
                }
            }
        }

        match self.entry_point.as_deref() {
            Some(entry) if !store.contains(entry) => {
                Err(format!("entry point {entry} is not a stored id"))
            }
            None if !store.is_empty() => Err("entry point missing on non-empty graph".to_string()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn setup(dimension: usize, m: usize, ef: usize) -> (ProximityGraph, VectorStore) {
        let config = GraphConfig::new(dimension)
            .with_max_neighbors(m)
            .with_search_width(ef);
        (ProximityGraph::new(&config), VectorStore::new(dimension))
    }

    fn circle_point(i: usize, n: usize) -> Vec<f64> {
        let angle = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
        vec![angle.cos(), angle.sin()]
    }

    #[test]
    fn test_first_insert_sets_entry_point() {
        let (mut graph, mut store) = setup(2, 4, 8);
        graph.insert(&mut store, "a", vec![1.0, 0.0]).unwrap();
        assert_eq!(graph.entry_point(), Some("a"));
        assert_eq!(graph.degree("a"), 0);
    }

    #[test]
    fn test_insert_links_symmetrically() {
        let (mut graph, mut store) = setup(2, 4, 8);
        graph.insert(&mut store, "a", vec![1.0, 0.0]).unwrap();
        graph.insert(&mut store, "b", vec![0.9, 0.1]).unwrap();
        assert!(graph.neighbors("a").unwrap().contains("b"));
        assert!(graph.neighbors("b").unwrap().contains("a"));
        assert_eq!(graph.entry_point(), Some("a"));
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_rejected_insert_leaves_graph_untouched() {
        let (mut graph, mut store) = setup(3, 4, 8);
        graph.insert(&mut store, "a", vec![1.0, 0.0, 0.0]).unwrap();
        let result = graph.insert(&mut store, "a", vec![1.0, 0.0]);
        assert!(matches!(result, Err(VectorError::DimensionMismatch { .. })));
        assert_eq!(store.get("a"), Some(&[1.0, 0.0, 0.0][..]));
        assert!(graph.check_invariants(&store).is_ok());
    }

    #[test]
    fn test_degree_is_bounded_and_prunes_weakest() {
        let (mut graph, mut store) = setup(2, 2, 16);
        graph.insert(&mut store, "hub", vec![1.0, 0.0]).unwrap();
        graph.insert(&mut store, "far", vec![0.0, 1.0]).unwrap();
        graph.insert(&mut store, "mid", vec![0.7, 0.7]).unwrap();
        graph.insert(&mut store, "near", vec![0.99, 0.01]).unwrap();

        let hub = graph.neighbors("hub").unwrap();
        assert!(hub.len() <= 2);
        assert!(hub.contains("near"));
        assert!(!hub.contains("far"));
        assert!(graph.check_invariants(&store).is_ok());
    }

    #[test]
    fn test_reinsert_replaces_links() {
        let (mut graph, mut store) = setup(2, 4, 8);
        graph.insert(&mut store, "a", vec![1.0, 0.0]).unwrap();
        graph.insert(&mut store, "b", vec![1.0, 0.1]).unwrap();
        graph.insert(&mut store, "b", vec![0.0, 1.0]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.check_invariants(&store).is_ok());
    }

    #[test]
    fn test_remove_scrubs_links() {
        let (mut graph, mut store) = setup(2, 4, 8);
        for (id, v) in [("a", [1.0, 0.0]), ("b", [0.9, 0.1]), ("c", [0.8, 0.2])] {
            graph.insert(&mut store, id, v.to_vec()).unwrap();
        }
        assert!(graph.remove(&mut store, "b"));
        assert!(graph.neighbors("b").is_none());
        for (_, set) in &graph.links {
            assert!(!set.contains("b"));
        }
        assert!(graph.check_invariants(&store).is_ok());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let (mut graph, mut store) = setup(2, 4, 8);
        assert!(!graph.remove(&mut store, "missing"));
        assert_eq!(graph.entry_point(), None);
    }

    #[test]
    fn test_remove_entry_point_reassigns() {
        let (mut graph, mut store) = setup(2, 4, 8);
        graph.insert(&mut store, "a", vec![1.0, 0.0]).unwrap();
        graph.insert(&mut store, "b", vec![0.0, 1.0]).unwrap();
        graph.remove(&mut store, "a");
        assert_eq!(graph.entry_point(), Some("b"));
        graph.remove(&mut store, "b");
        assert_eq!(graph.entry_point(), None);
        assert!(graph.check_invariants(&store).is_ok());
    }

    #[test]
    fn test_remove_reconnects_former_neighbors() {
        // a - b - c chain; removing the middle should bridge a and c.
        let config = GraphConfig::new(2).with_max_neighbors(2);
        let mut store = VectorStore::new(2);
        store.put("a", vec![1.0, 0.0]).unwrap();
        store.put("b", vec![1.0, 1.0]).unwrap();
        store.put("c", vec![0.0, 1.0]).unwrap();
        let mut graph = ProximityGraph::from_edges(
            &config,
            &store,
            [("a", "b"), ("b", "c")],
            Some("b".to_string()),
        )
        .unwrap();

        graph.remove(&mut store, "b");
        assert!(graph.neighbors("a").unwrap().contains("c"));
        assert_eq!(graph.entry_point(), Some("a"));
        assert!(graph.check_invariants(&store).is_ok());
    }

    #[test]
    fn test_remove_isolated_node_picks_smallest_id() {
        let config = GraphConfig::new(1);
        let mut store = VectorStore::new(1);
        for id in ["z", "m", "b"] {
            store.put(id, vec![1.0]).unwrap();
        }
        let mut graph =
            ProximityGraph::from_edges(&config, &store, [("b", "m")], Some("z".to_string()))
                .unwrap();

        graph.remove(&mut store, "z");
        assert_eq!(graph.entry_point(), Some("b"));
    }

    #[test]
    fn test_edges_reported_once() {
        let (mut graph, mut store) = setup(2, 4, 8);
        for i in 0..5 {
            graph
                .insert(&mut store, &format!("n{i}"), circle_point(i, 5))
                .unwrap();
        }
        let edges: Vec<(&str, &str)> = graph.edges().collect();
        assert_eq!(edges.len(), graph.edge_count());
        assert!(edges.iter().all(|(a, b)| a < b));
    }

    #[test]
    fn test_search_orders_and_breaks_ties_by_id() {
        let (mut graph, mut store) = setup(2, 4, 8);
        graph.insert(&mut store, "b", vec![1.0, 0.0]).unwrap();
        graph.insert(&mut store, "a", vec![2.0, 0.0]).unwrap();
        graph.insert(&mut store, "c", vec![0.0, 1.0]).unwrap();

        let results = graph.search(&store, &[1.0, 0.0], 3, -1.0);
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_search_k_zero_is_empty() {
        let (mut graph, mut store) = setup(2, 4, 8);
        graph.insert(&mut store, "a", vec![1.0, 0.0]).unwrap();
        assert!(graph.search(&store, &[1.0, 0.0], 0, 0.0).is_empty());
    }

    #[test]
    fn test_greedy_search_finds_self_beyond_scan_size() {
        let n = 200;
        let (mut graph, mut store) = setup(2, 16, 32);
        for step in 0..n {
            let i = (step * 37) % n;
            graph
                .insert(&mut store, &format!("p{i:03}"), circle_point(i, n))
                .unwrap();
        }
        assert!(store.len() > graph.search_width());

        for i in 0..n {
            let results = graph.search(&store, &circle_point(i, n), 1, 0.0);
            assert_eq!(results[0].id, format!("p{i:03}"));
            assert!((results[0].similarity - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_invariants_hold_under_random_churn() {
        let mut rng = rand::rng();
        let (mut graph, mut store) = setup(4, 4, 8);

        for round in 0..500 {
            let id = format!("n{}", rng.random_range(0..60));
            if rng.random_bool(0.3) {
                graph.remove(&mut store, &id);
            } else {
                let vector: Vec<f64> = (0..4).map(|_| rng.random_range(-1.0..1.0)).collect();
                graph.insert(&mut store, &id, vector).unwrap();
            }
            if let Err(violation) = graph.check_invariants(&store) {
                panic!("round {round}: {violation}");
            }
        }
    }

    #[test]
    fn test_from_edges_rejects_dangling_edge() {
        let config = GraphConfig::new(1);
        let mut store = VectorStore::new(1);
        store.put("a", vec![1.0]).unwrap();
        let result = ProximityGraph::from_edges(
            &config,
            &store,
            [("a", "ghost")],
            Some("a".to_string()),
        );
        assert!(matches!(result, Err(VectorError::InvalidSnapshot(_))));
    }

    #[test]
    fn test_from_edges_rejects_missing_entry_point() {
        let config = GraphConfig::new(1);
        let mut store = VectorStore::new(1);
        store.put("a", vec![1.0]).unwrap();
        let result = ProximityGraph::from_edges(&config, &store, [], None);
        assert!(matches!(result, Err(VectorError::InvalidSnapshot(_))));
    }
}
