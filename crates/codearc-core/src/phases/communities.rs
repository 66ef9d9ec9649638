//! Phase 4: partition the call graph into clusters via Louvain modularity optimisation.
//!
//! Every node ends up in exactly one cluster. Nodes are visited in id order and
//! ties go to the lower community index, so a fixed graph always yields the same
//! partition.

use std::collections::{BTreeMap, HashMap, HashSet};

use log::debug;

use crate::config::{AnalysisConfig, Cluster, FunctionNode};
use crate::graph::call_graph::CallGraph;

const MAX_RESOLUTION: f64 = 10.0;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the communities phase: cluster the graph and write cluster ids back onto nodes.
pub fn run_communities_phase(config: &AnalysisConfig, graph: &mut CallGraph) -> Vec<Cluster> {
    if graph.is_empty() {
        return Vec::new();
    }

    let adj = AdjList::from_graph(graph);

    let mut resolution = config.resolution;
    let mut communities = louvain(&adj, resolution);

    // Auto-tune: double resolution until largest community <= max_cluster_size
    let max_size = config.max_cluster_size.max(1);
    let mut largest = communities.iter().map(|c| c.len()).max().unwrap_or(0);
    while largest > max_size && resolution < MAX_RESOLUTION {
        resolution *= 2.0;
        communities = louvain(&adj, resolution);
        largest = communities.iter().map(|c| c.len()).max().unwrap_or(0);
    }

    let mut final_communities: Vec<Vec<String>> = Vec::new();
    for comm in communities {
        if comm.len() > max_size {
            final_communities.extend(split_oversized(&comm, &adj, max_size));
        } else {
            final_communities.push(comm);
        }
    }

    for members in &mut final_communities {
        members.sort();
    }
    final_communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a[0].cmp(&b[0])));

    let mut label_counts: HashMap<String, usize> = HashMap::new();
    let mut pending: Vec<(String, Vec<String>, f64)> = Vec::new();
    for members in final_communities {
        let label = generate_label(&members, graph);
        let cohesion = compute_cohesion(&members, &adj);
        *label_counts.entry(label.clone()).or_insert(0) += 1;
        pending.push((label, members, cohesion));
    }

    let mut used_labels: HashSet<String> = HashSet::new();
    let mut clusters = Vec::with_capacity(pending.len());
    let mut assignment: HashMap<String, usize> = HashMap::new();
    for (id, (label, members, cohesion)) in pending.into_iter().enumerate() {
        let final_label =
            if label_counts.get(&label).copied().unwrap_or(0) > 1 || used_labels.contains(&label) {
                disambiguate_label(&label, &members, graph, &used_labels)
            } else {
                label
            };
        used_labels.insert(final_label.clone());

        for member in &members {
            assignment.insert(member.clone(), id);
        }
        clusters.push(Cluster {
            id,
            label: final_label,
            members,
            cohesion: (cohesion * 1000.0).round() / 1000.0,
        });
    }

    graph.assign_clusters(&assignment);
    debug!(
        "Clustered {} nodes into {} clusters (resolution {resolution})",
        graph.node_count(),
        clusters.len()
    );
    clusters
}

// ---------------------------------------------------------------------------
// Adjacency list for undirected weighted graph
// ---------------------------------------------------------------------------

struct AdjList {
    /// node_id -> index
    node_map: HashMap<String, usize>,
    /// index -> node_id
    nodes: Vec<String>,
    /// adjacency: index -> Vec<(neighbour_index, weight)>
    adj: Vec<Vec<(usize, f64)>>,
}

impl AdjList {
    fn new() -> Self {
        Self {
            node_map: HashMap::new(),
            nodes: Vec::new(),
            adj: Vec::new(),
        }
    }

    /// Undirected projection: every call edge adds weight 1, self-loops are ignored.
    fn from_graph(graph: &CallGraph) -> Self {
        let mut adj = Self::new();
        for id in graph.node_ids() {
            adj.ensure_node(&id);
        }
        for (src, tgt) in graph.edges() {
            if src != tgt {
                adj.add_edge(&src, &tgt, 1.0);
            }
        }
        adj
    }

    fn ensure_node(&mut self, id: &str) -> usize {
        if let Some(&idx) = self.node_map.get(id) {
            idx
        } else {
            let idx = self.nodes.len();
            self.node_map.insert(id.to_string(), idx);
            self.nodes.push(id.to_string());
            self.adj.push(Vec::new());
            idx
        }
    }

    fn add_edge(&mut self, a: &str, b: &str, weight: f64) {
        let ai = self.ensure_node(a);
        let bi = self.ensure_node(b);
        if let Some(entry) = self.adj[ai].iter_mut().find(|(n, _)| *n == bi) {
            entry.1 += weight;
        } else {
            self.adj[ai].push((bi, weight));
        }
        if let Some(entry) = self.adj[bi].iter_mut().find(|(n, _)| *n == ai) {
            entry.1 += weight;
        } else {
            self.adj[bi].push((ai, weight));
        }
    }

    fn total_weight(&self) -> f64 {
        let total: f64 = self.adj.iter().flatten().map(|&(_, w)| w).sum();
        total / 2.0
    }
}

// ---------------------------------------------------------------------------
// Louvain algorithm
// ---------------------------------------------------------------------------

/// Multi-level Louvain: local moves to maximise modularity gain, then contract
/// communities into super-nodes, until no node moves.
///
/// Returns communities as lists of node ids. Isolated nodes come back as singletons.
fn louvain(adj: &AdjList, resolution: f64) -> Vec<Vec<String>> {
    let n = adj.nodes.len();
    if n == 0 {
        return Vec::new();
    }

    let m = adj.total_weight();
    if m == 0.0 {
        return adj.nodes.iter().map(|id| vec![id.clone()]).collect();
    }
    let m2 = m * 2.0;

    // groups[i] = original-graph node indices belonging to current super-node i
    let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut cur_adj: Vec<Vec<(usize, f64)>> = adj.adj.clone();
    let mut cur_n = n;

    loop {
        if cur_n < 2 {
            break;
        }

        let degree: Vec<f64> = (0..cur_n)
            .map(|i| cur_adj[i].iter().map(|&(_, w)| w).sum())
            .collect();

        // ---- local node moves ----
        let mut community: Vec<usize> = (0..cur_n).collect();
        let mut sigma_tot: Vec<f64> = degree.clone();
        let mut any_moved = false;

        let mut improved = true;
        let mut iters = 0;
        while improved && iters < 100 {
            improved = false;
            iters += 1;

            for i in 0..cur_n {
                let ci = community[i];
                let ki = degree[i];

                let mut comm_weights: BTreeMap<usize, f64> = BTreeMap::new();
                for &(j, w) in &cur_adj[i] {
                    if j != i {
                        *comm_weights.entry(community[j]).or_insert(0.0) += w;
                    }
                }

                let ki_in = comm_weights.get(&ci).copied().unwrap_or(0.0);
                sigma_tot[ci] -= ki;

                let loss = ki_in - resolution * sigma_tot[ci] * ki / m2;
                let mut best_comm = ci;
                let mut best_gain = 0.0;
                for (&cj, &kj_in) in &comm_weights {
                    let gain = kj_in - resolution * sigma_tot[cj] * ki / m2;
                    let delta = gain - loss;
                    if delta > best_gain {
                        best_gain = delta;
                        best_comm = cj;
                    }
                }

                community[i] = best_comm;
                sigma_tot[best_comm] += ki;

                if best_comm != ci {
                    improved = true;
                    any_moved = true;
                }
            }
        }

        if !any_moved {
            break;
        }

        // Compact community labels to 0..new_n in first-seen order
        let mut label_map: HashMap<usize, usize> = HashMap::new();
        for &c in &community {
            let next = label_map.len();
            label_map.entry(c).or_insert(next);
        }
        let mapped: Vec<usize> = community.iter().map(|c| label_map[c]).collect();
        let new_n = label_map.len();

        if new_n == cur_n {
            break;
        }

        let mut new_groups: Vec<Vec<usize>> = vec![Vec::new(); new_n];
        for (i, &c) in mapped.iter().enumerate() {
            new_groups[c].extend_from_slice(&groups[i]);
        }
        groups = new_groups;

        // ---- contract graph ----
        // Intra-community weight becomes a self-loop so super-node degrees stay intact
        let mut new_adj: Vec<Vec<(usize, f64)>> = vec![Vec::new(); new_n];
        for i in 0..cur_n {
            let ci = mapped[i];
            for &(j, w) in &cur_adj[i] {
                let cj = mapped[j];
                if let Some(entry) = new_adj[ci].iter_mut().find(|(nb, _)| *nb == cj) {
                    entry.1 += w;
                } else {
                    new_adj[ci].push((cj, w));
                }
            }
        }

        cur_adj = new_adj;
        cur_n = new_n;
    }

    groups
        .into_iter()
        .map(|group| group.into_iter().map(|idx| adj.nodes[idx].clone()).collect())
        .collect()
}

/// Recursively split an oversized community using Louvain on its subgraph.
fn split_oversized(community: &[String], adj: &AdjList, max_size: usize) -> Vec<Vec<String>> {
    if community.len() <= max_size {
        return vec![community.to_vec()];
    }

    let member_set: HashSet<&str> = community.iter().map(|s| s.as_str()).collect();
    let mut sorted = community.to_vec();
    sorted.sort();
    let mut sub_adj = AdjList::new();
    for member in &sorted {
        sub_adj.ensure_node(member);
    }
    for member in &sorted {
        if let Some(&idx) = adj.node_map.get(member.as_str()) {
            for &(nbr_idx, w) in &adj.adj[idx] {
                let nbr = &adj.nodes[nbr_idx];
                if member_set.contains(nbr.as_str()) && nbr > member {
                    sub_adj.add_edge(member, nbr, w);
                }
            }
        }
    }

    if sub_adj.total_weight() == 0.0 {
        return vec![community.to_vec()];
    }

    let mut resolution = 2.0;
    for _ in 0..8 {
        let sub_communities = louvain(&sub_adj, resolution);
        if sub_communities.len() > 1 {
            let mut result = Vec::new();
            for sc in &sub_communities {
                result.extend(split_oversized(sc, adj, max_size));
            }
            return result;
        }
        resolution *= 2.0;
    }

    vec![community.to_vec()]
}

// ---------------------------------------------------------------------------
// Label generation + disambiguation
// ---------------------------------------------------------------------------

const STRIP_DIR_SEGMENTS: &[&str] = &["src", "source", "lib", "app", "main", "java"];

fn member_nodes<'a>(members: &[String], graph: &'a CallGraph) -> Vec<&'a FunctionNode> {
    members.iter().filter_map(|id| graph.node(id)).collect()
}

/// Most frequent value; ties go to the lexicographically greatest for stability.
fn most_common<'a>(values: impl Iterator<Item = &'a str>) -> Option<(&'a str, usize)> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    counts.into_iter().max_by_key(|&(_, c)| c)
}

fn parent_dir(path: &str) -> Option<&str> {
    path.rfind('/').map(|pos| &path[..pos])
}

fn dir_label<'a>(dir: &'a str, exclude: &str) -> Option<&'a str> {
    dir.split('/')
        .filter(|p| !STRIP_DIR_SEGMENTS.contains(&p.to_lowercase().as_str()) && *p != exclude)
        .last()
}

/// Auto-generate a cluster label from its members.
fn generate_label(members: &[String], graph: &CallGraph) -> String {
    let nodes = member_nodes(members, graph);

    // Strategy 1: most common scope if it covers >= 30% of members
    if let Some((scope, count)) = most_common(nodes.iter().filter_map(|n| n.scope.as_deref())) {
        if count * 10 >= members.len() * 3 {
            return scope.rsplit('.').next().unwrap_or(scope).to_string();
        }
    }

    // Strategy 2: most specific directory component
    if let Some((dir, _)) = most_common(nodes.iter().filter_map(|n| parent_dir(&n.file))) {
        if let Some(last) = dir_label(dir, "") {
            return last.to_string();
        }
    }

    // Strategy 3: common name prefix if >= 3 chars
    let names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let prefix = common_prefix(&names);
    if prefix.len() >= 3 {
        return prefix.trim_end_matches('_').to_string();
    }

    format!("Cluster ({} members)", members.len())
}

/// Create a unique label when several clusters share the same base label.
fn disambiguate_label(
    label: &str,
    members: &[String],
    graph: &CallGraph,
    used_labels: &HashSet<String>,
) -> String {
    let nodes = member_nodes(members, graph);

    // Secondary scope
    let mut scope_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for scope in nodes.iter().filter_map(|n| n.scope.as_deref()) {
        *scope_counts.entry(scope).or_insert(0) += 1;
    }
    let mut ranked: Vec<(&str, usize)> = scope_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    if ranked.len() > 1 {
        let secondary = ranked[1].0.rsplit('.').next().unwrap_or(ranked[1].0);
        let candidate = format!("{label}/{secondary}");
        if !used_labels.contains(&candidate) {
            return candidate;
        }
    }

    // Directory
    if let Some((dir, _)) = most_common(nodes.iter().filter_map(|n| parent_dir(&n.file))) {
        if let Some(last) = dir_label(dir, label) {
            let candidate = format!("{label}/{last}");
            if !used_labels.contains(&candidate) {
                return candidate;
            }
        }
    }

    // Distinguishing member name, longest first
    let mut names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    for name in names {
        if name != label {
            let candidate = format!("{label}:{name}");
            if !used_labels.contains(&candidate) {
                return candidate;
            }
        }
    }

    let mut idx = 2;
    loop {
        let candidate = format!("{label} #{idx}");
        if !used_labels.contains(&candidate) {
            return candidate;
        }
        idx += 1;
    }
}

/// Internal edge density: distinct undirected member pairs that are connected,
/// over all possible pairs.
fn compute_cohesion(members: &[String], adj: &AdjList) -> f64 {
    let n = members.len();
    if n < 2 {
        return 0.0;
    }

    let member_set: HashSet<&str> = members.iter().map(|s| s.as_str()).collect();
    let mut internal_edges = 0usize;
    for member in members {
        if let Some(&idx) = adj.node_map.get(member.as_str()) {
            internal_edges += adj.adj[idx]
                .iter()
                .filter(|&&(nbr, _)| member_set.contains(adj.nodes[nbr].as_str()))
                .count();
        }
    }

    // Each edge counted from both ends
    internal_edges /= 2;
    internal_edges as f64 / (n * (n - 1) / 2) as f64
}

/// Find common prefix of a list of strings.
fn common_prefix(strings: &[String]) -> String {
    let Some(first) = strings.first() else {
        return String::new();
    };
    let mut len = first.len();
    for s in &strings[1..] {
        len = len.min(s.len());
        for (i, (a, b)) in first.bytes().zip(s.bytes()).enumerate() {
            if a != b {
                len = len.min(i);
                break;
            }
        }
    }
    while !first.is_char_boundary(len) {
        len -= 1;
    }
    first[..len].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FunctionNode;

    fn build_test_adj(edges: &[(&str, &str, f64)]) -> AdjList {
        let mut adj = AdjList::new();
        for &(a, b, w) in edges {
            adj.add_edge(a, b, w);
        }
        adj
    }

    fn node(id: &str, file: &str, scope: Option<&str>, name: &str) -> FunctionNode {
        FunctionNode {
            id: id.to_string(),
            name: name.to_string(),
            file: file.to_string(),
            scope: scope.map(str::to_string),
            signature: String::new(),
            start_line: 1,
            end_line: 1,
            code: String::new(),
            cluster: None,
        }
    }

    fn two_triangles() -> CallGraph {
        let mut g = CallGraph::new();
        for id in ["a1", "a2", "a3"] {
            g.add_function(node(id, "src/orders/service.py", Some("Orders"), id));
        }
        for id in ["b1", "b2", "b3"] {
            g.add_function(node(id, "src/billing/invoice.py", Some("Billing"), id));
        }
        for (x, y) in [("a1", "a2"), ("a2", "a3"), ("a3", "a1"), ("b1", "b2"), ("b2", "b3"), ("b3", "b1"), ("a1", "b1")] {
            g.add_call(x, y);
        }
        g
    }

    #[test]
    fn louvain_two_cliques() {
        let adj = build_test_adj(&[
            ("a1", "a2", 1.0),
            ("a2", "a3", 1.0),
            ("a1", "a3", 1.0),
            ("b1", "b2", 1.0),
            ("b2", "b3", 1.0),
            ("b1", "b3", 1.0),
        ]);
        let communities = louvain(&adj, 1.0);
        assert_eq!(communities.len(), 2);
    }

    #[test]
    fn louvain_empty() {
        let adj = AdjList::new();
        assert!(louvain(&adj, 1.0).is_empty());
    }

    #[test]
    fn louvain_keeps_bridged_cliques_apart() {
        let adj = build_test_adj(&[
            ("a1", "a2", 1.0),
            ("a2", "a3", 1.0),
            ("a1", "a3", 1.0),
            ("b1", "b2", 1.0),
            ("b2", "b3", 1.0),
            ("b1", "b3", 1.0),
            ("a1", "b1", 1.0),
        ]);
        let mut communities = louvain(&adj, 1.0);
        for c in &mut communities {
            c.sort();
        }
        communities.sort();
        assert_eq!(
            communities,
            vec![vec!["a1", "a2", "a3"], vec!["b1", "b2", "b3"]]
        );
    }

    #[test]
    fn louvain_fully_connected() {
        let adj = build_test_adj(&[("a", "b", 1.0), ("b", "c", 1.0), ("a", "c", 1.0)]);
        assert_eq!(louvain(&adj, 1.0).len(), 1);
    }

    #[test]
    fn clusters_partition_every_node() {
        let mut g = two_triangles();
        g.add_function(node("lonely", "src/misc.py", None, "lonely"));
        let clusters = run_communities_phase(&AnalysisConfig::default(), &mut g);

        let mut seen: Vec<String> = clusters.iter().flat_map(|c| c.members.clone()).collect();
        seen.sort();
        assert_eq!(seen, g.node_ids());
        assert_eq!(clusters.len(), 3);
        let singleton = clusters.iter().find(|c| c.members == vec!["lonely"]).unwrap();
        assert_eq!(singleton.cohesion, 0.0);
        for n in g.nodes() {
            assert!(n.cluster.is_some());
        }
    }

    #[test]
    fn cluster_ids_order_by_size_then_first_member() {
        let mut g = two_triangles();
        g.add_function(node("lonely", "src/misc.py", None, "lonely"));
        let clusters = run_communities_phase(&AnalysisConfig::default(), &mut g);
        let firsts: Vec<_> = clusters.iter().map(|c| c.members[0].as_str()).collect();
        assert_eq!(firsts, vec!["a1", "b1", "lonely"]);
        let ids: Vec<_> = clusters.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(g.node("b2").unwrap().cluster, Some(1));
    }

    #[test]
    fn clustering_is_deterministic() {
        let mut g1 = two_triangles();
        let mut g2 = two_triangles();
        let c1 = run_communities_phase(&AnalysisConfig::default(), &mut g1);
        let c2 = run_communities_phase(&AnalysisConfig::default(), &mut g2);
        assert_eq!(c1, c2);
    }

    #[test]
    fn labels_come_from_scope() {
        let mut g = two_triangles();
        let clusters = run_communities_phase(&AnalysisConfig::default(), &mut g);
        let labels: Vec<_> = clusters.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(labels, vec!["Orders", "Billing"]);
    }

    #[test]
    fn empty_graph_yields_no_clusters() {
        let mut g = CallGraph::new();
        assert!(run_communities_phase(&AnalysisConfig::default(), &mut g).is_empty());
    }

    #[test]
    fn graph_without_edges_is_all_singletons() {
        let mut g = CallGraph::new();
        g.add_function(node("x", "a.go", None, "x"));
        g.add_function(node("y", "a.go", None, "y"));
        g.add_call("x", "x");
        let clusters = run_communities_phase(&AnalysisConfig::default(), &mut g);
        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.members.len() == 1));
    }

    #[test]
    fn oversized_clusters_are_split() {
        let mut g = two_triangles();
        let cfg = AnalysisConfig {
            max_cluster_size: 3,
            ..AnalysisConfig::default()
        };
        let clusters = run_communities_phase(&cfg, &mut g);
        assert!(clusters.iter().all(|c| c.members.len() <= 3));
    }

    #[test]
    fn duplicate_labels_are_disambiguated() {
        let mut g = CallGraph::new();
        for id in ["p1", "p2"] {
            g.add_function(node(id, "svc/a.py", Some("Svc"), id));
        }
        for id in ["q1", "q2"] {
            g.add_function(node(id, "svc/b.py", Some("Svc"), id));
        }
        g.add_call("p1", "p2");
        g.add_call("q1", "q2");
        let clusters = run_communities_phase(&AnalysisConfig::default(), &mut g);
        assert_eq!(clusters.len(), 2);
        assert_ne!(clusters[0].label, clusters[1].label);
    }

    #[test]
    fn compute_cohesion_complete() {
        let adj = build_test_adj(&[("a", "b", 1.0), ("b", "c", 1.0), ("a", "c", 1.0)]);
        let members: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert!((compute_cohesion(&members, &adj) - 1.0).abs() < 0.01);
    }

    #[test]
    fn compute_cohesion_sparse() {
        let adj = build_test_adj(&[("a", "b", 1.0)]);
        let members: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        assert!(compute_cohesion(&members, &adj) < 0.5);
    }

    #[test]
    fn common_prefix_basic() {
        let strings = vec![
            "UserService".to_string(),
            "UserController".to_string(),
            "UserRepository".to_string(),
        ];
        assert_eq!(common_prefix(&strings), "User");
        assert_eq!(common_prefix(&[]), "");
    }

    #[test]
    fn total_weight_counts_each_edge_once() {
        let adj = build_test_adj(&[("a", "b", 2.0), ("b", "c", 3.0)]);
        assert!((adj.total_weight() - 5.0).abs() < 0.001);
    }
}
