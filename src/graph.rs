// graph.rs is shared between the library and binary targets.  Invariant
// checkers used only by the test suite look "unused" to the binary —
// suppress those false-positive warnings.
#![allow(dead_code)]
//! Bidirected scaffolding graph.
//!
//! Nodes are oriented scaffolds encoded as `id << 1 | orientation`; an arc
//! `u → v` means "scaffold(u) continues into scaffold(v)" and always exists
//! together with its mate `v^1 → u^1` (complement flips the low bit). Mated
//! arcs share a `link_id`, carry the same weight, and are only ever removed
//! together. Arcs are kept sorted by source node, best weight first, with a
//! per-node range index.

use crate::config::GraphParams;
use crate::dict::Layout;
use crate::matrix::InterMat;
use crate::norm;
use crate::types::{HashMap, HashMapExt, HashSet, HashSetExt, ScafId};

#[derive(Debug, Clone)]
pub struct Arc {
    pub from: u32,
    pub to: u32,
    pub weight: f64,
    pub link_id: u64,
}

#[inline]
fn complement(node: u32) -> u32 {
    node ^ 1
}

pub struct Graph {
    n_nodes: u32,
    arcs: Vec<Arc>,
    idx: Vec<(u32, u32)>,
    next_link_id: u64,
}

impl Graph {
    pub fn new(n_scaffolds: usize) -> Self {
        let n_nodes = (n_scaffolds * 2) as u32;
        Self {
            n_nodes,
            arcs: Vec::new(),
            idx: vec![(0, 0); n_nodes as usize],
            next_link_id: 0,
        }
    }

    /// Construct from the normalized inter matrix: a bucket becomes an edge
    /// when its direction bit is set, its score clears `min_norm`, and it
    /// clears the per-pair binomial quality floor.
    pub fn from_inter(
        inter: &InterMat,
        layout: &Layout,
        params: &GraphParams,
        quantile: f64,
    ) -> Self {
        let mut g = Self::new(layout.n_scaffolds());

        // Deterministic construction order.
        let mut pairs: Vec<(ScafId, ScafId)> = inter.links.keys().copied().collect();
        pairs.sort_unstable();

        for (c0, c1) in pairs {
            let link = &inter.links[&(c0, c1)];
            if link.linkt == 0 {
                continue;
            }
            let qla = norm::qla(link.n0, inter.la, quantile);
            for j in 0..4u32 {
                if link.linkt & (1 << j) == 0 {
                    continue;
                }
                let w = link.norm[j as usize];
                if w >= params.min_norm && w >= qla {
                    g.add_edge(c0 << 1 | (j >> 1), c1 << 1 | (j & 1), w);
                }
            }
        }
        g.index();
        g
    }

    /// Add an edge as two mated arcs sharing a link id.
    pub fn add_edge(&mut self, v: u32, w: u32, weight: f64) {
        let max_node = v.max(w);
        if max_node >= self.n_nodes {
            self.n_nodes = max_node + 2 - (max_node & 1);
            self.idx.resize(self.n_nodes as usize, (0, 0));
        }
        let link_id = self.next_link_id;
        self.next_link_id += 1;
        self.arcs.push(Arc { from: v, to: w, weight, link_id });
        self.arcs.push(Arc { from: complement(w), to: complement(v), weight, link_id });
    }

    /// Re-establish sort order (by source, then weight descending, then
    /// target) and the per-node arc ranges.
    pub fn index(&mut self) {
        self.arcs.sort_by(|a, b| {
            a.from
                .cmp(&b.from)
                .then(b.weight.partial_cmp(&a.weight).expect("no NaN arc weight"))
                .then(a.to.cmp(&b.to))
        });
        self.idx = vec![(0, 0); self.n_nodes as usize];
        let mut i = 0usize;
        while i < self.arcs.len() {
            let from = self.arcs[i].from;
            let lo = i;
            while i < self.arcs.len() && self.arcs[i].from == from {
                i += 1;
            }
            self.idx[from as usize] = (lo as u32, i as u32);
        }
    }

    pub fn n_arcs(&self) -> usize {
        self.arcs.len()
    }

    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    pub fn arcs_from(&self, u: u32) -> &[Arc] {
        let (lo, hi) = self.idx[u as usize];
        &self.arcs[lo as usize..hi as usize]
    }

    pub fn out_deg(&self, u: u32) -> usize {
        self.arcs_from(u).len()
    }

    /// In-degree of `u` equals the out-degree of its complement, by the
    /// mate invariant.
    pub fn in_deg(&self, u: u32) -> usize {
        self.out_deg(complement(u))
    }

    /// Remove every arc whose link id is in `drop`, taking mates along, and
    /// re-index. Returns the number of arcs removed.
    fn purge(&mut self, drop: &HashSet<u64>) -> usize {
        if drop.is_empty() {
            return 0;
        }
        let before = self.arcs.len();
        self.arcs.retain(|a| !drop.contains(&a.link_id));
        self.index();
        before - self.arcs.len()
    }

    /// Mated-arc invariant: every arc has exactly one mate with the same
    /// link id, complemented endpoints and identical weight.
    pub fn mates_consistent(&self) -> bool {
        let mut by_id: HashMap<u64, Vec<&Arc>> = HashMap::new();
        for a in &self.arcs {
            by_id.entry(a.link_id).or_default().push(a);
        }
        by_id.values().all(|pair| {
            pair.len() == 2
                && pair[0].weight == pair[1].weight
                && pair[1].from == complement(pair[0].to)
                && pair[1].to == complement(pair[0].from)
        })
    }

    // ── pruning cascade ──────────────────────────────────────────────────

    /// Drop arcs that are absolutely weak (`< alpha ×` the best at their
    /// source) or confidently dominated (`<= beta ×` the best), and arcs
    /// whose alternative two-arc path is stronger by more than `1/gamma`.
    /// Near-ties survive for the later passes.
    fn simple_filter(&mut self, params: &GraphParams) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            let arcs = self.arcs_from(u);
            if arcs.is_empty() {
                continue;
            }
            let w_max = arcs[0].weight;
            for a in &arcs[1..] {
                if a.weight < params.alpha * w_max || a.weight <= params.beta * w_max {
                    drop.insert(a.link_id);
                }
            }
            for a in arcs {
                for b in arcs {
                    if b.to == a.to || drop.contains(&b.link_id) {
                        continue;
                    }
                    for c in self.arcs_from(b.to) {
                        if c.to == a.to && a.weight < params.gamma * b.weight.min(c.weight) {
                            drop.insert(a.link_id);
                        }
                    }
                }
            }
        }
        self.purge(&drop)
    }

    /// Degree-1 nodes whose only arc leads into a node with competing
    /// incoming evidence are dead-end tips.
    fn trim_tips(&mut self) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            if self.out_deg(u) != 1 || self.in_deg(u) != 0 {
                continue;
            }
            let a = &self.arcs_from(u)[0];
            if self.in_deg(a.to) > 1 {
                drop.insert(a.link_id);
            }
        }
        self.purge(&drop)
    }

    /// Arcs where exactly one side is that scaffold end's sole connection
    /// and the busy side prefers a different arc: the dangling attachment is
    /// blunt and goes.
    fn trim_blunts(&mut self) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            for a in self.arcs_from(u) {
                let u_term = self.out_deg(a.from) == 1;
                let v_term = self.out_deg(complement(a.to)) == 1;
                if u_term == v_term {
                    continue;
                }
                let busy = if u_term { complement(a.to) } else { a.from };
                if self.arcs_from(busy)[0].link_id != a.link_id {
                    drop.insert(a.link_id);
                }
            }
        }
        self.purge(&drop)
    }

    /// Scaffolds with more than two connections and balanced conflicting
    /// evidence at an end behave like repeats; all their arcs go.
    fn trim_repeats(&mut self, beta: f64) -> usize {
        let mut drop = HashSet::new();
        for s in 0..self.n_nodes / 2 {
            let d3 = self.out_deg(s << 1);
            let d5 = self.out_deg(s << 1 | 1);
            if d3 + d5 <= 2 {
                continue;
            }
            let balanced = |u: u32| {
                let arcs = self.arcs_from(u);
                arcs.len() >= 2 && arcs[1].weight >= beta * arcs[0].weight
            };
            if balanced(s << 1) || balanced(s << 1 | 1) {
                for a in self.arcs_from(s << 1) {
                    drop.insert(a.link_id);
                }
                for a in self.arcs_from(s << 1 | 1) {
                    drop.insert(a.link_id);
                }
            }
        }
        self.purge(&drop)
    }

    /// Transitive reduction: `u→w` is redundant next to `u→v→w` unless it
    /// carries more than `tau ×` the path's bottleneck weight.
    fn trim_transitive(&mut self, tau: f64) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            let arcs = self.arcs_from(u);
            for direct in arcs {
                for step in arcs {
                    if step.to == direct.to {
                        continue;
                    }
                    for hop in self.arcs_from(step.to) {
                        if hop.to == direct.to
                            && direct.weight <= step.weight.min(hop.weight) * tau
                        {
                            drop.insert(direct.link_id);
                        }
                    }
                }
            }
        }
        self.purge(&drop)
    }

    /// Pop directed bubbles: parallel two-arc paths between the same ordered
    /// node pair keep only the path with the heavier bottleneck.
    fn pop_bubbles(&mut self) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            // (sink node) -> best (bottleneck, mid arc id, hop arc id)
            let mut best: HashMap<u32, (f64, u64, u64)> = HashMap::new();
            for a in self.arcs_from(u) {
                if self.out_deg(a.to) != 1 {
                    continue;
                }
                let hop = &self.arcs_from(a.to)[0];
                let bottleneck = a.weight.min(hop.weight);
                match best.get(&hop.to) {
                    Some(&(w, mid_id, hop_id)) => {
                        if bottleneck > w {
                            drop.insert(mid_id);
                            drop.insert(hop_id);
                            best.insert(hop.to, (bottleneck, a.link_id, hop.link_id));
                        } else {
                            drop.insert(a.link_id);
                            drop.insert(hop.link_id);
                        }
                    }
                    None => {
                        best.insert(hop.to, (bottleneck, a.link_id, hop.link_id));
                    }
                }
            }
        }
        self.purge(&drop)
    }

    /// Pop orientation bubbles: a node linking both orientations of the same
    /// scaffold keeps only the heavier arc.
    fn pop_orientation_bubbles(&mut self) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            let mut best: HashMap<u32, (f64, u64)> = HashMap::new();
            for a in self.arcs_from(u) {
                let sink = a.to >> 1;
                match best.get(&sink) {
                    Some(&(w, id)) => {
                        if a.weight > w {
                            drop.insert(id);
                            best.insert(sink, (a.weight, a.link_id));
                        } else {
                            drop.insert(a.link_id);
                        }
                    }
                    None => {
                        best.insert(sink, (a.weight, a.link_id));
                    }
                }
            }
        }
        self.purge(&drop)
    }

    /// Absolute weight floor.
    fn trim_weak(&mut self, delta: f64) -> usize {
        let mut drop = HashSet::new();
        for a in &self.arcs {
            if a.weight < delta {
                drop.insert(a.link_id);
            }
        }
        self.purge(&drop)
    }

    /// Arcs joining a scaffold to itself (inverted or not).
    fn trim_self_loops(&mut self) -> usize {
        let mut drop = HashSet::new();
        for a in &self.arcs {
            if a.from >> 1 == a.to >> 1 {
                drop.insert(a.link_id);
            }
        }
        self.purge(&drop)
    }

    /// Final pass: a node still branching keeps its best arc only when that
    /// arc dominates everything else by the `beta` ratio; otherwise all its
    /// arcs go.
    fn trim_ambiguous(&mut self, beta: f64) -> usize {
        let mut drop = HashSet::new();
        for u in 0..self.n_nodes {
            let arcs = self.arcs_from(u);
            if arcs.len() < 2 {
                continue;
            }
            if arcs[1].weight < beta * arcs[0].weight {
                for a in &arcs[1..] {
                    drop.insert(a.link_id);
                }
            } else {
                for a in arcs {
                    drop.insert(a.link_id);
                }
            }
        }
        self.purge(&drop)
    }

    /// Run the filter cascade to a fixed point, then the ambiguity pass.
    pub fn prune(&mut self, params: &GraphParams) {
        loop {
            let before = self.arcs.len();
            self.simple_filter(params);
            self.trim_tips();
            self.trim_blunts();
            self.trim_repeats(params.beta);
            self.trim_transitive(params.tau);
            self.pop_bubbles();
            self.pop_orientation_bubbles();
            self.trim_weak(params.delta);
            self.trim_self_loops();
            if self.arcs.len() == before {
                break;
            }
        }
        self.trim_ambiguous(params.beta);
    }

    // ── path extraction ──────────────────────────────────────────────────

    /// Extract a non-branching path cover. Every scaffold of the layout
    /// appears in exactly one path; scaffolds untouched by the graph become
    /// singletons; cycles are broken at their weakest arc.
    pub fn extract_paths(&self, layout: &Layout) -> Vec<Vec<(ScafId, u8)>> {
        let n = layout.n_scaffolds();
        let mut visited = vec![false; n];
        let mut paths: Vec<Vec<(ScafId, u8)>> = Vec::new();

        let walk = |start: u32, visited: &mut Vec<bool>| -> Vec<(ScafId, u8)> {
            let mut path = vec![(start >> 1, (start & 1) as u8)];
            visited[(start >> 1) as usize] = true;
            let mut cur = start;
            while let Some(a) = self.arcs_from(cur).first() {
                let sid = (a.to >> 1) as usize;
                if sid >= n || visited[sid] {
                    break;
                }
                visited[sid] = true;
                path.push((a.to >> 1, (a.to & 1) as u8));
                cur = a.to;
            }
            path
        };

        // Linear paths, from source nodes.
        for u in 0..self.n_nodes {
            if (u >> 1) as usize >= n || visited[(u >> 1) as usize] {
                continue;
            }
            if self.out_deg(u) >= 1 && self.in_deg(u) == 0 {
                paths.push(walk(u, &mut visited));
            }
        }

        // Remaining components with arcs are cycles: break each at its
        // weakest arc and walk from there.
        for u in 0..self.n_nodes {
            if (u >> 1) as usize >= n || visited[(u >> 1) as usize] || self.out_deg(u) == 0 {
                continue;
            }
            let mut weakest: Option<&Arc> = None;
            let mut cur = u;
            let mut steps = 0usize;
            loop {
                let Some(a) = self.arcs_from(cur).first() else { break };
                if weakest.map(|w| a.weight < w.weight).unwrap_or(true) {
                    weakest = Some(a);
                }
                cur = a.to;
                steps += 1;
                if cur == u || (cur >> 1) as usize >= n || visited[(cur >> 1) as usize] || steps > 2 * n
                {
                    break;
                }
            }
            let start = weakest.expect("component has arcs").to;
            if (start >> 1) as usize >= n || visited[(start >> 1) as usize] {
                continue;
            }
            paths.push(walk(start, &mut visited));
        }

        // Singletons.
        for s in 0..n {
            if !visited[s] {
                paths.push(vec![(s as ScafId, 0)]);
            }
        }
        paths
    }
}
