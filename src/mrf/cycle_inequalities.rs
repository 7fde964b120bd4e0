use std::collections::VecDeque;

use ndarray::Array3;
use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::TighteningParameters;
use crate::core::{
    AddTriplet, CostSnapshot, CycleSearch, FGBuilderError, FGBuilderResult, ProjectionDepth,
    TripletKey,
};

// ------------------------------------------------------------------------------------------

/// A search of violated cycle inequalities over a snapshot of model costs.
///
/// Triangle search scores every triangle of pairwise factors by the gap between
/// the minimum of their joint cost and the sum of the separate minima. Cycle search
/// projects variables onto binary ones, and looks for cycles with an odd number of
/// repulsive edges, which are then triangulated into triplets
/// Thresholds are received from the builder on every call, only the size limit of
/// full projections is kept here
#[derive(Debug, Clone)]
pub struct CycleInequalities {
    max_full_projection_labels: usize,
}

impl CycleInequalities {
    #[inline]
    pub fn new(parameters: TighteningParameters) -> Self {
        CycleInequalities {
            max_full_projection_labels: parameters.max_full_projection_labels,
        }
    }

    #[inline]
    pub fn max_full_projection_labels(&self) -> usize {
        self.max_full_projection_labels
    }
}

impl Default for CycleInequalities {
    fn default() -> Self {
        Self::new(TighteningParameters::default())
    }
}

impl CycleSearch for CycleInequalities {
    fn tighten_triplet(
        &mut self,
        snapshot: &CostSnapshot,
        add: &mut AddTriplet<'_>,
        budget: usize,
        tolerance: f64,
        seen: &mut FxHashSet<TripletKey>,
    ) -> FGBuilderResult<usize> {
        let triangles = find_triangles(snapshot);
        let mut candidates: Vec<(f64, (usize, usize, usize))> = triangles
            .par_iter()
            .map(|t| (triangle_gap(t), t.variables))
            .filter(|(gap, _)| *gap > tolerance)
            .collect();
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        tracing::debug!(
            triangles = triangles.len(),
            candidates = candidates.len(),
            "triangle search"
        );

        let mut accepted = 0;
        for (gap, (v1, v2, v3)) in candidates {
            if accepted >= budget {
                break;
            }
            let key = TripletKey::new(v1, v2, v3).ok_or(FGBuilderError::IndexOverflow(v3))?;
            if !seen.insert(key) {
                continue;
            }
            if add(v1, v2, v3)? {
                tracing::debug!(v1, v2, v3, gap, "triangle accepted");
                accepted += 1;
            }
        }
        Ok(accepted)
    }

    fn tighten_cycle(
        &mut self,
        snapshot: &CostSnapshot,
        add: &mut AddTriplet<'_>,
        budget: usize,
        tolerance: f64,
        depth: ProjectionDepth,
    ) -> FGBuilderResult<usize> {
        let graph =
            ProjectionGraph::new(snapshot, depth, self.max_full_projection_labels, tolerance);
        let cycles = graph.frustrated_cycles();
        tracing::debug!(
            ?depth,
            nodes = graph.node_variable.len(),
            edges = graph.edges.len(),
            cycles = cycles.len(),
            "cycle search"
        );

        let mut accepted = 0;
        for cycle in cycles {
            for (v1, v2, v3) in triangulate(&cycle) {
                if accepted >= budget {
                    return Ok(accepted);
                }
                if add(v1, v2, v3)? {
                    accepted += 1;
                }
            }
        }
        Ok(accepted)
    }
}

// ------------------------------------------------------------------------------------------

#[derive(Debug)]
struct Triangle<'a> {
    variables: (usize, usize, usize),
    unary: [&'a [f64]; 3],
    p12: &'a [f64],
    p13: &'a [f64],
    p23: &'a [f64],
}

fn find_triangles(snapshot: &CostSnapshot) -> Vec<Triangle<'_>> {
    let mut upper_neighbours = vec![Vec::new(); snapshot.number_of_variables()];
    for pairwise in snapshot.pairwise() {
        let (v1, v2) = pairwise.variables;
        upper_neighbours[v1].push(v2);
    }
    upper_neighbours.iter_mut().for_each(|n| n.sort_unstable());

    let mut triangles = Vec::new();
    for (v1, neighbours) in upper_neighbours.iter().enumerate() {
        for (pos, v2) in neighbours.iter().enumerate() {
            for v3 in &neighbours[pos + 1..] {
                if let (Some(u1), Some(u2), Some(u3), Some(p12), Some(p13), Some(p23)) = (
                    snapshot.unary(v1),
                    snapshot.unary(*v2),
                    snapshot.unary(*v3),
                    snapshot.pairwise_cost(v1, *v2),
                    snapshot.pairwise_cost(v1, *v3),
                    snapshot.pairwise_cost(*v2, *v3),
                ) {
                    triangles.push(Triangle {
                        variables: (v1, *v2, *v3),
                        unary: [u1, u2, u3],
                        p12,
                        p13,
                        p23,
                    });
                }
            }
        }
    }
    triangles
}

#[inline(always)]
fn min_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn triangle_gap(triangle: &Triangle<'_>) -> f64 {
    let [u1, u2, u3] = triangle.unary;
    let (d1, d2, d3) = (u1.len(), u2.len(), u3.len());
    let joint = Array3::from_shape_fn((d1, d2, d3), |(a, b, c)| {
        u1[a]
            + u2[b]
            + u3[c]
            + triangle.p12[a + b * d1]
            + triangle.p13[a + c * d1]
            + triangle.p23[b + c * d2]
    });
    let joint_min = joint.fold(f64::INFINITY, |m, x| m.min(*x));
    let separate_min = min_of(u1)
        + min_of(u2)
        + min_of(u3)
        + min_of(triangle.p12)
        + min_of(triangle.p13)
        + min_of(triangle.p23);
    joint_min - separate_min
}

/// Splits a cycle into a fan of sorted triples sharing its first variable
fn triangulate(cycle: &[usize]) -> Vec<(usize, usize, usize)> {
    cycle
        .windows(2)
        .skip(1)
        .map(|w| {
            let mut t = [cycle[0], w[0], w[1]];
            t.sort_unstable();
            (t[0], t[1], t[2])
        })
        .collect()
}

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct ProjectionEdge {
    nodes: (usize, usize),
    strength: f64,
    parity: u8,
}

/// Binary projections of variables connected by edges weighted with projected pairwise costs
#[derive(Debug)]
struct ProjectionGraph {
    node_variable: Vec<usize>,
    edges: Vec<ProjectionEdge>,
}

/// Labels of a variable split into two sets, `true` marks the projected set
type Partition = Vec<bool>;

fn partitions(labels: usize, depth: ProjectionDepth, max_full_labels: usize) -> Vec<Partition> {
    if labels < 2 {
        return Vec::new();
    }
    let singletons = || -> Vec<Partition> {
        let count = if labels == 2 { 1 } else { labels };
        (0..count)
            .map(|k| (0..labels).map(|l| l == k).collect())
            .collect()
    };
    match depth {
        ProjectionDepth::K => singletons(),
        ProjectionDepth::Full if labels <= max_full_labels && labels < 32 => {
            let masks = 1usize..(1 << (labels - 1));
            masks
                .map(|mask| (0..labels).map(|l| mask & (1 << l) != 0).collect())
                .collect()
        }
        ProjectionDepth::Full => singletons(),
    }
}

impl ProjectionGraph {
    fn new(
        snapshot: &CostSnapshot,
        depth: ProjectionDepth,
        max_full_projection_labels: usize,
        tolerance: f64,
    ) -> Self {
        let variable_partitions: Vec<_> = snapshot
            .cardinalities()
            .iter()
            .map(|c| partitions(*c, depth, max_full_projection_labels))
            .collect();
        let mut node_variable = Vec::new();
        let mut offsets = Vec::with_capacity(variable_partitions.len());
        for (var, p) in variable_partitions.iter().enumerate() {
            offsets.push(node_variable.len());
            node_variable.extend(std::iter::repeat(var).take(p.len()));
        }

        let edges: Vec<Vec<ProjectionEdge>> = snapshot
            .pairwise()
            .par_iter()
            .map(|pairwise| {
                let (v1, v2) = pairwise.variables;
                let d1 = snapshot.cardinalities()[v1];
                let mut edges = Vec::new();
                for (i, s1) in variable_partitions[v1].iter().enumerate() {
                    for (j, s2) in variable_partitions[v2].iter().enumerate() {
                        let projected = project(&pairwise.cost, d1, s1, s2);
                        let agree = projected[0][0].min(projected[1][1]);
                        let disagree = projected[0][1].min(projected[1][0]);
                        let strength = (agree - disagree).abs();
                        if strength.is_nan() || strength <= tolerance {
                            continue;
                        }
                        edges.push(ProjectionEdge {
                            nodes: (offsets[v1] + i, offsets[v2] + j),
                            strength,
                            parity: u8::from(disagree < agree),
                        });
                    }
                }
                edges
            })
            .collect();
        let mut edges: Vec<_> = edges.into_iter().flatten().collect();
        edges.sort_by(|a, b| b.strength.total_cmp(&a.strength));

        ProjectionGraph {
            node_variable,
            edges,
        }
    }

    /// Adds edges by decreasing strength to a spanning forest. An edge closing a cycle
    /// with an odd number of repulsive edges yields the cycle's variables
    fn frustrated_cycles(&self) -> Vec<Vec<usize>> {
        let nodes = self.node_variable.len();
        let mut components = ParityUnionFind::new(nodes);
        let mut forest = vec![Vec::new(); nodes];
        let mut cycles = Vec::new();
        let mut found: FxHashSet<Vec<usize>> = FxHashSet::default();
        for edge in &self.edges {
            let (u, v) = edge.nodes;
            match components.union(u, v, edge.parity) {
                Union::Joined => {
                    forest[u].push(v);
                    forest[v].push(u);
                }
                Union::Consistent => {}
                Union::Frustrated => {
                    let Some(path) = forest_path(&forest, u, v) else {
                        continue;
                    };
                    let cycle: Vec<usize> = path.iter().map(|n| self.node_variable[*n]).collect();
                    let distinct: FxHashSet<_> = cycle.iter().collect();
                    if cycle.len() < 3 || distinct.len() != cycle.len() {
                        continue;
                    }
                    if found.insert(cycle.clone()) {
                        cycles.push(cycle);
                    }
                }
            }
        }
        cycles
    }
}

/// Minima of a pairwise cost over the four combinations of projected label sets,
/// indexed as `[in s1][in s2]`
#[inline]
fn project(cost: &[f64], d1: usize, s1: &[bool], s2: &[bool]) -> [[f64; 2]; 2] {
    let mut projected = [[f64::INFINITY; 2]; 2];
    for (index, c) in cost.iter().enumerate() {
        let (a, b) = (index % d1, index / d1);
        let cell = &mut projected[usize::from(s1[a])][usize::from(s2[b])];
        *cell = cell.min(*c);
    }
    projected
}

fn forest_path(forest: &[Vec<usize>], from: usize, to: usize) -> Option<Vec<usize>> {
    let mut previous: FxHashMap<usize, usize> = FxHashMap::default();
    let mut queue = VecDeque::from([from]);
    previous.insert(from, from);
    while let Some(node) = queue.pop_front() {
        if node == to {
            let mut path = vec![to];
            let mut cur = to;
            while cur != from {
                cur = previous[&cur];
                path.push(cur);
            }
            path.reverse();
            return Some(path);
        }
        for next in &forest[node] {
            if !previous.contains_key(next) {
                previous.insert(*next, node);
                queue.push_back(*next);
            }
        }
    }
    None
}

// ------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Union {
    Joined,
    Consistent,
    Frustrated,
}

/// A union-find tracking the parity of each node relative to its root
#[derive(Debug)]
struct ParityUnionFind {
    parent: Vec<usize>,
    parity: Vec<u8>,
    rank: Vec<u8>,
}

impl ParityUnionFind {
    fn new(size: usize) -> Self {
        ParityUnionFind {
            parent: (0..size).collect(),
            parity: vec![0; size],
            rank: vec![0; size],
        }
    }

    fn find(&mut self, node: usize) -> (usize, u8) {
        let mut path = Vec::new();
        let mut root = node;
        while self.parent[root] != root {
            path.push(root);
            root = self.parent[root];
        }
        for n in path.into_iter().rev() {
            let p = self.parent[n];
            if p != root {
                self.parity[n] ^= self.parity[p];
            }
            self.parent[n] = root;
        }
        (root, if node == root { 0 } else { self.parity[node] })
    }

    fn union(&mut self, u: usize, v: usize, parity: u8) -> Union {
        let (ru, pu) = self.find(u);
        let (rv, pv) = self.find(v);
        let relative = pu ^ pv ^ parity;
        if ru == rv {
            return if relative == 1 {
                Union::Frustrated
            } else {
                Union::Consistent
            };
        }
        let (root, child) = if self.rank[ru] >= self.rank[rv] {
            (ru, rv)
        } else {
            (rv, ru)
        };
        self.parent[child] = root;
        self.parity[child] = relative;
        if self.rank[root] == self.rank[child] {
            self.rank[root] += 1;
        }
        Union::Joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partitions() {
        assert_eq!(partitions(2, ProjectionDepth::K, 6), vec![vec![true, false]]);
        assert_eq!(partitions(3, ProjectionDepth::K, 6).len(), 3);
        assert_eq!(partitions(3, ProjectionDepth::Full, 6).len(), 3);
        assert_eq!(partitions(4, ProjectionDepth::Full, 6).len(), 7);
        assert_eq!(partitions(4, ProjectionDepth::Full, 3).len(), 4);
        assert!(partitions(1, ProjectionDepth::Full, 6).is_empty());
    }

    #[test]
    fn test_parity_union_find() {
        let mut uf = ParityUnionFind::new(4);
        assert_eq!(uf.union(0, 1, 0), Union::Joined);
        assert_eq!(uf.union(1, 2, 1), Union::Joined);
        assert_eq!(uf.union(2, 3, 0), Union::Joined);
        assert_eq!(uf.union(0, 3, 1), Union::Consistent);
        assert_eq!(uf.union(0, 2, 0), Union::Frustrated);
    }

    #[test]
    fn test_triangulate() {
        assert_eq!(triangulate(&[3, 1, 2]), vec![(1, 2, 3)]);
        assert_eq!(triangulate(&[0, 1, 2, 3]), vec![(0, 1, 2), (0, 2, 3)]);
        assert_eq!(
            triangulate(&[4, 0, 2, 1, 3]),
            vec![(0, 2, 4), (1, 2, 4), (1, 3, 4)]
        );
    }
}
