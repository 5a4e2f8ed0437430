use astrodet_geom::Box2i;
use astrodet_image::Mask;

use crate::footprint::Footprint;
use crate::span::Span;

/// Disjoint-set forest over run indices, path compression plus union by size.
struct UnionFind {
    parent: Vec<u32>,
    size: Vec<u32>,
}

impl UnionFind {
    fn new(count: usize) -> Self {
        Self {
            parent: (0..count as u32).collect(),
            size: vec![1; count],
        }
    }

    fn find(&mut self, mut i: u32) -> u32 {
        while self.parent[i as usize] != i {
            let grandparent = self.parent[self.parent[i as usize] as usize];
            self.parent[i as usize] = grandparent;
            i = grandparent;
        }
        i
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        let (big, small) = if self.size[ra as usize] >= self.size[rb as usize] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        self.parent[small as usize] = big;
        self.size[big as usize] += self.size[small as usize];
    }
}

/// Extracts one footprint per 4-connected component of mask pixels that have
/// any of `bitmask`'s bits set.
///
/// Runs are found row by row in the mask's parent frame and joined when they
/// share a column with a run on the previous row. Each returned footprint is
/// normalized, has `region` as its parent region, and carries no peaks.
pub fn footprints_from_mask(mask: &Mask, bitmask: u16, region: &Box2i) -> Vec<Footprint> {
    let x0 = mask.x0();
    let y0 = mask.y0();

    // per-row run extraction
    let mut runs: Vec<Span> = Vec::new();
    let mut row_bounds: Vec<(usize, usize)> = Vec::with_capacity(mask.height());
    for y in 0..mask.height() {
        let begin = runs.len();
        let row = mask.row(y);
        let mut start = None;
        for (x, &px) in row.iter().enumerate() {
            if px & bitmask != 0 {
                if start.is_none() {
                    start = Some(x);
                }
            } else if let Some(sx) = start.take() {
                runs.push(Span::new(y0 + y as i32, x0 + sx as i32, x0 + x as i32 - 1));
            }
        }
        if let Some(sx) = start {
            runs.push(Span::new(
                y0 + y as i32,
                x0 + sx as i32,
                x0 + row.len() as i32 - 1,
            ));
        }
        row_bounds.push((begin, runs.len()));
    }
    if runs.is_empty() {
        return Vec::new();
    }

    // join runs sharing a column with a run on the row above
    let mut forest = UnionFind::new(runs.len());
    for y in 1..row_bounds.len() {
        let (cur_begin, cur_end) = row_bounds[y];
        let (prev_begin, prev_end) = row_bounds[y - 1];
        let mut p = prev_begin;
        for c in cur_begin..cur_end {
            while p < prev_end && runs[p].x1 < runs[c].x0 {
                p += 1;
            }
            let mut q = p;
            while q < prev_end && runs[q].x0 <= runs[c].x1 {
                forest.union(c as u32, q as u32);
                q += 1;
            }
        }
    }

    // group runs by component root, keeping first-seen order
    let mut component_of_root: std::collections::HashMap<u32, usize> =
        std::collections::HashMap::new();
    let mut components: Vec<Vec<Span>> = Vec::new();
    for i in 0..runs.len() {
        let root = forest.find(i as u32);
        let slot = *component_of_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(runs[i]);
    }

    components
        .into_iter()
        .map(|spans| {
            let mut foot = Footprint::from_spans(&spans, *region);
            foot.normalize();
            foot
        })
        .collect()
}
