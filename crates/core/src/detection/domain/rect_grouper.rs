use crate::shared::region::Region;

/// Relative tolerance for treating two raw hits as the same object.
pub const DEFAULT_GROUP_EPS: f64 = 0.2;

/// Collapses the dense cloud of raw sliding-window hits into detections.
///
/// Hits are clustered by [`Region::is_similar`] (transitively), each cluster
/// is averaged, and clusters backed by `min_neighbors` hits or fewer are
/// discarded. A surviving rectangle that sits inside a better-supported one
/// is dropped as well.
pub struct RectGrouper {
    eps: f64,
}

impl RectGrouper {
    pub fn new(eps: f64) -> Self {
        Self { eps }
    }

    pub fn group(&self, hits: &[Region], min_neighbors: u32) -> Vec<Region> {
        if min_neighbors == 0 || hits.is_empty() {
            return hits.to_vec();
        }

        let labels = self.partition(hits);
        let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);

        let mut sums = vec![[0i64; 4]; n_classes];
        let mut weights = vec![0u32; n_classes];
        for (r, &cls) in hits.iter().zip(&labels) {
            let s = &mut sums[cls];
            s[0] += r.x as i64;
            s[1] += r.y as i64;
            s[2] += r.width as i64;
            s[3] += r.height as i64;
            weights[cls] += 1;
        }

        let averaged: Vec<Region> = sums
            .iter()
            .zip(&weights)
            .map(|(s, &w)| {
                let avg = |v: i64| (v as f64 / w as f64).round() as i32;
                Region::new(avg(s[0]), avg(s[1]), avg(s[2]), avg(s[3]))
            })
            .collect();

        let threshold = min_neighbors;
        (0..n_classes)
            .filter(|&i| weights[i] > threshold)
            .filter(|&i| {
                let (r1, n1) = (&averaged[i], weights[i]);
                !(0..n_classes).any(|j| {
                    let n2 = weights[j];
                    j != i
                        && n2 > threshold
                        && r1.is_inside(&averaged[j], self.eps)
                        && (n2 > n1.max(3) || n1 < 3)
                })
            })
            .map(|i| averaged[i])
            .collect()
    }

    /// Union-find clustering; labels are dense and ordered by first appearance.
    fn partition(&self, hits: &[Region]) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..hits.len()).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        for i in 0..hits.len() {
            for j in (i + 1)..hits.len() {
                if hits[i].is_similar(&hits[j], self.eps) {
                    let ri = find(&mut parent, i);
                    let rj = find(&mut parent, j);
                    if ri != rj {
                        parent[rj.max(ri)] = ri.min(rj);
                    }
                }
            }
        }

        let mut label_of_root = vec![usize::MAX; hits.len()];
        let mut next_label = 0;
        (0..hits.len())
            .map(|i| {
                let root = find(&mut parent, i);
                if label_of_root[root] == usize::MAX {
                    label_of_root[root] = next_label;
                    next_label += 1;
                }
                label_of_root[root]
            })
            .collect()
    }
}

impl Default for RectGrouper {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_EPS)
    }
}
