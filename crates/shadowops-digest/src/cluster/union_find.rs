//! Array-backed disjoint-set forest over ticket indices.

/// Union-find with path compression and union by rank.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// `n` singleton sets, one per index.
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of the set containing `x`.
    pub fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        // Compress
        let mut node = x;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Merge the sets of `a` and `b`. Returns false if already joined.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return false;
        }

        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] = self.rank[ra].saturating_add(1);
            }
        }
        true
    }

    /// All sets, members ascending, sets ordered by smallest member.
    pub fn groups(&mut self) -> Vec<Vec<usize>> {
        let n = self.parent.len();
        let mut slot_of_root = vec![usize::MAX; n];
        let mut groups: Vec<Vec<usize>> = Vec::new();

        for i in 0..n {
            let root = self.find(i);
            if slot_of_root[root] == usize::MAX {
                slot_of_root[root] = groups.len();
                groups.push(Vec::new());
            }
            groups[slot_of_root[root]].push(i);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_singletons() {
        let mut uf = UnionFind::new(3);
        assert_eq!(uf.groups(), vec![vec![0], vec![1], vec![2]]);
    }

    #[test]
    fn test_transitive_merge() {
        let mut uf = UnionFind::new(5);
        assert!(uf.union(0, 3));
        assert!(uf.union(3, 4));
        assert!(!uf.union(0, 4));
        assert_eq!(uf.find(4), uf.find(0));
        assert_eq!(uf.groups(), vec![vec![0, 3, 4], vec![1], vec![2]]);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let mut a = UnionFind::new(6);
        a.union(5, 1);
        a.union(2, 5);
        let mut b = UnionFind::new(6);
        b.union(1, 2);
        b.union(2, 5);
        assert_eq!(a.groups(), b.groups());
    }
}
