//! Permutation and adjacency array helpers shared by the hierarchies.

use crate::datastr::graph::*;

/// Is `p` a permutation of `0..p.len()`?
pub fn is_permutation(p: &[u32]) -> bool {
    let mut seen = vec![false; p.len()];
    for &x in p {
        match seen.get_mut(x as usize) {
            Some(seen) if !*seen => *seen = true,
            _ => return false,
        }
    }
    true
}

/// Compute `q` with `q[p[i]] = i`.
pub fn invert_permutation(p: &[u32]) -> Vec<u32> {
    debug_assert!(is_permutation(p));
    let mut inverted = vec![0; p.len()];
    for (i, &x) in p.iter().enumerate() {
        inverted[x as usize] = i as u32;
    }
    inverted
}

/// Reorder `v` so that the result at position `i` is `v[p[i]]`.
pub fn apply_permutation<T: Copy>(p: &[u32], v: &[T]) -> Vec<T> {
    debug_assert_eq!(p.len(), v.len());
    p.iter().map(|&i| v[i as usize]).collect()
}

/// A stable permutation which sorts the indices `0..len` by `key`.
pub fn compute_sort_permutation<K: Ord>(len: usize, key: impl Fn(usize) -> K) -> Vec<u32> {
    let mut p: Vec<u32> = (0..len as u32).collect();
    p.sort_by_key(|&i| key(i as usize));
    p
}

/// Turn a sorted tail vector into a `first_out` array with `node_count + 1` entries.
pub fn inverse_vector(sorted_tail: &[NodeId], node_count: usize) -> Vec<EdgeId> {
    debug_assert!(sorted_tail.windows(2).all(|w| w[0] <= w[1]));
    let mut first_out = vec![0; node_count + 1];
    for &tail in sorted_tail {
        first_out[tail as usize + 1] += 1;
    }
    for node in 0..node_count {
        first_out[node + 1] += first_out[node];
    }
    first_out
}

/// Turn a `first_out` array back into the sorted tail vector.
pub fn invert_inverse_vector(first_out: &[EdgeId]) -> Vec<NodeId> {
    let mut tail = Vec::with_capacity(first_out.last().copied().unwrap_or(0) as usize);
    for (node, range) in first_out.windows(2).enumerate() {
        tail.extend(std::iter::repeat(node as NodeId).take((range[1] - range[0]) as usize));
    }
    tail
}

/// Find the arc `x -> y` in an adjacency array where the heads of each node are sorted.
/// Returns `INVALID_ID` if there is no such arc.
pub fn find_arc_given_sorted_head(first_out: &[EdgeId], head: &[NodeId], x: NodeId, y: NodeId) -> EdgeId {
    let range = first_out[x as usize] as usize..first_out[x as usize + 1] as usize;
    match head[range.clone()].binary_search(&y) {
        Ok(pos) => (range.start + pos) as EdgeId,
        Err(_) => INVALID_ID,
    }
}

/// Keep the elements of `v` at the positions where `keep` is true.
pub fn keep_if(keep: impl Fn(usize) -> bool, v: &[u32]) -> Vec<u32> {
    v.iter().enumerate().filter(|&(i, _)| keep(i)).map(|(_, &x)| x).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutations() {
        assert!(is_permutation(&[2, 0, 1]));
        assert!(!is_permutation(&[2, 0, 2]));
        assert!(!is_permutation(&[3, 0, 1]));
        assert!(is_permutation(&[]));
        assert_eq!(invert_permutation(&[2, 0, 1]), vec![1, 2, 0]);
        assert_eq!(apply_permutation(&[2, 0, 1], &['a', 'b', 'c']), vec!['c', 'a', 'b']);
    }

    #[test]
    fn stable_sort_permutation() {
        let keys = [3, 1, 3, 0];
        assert_eq!(compute_sort_permutation(keys.len(), |i| keys[i]), vec![3, 1, 0, 2]);
    }

    #[test]
    fn inverse_vectors() {
        let tail = [0, 0, 2, 2, 2, 4];
        let first_out = inverse_vector(&tail, 5);
        assert_eq!(first_out, vec![0, 2, 2, 5, 5, 6]);
        assert_eq!(invert_inverse_vector(&first_out), tail.to_vec());
        assert_eq!(inverse_vector(&[], 2), vec![0, 0, 0]);
    }

    #[test]
    fn arc_lookup() {
        let first_out = [0, 2, 2, 3];
        let head = [1, 2, 0];
        assert_eq!(find_arc_given_sorted_head(&first_out, &head, 0, 2), 1);
        assert_eq!(find_arc_given_sorted_head(&first_out, &head, 2, 0), 2);
        assert_eq!(find_arc_given_sorted_head(&first_out, &head, 1, 0), INVALID_ID);
    }
}
