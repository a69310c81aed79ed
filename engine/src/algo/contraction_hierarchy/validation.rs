use super::{ContractionHierarchy, Side};
use crate::{
    datastr::graph::*,
    util::{invert_permutation, is_permutation},
    Error, Result,
};

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<()> {
    if condition {
        Ok(())
    } else {
        Err(Error::Corrupt(reason()))
    }
}

fn check_side_dimensions(name: &str, side: &Side, node_count: usize) -> Result<()> {
    ensure(side.first_out.len() == node_count + 1, || format!("{}.first_out has {} entries instead of {}", name, side.first_out.len(), node_count + 1))?;
    ensure(side.first_out[0] == 0, || format!("{}.first_out does not start with 0", name))?;
    ensure(side.first_out.windows(2).all(|w| w[0] <= w[1]), || format!("{}.first_out is not sorted", name))?;

    let arc_count = side.first_out[node_count] as usize;
    for (what, len) in [
        ("head", side.head.len()),
        ("weight", side.weight.len()),
        ("shortcut_first_arc", side.shortcut_first_arc.len()),
        ("shortcut_second_arc", side.shortcut_second_arc.len()),
        ("is_shortcut_an_original_arc", side.is_shortcut_an_original_arc.len()),
    ] {
        ensure(len == arc_count, || format!("{}.{} has {} entries instead of {}", name, what, len, arc_count))?;
    }
    ensure(side.head.iter().all(|&head| (head as usize) < node_count), || format!("{}.head contains a node out of range", name))?;

    for node in 0..node_count as NodeId {
        for arc in side.arc_range(node) {
            let head = side.head[arc];
            ensure(head > node, || format!("{} graph contains downward arc {} -> {}", name, node, head))?;
        }
    }

    Ok(())
}

/// Check all structural invariants of a hierarchy.
///
/// Besides well formed adjacency arrays this ensures that every arc goes up,
/// that every shortcut is made of arcs with smaller ids on the side it extends so unpacking terminates,
/// and that shortcut weights are the sums of their parts.
pub fn check_contraction_hierarchy_for_errors(ch: &ContractionHierarchy) -> Result<()> {
    let node_count = ch.rank.len();

    ensure(ch.order.len() == node_count && is_permutation(&ch.order), || "order is not a permutation".to_string())?;
    ensure(ch.rank == invert_permutation(&ch.order), || "rank is not the inverse of order".to_string())?;

    check_side_dimensions("forward", &ch.forward, node_count)?;
    check_side_dimensions("backward", &ch.backward, node_count)?;

    let forward_arc_count = ch.forward.num_arcs();
    let backward_arc_count = ch.backward.num_arcs();

    for arc in 0..forward_arc_count {
        let (first, second) = (ch.forward.shortcut_first_arc[arc], ch.forward.shortcut_second_arc[arc]);
        if ch.forward.is_shortcut_an_original_arc.get(arc) {
            ensure(first != INVALID_ID, || format!("forward arc {} is original but has no input arc id", arc))?;
            ensure((second as usize) < node_count, || format!("forward arc {} is original but has no valid head", arc))?;
        } else {
            ensure((first as usize) < backward_arc_count, || format!("forward shortcut {} has first arc {} out of range", arc, first))?;
            ensure((second as usize) < forward_arc_count, || format!("forward shortcut {} has second arc {} out of range", arc, second))?;
            ensure((second as usize) < arc, || format!("forward shortcut {} has second arc {} which is not smaller", arc, second))?;
            ensure(
                ch.forward.weight[arc] == ch.backward.weight[first as usize].saturating_add(ch.forward.weight[second as usize]),
                || format!("forward shortcut {} does not weigh as much as its parts", arc),
            )?;
        }
    }

    for arc in 0..backward_arc_count {
        let (first, second) = (ch.backward.shortcut_first_arc[arc], ch.backward.shortcut_second_arc[arc]);
        if ch.backward.is_shortcut_an_original_arc.get(arc) {
            ensure(first != INVALID_ID, || format!("backward arc {} is original but has no input arc id", arc))?;
            ensure((second as usize) < node_count, || format!("backward arc {} is original but has no valid head", arc))?;
        } else {
            ensure((first as usize) < backward_arc_count, || format!("backward shortcut {} has first arc {} out of range", arc, first))?;
            ensure((second as usize) < forward_arc_count, || format!("backward shortcut {} has second arc {} out of range", arc, second))?;
            ensure((first as usize) < arc, || format!("backward shortcut {} has first arc {} which is not smaller", arc, first))?;
            ensure(
                ch.backward.weight[arc] == ch.backward.weight[first as usize].saturating_add(ch.forward.weight[second as usize]),
                || format!("backward shortcut {} does not weigh as much as its parts", arc),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::DEFAULT_MAX_POP_COUNT;
    use super::*;

    fn path_ch() -> ContractionHierarchy {
        ContractionHierarchy::build_given_order(&[1, 0, 2], &[0, 1], &[1, 2], &[3, 4], None, DEFAULT_MAX_POP_COUNT).unwrap()
    }

    #[test]
    fn accepts_built_hierarchy() {
        assert!(check_contraction_hierarchy_for_errors(&path_ch()).is_ok());
    }

    #[test]
    fn rejects_wrong_shortcut_weight() {
        let mut ch = path_ch();
        ch.forward.weight[1] += 1;
        assert!(matches!(check_contraction_hierarchy_for_errors(&ch), Err(Error::Corrupt(_))));
    }

    #[test]
    fn rejects_cyclic_unpacking() {
        let mut ch = path_ch();
        ch.forward.shortcut_second_arc[1] = 1;
        assert!(check_contraction_hierarchy_for_errors(&ch).is_err());
    }

    #[test]
    fn rejects_downward_arc() {
        let mut ch = path_ch();
        ch.backward.head[0] = 0;
        assert!(check_contraction_hierarchy_for_errors(&ch).is_err());
    }

    #[test]
    fn rejects_inconsistent_rank() {
        let mut ch = path_ch();
        ch.rank.swap(0, 1);
        assert!(check_contraction_hierarchy_for_errors(&ch).is_err());
    }
}
