mod common;

use common::*;
use rand::{prelude::*, rngs::StdRng};
use road_hierarchies::{
    algo::{
        contraction_hierarchy::{check_contraction_hierarchy_for_errors, query::ContractionHierarchyQuery, ContractionHierarchy, DEFAULT_MAX_POP_COUNT},
        customizable_contraction_hierarchy::*,
    },
    datastr::graph::*,
};

fn build(arcs: &ArcList, order: &[NodeId], filter_always_inf_arcs: bool) -> CustomizableContractionHierarchy {
    CustomizableContractionHierarchy::new(order, &arcs.tail, &arcs.head, None, filter_always_inf_arcs).unwrap()
}

fn check_all_pairs(arcs: &ArcList, weight: &[Weight], metric: &CustomizableContractionHierarchyMetric) {
    let expected = all_pairs_distances(&arcs.graph_with_weights(weight));
    let mut query = CustomizableContractionHierarchyQuery::new(metric);

    for source in 0..arcs.node_count as NodeId {
        for target in 0..arcs.node_count as NodeId {
            query.reset().add_source(source, 0).add_target(target, 0).run();
            let distance = query.get_distance();
            assert_eq!(distance, expected[source as usize][target as usize], "{} -> {}", source, target);

            if distance < INFINITY {
                assert_eq!(query.get_used_source(), source);
                assert_eq!(query.get_used_target(), target);
                assert_valid_path(arcs, weight, source, target, distance, &query.get_arc_path(), &query.get_node_path());
            } else {
                assert!(query.get_node_path().is_empty());
                assert_eq!(query.get_used_target(), INVALID_ID);
            }
        }
    }
}

#[test]
fn eight_node_graph() {
    let arcs = ArcList::eight_nodes();
    let order: Vec<NodeId> = (0..8).collect();
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    metric.customize();
    check_all_pairs(&arcs, &arcs.weight, &metric);

    let mut query = CustomizableContractionHierarchyQuery::new(&metric);
    query.add_source(0, 0).add_target(4, 0).run();
    assert_eq!(query.get_distance(), 2);
    assert_eq!(query.get_arc_path(), vec![0]);
}

#[test]
fn random_graphs_match_dijkstra() {
    let mut rng = StdRng::seed_from_u64(2024);
    for (node_count, arc_count) in [(20, 40), (40, 120), (60, 100)] {
        let arcs = ArcList::random(&mut rng, node_count, arc_count, 100);
        let order = random_order(&mut rng, node_count);

        for filter in [false, true] {
            let cch = build(&arcs, &order, filter);
            let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
            metric.customize();
            check_all_pairs(&arcs, &arcs.weight, &metric);
        }
    }
}

#[test]
fn same_distances_as_contraction_hierarchy() {
    let mut rng = StdRng::seed_from_u64(5);
    let arcs = ArcList::random(&mut rng, 50, 160, 60);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    metric.customize();
    let ch = ContractionHierarchy::build(arcs.node_count, &arcs.tail, &arcs.head, &arcs.weight, None, DEFAULT_MAX_POP_COUNT).unwrap();

    let mut cch_query = CustomizableContractionHierarchyQuery::new(&metric);
    let mut ch_query = ContractionHierarchyQuery::new(&ch);
    for source in 0..arcs.node_count as NodeId {
        for target in 0..arcs.node_count as NodeId {
            cch_query.reset().add_source(source, 0).add_target(target, 0).run();
            ch_query.reset().add_source(source, 0).add_target(target, 0).run();
            assert_eq!(cch_query.get_distance(), ch_query.get_distance());
        }
    }
}

#[test]
fn multiple_sources_and_targets() {
    let mut rng = StdRng::seed_from_u64(99);
    let arcs = ArcList::random(&mut rng, 40, 120, 50);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    metric.customize();
    let expected = all_pairs_distances(&arcs.graph());
    let mut query = CustomizableContractionHierarchyQuery::new(&metric);

    for _ in 0..50 {
        let sources: Vec<(NodeId, Weight)> = (0..3).map(|_| (rng.gen_range(0..40), rng.gen_range(0..20))).collect();
        let targets: Vec<(NodeId, Weight)> = (0..3).map(|_| (rng.gen_range(0..40), rng.gen_range(0..20))).collect();

        query.reset();
        let mut best = INFINITY;
        for &(source, source_offset) in &sources {
            query.add_source(source, source_offset);
            for &(target, target_offset) in &targets {
                let distance = expected[source as usize][target as usize];
                if distance < INFINITY {
                    best = std::cmp::min(best, source_offset + distance + target_offset);
                }
            }
        }
        for &(target, offset) in &targets {
            query.add_target(target, offset);
        }
        query.run();
        assert_eq!(query.get_distance(), best);

        if best < INFINITY {
            let used_source = query.get_used_source();
            let used_target = query.get_used_target();
            assert!(sources.iter().any(|&(source, _)| source == used_source));
            assert!(targets.iter().any(|&(target, _)| target == used_target));
            let node_path = query.get_node_path();
            assert_eq!(node_path.first(), Some(&used_source));
            assert_eq!(node_path.last(), Some(&used_target));
        }
    }
}

#[test]
fn pinned_queries_match_one_to_one() {
    let mut rng = StdRng::seed_from_u64(17);
    let arcs = ArcList::random(&mut rng, 50, 150, 50);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    metric.customize();
    let expected = all_pairs_distances(&arcs.graph());
    let pinned: Vec<NodeId> = random_order(&mut rng, arcs.node_count).into_iter().take(10).collect();

    let mut query = CustomizableContractionHierarchyQuery::new(&metric);
    query.pin_targets(&pinned);
    for source in 0..arcs.node_count as NodeId {
        query.reset_source().add_source(source, 0).run_to_pinned_targets();
        let distances = query.get_distances_to_targets();
        for (&target, &distance) in pinned.iter().zip(&distances) {
            assert_eq!(distance, expected[source as usize][target as usize]);
        }
    }

    query.reset().pin_sources(&pinned);
    let mut distances = vec![0; pinned.len()];
    for target in 0..arcs.node_count as NodeId {
        query.reset_target().add_target(target, 0).run_to_pinned_sources();
        query.get_distances_to_sources_into(&mut distances);
        for (&source, &distance) in pinned.iter().zip(&distances) {
            assert_eq!(distance, expected[source as usize][target as usize]);
        }
    }
}

#[test]
fn partial_customization_matches_full_customization() {
    let mut rng = StdRng::seed_from_u64(23);
    let arcs = ArcList::random(&mut rng, 40, 130, 50);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    metric.customize();
    let mut partial = CustomizableContractionHierarchyPartialCustomization::new(&cch);

    for _ in 0..10 {
        let mut changed: Vec<EdgeId> = (0..5).map(|_| rng.gen_range(0..arcs.tail.len() as EdgeId)).collect();
        for &arc in &changed {
            let weight = rng.gen_range(1..150);
            metric.set_input_weight(arc, weight);
        }
        changed.shuffle(&mut rng);
        for &arc in &changed {
            partial.update_arc(arc);
        }
        partial.customize(&mut metric);

        let mut full = CustomizableContractionHierarchyMetric::new(&cch, metric.input_weight());
        full.customize();
        assert_eq!(metric.forward(), full.forward());
        assert_eq!(metric.backward(), full.backward());
    }

    let weight = metric.input_weight().to_vec();
    check_all_pairs(&arcs, &weight, &metric);
}

#[test]
fn parallel_customization_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(31);
    let arcs = ArcList::random(&mut rng, 80, 300, 100);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut sequential = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    sequential.customize();

    let parallelization = CustomizableContractionHierarchyParallelization::new(&cch);
    assert!(parallelization.level_count() > 0);
    for threads in [1, 2, 4] {
        let mut parallel = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
        parallelization.customize_with_threads(&mut parallel, threads).unwrap();
        assert_eq!(parallel.forward(), sequential.forward());
        assert_eq!(parallel.backward(), sequential.backward());
    }
}

#[test]
fn perfect_witness_hierarchy_answers_the_same() {
    let mut rng = StdRng::seed_from_u64(8);
    let arcs = ArcList::random(&mut rng, 40, 120, 40);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    let ch = metric.build_contraction_hierarchy_using_perfect_witness_search();
    assert!(check_contraction_hierarchy_for_errors(&ch).is_ok());
    assert_eq!(ch.order, order);

    let expected = all_pairs_distances(&arcs.graph());
    let mut cch_query = CustomizableContractionHierarchyQuery::new(&metric);
    let mut ch_query = ContractionHierarchyQuery::new(&ch);
    for source in 0..arcs.node_count as NodeId {
        for target in 0..arcs.node_count as NodeId {
            cch_query.reset().add_source(source, 0).add_target(target, 0).run();
            ch_query.reset().add_source(source, 0).add_target(target, 0).run();
            let distance = ch_query.get_distance();
            assert_eq!(distance, expected[source as usize][target as usize]);
            assert_eq!(cch_query.get_distance(), distance);
            if distance < INFINITY {
                assert_valid_path(&arcs, &arcs.weight, source, target, distance, &ch_query.get_arc_path(), &ch_query.get_node_path());
            }
        }
    }
}

#[test]
fn reweighting_keeps_the_topology() {
    let mut rng = StdRng::seed_from_u64(64);
    let arcs = ArcList::random(&mut rng, 30, 90, 30);
    let order = random_order(&mut rng, arcs.node_count);
    let cch = build(&arcs, &order, false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &arcs.weight);
    metric.customize();
    check_all_pairs(&arcs, &arcs.weight, &metric);

    let other_weight: Vec<Weight> = (0..arcs.tail.len()).map(|_| rng.gen_range(1..1000)).collect();
    metric.reset(&other_weight).customize();
    check_all_pairs(&arcs, &other_weight, &metric);
}

#[test]
fn degenerate_inputs() {
    let cch = CustomizableContractionHierarchy::new(&[], &[], &[], None, false).unwrap();
    assert_eq!(cch.node_count(), 0);
    assert_eq!(cch.cch_arc_count(), 0);

    // only loops, every node is its own elimination tree root
    let cch = CustomizableContractionHierarchy::new(&[2, 0, 1], &[0, 1], &[0, 1], None, true).unwrap();
    assert_eq!(cch.cch_arc_count(), 0);
    assert!(cch.elimination_tree_parent().iter().all(|&parent| parent == INVALID_ID));
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &[3, 4]);
    metric.customize();
    let mut query = CustomizableContractionHierarchyQuery::new(&metric);
    query.add_source(0, 0).add_target(1, 0).run();
    assert_eq!(query.get_distance(), INFINITY);
    query.reset().add_source(1, 0).add_target(1, 0).run();
    assert_eq!(query.get_distance(), 0);

    // infinite input weights never produce a path
    let arcs = ArcList::eight_nodes();
    let cch = build(&arcs, &(0..8).collect::<Vec<_>>(), false);
    let mut metric = CustomizableContractionHierarchyMetric::new(&cch, &vec![INFINITY; arcs.tail.len()]);
    metric.customize();
    let mut query = CustomizableContractionHierarchyQuery::new(&metric);
    query.add_source(0, 0).add_target(4, 0).run();
    assert_eq!(query.get_distance(), INFINITY);
}
