use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use capsample_core::{
    NodeId, OwnerTrees, Report, ReportConfig, ReportError, SampleTree, estimate, format_byte_magnitude,
};

/// Reproducible tree with a mix of depths and weights.
fn generated_tree(seed: u64, inserts: usize) -> SampleTree {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut tree = SampleTree::new();
    for _ in 0..inserts {
        let depth = rng.gen_range(1..=4);
        let path: Vec<String> = (0..depth)
            .map(|_| format!("d{}", rng.gen_range(0..3)))
            .collect();
        let weight = rng.gen_range(1..=7);
        tree.insert(&path.join("/"), weight);
    }
    tree
}

/// Sum of direct samples over the subtree at `id`.
fn direct_samples(tree: &SampleTree, id: NodeId) -> u64 {
    tree[id].samples()
        + tree[id]
            .children()
            .map(|(_, child)| direct_samples(tree, child))
            .sum::<u64>()
}

fn min_leaf_weight(tree: &SampleTree) -> Option<u64> {
    tree.leaves().map(|id| tree[id].samples()).min()
}

#[test]
fn test_insert_scenario() {
    let mut tree = SampleTree::new();
    tree.insert("a/b", 3);
    tree.insert("a/c", 2);
    tree.insert("d", 1);

    assert_eq!(tree.total_samples(), 6);

    let a = tree.find("a").unwrap();
    assert_eq!(tree[a].sum_samples(), 5);
    assert_eq!(tree[a].samples(), 0);

    let children: Vec<_> = tree[a]
        .children()
        .map(|(name, id)| (name.to_string(), tree[id].samples()))
        .collect();
    assert_eq!(children, vec![("b".to_string(), 3), ("c".to_string(), 2)]);

    let d = tree.find("d").unwrap();
    assert_eq!(tree[d].samples(), 1);
    assert!(tree.is_consistent());
}

#[test]
fn test_prune_collapses_to_root() {
    let mut tree = SampleTree::new();
    tree.insert("a/b", 3);
    tree.insert("a/c", 2);
    tree.insert("d", 1);

    tree.prune_until(1, 0);

    let root = &tree[tree.root()];
    assert_eq!(root.child_count(), 0);
    assert_eq!(root.samples(), 6);
    assert_eq!(root.sum_samples(), 6);
    assert_eq!(tree.len(), 1);
}

#[test]
fn test_prune_until_prunes_until_empty() {
    let mut tree = SampleTree::new();
    tree.insert("file", 5);
    tree.prune_until(10, 5);

    assert_eq!(tree[tree.root()].child_count(), 0);
    assert_eq!(tree[tree.root()].samples(), 5);
}

#[test]
fn test_prune_stops_when_heavy_enough_and_few_enough() {
    let mut tree = SampleTree::new();
    tree.insert("file", 5);
    assert_eq!(tree.prune_until(2, 4), 0);

    assert!(tree.child(tree.root(), "file").is_some());
}

#[test]
fn test_prune_removes_nodes_until_hitting_max_leaves() {
    let mut tree = SampleTree::new();
    for name in ["file1", "file2", "file3"] {
        tree.insert(name, 5);
    }
    tree.prune_until(2, 4);

    assert_eq!(tree[tree.root()].child_count(), 2);
    assert_eq!(tree.total_samples(), 15);
}

#[test]
fn test_prune_removes_nodes_until_hitting_min_samples() {
    let mut tree = SampleTree::new();
    for (name, samples) in [("file1", 3), ("file2", 4), ("file3", 5)] {
        tree.insert(name, samples);
    }
    tree.prune_until(2, 4);

    let root = tree.root();
    assert_eq!(tree[root].child_count(), 1);
    assert!(tree.child(root, "file1").is_none());
    assert!(tree.child(root, "file2").is_none());
    assert!(tree.child(root, "file3").is_some());
    assert_eq!(tree[root].samples(), 7);
}

#[test]
fn test_prune_merged_parent_competes_as_leaf() {
    let mut tree = SampleTree::new();
    tree.insert("big", 50);
    tree.insert("dir/x", 1);
    tree.insert("dir/y", 1);

    tree.prune_until(10, 5);

    // x and y fold into dir, which then folds into the root.
    let root = tree.root();
    assert!(tree.child(root, "dir").is_none());
    assert_eq!(tree[root].samples(), 2);
    assert!(tree.child(root, "big").is_some());
    assert!(tree.is_consistent());
}

#[test]
fn test_prune_with_permissive_limits_does_nothing() {
    let mut tree = generated_tree(7, 200);
    let before = tree.len();
    assert_eq!(tree.prune_until(usize::MAX, 0), 0);
    assert_eq!(tree.len(), before);
}

#[test]
fn test_invariant_holds_through_inserts_and_prunes() {
    for seed in 0..20 {
        let mut tree = generated_tree(seed, 150);
        assert!(tree.is_consistent(), "seed {seed} after insert");

        for (max_leaves, min_samples) in [(40, 1), (10, 3), (3, 10), (1, 0)] {
            tree.prune_until(max_leaves, min_samples);
            assert!(tree.is_consistent(), "seed {seed} after prune");
        }
    }
}

#[test]
fn test_prune_conserves_total_weight() {
    for seed in 0..20 {
        let mut tree = generated_tree(seed, 120);
        let total = tree.total_samples();
        tree.prune_until(5, 4);
        assert_eq!(tree.total_samples(), total, "seed {seed}");

        assert_eq!(direct_samples(&tree, tree.root()), total, "seed {seed}");
    }
}

#[test]
fn test_prune_is_idempotent() {
    for seed in 0..20 {
        let mut tree = generated_tree(seed, 120);
        tree.prune_until(8, 3);
        assert_eq!(tree.prune_until(8, 3), 0, "seed {seed}");
    }
}

#[test]
fn test_prune_meets_a_bound() {
    for seed in 0..20 {
        for (max_leaves, min_samples) in [(1, 0), (4, 2), (12, 6), (30, 5)] {
            let mut tree = generated_tree(seed, 150);
            tree.prune_until(max_leaves, min_samples);

            let only_root = tree.len() == 1;
            let few_enough = tree.leaf_count() <= max_leaves;
            let heavy_enough = min_leaf_weight(&tree).is_some_and(|w| w > min_samples);
            assert!(
                only_root || few_enough || heavy_enough,
                "seed {seed}, max_leaves {max_leaves}, min_samples {min_samples}"
            );
        }
    }
}

#[test]
fn test_estimate_scenario() {
    let estimate = estimate(50, 2000, 1_000_000_000_000).unwrap();
    assert!((estimate.mean - 0.025).abs() < 1e-12);
    assert!((estimate.capacity() - 25_000_000_000.0).abs() < 1e-3);
    assert_eq!(format_byte_magnitude(estimate.capacity()), "23.28G");
}

#[test]
fn test_format_byte_magnitude_scenarios() {
    assert_eq!(format_byte_magnitude(1536.0), "1.50K");
    assert_eq!(format_byte_magnitude(0.0), "0");
}

#[test]
fn test_zero_total_samples_rejected() {
    assert_eq!(estimate(0, 0, 100).unwrap_err(), ReportError::NoSamples);

    let trees = OwnerTrees::new();
    assert!(Report::build(trees, &ReportConfig::default(), 0, 100).is_err());
}

#[test]
fn test_report_orders_owners_and_prunes() {
    let mut trees = OwnerTrees::new();
    for i in 0..3 {
        trees.insert("small", &format!("tmp/f{i}"), 1);
    }
    for i in 0..40 {
        trees.insert("large", &format!("data/set{}/f{i}", i % 4), 1);
    }

    let config = ReportConfig::builder()
        .max_leaves(3usize)
        .min_samples(2u64)
        .build()
        .unwrap();
    let report = Report::build(trees, &config, 43, 43 * 1024).unwrap();

    let owners: Vec<_> = report.owners.iter().map(|o| o.owner.as_str()).collect();
    assert_eq!(owners, vec!["large", "small"]);
    assert_eq!(report.owners[0].samples, 40);
    assert_eq!(report.owners[1].samples, 3);

    for owner in &report.owners {
        assert!(owner.tree.sum_samples == owner.samples);
    }

    let text = report.to_string();
    assert!(text.starts_with("Total: 43.00K\n"), "{text}");
    assert!(text.contains("Owner large (~93.0%/40.00K)"), "{text}");
    assert!(text.contains("Owner small (~7.0%/3.00K)"), "{text}");
}

#[test]
fn test_report_serializes_tree() {
    let mut trees = OwnerTrees::new();
    trees.insert("alice", "a/b", 1);
    let report = Report::build(trees, &ReportConfig::default(), 1, 1024).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total_samples"], 1);
    assert_eq!(json["owners"][0]["owner"], "alice");
    assert_eq!(json["owners"][0]["tree"]["sum_samples"], 1);
    assert!(json["owners"][0].get("listing").is_none());
}
