//! Decomposition topology invariants across whole clusters.

use pargrid::error::PargridError;
use pargrid::index::{Interval, NDIndex};
use pargrid::layout::{FieldLayout, NeighborEntry};

fn cube(n: i64) -> NDIndex<3> {
    NDIndex::new([Interval::new(0, n); 3])
}

fn all_entries(layout: &FieldLayout) -> Vec<NeighborEntry> {
    layout
        .face_neighbors()
        .entries()
        .iter()
        .chain(layout.edge_neighbors().entries())
        .chain(layout.vertex_neighbors().iter().flatten())
        .copied()
        .collect()
}

#[test]
fn partition_is_disjoint_and_covers() {
    for size in [1usize, 2, 3, 5, 6, 8, 12, 27] {
        let layout = FieldLayout::with_rank(0, size, cube(12), 1).unwrap();
        let covered: usize = layout.local_domains().iter().map(NDIndex::size).sum();
        assert_eq!(covered, 12 * 12 * 12, "size {size}");
        for (i, a) in layout.local_domains().iter().enumerate() {
            assert!(!a.is_empty(), "rank {i} of {size} owns nothing");
            for b in layout.local_domains().iter().skip(i + 1) {
                assert!(a.intersect(b).is_empty(), "overlap at size {size}");
            }
        }
    }
}

#[test]
fn neighbor_entries_match_pairwise() {
    // Invariant P1 over whole clusters: for every entry (A -> B) there is
    // exactly one dual entry (B -> A) whose send extents equal A's recv
    // extents and vice versa, so byte counts agree on both ends.
    for size in [2usize, 4, 6, 8, 12, 27] {
        let layouts: Vec<_> = (0..size)
            .map(|r| FieldLayout::with_rank(r, size, cube(12), 1).unwrap())
            .collect();

        for (a, la) in layouts.iter().enumerate() {
            for e in all_entries(la) {
                let duals: Vec<_> = all_entries(&layouts[e.rank])
                    .into_iter()
                    .filter(|d| d.rank == a)
                    .collect();
                assert_eq!(duals.len(), 1, "ranks {a}<->{} at size {size}", e.rank);
                let d = duals[0];
                assert_eq!(d.send.extents(), e.recv.extents());
                assert_eq!(d.recv.extents(), e.send.extents());
                assert_eq!(d.send.size(), e.recv.size());
            }
        }
    }
}

#[test]
fn two_by_two_topology_matches_expectations() {
    // 2x2x1 decomposition of [0,8)^3: rank 0 sees rank 1 across +x, rank 2
    // across +y, rank 3 across the +x+y edge, and every corner is a
    // physical boundary.
    let layout = FieldLayout::with_rank(0, 4, cube(8), 1).unwrap();

    let faces = layout.face_neighbors();
    let face_ranks: Vec<Vec<usize>> = (0..6)
        .map(|s| faces.slot(s).iter().map(|e| e.rank).collect())
        .collect();
    assert_eq!(face_ranks[0], Vec::<usize>::new()); // -x boundary
    assert_eq!(face_ranks[1], vec![1]); // +x
    assert_eq!(face_ranks[2], Vec::<usize>::new()); // -y boundary
    assert_eq!(face_ranks[3], vec![2]); // +y
    assert_eq!(face_ranks[4], Vec::<usize>::new()); // -z boundary
    assert_eq!(face_ranks[5], Vec::<usize>::new()); // +z boundary

    let edge_ranks: Vec<usize> = layout
        .edge_neighbors()
        .entries()
        .iter()
        .map(|e| e.rank)
        .collect();
    assert_eq!(edge_ranks, vec![3]);

    assert!(
        layout.vertex_neighbors().iter().all(Option::is_none),
        "all corners are physical boundaries"
    );
}

#[test]
fn flat_axis_tiling_splits_the_orthogonal_axes() {
    // A domain that is thin in x forces the 4-rank grid onto y and z
    // (1x2x2). Rank 0 then has +y and +z face partners and a +y+z edge
    // partner; x stays undecomposed.
    let global = NDIndex::new([
        Interval::new(0, 2),
        Interval::new(0, 8),
        Interval::new(0, 8),
    ]);
    let layout = FieldLayout::with_rank(0, 4, global, 1).unwrap();
    assert!(layout.face_neighbors().slot(0).is_empty());
    assert!(layout.face_neighbors().slot(1).is_empty());
    assert_eq!(layout.face_neighbors().slot(3).len(), 1);
    assert_eq!(layout.face_neighbors().slot(5).len(), 1);
    assert_eq!(layout.edge_neighbors().entries().len(), 1);
    assert_eq!(layout.edge_neighbors().entries()[0].rank, 3);
}

#[test]
fn construction_errors_are_surfaced() {
    // Empty axis.
    let empty = NDIndex::new([
        Interval::new(0, 0),
        Interval::new(0, 8),
        Interval::new(0, 8),
    ]);
    assert!(matches!(
        FieldLayout::with_rank(0, 2, empty, 1),
        Err(PargridError::EmptyDomain { axis: 0 })
    ));

    // Ghost depth larger than the thinnest owned slab.
    assert!(matches!(
        FieldLayout::with_rank(0, 8, cube(4), 3),
        Err(PargridError::GhostDepthExceedsExtent { .. })
    ));
}

#[test]
fn vertex_corner_partners_in_a_2x2x2_grid() {
    // Every rank of a 2x2x2 grid has exactly one vertex partner (the
    // opposite corner of the grid) and three face plus three edge partners.
    for rank in 0..8 {
        let layout = FieldLayout::with_rank(rank, 8, cube(8), 1).unwrap();
        assert_eq!(layout.face_neighbors().entries().len(), 3, "rank {rank}");
        assert_eq!(layout.edge_neighbors().entries().len(), 3, "rank {rank}");
        let vertex_partners: Vec<usize> = layout
            .vertex_neighbors()
            .iter()
            .flatten()
            .map(|e| e.rank)
            .collect();
        assert_eq!(vertex_partners.len(), 1, "rank {rank}");
        assert_eq!(vertex_partners[0], 7 - rank, "opposite corner");
    }
}
