//! Multi-rank halo exchange tests over the thread mailbox communicator.
//!
//! Each test spawns one OS thread per rank; every thread builds its own
//! layout and field and runs the collective operation. Universes are
//! isolated, so the tests can run concurrently.

use std::sync::Arc;

use pargrid::comm::{Communicator, ThreadComm};
use pargrid::field::{from_fn, BareField};
use pargrid::index::{Interval, NDIndex};
use pargrid::layout::FieldLayout;

fn cube(n: i64) -> NDIndex<3> {
    NDIndex::new([Interval::new(0, n); 3])
}

/// Run `f` on every rank of a fresh universe and collect the results.
fn on_ranks<R, F>(size: usize, f: F) -> Vec<R>
where
    R: Send + 'static,
    F: Fn(ThreadComm) -> R + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = ThreadComm::universe(size)
        .into_iter()
        .map(|comm| {
            let f = f.clone();
            std::thread::spawn(move || f(comm))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn fill_two_rank_split() {
    // Global [0,8)^3 split along x; f(i,j,k) = i on owned cells. After the
    // fill, rank 0's halo plane at global x=4 holds 4 and rank 1's halo
    // plane at global x=3 holds 3.
    on_ranks(2, |comm| {
        let layout = Arc::new(FieldLayout::new(&comm, cube(8), 1).unwrap());
        let mut f = BareField::<f64>::new(Arc::clone(&layout));

        let x0 = layout.local_domain().firsts()[0];
        f.assign(from_fn(move |i, _j, _k| (i as i64 + x0 - 1) as f64));
        f.fill_halo(&comm).unwrap();

        let v = f.view();
        match comm.rank() {
            0 => {
                // Halo column at view x=5 mirrors rank 1's owned x=4.
                for k in 1..9 {
                    for j in 1..9 {
                        assert_eq!(*v.at(5, j, k), 4.0);
                    }
                }
                // Physical-boundary halo stays zeroed.
                assert_eq!(*v.at(0, 4, 4), 0.0);
            }
            _ => {
                for k in 1..9 {
                    for j in 1..9 {
                        assert_eq!(*v.at(0, j, k), 3.0);
                    }
                }
                assert_eq!(*v.at(5, 4, 4), 0.0);
            }
        }
    });
}

#[test]
fn accumulate_cancels_across_the_shared_face() {
    // Owned cells start at 0 and halos at 7. Accumulation pushes each halo
    // slab into the partner's owned face plane; interior owned cells stay 0.
    on_ranks(2, |comm| {
        let layout = Arc::new(FieldLayout::new(&comm, cube(8), 1).unwrap());
        let mut f = BareField::<f64>::new(Arc::clone(&layout));
        f.view_mut().fill(7.0);
        f.assign(0.0);

        f.accumulate_halo(&comm).unwrap();

        let v = f.view();
        // The owned plane facing the partner received exactly one 7.
        let face_x = if comm.rank() == 0 { 4 } else { 1 };
        for k in 1..9 {
            for j in 1..9 {
                assert_eq!(*v.at(face_x, j, k), 7.0);
            }
        }
        // An interior owned cell got nothing.
        let interior_x = if comm.rank() == 0 { 2 } else { 3 };
        assert_eq!(*v.at(interior_x, 4, 4), 0.0);
    });
}

#[test]
fn fill_covers_the_full_interior_halo() {
    // 2x2x1 decomposition; g(global) = i + 10j + 100k. Every halo cell
    // whose global index lies inside the global domain must equal g there;
    // halo cells outside the domain keep their initial zero.
    on_ranks(4, |comm| {
        let layout = Arc::new(FieldLayout::new(&comm, cube(8), 1).unwrap());
        let mut f = BareField::<f64>::new(Arc::clone(&layout));

        let first = layout.local_domain().firsts();
        let g = layout.nghost() as i64;
        f.assign(from_fn(move |i, j, k| {
            let ig = i as i64 + first[0] - g;
            let jg = j as i64 + first[1] - g;
            let kg = k as i64 + first[2] - g;
            (ig + 10 * jg + 100 * kg) as f64
        }));
        f.fill_halo(&comm).unwrap();

        let global = *layout.global_domain();
        let ext = f.view().extents();
        for k in 0..ext[2] {
            for j in 0..ext[1] {
                for i in 0..ext[0] {
                    let ig = i as i64 + first[0] - g;
                    let jg = j as i64 + first[1] - g;
                    let kg = k as i64 + first[2] - g;
                    let expect = if global.contains([ig, jg, kg]) {
                        (ig + 10 * jg + 100 * kg) as f64
                    } else {
                        0.0
                    };
                    assert_eq!(
                        *f.view().at(i, j, k),
                        expect,
                        "rank {} cell ({i},{j},{k})",
                        comm.rank()
                    );
                }
            }
        }
    });
}

#[test]
fn accumulate_adds_one_contribution_per_partner_cell() {
    // Every cell (owned and halo) starts at 1. After accumulation each
    // owned cell has gained one contribution per partner halo cell mapped
    // onto it, so the rank-local owned sum grows by the total send-range
    // volume.
    let sums = on_ranks(8, |comm| {
        let layout = Arc::new(FieldLayout::new(&comm, cube(8), 1).unwrap());
        let mut f = BareField::<f64>::new(Arc::clone(&layout));
        f.view_mut().fill(1.0);

        f.accumulate_halo(&comm).unwrap();

        let received: usize = layout
            .face_neighbors()
            .entries()
            .iter()
            .chain(layout.edge_neighbors().entries())
            .chain(layout.vertex_neighbors().iter().flatten())
            .map(|e| e.send.size())
            .sum();

        let (lo, hi) = f.owned_box();
        let mut owned_sum = 0.0;
        for k in lo[2]..hi[2] {
            for j in lo[1]..hi[1] {
                for i in lo[0]..hi[0] {
                    owned_sum += *f.view().at(i, j, k);
                }
            }
        }
        let owned = layout.local_domain().size();
        assert_eq!(owned_sum, (owned + received) as f64, "rank {}", comm.rank());
        owned_sum
    });

    // Cluster-wide: the grand total equals the owned cells plus every
    // interior halo cell pushed back in.
    let total: f64 = sums.iter().sum();
    assert!(total > 512.0);
}

#[test]
fn repeated_exchanges_reuse_tags_and_buffers() {
    // Drive several fills and accumulates back to back; the per-phase tag
    // families wrap within their cycle and pooled buffers are reused.
    on_ranks(2, |comm| {
        let layout = Arc::new(FieldLayout::new(&comm, cube(8), 2).unwrap());
        let mut f = BareField::<f64>::new(Arc::clone(&layout));

        for round in 0..20 {
            let x0 = layout.local_domain().firsts()[0];
            f.assign(from_fn(move |i, _j, _k| {
                (i as i64 + x0) as f64 + round as f64
            }));
            f.fill_halo(&comm).unwrap();
            f.accumulate_halo(&comm).unwrap();
        }
        assert!(comm.buffers().parked() > 0, "buffers returned to the pool");
    });
}
