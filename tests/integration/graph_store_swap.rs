#![allow(missing_docs)]

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use graphswap::cost::CostModel;
use graphswap::storage::{GraphStore, GraphStoreOptions};
use graphswap::swap::{RunClock, SwapExecutor};
use graphswap::{
    ContainerAssignment, EdgeId, HotSwapConfig, HotSwapEngine, HotSwapError, ImplKind, NodeId,
    StorageRole,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const NODES: u64 = 300;
const READERS: usize = 4;

fn ring(store: &GraphStore, nodes: u64) {
    for id in 0..nodes {
        store.add_node(NodeId(id)).unwrap();
    }
    for id in 0..nodes {
        store
            .add_edge(NodeId(id), NodeId((id + 1) % nodes))
            .unwrap();
    }
}

fn snapshot(store: &GraphStore) -> Vec<(NodeId, BTreeSet<NodeId>, BTreeSet<EdgeId>)> {
    let mut nodes = store.nodes();
    nodes.sort();
    nodes
        .into_iter()
        .map(|node| {
            (
                node,
                store.neighbors(node).into_iter().collect(),
                store.incident_edges(node).into_iter().collect(),
            )
        })
        .collect()
}

#[test]
fn every_supported_swap_preserves_the_graph() {
    let store = GraphStore::open(GraphStoreOptions::new()).unwrap();
    ring(&store, 50);
    let before = snapshot(&store);
    for node_kind in ImplKind::ALL {
        for edge_kind in [ImplKind::SortedArray, ImplKind::HashSet, ImplKind::SlotArray] {
            for list_kind in [ImplKind::Array, ImplKind::BTreeSet, ImplKind::HashSet] {
                let target = ContainerAssignment::uniform(list_kind)
                    .with(StorageRole::NodeList, node_kind)
                    .with(StorageRole::EdgeList, edge_kind);
                store.apply_swap(&target).unwrap();
                assert_eq!(store.current_assignment(), target);
                assert_eq!(snapshot(&store), before, "after swapping to {target}");
                assert_eq!(store.endpoints(EdgeId(7)), Some((NodeId(7), NodeId(8))));
            }
        }
    }
}

#[test]
fn graph_keeps_working_after_swap() {
    let store = GraphStore::open(GraphStoreOptions::new()).unwrap();
    ring(&store, 10);
    store
        .apply_swap(&ContainerAssignment::uniform(ImplKind::SortedArray))
        .unwrap();
    assert!(store.add_node(NodeId(10)).unwrap());
    let edge = store.add_edge(NodeId(10), NodeId(3)).unwrap().unwrap();
    assert!(store.contains_edge(edge));
    assert_eq!(store.degree(NodeId(3)), 3);
    assert!(store.remove_node(NodeId(3)));
    assert_eq!(store.edge_count(), 8);
    assert!(!store.add_node(NodeId(4)).unwrap());
}

#[test]
fn readers_never_observe_a_partial_swap() {
    let store = Arc::new(GraphStore::open(GraphStoreOptions::new()).unwrap());
    ring(&store, NODES);
    let barrier = Arc::new(Barrier::new(READERS + 1));
    let done = Arc::new(AtomicBool::new(false));

    let handles: Vec<_> = (0..READERS)
        .map(|seed| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut rng = ChaCha8Rng::seed_from_u64(seed as u64);
                barrier.wait();
                while !done.load(Ordering::Acquire) {
                    assert_eq!(store.node_count(), NODES as usize);
                    assert_eq!(store.edge_count(), NODES as usize);
                    let node = NodeId(rng.gen_range(0..NODES));
                    assert_eq!(store.neighbors(node).len(), 2);
                    assert_eq!(store.degree(node), 2);
                }
            })
        })
        .collect();

    barrier.wait();
    let targets = [
        ContainerAssignment::uniform(ImplKind::HashSet),
        ContainerAssignment::uniform(ImplKind::BTreeSet)
            .with(StorageRole::NodeList, ImplKind::SlotArray),
        ContainerAssignment::uniform(ImplKind::SortedArray),
        ContainerAssignment::default(),
    ];
    for round in 0..5 {
        for target in &targets {
            store.apply_swap(target).unwrap();
            assert_eq!(store.current_assignment(), *target, "round {round}");
        }
    }
    done.store(true, Ordering::Release);
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn rebuild_limit_rejects_large_swaps() {
    let store =
        GraphStore::open(GraphStoreOptions::new().max_rebuild_elements(100)).unwrap();
    ring(&store, 80);
    let before = snapshot(&store);

    // 160 incident entries exceed the limit.
    let too_big = ContainerAssignment::default().with(StorageRole::IncidentEdges, ImplKind::HashSet);
    let err = store.apply_swap(&too_big).unwrap_err();
    assert!(matches!(err, HotSwapError::SwapFailed(_)));
    assert_eq!(store.current_assignment(), ContainerAssignment::default());
    assert_eq!(snapshot(&store), before);

    let small = ContainerAssignment::default().with(StorageRole::NodeList, ImplKind::HashSet);
    store.apply_swap(&small).unwrap();
    assert_eq!(store.current_assignment(), small);
}

#[test]
fn engine_tunes_a_live_store() {
    let config = HotSwapConfig::new()
        .window_size(3)
        .lower_bound(0.0)
        .amortization_batches(5);
    let mut engine = HotSwapEngine::new(config, CostModel::builtin()).unwrap();
    let store = GraphStore::open(GraphStoreOptions::new().metrics(engine.recorder())).unwrap();
    let batches = 6;
    let mut outcomes = Vec::new();

    for batch in 0..batches {
        let base = batch * 200;
        for id in base..base + 200 {
            store.add_node(NodeId(id)).unwrap();
            if id > 0 {
                store.add_edge(NodeId(id), NodeId(id - 1)).unwrap();
            }
        }
        let clock = RunClock::at(batch, Some(batches));
        outcomes.push(engine.end_batch(&clock, &store));
    }

    assert!(engine.swaps_done() >= 1);
    assert!(outcomes.iter().any(|o| o.swapped));
    assert!(store.checks_enabled());
    assert_eq!(store.node_count(), (batches * 200) as usize);
    assert_eq!(store.edge_count(), (batches * 200 - 1) as usize);
    assert_eq!(store.neighbors(NodeId(0)), vec![NodeId(1)]);
    assert_eq!(store.degree(NodeId(500)), 2);
    assert_eq!(
        engine.first_switch(),
        outcomes.iter().find(|o| o.swapped).map(|o| o.assignment)
    );
}
