//! Property-based tests for graph mutations and closures.
//!
//! Random sequences of edge insertions over a small node set must never leave
//! a cycle behind, and the transitive closures must agree with each other.

mod common;

use common::{create, recording_engine};
use proptest::prelude::*;
use ripple::domain::{ComponentId, DependencyType};
use ripple::engine::Engine;
use ripple::error::Error;
use ripple::storage::Deadline;
use std::collections::BTreeSet;

const NODES: usize = 7;

fn node(i: usize) -> ComponentId {
    ComponentId::new(format!("n{i}"))
}

fn edge_attempts() -> impl Strategy<Value = Vec<(usize, usize)>> {
    prop::collection::vec((0..NODES, 0..NODES), 0..40)
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

async fn closure(engine: &Engine, id: &ComponentId) -> BTreeSet<ComponentId> {
    engine
        .transitive_dependencies(id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect()
}

async fn reverse_closure(engine: &Engine, id: &ComponentId) -> BTreeSet<ComponentId> {
    engine
        .transitive_dependents(id)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect()
}

/// Apply every attempt, checking each rejection against `would_create_cycle`.
async fn build(attempts: &[(usize, usize)]) -> Engine {
    let (engine, _sink) = recording_engine();
    for i in 0..NODES {
        create(&engine, &format!("n{i}")).await;
    }

    for &(s, t) in attempts {
        let (source, target) = (node(s), node(t));
        let predicted = s != t
            && engine
                .dependencies()
                .would_create_cycle(&source, &target, Deadline::none())
                .await
                .unwrap();

        let result = engine
            .dependencies()
            .add_dependency(&source, &target, DependencyType::Compile)
            .await;

        match result {
            Ok(_) => assert!(!predicted, "{source} -> {target} was predicted to cycle"),
            Err(Error::SelfDependency(_)) => assert_eq!(s, t),
            Err(Error::CircularDependency { .. }) => {
                assert!(predicted, "{source} -> {target} rejected without a cycle");
            }
            Err(Error::DependencyConflict { .. }) => {}
            Err(other) => panic!("unexpected error for {source} -> {target}: {other:?}"),
        }
    }

    engine
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_graph_stays_acyclic(attempts in edge_attempts()) {
        block_on(async {
            let engine = build(&attempts).await;
            for i in 0..NODES {
                let id = node(i);
                let reachable = closure(&engine, &id).await;
                assert!(!reachable.contains(&id), "{id} reaches itself");
            }
        });
    }

    #[test]
    fn prop_closure_is_transitive(attempts in edge_attempts()) {
        block_on(async {
            let engine = build(&attempts).await;
            for i in 0..NODES {
                let id = node(i);
                let reachable = closure(&engine, &id).await;
                for next in &reachable {
                    let further = closure(&engine, next).await;
                    assert!(
                        further.is_subset(&reachable),
                        "closure of {id} misses part of the closure of {next}"
                    );
                }
            }
        });
    }

    #[test]
    fn prop_closures_mirror_each_other(attempts in edge_attempts()) {
        block_on(async {
            let engine = build(&attempts).await;
            for i in 0..NODES {
                let id = node(i);
                for dependency in closure(&engine, &id).await {
                    assert!(
                        reverse_closure(&engine, &dependency).await.contains(&id),
                        "{dependency} does not list {id} as a dependent"
                    );
                }
            }
        });
    }

    #[test]
    fn prop_cycle_check_does_not_mutate(attempts in edge_attempts(), s in 0..NODES, t in 0..NODES) {
        block_on(async {
            let engine = build(&attempts).await;
            let before = engine.stats().await.unwrap();
            let _ = engine
                .dependencies()
                .would_create_cycle(&node(s), &node(t), Deadline::none())
                .await
                .unwrap();
            assert_eq!(engine.stats().await.unwrap(), before);
        });
    }
}
