//! Integration tests for the component registry and dependency manager.
//!
//! These tests drive the services through [`Engine`] against the in-memory
//! store and check both the committed graph and the published events.

mod common;

use common::{
    PROJECT, chain, create, create_in, depend, id, recording_engine, recording_engine_with,
};
use ripple::config::EngineConfig;
use ripple::domain::{
    ComponentStatus, ComponentType, ComponentUpdate, DependencyType, Metadata, NewComponent,
    NewDependency,
};
use ripple::error::{Error, ErrorCode};
use ripple::events::{DependencyChange, LifecycleChange, OutboundEvent};
use ripple::storage::Deadline;
use rstest::rstest;

// ========== Component lifecycle ==========

#[tokio::test]
async fn test_create_component_is_active_and_announced() {
    let (engine, sink) = recording_engine();

    let component = create(&engine, "web").await;

    assert_eq!(component.status, ComponentStatus::Active);
    assert_eq!(component.created_at, component.updated_at);

    let events = sink.events().await;
    assert_eq!(events.len(), 1);
    let OutboundEvent::Component(event) = &events[0] else {
        panic!("expected component event, got {:?}", events[0]);
    };
    assert_eq!(event.change, LifecycleChange::Create);
    assert_eq!(event.new_version.as_deref(), Some("1.0.0"));
}

#[tokio::test]
async fn test_duplicate_create_leaves_stored_component_unchanged() {
    let (engine, sink) = recording_engine();
    let original = create(&engine, "web").await;

    let err = engine
        .registry()
        .create_component(NewComponent::new(
            "web",
            "Other",
            ComponentType::Database,
            "9.9.9",
            "elsewhere",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::DuplicateComponent(ref dup) if *dup == id("web")));
    assert_eq!(engine.component(&id("web")).await.unwrap(), original);
    assert_eq!(sink.events().await.len(), 1);
}

#[rstest]
#[case::blank_name(NewComponent::new("web", " ", ComponentType::Frontend, "1.0.0", PROJECT), "name")]
#[case::bad_version(NewComponent::new("web", "Web", ComponentType::Frontend, "one", PROJECT), "version")]
#[case::blank_project(NewComponent::new("web", "Web", ComponentType::Frontend, "1.0.0", ""), "project_id")]
#[case::whitespace_id(NewComponent::new("w b", "Web", ComponentType::Frontend, "1.0.0", PROJECT), "id")]
#[tokio::test]
async fn test_invalid_component_rejected(#[case] new: NewComponent, #[case] expected: &str) {
    let (engine, sink) = recording_engine();

    let err = engine.registry().create_component(new).await.unwrap_err();

    assert!(matches!(err, Error::InvalidComponent { field, .. } if field == expected));
    assert_eq!(engine.stats().await.unwrap().components, 0);
    assert!(sink.events().await.is_empty());
}

#[tokio::test]
async fn test_metadata_update_refreshes_timestamp_without_propagating() {
    let (engine, sink) = recording_engine();
    chain(&engine, &["web", "api"]).await;
    let before = engine.component(&id("api")).await.unwrap();
    sink.take().await;

    let mut metadata = Metadata::new();
    metadata.insert("owner".into(), "platform".into());
    let outcome = engine
        .registry()
        .update_component(
            &id("api"),
            ComponentUpdate {
                metadata: Some(metadata),
                ..ComponentUpdate::default()
            },
            None,
        )
        .await
        .unwrap();

    assert!(outcome.propagation.is_none());
    assert!(outcome.component.updated_at >= before.updated_at);
    assert_eq!(outcome.component.metadata["owner"], "platform");

    let events = sink.take().await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        OutboundEvent::Component(e) if e.change == LifecycleChange::Update
    ));
}

#[tokio::test]
async fn test_update_missing_component_is_not_found() {
    let (engine, _sink) = recording_engine();
    let update = ComponentUpdate {
        status: Some(ComponentStatus::Deprecated),
        ..ComponentUpdate::default()
    };

    let err = engine
        .registry()
        .update_component(&id("ghost"), update, None)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::ComponentNotFound);
}

#[tokio::test]
async fn test_list_by_project_and_type() {
    let (engine, _sink) = recording_engine();
    create(&engine, "b").await;
    create(&engine, "a").await;
    create_in(&engine, "z", "other").await;
    engine
        .registry()
        .create_component(NewComponent::new("db", "DB", ComponentType::Database, "1.0.0", PROJECT))
        .await
        .unwrap();

    let shop: Vec<_> = engine
        .components_by_project(PROJECT)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(shop, vec![id("a"), id("b"), id("db")]);

    let databases = engine.components_by_type(ComponentType::Database).await.unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].id, id("db"));
}

// ========== Deletion ==========

#[tokio::test]
async fn test_delete_blocked_by_direct_dependents() {
    let (engine, sink) = recording_engine();
    for component_id in ["a", "b", "c"] {
        create(&engine, component_id).await;
    }
    depend(&engine, "a", "c").await;
    depend(&engine, "b", "c").await;
    sink.take().await;

    let err = engine.registry().delete_component(&id("c")).await.unwrap_err();

    let Error::DependentsExist { component_id, dependents } = &err else {
        panic!("expected DependentsExist, got {err:?}");
    };
    assert_eq!(component_id, &id("c"));
    assert_eq!(dependents, &vec![id("a"), id("b")]);
    assert_eq!(err.payload().details["dependents"], serde_json::json!(["a", "b"]));

    assert!(engine.component(&id("c")).await.is_ok());
    assert!(sink.events().await.is_empty());
}

#[tokio::test]
async fn test_delete_after_dependent_edge_removed() {
    // A -> B: A is a direct dependent of B, so B can only go once the edge does.
    let (engine, sink) = recording_engine();
    chain(&engine, &["a", "b"]).await;

    assert!(matches!(
        engine.registry().delete_component(&id("b")).await,
        Err(Error::DependentsExist { .. })
    ));

    engine
        .dependencies()
        .remove_dependency(&id("a"), &id("b"), DependencyType::Runtime)
        .await
        .unwrap();
    sink.take().await;

    let deleted = engine.registry().delete_component(&id("b")).await.unwrap();

    assert_eq!(deleted.id, id("b"));
    assert!(matches!(
        engine.component(&id("b")).await,
        Err(Error::ComponentNotFound(_))
    ));
    assert!(engine.dependencies().direct_dependencies(&id("a")).await.unwrap().is_empty());

    let events = sink.take().await;
    assert!(matches!(
        &events[..],
        [OutboundEvent::Component(e)] if e.change == LifecycleChange::Delete
    ));
}

#[tokio::test]
async fn test_delete_cascades_outgoing_edges() {
    let (engine, _sink) = recording_engine();
    chain(&engine, &["a", "b", "c"]).await;

    engine.registry().delete_component(&id("a")).await.unwrap();

    assert!(engine.dependencies().direct_dependents(&id("b")).await.unwrap().is_empty());
    assert_eq!(engine.stats().await.unwrap().dependencies, 1);
}

// ========== Edges ==========

#[tokio::test]
async fn test_closing_a_cycle_is_rejected_and_graph_unchanged() {
    let (engine, sink) = recording_engine();
    chain(&engine, &["a", "b", "c"]).await;
    sink.take().await;

    let err = engine
        .dependencies()
        .add_dependency(&id("c"), &id("a"), DependencyType::Runtime)
        .await
        .unwrap_err();

    let Error::CircularDependency { from, to } = &err else {
        panic!("expected CircularDependency, got {err:?}");
    };
    assert_eq!((from, to), (&id("c"), &id("a")));
    assert_eq!(err.code(), ErrorCode::CircularDependency);

    let deps = engine.dependencies();
    assert!(deps.direct_dependencies(&id("c")).await.unwrap().is_empty());
    assert_eq!(deps.direct_dependencies(&id("a")).await.unwrap()[0].target, id("b"));
    assert_eq!(deps.direct_dependencies(&id("b")).await.unwrap()[0].target, id("c"));
    assert_eq!(engine.stats().await.unwrap().dependencies, 2);
    assert!(sink.events().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_racing_opposite_edges_commit_exactly_one() {
    let (engine, _sink) = recording_engine();

    for round in 0..200 {
        let (a, b) = (format!("a{round}"), format!("b{round}"));
        create(&engine, &a).await;
        create(&engine, &b).await;

        let race = |source: &str, target: &str| {
            let deps = engine.dependencies().clone();
            let (source, target) = (id(source), id(target));
            tokio::spawn(async move {
                deps.add_dependency(&source, &target, DependencyType::Runtime)
                    .await
            })
        };
        let forward = race(&a, &b);
        let backward = race(&b, &a);
        let results = [forward.await.unwrap(), backward.await.unwrap()];

        let committed = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(committed, 1, "round {round}: {results:?}");
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(Error::CircularDependency { .. }))),
            "round {round}: {results:?}"
        );
    }

    assert_eq!(engine.stats().await.unwrap().dependencies, 200);
    for round in 0..200 {
        for component_id in [format!("a{round}"), format!("b{round}")] {
            let reachable = engine
                .transitive_dependencies(&id(&component_id))
                .await
                .unwrap();
            assert!(
                reachable.iter().all(|c| c.id != id(&component_id)),
                "{component_id} reaches itself"
            );
        }
    }
}

#[tokio::test]
async fn test_cycle_check_past_its_deadline_commits_nothing() {
    let (engine, sink) = recording_engine_with(EngineConfig {
        mutation_timeout_ms: 0,
        ..EngineConfig::default()
    });
    create(&engine, "a").await;
    create(&engine, "b").await;
    sink.take().await;

    let err = engine
        .dependencies()
        .add_dependency(&id("a"), &id("b"), DependencyType::Runtime)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::CycleCheckTimeout { .. }), "got {err:?}");
    assert_eq!(err.code(), ErrorCode::CycleCheckTimeout);
    assert_eq!(err.status(), 504);
    assert_eq!(engine.stats().await.unwrap().dependencies, 0);
    assert!(sink.events().await.is_empty());
}

#[tokio::test]
async fn test_self_dependency_rejected() {
    let (engine, _sink) = recording_engine();
    create(&engine, "a").await;

    let err = engine
        .dependencies()
        .add_dependency(&id("a"), &id("a"), DependencyType::Compile)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::SelfDependency);
}

#[tokio::test]
async fn test_duplicate_edge_rejected_but_other_type_allowed() {
    let (engine, _sink) = recording_engine();
    chain(&engine, &["a", "b"]).await;

    let err = engine
        .dependencies()
        .add_dependency(&id("a"), &id("b"), DependencyType::Runtime)
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        Error::DependencyConflict { components, .. } if components == &vec![id("a"), id("b")]
    ));

    engine
        .dependencies()
        .add_dependency(&id("a"), &id("b"), DependencyType::Test)
        .await
        .unwrap();
    assert_eq!(engine.stats().await.unwrap().dependencies, 2);
}

#[tokio::test]
async fn test_edge_to_missing_component_rejected() {
    let (engine, _sink) = recording_engine();
    create(&engine, "a").await;

    let err = engine
        .dependencies()
        .add_dependency(&id("a"), &id("ghost"), DependencyType::Import)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::ComponentNotFound(ref missing) if *missing == id("ghost")));
}

#[tokio::test]
async fn test_remove_missing_edge_is_dependency_not_found() {
    let (engine, _sink) = recording_engine();
    chain(&engine, &["a", "b"]).await;

    let err = engine
        .dependencies()
        .remove_dependency(&id("a"), &id("b"), DependencyType::Compile)
        .await
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::DependencyNotFound);
    assert_eq!(engine.stats().await.unwrap().dependencies, 1);
}

#[tokio::test]
async fn test_added_edge_event_carries_endpoints_and_type() {
    let (engine, sink) = recording_engine();
    create(&engine, "web").await;
    create(&engine, "api").await;
    sink.take().await;

    engine
        .dependencies()
        .add(NewDependency::new("web", "api", DependencyType::ApiCall))
        .await
        .unwrap();

    let events = sink.take().await;
    let [OutboundEvent::Dependency(event)] = &events[..] else {
        panic!("expected one dependency event, got {events:?}");
    };
    assert_eq!(event.change, DependencyChange::Added);
    assert_eq!(event.source_component_id, id("web"));
    assert_eq!(event.target_component_id, id("api"));
    assert_eq!(event.dependency_type, DependencyType::ApiCall);
}

// ========== Queries ==========

#[tokio::test]
async fn test_transitive_queries_on_diamond() {
    //   web -> api -> db
    //   web -> auth -> db
    let (engine, _sink) = recording_engine();
    for component_id in ["web", "api", "auth", "db"] {
        create(&engine, component_id).await;
    }
    depend(&engine, "web", "api").await;
    depend(&engine, "web", "auth").await;
    depend(&engine, "api", "db").await;
    depend(&engine, "auth", "db").await;

    let mut dependents: Vec<_> = engine
        .transitive_dependents(&id("db"))
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    dependents.sort();
    assert_eq!(dependents, vec![id("api"), id("auth"), id("web")]);

    let dependencies = engine.transitive_dependencies(&id("web")).await.unwrap();
    assert_eq!(dependencies.len(), 3);

    let path = engine
        .dependency_path(&id("web"), &id("db"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(path.len(), 2);
    assert_eq!(path.components().first(), Some(&&id("web")));
    assert_eq!(path.components().last(), Some(&&id("db")));

    assert!(engine.dependency_path(&id("db"), &id("web")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_would_create_cycle_reports_without_mutating() {
    let (engine, _sink) = recording_engine();
    chain(&engine, &["a", "b", "c"]).await;
    let deps = engine.dependencies();

    assert!(deps.would_create_cycle(&id("c"), &id("a"), Deadline::none()).await.unwrap());
    assert!(!deps.would_create_cycle(&id("a"), &id("c"), Deadline::none()).await.unwrap());
    assert_eq!(engine.stats().await.unwrap().dependencies, 2);
}
