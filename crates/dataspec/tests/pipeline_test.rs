//! End-to-end tests: the canonical pipeline over shared stores.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use dataspec::constants::{
    BIG_DATA_TASK, COMPUTE_TASK, IS_BIG_DATA, PROTECTED_PATHS, PUBLIC_PATHS, UPSTREAM_NODE,
    UPSTREAM_TASK, USER_TYPE,
};
use dataspec::schema::{Schema, Size, Type};
use dataspec::source::{Catalog, TableDef, TableName};
use dataspec::{
    AnyArtifact, Artifact, Artifacts, BudgetPolicy, DataSpecError, Manager, ManagerConfig,
    MemoryStore, Node, Parameters, Pipeline, Scalar, SqliteStore, State, Transform, TransformKind,
    Value,
};

const URI: &str = "sqlite:///census.db";

/// Two tables: a protected census extract and a public lookup table.
fn catalog() -> Catalog {
    Catalog::new()
        .with_table(
            "extract",
            "census",
            TableDef::new(20_000)
                .with_column("age", Type::integer_interval(0, 120))
                .with_column("income", Type::float_interval(0.0, 500_000.0))
                .with_column("city", Type::text_values(["Paris", "Lyon", "Nantes"]))
                .with_column("notes", Type::text()),
        )
        .with_table(
            "extract",
            "cities",
            TableDef::new(3)
                .with_column("city", Type::text_values(["Paris", "Lyon", "Nantes"]))
                .with_column("population", Type::integer())
                .public(),
        )
}

fn tables() -> Vec<TableName> {
    vec![
        TableName::new("extract", "census"),
        TableName::new("extract", "cities"),
    ]
}

fn sqlite_manager(dir: &TempDir, id: &str) -> Manager {
    let store = SqliteStore::open(dir.path().join("status.db")).expect("Failed to open store");
    Manager::new(store, ManagerConfig::default().with_manager_id(id)).expect("Failed to create manager")
}

fn run(manager: &Manager) -> Artifacts {
    let source = manager.source(&catalog(), URI, &tables()).expect("Failed to load source");
    if manager.status(source.uuid(), BIG_DATA_TASK).unwrap().is_none() {
        manager.set_big_data(source.uuid(), false).unwrap();
    }
    let output = Pipeline::new(manager).run(&source).expect("Pipeline failed");
    manager.export(output.result()).expect("Export failed")
}

// =============================================================================
// Scenario
// =============================================================================

#[test]
fn test_pipeline_keeps_columns_and_bounds_budget() {
    let manager = Manager::in_memory().unwrap();
    let source = manager.source(&catalog(), URI, &tables()).unwrap();
    manager.set_big_data(source.uuid(), false).unwrap();
    let output = Pipeline::new(&manager).run(&source).unwrap();

    let artifacts = manager.export(output.result()).unwrap();
    let schema = Schema::decode(&artifacts.schema).unwrap();
    let source_schema = manager.schema(&source).unwrap();
    assert_eq!(schema.columns(), source_schema.columns());
    assert_eq!(schema.dataset(), output.result().uuid());

    let allocation = schema.budget().expect("terminal dataset carries a budget");
    let total = match manager.value(&output.budget).unwrap() {
        Value::Scalar(Scalar::Budget(budget)) => budget.total,
        other => panic!("unexpected budget value {:?}", other),
    };
    let spent = allocation.sum();
    assert!(spent.epsilon <= total.epsilon);
    assert!(spent.delta <= total.delta);
    // Only the protected table is budgeted.
    assert_eq!(allocation.allocations.len(), 4);
    assert!(allocation.paths().all(|p| p.segments()[1] == "census"));

    let size = Size::decode(&artifacts.size).unwrap();
    assert_eq!(size.statistics().size(), 20_003);
}

#[test]
fn test_artifacts_written_to_directory() {
    let dir = TempDir::new().unwrap();
    let artifacts = run(&Manager::in_memory().unwrap());
    artifacts.write_to(dir.path().join("out")).unwrap();
    for name in [
        Artifacts::DATASET_FILE,
        Artifacts::SCHEMA_FILE,
        Artifacts::SIZE_FILE,
    ] {
        let bytes = std::fs::read(dir.path().join("out").join(name)).unwrap();
        assert!(AnyArtifact::decode(&bytes).is_ok(), "{} does not decode", name);
    }
}

// =============================================================================
// Idempotence and Determinism
// =============================================================================

#[test]
fn test_rerun_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let first = run(&sqlite_manager(&dir, "first"));
    let second = run(&sqlite_manager(&dir, "second"));
    assert_eq!(first, second);

    let fresh = run(&Manager::in_memory().unwrap());
    assert_eq!(first, fresh);
}

#[test]
fn test_second_manager_reuses_statuses() {
    let dir = TempDir::new().unwrap();
    let first = sqlite_manager(&dir, "first");
    run(&first);

    let second = sqlite_manager(&dir, "second");
    let source = second.source(&catalog(), URI, &tables()).unwrap();
    let output = Pipeline::new(&second).run(&source).unwrap();
    for node in &output.nodes()[1..] {
        let status = second.status(node.uuid(), COMPUTE_TASK).unwrap().unwrap();
        assert_eq!(status.manager, "first", "{} was recomputed", node);
        assert_eq!(status.version, 1);
    }
}

#[test]
fn test_policy_changes_identity() {
    let strict = ManagerConfig::default().with_budget_policy(BudgetPolicy {
        max_epsilon: 1.5,
        ..Default::default()
    });
    let manager = Manager::new(MemoryStore::new(), strict).unwrap();
    let default = Manager::in_memory().unwrap();
    assert_ne!(run(&manager).dataset, run(&default).dataset);
}

// =============================================================================
// Readiness
// =============================================================================

#[test]
fn test_not_ready_until_big_data_classified() {
    let manager = Manager::in_memory().unwrap();
    let source = manager.source(&catalog(), URI, &tables()).unwrap();
    let err = Pipeline::new(&manager).run(&source).unwrap_err();
    assert!(matches!(err, DataSpecError::NotReady { .. }));
    assert!(manager.export(&source).is_err());

    manager.set_big_data(source.uuid(), true).unwrap();
    let output = Pipeline::new(&manager).run(&source).unwrap();
    let status = manager.status(output.result().uuid(), BIG_DATA_TASK).unwrap().unwrap();
    assert_eq!(status.property(IS_BIG_DATA), Some("True"));
}

#[test]
fn test_waits_for_classification_from_another_manager() {
    let store = MemoryStore::new();
    let waiting = Manager::new(
        store.clone(),
        ManagerConfig::default()
            .with_ready_timeout(Duration::from_secs(10))
            .with_poll_interval(Duration::from_millis(5)),
    )
    .unwrap();
    let classifier = Manager::new(store, ManagerConfig::default()).unwrap();
    let source = waiting.source(&catalog(), URI, &tables()).unwrap();

    let id = source.uuid().clone();
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        classifier.set_big_data(&id, false).unwrap();
    });
    let output = Pipeline::new(&waiting).run(&source).unwrap();
    handle.join().unwrap();
    assert!(waiting.export(output.result()).is_ok());
}

#[test]
fn test_error_propagates_to_every_dependent() {
    let manager = Manager::in_memory().unwrap();
    let source = manager.source(&catalog(), URI, &tables()).unwrap();
    manager
        .error(source.uuid(), BIG_DATA_TASK, "classification timed out")
        .unwrap();

    let err = Pipeline::new(&manager).run(&source).unwrap_err();
    match err {
        DataSpecError::UpstreamFailed { node, task, reason } => {
            assert_eq!(&node, source.uuid());
            assert_eq!(task, BIG_DATA_TASK);
            assert_eq!(reason, "classification timed out");
        }
        other => panic!("unexpected error: {}", other),
    }

    let paths = Node::build(
        &Transform::new(TransformKind::AutomaticProtectedPaths),
        &[&source],
        &Parameters::new(),
    )
    .unwrap();
    let status = manager.status(paths.uuid(), COMPUTE_TASK).unwrap().unwrap();
    assert_eq!(status.state, State::Error);
    assert_eq!(status.property(UPSTREAM_NODE), Some(source.uuid().as_str()));

    // Inferred parameters are bound to their failed nodes.
    assert!(manager.protect(&source, None, None).is_err());
    let public = Node::build(
        &Transform::new(TransformKind::AutomaticPublicPaths),
        &[&source],
        &Parameters::new(),
    )
    .unwrap();
    let protected = Node::build(
        &Transform::new(TransformKind::Protect),
        &[&source],
        &Parameters::new()
            .with(PROTECTED_PATHS, &paths)
            .with(PUBLIC_PATHS, &public),
    )
    .unwrap();
    for node in [&public, &protected] {
        let status = manager.status(node.uuid(), COMPUTE_TASK).unwrap().unwrap();
        assert_eq!(status.state, State::Error);
        assert_eq!(status.property(UPSTREAM_NODE), Some(source.uuid().as_str()));
        assert_eq!(status.property(UPSTREAM_TASK), Some(BIG_DATA_TASK));
    }

    // One level further down.
    let user_type = Node::build(
        &manager.transform(TransformKind::AutomaticUserSettings),
        &[&protected],
        &Parameters::new(),
    )
    .unwrap();
    let err = manager.user_settings(&protected, Some(&user_type)).unwrap_err();
    assert!(matches!(err, DataSpecError::UpstreamFailed { .. }));
    let adjusted = Node::build(
        &Transform::new(TransformKind::UserSettings),
        &[&protected],
        &Parameters::new().with(USER_TYPE, &user_type),
    )
    .unwrap();
    let status = manager.status(adjusted.uuid(), COMPUTE_TASK).unwrap().unwrap();
    assert_eq!(status.state, State::Error);
    assert_eq!(status.property(UPSTREAM_NODE), Some(protected.uuid().as_str()));
    assert_eq!(status.property(UPSTREAM_TASK), Some(COMPUTE_TASK));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_managers_agree() {
    let store = MemoryStore::new();
    let seed = Manager::new(store.clone(), ManagerConfig::default()).unwrap();
    let source = seed.source(&catalog(), URI, &tables()).unwrap();
    seed.set_big_data(source.uuid(), false).unwrap();

    let managers: Vec<Arc<Manager>> = (0..4)
        .map(|i| {
            Arc::new(
                Manager::new(store.clone(), ManagerConfig::default().with_manager_id(format!("m{}", i)))
                    .unwrap(),
            )
        })
        .collect();
    let handles: Vec<_> = managers
        .iter()
        .map(|manager| {
            let manager = Arc::clone(manager);
            let source = source.clone();
            thread::spawn(move || {
                let output = Pipeline::new(&manager).run(&source).unwrap();
                manager.export(output.result()).unwrap()
            })
        })
        .collect();
    let results: Vec<Artifacts> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}

#[test]
fn test_concurrent_sqlite_managers_agree() {
    let dir = TempDir::new().unwrap();
    // Create the database before the managers race on it.
    drop(sqlite_manager(&dir, "setup"));

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let path = dir.path().join("status.db");
            thread::spawn(move || {
                let store = SqliteStore::open(path).unwrap();
                let manager =
                    Manager::new(store, ManagerConfig::default().with_manager_id(format!("m{}", i))).unwrap();
                let source = manager.source(&catalog(), URI, &tables()).unwrap();
                // Every manager classifies the source the same way.
                manager.set_big_data(source.uuid(), false).unwrap();
                let output = Pipeline::new(&manager).run(&source).unwrap();
                manager.export(output.result()).unwrap()
            })
        })
        .collect();
    let results: Vec<Artifacts> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
}
