use std::time::Duration;
use datagraph::graph::StoreOptions;
use datagraph::lexicon::dv;
use datagraph::model::Connection;
use datagraph::{Error, ExternalSource, GraphStore, NodePath, TransactionState, TypeRegistry, WorkspaceManager};

fn file_store(dir: &tempfile::TempDir) -> GraphStore {
    let options = StoreOptions {
        busy_timeout: Duration::from_millis(50),
    };
    GraphStore::open_with(&dir.path().join("graph.db"), options).unwrap()
}

#[test]
fn test_writes_invisible_until_commit() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);

    let mut writer = store.begin("writer").unwrap();
    let path = writer.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap();

    let mut reader = store.begin("reader").unwrap();
    assert!(!reader.exists(&path).unwrap());
    reader.rollback().unwrap();

    writer.commit().unwrap();
    let mut reader = store.begin("reader-after").unwrap();
    assert!(reader.exists(&path).unwrap());
}

#[test]
fn test_rollback_is_atomic() {
    let store = GraphStore::open_temporary().unwrap();
    let workspace = WorkspaceManager::default();

    let mut uow = store.begin("all-or-nothing").unwrap();
    let connection = workspace
        .create_connection(&mut uow, &ExternalSource::new("pg1", "postgresql"))
        .unwrap();
    connection.ensure_schema(&mut uow).unwrap();
    workspace.create_dataservice(&mut uow, "Portfolio", None).unwrap();
    assert!(uow.has_changes());
    uow.rollback().unwrap();

    let mut check = store.begin("check").unwrap();
    assert!(check.children(&NodePath::root()).unwrap().is_empty());
    assert_eq!(store.stats().unwrap().nodes, 1);
}

#[test]
fn test_terminal_states_reject_operations() {
    let store = GraphStore::open_temporary().unwrap();

    let mut committed = store.begin("committed").unwrap();
    committed.create_node(&NodePath::root(), "a", "nt:folder").unwrap();
    committed.commit().unwrap();
    assert_eq!(committed.state(), TransactionState::Committed);

    let err = committed.children(&NodePath::root()).unwrap_err();
    assert!(matches!(err, Error::TransactionState(_)));
    assert!(err.is_programming_error());
    assert!(matches!(committed.commit(), Err(Error::TransactionState(_))));
    assert!(matches!(committed.rollback(), Err(Error::TransactionState(_))));

    let mut rolled_back = store.begin("rolled-back").unwrap();
    rolled_back.rollback().unwrap();
    assert!(matches!(rolled_back.commit(), Err(Error::TransactionState(_))));
    assert!(matches!(
        rolled_back.create_node(&NodePath::root(), "b", "nt:folder"),
        Err(Error::TransactionState(_))
    ));
}

#[test]
fn test_conflicting_writer_moves_to_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);

    let mut first = store.begin("first").unwrap();
    first.create_node(&NodePath::root(), "a", "nt:folder").unwrap();

    let mut second = store.begin("second").unwrap();
    let err = second.create_node(&NodePath::root(), "b", "nt:folder").unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert!(err.is_recoverable());
    assert_eq!(second.state(), TransactionState::Error);
    assert!(matches!(second.error(), Some(Error::Conflict(_))));

    // the failed unit of work stays unusable
    assert!(matches!(second.children(&NodePath::root()), Err(Error::TransactionState(_))));

    first.commit().unwrap();
    let mut check = store.begin("check").unwrap();
    let names: Vec<String> = check
        .children(&NodePath::root())
        .unwrap()
        .iter()
        .map(|p| p.name().to_string())
        .collect();
    assert_eq!(names, vec!["a"]);
}

#[test]
fn test_resolved_object_dies_with_its_transaction() {
    let store = GraphStore::open_temporary().unwrap();
    let workspace = WorkspaceManager::default();

    let mut uow = store.begin("create").unwrap();
    let created = workspace
        .create_connection(&mut uow, &ExternalSource::new("pg1", "postgresql"))
        .unwrap();
    uow.commit().unwrap();
    assert!(matches!(created.source_id(&mut uow), Err(Error::TransactionState(_))));

    // the same node resolved again in a new unit of work is usable there
    let mut next = store.begin("next").unwrap();
    let again = TypeRegistry::standard()
        .resolve_as::<Connection>(&mut next, created.path())
        .unwrap();
    assert_eq!(again.source_id(&mut next).unwrap().as_deref(), Some("pg1"));
    assert!(matches!(created.source_id(&mut next), Err(Error::TransactionState(_))));
}

#[test]
fn test_removed_path_is_reused() {
    let store = GraphStore::open_temporary().unwrap();
    let mut uow = store.begin("reuse").unwrap();
    let first = uow.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap();
    let second = uow.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap();
    assert_eq!(second.as_str(), "/pg1[2]");

    uow.remove_node(&first).unwrap();
    let third = uow.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap();
    assert_eq!(third, first);
    uow.commit().unwrap();
}

#[test]
fn test_temporary_store_reader_beside_open_writer() {
    let store = GraphStore::open_temporary().unwrap();

    let mut writer = store.begin_write("writer").unwrap();
    let path = writer.create_node(&NodePath::root(), "pg1", dv::CONNECTION).unwrap();

    let mut reader = store.begin("reader").unwrap();
    assert!(!reader.exists(&path).unwrap());
    assert!(reader.children(&NodePath::root()).unwrap().is_empty());
    assert_eq!(reader.state(), TransactionState::Running);
    reader.rollback().unwrap();

    writer.commit().unwrap();
    let mut reader = store.begin("reader-after").unwrap();
    assert!(reader.exists(&path).unwrap());
}

#[test]
fn test_write_units_queue_for_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let store = file_store(&dir);

    let mut first = store.begin_write("first").unwrap();
    first.create_node(&NodePath::root(), "a", "nt:folder").unwrap();

    // the lock is requested at begin, so the blocked writer fails before touching anything
    let mut second = store.begin_write("second").unwrap();
    let err = second.children(&NodePath::root()).unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    assert_eq!(second.state(), TransactionState::Error);

    first.commit().unwrap();
    let mut third = store.begin_write("third").unwrap();
    third.create_node(&NodePath::root(), "b", "nt:folder").unwrap();
    third.commit().unwrap();
    assert_eq!(store.stats().unwrap().nodes, 3);
}
