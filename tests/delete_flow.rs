//! Delete and recover state machine tests.

use mapguard::test_helpers::{
    DeleteOutcome, RecordingHook, StubRecord, StubTransactionProvider,
};
use mapguard::{DomainContext, EntitiesRepository, Entity, EntityEvent};
use std::cell::RefCell;
use std::rc::Rc;

fn widget_context() -> Rc<DomainContext> {
    let context = DomainContext::new();
    context.register_entity("WidgetEntity", Entity::shared);
    context
}

#[test]
fn test_successful_delete_fires_both_events() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let journal = Rc::new(RefCell::new(Vec::new()));
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .use_transactions(false)
        .hook(RecordingHook::new(log.clone()))
        .build();

    let record = StubRecord::builder("WidgetRecord")
        .journal(journal.clone())
        .build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(repository.delete(&entity).unwrap());
    assert_eq!(*log.borrow(), vec!["before-delete", "after-delete"]);
    assert_eq!(*journal.borrow(), vec!["delete"]);
}

#[test]
fn test_zero_rows_removed_is_a_failed_delete() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .use_transactions(false)
        .hook(RecordingHook::new(log.clone()))
        .build();

    let record = StubRecord::builder("WidgetRecord")
        .delete_outcome(DeleteOutcome::Noop)
        .build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(!repository.delete(&entity).unwrap());
    // after-delete never fires for a row that was not removed.
    assert_eq!(*log.borrow(), vec!["before-delete"]);
    assert_eq!(
        repository.get_errors(),
        vec!["failed to delete entity backed by WidgetRecord"]
    );
}

#[test]
fn test_gate_abort_prevents_the_physical_delete() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let journal = Rc::new(RefCell::new(Vec::new()));
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .use_transactions(false)
        .hook(RecordingHook::aborting_on(log.clone(), EntityEvent::BeforeDelete))
        .build();

    let record = StubRecord::builder("WidgetRecord")
        .journal(journal.clone())
        .build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(!repository.delete(&entity).unwrap());
    assert!(journal.borrow().is_empty());
    assert_eq!(*log.borrow(), vec!["before-delete"]);
}

#[test]
fn test_delete_failure_rolls_back_the_transaction() {
    let provider = Rc::new(StubTransactionProvider::new());
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .transaction_provider(provider.clone())
        .build();

    let record = StubRecord::builder("WidgetRecord")
        .delete_outcome(DeleteOutcome::Fail("gone away".to_string()))
        .build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(!repository.delete(&entity).unwrap());
    assert_eq!(provider.journal(), vec!["begin", "rollback"]);
    assert!(repository.get_errors()[0].contains("gone away"));
}

#[test]
fn test_successful_delete_commits_the_transaction() {
    let provider = Rc::new(StubTransactionProvider::new());
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .transaction_provider(provider.clone())
        .build();

    let record = StubRecord::builder("WidgetRecord").build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(repository.delete(&entity).unwrap());
    assert_eq!(provider.journal(), vec!["begin", "commit"]);
}

#[test]
fn test_recover_restores_through_the_delete_gates() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let journal = Rc::new(RefCell::new(Vec::new()));
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .use_transactions(false)
        .hook(RecordingHook::new(log.clone()))
        .build();

    let record = StubRecord::builder("WidgetRecord")
        .supports_recovery(true)
        .journal(journal.clone())
        .build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(repository.recover(&entity).unwrap());
    assert_eq!(*log.borrow(), vec!["before-delete", "after-delete"]);
    assert_eq!(*journal.borrow(), vec!["restore"]);
}

#[test]
fn test_recover_without_capability_fails_leniently() {
    let repository = EntitiesRepository::builder("WidgetRepository", widget_context())
        .use_transactions(false)
        .build();

    let record = StubRecord::builder("WidgetRecord").build_shared();
    let entity = repository.create_entity_from_source(record).unwrap();

    assert!(!repository.recover(&entity).unwrap());
    assert_eq!(
        repository.get_errors(),
        vec!["failed to recover entity backed by WidgetRecord"]
    );
}
