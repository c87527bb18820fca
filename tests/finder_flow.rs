//! Finder, search-result, and provider tests: result conversion, fluent
//! delegation, primary-key lookup, and the two cursor modes.

use mapguard::test_helpers::StubQuery;
use mapguard::test_helpers::StubRecord;
use mapguard::{
    DomainContext, EntitiesRepository, Entity, FoundValue, IterationMode, QueryRef, RecordRef,
    SearchItem,
};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

fn make_record(id: i64) -> RecordRef {
    StubRecord::builder("WidgetRecord")
        .attribute("id", json!(id))
        .attribute("name", json!(format!("widget {id}")))
        .build_shared()
}

fn widget_repository() -> Rc<EntitiesRepository> {
    let context = DomainContext::new();
    context.register_entity("WidgetEntity", Entity::shared);
    context.register_repository("WidgetRepository", |ctx| {
        EntitiesRepository::builder("WidgetRepository", ctx.clone())
            .use_transactions(false)
            .default_query_factory(|| {
                let records = (1..=3).map(make_record).collect();
                let query: QueryRef =
                    Rc::new(RefCell::new(StubQuery::with_records("widgets", records)));
                query
            })
            .build()
    });
    context.repository("WidgetRepository").unwrap()
}

fn entity_id(found: &FoundValue) -> serde_json::Value {
    let entity = found.as_entity().expect("expected an entity result");
    let id = entity.borrow().get_id();
    id
}

#[test]
fn test_all_converts_records_to_entities() {
    let repository = widget_repository();
    let found = repository.find().unwrap().all().unwrap();

    assert_eq!(found.len(), 3);
    let ids: Vec<_> = found.iter().map(entity_id).collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_one_converts_the_first_row() {
    let repository = widget_repository();
    let found = repository.find().unwrap().one().unwrap().unwrap();
    assert_eq!(entity_id(&found), json!(1));
}

#[test]
fn test_one_with_pk_finds_the_matching_row() {
    let repository = widget_repository();

    let found = repository.find_one_with_pk(&json!(2)).unwrap().unwrap();
    assert_eq!(entity_id(&found), json!(2));

    assert!(repository.find_one_with_pk(&json!(99)).unwrap().is_none());
}

#[test]
fn test_fluent_chain_shapes_the_query() {
    let repository = widget_repository();
    let mut finder = repository.find().unwrap();
    finder.offset(1).limit(1).order_by("name", true);

    let found = finder.all().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(entity_id(&found[0]), json!(2));
}

#[test]
fn test_projection_mode_yields_raw_rows() {
    let repository = widget_repository();
    let mut finder = repository.find().unwrap();
    finder.as_array(true);

    let found = finder.all().unwrap();
    assert_eq!(found.len(), 3);
    let row = found[0].as_raw().expect("expected a raw row");
    assert_eq!(row["id"], json!(1));
    assert_eq!(row["name"], json!("widget 1"));
}

#[test]
fn test_count_delegates_to_the_query() {
    let repository = widget_repository();
    assert_eq!(repository.find().unwrap().count().unwrap(), 3);
}

#[test]
fn test_each_streams_one_entity_per_step() {
    let repository = widget_repository();
    let results = repository.each(2).unwrap();
    assert_eq!(results.mode(), IterationMode::Streamed);

    let mut ids = Vec::new();
    for item in results {
        match item.unwrap() {
            SearchItem::One(found) => ids.push(entity_id(&found)),
            SearchItem::Page(_) => panic!("streamed cursor must not yield pages"),
        }
    }
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_batch_yields_pages() {
    let repository = widget_repository();
    let results = repository.batch(2).unwrap();
    assert_eq!(results.mode(), IterationMode::Batched);

    let mut page_sizes = Vec::new();
    for item in results {
        match item.unwrap() {
            SearchItem::Page(page) => page_sizes.push(page.len()),
            SearchItem::One(_) => panic!("batched cursor must not yield single rows"),
        }
    }
    assert_eq!(page_sizes, vec![2, 1]);
}

#[test]
fn test_search_result_supports_manual_cursor_protocol() {
    let repository = widget_repository();
    let mut results = repository.each(10).unwrap();

    results.rewind();
    assert!(results.valid());
    assert_eq!(results.key(), 0);
    match results.current().unwrap().unwrap() {
        SearchItem::One(found) => assert_eq!(entity_id(&found), json!(1)),
        SearchItem::Page(_) => panic!("streamed cursor must not yield pages"),
    }

    results.advance();
    assert_eq!(results.key(), 1);
    results.advance();
    results.advance();
    assert!(!results.valid());
    assert!(results.current().is_none());
}

#[test]
fn test_provider_pages_and_counts() {
    let repository = widget_repository();
    let mut provider = repository.entities_provider().unwrap();
    provider.set_page_size(2);

    assert_eq!(provider.total_count().unwrap(), 3);
    assert_eq!(provider.page_count().unwrap(), 2);

    let first_page = provider.models().unwrap();
    assert_eq!(first_page.len(), 2);
    assert_eq!(entity_id(&first_page[0]), json!(1));

    provider.set_page(1);
    let second_page = provider.models().unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(entity_id(&second_page[0]), json!(3));
}
