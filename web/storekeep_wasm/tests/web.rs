//! Browser tests, run with `wasm-pack test --headless --firefox`.

#![cfg(target_arch = "wasm32")]

use storekeep_codec::{Key, Value};
use storekeep_core::{CollectionConfig, DbManager, ErrorKind, ReadQuery, ReadResult};
use storekeep_host::{HostConnection, HostEngine, OpenRequest};
use storekeep_wasm::IdbHost;
use std::sync::Arc;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

async fn fresh(name: &str) -> DbManager<IdbHost> {
    let host = IdbHost::new().expect("IndexedDB should be available");
    host.delete_database(name)
        .await
        .expect("Failed to delete database");
    #[allow(clippy::arc_with_non_send_sync)]
    let host = Arc::new(host);
    DbManager::new(host, name).expect("Failed to create manager")
}

fn user(name: &str, email: &str) -> Value {
    Value::from_pairs([("name", Value::from(name)), ("email", Value::from(email))])
}

#[wasm_bindgen_test]
async fn users_with_unique_email() {
    let db = fresh("storekeep-users").await;
    db.create_collection(
        "users",
        CollectionConfig::new().auto_increment().index("email", true),
    )
    .await
    .unwrap();

    let key = db.put("users", user("A", "a@x.com"), None).await.unwrap();
    assert_eq!(key, Key::Integer(1));

    let found = db
        .read("users", ReadQuery::index("by_email", "a@x.com"))
        .await
        .unwrap();
    assert_eq!(found, ReadResult::Single(Some(user("A", "a@x.com"))));

    let err = db
        .put("users", user("B", "a@x.com"), None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(db.count("users").await.unwrap(), 1);
}

#[wasm_bindgen_test]
async fn schema_changes_bump_the_version() {
    let db = fresh("storekeep-schema").await;
    db.create_collection("notes", CollectionConfig::new())
        .await
        .unwrap();
    assert_eq!(db.version().await.unwrap(), 2);

    let err = db
        .create_collection("notes", CollectionConfig::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateCollection);

    db.delete_collection("notes").await.unwrap();
    assert!(db.collection_names().await.unwrap().is_empty());
    assert_eq!(db.version().await.unwrap(), 3);
}

#[wasm_bindgen_test]
async fn records_round_trip_through_the_browser() {
    let db = fresh("storekeep-records").await;
    db.create_collection("notes", CollectionConfig::new())
        .await
        .unwrap();

    let note = Value::from_pairs([
        ("text", Value::from("hello")),
        ("count", Value::from(3)),
        ("price", Value::Float(9.99)),
        ("raw", Value::from(vec![1u8, 2, 3])),
    ]);
    db.put("notes", note.clone(), Some(Key::from("n1")))
        .await
        .unwrap();
    let found = db.read("notes", ReadQuery::key("n1")).await.unwrap();
    assert_eq!(found.into_single(), Some(note));

    let key = db
        .put("notes", Value::from("half"), Some(Key::Float(0.5)))
        .await
        .unwrap();
    assert_eq!(key, Key::Float(0.5));
    let found = db.read("notes", ReadQuery::Key(Key::Float(0.5))).await.unwrap();
    assert_eq!(found.into_single(), Some(Value::from("half")));

    let err = db.put("notes", Value::Null, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::KeyRequired);

    db.delete_all("notes").await.unwrap();
    assert_eq!(db.count("notes").await.unwrap(), 0);
}

#[wasm_bindgen_test]
async fn failed_upgrade_is_rolled_back() {
    let host = IdbHost::new().unwrap();
    host.delete_database("storekeep-abort").await.unwrap();
    let result = host
        .open(
            "storekeep-abort",
            OpenRequest::upgrade(1, |_editor: &mut dyn storekeep_host::SchemaEditor, _| {
                Err(storekeep_host::HostError::data("refused"))
            }),
        )
        .await;
    assert!(matches!(
        result,
        Err(storekeep_host::HostError::UpgradeAborted { .. })
    ));

    let connection = host
        .open("storekeep-abort", OpenRequest::current())
        .await
        .unwrap();
    assert_eq!(connection.version(), 1);
    assert!(connection.object_store_names().is_empty());
    connection.close();
}
