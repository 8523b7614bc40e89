//! LocalStorage against a temporary directory.

use apify_client::DatasetItem;
use instagram_keyword_scout::{LocalStorage, RunStorage, ScoutError};
use serde_json::{json, Value};

fn item(v: Value) -> DatasetItem {
    v.as_object().cloned().unwrap()
}

#[tokio::test]
async fn values_round_trip_and_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    assert!(storage.get_value("SUMMARY").await.unwrap().is_none());

    storage
        .set_value("SUMMARY", &json!({ "totalItems": 1 }))
        .await
        .unwrap();
    storage
        .set_value("SUMMARY", &json!({ "totalItems": 2 }))
        .await
        .unwrap();

    assert_eq!(
        storage.get_value("SUMMARY").await.unwrap(),
        Some(json!({ "totalItems": 2 }))
    );
    assert!(dir
        .path()
        .join("key_value_stores/default/SUMMARY.json")
        .exists());
}

#[tokio::test]
async fn input_record_is_read_from_store_dir() {
    let dir = tempfile::tempdir().unwrap();
    let store = dir.path().join("key_value_stores/default");
    std::fs::create_dir_all(&store).unwrap();
    std::fs::write(store.join("INPUT.json"), r#"{ "search": "coffee" }"#).unwrap();

    let storage = LocalStorage::new(dir.path());
    assert_eq!(
        storage.get_value("INPUT").await.unwrap(),
        Some(json!({ "search": "coffee" }))
    );
}

#[tokio::test]
async fn records_append_with_continuing_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    storage
        .push_records(&[item(json!({ "n": 0 })), item(json!({ "n": 1 }))])
        .await
        .unwrap();
    storage
        .push_records(&[item(json!({ "n": 2 }))])
        .await
        .unwrap();

    let dataset = dir.path().join("datasets/default");
    let mut names: Vec<String> = std::fs::read_dir(&dataset)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["000000001.json", "000000002.json", "000000003.json"]
    );

    let third: Value =
        serde_json::from_slice(&std::fs::read(dataset.join("000000003.json")).unwrap()).unwrap();
    assert_eq!(third, json!({ "n": 2 }));
}

#[tokio::test]
async fn keys_cannot_escape_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let storage = LocalStorage::new(dir.path());

    for key in ["../INPUT", "a/b", "", ".hidden"] {
        let err = storage.set_value(key, &json!(1)).await.unwrap_err();
        assert!(matches!(err, ScoutError::Storage(_)), "{key:?}");
    }
}
