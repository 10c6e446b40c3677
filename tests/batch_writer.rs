use std::collections::HashMap;

use mysql_bounded_io::prelude::*;
use mysql_bounded_io::test_utils::{MockConnector, MockEvent};
use serde_json::json;

const BATCH_SIZE: usize = 4;

fn client(connector: &MockConnector) -> MysqlClient<MockConnector> {
    let config = HashMap::from([
        ("host".to_string(), json!("localhost")),
        ("port".to_string(), json!(3306)),
        ("database".to_string(), json!("shop")),
        ("user".to_string(), json!("writer")),
        ("password".to_string(), json!("secret")),
    ]);
    MysqlClient::from_map(connector.clone(), &config).expect("exact key set")
}

fn user(id: i64) -> Row {
    Row::from_pairs([("id", RowValues::Int(id)), ("name", RowValues::from(format!("user-{id}")))])
}

#[test]
fn exactly_batch_size_rows_flush_once() {
    let connector = MockConnector::new();
    let mut writer =
        BatchWriter::open(&client(&connector), WriteOptions::new("users").with_batch_size(BATCH_SIZE))
            .unwrap();
    for id in 0..BATCH_SIZE as i64 {
        writer.write(&user(id)).unwrap();
    }
    assert!(writer.pending().is_empty());

    let batches = connector.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, "INSERT INTO shop.users (id, name) VALUES (?, ?)");
    assert_eq!(batches[0].1.len(), BATCH_SIZE);

    assert_eq!(
        connector.events(),
        vec![
            MockEvent::Connect,
            MockEvent::Begin,
            MockEvent::ExecBatch {
                statement: "INSERT INTO shop.users (id, name) VALUES (?, ?)".to_string(),
                rows: BATCH_SIZE,
            },
            MockEvent::Commit,
        ]
    );
}

#[test]
fn one_extra_row_is_flushed_on_finish() {
    let connector = MockConnector::new();
    let mut writer = BatchWriter::open(
        &client(&connector),
        WriteOptions::new("users").with_batch_size(BATCH_SIZE).with_upsert(true),
    )
    .unwrap();
    for id in 0..=BATCH_SIZE as i64 {
        writer.write(&user(id)).unwrap();
    }
    assert_eq!(writer.pending().len(), 1);
    assert_eq!(writer.finish().unwrap(), BATCH_SIZE as u64 + 1);

    let batches = connector.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(
        batches[1].1,
        vec![vec![RowValues::Int(BATCH_SIZE as i64), RowValues::from("user-4")]]
    );
    assert!(
        batches[1]
            .0
            .contains("ON DUPLICATE KEY UPDATE id = VALUES(id), name = VALUES(name)")
    );
    assert_eq!(connector.events().last(), Some(&MockEvent::Close));
}

#[test]
fn failed_flush_rolls_back_before_error_and_keeps_rows() {
    let connector = MockConnector::new().fail_exec_batch();
    let mut writer =
        BatchWriter::open(&client(&connector), WriteOptions::new("users").with_batch_size(2)).unwrap();
    writer.write(&user(1)).unwrap();
    let err = writer.write(&user(2)).unwrap_err();

    assert!(matches!(err, MysqlClientError::ExecutionError { .. }));
    assert_eq!(err.query(), Some("INSERT INTO shop.users (id, name) VALUES (?, ?)"));
    assert_eq!(writer.pending().len(), 2);

    let events = connector.events();
    let exec = events
        .iter()
        .position(|e| matches!(e, MockEvent::ExecBatch { .. }))
        .unwrap();
    assert_eq!(events[exec + 1], MockEvent::Rollback);
    assert!(!events.contains(&MockEvent::Commit));
}

#[test]
fn connect_failure_surfaces_as_connection_error() {
    let connector = MockConnector::new().fail_connect();
    let err = BatchWriter::open(&client(&connector), WriteOptions::new("users")).err();
    assert!(matches!(err, Some(MysqlClientError::ConnectionError { .. })));
}
