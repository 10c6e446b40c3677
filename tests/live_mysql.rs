#![cfg(feature = "mysql")]
//! Runs against a real server when `MYSQL_BOUNDED_IO_TEST_HOST` is set; skipped otherwise.
//! Also reads `MYSQL_BOUNDED_IO_TEST_PORT`, `_DATABASE`, `_USER` and `_PASSWORD`.

use std::sync::Arc;

use mysql_bounded_io::prelude::*;

fn env_or(key: &str, default: &str) -> String {
    std::env::var(format!("MYSQL_BOUNDED_IO_TEST_{key}")).unwrap_or_else(|_| default.to_string())
}

fn live_config() -> Option<MysqlConfig> {
    let host = std::env::var("MYSQL_BOUNDED_IO_TEST_HOST").ok()?;
    let port = env_or("PORT", "3306").parse().ok()?;
    Some(
        MysqlConfig::new(
            host,
            env_or("DATABASE", "test"),
            env_or("USER", "root"),
            env_or("PASSWORD", ""),
        )
        .with_port(port),
    )
}

#[test]
fn write_then_read_back() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = live_config() else {
        eprintln!("MYSQL_BOUNDED_IO_TEST_HOST not set; skipping live test");
        return Ok(());
    };
    let client = MysqlClient::mysql(config);

    // DDL is outside the writer's scope; run it through a raw session.
    let mut ddl = client.open_session()?;
    ddl.fetch_all("DROP TABLE IF EXISTS bounded_io_live")?;
    ddl.fetch_all("CREATE TABLE bounded_io_live (id INT PRIMARY KEY, name VARCHAR(32))")?;
    ddl.close();

    let mut writer = BatchWriter::open(
        &client,
        WriteOptions::new("bounded_io_live").with_batch_size(3).with_upsert(true),
    )?;
    for id in 0..10 {
        writer.write(&Row::from_pairs([
            ("id", RowValues::Int(id)),
            ("name", RowValues::from(format!("n{id}"))),
        ]))?;
    }
    writer.write(&Row::from_pairs([
        ("id", RowValues::Int(0)),
        ("name", RowValues::from("updated")),
    ]))?;
    assert_eq!(writer.finish()?, 11);

    let source = MysqlSource::new(
        client,
        ReadOptions::new("SELECT id, name FROM bounded_io_live ORDER BY id"),
    )?;
    let tracker = Arc::new(source.get_range_tracker(Some(0), Some(10)));
    let rows: Vec<Row> = source.read(tracker)?.collect::<Result<_, _>>()?;
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0].get("name").and_then(RowValues::as_text), Some("updated"));
    Ok(())
}
