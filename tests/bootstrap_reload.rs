// Bootstrap-then-reload integration test: a fresh data directory bootstraps
// base policies/roles once, and a second process pointed at the same
// directory reloads the same catalog rather than re-bootstrapping.

use tempfile::tempdir;
use untold::config::Config;
use untold::crypto;
use untold::session::Untold;

fn test_config(dir: &std::path::Path) -> Config {
    Config { data_dir: dir.to_path_buf(), ..Config::default() }
}

#[test]
fn bootstrap_then_reload_preserves_catalog_and_ids() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let key = crypto::ensure_key(&config.key_path()).unwrap();

    let mut first = Untold::init(config.clone(), key.clone(), false).unwrap();
    first.create_user("alice", "pw").unwrap();
    first.save_and_exit().unwrap();

    let mut second = Untold::init(config, key, false).unwrap();
    let public = second.user_login("alice", "pw").unwrap();
    assert_eq!(public.username, "alice");

    // The base roster (3 base policies, 15 base roles) must not be
    // re-bootstrapped on the second load.
    let second_user = second.create_user("bob", "pw").unwrap();
    assert!(second_user.user_id > 1);
}

#[test]
fn table_rows_persist_across_sessions() {
    use serde_json::Value;
    use untold::store::{ColumnConfig, Row};

    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let key = crypto::ensure_key(&config.key_path()).unwrap();

    let mut first = Untold::init(config.clone(), key.clone(), false).unwrap();
    let columns = vec![
        ColumnConfig { column_name: "id".into(), type_tag: "int".into(), nullable: false },
        ColumnConfig { column_name: "name".into(), type_tag: "string".into(), nullable: false },
    ];
    first.create_database_table("people", columns, "id").unwrap();
    let mut row = Row::new();
    row.insert("name".into(), Value::String("ann".into()));
    first.add_table_row("people", row).unwrap();
    first.save_and_exit().unwrap();

    let mut second = Untold::init(config, key, false).unwrap();
    let rows = second.get_table_values("people", "PULL * FROM people").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name").unwrap(), &Value::String("ann".into()));
}
