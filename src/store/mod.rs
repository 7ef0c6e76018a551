// Table store: `DB`/`Table`/`ColumnConfig`/row CRUD (`spec.md` §4.5). Grounded
// on `examples/original_source/internal_db_functions.go`'s `DBTable`,
// `RowValue`, `addTableRow`, `getRowValue`, and `getColumnHeaders`, plus
// `front_functions.go`'s `primeTable` load-once-then-attach pattern. Rows are
// flat JSON objects rather than the source's `ColumnValues` vector — an
// equivalent shape, friendlier to `serde_json`.

use crate::config::Config;
use crate::crypto;
use crate::error::{DbError, Result};
use crate::query::{Clause, Query};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub column_name: String,
    pub type_tag: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<ColumnConfig>,
    pub primary_key_name: String,
    pub auto_increment: bool,
    pub next_id: i64,
    pub rows: Vec<Row>,
}

impl Table {
    fn find_column(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|c| c.column_name == name)
    }

    /// `addTableRow` (`spec.md` §4.5 item 3).
    pub fn add_row(&mut self, mut supplied: Row) -> Result<Row> {
        let mut row = Row::new();

        for column in self.columns.clone() {
            let is_pk = column.column_name == self.primary_key_name;
            match supplied.remove(&column.column_name) {
                Some(value) => {
                    row.insert(column.column_name.clone(), value);
                }
                None if is_pk && self.auto_increment && !column.nullable => {
                    row.insert(column.column_name.clone(), Value::from(self.next_id));
                    self.next_id += 1;
                }
                None if column.nullable => {
                    row.insert(column.column_name.clone(), Value::Null);
                }
                None => {
                    return Err(DbError::NullViolation(column.column_name.clone()));
                }
            }
        }

        self.rows.push(row.clone());
        Ok(row)
    }

    /// `UpdateTableRow` (`spec.md` §4.5 item 4) — the first matching row is
    /// updated and the scan stops there; the source tolerates partial
    /// matches across the table.
    pub fn update_row(&mut self, query: &Query) -> Result<usize> {
        for row in self.rows.iter_mut() {
            let matches = row_matches(row, &query.arg_clause)?;
            if matches {
                for (name, value) in &query.options_clause {
                    if row.contains_key(name) {
                        row.insert(name.clone(), value.clone());
                    }
                }
                return Ok(1);
            }
        }
        Err(DbError::NotFound(format!("no row in table {} matched the query", self.name)))
    }

    /// `RemoveTableRow` (`spec.md` §4.5 item 5) — same matching rule as
    /// `update_row`, including propagating `BadOperator` for an unsupported
    /// operator rather than treating it as a non-match.
    pub fn remove_row(&mut self, query: &Query) -> Result<usize> {
        let mut matched_index = None;
        for (index, row) in self.rows.iter().enumerate() {
            if row_matches(row, &query.arg_clause)? {
                matched_index = Some(index);
                break;
            }
        }

        match matched_index {
            Some(index) => {
                self.rows.remove(index);
                Ok(1)
            }
            None => Err(DbError::NotFound(format!("no row in table {} matched the query", self.name))),
        }
    }

    /// `getRowValue` / `getColumnHeaders` projection (`spec.md` §4.5 item 6).
    /// `["*"]` (or an empty list) means every column.
    pub fn project_rows(&self, column_names: &[String]) -> Vec<Row> {
        let wildcard = column_names.is_empty() || column_names.iter().any(|c| c == "*");

        self.rows
            .iter()
            .map(|row| {
                if wildcard {
                    row.clone()
                } else {
                    let mut projected = Row::new();
                    for name in column_names {
                        if let Some(value) = row.get(name) {
                            projected.insert(name.clone(), value.clone());
                        }
                    }
                    projected
                }
            })
            .collect()
    }
}

fn row_matches(row: &Row, clauses: &[Clause]) -> Result<bool> {
    for clause in clauses {
        if clause.operator != "=" {
            return Err(DbError::BadOperator(format!("unsupported operator: {}", clause.operator)));
        }

        let direct = row.get(&clause.left).map(|v| value_as_str(v) == clause.right).unwrap_or(false);
        let symmetric = row.get(&clause.right).map(|v| value_as_str(v) == clause.left).unwrap_or(false);

        if !(direct || symmetric) {
            return Ok(false);
        }
    }
    Ok(true)
}

fn value_as_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_tag_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The collection of tables currently attached in memory.
#[derive(Debug, Clone, Default)]
pub struct DB {
    pub tables: Vec<Table>,
}

impl DB {
    pub fn new() -> Self {
        Self::default()
    }

    fn table_index(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|t| t.name == name)
    }

    /// `createTable` (`spec.md` §4.5 item 1).
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnConfig>,
        primary_key_name: &str,
        auto_increment: bool,
    ) -> Result<()> {
        if self.table_index(name).is_some() {
            return Err(DbError::Duplicate(format!("table already exists: {name}")));
        }

        self.tables.push(Table {
            name: name.into(),
            columns,
            primary_key_name: primary_key_name.into(),
            auto_increment,
            next_id: 1,
            rows: Vec::new(),
        });
        Ok(())
    }

    /// `createTableFromMap` (`spec.md` §4.5 item 2) — derives column
    /// configuration from a sample row.
    pub fn create_table_from_map(
        &mut self,
        name: &str,
        primary_key_name: &str,
        auto_increment: bool,
        sample_row: &Row,
    ) -> Result<()> {
        if !sample_row.contains_key(primary_key_name) {
            return Err(DbError::SchemaMismatch(format!(
                "primary key {primary_key_name} is not present in the sample row"
            )));
        }

        let columns = sample_row
            .iter()
            .map(|(name, value)| ColumnConfig {
                column_name: name.clone(),
                type_tag: type_tag_of(value).into(),
                nullable: value.is_null(),
            })
            .collect();

        self.create_table(name, columns, primary_key_name, auto_increment)
    }

    pub fn table(&self, name: &str) -> Result<&Table> {
        self.table_index(name)
            .map(|i| &self.tables[i])
            .ok_or_else(|| DbError::NotFound(format!("no table was found with the name: {name}")))
    }

    pub fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        let idx = self
            .table_index(name)
            .ok_or_else(|| DbError::NotFound(format!("no table was found with the name: {name}")))?;
        Ok(&mut self.tables[idx])
    }

    pub fn drop_table(&mut self, name: &str) -> Result<()> {
        let before = self.tables.len();
        self.tables.retain(|t| t.name != name);
        if self.tables.len() == before {
            return Err(DbError::NotFound(format!("no table was found with the name: {name}")));
        }
        Ok(())
    }

    /// `primeTable`: attaches `name` from disk if it is not already resident,
    /// returning its index. De-duplicates so repeated priming never appends
    /// a second copy of the same table (`spec.md` §4.5 persistence note).
    pub fn prime_table(&mut self, config: &Config, key: &[u8], name: &str) -> Result<usize> {
        if let Some(idx) = self.table_index(name) {
            return Ok(idx);
        }

        let table = load_table(config, key, name)?;
        self.tables.push(table);
        Ok(self.tables.len() - 1)
    }

    pub fn save_tables(&self, config: &Config, key: &[u8]) -> Result<()> {
        std::fs::create_dir_all(config.stores_dir())?;
        for table in &self.tables {
            save_table(config, key, table)?;
        }
        Ok(())
    }
}

fn load_table(config: &Config, key: &[u8], name: &str) -> Result<Table> {
    let path = config.stores_dir().join(format!("{name}.dat"));
    let ciphertext = std::fs::read(&path)?;
    let plaintext = crypto::decrypt(key, &ciphertext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

fn save_table(config: &Config, key: &[u8], table: &Table) -> Result<()> {
    let path = config.stores_dir().join(format!("{}.dat", table.name));
    let plaintext = serde_json::to_vec(table)?;
    let ciphertext = crypto::encrypt(key, &plaintext)?;
    std::fs::write(&path, ciphertext)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::model::PermOp;
    use tempfile::tempdir;

    fn sample_table() -> Table {
        Table {
            name: "t".into(),
            columns: vec![
                ColumnConfig { column_name: "id".into(), type_tag: "int".into(), nullable: false },
                ColumnConfig { column_name: "name".into(), type_tag: "string".into(), nullable: false },
            ],
            primary_key_name: "id".into(),
            auto_increment: true,
            next_id: 1,
            rows: Vec::new(),
        }
    }

    fn row(pairs: &[(&str, Value)]) -> Row {
        let mut row = Row::new();
        for (k, v) in pairs {
            row.insert((*k).to_string(), v.clone());
        }
        row
    }

    #[test]
    fn add_row_assigns_auto_increment_primary_key() {
        let mut table = sample_table();
        let first = table.add_row(row(&[("name", Value::String("a".into()))])).unwrap();
        assert_eq!(first.get("id").unwrap(), &Value::from(1));
        let second = table.add_row(row(&[("name", Value::String("b".into()))])).unwrap();
        assert_eq!(second.get("id").unwrap(), &Value::from(2));
        assert_eq!(table.next_id, 3);
    }

    #[test]
    fn add_row_fails_null_violation_on_missing_non_nullable() {
        let mut table = sample_table();
        let err = table.add_row(Row::new()).unwrap_err();
        assert!(matches!(err, DbError::NullViolation(_)));
    }

    #[test]
    fn create_table_from_map_derives_columns_and_checks_primary_key() {
        let mut db = DB::new();
        let sample = row(&[("id", Value::from(1)), ("email", Value::Null)]);
        db.create_table_from_map("users", "id", true, &sample).unwrap();
        let table = db.table("users").unwrap();
        assert_eq!(table.columns.len(), 2);
        let email_col = table.find_column("email").unwrap();
        assert!(email_col.nullable);

        let mut db2 = DB::new();
        let err = db2.create_table_from_map("users", "missing", true, &sample).unwrap_err();
        assert!(matches!(err, DbError::SchemaMismatch(_)));
    }

    #[test]
    fn update_row_matches_in_either_direction_and_overwrites_present_columns() {
        use crate::query::query_breakdown;
        let mut table = sample_table();
        table.add_row(row(&[("name", Value::String("a".into()))])).unwrap();

        let query = query_breakdown("PUT name=z TO t WHERE id = 1").unwrap();
        table.update_row(&query).unwrap();
        assert_eq!(table.rows[0].get("name").unwrap(), &Value::String("z".into()));
    }

    #[test]
    fn remove_row_deletes_first_match_and_errors_when_no_match() {
        use crate::query::query_breakdown;
        let mut table = sample_table();
        table.add_row(row(&[("name", Value::String("a".into()))])).unwrap();

        let query = query_breakdown("DELETE FROM t WHERE id = 1").unwrap();
        table.remove_row(&query).unwrap();
        assert!(table.rows.is_empty());

        let err = table.remove_row(&query).unwrap_err();
        assert!(matches!(err, DbError::NotFound(_)));
    }

    #[test]
    fn project_rows_supports_wildcard_and_explicit_columns() {
        let mut table = sample_table();
        table.add_row(row(&[("name", Value::String("a".into()))])).unwrap();

        let wildcard = table.project_rows(&[]);
        assert_eq!(wildcard[0].len(), 2);

        let narrow = table.project_rows(&["name".to_string()]);
        assert_eq!(narrow[0].len(), 1);
        assert!(narrow[0].contains_key("name"));
    }

    #[test]
    fn bad_operator_in_where_clause_is_rejected() {
        let mut table = sample_table();
        table.add_row(row(&[("name", Value::String("a".into()))])).unwrap();
        let query = Query {
            table_name: "t".into(),
            column_names: vec![],
            op: PermOp::Delete,
            arg_clause: vec![Clause { left: "id".into(), operator: ">".into(), right: "0".into() }],
            options_clause: Map::new(),
        };
        let err = table.remove_row(&query).unwrap_err();
        assert!(matches!(err, DbError::BadOperator(_)));
    }

    #[test]
    fn prime_table_loads_once_and_reuses_resident_index() {
        let dir = tempdir().unwrap();
        let config = Config { data_dir: dir.path().to_path_buf(), ..Config::default() };
        let key = crypto::ensure_key(&config.key_path()).unwrap();

        let mut db = DB::new();
        db.create_table("t", vec![], "id", false).unwrap();
        db.save_tables(&config, &key).unwrap();

        let mut reloaded = DB::new();
        let idx_a = reloaded.prime_table(&config, &key, "t").unwrap();
        let idx_b = reloaded.prime_table(&config, &key, "t").unwrap();
        assert_eq!(idx_a, idx_b);
        assert_eq!(reloaded.tables.len(), 1);
    }
}
