// PULL/PUSH/PUT/DELETE DSL tokenizer (`spec.md` §4.6). Grounded on
// `examples/original_source/internal_db_functions.go`'s `queryBreakdown` —
// preserves the four op keywords, the required-clause table, and the
// comma-optional `name=value` / `name =value` / `name= value` spacing
// variants it documents, expressed as a real tokenizer per the `spec.md`
// §9 recommendation rather than the source's token-index walk.

use crate::error::{DbError, Result};
use crate::rbac::model::PermOp;
use serde_json::{Map, Value};
use std::str::FromStr;

/// A single `WHERE` condition: `left <operator> right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub left: String,
    pub operator: String,
    pub right: String,
}

/// A parsed query sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table_name: String,
    pub column_names: Vec<String>,
    pub op: PermOp,
    pub arg_clause: Vec<Clause>,
    pub options_clause: Map<String, Value>,
}

const VALID_OPERATORS: &[char] = &['=', '%'];

/// Parses a single UTF-8 line into a structured [`Query`].
pub fn query_breakdown(query: &str) -> Result<Query> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    if tokens.is_empty() {
        return Err(DbError::QueryShape("empty query".into()));
    }

    let op = PermOp::from_str(tokens[0])
        .map_err(|_| DbError::QueryShape(format!("{} is not a valid operation type", tokens[0])))?;

    let required: &[&str] = match op {
        PermOp::Pull => &["FROM"],
        PermOp::Push => &["TO"],
        PermOp::Put => &["TO", "WHERE"],
        PermOp::Delete => &["FROM"],
    };

    for clause_keyword in required {
        if !tokens.iter().any(|t| t == clause_keyword) {
            return Err(DbError::QueryShape(format!("no {clause_keyword} statement was included in the query")));
        }
    }

    let table_keyword = match op {
        PermOp::Pull | PermOp::Delete => "FROM",
        PermOp::Push | PermOp::Put => "TO",
    };

    let table_index = tokens
        .iter()
        .position(|t| *t == table_keyword)
        .ok_or_else(|| DbError::QueryShape(format!("no {table_keyword} statement was included in the query")))?;

    let table_name = tokens
        .get(table_index + 1)
        .ok_or_else(|| DbError::QueryShape(format!("no table name followed {table_keyword}")))?
        .to_string();

    let fields_tokens = &tokens[1..table_index];

    let mut column_names = Vec::new();
    let mut options_clause = Map::new();

    match op {
        PermOp::Pull => {
            for segment in join_and_split_commas(fields_tokens) {
                column_names.push(segment.trim().to_string());
            }
        }
        PermOp::Push | PermOp::Put => {
            for segment in join_and_split_commas(fields_tokens) {
                let (name, value) = split_assignment(&segment)?;
                options_clause.insert(name, Value::String(value));
            }
        }
        PermOp::Delete => {}
    }

    let mut arg_clause = Vec::new();
    if let Some(where_index) = tokens.iter().position(|t| *t == "WHERE") {
        let sort_index = tokens[where_index + 1..]
            .iter()
            .position(|t| *t == "SORT")
            .map(|i| where_index + 1 + i)
            .unwrap_or(tokens.len());

        let where_tokens = &tokens[where_index + 1..sort_index];
        arg_clause = split_where_clauses(where_tokens)?;
    }

    Ok(Query { table_name, column_names, op, arg_clause, options_clause })
}

fn join_and_split_commas(tokens: &[&str]) -> Vec<String> {
    let joined = tokens.join(" ");
    joined.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
}

/// Splits a single `name=value` assignment, tolerating the three spacing
/// shapes `name=value`, `name =value`, `name= value`.
fn split_assignment(segment: &str) -> Result<(String, String)> {
    let idx = segment
        .find('=')
        .ok_or_else(|| DbError::QueryShape(format!("malformed assignment: {segment}")))?;
    let name = segment[..idx].trim().to_string();
    let value = segment[idx + 1..].trim().to_string();
    if name.is_empty() {
        return Err(DbError::QueryShape(format!("malformed assignment: {segment}")));
    }
    Ok((name, value))
}

fn split_where_clauses(tokens: &[&str]) -> Result<Vec<Clause>> {
    let mut groups: Vec<Vec<&str>> = vec![Vec::new()];
    for tok in tokens {
        if tok.eq_ignore_ascii_case("AND") {
            groups.push(Vec::new());
        } else {
            groups.last_mut().unwrap().push(tok);
        }
    }

    groups
        .into_iter()
        .filter(|g| !g.is_empty())
        .map(|g| parse_clause(&g.join(" ")))
        .collect()
}

fn parse_clause(clause: &str) -> Result<Clause> {
    let pos = clause
        .find(VALID_OPERATORS)
        .ok_or_else(|| DbError::BadOperator(format!("no operator found in clause: {clause}")))?;

    let operator = clause[pos..=pos].to_string();
    if !VALID_OPERATORS.contains(&operator.chars().next().unwrap()) {
        return Err(DbError::BadOperator(format!("unsupported operator: {operator}")));
    }

    let left = clause[..pos].trim().to_string();
    let right = clause[pos + 1..].trim().to_string();

    if left.is_empty() || right.is_empty() {
        return Err(DbError::BadOperator(format!("malformed clause: {clause}")));
    }

    Ok(Clause { left, operator, right })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_push_with_fully_spaced_assignments() {
        let query = query_breakdown("PUSH Username = bob, Password = pw TO Users").unwrap();
        assert_eq!(query.op, PermOp::Push);
        assert_eq!(query.table_name, "Users");
        assert_eq!(query.options_clause.get("Username").unwrap(), "bob");
        assert_eq!(query.options_clause.get("Password").unwrap(), "pw");
        assert!(query.arg_clause.is_empty());
    }

    #[test]
    fn recognizes_all_three_assignment_spacing_shapes() {
        let query = query_breakdown("PUSH a=1, b= 2, c =3 TO t").unwrap();
        assert_eq!(query.options_clause.get("a").unwrap(), "1");
        assert_eq!(query.options_clause.get("b").unwrap(), "2");
        assert_eq!(query.options_clause.get("c").unwrap(), "3");
    }

    #[test]
    fn pull_omitting_from_fails_with_query_shape() {
        let err = query_breakdown("PULL Name").unwrap_err();
        assert!(matches!(err, DbError::QueryShape(_)));
    }

    #[test]
    fn pull_single_column_without_comma() {
        let query = query_breakdown("PULL Name FROM t").unwrap();
        assert_eq!(query.column_names, vec!["Name".to_string()]);
    }

    #[test]
    fn pull_wildcard_and_multiple_columns() {
        let wildcard = query_breakdown("PULL * FROM t").unwrap();
        assert_eq!(wildcard.column_names, vec!["*".to_string()]);

        let multi = query_breakdown("PULL Name, Age FROM t").unwrap();
        assert_eq!(multi.column_names, vec!["Name".to_string(), "Age".to_string()]);
    }

    #[test]
    fn unknown_op_is_query_shape_error() {
        let err = query_breakdown("FETCH Name FROM t").unwrap_err();
        assert!(matches!(err, DbError::QueryShape(_)));
    }

    #[test]
    fn put_requires_to_and_where() {
        let err = query_breakdown("PUT a=1 TO t").unwrap_err();
        assert!(matches!(err, DbError::QueryShape(_)));

        let query = query_breakdown("PUT a=1 TO t WHERE id = 5").unwrap();
        assert_eq!(query.arg_clause, vec![Clause { left: "id".into(), operator: "=".into(), right: "5".into() }]);
    }

    #[test]
    fn where_supports_multiple_anded_clauses() {
        let query = query_breakdown("PUT a=1 TO t WHERE id = 5 AND name % bob").unwrap();
        assert_eq!(query.arg_clause.len(), 2);
        assert_eq!(query.arg_clause[1].operator, "%");
    }

    #[test]
    fn delete_requires_from() {
        let query = query_breakdown("DELETE FROM t WHERE id = 5").unwrap();
        assert_eq!(query.op, PermOp::Delete);
        assert_eq!(query.table_name, "t");
    }

    #[test]
    fn bad_operator_is_rejected() {
        let err = query_breakdown("PUT a=1 TO t WHERE id > 5").unwrap_err();
        // '>' is not a recognized operator so the whole clause fails to find
        // one of the valid operator characters.
        assert!(matches!(err, DbError::BadOperator(_)));
    }
}
