// Dispatches a validated `Request` onto the `Untold` session facade
// (`spec.md` §4.8 items 3-5). Grounded on the source's request-type switch
// in its socket handler and its "no items" / success-string / JSON-body
// response convention.

use crate::error::{DbError, Result};
use crate::net::protocol::{field_id, field_str, validate_payload, Request};
use crate::rbac::Scope;
use crate::session::Untold;
use crate::store::{ColumnConfig, Row};
use serde_json::{Map, Value};
use std::str::FromStr;

/// What a dispatched request produces before it is turned into reply bytes.
pub enum Outcome {
    /// A human-readable success string, e.g. "created 1 row successfully".
    Success(String),
    /// A JSON body, for request types that return data (`login`, `pull_*`).
    Json(Value),
}

/// Runs one request against `session`, returning either the reply bytes or
/// the error string the source writes back verbatim on failure.
pub fn dispatch(session: &mut Untold, request: Request) -> std::result::Result<Vec<u8>, Vec<u8>> {
    let request_type = request.request_type.to_ascii_lowercase();

    let result = validate_payload(&request.request_type, &request.payload)
        .and_then(|()| run(session, &request_type, &request.payload, &request.user.clone().into()));

    match result {
        Ok(Outcome::Success(message)) => Ok(message.into_bytes()),
        Ok(Outcome::Json(value)) => Ok(serde_json::to_vec(&value).unwrap_or_default()),
        Err(err) => Err(err.to_string().into_bytes()),
    }
}

fn require_positive(effected: usize, noun: &str) -> Result<Outcome> {
    if effected == 0 {
        return Err(DbError::NotFound(format!("no items were {noun}")));
    }
    Ok(Outcome::Success(format!("{noun} {effected} item(s) successfully")))
}

fn run(
    session: &mut Untold,
    request_type: &str,
    payload: &Map<String, Value>,
    _actor: &crate::rbac::PublicAccessUser,
) -> Result<Outcome> {
    match request_type {
        "login" => {
            let username = field_str(payload, "username")?;
            let password = field_str(payload, "password")?;
            let public = session.user_login(username, password)?;
            Ok(Outcome::Json(serde_json::to_value(public)?))
        }

        "push_table" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            let primary_key_name = field_str(payload, "primaryKeyName")?.to_string();
            let schema = payload
                .get("schema")
                .and_then(Value::as_array)
                .ok_or_else(|| DbError::InvalidInput("schema must be a list".into()))?;

            let columns = schema
                .iter()
                .map(parse_column_config)
                .collect::<Result<Vec<_>>>()?;

            session.create_database_table(&table_name, columns, &primary_key_name)?;
            Ok(Outcome::Success("created 1 table successfully".into()))
        }

        "push_row" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            let row_value = payload
                .get("rowValue")
                .and_then(Value::as_object)
                .ok_or_else(|| DbError::InvalidInput("rowValue must be an object".into()))?;
            session.add_table_row(&table_name, row_value.clone())?;
            require_positive(1, "added")
        }

        "push_row_multi" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            let row_values = payload
                .get("rowValues")
                .and_then(Value::as_array)
                .ok_or_else(|| DbError::InvalidInput("rowValues must be a list".into()))?;

            let mut added = 0usize;
            for value in row_values {
                let row: Row = value
                    .as_object()
                    .ok_or_else(|| DbError::InvalidInput("each rowValue must be an object".into()))?
                    .clone();
                session.add_table_row(&table_name, row)?;
                added += 1;
            }
            require_positive(added, "added")
        }

        "pull_row" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            let query_string = field_str(payload, "queryString")?.to_string();
            let rows = session.get_table_values(&table_name, &query_string)?;
            Ok(Outcome::Json(Value::Array(rows.into_iter().map(Value::Object).collect())))
        }

        "put_row" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            let query_string = field_str(payload, "queryString")?.to_string();
            let updated = session.update_table_row(&table_name, &query_string)?;
            require_positive(updated, "updated")
        }

        "delete_row" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            let query_string = field_str(payload, "queryString")?.to_string();
            let removed = session.remove_table_row(&table_name, &query_string)?;
            require_positive(removed, "removed")
        }

        "push_user" => {
            let username = field_str(payload, "username")?.to_string();
            let password = field_str(payload, "password")?.to_string();
            session.create_user(&username, &password)?;
            Ok(Outcome::Success("created 1 user successfully".into()))
        }

        "push_group" => {
            let group_name = field_str(payload, "groupName")?.to_string();
            session.create_group(&group_name)?;
            Ok(Outcome::Success("created 1 group successfully".into()))
        }

        "push_role" => {
            let role_name = field_str(payload, "roleName")?.to_string();
            let scope = Scope::from_str(field_str(payload, "scope")?)?;
            let permissions = payload
                .get("permissions")
                .and_then(Value::as_array)
                .ok_or_else(|| DbError::InvalidInput("permissions must be a list".into()))?
                .iter()
                .map(|v| v.as_str().ok_or_else(|| DbError::InvalidInput("permissions entries must be strings".into())))
                .map(|s| s.and_then(|s| crate::rbac::PermOp::from_str(s)))
                .collect::<Result<Vec<_>>>()?;

            session.create_role(&role_name, scope, resolve_policy_ids(&permissions))?;
            Ok(Outcome::Success("created 1 role successfully".into()))
        }

        "push_user_role_assignment" => {
            let username = field_str(payload, "username")?.to_string();
            let role_id = field_id(payload, "roleId")?;
            session.add_user_to_role(&username, role_id)?;
            Ok(Outcome::Success("created 1 assignment successfully".into()))
        }

        "push_user_group_assignment" => {
            let username = field_str(payload, "username")?.to_string();
            let group_id = field_id(payload, "groupId")?;
            session.add_user_to_group(&username, group_id)?;
            Ok(Outcome::Success("created 1 assignment successfully".into()))
        }

        "push_group_role_assignment" => {
            let group_id = field_id(payload, "groupId")?;
            let role_id = field_id(payload, "roleId")?;
            session.add_group_to_role(group_id, role_id)?;
            Ok(Outcome::Success("created 1 assignment successfully".into()))
        }

        "delete_user_role_assignment" => {
            let username = field_str(payload, "username")?.to_string();
            let role_id = field_id(payload, "roleId")?;
            session.remove_user_from_role(&username, role_id)?;
            Ok(Outcome::Success("removed 1 assignment successfully".into()))
        }

        "delete_user_group_assignment" => {
            let username = field_str(payload, "username")?.to_string();
            let group_id = field_id(payload, "groupId")?;
            session.remove_user_from_group(&username, group_id)?;
            Ok(Outcome::Success("removed 1 assignment successfully".into()))
        }

        "delete_group_role_assignment" => {
            let group_id = field_id(payload, "groupId")?;
            let role_id = field_id(payload, "roleId")?;
            session.remove_group_from_role(group_id, role_id)?;
            Ok(Outcome::Success("removed 1 assignment successfully".into()))
        }

        "delete_user" => {
            let username = field_str(payload, "username")?.to_string();
            session.delete_user(&username)?;
            Ok(Outcome::Success("removed 1 user successfully".into()))
        }

        "delete_group" => {
            let group_id = field_id(payload, "groupId")?;
            session.delete_group(group_id)?;
            Ok(Outcome::Success("removed 1 group successfully".into()))
        }

        "delete_role" => {
            let role_id = field_id(payload, "roleId")?;
            session.delete_role(role_id)?;
            Ok(Outcome::Success("removed 1 role successfully".into()))
        }

        "delete_table" => {
            let table_name = field_str(payload, "tableName")?.to_string();
            session.delete_table(&table_name)?;
            Ok(Outcome::Success("removed 1 table successfully".into()))
        }

        "pull_group" => {
            let group_name = field_str(payload, "groupName")?;
            let group = session.find_group(group_name)?;
            Ok(Outcome::Json(serde_json::to_value(group)?))
        }

        "pull_role" => {
            let role_name = field_str(payload, "roleName")?;
            let role = session.find_role(role_name)?;
            Ok(Outcome::Json(serde_json::to_value(role)?))
        }

        other => Err(DbError::Unrecognized(format!("unknown request type: {other}"))),
    }
}

/// The wire's `permissions: ["PULL", "PUSH"]` list maps onto the base
/// Reader/Writer/Remover policy IDs rather than free-form custom policies —
/// roles created through the socket API compose the three base policies
/// (`spec.md` §4.3), matching `front_functions.go`'s `CreateRole`, which also
/// never threads custom policy IDs through from the wire.
fn resolve_policy_ids(permissions: &[crate::rbac::PermOp]) -> Vec<i64> {
    use crate::rbac::model::{PermOp, READER_POLICY_ID, REMOVER_POLICY_ID, WRITER_POLICY_ID};
    let mut ids = Vec::new();
    if permissions.contains(&PermOp::Pull) {
        ids.push(READER_POLICY_ID);
    }
    if permissions.contains(&PermOp::Push) || permissions.contains(&PermOp::Put) {
        ids.push(WRITER_POLICY_ID);
    }
    if permissions.contains(&PermOp::Delete) {
        ids.push(REMOVER_POLICY_ID);
    }
    ids
}

fn parse_column_config(value: &Value) -> Result<ColumnConfig> {
    let obj = value.as_object().ok_or_else(|| DbError::InvalidInput("schema entries must be objects".into()))?;
    Ok(ColumnConfig {
        column_name: obj
            .get("columnName")
            .and_then(Value::as_str)
            .ok_or_else(|| DbError::InvalidInput("schema entry missing columnName".into()))?
            .to_string(),
        type_tag: obj
            .get("columnType")
            .and_then(Value::as_str)
            .ok_or_else(|| DbError::InvalidInput("schema entry missing columnType".into()))?
            .to_string(),
        nullable: obj.get("nullable").and_then(Value::as_bool).unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::net::protocol::TransitAccessUser;
    use tempfile::tempdir;

    fn test_session() -> (Untold, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = Config { data_dir: dir.path().to_path_buf(), ..Config::default() };
        let key = crate::crypto::ensure_key(&config.key_path()).unwrap();
        (Untold::init(config, key, false).unwrap(), dir)
    }

    fn request(request_type: &str, payload: Map<String, Value>) -> Request {
        Request {
            request_type: request_type.into(),
            payload,
            user: TransitAccessUser { username: "system".into(), public_token: vec![] },
        }
    }

    #[test]
    fn push_user_then_login_round_trips() {
        let (mut session, _dir) = test_session();
        let mut payload = Map::new();
        payload.insert("username".into(), Value::String("alice".into()));
        payload.insert("password".into(), Value::String("pw".into()));
        let reply = dispatch(&mut session, request("push_user", payload)).unwrap();
        assert!(String::from_utf8(reply).unwrap().contains("created"));

        let mut login_payload = Map::new();
        login_payload.insert("username".into(), Value::String("alice".into()));
        login_payload.insert("password".into(), Value::String("pw".into()));
        let reply = dispatch(&mut session, request("login", login_payload)).unwrap();
        let value: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(value["username"], "alice");
    }

    #[test]
    fn unknown_request_type_errors() {
        let (mut session, _dir) = test_session();
        let err = dispatch(&mut session, request("not_a_type", Map::new())).unwrap_err();
        assert!(String::from_utf8(err).unwrap().contains("unknown request type"));
    }

    #[test]
    fn delete_row_with_no_match_reports_no_items() {
        let (mut session, _dir) = test_session();
        let mut schema_payload = Map::new();
        schema_payload.insert("tableName".into(), Value::String("t".into()));
        schema_payload.insert("primaryKeyName".into(), Value::String("id".into()));
        schema_payload.insert(
            "schema".into(),
            Value::Array(vec![serde_json::json!({"columnName":"id","columnType":"int","nullable":false})]),
        );
        dispatch(&mut session, request("push_table", schema_payload)).unwrap();

        let mut delete_payload = Map::new();
        delete_payload.insert("tableName".into(), Value::String("t".into()));
        delete_payload.insert("queryString".into(), Value::String("DELETE FROM t WHERE id = 99".into()));
        let err = dispatch(&mut session, request("delete_row", delete_payload)).unwrap_err();
        assert!(!err.is_empty());
    }
}
