// Wire types and per-request-type payload validation (`spec.md` §4.8, §6).
// Grounded on the source's socket request shape (`{RequestType, Payload,
// User}`) and its `validate_payload` schema table.

use crate::error::{DbError, Result};
use crate::rbac::PublicAccessUser;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum bytes read per request (`spec.md` §4.8 item 1).
pub const MAX_REQUEST_BYTES: usize = 51_200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitAccessUser {
    pub username: String,
    #[serde(with = "crate::rbac::model::bytes_as_base64", default)]
    pub public_token: Vec<u8>,
}

impl From<TransitAccessUser> for PublicAccessUser {
    fn from(value: TransitAccessUser) -> Self {
        PublicAccessUser { username: value.username, public_token: value.public_token }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(rename = "RequestType")]
    pub request_type: String,
    #[serde(rename = "Payload")]
    pub payload: Map<String, Value>,
    #[serde(rename = "User")]
    pub user: TransitAccessUser,
}

/// A single required payload key and the JSON kind it must hold.
pub struct Field {
    pub key: &'static str,
    pub kind: Kind,
}

#[derive(Clone, Copy)]
pub enum Kind {
    Str,
    Num,
    List,
    Map,
}

fn schema_for(request_type: &str) -> Option<&'static [Field]> {
    macro_rules! fields {
        ($($key:expr => $kind:expr),* $(,)?) => {
            &[$(Field { key: $key, kind: $kind }),*]
        };
    }

    Some(match request_type {
        "login" => fields!("username" => Kind::Str, "password" => Kind::Str),
        "push_table" => fields!("tableName" => Kind::Str, "primaryKeyName" => Kind::Str, "schema" => Kind::List),
        "push_row" => fields!("tableName" => Kind::Str, "rowValue" => Kind::Map),
        "push_row_multi" => fields!("tableName" => Kind::Str, "rowValues" => Kind::List),
        "pull_row" => fields!("tableName" => Kind::Str, "queryString" => Kind::Str),
        "put_row" => fields!("tableName" => Kind::Str, "queryString" => Kind::Str),
        "delete_row" => fields!("tableName" => Kind::Str, "queryString" => Kind::Str),
        "push_user" => fields!("username" => Kind::Str, "password" => Kind::Str),
        "push_group" => fields!("groupName" => Kind::Str),
        "push_role" => fields!("roleName" => Kind::Str, "scope" => Kind::Str, "permissions" => Kind::List),
        "push_user_role_assignment" => fields!("username" => Kind::Str, "roleId" => Kind::Num),
        "push_user_group_assignment" => fields!("username" => Kind::Str, "groupId" => Kind::Num),
        "push_group_role_assignment" => fields!("groupId" => Kind::Num, "roleId" => Kind::Num),
        "delete_user_role_assignment" => fields!("username" => Kind::Str, "roleId" => Kind::Num),
        "delete_user_group_assignment" => fields!("username" => Kind::Str, "groupId" => Kind::Num),
        "delete_group_role_assignment" => fields!("groupId" => Kind::Num, "roleId" => Kind::Num),
        "delete_user" => fields!("username" => Kind::Str),
        "delete_group" => fields!("groupId" => Kind::Num),
        "delete_role" => fields!("roleId" => Kind::Num),
        "delete_table" => fields!("tableName" => Kind::Str),
        "pull_group" => fields!("groupName" => Kind::Str),
        "pull_role" => fields!("roleName" => Kind::Str),
        _ => return None,
    })
}

/// Validates `payload` against the schema for `request_type` (case-insensitive).
/// An unknown `request_type` is `Unrecognized`; a missing/mistyped key is
/// `InvalidInput`.
pub fn validate_payload(request_type: &str, payload: &Map<String, Value>) -> Result<()> {
    let normalized = request_type.to_ascii_lowercase();
    let schema = schema_for(&normalized)
        .ok_or_else(|| DbError::Unrecognized(format!("unknown request type: {request_type}")))?;

    for field in schema {
        let value = payload
            .get(field.key)
            .ok_or_else(|| DbError::InvalidInput(format!("missing required field: {}", field.key)))?;

        let matches = match field.kind {
            Kind::Str => value.is_string(),
            Kind::Num => value.is_number(),
            Kind::List => value.is_array(),
            Kind::Map => value.is_object(),
        };

        if !matches {
            return Err(DbError::InvalidInput(format!("field {} has the wrong type", field.key)));
        }
    }

    Ok(())
}

/// Pulls a required string field out of a validated payload.
pub fn field_str<'a>(payload: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| DbError::InvalidInput(format!("missing required field: {key}")))
}

/// Pulls a required integer field, tolerating the wire's double encoding
/// (`spec.md` §4.8: "JSON numbers are doubles on the wire").
pub fn field_id(payload: &Map<String, Value>, key: &str) -> Result<i64> {
    payload
        .get(key)
        .and_then(Value::as_f64)
        .map(|n| n as i64)
        .ok_or_else(|| DbError::InvalidInput(format!("missing required field: {key}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn accepts_well_formed_login_payload() {
        let payload = obj(&[("username", Value::String("a".into())), ("password", Value::String("b".into()))]);
        assert!(validate_payload("login", &payload).is_ok());
        assert!(validate_payload("LOGIN", &payload).is_ok());
    }

    #[test]
    fn rejects_missing_field() {
        let payload = obj(&[("username", Value::String("a".into()))]);
        let err = validate_payload("login", &payload).unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)));
    }

    #[test]
    fn unknown_request_type_is_unrecognized() {
        let err = validate_payload("not_a_real_type", &Map::new()).unwrap_err();
        assert!(matches!(err, DbError::Unrecognized(_)));
    }

    #[test]
    fn field_id_accepts_wire_doubles() {
        let payload = obj(&[("roleId", Value::from(3.0))]);
        assert_eq!(field_id(&payload, "roleId").unwrap(), 3);
    }
}
