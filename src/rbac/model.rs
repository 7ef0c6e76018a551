// RBAC data model (`spec.md` §3). Users/groups/roles store IDs rather than
// embedding whole records — `spec.md` §9 flags the source's embedded-copy
// approach as a defect ("an update to a role's policies does not reach
// copies already stored inside users and groups") and this specification is
// written against the resolved model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four permission verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PermOp {
    #[serde(rename = "PULL")]
    Pull,
    #[serde(rename = "PUSH")]
    Push,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "DELETE")]
    Delete,
}

impl fmt::Display for PermOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PermOp::Pull => "PULL",
            PermOp::Push => "PUSH",
            PermOp::Put => "PUT",
            PermOp::Delete => "DELETE",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for PermOp {
    type Err = crate::error::DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PULL" => Ok(PermOp::Pull),
            "PUSH" => Ok(PermOp::Push),
            "PUT" => Ok(PermOp::Put),
            "DELETE" => Ok(PermOp::Delete),
            other => Err(crate::error::DbError::Unrecognized(format!(
                "unknown permission op: {other}"
            ))),
        }
    }
}

/// The namespace an action targets. `Wildcard` matches every scope during
/// permission evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    #[serde(rename = "*")]
    Wildcard,
    #[serde(rename = "policy")]
    Policy,
    #[serde(rename = "role")]
    Role,
    #[serde(rename = "group")]
    Group,
    #[serde(rename = "user")]
    User,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Wildcard => "*",
            Scope::Policy => "policy",
            Scope::Role => "role",
            Scope::Group => "group",
            Scope::User => "user",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Scope {
    type Err = crate::error::DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "*" => Ok(Scope::Wildcard),
            "policy" => Ok(Scope::Policy),
            "role" => Ok(Scope::Role),
            "group" => Ok(Scope::Group),
            "user" => Ok(Scope::User),
            other => Err(crate::error::DbError::Unrecognized(format!(
                "unknown scope: {other}"
            ))),
        }
    }
}

/// `{type, scope}` pair gating a single call.
#[derive(Debug, Clone, Copy)]
pub struct Action {
    pub op: PermOp,
    pub scope: Scope,
}

impl Action {
    pub fn new(op: PermOp, scope: Scope) -> Self {
        Self { op, scope }
    }
}

/// Reserved IDs for the base policies.
pub const READER_POLICY_ID: i64 = 1;
pub const WRITER_POLICY_ID: i64 = 2;
pub const REMOVER_POLICY_ID: i64 = 3;
pub const MAX_BASE_POLICY_ID: i64 = REMOVER_POLICY_ID;
pub const MAX_BASE_ROLE_ID: i64 = 15;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: i64,
    pub name: String,
    pub permissions: Vec<PermOp>,
}

impl Policy {
    pub fn grants(&self, op: PermOp) -> bool {
        self.permissions.contains(&op)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub role_id: i64,
    pub name: String,
    pub scope: Scope,
    pub policy_ids: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub group_id: i64,
    pub name: String,
    pub member_user_ids: Vec<i64>,
    pub role_ids: Vec<i64>,
    #[serde(with = "crate::rbac::model::bytes_as_base64")]
    pub private_token: Vec<u8>,
}

/// Private user record — holds the password and private token. Never
/// serialized directly to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub password: String,
    pub role_ids: Vec<i64>,
    #[serde(with = "crate::rbac::model::bytes_as_base64")]
    pub private_token: Vec<u8>,
}

/// What a client holds after login: username plus a derived public token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicAccessUser {
    pub username: String,
    #[serde(with = "crate::rbac::model::bytes_as_base64")]
    pub public_token: Vec<u8>,
}

/// The ephemeral `system` principal's reserved ID (`spec.md` §3).
pub const SYSTEM_USER_ID: i64 = -1;
/// The ephemeral `tester` principal's reserved ID (`spec.md` §3).
pub const TESTER_USER_ID: i64 = -2;

pub(crate) mod bytes_as_base64 {
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}
