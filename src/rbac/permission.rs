// Permission evaluator (`spec.md` §4.4). Decides allow/deny for a
// `(principal, action)` pair from the principal's roles.
//
// `spec.md` §9 flags the source as trusting the bare username without
// checking the presented public token against the stored private token —
// an unresolved security gap the source explicitly says not to replicate.
// This evaluator closes it: `evaluate` verifies `confirm_public_token`
// before walking roles.

use crate::error::Result;
use crate::keypair;
use crate::rbac::model::{Action, Policy, PublicAccessUser, Role, User};

/// Evaluates whether `presented` is authorized to perform `action`, given
/// the catalog's users/roles/policies. Returns `Ok(false)` (not an error)
/// for every deny path so callers can audit either outcome uniformly.
pub fn evaluate(
    users: &[User],
    roles: &[Role],
    policies: &[Policy],
    presented: &PublicAccessUser,
    action: Action,
) -> Result<bool> {
    let Some(user) = users.iter().find(|u| u.username == presented.username) else {
        return Ok(false);
    };

    if !keypair::confirm_public_token(&presented.public_token, &user.private_token)? {
        return Ok(false);
    }

    for role_id in &user.role_ids {
        let Some(role) = roles.iter().find(|r| r.role_id == *role_id) else {
            continue;
        };

        if role.scope != action.scope && !matches!(role.scope, crate::rbac::model::Scope::Wildcard) {
            continue;
        }

        let grants = role
            .policy_ids
            .iter()
            .filter_map(|pid| policies.iter().find(|p| p.policy_id == *pid))
            .any(|policy| policy.grants(action.op));

        if grants {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::{generate_private_token, generate_public_token};
    use crate::rbac::model::{PermOp, Scope};

    fn policy(id: i64, ops: &[PermOp]) -> Policy {
        Policy { policy_id: id, name: format!("p{id}"), permissions: ops.to_vec() }
    }

    fn role(id: i64, scope: Scope, policy_ids: &[i64]) -> Role {
        Role { role_id: id, name: format!("r{id}"), scope, policy_ids: policy_ids.to_vec() }
    }

    #[test]
    fn allows_when_role_policy_and_scope_match() {
        let private = generate_private_token();
        let public = generate_public_token(&private).unwrap();
        let user = User {
            user_id: 1,
            username: "alice".into(),
            password: "pw".into(),
            role_ids: vec![10],
            private_token: private,
        };
        let policies = vec![policy(1, &[PermOp::Pull])];
        let roles = vec![role(10, Scope::Policy, &[1])];
        let presented = PublicAccessUser { username: "alice".into(), public_token: public };

        let action = Action::new(PermOp::Pull, Scope::Policy);
        assert!(evaluate(&[user], &roles, &policies, &presented, action).unwrap());
    }

    #[test]
    fn denies_when_scope_does_not_match_and_role_is_not_wildcard() {
        let private = generate_private_token();
        let public = generate_public_token(&private).unwrap();
        let user = User {
            user_id: 1,
            username: "reader".into(),
            password: "pw".into(),
            role_ids: vec![2],
            private_token: private,
        };
        let policies = vec![policy(1, &[PermOp::Pull])];
        let roles = vec![role(2, Scope::Wildcard, &[1])];
        let presented = PublicAccessUser { username: "reader".into(), public_token: public };

        // Root Reader role only grants PULL, never PUSH.
        let action = Action::new(PermOp::Push, Scope::Policy);
        assert!(!evaluate(&[user], &roles, &policies, &presented, action).unwrap());
    }

    #[test]
    fn denies_on_forged_public_token() {
        let private = generate_private_token();
        let forged_private = generate_private_token();
        let forged_public = generate_public_token(&forged_private).unwrap();
        let user = User {
            user_id: 1,
            username: "alice".into(),
            password: "pw".into(),
            role_ids: vec![10],
            private_token: private,
        };
        let policies = vec![policy(1, &[PermOp::Pull])];
        let roles = vec![role(10, Scope::Wildcard, &[1])];
        let presented = PublicAccessUser { username: "alice".into(), public_token: forged_public };

        let action = Action::new(PermOp::Pull, Scope::Policy);
        assert!(!evaluate(&[user], &roles, &policies, &presented, action).unwrap());
    }

    #[test]
    fn denies_unknown_username() {
        let policies: Vec<Policy> = vec![];
        let roles: Vec<Role> = vec![];
        let presented = PublicAccessUser { username: "ghost".into(), public_token: vec![0; 32] };
        let action = Action::new(PermOp::Pull, Scope::Policy);
        assert!(!evaluate(&[], &roles, &policies, &presented, action).unwrap());
    }
}
