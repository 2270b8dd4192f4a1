//! core::privilege
//!
//! Local privilege checks.
//!
//! The client may only drive the daemon when the effective user is root
//! or belongs to the configured group; otherwise lock handling would fail
//! halfway through. The check sits behind [`AccessPolicy`] so startup
//! reconciliation can be exercised without touching the host's user
//! database.

use nix::unistd::{getegid, geteuid, getgroups, Gid, Group, User};

/// Decides whether the current process may operate the package manager.
pub trait AccessPolicy: Send + Sync {
    /// Whether the caller is authorized.
    fn is_authorized(&self) -> bool;
}

/// Authorizes root and members of one group.
#[derive(Debug, Clone)]
pub struct GroupMembership {
    group: String,
}

impl GroupMembership {
    /// Policy for the named group.
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
        }
    }

    /// The group name this policy checks.
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl AccessPolicy for GroupMembership {
    fn is_authorized(&self) -> bool {
        if geteuid().is_root() {
            return true;
        }

        let Some(gid) = resolve_gid(&self.group) else {
            tracing::debug!(group = %self.group, "group does not exist");
            return false;
        };

        if getegid() == gid {
            return true;
        }
        if getgroups().map(|groups| groups.contains(&gid)).unwrap_or(false) {
            return true;
        }

        // Supplementary groups of the session may predate the membership;
        // fall back to the group's member list.
        let user = User::from_uid(geteuid()).ok().flatten();
        let group = Group::from_gid(gid).ok().flatten();
        match (user, group) {
            (Some(user), Some(group)) => group.mem.iter().any(|m| m == &user.name),
            _ => false,
        }
    }
}

/// Fixed answer, for embedding and tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticPolicy(pub bool);

impl AccessPolicy for StaticPolicy {
    fn is_authorized(&self) -> bool {
        self.0
    }
}

/// Look up a group id by name.
pub fn resolve_gid(group: &str) -> Option<Gid> {
    Group::from_name(group).ok().flatten().map(|g| g.gid)
}
