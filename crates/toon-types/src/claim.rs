use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Creator,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Creator => "creator",
            Role::Editor => "editor",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown role: {0}")]
pub struct UnknownRole(String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "creator" => Ok(Role::Creator),
            "editor" => Ok(Role::Editor),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Parses comma separated roles as stored in database, unknown roles are skipped
pub fn parse_roles(roles: &str) -> Vec<Role> {
    roles
        .split(',')
        .filter(|s| !s.trim().is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

pub fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

pub trait Authorization {
    fn roles(&self) -> &[Role];

    fn has_role(&self, role: Role) -> bool {
        self.roles().contains(&role)
    }

    fn has_any_role<I>(&self, roles: I) -> bool
    where
        I: IntoIterator<Item = Role>,
    {
        roles.into_iter().any(|role| self.has_role(role))
    }

    /// Series can be created only by creators (or admins)
    fn can_create_series(&self) -> bool {
        self.has_any_role([Role::Admin, Role::Creator])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Holder(Vec<Role>);

    impl Authorization for Holder {
        fn roles(&self) -> &[Role] {
            &self.0
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(" creator ".parse::<Role>().unwrap(), Role::Creator);
        assert!("guest".parse::<Role>().is_err());
        assert_eq!(
            parse_roles("admin,,guest,editor"),
            vec![Role::Admin, Role::Editor]
        );
        assert_eq!(join_roles(&[Role::Creator, Role::Editor]), "creator,editor");
    }

    #[test]
    fn test_authorization() {
        let editor = Holder(vec![Role::Editor]);
        assert!(editor.has_role(Role::Editor));
        assert!(!editor.can_create_series());
        let creator = Holder(vec![Role::Editor, Role::Creator]);
        assert!(creator.can_create_series());
        assert!(Holder(vec![Role::Admin]).can_create_series());
    }
}
