use std::fmt;

const WILDCARD: &str = "*";
const SEPARATOR: char = '#';

/// Breadth of a grant over (repository, environment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessScope {
    /// `<repo>#<env>`
    Exact,
    /// `<repo>#*`: every environment of one repository
    Repo,
    /// `*#*`: every repository and environment
    Org,
    /// `*#<env>`: one environment across all repositories
    Environment,
}

impl AccessScope {
    pub const ALL: [AccessScope; 4] = [
        AccessScope::Exact,
        AccessScope::Repo,
        AccessScope::Org,
        AccessScope::Environment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessScope::Exact => "exact",
            AccessScope::Repo => "repo",
            AccessScope::Org => "org",
            AccessScope::Environment => "environment",
        }
    }

    /// Scope string stored in the permission table for this breadth.
    pub fn pattern(&self, repository: &str, environment: &str) -> String {
        let (repo, env) = match self {
            AccessScope::Exact => (repository, environment),
            AccessScope::Repo => (repository, WILDCARD),
            AccessScope::Org => (WILDCARD, WILDCARD),
            AccessScope::Environment => (WILDCARD, environment),
        };
        format!("{repo}{SEPARATOR}{env}")
    }
}

impl fmt::Display for AccessScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite lookup key: requester login plus a scope pattern.
///
/// Both halves are lowercased on construction so lookups are case-insensitive
/// as long as the table stores lowercase values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    requester: String,
    scope: String,
}

impl PermissionKey {
    pub fn new(requester: &str, scope: &str) -> Self {
        Self {
            requester: requester.trim().to_lowercase(),
            scope: scope.trim().to_lowercase(),
        }
    }

    pub fn for_scope(requester: &str, repository: &str, environment: &str, scope: AccessScope) -> Self {
        let repository = repository.trim().to_lowercase();
        let environment = environment.trim().to_lowercase();
        Self::new(requester, &scope.pattern(&repository, &environment))
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.requester, self.scope)
    }
}
