use crate::{
    domain::user::UserContext,
    domain::workflow::Namespace,
    error::{DispatchError, DispatchResult},
};

/// Longest name Kubernetes accepts for a namespace (RFC 1123 label)
pub const MAX_NAMESPACE_LEN: usize = 63;

/// Maps an identity to its isolated execution namespace.
///
/// Implementations must be pure functions of the identity: no backend
/// calls, same answer for the same user.
pub trait NamespaceResolver: Send + Sync {
    /// Resolve the namespace of `user`
    fn resolve(&self, user: &UserContext) -> DispatchResult<Namespace>;
}

/// Resolver producing `"{prefix}-{escaped_name}"` namespaces
#[derive(Debug, Clone, Default)]
pub struct PrefixNamespaceResolver {
    /// Namespace prefix; empty means the escaped name is used alone
    prefix: String,

    /// Group a user must belong to before getting a namespace
    required_group: Option<String>,
}

impl PrefixNamespaceResolver {
    /// Create a resolver with the given prefix
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            required_group: None,
        }
    }

    /// Require membership in `group`
    pub fn with_required_group(mut self, group: impl Into<String>) -> Self {
        self.required_group = Some(group.into());
        self
    }
}

impl NamespaceResolver for PrefixNamespaceResolver {
    fn resolve(&self, user: &UserContext) -> DispatchResult<Namespace> {
        let escaped = user.escaped_name();
        if escaped.is_empty() {
            return Err(DispatchError::Configuration(
                "user has no name to derive a namespace from".to_string(),
            ));
        }

        if let Some(group) = &self.required_group {
            if !user.is_member_of(group) {
                return Err(DispatchError::Configuration(format!(
                    "user '{}' is not a member of required group '{}'",
                    user.name(),
                    group
                )));
            }
        }

        let namespace = if self.prefix.is_empty() {
            escaped.to_string()
        } else {
            format!("{}-{}", self.prefix, escaped)
        };

        if namespace.len() > MAX_NAMESPACE_LEN {
            return Err(DispatchError::Configuration(format!(
                "namespace '{}' exceeds {} characters",
                namespace, MAX_NAMESPACE_LEN
            )));
        }

        Ok(Namespace(namespace))
    }
}
