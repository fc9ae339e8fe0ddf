//! # Service identity.
//!
//! A [`Service`] names a registry entry by `namespace`, `group`, `name` and its
//! ephemeral flag. It carries no behavior beyond identity and parsing of the
//! grouped wire form (`group@@name`).

use std::fmt;
use std::sync::Arc;

/// Namespace used when a caller supplies an empty one.
pub const DEFAULT_NAMESPACE: &str = "public";

/// Group used when a service name carries no group prefix.
pub const DEFAULT_GROUP: &str = "DEFAULT_GROUP";

/// Separator between group and service name in the grouped form.
pub const GROUP_SEPARATOR: &str = "@@";

/// Identity of a registered service.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Service {
    namespace: Arc<str>,
    group: Arc<str>,
    name: Arc<str>,
    ephemeral: bool,
}

impl Service {
    /// Creates a service identity; empty namespace/group fall back to defaults.
    pub fn new(
        namespace: impl Into<Arc<str>>,
        group: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
        ephemeral: bool,
    ) -> Self {
        let namespace = non_empty_or(namespace.into(), DEFAULT_NAMESPACE);
        let group = non_empty_or(group.into(), DEFAULT_GROUP);
        Self {
            namespace,
            group,
            name: name.into(),
            ephemeral,
        }
    }

    /// Parses a grouped service name (`group@@name`) into a service identity.
    ///
    /// A name without the separator lands in [`DEFAULT_GROUP`].
    ///
    /// ```
    /// use beatvisor::Service;
    ///
    /// let s = Service::from_grouped_name("public", "orders@@checkout", true);
    /// assert_eq!(s.group(), "orders");
    /// assert_eq!(s.name(), "checkout");
    ///
    /// let d = Service::from_grouped_name("public", "checkout", true);
    /// assert_eq!(d.group(), "DEFAULT_GROUP");
    /// ```
    pub fn from_grouped_name(namespace: &str, grouped: &str, ephemeral: bool) -> Self {
        match grouped.split_once(GROUP_SEPARATOR) {
            Some((group, name)) => Self::new(namespace, group, name, ephemeral),
            None => Self::new(namespace, DEFAULT_GROUP, grouped, ephemeral),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Returns `group@@name`.
    pub fn grouped_name(&self) -> String {
        format!("{}{GROUP_SEPARATOR}{}", self.group, self.name)
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}{GROUP_SEPARATOR}{}#{}",
            self.namespace, self.group, self.name, self.ephemeral
        )
    }
}

fn non_empty_or(value: Arc<str>, fallback: &str) -> Arc<str> {
    if value.is_empty() {
        Arc::from(fallback)
    } else {
        value
    }
}
