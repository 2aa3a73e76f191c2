//! Namespace-keyed catalog of component types, standing in for classpath
//! scanning.

use crate::ComponentDefinition;

type Describe = fn() -> ComponentDefinition;

#[derive(Debug, Clone, Copy)]
struct CatalogEntry {
    namespace: &'static str,
    describe: Describe,
}

/// Component types registered under module-path namespaces.
///
/// Entries are usually added with `module_path!()` as the namespace so that a
/// configuration root can scan everything beneath its own module.
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    entries: Vec<CatalogEntry>,
}

impl TypeCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component type under `namespace`.
    pub fn add(&mut self, namespace: &'static str, describe: Describe) -> &mut Self {
        self.entries.push(CatalogEntry {
            namespace,
            describe,
        });
        self
    }

    /// Builder-style [`TypeCatalog::add`].
    #[must_use]
    pub fn with(mut self, namespace: &'static str, describe: Describe) -> Self {
        self.add(namespace, describe);
        self
    }

    /// Definitions for every entry at or beneath `base`, in registration
    /// order. An empty base matches everything.
    #[must_use]
    pub fn scan(&self, base: &str) -> Vec<ComponentDefinition> {
        self.entries
            .iter()
            .filter(|entry| namespace_matches(entry.namespace, base))
            .map(|entry| (entry.describe)())
            .collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the catalog has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn namespace_matches(namespace: &str, base: &str) -> bool {
    base.is_empty()
        || namespace
            .strip_prefix(base)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Entry point of an application's component graph.
///
/// A root is itself a singleton component. It contributes factory-method
/// definitions and the namespaces to scan; without explicit namespaces it
/// scans its own.
#[derive(Debug)]
pub struct ConfigurationRoot {
    definition: ComponentDefinition,
    namespace: &'static str,
    factories: Vec<ComponentDefinition>,
    scan: Vec<String>,
}

impl ConfigurationRoot {
    /// Creates a root declared in `namespace`, usually `module_path!()`.
    #[must_use]
    pub fn new(definition: ComponentDefinition, namespace: &'static str) -> Self {
        Self {
            definition,
            namespace,
            factories: Vec::new(),
            scan: Vec::new(),
        }
    }

    /// Adds a factory-method definition.
    #[must_use]
    pub fn factory(mut self, definition: ComponentDefinition) -> Self {
        self.factories.push(definition);
        self
    }

    /// Adds a namespace to scan.
    #[must_use]
    pub fn scan(mut self, namespace: impl Into<String>) -> Self {
        self.scan.push(namespace.into());
        self
    }

    /// Namespaces this root scans.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        if self.scan.is_empty() {
            vec![self.namespace.to_owned()]
        } else {
            self.scan.clone()
        }
    }

    pub(crate) fn into_parts(self) -> (ComponentDefinition, Vec<ComponentDefinition>, Vec<String>) {
        let namespaces = self.namespaces();
        (self.definition, self.factories, namespaces)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{Component, Constructor};

    struct Widget;
    impl Component for Widget {}

    fn widget() -> ComponentDefinition {
        ComponentDefinition::builder::<Widget>()
            .constructor(Constructor::nullary(|| Widget))
            .build()
    }

    fn gadget() -> ComponentDefinition {
        ComponentDefinition::builder::<Widget>()
            .named("gadget")
            .constructor(Constructor::nullary(|| Widget))
            .build()
    }

    #[rstest]
    #[case("app::todo", "app::todo", true)]
    #[case("app::todo::web", "app::todo", true)]
    #[case("app::todos", "app::todo", false)]
    #[case("other", "app", false)]
    #[case("anything", "", true)]
    fn matches_namespace_boundaries(
        #[case] namespace: &str,
        #[case] base: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(namespace_matches(namespace, base), expected);
    }

    #[test]
    fn scans_in_registration_order() {
        let catalog = TypeCatalog::new()
            .with("app::web", gadget)
            .with("app::core", widget)
            .with("elsewhere", widget);
        let names: Vec<_> = catalog
            .scan("app")
            .iter()
            .map(|definition| definition.name().to_owned())
            .collect();
        assert_eq!(names, vec!["gadget", "widget"]);
    }

    #[test]
    fn root_defaults_to_its_own_namespace() {
        let root = ConfigurationRoot::new(widget(), "app::config");
        assert_eq!(root.namespaces(), vec!["app::config"]);
        let root = root.scan("app::web").scan("app::core");
        assert_eq!(root.namespaces(), vec!["app::web", "app::core"]);
    }
}
