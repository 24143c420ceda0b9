//! Invention registry.
//!
//! Inventions are registered explicitly: a descriptor plus a factory. The
//! descriptor is stored at registration, so `get_invention` never touches the
//! module itself; modules are only instantiated by `resolve`.
//!
//! A process-wide registry is built lazily from [`Registry::builtin`] on first
//! access and is read-only afterwards. Tests can swap it with [`reset_global`].

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use crate::domain::descriptor::InventionDescriptor;
use crate::domain::error::RegistryError;
use crate::invention::Invention;
use crate::inventions;

/// Constructs an invention module.
pub type InventionFactory = fn() -> Arc<dyn Invention>;

struct Entry {
    descriptor: InventionDescriptor,
    factory: InventionFactory,
}

/// Ordered slug -> (descriptor, factory) table.
#[derive(Default)]
pub struct Registry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the reference inventions in their canonical order.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (descriptor, factory) in inventions::builtin_table() {
            // Builtin slugs are distinct literals.
            if let Err(e) = registry.register(descriptor, factory) {
                tracing::error!(error = %e, "builtin invention table is inconsistent");
            }
        }
        registry
    }

    /// Register a module. Duplicate slugs are rejected.
    pub fn register(
        &mut self,
        descriptor: InventionDescriptor,
        factory: InventionFactory,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.slug) {
            return Err(RegistryError::DuplicateSlug {
                slug: descriptor.slug,
            });
        }
        self.index
            .insert(descriptor.slug.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            factory,
        });
        Ok(())
    }

    /// Descriptors in registration order. Each call starts a fresh iteration.
    pub fn list_inventions(&self) -> impl Iterator<Item = &InventionDescriptor> + '_ {
        self.entries.iter().map(|e| &e.descriptor)
    }

    pub fn get_invention(&self, slug: &str) -> Result<&InventionDescriptor, RegistryError> {
        self.index
            .get(slug)
            .map(|&idx| &self.entries[idx].descriptor)
            .ok_or_else(|| RegistryError::NotFound {
                slug: slug.to_string(),
            })
    }

    /// Instantiate the module registered under `slug`.
    pub fn resolve(&self, slug: &str) -> Result<Arc<dyn Invention>, RegistryError> {
        self.index
            .get(slug)
            .map(|&idx| (self.entries[idx].factory)())
            .ok_or_else(|| RegistryError::NotFound {
                slug: slug.to_string(),
            })
    }

    pub fn contains(&self, slug: &str) -> bool {
        self.index.contains_key(slug)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

static GLOBAL: OnceLock<RwLock<Arc<Registry>>> = OnceLock::new();

fn global_cell() -> &'static RwLock<Arc<Registry>> {
    GLOBAL.get_or_init(|| RwLock::new(Arc::new(Registry::builtin())))
}

/// The process-wide registry.
pub fn global() -> Arc<Registry> {
    let guard = global_cell()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Arc::clone(&guard)
}

/// Replace the process-wide registry. Runs already holding the previous
/// registry keep it until they finish.
pub fn reset_global(registry: Registry) {
    let mut guard = global_cell()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Arc::new(registry);
}

/// `list_inventions` on the process-wide registry.
pub fn list_inventions() -> Vec<InventionDescriptor> {
    global().list_inventions().cloned().collect()
}

/// `get_invention` on the process-wide registry.
pub fn get_invention(slug: &str) -> Result<InventionDescriptor, RegistryError> {
    global().get_invention(slug).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_order() {
        let registry = Registry::builtin();
        let slugs: Vec<&str> = registry.list_inventions().map(|d| d.slug.as_str()).collect();
        assert_eq!(slugs, vec!["aerial_screw", "parachute", "ornithopter"]);
    }

    #[test]
    fn test_list_is_restartable() {
        let registry = Registry::builtin();
        let first: Vec<_> = registry.list_inventions().collect();
        let second: Vec<_> = registry.list_inventions().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_not_found() {
        let registry = Registry::builtin();
        let err = registry.get_invention("nonexistent_slug").unwrap_err();
        assert_eq!(
            err,
            RegistryError::NotFound {
                slug: "nonexistent_slug".to_string()
            }
        );
        assert!(registry.resolve("nonexistent_slug").is_err());
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = Registry::builtin();
        let descriptor = registry.get_invention("parachute").unwrap().clone();
        let factory = registry.entries[1].factory;
        let err = registry.register(descriptor, factory).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateSlug { .. }));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_resolved_module_matches_descriptor() {
        let registry = Registry::builtin();
        for descriptor in registry.list_inventions() {
            let module = registry.resolve(&descriptor.slug).unwrap();
            assert_eq!(&module.descriptor(), descriptor);
        }
    }
}
