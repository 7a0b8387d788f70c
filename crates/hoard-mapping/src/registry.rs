//! The process-wide index of entities and repository contracts.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::descriptor::{DescriptorCache, EntityDescriptor};
use crate::error::{MappingError, MappingResult, ScanError};
use crate::key::TypeKey;
use crate::markers::{Contract, Entity, EntityShape, MarkerKind, RepositoryMarker, Supertype};
use crate::scanner::{InventoryScanner, TypeScanner};

/// A discovered repository contract and the supertraits it declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub key: TypeKey,
    pub extends: &'static [Supertype],
}

impl RepositoryInfo {
    /// Returns `true` if `contract` is among the directly declared supertraits.
    pub fn declares(&self, contract: Contract) -> bool {
        self.extends.contains(&Supertype::Base(contract))
    }

    /// Returns `true` if a trait named `name` is among the directly declared
    /// supertraits.
    pub fn declares_name(&self, name: &str) -> bool {
        self.extends.iter().any(|s| s.name() == name)
    }
}

/// Index of every entity, embeddable and repository contract in the process.
///
/// Built from one [`TypeScanner`] pass and never modified afterwards. The
/// registry also owns the [`DescriptorCache`] for the entities it indexes.
///
/// A type is a repository when it carries the repository marker and its trait
/// object is assignable to the base data-access contract. Markers that are not
/// assignable are dropped.
pub struct TypeRegistry {
    entities: BTreeSet<TypeKey>,
    shapes: HashMap<TypeKey, &'static EntityShape>,
    embeddables: BTreeSet<TypeKey>,
    repositories: BTreeSet<TypeKey>,
    repository_info: HashMap<TypeKey, RepositoryInfo>,
    descriptors: DescriptorCache,
}

static GLOBAL: OnceLock<Result<TypeRegistry, ScanError>> = OnceLock::new();

impl TypeRegistry {
    /// The process-wide registry, scanned from link-time registrations on
    /// first access.
    ///
    /// The scan runs exactly once, even when several threads race on the
    /// first call. A failed scan is cached too: every later call returns the
    /// same error.
    pub fn global() -> Result<&'static TypeRegistry, ScanError> {
        GLOBAL
            .get_or_init(|| Self::scan(&InventoryScanner))
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Build a registry from one scanner pass.
    pub fn scan(scanner: &dyn TypeScanner) -> Result<Self, ScanError> {
        debug!("starting type scan for entities, embeddables and repositories");
        let output = scanner.scan()?;

        let mut shapes = HashMap::new();
        for shape in output.entities {
            if shapes.insert(shape.key, shape).is_some() {
                return Err(ScanError::DuplicateType {
                    marker: MarkerKind::Entity,
                    name: shape.key.name(),
                });
            }
        }

        let mut embeddables = BTreeSet::new();
        for key in output.embeddables {
            if !embeddables.insert(key) {
                return Err(ScanError::DuplicateType {
                    marker: MarkerKind::Embeddable,
                    name: key.name(),
                });
            }
        }

        let mut candidates = BTreeMap::new();
        for marker in output.repositories {
            if candidates.insert(marker.key, marker).is_some() {
                return Err(ScanError::DuplicateType {
                    marker: MarkerKind::Repository,
                    name: marker.key.name(),
                });
            }
        }

        let repositories = resolve_repositories(&candidates);
        let repository_info = repositories
            .iter()
            .map(|key| {
                let marker = &candidates[key];
                (
                    *key,
                    RepositoryInfo {
                        key: marker.key,
                        extends: marker.extends,
                    },
                )
            })
            .collect();

        let registry = Self {
            entities: shapes.keys().copied().collect(),
            shapes,
            embeddables,
            repositories,
            repository_info,
            descriptors: DescriptorCache::new(),
        };
        debug!(
            entities = registry.entities.len(),
            embeddables = registry.embeddables.len(),
            repositories = registry.repositories.len(),
            "finished type scan"
        );
        Ok(registry)
    }

    /// Types carrying the entity marker.
    pub fn entities(&self) -> &BTreeSet<TypeKey> {
        &self.entities
    }

    /// Types carrying the embeddable marker.
    pub fn embeddables(&self) -> &BTreeSet<TypeKey> {
        &self.embeddables
    }

    /// Repository contracts that reach a base contract.
    pub fn repositories(&self) -> &BTreeSet<TypeKey> {
        &self.repositories
    }

    /// Repositories that directly declare `contract` as a supertrait.
    ///
    /// This is not an assignability check: a repository that extends another
    /// user contract, which in turn declares `contract`, is not included.
    pub fn repositories_of(&self, contract: Contract) -> BTreeSet<TypeKey> {
        self.repository_info
            .values()
            .filter(|info| info.declares(contract))
            .map(|info| info.key)
            .collect()
    }

    /// Repositories that directly declare a supertrait named like `parent`.
    ///
    /// Declared user supertraits are recorded by name, so same-named traits
    /// from different modules are not told apart here.
    pub fn repositories_extending(&self, parent: TypeKey) -> BTreeSet<TypeKey> {
        self.repository_info
            .values()
            .filter(|info| info.declares_name(parent.name()))
            .map(|info| info.key)
            .collect()
    }

    pub fn repository(&self, key: TypeKey) -> Option<&RepositoryInfo> {
        self.repository_info.get(&key)
    }

    pub fn is_entity(&self, key: TypeKey) -> bool {
        self.entities.contains(&key)
    }

    pub fn is_embeddable(&self, key: TypeKey) -> bool {
        self.embeddables.contains(&key)
    }

    pub fn entity_shape(&self, key: TypeKey) -> Option<&'static EntityShape> {
        self.shapes.get(&key).copied()
    }

    /// Descriptor for `E`, built once and cached.
    pub fn descriptor<E: Entity>(&self) -> MappingResult<Arc<EntityDescriptor>> {
        self.descriptors.get::<E>()
    }

    /// Descriptor for a registered entity by key.
    pub fn descriptor_of(&self, key: TypeKey) -> MappingResult<Arc<EntityDescriptor>> {
        let shape = self
            .entity_shape(key)
            .ok_or(MappingError::UnknownEntity(key.name()))?;
        self.descriptors.get_shape(shape)
    }

    /// The registry's descriptor cache.
    pub fn descriptors(&self) -> &DescriptorCache {
        &self.descriptors
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("entities", &self.entities.len())
            .field("embeddables", &self.embeddables.len())
            .field("repositories", &self.repositories.len())
            .finish()
    }
}

/// Keep the candidates that are assignable to [`DataRepository`].
///
/// Assignability is decided by the compiler where each marker is declared, so
/// chains through unmarked user traits count as well.
///
/// [`DataRepository`]: crate::DataRepository
fn resolve_repositories(candidates: &BTreeMap<TypeKey, RepositoryMarker>) -> BTreeSet<TypeKey> {
    candidates
        .values()
        .filter_map(|marker| {
            if (marker.reaches_base)() {
                Some(marker.key)
            } else {
                debug!(
                    repository = marker.key.name(),
                    "skipping repository marker that does not reach a base contract"
                );
                None
            }
        })
        .collect()
}
