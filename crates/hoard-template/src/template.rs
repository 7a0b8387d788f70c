use std::fmt;
use std::sync::Arc;

use hoard_mapping::{DescriptorCache, Entity, EntityDescriptor, MappingResult, TypeRegistry};
use hoard_store::{CommittedMap, Encoding, FileSink, StoreConfig, StoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::key::{entity_path, EntityKey, IdKey};

/// The map a template stores its documents in.
pub type DocumentMap = CommittedMap<EntityKey, Value>;

/// Where a template gets its entity descriptors.
enum Descriptors {
    /// Any type implementing [`Entity`] is accepted.
    Cache(Arc<DescriptorCache>),
    /// Only types the registry found are accepted.
    Registry(&'static TypeRegistry),
}

impl Descriptors {
    fn get<E: Entity>(&self) -> MappingResult<Arc<EntityDescriptor>> {
        match self {
            Descriptors::Cache(cache) => cache.get::<E>(),
            Descriptors::Registry(registry) => registry.descriptor_of(E::type_key()),
        }
    }
}

/// Entity-level operations over one shared [`DocumentMap`].
///
/// Each entity is stored as its full JSON document under an [`EntityKey`]
/// made of the entity type path and its `#[id]` value. Every mutating call is one
/// commit of the underlying map, bulk calls included.
///
/// Several templates, of any entity types, can share one map.
pub struct Template {
    map: Arc<DocumentMap>,
    descriptors: Descriptors,
}

impl Template {
    /// A template over `map` with its own descriptor cache.
    pub fn new(map: Arc<DocumentMap>) -> Self {
        Self {
            map,
            descriptors: Descriptors::Cache(Arc::new(DescriptorCache::new())),
        }
    }

    /// Share a descriptor cache with other templates.
    pub fn with_cache(mut self, cache: Arc<DescriptorCache>) -> Self {
        self.descriptors = Descriptors::Cache(cache);
        self
    }

    /// Accept only entity types known to `registry`, using its descriptors.
    pub fn with_registry(mut self, registry: &'static TypeRegistry) -> Self {
        self.descriptors = Descriptors::Registry(registry);
        self
    }

    /// A template over `map` restricted to the process-wide registry.
    pub fn global(map: Arc<DocumentMap>) -> TemplateResult<Self> {
        Ok(Self::new(map).with_registry(TypeRegistry::global()?))
    }

    /// Open the snapshot file described by `config` and resume from it.
    ///
    /// Documents are dynamically typed, so the snapshot must use JSON encoding.
    pub fn open(config: &StoreConfig) -> TemplateResult<Self> {
        if config.encoding != Encoding::Json {
            return Err(StoreError::Config(format!(
                "template documents need json encoding, got {:?}",
                config.encoding
            ))
            .into());
        }
        let sink: FileSink<EntityKey, Value> = FileSink::open(config).map_err(StoreError::from)?;
        let map: DocumentMap = CommittedMap::open(Arc::new(sink))?;
        Ok(Self::new(Arc::new(map)))
    }

    /// The underlying document map.
    pub fn map(&self) -> &Arc<DocumentMap> {
        &self.map
    }

    /// Store `entity`, replacing any stored entity with the same identity.
    pub fn insert<E: Entity + Serialize>(&self, entity: &E) -> TemplateResult<()> {
        let descriptor = self.descriptors.get::<E>()?;
        let (key, document) = self.document(&descriptor, entity)?;
        debug!(key = %key, "insert");
        self.map.put(key, document)?;
        Ok(())
    }

    /// Store every entity with a single commit.
    ///
    /// Two entities with the same identity reject the whole batch.
    pub fn insert_all<E: Entity + Serialize>(&self, entities: &[E]) -> TemplateResult<()> {
        let descriptor = self.descriptors.get::<E>()?;
        let batch = entities
            .iter()
            .map(|entity| self.document(&descriptor, entity))
            .collect::<TemplateResult<Vec<_>>>()?;
        debug!(entity = E::type_key().name(), count = batch.len(), "insert batch");
        self.map.put_all(batch)?;
        Ok(())
    }

    /// Same as [`insert`](Self::insert): the store has upsert semantics.
    pub fn update<E: Entity + Serialize>(&self, entity: &E) -> TemplateResult<()> {
        self.insert(entity)
    }

    /// Same as [`insert_all`](Self::insert_all).
    pub fn update_all<E: Entity + Serialize>(&self, entities: &[E]) -> TemplateResult<()> {
        self.insert_all(entities)
    }

    /// The stored entity of type `E` with identity `id`.
    pub fn find<E, I>(&self, id: &I) -> TemplateResult<Option<E>>
    where
        E: Entity + DeserializeOwned,
        I: Serialize + ?Sized,
    {
        let key = self.key_for::<E, I>(id)?;
        self.map
            .get(&key)
            .map(serde_json::from_value)
            .transpose()
            .map_err(TemplateError::from)
    }

    /// Remove the entity of type `E` with identity `id`. Absent ids are ignored.
    pub fn delete<E, I>(&self, id: &I) -> TemplateResult<()>
    where
        E: Entity,
        I: Serialize + ?Sized,
    {
        let key = self.key_for::<E, I>(id)?;
        debug!(key = %key, "delete");
        self.map.remove(&key)?;
        Ok(())
    }

    /// Remove every listed identity of type `E` with a single commit.
    pub fn delete_all<E, I>(&self, ids: impl IntoIterator<Item = I>) -> TemplateResult<()>
    where
        E: Entity,
        I: Serialize,
    {
        let keys = ids
            .into_iter()
            .map(|id| self.key_for::<E, I>(&id))
            .collect::<TemplateResult<Vec<_>>>()?;
        debug!(entity = E::type_key().name(), count = keys.len(), "delete batch");
        self.map.remove_all(&keys)?;
        Ok(())
    }

    /// Every stored entity of type `E`, in insertion order.
    pub fn find_all<E: Entity + DeserializeOwned>(&self) -> TemplateResult<Vec<E>> {
        self.descriptors.get::<E>()?;
        let path = entity_path::<E>();
        self.map
            .entries()
            .into_iter()
            .filter(|(key, _)| key.is(path))
            .map(|(_, document)| serde_json::from_value(document).map_err(TemplateError::from))
            .collect()
    }

    /// Number of stored entities of type `E`.
    pub fn count<E: Entity>(&self) -> TemplateResult<usize> {
        self.descriptors.get::<E>()?;
        let path = entity_path::<E>();
        Ok(self.map.keys().iter().filter(|key| key.is(path)).count())
    }

    fn document<E: Entity + Serialize>(
        &self,
        descriptor: &EntityDescriptor,
        entity: &E,
    ) -> TemplateResult<(EntityKey, Value)> {
        let id = IdKey::from_value(&descriptor.id_value(entity)?);
        let key = checked_key::<E>(id)?;
        Ok((key, serde_json::to_value(entity)?))
    }

    fn key_for<E: Entity, I: Serialize + ?Sized>(&self, id: &I) -> TemplateResult<EntityKey> {
        self.descriptors.get::<E>()?;
        checked_key::<E>(IdKey::of(id)?)
    }
}

fn checked_key<E: Entity>(id: IdKey) -> TemplateResult<EntityKey> {
    if id.is_null() {
        return Err(TemplateError::NullId {
            entity: E::type_key().name(),
        });
    }
    Ok(EntityKey::of::<E>(id))
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptors = match &self.descriptors {
            Descriptors::Cache(_) => "cache",
            Descriptors::Registry(_) => "registry",
        };
        f.debug_struct("Template")
            .field("map", &self.map)
            .field("descriptors", &descriptors)
            .finish()
    }
}
