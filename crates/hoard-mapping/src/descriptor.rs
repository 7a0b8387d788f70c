//! Entity descriptors and the per-process descriptor cache.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use crate::error::{AccessError, MappingError, MappingResult};
use crate::field::FieldAccessor;
use crate::key::TypeKey;
use crate::markers::{Entity, EntityShape, FieldRole, Instance};

/// Identity and stored-field accessors for one entity type.
///
/// Built from the declared [`EntityShape`]. Invariants, checked at build time:
/// exactly one `#[id]` field, and no field name listed twice. The descriptor is
/// immutable afterwards and can be shared freely across threads.
#[derive(Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    entity: TypeKey,
    id: FieldAccessor,
    fields: Vec<FieldAccessor>,
}

impl EntityDescriptor {
    /// Build the descriptor for `E`.
    pub fn of<E: Entity>() -> MappingResult<Self> {
        Self::from_shape(E::shape())
    }

    /// Build a descriptor from a declared shape.
    pub fn from_shape(shape: &'static EntityShape) -> MappingResult<Self> {
        let entity = shape.key;

        let mut seen = HashSet::new();
        for spec in shape.fields {
            if !seen.insert(spec.name) {
                return Err(MappingError::DuplicateField {
                    entity: entity.name(),
                    field: spec.name,
                });
            }
        }

        let mut ids = Vec::new();
        let mut fields = Vec::new();
        for spec in shape.fields {
            let accessor = FieldAccessor::new(entity, spec);
            match spec.role {
                Some(FieldRole::Id) => ids.push(accessor),
                Some(FieldRole::Column) => fields.push(accessor),
                None => {}
            }
        }

        let id = match ids.as_slice() {
            [] => {
                return Err(MappingError::MissingId {
                    entity: entity.name(),
                })
            }
            [id] => *id,
            _ => {
                return Err(MappingError::DuplicateId {
                    entity: entity.name(),
                    fields: ids.iter().map(FieldAccessor::name).collect(),
                })
            }
        };

        Ok(Self { entity, id, fields })
    }

    /// The described entity type.
    pub fn entity(&self) -> TypeKey {
        self.entity
    }

    /// The identity field accessor.
    pub fn id(&self) -> &FieldAccessor {
        &self.id
    }

    /// Stored-field accessors, in declaration order. Excludes the identity.
    pub fn fields(&self) -> &[FieldAccessor] {
        &self.fields
    }

    /// Look up a stored field by name.
    pub fn field(&self, name: &str) -> Option<&FieldAccessor> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Read the identity value off `instance`.
    pub fn id_value(&self, instance: &dyn Instance) -> Result<Value, AccessError> {
        self.id.read(instance)
    }

    /// Read every stored field off `instance`, keyed by field name.
    ///
    /// The first failing accessor aborts the whole read.
    pub fn field_values(
        &self,
        instance: &dyn Instance,
    ) -> Result<BTreeMap<&'static str, Value>, AccessError> {
        self.fields
            .iter()
            .map(|field| Ok::<_, AccessError>((field.name(), field.read(instance)?)))
            .collect()
    }
}

impl fmt::Debug for EntityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<_> = self.fields.iter().map(FieldAccessor::name).collect();
        f.debug_struct("EntityDescriptor")
            .field("entity", &self.entity)
            .field("id", &self.id.name())
            .field("fields", &fields)
            .finish()
    }
}

/// Builds each entity descriptor once and hands out shared references.
///
/// Mapping failures are returned to the caller and not cached, so a request
/// for a malformed entity fails the same way every time.
#[derive(Default)]
pub struct DescriptorCache {
    descriptors: RwLock<HashMap<TypeKey, Arc<EntityDescriptor>>>,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor for `E`, built on first request.
    pub fn get<E: Entity>(&self) -> MappingResult<Arc<EntityDescriptor>> {
        self.get_shape(E::shape())
    }

    /// Descriptor for a declared shape, built on first request.
    pub fn get_shape(&self, shape: &'static EntityShape) -> MappingResult<Arc<EntityDescriptor>> {
        if let Some(descriptor) = self.descriptors.read().get(&shape.key) {
            return Ok(Arc::clone(descriptor));
        }

        let mut descriptors = self.descriptors.write();
        // Another caller may have built it while we waited for the write lock.
        if let Some(descriptor) = descriptors.get(&shape.key) {
            return Ok(Arc::clone(descriptor));
        }

        let descriptor = Arc::new(EntityDescriptor::from_shape(shape)?);
        debug!(
            entity = shape.key.name(),
            id = descriptor.id().name(),
            fields = descriptor.fields().len(),
            "built entity descriptor"
        );
        descriptors.insert(shape.key, Arc::clone(&descriptor));
        Ok(descriptor)
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.read().is_empty()
    }
}

impl fmt::Debug for DescriptorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DescriptorCache")
            .field("cached", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use serde_json::json;

    #[derive(Serialize)]
    struct Book {
        isbn: String,
        title: String,
        author: String,
        cover: Vec<u8>,
    }

    crate::entity!(Book { #[id] isbn, #[column] title, #[column] author, cover });

    #[derive(Serialize)]
    struct Pair {
        left: u32,
        right: u32,
    }

    crate::entity!(Pair { #[id] left, #[id] right });

    #[derive(Serialize)]
    struct Note {
        body: String,
    }

    crate::entity!(Note { #[column] body });

    #[derive(Serialize)]
    struct Echo {
        key: u32,
        word: String,
    }

    crate::entity!(Echo { #[id] key, #[column] word, #[column] word });

    #[derive(Serialize)]
    struct Gadget {
        id: u32,
    }

    fn clean_code() -> Book {
        Book {
            isbn: "1231".into(),
            title: "Clean Code".into(),
            author: "Robert Martin".into(),
            cover: vec![0xff, 0xd8],
        }
    }

    #[test]
    fn book_descriptor_classifies_fields() {
        let descriptor = EntityDescriptor::of::<Book>().unwrap();
        assert_eq!(descriptor.entity().name(), "Book");
        assert_eq!(descriptor.id().name(), "isbn");

        let names: Vec<_> = descriptor.fields().iter().map(FieldAccessor::name).collect();
        assert_eq!(names, vec!["title", "author"]);
        assert!(descriptor.field("cover").is_none());
        assert!(descriptor.field("isbn").is_none());
    }

    #[test]
    fn id_value_and_field_values() {
        let descriptor = EntityDescriptor::of::<Book>().unwrap();
        let book = clean_code();

        assert_eq!(descriptor.id_value(&book).unwrap(), json!("1231"));

        let values = descriptor.field_values(&book).unwrap();
        let expected: BTreeMap<&str, Value> = [
            ("title", json!("Clean Code")),
            ("author", json!("Robert Martin")),
        ]
        .into_iter()
        .collect();
        assert_eq!(values, expected);
    }

    #[test]
    fn two_id_fields_is_mapping_error() {
        let err = EntityDescriptor::of::<Pair>().unwrap_err();
        assert_eq!(
            err,
            MappingError::DuplicateId {
                entity: "Pair",
                fields: vec!["left", "right"],
            }
        );
    }

    #[test]
    fn no_id_field_is_mapping_error() {
        let err = EntityDescriptor::of::<Note>().unwrap_err();
        assert_eq!(err, MappingError::MissingId { entity: "Note" });
    }

    #[test]
    fn repeated_field_is_mapping_error() {
        let err = EntityDescriptor::of::<Echo>().unwrap_err();
        assert_eq!(
            err,
            MappingError::DuplicateField {
                entity: "Echo",
                field: "word",
            }
        );
    }

    #[test]
    fn field_values_on_wrong_instance_fails() {
        let descriptor = EntityDescriptor::of::<Book>().unwrap();
        let gadget = Gadget { id: 7 };

        let err = descriptor.field_values(&gadget).unwrap_err();
        assert_eq!(err.field, "title");
        assert!(err.instance_type.ends_with("Gadget"));

        assert!(descriptor.id_value(&gadget).is_err());
    }

    #[test]
    fn cache_builds_once_and_shares() {
        let cache = DescriptorCache::new();
        assert!(cache.is_empty());

        let first = cache.get::<Book>().unwrap();
        let second = cache.get::<Book>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_does_not_store_failures() {
        let cache = DescriptorCache::new();
        assert!(cache.get::<Pair>().is_err());
        assert!(cache.get::<Pair>().is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_first_requests_share_one_descriptor() {
        use std::thread;

        let cache = Arc::new(DescriptorCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get::<Book>().unwrap())
            })
            .collect();

        let descriptors: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread should not panic"))
            .collect();
        for d in &descriptors[1..] {
            assert!(Arc::ptr_eq(&descriptors[0], d));
        }
        assert_eq!(cache.len(), 1);
    }
}
