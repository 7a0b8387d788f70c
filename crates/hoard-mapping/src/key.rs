use std::any::TypeId;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a registered type.
///
/// `TypeId::of` is not callable in a `static` initializer, so the key holds
/// the function itself and resolves it on demand. Equality, hashing and
/// ordering use the declared name and the resolved `TypeId` together; the name
/// comes first so listings sort alphabetically.
#[derive(Clone, Copy)]
pub struct TypeKey {
    name: &'static str,
    id: fn() -> TypeId,
}

impl TypeKey {
    /// Create a key from a declared name and a `TypeId::of::<T>` function.
    pub const fn new(name: &'static str, id: fn() -> TypeId) -> Self {
        Self { name, id }
    }

    /// The name the type was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The runtime type identifier.
    pub fn type_id(&self) -> TypeId {
        (self.id)()
    }

    /// Returns `true` if this key identifies `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.type_id() == other.type_id()
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.type_id().hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(other.name)
            .then_with(|| self.type_id().cmp(&other.type_id()))
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeKey").field(&self.name).finish()
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}
