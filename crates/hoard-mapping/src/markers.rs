//! Declarative markers and the records they register.
//!
//! Application code never talks to the registry directly. It invokes
//! [`entity!`](crate::entity), [`embeddable!`](crate::embeddable) and
//! [`repository!`](crate::repository), which emit `inventory::submit!`
//! records. The [`InventoryScanner`](crate::InventoryScanner) collects them
//! when the registry is first built.
//!
//! ```ignore
//! #[derive(Serialize, Deserialize)]
//! pub struct Book {
//!     isbn: String,
//!     title: String,
//!     author: String,
//!     cover: Vec<u8>,
//! }
//!
//! hoard_mapping::entity!(Book { #[id] isbn, #[column] title, #[column] author, cover });
//!
//! pub trait BookRepository: CrudRepository<Entity = Book> {}
//! hoard_mapping::repository!(BookRepository: CrudRepository);
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::marker::PhantomData;

use serde_json::Value;

use crate::key::TypeKey;

/// Role of a listed entity field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// `#[id]`: the single identity field.
    Id,
    /// `#[column]`: a stored field.
    Column,
}

/// Reads one field off a type-erased instance.
///
/// Returns `None` when the instance is not of the owning type and
/// `Some(Err(_))` when the value cannot be rendered.
pub type FieldReader = fn(&dyn Any) -> Option<serde_json::Result<Value>>;

/// One field listed in an [`entity!`](crate::entity) declaration.
pub struct FieldSpec {
    /// Declared field name.
    pub name: &'static str,
    /// Marker on the field, `None` when the field is listed unmarked.
    pub role: Option<FieldRole>,
    /// Generated reader.
    pub read: FieldReader,
}

impl fmt::Debug for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldSpec")
            .field("name", &self.name)
            .field("role", &self.role)
            .finish()
    }
}

/// The declared shape of an entity type.
#[derive(Debug)]
pub struct EntityShape {
    pub key: TypeKey,
    pub fields: &'static [FieldSpec],
}

/// A type that carries the entity marker.
///
/// Implemented by [`entity!`](crate::entity); do not implement by hand.
pub trait Entity: Any + Send + Sync {
    /// The declared shape of this type.
    fn shape() -> &'static EntityShape;

    /// The registry key of this type.
    fn type_key() -> TypeKey {
        Self::shape().key
    }
}

/// Any value that can be handed to a field reader.
///
/// Blanket-implemented for every `'static` type so callers can pass `&book`
/// directly. The runtime type name is kept for diagnostics.
pub trait Instance: Any {
    /// Full name of the concrete type.
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting in field readers.
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> Instance for T {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Base data-access contract. Every repository contract must reach it.
///
/// The contracts are markers only: the methods a repository exposes are
/// provided by the facade layer, not by this crate.
pub trait DataRepository {
    type Entity: Entity;
}

/// Contract for repositories with create/read/update/delete semantics.
pub trait CrudRepository: DataRepository {}

/// Contract for repositories that also page through results.
pub trait PageableRepository: CrudRepository {}

/// The recognized base contracts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Contract {
    Data,
    Crud,
    Pageable,
}

impl Contract {
    /// Trait name as written in a `repository!` declaration.
    pub fn name(self) -> &'static str {
        match self {
            Self::Data => "DataRepository",
            Self::Crud => "CrudRepository",
            Self::Pageable => "PageableRepository",
        }
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A supertrait listed in a `repository!` declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Supertype {
    /// One of the base contracts.
    Base(Contract),
    /// Any other trait, by name.
    Declared(&'static str),
}

impl Supertype {
    pub fn name(self) -> &'static str {
        match self {
            Self::Base(contract) => contract.name(),
            Self::Declared(name) => name,
        }
    }
}

/// Marker kinds, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerKind {
    Entity,
    Embeddable,
    Repository,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Entity => "entity",
            Self::Embeddable => "embeddable",
            Self::Repository => "repository",
        })
    }
}

/// Registration record emitted by [`entity!`](crate::entity).
pub struct EntityMarker(pub fn() -> &'static EntityShape);
inventory::collect!(EntityMarker);

/// Registration record emitted by [`embeddable!`](crate::embeddable).
pub struct EmbeddableMarker(pub TypeKey);
inventory::collect!(EmbeddableMarker);

/// Registration record emitted by [`repository!`](crate::repository).
#[derive(Clone, Copy, Debug)]
pub struct RepositoryMarker {
    /// Key of `dyn Trait` for the repository contract.
    pub key: TypeKey,
    /// Supertraits in declaration order.
    pub extends: &'static [Supertype],
    /// Whether `dyn Trait` implements [`DataRepository`], through any chain
    /// of supertraits. Decided by the compiler where the marker is declared.
    pub reaches_base: fn() -> bool,
}
inventory::collect!(RepositoryMarker);

impl RepositoryMarker {
    /// Build a marker for the repository trait object `R`.
    pub fn of<R>(name: &'static str, extends: &'static [Supertype]) -> Self
    where
        R: ?Sized + DataRepository + 'static,
    {
        Self {
            key: TypeKey::new(name, TypeId::of::<R>),
            extends,
            reaches_base: || true,
        }
    }

    /// Build a marker for a trait object that is not a data-access contract.
    ///
    /// The registry records nothing for it.
    pub fn unbound<R: ?Sized + 'static>(name: &'static str, extends: &'static [Supertype]) -> Self {
        Self {
            key: TypeKey::new(name, TypeId::of::<R>),
            extends,
            reaches_base: || false,
        }
    }
}

/// Compile-time check behind [`RepositoryMarker::reaches_base`].
///
/// `(&BaseCheck::<dyn Trait>::new()).reaches_base()` resolves to
/// [`ReachesBase`] when `dyn Trait: DataRepository` and falls back to
/// [`MissesBase`] otherwise. Only works on a concrete trait object type.
#[doc(hidden)]
pub struct BaseCheck<T: ?Sized>(PhantomData<fn() -> *const T>);

impl<T: ?Sized> BaseCheck<T> {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

#[doc(hidden)]
pub trait ReachesBase {
    fn reaches_base(&self) -> bool {
        true
    }
}

impl<T: ?Sized + DataRepository> ReachesBase for BaseCheck<T> {}

#[doc(hidden)]
pub trait MissesBase {
    fn reaches_base(&self) -> bool {
        false
    }
}

impl<T: ?Sized> MissesBase for &BaseCheck<T> {}

/// Mark a struct as an entity and list its fields.
///
/// Fields marked `#[id]` or `#[column]` are mapped; fields listed without a
/// marker are ignored. Every mapped field type must implement `Serialize`.
/// Identity cardinality is checked when the descriptor is built.
#[macro_export]
macro_rules! entity {
    ($ty:ident { $( $(#[$role:ident])? $field:ident ),* $(,)? }) => {
        impl $crate::Entity for $ty {
            fn shape() -> &'static $crate::EntityShape {
                static SHAPE: $crate::EntityShape = $crate::EntityShape {
                    key: $crate::TypeKey::new(stringify!($ty), ::std::any::TypeId::of::<$ty>),
                    fields: &[
                        $(
                            $crate::FieldSpec {
                                name: stringify!($field),
                                role: $crate::__field_role!($($role)?),
                                read: |instance| {
                                    instance.downcast_ref::<$ty>().map(|entity| {
                                        $crate::__private::serde_json::to_value(&entity.$field)
                                    })
                                },
                            },
                        )*
                    ],
                };
                &SHAPE
            }
        }

        $crate::inventory::submit! {
            $crate::EntityMarker(<$ty as $crate::Entity>::shape)
        }
    };
}

/// Mark a value type as embeddable inside entities.
#[macro_export]
macro_rules! embeddable {
    ($ty:ident) => {
        $crate::inventory::submit! {
            $crate::EmbeddableMarker($crate::TypeKey::new(
                stringify!($ty),
                ::std::any::TypeId::of::<$ty>,
            ))
        }
    };
}

/// Mark a trait as a repository contract.
///
/// List the supertraits exactly as the trait declares them. The listing is
/// checked at compile time: each must be implemented by `dyn Trait`. The
/// registry keeps the marker only if `dyn Trait` is assignable to
/// [`DataRepository`](crate::DataRepository), directly or through unmarked
/// user traits.
#[macro_export]
macro_rules! repository {
    ($name:ident : $($supertype:ident),+ $(,)?) => {
        const _: fn() = || {
            $(
                {
                    fn declares<R: ?Sized + $supertype>() {}
                    declares::<dyn $name>();
                }
            )+
        };

        $crate::inventory::submit! {
            $crate::RepositoryMarker {
                key: $crate::TypeKey::new(stringify!($name), ::std::any::TypeId::of::<dyn $name>),
                extends: &[$($crate::__supertype!($supertype)),+],
                reaches_base: || {
                    #[allow(unused_imports)]
                    use $crate::__private::{MissesBase as _, ReachesBase as _};
                    (&$crate::__private::BaseCheck::<dyn $name>::new()).reaches_base()
                },
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __field_role {
    () => {
        ::std::option::Option::None
    };
    (id) => {
        ::std::option::Option::Some($crate::FieldRole::Id)
    };
    (column) => {
        ::std::option::Option::Some($crate::FieldRole::Column)
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __supertype {
    (DataRepository) => {
        $crate::Supertype::Base($crate::Contract::Data)
    };
    (CrudRepository) => {
        $crate::Supertype::Base($crate::Contract::Crud)
    };
    (PageableRepository) => {
        $crate::Supertype::Base($crate::Contract::Pageable)
    };
    ($other:ident) => {
        $crate::Supertype::Declared(stringify!($other))
    };
}
