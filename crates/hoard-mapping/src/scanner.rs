//! The type-discovery seam.
//!
//! A [`TypeScanner`] enumerates every marked type reachable from the
//! application. The registry only consumes its output; how the types are
//! found is the scanner's business.

use crate::error::ScanError;
use crate::key::TypeKey;
use crate::markers::{
    EmbeddableMarker, Entity, EntityMarker, EntityShape, RepositoryMarker,
};

/// Everything a scan found, unfiltered.
#[derive(Debug, Default, Clone)]
pub struct ScanOutput {
    pub entities: Vec<&'static EntityShape>,
    pub embeddables: Vec<TypeKey>,
    pub repositories: Vec<RepositoryMarker>,
}

/// Enumerates marked types.
pub trait TypeScanner: Send + Sync {
    fn scan(&self) -> Result<ScanOutput, ScanError>;
}

/// Collects the records emitted by the registration macros at link time.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryScanner;

impl TypeScanner for InventoryScanner {
    fn scan(&self) -> Result<ScanOutput, ScanError> {
        Ok(ScanOutput {
            entities: inventory::iter::<EntityMarker>
                .into_iter()
                .map(|marker| (marker.0)())
                .collect(),
            embeddables: inventory::iter::<EmbeddableMarker>
                .into_iter()
                .map(|marker| marker.0)
                .collect(),
            repositories: inventory::iter::<RepositoryMarker>
                .into_iter()
                .copied()
                .collect(),
        })
    }
}

/// A scanner over an explicit list of types.
///
/// For embedders that register types by hand instead of through the macros,
/// and for tests that need an isolated registry.
#[derive(Debug, Default, Clone)]
pub struct StaticScanner {
    output: ScanOutput,
}

impl StaticScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity<E: Entity>(mut self) -> Self {
        self.output.entities.push(E::shape());
        self
    }

    pub fn embeddable(mut self, key: TypeKey) -> Self {
        self.output.embeddables.push(key);
        self
    }

    pub fn repository(mut self, marker: RepositoryMarker) -> Self {
        self.output.repositories.push(marker);
        self
    }
}

impl TypeScanner for StaticScanner {
    fn scan(&self) -> Result<ScanOutput, ScanError> {
        Ok(self.output.clone())
    }
}
