//! Conversion context that holds state shared by the pipeline stages.

use std::sync::Arc;

use tracing::{info, warn};

use crate::field::{FieldCatalog, FieldRegistry};

/// Context for one conversion run.
///
/// Holds the known field catalog every layout of the run is classified
/// against, so that known fields keep a single identity across layouts.
/// Fields discovered while parsing are tracked per layout in the registry
/// returned by [`new_registry`](Self::new_registry).
#[derive(Debug, Clone)]
pub struct ConversionContext {
    /// Known field descriptors
    pub catalog: Arc<FieldCatalog>,
    /// Verbosity level (0=quiet, 1=warnings, 2=info, 3=debug)
    pub verbosity: u8,
}

impl ConversionContext {
    /// Creates a context over the given field catalog.
    pub fn new(catalog: Arc<FieldCatalog>) -> Self {
        Self {
            catalog,
            verbosity: 1,
        }
    }

    /// Creates a context over the built-in field catalog.
    pub fn builtin() -> Self {
        Self::new(FieldCatalog::builtin())
    }

    /// Sets the verbosity level.
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Starts a parse session with an empty list of unknown fields.
    pub fn new_registry(&self) -> FieldRegistry {
        FieldRegistry::new(Arc::clone(&self.catalog))
    }

    /// Logs a warning message if verbosity is high enough.
    pub fn warn(&self, message: &str) {
        if self.verbosity >= 1 {
            warn!("{}", message);
        }
    }

    /// Logs an info message if verbosity is high enough.
    pub fn info(&self, message: &str) {
        if self.verbosity >= 2 {
            info!("{}", message);
        }
    }
}

impl Default for ConversionContext {
    fn default() -> Self {
        Self::builtin()
    }
}
