//! SystemDictionary - defined classes by name

use std::hash::BuildHasherDefault;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHasher;

use super::klass::Klass;
use crate::error::{Result, VmError};
use crate::intern::{Symbol, SymbolTable};

type ClassMap = IndexMap<Symbol, Arc<Klass>, BuildHasherDefault<FxHasher>>;

/// Defined classes keyed by interned name, in definition order.
#[derive(Default)]
pub struct SystemDictionary {
    classes: RwLock<ClassMap>,
}

impl SystemDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a built klass. A name can be defined once.
    pub fn define(&self, klass: Arc<Klass>) -> Result<Arc<Klass>> {
        let mut classes = self.classes.write();
        if classes.contains_key(klass.name()) {
            return Err(VmError::ClassFormat(format!(
                "duplicate class definition for {}",
                klass.external_name()
            )));
        }
        classes.insert(klass.name().clone(), Arc::clone(&klass));
        log::trace!("dictionary: defined {}", klass.external_name());
        Ok(klass)
    }

    pub fn find(&self, name: &Symbol) -> Option<Arc<Klass>> {
        self.classes.read().get(name).cloned()
    }

    /// Find by internal name without interning it.
    pub fn find_by_name(&self, symbols: &SymbolTable, name: &str) -> Option<Arc<Klass>> {
        let symbol = symbols.probe(name)?;
        self.find(&symbol)
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }

    /// Snapshot of every class, oldest first
    pub fn classes(&self) -> Vec<Arc<Klass>> {
        self.classes.read().values().cloned().collect()
    }
}
