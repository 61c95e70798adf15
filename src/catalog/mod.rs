//! Schema catalog: entity and struct definitions.
//!
//! The catalog is built once per module and shared read-only across every
//! at-expression compilation. It answers two questions: what does a name in
//! a from-clause refer to, and which typed attributes does a source type
//! expose.

mod attrs;

pub use attrs::{AttributeIndex, AttributeRef};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};
use crate::types::Type;

/// A named, typed attribute of an entity or struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrDef {
    pub name: String,
    pub ty: Type,
}

impl AttrDef {
    /// Creates an attribute definition.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        AttrDef {
            name: name.into(),
            ty,
        }
    }
}

/// Schema of a backend-resident entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    /// Attributes in declaration order.
    pub attrs: Vec<AttrDef>,
}

impl EntityDef {
    /// Creates an entity definition.
    #[must_use]
    pub fn new(name: impl Into<String>, attrs: Vec<AttrDef>) -> Self {
        EntityDef {
            name: name.into(),
            attrs,
        }
    }
}

/// Schema of an in-memory struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructDef {
    pub name: String,
    /// Attributes in declaration order.
    pub attrs: Vec<AttrDef>,
}

impl StructDef {
    /// Creates a struct definition.
    #[must_use]
    pub fn new(name: impl Into<String>, attrs: Vec<AttrDef>) -> Self {
        StructDef {
            name: name.into(),
            attrs,
        }
    }
}

/// Central registry of entity and struct schemas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    entities: HashMap<String, EntityDef>,
    structs: HashMap<String, StructDef>,
}

impl Catalog {
    /// Creates a new empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Catalog {
            entities: HashMap::new(),
            structs: HashMap::new(),
        }
    }

    /// Registers an entity schema.
    ///
    /// # Errors
    ///
    /// Returns an error if a definition with the same name already exists.
    pub fn define_entity(&mut self, def: EntityDef) -> CompileResult<()> {
        if self.entities.contains_key(&def.name) || self.structs.contains_key(&def.name) {
            return Err(CompileError::DuplicateDefinition {
                name: def.name.clone(),
            });
        }
        self.entities.insert(def.name.clone(), def);
        Ok(())
    }

    /// Registers a struct schema.
    ///
    /// # Errors
    ///
    /// Returns an error if a definition with the same name already exists.
    pub fn define_struct(&mut self, def: StructDef) -> CompileResult<()> {
        if self.entities.contains_key(&def.name) || self.structs.contains_key(&def.name) {
            return Err(CompileError::DuplicateDefinition {
                name: def.name.clone(),
            });
        }
        self.structs.insert(def.name.clone(), def);
        Ok(())
    }

    /// Retrieves an entity schema by name.
    #[must_use]
    pub fn entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Retrieves a struct schema by name.
    #[must_use]
    pub fn strukt(&self, name: &str) -> Option<&StructDef> {
        self.structs.get(name)
    }

    /// Attributes exposed by a type, in declaration order.
    ///
    /// Only entities and structs expose attributes; every other type yields
    /// an empty slice.
    #[must_use]
    pub fn attrs_of(&self, ty: &Type) -> &[AttrDef] {
        match ty {
            Type::Entity(name) => self.entities.get(name).map_or(&[], |e| &e.attrs),
            Type::Struct(name) => self.structs.get(name).map_or(&[], |s| &s.attrs),
            _ => &[],
        }
    }

    /// Looks up one attribute of a type by name.
    #[must_use]
    pub fn attr_of(&self, ty: &Type, name: &str) -> Option<&AttrDef> {
        self.attrs_of(ty).iter().find(|a| a.name == name)
    }
}
