//! Attribute index over the sources of one at-expression.
//!
//! Name and type lookups search the sources' own attributes first and fall
//! back to one-hop attributes reached through a referenced entity or struct.
//! All result lists are ordered by source declaration, then attribute
//! declaration, which fixes the candidate order in ambiguity errors.

use crate::catalog::Catalog;
use crate::types::Type;

/// A resolved, possibly multi-hop attribute access.
///
/// `path` is non-empty; each intermediate step resolves to an entity or
/// struct type exposing the next segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    /// Index of the owning source in declaration order.
    pub source: usize,
    /// Attribute path from the source element.
    pub path: Vec<String>,
    /// Type of the final attribute.
    pub ty: Type,
}

impl AttributeRef {
    /// Simple name of the attribute, the last path segment.
    #[must_use]
    pub fn simple_name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or_default()
    }
}

/// All attributes reachable from a list of source element types.
#[derive(Debug)]
pub struct AttributeIndex {
    /// Source aliases, for diagnostics.
    aliases: Vec<String>,
    /// Own attributes of each source.
    own: Vec<AttributeRef>,
    /// Attributes one step through a referenced entity or struct.
    one_hop: Vec<AttributeRef>,
}

impl AttributeIndex {
    /// Builds the index for the given sources.
    #[must_use]
    pub fn build(catalog: &Catalog, sources: &[(String, Type)]) -> Self {
        let mut own = Vec::new();
        let mut one_hop = Vec::new();

        for (source, (_, element_ty)) in sources.iter().enumerate() {
            for attr in catalog.attrs_of(element_ty) {
                own.push(AttributeRef {
                    source,
                    path: vec![attr.name.clone()],
                    ty: attr.ty.clone(),
                });
                for nested in catalog.attrs_of(&attr.ty) {
                    one_hop.push(AttributeRef {
                        source,
                        path: vec![attr.name.clone(), nested.name.clone()],
                        ty: nested.ty.clone(),
                    });
                }
            }
        }

        AttributeIndex {
            aliases: sources.iter().map(|(a, _)| a.clone()).collect(),
            own,
            one_hop,
        }
    }

    /// Attributes whose simple name matches, own attributes taking
    /// precedence over one-hop ones.
    #[must_use]
    pub fn find_by_name(&self, name: &str) -> Vec<&AttributeRef> {
        let direct: Vec<&AttributeRef> =
            self.own.iter().filter(|a| a.simple_name() == name).collect();
        if !direct.is_empty() {
            return direct;
        }
        self.one_hop
            .iter()
            .filter(|a| a.simple_name() == name)
            .collect()
    }

    /// Attributes whose type matches exactly, own attributes taking
    /// precedence over one-hop ones.
    #[must_use]
    pub fn find_by_type(&self, ty: &Type) -> Vec<&AttributeRef> {
        let direct: Vec<&AttributeRef> = self.own.iter().filter(|a| a.ty == *ty).collect();
        if !direct.is_empty() {
            return direct;
        }
        self.one_hop.iter().filter(|a| a.ty == *ty).collect()
    }

    /// `alias.attr` label for a candidate list in an ambiguity error.
    #[must_use]
    pub fn candidate_label(&self, attr: &AttributeRef) -> String {
        let alias = self
            .aliases
            .get(attr.source)
            .map_or("?", String::as_str);
        format!("{alias}.{}", attr.path.join("."))
    }
}
