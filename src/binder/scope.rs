//! Compile-time scope: local variables, host function signatures, and the
//! per-at-expression frame stack used for placeholder resolution.

use std::collections::HashMap;

use crate::binder::source::BoundSource;
use crate::catalog::AttributeIndex;
use crate::types::Type;

/// Signature of a host function callable from where/what expressions.
///
/// Host functions are never pushable to the storage backend; a call inside a
/// backend-resident term is a compile error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FnSig {
    pub params: Vec<Type>,
    pub ret: Type,
}

impl FnSig {
    /// Creates a signature.
    #[must_use]
    pub fn new(params: Vec<Type>, ret: Type) -> Self {
        FnSig { params, ret }
    }
}

/// Static bindings visible at the at-expression's compile site.
///
/// Supplied by the host language's module/scope resolver; the binder only
/// reads it.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    locals: HashMap<String, Type>,
    fns: HashMap<String, FnSig>,
}

impl Scope {
    /// Creates an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Scope {
            locals: HashMap::new(),
            fns: HashMap::new(),
        }
    }

    /// Adds a local variable.
    #[must_use]
    pub fn with_local(mut self, name: impl Into<String>, ty: Type) -> Self {
        self.locals.insert(name.into(), ty);
        self
    }

    /// Adds a host function signature.
    #[must_use]
    pub fn with_fn(mut self, name: impl Into<String>, sig: FnSig) -> Self {
        self.fns.insert(name.into(), sig);
        self
    }

    /// Looks up a local variable's type.
    #[must_use]
    pub fn local(&self, name: &str) -> Option<&Type> {
        self.locals.get(name)
    }

    /// Looks up a host function signature.
    #[must_use]
    pub fn fn_sig(&self, name: &str) -> Option<&FnSig> {
        self.fns.get(name)
    }

    /// Returns true if a local with the given name exists.
    #[must_use]
    pub fn contains_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Iterates over the names of all locals.
    pub fn local_names(&self) -> impl Iterator<Item = &str> {
        self.locals.keys().map(String::as_str)
    }
}

/// One compilation frame, pushed for the duration of one at-expression's
/// where/what binding.
#[derive(Debug)]
pub struct AtFrame {
    /// Identity of the owning at-expression, unique per compilation.
    pub at_id: usize,
    /// Bound sources in declaration order.
    pub sources: Vec<BoundSource>,
    /// Source index the `$` placeholder may refer to, if any.
    ///
    /// Present only when the frame has exactly one source and that source
    /// carries no explicit alias.
    pub placeholder: Option<usize>,
    /// Attribute index over this frame's sources.
    pub attrs: AttributeIndex,
}

impl AtFrame {
    /// Finds a source of this frame by alias.
    #[must_use]
    pub fn source_by_alias(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.alias == name)
    }
}
