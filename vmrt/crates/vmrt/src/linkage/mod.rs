//! Linkage Module - Link Resolution Protocol
//!
//! Method handle resolution does not search class hierarchies itself; it
//! drives a [`LinkResolver`] with the strategy selected by the reference
//! kind and turns the returned [`CallInfo`] into a dispatch index.
//!
//! ```text
//! LinkRequest ──► resolve_{static,interface,virtual,special,handle}_call
//!                                   │
//!                                   ▼
//!              CallInfo { resolved_klass, resolved_method, call_kind }
//! ```

pub mod resolver;

pub use resolver::HierarchyLinkResolver;

use std::sync::Arc;

use thiserror::Error;

use crate::intern::Symbol;
use crate::oops::{IntrinsicId, Klass, Method};

/// Errors of the link resolution protocol
#[derive(Debug, Clone, Error)]
pub enum LinkError {
    /// No method with this name and signature
    #[error("NoSuchMethodError: {0}")]
    NoSuchMethod(String),

    /// The referenced member is of the wrong kind for the request
    ///
    /// **Example scenarios:**
    /// - Static call to an instance method
    /// - Interface call against a class
    #[error("IncompatibleClassChangeError: {0}")]
    IncompatibleClassChange(String),

    /// Caller may not access the resolved member
    #[error("IllegalAccessError: {caller} cannot access {member}")]
    IllegalAccess { caller: String, member: String },

    /// Method is abstract where a concrete one is required
    #[error("AbstractMethodError: {0}")]
    AbstractMethod(String),
}

/// How a resolved call reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Statically bound
    Direct,
    /// Dispatched through the receiver's vtable
    Vtable { index: usize },
    /// Dispatched through the receiver's itable
    Itable { index: usize },
}

/// Result of link resolution
#[derive(Debug, Clone)]
pub struct CallInfo {
    resolved_klass: Arc<Klass>,
    resolved_method: Arc<Method>,
    selected_method: Arc<Method>,
    call_kind: CallKind,
}

impl CallInfo {
    pub fn new(resolved_klass: Arc<Klass>, resolved_method: Arc<Method>, call_kind: CallKind) -> Self {
        Self {
            resolved_klass,
            selected_method: Arc::clone(&resolved_method),
            resolved_method,
            call_kind,
        }
    }

    /// Call info describing `method` as seen from its own holder.
    ///
    /// `None` if the holder has been unloaded.
    pub fn for_method(method: &Arc<Method>) -> Option<Self> {
        let holder = method.holder()?;
        let call_kind = if method.is_static() || method.is_initializer() || method.can_be_statically_bound() {
            CallKind::Direct
        } else if holder.is_interface() && method.has_itable_index() {
            CallKind::Itable {
                index: method.itable_index() as usize,
            }
        } else if method.has_vtable_index() {
            CallKind::Vtable {
                index: method.vtable_index() as usize,
            }
        } else {
            CallKind::Direct
        };
        Some(Self::new(holder, Arc::clone(method), call_kind))
    }

    /// Receiver limit: the class the reference was resolved against
    pub fn resolved_klass(&self) -> &Arc<Klass> {
        &self.resolved_klass
    }

    pub fn resolved_method(&self) -> &Arc<Method> {
        &self.resolved_method
    }

    pub fn selected_method(&self) -> &Arc<Method> {
        &self.selected_method
    }

    pub fn call_kind(&self) -> CallKind {
        self.call_kind
    }
}

/// A symbolic member reference to resolve
#[derive(Debug, Clone)]
pub struct LinkRequest {
    pub resolved_klass: Arc<Klass>,
    pub name: Symbol,
    pub signature: Symbol,
    /// Accessing class, if any
    pub current_klass: Option<Arc<Klass>>,
    pub check_access: bool,
}

impl LinkRequest {
    pub fn new(resolved_klass: Arc<Klass>, name: Symbol, signature: Symbol) -> Self {
        Self {
            resolved_klass,
            name,
            signature,
            current_klass: None,
            check_access: false,
        }
    }

    pub fn with_caller(mut self, caller: Option<Arc<Klass>>, check_access: bool) -> Self {
        self.current_klass = caller;
        self.check_access = check_access;
        self
    }

    /// `pkg.Class.name(sig)` for error messages
    pub fn describe(&self) -> String {
        format!(
            "{}.{}{}",
            self.resolved_klass.external_name(),
            self.name,
            self.signature
        )
    }
}

/// LinkResolver - resolution strategies per invocation mode
pub trait LinkResolver: Send + Sync {
    fn resolve_static_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError>;

    fn resolve_interface_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError>;

    fn resolve_virtual_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError>;

    fn resolve_special_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError>;

    /// Link a signature-polymorphic call to its intrinsic invoker.
    fn resolve_handle_call(
        &self,
        request: &LinkRequest,
        intrinsic: IntrinsicId,
    ) -> Result<CallInfo, LinkError>;
}
