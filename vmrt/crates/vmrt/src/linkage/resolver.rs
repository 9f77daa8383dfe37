//! HierarchyLinkResolver - link resolution over the in-process class model

use std::sync::Arc;

use dashmap::DashMap;

use super::{CallInfo, CallKind, LinkError, LinkRequest, LinkResolver};
use crate::intern::Symbol;
use crate::oops::{
    AccessFlags, IntrinsicId, Klass, Method, INVALID_ITABLE_INDEX, NONVIRTUAL_VTABLE_INDEX,
};

const METHOD_HANDLE: &[u8] = b"java/lang/invoke/MethodHandle";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct InvokerKey {
    intrinsic: IntrinsicId,
    name: Symbol,
    signature: Symbol,
}

/// Resolves references by walking superclasses and implemented interfaces.
///
/// Signature-polymorphic calls are linked to synthetic native invokers,
/// materialized once per intrinsic, name and signature.
pub struct HierarchyLinkResolver {
    invokers: DashMap<InvokerKey, Arc<Method>, ahash::RandomState>,
}

impl HierarchyLinkResolver {
    pub fn new() -> Self {
        Self {
            invokers: DashMap::with_hasher(ahash::RandomState::new()),
        }
    }

    /// Number of materialized intrinsic invokers
    pub fn invoker_count(&self) -> usize {
        self.invokers.len()
    }

    fn no_such_method(request: &LinkRequest) -> LinkError {
        LinkError::NoSuchMethod(request.describe())
    }

    fn check_class_access(request: &LinkRequest) -> Result<(), LinkError> {
        let Some(current) = request.current_klass.as_ref().filter(|_| request.check_access) else {
            return Ok(());
        };
        let target = &request.resolved_klass;
        if target.is_public() || current.is_same_class_package(target) {
            return Ok(());
        }
        Err(LinkError::IllegalAccess {
            caller: current.external_name(),
            member: target.external_name(),
        })
    }

    fn check_method_access(request: &LinkRequest, method: &Method) -> Result<(), LinkError> {
        let Some(current) = request.current_klass.as_ref().filter(|_| request.check_access) else {
            return Ok(());
        };
        let Some(holder) = method.holder() else {
            return Ok(());
        };
        let allowed = if method.is_public() {
            true
        } else if method.is_private() {
            Arc::ptr_eq(current, &holder)
        } else if method.is_protected() {
            current.is_same_class_package(&holder) || current.is_subclass_of(&holder)
        } else {
            current.is_same_class_package(&holder)
        };
        if allowed {
            Ok(())
        } else {
            Err(LinkError::IllegalAccess {
                caller: current.external_name(),
                member: method.external_name(),
            })
        }
    }

    /// Class method lookup: superclasses first, then default/miranda
    /// candidates from interfaces.
    fn lookup_class_method(request: &LinkRequest) -> Result<Arc<Method>, LinkError> {
        let klass = &request.resolved_klass;
        klass
            .uncached_lookup_method(&request.name, &request.signature)
            .or_else(|| klass.lookup_method_in_all_interfaces(&request.name, &request.signature))
            .ok_or_else(|| Self::no_such_method(request))
    }

    /// Interface method lookup; public `java/lang/Object` methods are
    /// members of every interface.
    fn lookup_interface_method(request: &LinkRequest) -> Result<Arc<Method>, LinkError> {
        let klass = &request.resolved_klass;
        klass
            .find_method(&request.name, &request.signature)
            .or_else(|| klass.lookup_method_in_all_interfaces(&request.name, &request.signature))
            .or_else(|| {
                klass
                    .super_klass()?
                    .uncached_lookup_method(&request.name, &request.signature)
                    .filter(|m| m.is_public() && !m.is_static())
            })
            .ok_or_else(|| Self::no_such_method(request))
    }

    fn require_instance_method(request: &LinkRequest, method: &Method) -> Result<(), LinkError> {
        if method.is_static() {
            return Err(LinkError::IncompatibleClassChange(format!(
                "Expecting non-static method {}",
                request.describe()
            )));
        }
        Ok(())
    }

    fn dispatch_kind(method: &Method) -> CallKind {
        if method.can_be_statically_bound() || !method.has_vtable_index() {
            CallKind::Direct
        } else {
            CallKind::Vtable {
                index: method.vtable_index() as usize,
            }
        }
    }
}

impl Default for HierarchyLinkResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkResolver for HierarchyLinkResolver {
    fn resolve_static_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError> {
        Self::check_class_access(request)?;
        let klass = &request.resolved_klass;
        let method = if klass.is_interface() {
            klass
                .find_method(&request.name, &request.signature)
                .ok_or_else(|| Self::no_such_method(request))?
        } else {
            Self::lookup_class_method(request)?
        };
        if !method.is_static() {
            return Err(LinkError::IncompatibleClassChange(format!(
                "Expected static method {}",
                request.describe()
            )));
        }
        Self::check_method_access(request, &method)?;
        Ok(CallInfo::new(Arc::clone(klass), method, CallKind::Direct))
    }

    fn resolve_interface_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError> {
        Self::check_class_access(request)?;
        let klass = &request.resolved_klass;
        if !klass.is_interface() {
            return Err(LinkError::IncompatibleClassChange(format!(
                "Found class {}, but interface was expected",
                klass.external_name()
            )));
        }
        let method = Self::lookup_interface_method(request)?;
        Self::require_instance_method(request, &method)?;
        Self::check_method_access(request, &method)?;

        let from_interface = method.holder().map_or(false, |h| h.is_interface());
        let kind = if from_interface && method.has_itable_index() {
            CallKind::Itable {
                index: method.itable_index() as usize,
            }
        } else {
            Self::dispatch_kind(&method)
        };
        Ok(CallInfo::new(Arc::clone(klass), method, kind))
    }

    fn resolve_virtual_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError> {
        Self::check_class_access(request)?;
        let klass = &request.resolved_klass;
        if klass.is_interface() {
            return Err(LinkError::IncompatibleClassChange(format!(
                "Found interface {}, but class was expected",
                klass.external_name()
            )));
        }
        let method = Self::lookup_class_method(request)?;
        Self::require_instance_method(request, &method)?;
        Self::check_method_access(request, &method)?;

        let from_interface = method.holder().map_or(false, |h| h.is_interface());
        let kind = if from_interface {
            let index = klass
                .vtable_index_of(&request.name, &request.signature)
                .ok_or_else(|| LinkError::AbstractMethod(request.describe()))?;
            CallKind::Vtable { index }
        } else {
            Self::dispatch_kind(&method)
        };
        Ok(CallInfo::new(Arc::clone(klass), method, kind))
    }

    fn resolve_special_call(&self, request: &LinkRequest) -> Result<CallInfo, LinkError> {
        Self::check_class_access(request)?;
        let klass = &request.resolved_klass;
        let method = if request.name.equals(b"<init>") {
            klass
                .find_method(&request.name, &request.signature)
                .ok_or_else(|| Self::no_such_method(request))?
        } else if klass.is_interface() {
            Self::lookup_interface_method(request)?
        } else {
            Self::lookup_class_method(request)?
        };
        Self::require_instance_method(request, &method)?;
        Self::check_method_access(request, &method)?;
        Ok(CallInfo::new(Arc::clone(klass), method, CallKind::Direct))
    }

    fn resolve_handle_call(
        &self,
        request: &LinkRequest,
        intrinsic: IntrinsicId,
    ) -> Result<CallInfo, LinkError> {
        let klass = &request.resolved_klass;
        if !klass.name().equals(METHOD_HANDLE) {
            return Err(LinkError::IncompatibleClassChange(format!(
                "{} is not a signature-polymorphic holder",
                klass.external_name()
            )));
        }

        let key = InvokerKey {
            intrinsic,
            name: request.name.clone(),
            signature: request.signature.clone(),
        };
        let method = self
            .invokers
            .entry(key)
            .or_insert_with(|| {
                let mut access = AccessFlags::PUBLIC
                    | AccessFlags::FINAL
                    | AccessFlags::NATIVE
                    | AccessFlags::SYNTHETIC;
                if intrinsic.is_signature_polymorphic_static() {
                    access |= AccessFlags::STATIC;
                }
                log::trace!("materialized {} invoker for {}", intrinsic.name(), request.signature);
                Arc::new(Method::new(
                    request.name.clone(),
                    request.signature.clone(),
                    access,
                    Arc::downgrade(klass),
                    NONVIRTUAL_VTABLE_INDEX,
                    INVALID_ITABLE_INDEX,
                    Some(intrinsic),
                ))
            })
            .clone();

        Ok(CallInfo::new(Arc::clone(klass), method, CallKind::Direct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::intern::SymbolTable;
    use crate::memory::BumpArena;
    use crate::oops::KlassBuilder;

    struct Fixture {
        symbols: SymbolTable,
        object: Arc<Klass>,
        shape: Arc<Klass>,
        circle: Arc<Klass>,
    }

    fn fixture() -> Fixture {
        let config = RuntimeConfig::default();
        let arena = BumpArena::new(config.arena_chunk_size, config.arena_capacity).unwrap();
        let symbols = SymbolTable::new(&config, Arc::new(arena));
        let object = KlassBuilder::class("java/lang/Object")
            .method("<init>", "()V", AccessFlags::PUBLIC)
            .method("toString", "()Ljava/lang/String;", AccessFlags::PUBLIC)
            .build(&symbols)
            .unwrap();
        let shape = KlassBuilder::interface("geo/Shape")
            .extends(&object)
            .method("area", "()D", AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .build(&symbols)
            .unwrap();
        let circle = KlassBuilder::class("geo/Circle")
            .extends(&object)
            .implements(&shape)
            .method("<init>", "()V", AccessFlags::PUBLIC)
            .method("area", "()D", AccessFlags::PUBLIC)
            .method("unit", "()Lgeo/Circle;", AccessFlags::PUBLIC | AccessFlags::STATIC)
            .method("radius", "()D", AccessFlags::PRIVATE)
            .build(&symbols)
            .unwrap();
        Fixture {
            symbols,
            object,
            shape,
            circle,
        }
    }

    fn request(f: &Fixture, klass: &Arc<Klass>, name: &str, sig: &str) -> LinkRequest {
        LinkRequest::new(
            Arc::clone(klass),
            f.symbols.lookup_str(name).unwrap(),
            f.symbols.lookup_str(sig).unwrap(),
        )
    }

    #[test]
    fn test_virtual_call_uses_vtable() {
        let f = fixture();
        let resolver = HierarchyLinkResolver::new();
        let info = resolver
            .resolve_virtual_call(&request(&f, &f.circle, "area", "()D"))
            .unwrap();
        let index = info.resolved_method().vtable_index() as usize;
        assert_eq!(info.call_kind(), CallKind::Vtable { index });
        assert!(Arc::ptr_eq(info.resolved_klass(), &f.circle));
    }

    #[test]
    fn test_interface_call_uses_itable() {
        let f = fixture();
        let resolver = HierarchyLinkResolver::new();
        let info = resolver
            .resolve_interface_call(&request(&f, &f.shape, "area", "()D"))
            .unwrap();
        assert_eq!(info.call_kind(), CallKind::Itable { index: 0 });

        let err = resolver
            .resolve_interface_call(&request(&f, &f.circle, "area", "()D"))
            .unwrap_err();
        assert!(matches!(err, LinkError::IncompatibleClassChange(_)));

        // Object members are visible through interfaces
        let info = resolver
            .resolve_interface_call(&request(&f, &f.shape, "toString", "()Ljava/lang/String;"))
            .unwrap();
        assert!(Arc::ptr_eq(&info.resolved_method().holder().unwrap(), &f.object));
    }

    #[test]
    fn test_static_mismatch() {
        let f = fixture();
        let resolver = HierarchyLinkResolver::new();
        assert!(resolver
            .resolve_static_call(&request(&f, &f.circle, "unit", "()Lgeo/Circle;"))
            .is_ok());
        let err = resolver
            .resolve_static_call(&request(&f, &f.circle, "area", "()D"))
            .unwrap_err();
        assert!(matches!(err, LinkError::IncompatibleClassChange(_)));
        let err = resolver
            .resolve_virtual_call(&request(&f, &f.circle, "unit", "()Lgeo/Circle;"))
            .unwrap_err();
        assert!(matches!(err, LinkError::IncompatibleClassChange(_)));
    }

    #[test]
    fn test_private_access_checked() {
        let f = fixture();
        let resolver = HierarchyLinkResolver::new();
        let outsider = KlassBuilder::class("other/Outsider")
            .extends(&f.object)
            .build(&f.symbols)
            .unwrap();
        let req = request(&f, &f.circle, "radius", "()D").with_caller(Some(outsider), true);
        let err = resolver.resolve_special_call(&req).unwrap_err();
        assert!(matches!(err, LinkError::IllegalAccess { .. }));

        let req = request(&f, &f.circle, "radius", "()D").with_caller(Some(Arc::clone(&f.circle)), true);
        let info = resolver.resolve_special_call(&req).unwrap();
        assert_eq!(info.call_kind(), CallKind::Direct);
    }

    #[test]
    fn test_missing_method() {
        let f = fixture();
        let resolver = HierarchyLinkResolver::new();
        let err = resolver
            .resolve_virtual_call(&request(&f, &f.circle, "perimeter", "()D"))
            .unwrap_err();
        assert!(err.to_string().contains("geo.Circle.perimeter()D"));
    }
}
