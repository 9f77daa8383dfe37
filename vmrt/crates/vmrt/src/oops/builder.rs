//! KlassBuilder - class definition and linking
//!
//! Turns a textual class description into a linked [`Klass`]: names are
//! interned, descriptors checked, fields laid out and the vtable computed.
//!
//! Vtable rules:
//! - static, private and initializer methods get no slot
//!   ([`NONVIRTUAL_VTABLE_INDEX`])
//! - a method matching an inherited slot by name and signature overrides it;
//!   overriding a final method is a class format error
//! - a final method (or any method of a final class) that overrides nothing
//!   gets no slot
//! - any other virtual method is appended
//! - interface methods neither declared nor inherited are appended last as
//!   miranda slots

use std::sync::{Arc, Weak};

use vmrt_util::descriptor::{is_valid_field_descriptor, is_valid_method_descriptor};
use vmrt_util::BasicType;

use super::access::AccessFlags;
use super::field::FieldInfo;
use super::intrinsics::IntrinsicId;
use super::klass::Klass;
use super::method::{Method, INVALID_ITABLE_INDEX, INVALID_VTABLE_INDEX, NONVIRTUAL_VTABLE_INDEX};
use crate::error::{Result, VmError};
use crate::intern::{Symbol, SymbolTable};
use crate::util::constants::{OBJECT_HEADER_SIZE, STATIC_FIELD_BASE};
use crate::util::Alignment;

const JAVA_LANG_OBJECT: &str = "java/lang/Object";
const METHOD_HANDLE: &str = "java/lang/invoke/MethodHandle";

#[derive(Debug, Clone)]
struct MemberSpec {
    name: String,
    signature: String,
    access: AccessFlags,
}

/// Linked member prepared before the klass exists
struct PlannedMethod {
    name: Symbol,
    signature: Symbol,
    access: AccessFlags,
    vtable_index: i32,
    itable_index: i32,
    intrinsic: Option<IntrinsicId>,
}

enum VtableSlot {
    Inherited(Arc<Method>),
    Local(usize),
}

/// KlassBuilder - describes a class or interface to define
#[derive(Debug, Clone)]
pub struct KlassBuilder {
    name: String,
    access: AccessFlags,
    loader_id: u32,
    super_klass: Option<Arc<Klass>>,
    interfaces: Vec<Arc<Klass>>,
    methods: Vec<MemberSpec>,
    fields: Vec<MemberSpec>,
}

impl KlassBuilder {
    /// A public class
    pub fn class(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: AccessFlags::PUBLIC,
            loader_id: 0,
            super_klass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// A public interface
    pub fn interface(name: impl Into<String>) -> Self {
        Self {
            access: AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT,
            ..Self::class(name)
        }
    }

    /// Replace the class access flags. The interface bit is kept.
    pub fn access(mut self, flags: AccessFlags) -> Self {
        let interface = self.access.bits() & AccessFlags::INTERFACE.bits();
        self.access = AccessFlags::from_bits(flags.bits() | interface);
        self
    }

    pub fn loader(mut self, loader_id: u32) -> Self {
        self.loader_id = loader_id;
        self
    }

    pub fn extends(mut self, super_klass: &Arc<Klass>) -> Self {
        self.super_klass = Some(Arc::clone(super_klass));
        self
    }

    pub fn implements(mut self, interface: &Arc<Klass>) -> Self {
        self.interfaces.push(Arc::clone(interface));
        self
    }

    pub fn method(mut self, name: &str, signature: &str, access: AccessFlags) -> Self {
        self.methods.push(MemberSpec {
            name: name.to_string(),
            signature: signature.to_string(),
            access,
        });
        self
    }

    pub fn field(mut self, name: &str, signature: &str, access: AccessFlags) -> Self {
        self.fields.push(MemberSpec {
            name: name.to_string(),
            signature: signature.to_string(),
            access,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn format_error(&self, message: impl std::fmt::Display) -> VmError {
        VmError::ClassFormat(format!("{}: {}", self.name, message))
    }

    fn check_hierarchy(&self) -> Result<()> {
        let is_interface = self.access.is_interface();
        match &self.super_klass {
            None if self.name != JAVA_LANG_OBJECT => {
                return Err(self.format_error("missing superclass"));
            },
            Some(_) if self.name == JAVA_LANG_OBJECT => {
                return Err(self.format_error("java/lang/Object cannot have a superclass"));
            },
            Some(sup) if sup.is_interface() => {
                return Err(self.format_error(format_args!(
                    "superclass {} is an interface",
                    sup.external_name()
                )));
            },
            Some(sup) if sup.is_final() => {
                return Err(self.format_error(format_args!(
                    "cannot inherit from final class {}",
                    sup.external_name()
                )));
            },
            Some(sup) if is_interface && !sup.name().equals(JAVA_LANG_OBJECT.as_bytes()) => {
                return Err(self.format_error("interface superclass must be java/lang/Object"));
            },
            _ => {},
        }
        if let Some(intf) = self.interfaces.iter().find(|i| !i.is_interface()) {
            return Err(self.format_error(format_args!(
                "{} is not an interface",
                intf.external_name()
            )));
        }
        Ok(())
    }

    fn check_members(&self) -> Result<()> {
        let is_interface = self.access.is_interface();
        for (i, m) in self.methods.iter().enumerate() {
            if m.name.is_empty() {
                return Err(self.format_error("empty method name"));
            }
            if !is_valid_method_descriptor(m.signature.as_bytes()) {
                return Err(self.format_error(format_args!(
                    "bad method signature {} for {}",
                    m.signature, m.name
                )));
            }
            if m.name == "<init>" && (is_interface || m.access.is_static()) {
                return Err(self.format_error("illegal <init> declaration"));
            }
            if m.name == "<clinit>" && !m.access.is_static() {
                return Err(self.format_error("<clinit> must be static"));
            }
            if self.methods[..i]
                .iter()
                .any(|o| o.name == m.name && o.signature == m.signature)
            {
                return Err(self.format_error(format_args!(
                    "duplicate method {}{}",
                    m.name, m.signature
                )));
            }
        }
        for (i, f) in self.fields.iter().enumerate() {
            if f.name.is_empty() || !is_valid_field_descriptor(f.signature.as_bytes()) {
                return Err(self.format_error(format_args!(
                    "bad field {} {}",
                    f.signature, f.name
                )));
            }
            if is_interface && !f.access.is_static() {
                return Err(self.format_error("interface fields must be static"));
            }
            if self.fields[..i]
                .iter()
                .any(|o| o.name == f.name && o.signature == f.signature)
            {
                return Err(self.format_error(format_args!("duplicate field {}", f.name)));
            }
        }
        Ok(())
    }

    fn layout_fields(&self, symbols: &SymbolTable) -> Result<(Vec<FieldInfo>, usize, usize)> {
        let mut instance_top = self
            .super_klass
            .as_ref()
            .map_or(OBJECT_HEADER_SIZE, |k| k.instance_size());
        let mut static_top = STATIC_FIELD_BASE;
        let mut fields = Vec::with_capacity(self.fields.len());

        for spec in &self.fields {
            let size = spec
                .signature
                .bytes()
                .next()
                .and_then(BasicType::from_descriptor_byte)
                .map_or(8, BasicType::field_size);
            let top = if spec.access.is_static() {
                &mut static_top
            } else {
                &mut instance_top
            };
            let offset = Alignment::align_up(*top, size);
            *top = offset + size;

            fields.push(FieldInfo::new(
                symbols.lookup_str(&spec.name)?,
                symbols.lookup_str(&spec.signature)?,
                spec.access,
                offset as u32,
            ));
        }

        Ok((
            fields,
            Alignment::align_up(instance_top, 8),
            Alignment::align_up(static_top, 8),
        ))
    }

    fn transitive_interfaces(&self) -> Vec<Arc<Klass>> {
        let mut result: Vec<Arc<Klass>> = Vec::new();
        let mut push = |k: &Arc<Klass>| {
            if !result.iter().any(|r| Arc::ptr_eq(r, k)) {
                result.push(Arc::clone(k));
            }
        };
        if let Some(sup) = &self.super_klass {
            sup.transitive_interfaces().iter().for_each(&mut push);
        }
        for intf in &self.interfaces {
            push(intf);
            intf.transitive_interfaces().iter().for_each(&mut push);
        }
        result
    }

    /// Intern and link the definition.
    pub fn build(self, symbols: &SymbolTable) -> Result<Arc<Klass>> {
        self.check_hierarchy()?;
        self.check_members()?;

        let name = symbols.lookup_str(&self.name)?;
        let is_interface = self.access.is_interface();
        let class_is_final = self.access.is_final();
        let is_method_handle = self.name == METHOD_HANDLE;
        let (fields, instance_size, static_size) = self.layout_fields(symbols)?;
        let transitive_interfaces = self.transitive_interfaces();

        let mut vtable: Vec<VtableSlot> = match &self.super_klass {
            Some(sup) if !is_interface => sup
                .vtable()
                .iter()
                .cloned()
                .map(VtableSlot::Inherited)
                .collect(),
            _ => Vec::new(),
        };

        let mut planned = Vec::with_capacity(self.methods.len());
        let mut next_itable = 0;
        for (local, spec) in self.methods.iter().enumerate() {
            let m_name = symbols.lookup_str(&spec.name)?;
            let m_sig = symbols.lookup_str(&spec.signature)?;
            let access = spec.access;
            let is_initializer = spec.name == "<init>" || spec.name == "<clinit>";

            let mut vtable_index = NONVIRTUAL_VTABLE_INDEX;
            let mut itable_index = INVALID_ITABLE_INDEX;
            if is_interface {
                if !access.is_static() && !access.is_private() && !is_initializer {
                    vtable_index = INVALID_VTABLE_INDEX;
                    itable_index = next_itable;
                    next_itable += 1;
                }
            } else if !access.is_static() && !access.is_private() && !is_initializer {
                let inherited = vtable.iter().position(|slot| match slot {
                    VtableSlot::Inherited(m) => m.matches(&m_name, &m_sig),
                    VtableSlot::Local(_) => false,
                });
                match inherited {
                    Some(i) => {
                        if let VtableSlot::Inherited(m) = &vtable[i] {
                            if m.is_final() {
                                return Err(self.format_error(format_args!(
                                    "{}{} overrides final method",
                                    spec.name, spec.signature
                                )));
                            }
                        }
                        vtable[i] = VtableSlot::Local(local);
                        vtable_index = i as i32;
                    },
                    None if access.is_final() || class_is_final => {},
                    None => {
                        vtable_index = vtable.len() as i32;
                        vtable.push(VtableSlot::Local(local));
                    },
                }
            }

            let intrinsic = if is_method_handle && access.is_native() {
                IntrinsicId::from_name(spec.name.as_bytes())
            } else {
                None
            };

            planned.push(PlannedMethod {
                name: m_name,
                signature: m_sig,
                access,
                vtable_index,
                itable_index,
                intrinsic,
            });
        }

        let mut mirandas: Vec<Arc<Method>> = Vec::new();
        if !is_interface {
            for intf in &transitive_interfaces {
                for m in intf.methods() {
                    if m.is_static() || m.is_private() || m.is_initializer() {
                        continue;
                    }
                    let declared = planned
                        .iter()
                        .any(|p| !p.access.is_static() && p.name.ptr_eq(m.name()) && p.signature.ptr_eq(m.signature()));
                    let inherited = self
                        .super_klass
                        .as_ref()
                        .and_then(|sup| sup.uncached_lookup_method(m.name(), m.signature()))
                        .map_or(false, |found| !found.is_static());
                    let slotted = vtable.iter().any(|slot| match slot {
                        VtableSlot::Inherited(v) => v.matches(m.name(), m.signature()),
                        VtableSlot::Local(_) => false,
                    }) || mirandas.iter().any(|v| v.matches(m.name(), m.signature()));
                    if !declared && !inherited && !slotted {
                        mirandas.push(Arc::clone(m));
                    }
                }
            }
        }

        let klass = Arc::new_cyclic(|weak: &Weak<Klass>| {
            let methods: Vec<Arc<Method>> = planned
                .into_iter()
                .map(|p| {
                    Arc::new(Method::new(
                        p.name,
                        p.signature,
                        p.access,
                        weak.clone(),
                        p.vtable_index,
                        p.itable_index,
                        p.intrinsic,
                    ))
                })
                .collect();

            let vtable = vtable
                .into_iter()
                .map(|slot| match slot {
                    VtableSlot::Inherited(m) => m,
                    VtableSlot::Local(i) => Arc::clone(&methods[i]),
                })
                .chain(mirandas)
                .collect();

            Klass {
                name,
                access: self.access,
                loader_id: self.loader_id,
                super_klass: self.super_klass,
                local_interfaces: self.interfaces,
                transitive_interfaces,
                methods,
                fields,
                vtable,
                instance_size,
                static_size,
            }
        });

        log::debug!(
            "defined {} (vtable {}, {} methods, {} fields)",
            klass.external_name(),
            klass.vtable_length(),
            klass.methods().len(),
            klass.fields().len()
        );
        Ok(klass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::memory::BumpArena;

    fn symbols() -> SymbolTable {
        let config = RuntimeConfig::default();
        let arena = BumpArena::new(config.arena_chunk_size, config.arena_capacity).unwrap();
        SymbolTable::new(&config, Arc::new(arena))
    }

    fn object(symbols: &SymbolTable) -> Arc<Klass> {
        KlassBuilder::class("java/lang/Object")
            .method("<init>", "()V", AccessFlags::PUBLIC)
            .method("equals", "(Ljava/lang/Object;)Z", AccessFlags::PUBLIC)
            .method("hashCode", "()I", AccessFlags::PUBLIC | AccessFlags::NATIVE)
            .method("getClass", "()Ljava/lang/Class;", AccessFlags::PUBLIC | AccessFlags::FINAL)
            .build(symbols)
            .unwrap()
    }

    #[test]
    fn test_vtable_override_and_append() {
        let symbols = symbols();
        let object = object(&symbols);
        assert_eq!(object.vtable_length(), 2);

        let sub = KlassBuilder::class("p/Sub")
            .extends(&object)
            .method("hashCode", "()I", AccessFlags::PUBLIC)
            .method("run", "()V", AccessFlags::PUBLIC)
            .method("helper", "()V", AccessFlags::PRIVATE)
            .method("seal", "()V", AccessFlags::PUBLIC | AccessFlags::FINAL)
            .build(&symbols)
            .unwrap();

        assert_eq!(sub.vtable_length(), 3);
        let hash = sub.find_method(&symbols.lookup_str("hashCode").unwrap(), &symbols.lookup_str("()I").unwrap()).unwrap();
        assert_eq!(hash.vtable_index(), 1);
        assert!(Arc::ptr_eq(&sub.vtable()[1], &hash));
        let sig = symbols.lookup_str("()V").unwrap();
        let helper = sub.find_method(&symbols.lookup_str("helper").unwrap(), &sig).unwrap();
        assert_eq!(helper.vtable_index(), NONVIRTUAL_VTABLE_INDEX);
        let seal = sub.find_method(&symbols.lookup_str("seal").unwrap(), &sig).unwrap();
        assert_eq!(seal.vtable_index(), NONVIRTUAL_VTABLE_INDEX);
        assert!(seal.can_be_statically_bound());
    }

    #[test]
    fn test_overriding_final_is_rejected() {
        let symbols = symbols();
        let object = object(&symbols);
        let base = KlassBuilder::class("p/Base")
            .extends(&object)
            .method("locked", "()V", AccessFlags::PUBLIC)
            .build(&symbols)
            .unwrap();
        let mid = KlassBuilder::class("p/Mid")
            .extends(&base)
            .method("locked", "()V", AccessFlags::PUBLIC | AccessFlags::FINAL)
            .build(&symbols)
            .unwrap();
        let err = KlassBuilder::class("p/Leaf")
            .extends(&mid)
            .method("locked", "()V", AccessFlags::PUBLIC)
            .build(&symbols)
            .unwrap_err();
        assert!(matches!(err, VmError::ClassFormat(_)));
    }

    #[test]
    fn test_miranda_slots() {
        let symbols = symbols();
        let object = object(&symbols);
        let runnable = KlassBuilder::interface("p/Task")
            .extends(&object)
            .method("run", "()V", AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .method("cancel", "()Z", AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .build(&symbols)
            .unwrap();
        let partial = KlassBuilder::class("p/Partial")
            .access(AccessFlags::PUBLIC | AccessFlags::ABSTRACT)
            .extends(&object)
            .implements(&runnable)
            .method("cancel", "()Z", AccessFlags::PUBLIC)
            .build(&symbols)
            .unwrap();

        let run = symbols.lookup_str("run").unwrap();
        let void = symbols.lookup_str("()V").unwrap();
        assert_eq!(partial.vtable_length(), 4);
        assert_eq!(partial.index_of_miranda(&run, &void), 3);
        assert!(partial.is_miranda_entry_at(3));
        assert!(!partial.is_miranda_entry_at(2));

        let cancel = symbols.lookup_str("cancel").unwrap();
        let z = symbols.lookup_str("()Z").unwrap();
        assert_eq!(partial.index_of_miranda(&cancel, &z), INVALID_VTABLE_INDEX);

        let task_run = runnable.find_method(&run, &void).unwrap();
        assert_eq!(task_run.itable_index(), 0);
        assert!(partial.is_subtype_of(&runnable));
    }

    #[test]
    fn test_field_layout() {
        let symbols = symbols();
        let object = object(&symbols);
        let point = KlassBuilder::class("p/Point")
            .extends(&object)
            .field("flag", "Z", AccessFlags::PRIVATE)
            .field("x", "J", AccessFlags::PRIVATE)
            .field("count", "I", AccessFlags::STATIC)
            .build(&symbols)
            .unwrap();
        let fields = point.fields();
        assert_eq!(fields[0].offset() as usize, OBJECT_HEADER_SIZE);
        assert_eq!(fields[1].offset() as usize, OBJECT_HEADER_SIZE + 8);
        assert_eq!(fields[2].offset() as usize, STATIC_FIELD_BASE);
        assert_eq!(point.instance_size(), OBJECT_HEADER_SIZE + 16);

        let found = point
            .find_field_from_offset(fields[1].offset(), false)
            .unwrap();
        assert!(found.1.name().equals(b"x"));
        assert!(point.find_field_from_offset(fields[1].offset(), true).is_none());
    }

    #[test]
    fn test_bad_signature_rejected() {
        let symbols = symbols();
        let object = object(&symbols);
        let err = KlassBuilder::class("p/Bad")
            .extends(&object)
            .method("m", "(X)V", AccessFlags::PUBLIC)
            .build(&symbols)
            .unwrap_err();
        assert!(matches!(err, VmError::ClassFormat(_)));
    }
}
