//! MethodHandles - member name resolution engine
//!
//! ============================================================================
//! RESOLUTION
//! ============================================================================
//!
//! ```text
//! symbolic MemberName (clazz, name, type, flags)
//!   │  check reference kind, required components, class access
//!   │  probe name and type in the symbol table
//!   ▼
//! LinkRequest ──► LinkResolver (strategy chosen by reference kind)
//!   │
//!   ▼
//! CallInfo ──► init_method_member_name / init_field_member_name
//!   │
//!   ▼
//! resolved MemberName (target, vmindex, flags)
//! ```
//!
//! A failed resolution leaves the record symbolic, so it can be retried.
//! Names and types that were never interned cannot name an existing
//! member; they are treated as "no match" without touching the symbol table,
//! except for signature-polymorphic references whose call-site signature
//! is interned on demand.
//!
//! ============================================================================
//! DISPATCH INDEX
//! ============================================================================
//!
//! | Member                                   | Kind             | vmindex            |
//! |------------------------------------------|------------------|--------------------|
//! | initializer                              | newInvokeSpecial | non-virtual        |
//! | static                                   | invokeStatic     | non-virtual        |
//! | interface method, interface receiver     | invokeInterface  | itable index       |
//! | interface method, class receiver         | invokeVirtual    | miranda slot       |
//! | statically bound or forced non-virtual   | invokeSpecial    | non-virtual        |
//! | other virtual                            | invokeVirtual    | vtable index       |
//! | field                                    | get/put          | byte offset        |

use std::sync::atomic::Ordering;
use std::sync::Arc;

use thiserror::Error;
use vmrt_util::descriptor::{is_valid_field_descriptor, is_valid_method_descriptor};

use super::call_site::{CallSite, MethodHandle};
use super::member_name::{flags::*, DispatchIndex, MemberName, MemberType, Target};
use super::ref_kind::RefKind;
use crate::config::RuntimeConfig;
use crate::error::{Result, VmError};
use crate::intern::{StringTable, Symbol, SymbolTable};
use crate::linkage::{CallInfo, CallKind, LinkError, LinkRequest, LinkResolver};
use crate::logging::{log_event, RuntimeEvent};
use crate::oops::{
    AccessFlags, FieldInfo, IntrinsicId, JavaClass, JavaString, Klass, SystemDictionary,
    VmSymbols, NONVIRTUAL_VTABLE_INDEX,
};
use crate::runtime::code_cache::CodeCache;

/// Misuse of the bulk member search, reported as a sentinel count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemberSearchError {
    /// The searched class is primitive or an array
    #[error("member search requires an instance class")]
    NotInstance,
    /// A result slot does not hold a member name
    #[error("result slot does not hold a MemberName")]
    CallerBug,
}

impl MemberSearchError {
    /// Value returned to managed code
    pub fn sentinel(self) -> i32 {
        match self {
            MemberSearchError::NotInstance => -1,
            MemberSearchError::CallerBug => -99,
        }
    }
}

/// MethodHandles - resolves member names and retargets call sites
pub struct MethodHandles {
    symbols: Arc<SymbolTable>,
    strings: Arc<StringTable>,
    dictionary: Arc<SystemDictionary>,
    resolver: Arc<dyn LinkResolver>,
    code_cache: Arc<CodeCache>,
    vm_symbols: VmSymbols,
    verify: bool,
    overflow_floor: usize,
}

impl MethodHandles {
    pub fn new(
        config: &RuntimeConfig,
        symbols: Arc<SymbolTable>,
        strings: Arc<StringTable>,
        dictionary: Arc<SystemDictionary>,
        resolver: Arc<dyn LinkResolver>,
        code_cache: Arc<CodeCache>,
    ) -> Result<Self> {
        let vm_symbols = VmSymbols::new(&symbols)?;
        Ok(Self {
            symbols,
            strings,
            dictionary,
            resolver,
            code_cache,
            vm_symbols,
            verify: config.verify_method_handles,
            overflow_floor: config.find_members_overflow_floor,
        })
    }

    pub fn vm_symbols(&self) -> &VmSymbols {
        &self.vm_symbols
    }

    fn object_klass(&self) -> Result<Arc<Klass>> {
        self.dictionary
            .find(&self.vm_symbols.java_lang_object)
            .ok_or_else(|| VmError::InternalError("java/lang/Object is not defined".to_string()))
    }

    // ------------------------------------------------------------------
    // Signature polymorphism
    // ------------------------------------------------------------------

    /// Intrinsic behind `klass.name`, if `klass` is `MethodHandle` and the
    /// method is signature-polymorphic.
    ///
    /// Besides the well-known names, any native varargs method declared as
    /// `([Ljava/lang/Object;)Ljava/lang/Object;` is a generic invoker.
    pub fn signature_polymorphic_intrinsic(&self, klass: &Klass, name: &Symbol) -> Option<IntrinsicId> {
        if !klass.name().ptr_eq(&self.vm_symbols.java_lang_invoke_method_handle) {
            return None;
        }
        if let Some(id) = IntrinsicId::from_name(name.as_bytes()) {
            return Some(id);
        }
        let method = klass.find_method(name, &self.vm_symbols.object_array_object_signature)?;
        (method.is_native() && method.is_varargs()).then_some(IntrinsicId::InvokeGeneric)
    }

    pub fn is_signature_polymorphic_static(&self, id: IntrinsicId) -> bool {
        id.is_signature_polymorphic_static()
    }

    /// Internal descriptor for a member type. `Ok(None)` if it does not parse
    /// or was never interned (and `intern` is false).
    fn lookup_signature(&self, member_type: &MemberType, intern: bool) -> Result<Option<Symbol>> {
        let bytes = match member_type {
            MemberType::MethodType(mt) => mt.signature().into_bytes(),
            MemberType::Class(class) => class.descriptor().into_bytes(),
            MemberType::Signature(s) => s.to_modified_utf8(),
        };
        if !is_valid_method_descriptor(&bytes) && !is_valid_field_descriptor(&bytes) {
            return Ok(None);
        }
        if intern {
            self.symbols.lookup(&bytes).map(Some)
        } else {
            Ok(self.symbols.lookup_only(&bytes).0)
        }
    }

    fn verify_class_access(caller: &Klass, target: &Klass) -> Result<()> {
        if target.is_public() || caller.is_same_class_package(target) {
            return Ok(());
        }
        Err(VmError::IllegalAccess {
            caller: caller.external_name(),
            class: target.external_name(),
        })
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolve a symbolic member name in place.
    ///
    /// Idempotent: a resolved record is returned unchanged.
    pub fn resolve(&self, mname: &MemberName, caller: Option<&Arc<Klass>>) -> Result<()> {
        if mname.is_resolved() {
            return Ok(());
        }

        match self.try_resolve(mname, caller) {
            Ok(()) => {
                log_event(RuntimeEvent::MemberResolved {
                    class: describe_class(mname.clazz().as_ref()),
                    name: describe_name(mname),
                    flags: mname.flags(),
                    vmindex: mname.vmindex(),
                });
                Ok(())
            },
            Err(err) => {
                log_event(RuntimeEvent::ResolutionFailed {
                    class: describe_class(mname.clazz().as_ref()),
                    name: describe_name(mname),
                    error: err.to_string(),
                });
                Err(err)
            },
        }
    }

    fn try_resolve(&self, mname: &MemberName, caller: Option<&Arc<Klass>>) -> Result<()> {
        let state = mname.state();
        let flags = state.flags;
        let ref_kind = RefKind::from_raw((flags >> REFERENCE_KIND_SHIFT) & REFERENCE_KIND_MASK)
            .ok_or_else(|| VmError::InternalError("obsolete MemberName format".to_string()))?;

        let (Some(clazz), Some(name), Some(member_type)) =
            (state.clazz, state.name, state.member_type)
        else {
            return Err(VmError::IllegalArgument("nothing to resolve".to_string()));
        };

        let described = || format!("{}.{}", describe_class(Some(&clazz)), name.to_string_lossy());
        let no_match = || match flags & ALL_KINDS {
            IS_FIELD => VmError::NoSuchField(described()),
            IS_METHOD | IS_CONSTRUCTOR => VmError::NoSuchMethod(described()),
            _ => VmError::Linkage(described()),
        };

        let defc = match &clazz {
            JavaClass::Primitive(_) => return Err(no_match()),
            JavaClass::Array(_) => self.object_klass()?,
            JavaClass::Instance(klass) => Arc::clone(klass),
        };

        if self.verify {
            if let Some(caller) = caller {
                // an array is as accessible as its element class
                if let Some(accessed) = clazz.element_klass() {
                    Self::verify_class_access(caller, accessed)?;
                }
            }
        }

        let Some(name_sym) = self.symbols.probe_utf16(name.as_utf16()) else {
            return Err(no_match());
        };
        if name_sym.ptr_eq(&self.vm_symbols.class_initializer_name) {
            return Err(no_match());
        }

        let kind = flags & ALL_KINDS;
        let intrinsic = if kind == IS_METHOD
            && matches!(
                ref_kind,
                RefKind::InvokeVirtual | RefKind::InvokeSpecial | RefKind::InvokeStatic
            ) {
            self.signature_polymorphic_intrinsic(&defc, &name_sym)
                .filter(|id| (ref_kind == RefKind::InvokeStatic) == id.is_signature_polymorphic_static())
        } else {
            None
        };

        let Some(signature) = self.lookup_signature(&member_type, intrinsic.is_some())? else {
            return Err(no_match());
        };

        let request = LinkRequest::new(Arc::clone(&defc), name_sym.clone(), signature.clone())
            .with_caller(caller.cloned(), caller.is_some());

        match kind {
            IS_METHOD => {
                let info = match (intrinsic, ref_kind) {
                    (Some(id), _) => self.resolver.resolve_handle_call(&request, id)?,
                    (None, RefKind::InvokeStatic) => self.resolver.resolve_static_call(&request)?,
                    (None, RefKind::InvokeInterface) => self.resolver.resolve_interface_call(&request)?,
                    (None, RefKind::InvokeSpecial) => self.resolver.resolve_special_call(&request)?,
                    (None, RefKind::InvokeVirtual) => self.resolver.resolve_virtual_call(&request)?,
                    (None, _) => return Err(no_match()),
                };
                self.init_method_member_name(mname, &info).map(drop)
            },
            IS_CONSTRUCTOR => {
                if !name_sym.ptr_eq(&self.vm_symbols.object_initializer_name) {
                    return Err(VmError::NoSuchMethod(format!(
                        "{}: illegal constructor name",
                        described()
                    )));
                }
                let info = self.resolver.resolve_special_call(&request)?;
                if !info.resolved_method().can_be_statically_bound() {
                    return Err(VmError::InternalError(format!(
                        "constructor {} is not statically bound",
                        info.resolved_method().external_name()
                    )));
                }
                self.init_method_member_name(mname, &info).map(drop)
            },
            IS_FIELD => {
                let (holder, field) = defc.find_field(&name_sym, &signature).ok_or_else(no_match)?;
                if ref_kind.is_field() && field.is_static() != ref_kind.is_static() {
                    return Err(LinkError::IncompatibleClassChange(format!(
                        "Expected {} field {}",
                        if ref_kind.is_static() { "static" } else { "non-static" },
                        described()
                    ))
                    .into());
                }
                if let Some(caller) = caller {
                    Self::check_field_access(caller, &holder, &field)?;
                }
                // a racing resolver may have published first; both agree
                self.init_field_member_name(mname, &holder, &field, ref_kind.is_setter());
                Ok(())
            },
            _ => Err(VmError::InternalError("unrecognized MemberName format".to_string())),
        }
    }

    fn check_field_access(caller: &Arc<Klass>, holder: &Arc<Klass>, field: &FieldInfo) -> Result<()> {
        let access = field.access_flags();
        let allowed = if access.is_public() {
            true
        } else if access.is_private() {
            Arc::ptr_eq(caller, holder)
        } else if access.is_protected() {
            caller.is_same_class_package(holder) || caller.is_subclass_of(holder)
        } else {
            caller.is_same_class_package(holder)
        };
        if allowed {
            Ok(())
        } else {
            Err(LinkError::IllegalAccess {
                caller: caller.external_name(),
                member: format!("{}.{}", holder.external_name(), field.name()),
            }
            .into())
        }
    }

    /// Store a linked method into `mname`, computing its dispatch index.
    ///
    /// Returns `false` when `mname` was already resolved, in which case it
    /// keeps its earlier resolution.
    pub fn init_method_member_name(&self, mname: &MemberName, info: &CallInfo) -> Result<bool> {
        let resolved = self.method_member(info)?;
        Ok(mname.publish(resolved.clazz, resolved.flags, resolved.target, resolved.vmindex))
    }

    fn method_member(&self, info: &CallInfo) -> Result<ResolvedMember> {
        let method = info.resolved_method();
        let holder = method.holder().ok_or_else(|| {
            VmError::InternalError(format!("holder of {} was unloaded", method.external_name()))
        })?;
        let limit = info.resolved_klass();
        let modifiers = i32::from(method.access_flags().bits() & AccessFlags::RECOGNIZED_METHOD_MODIFIERS);
        let method_kind = |kind: RefKind| IS_METHOD | ref_kind_bits(kind.raw());

        let (kind_flags, vmindex, clazz) = if method.is_initializer() {
            (
                IS_CONSTRUCTOR | ref_kind_bits(RefKind::NewInvokeSpecial.raw()),
                NONVIRTUAL_VTABLE_INDEX,
                holder,
            )
        } else if method.is_static() {
            (method_kind(RefKind::InvokeStatic), NONVIRTUAL_VTABLE_INDEX, holder)
        } else if !limit.is_subtype_of(&holder) {
            return Err(VmError::Linkage(format!(
                "receiver limit {} is not a subtype of {}",
                limit.external_name(),
                holder.external_name()
            )));
        } else {
            match info.call_kind() {
                CallKind::Direct => (method_kind(RefKind::InvokeSpecial), NONVIRTUAL_VTABLE_INDEX, holder),
                _ if holder.is_interface() && limit.is_interface() => {
                    (method_kind(RefKind::InvokeInterface), method.itable_index(), holder)
                },
                _ if holder.is_interface() => {
                    let index = limit.index_of_miranda(method.name(), method.signature());
                    if index < 0 {
                        return Err(VmError::Linkage(format!(
                            "{} has no vtable slot for {}",
                            limit.external_name(),
                            method.external_name()
                        )));
                    }
                    (method_kind(RefKind::InvokeVirtual), index, Arc::clone(limit))
                },
                _ if method.can_be_statically_bound() || !method.has_vtable_index() => {
                    (method_kind(RefKind::InvokeSpecial), NONVIRTUAL_VTABLE_INDEX, holder)
                },
                _ => (method_kind(RefKind::InvokeVirtual), method.vtable_index(), holder),
            }
        };

        Ok(ResolvedMember {
            clazz: JavaClass::Instance(clazz),
            flags: kind_flags | modifiers,
            target: Target::Method(Arc::clone(method)),
            vmindex,
        })
    }

    /// Store a resolved field into `mname`; `vmindex` is the field offset.
    ///
    /// Returns `false` when `mname` was already resolved.
    pub fn init_field_member_name(
        &self,
        mname: &MemberName,
        holder: &Arc<Klass>,
        field: &FieldInfo,
        is_setter: bool,
    ) -> bool {
        let resolved = Self::field_member(holder, field, is_setter);
        mname.publish(resolved.clazz, resolved.flags, resolved.target, resolved.vmindex)
    }

    fn field_member(holder: &Arc<Klass>, field: &FieldInfo, is_setter: bool) -> ResolvedMember {
        let mut flags =
            IS_FIELD | i32::from(field.access_flags().bits() & AccessFlags::RECOGNIZED_FIELD_MODIFIERS);
        if field.is_static() && field.is_final() {
            flags |= TRUSTED_FINAL;
        }
        flags |= ref_kind_bits(RefKind::for_field(field.is_static(), is_setter).raw());

        ResolvedMember {
            clazz: JavaClass::instance(holder),
            flags,
            target: Target::Field {
                holder: Arc::clone(holder),
            },
            vmindex: field.offset() as i32,
        }
    }

    // ------------------------------------------------------------------
    // Expansion
    // ------------------------------------------------------------------

    /// Fill in the symbolic components of a resolved member name.
    ///
    /// `suppress` (`SUPPRESS_DEFC`, `SUPPRESS_NAME`, `SUPPRESS_TYPE`) names
    /// components the caller does not need. Components already present are
    /// never recomputed, whatever the mask says.
    pub fn expand(&self, mname: &MemberName, suppress: u32) -> Result<()> {
        let state = mname.state();
        let have_defc = state.clazz.is_some() || suppress & SUPPRESS_DEFC != 0;
        let have_name = state.name.is_some() || suppress & SUPPRESS_NAME != 0;
        let have_type = state.member_type.is_some() || suppress & SUPPRESS_TYPE != 0;
        if have_defc && have_name && have_type {
            return Ok(());
        }

        match state.flags & ALL_KINDS {
            IS_METHOD | IS_CONSTRUCTOR => {
                let Target::Method(method) = &state.target else {
                    return Err(VmError::IllegalArgument("nothing to expand".to_string()));
                };
                let clazz = if have_defc {
                    None
                } else {
                    let holder = method.holder().ok_or_else(|| {
                        VmError::InternalError("method holder was unloaded".to_string())
                    })?;
                    Some(JavaClass::Instance(holder))
                };
                let name = if have_name {
                    None
                } else {
                    Some(self.strings.intern_symbol(method.name())?)
                };
                let member_type = if have_type {
                    None
                } else {
                    Some(MemberType::Signature(Arc::new(JavaString::from_modified_utf8(
                        method.signature().as_bytes(),
                    )?)))
                };
                mname.fill_symbolic(clazz, name, member_type);
                Ok(())
            },
            IS_FIELD => {
                let Target::Field { holder } = &state.target else {
                    return Err(VmError::IllegalArgument("nothing to expand".to_string()));
                };
                let is_static = state.flags & i32::from(AccessFlags::STATIC.bits()) != 0;
                let (declaring, field) = holder
                    .find_field_from_offset(state.vmindex as u32, is_static)
                    .ok_or_else(|| VmError::InternalError("unrecognized MemberName format".to_string()))?;

                let clazz = (!have_defc).then(|| JavaClass::Instance(declaring));
                let name = if have_name {
                    None
                } else {
                    Some(self.strings.intern_symbol(field.name())?)
                };
                let member_type = if have_type {
                    None
                } else {
                    let field_type = field.field_type();
                    Some(if field_type.is_primitive() {
                        MemberType::Class(JavaClass::Primitive(field_type))
                    } else {
                        MemberType::Signature(Arc::new(JavaString::from_modified_utf8(
                            field.signature().as_bytes(),
                        )?))
                    })
                };
                mname.fill_symbolic(clazz, name, member_type);
                Ok(())
            },
            _ => Err(VmError::InternalError("unrecognized MemberName format".to_string())),
        }
    }

    // ------------------------------------------------------------------
    // Member search
    // ------------------------------------------------------------------

    /// Fill `results` with members of `klass` matching the filters.
    ///
    /// `mflags` selects member kinds and the search scope
    /// (`SEARCH_SUPERCLASSES`, `SEARCH_INTERFACES`). The first `skip`
    /// matches are passed over. The count returned is the number of slots
    /// filled plus the number of further matches seen; a count above
    /// `results.len()` means the buffer was too small. Counting overflow
    /// stops at `max(find_members_overflow_floor, results.len())`.
    ///
    /// Each filled slot is overwritten, even one resolved by an earlier
    /// search; slots past the filled count are left as they were. Results
    /// are not filtered by the caller's access rights.
    #[allow(clippy::too_many_arguments)]
    pub fn find_members(
        &self,
        klass: &JavaClass,
        name: Option<&Symbol>,
        signature: Option<&Symbol>,
        mflags: i32,
        _caller: Option<&Arc<Klass>>,
        skip: usize,
        results: &[Option<Arc<MemberName>>],
    ) -> std::result::Result<usize, MemberSearchError> {
        let JavaClass::Instance(klass) = klass else {
            return Err(MemberSearchError::NotInstance);
        };

        let mut cursor = SearchCursor {
            results,
            to_skip: skip,
            fill: 0,
            overflow: 0,
            overflow_limit: self.overflow_floor.max(results.len()),
        };
        let mut match_flags = mflags;

        if name.map_or(false, |n| n.is_empty()) {
            return Ok(0);
        }
        if let Some(sig) = signature {
            if sig.is_empty() {
                return Ok(0);
            }
            if sig.byte_at(0) == Some(b'(') {
                match_flags &= !(IS_FIELD | IS_TYPE);
            } else {
                match_flags &= !(IS_CONSTRUCTOR | IS_METHOD);
            }
        }

        let search_supers = match_flags & SEARCH_SUPERCLASSES != 0;
        let search_interfaces = match_flags & SEARCH_INTERFACES != 0;
        let scope = search_scope(klass, !(search_supers || search_interfaces), search_interfaces);

        if match_flags & IS_FIELD != 0 {
            'fields: for holder in &scope {
                for field in holder.fields() {
                    if name.map_or(false, |n| !field.name().ptr_eq(n)) {
                        continue;
                    }
                    if signature.map_or(false, |s| !field.signature().ptr_eq(s)) {
                        continue;
                    }
                    match cursor.next()? {
                        SearchStep::Fill(slot) => {
                            cursor.commit(slot, Self::field_member(holder, field, false));
                        },
                        SearchStep::Pass => {},
                        SearchStep::Exhausted => {
                            match_flags = 0;
                            break 'fields;
                        },
                    }
                }
            }
        }

        if match_flags & (IS_METHOD | IS_CONSTRUCTOR) != 0 {
            let init_name = &self.vm_symbols.object_initializer_name;
            let clinit_name = &self.vm_symbols.class_initializer_name;
            // <clinit> is only reported when asked for by name
            let show_clinit = name.map_or(false, |n| n.ptr_eq(clinit_name));

            let mut name_filter = name.cloned();
            let mut negate_name_test = false;
            if match_flags & IS_METHOD == 0 {
                // constructors only
                match &name_filter {
                    None => name_filter = Some(init_name.clone()),
                    Some(n) if !n.ptr_eq(init_name) => return Ok(0),
                    Some(_) => {},
                }
            } else if match_flags & IS_CONSTRUCTOR == 0 {
                // methods only: seeing <init> means skipping the entry
                match &name_filter {
                    None => {
                        name_filter = Some(init_name.clone());
                        negate_name_test = true;
                    },
                    Some(n) if n.ptr_eq(init_name) => return Ok(0),
                    Some(_) => {},
                }
            }

            'methods: for holder in &scope {
                for method in holder.methods() {
                    if !show_clinit && method.name().ptr_eq(clinit_name) {
                        continue;
                    }
                    if let Some(n) = &name_filter {
                        if method.name().ptr_eq(n) == negate_name_test {
                            continue;
                        }
                    }
                    if signature.map_or(false, |s| !method.signature().ptr_eq(s)) {
                        continue;
                    }
                    match cursor.next()? {
                        SearchStep::Fill(slot) => {
                            let Some(info) = CallInfo::for_method(method) else {
                                continue;
                            };
                            match self.method_member(&info) {
                                Ok(resolved) => cursor.commit(slot, resolved),
                                Err(err) => {
                                    log::debug!("find_members: {}: {}", method.external_name(), err);
                                },
                            }
                        },
                        SearchStep::Pass => {},
                        SearchStep::Exhausted => break 'methods,
                    }
                }
            }
        }

        Ok(cursor.count())
    }

    /// [`find_members`](Self::find_members) with string filters, as passed
    /// from managed code. A filter that was never interned matches nothing.
    #[allow(clippy::too_many_arguments)]
    pub fn get_members(
        &self,
        klass: &JavaClass,
        match_name: Option<&str>,
        match_signature: Option<&str>,
        mflags: i32,
        caller: Option<&Arc<Klass>>,
        skip: usize,
        results: &[Option<Arc<MemberName>>],
    ) -> std::result::Result<usize, MemberSearchError> {
        let name = match match_name {
            Some(s) => match self.symbols.probe(s) {
                Some(symbol) => Some(symbol),
                None => return Ok(0),
            },
            None => None,
        };
        let signature = match match_signature {
            Some(s) => match self.symbols.probe(s) {
                Some(symbol) => Some(symbol),
                None => return Ok(0),
            },
            None => None,
        };
        self.find_members(
            klass,
            name.as_ref(),
            signature.as_ref(),
            mflags,
            caller,
            skip,
            results,
        )
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn get_member_vmindex(&self, mname: &MemberName) -> i64 {
        i64::from(mname.vmindex())
    }

    pub fn get_member_target(&self, mname: &MemberName) -> Target {
        mname.target()
    }

    pub fn get_member_dispatch(&self, mname: &MemberName) -> DispatchIndex {
        mname.dispatch_index()
    }

    fn find_member_field(&self, mname: &MemberName, must_be_static: bool) -> Result<(JavaClass, i32)> {
        let state = mname.state();
        let Some(clazz) = state.clazz else {
            return Err(VmError::InternalError("mname not resolved".to_string()));
        };
        let is_static = state.flags & i32::from(AccessFlags::STATIC.bits()) != 0;
        if state.flags & IS_FIELD != 0 && is_static == must_be_static {
            return Ok((clazz, state.vmindex));
        }
        Err(VmError::InternalError(
            if must_be_static {
                "static field required"
            } else {
                "non-static field required"
            }
            .to_string(),
        ))
    }

    pub fn object_field_offset(&self, mname: &MemberName) -> Result<i64> {
        self.find_member_field(mname, false)
            .map(|(_, offset)| i64::from(offset))
    }

    pub fn static_field_offset(&self, mname: &MemberName) -> Result<i64> {
        self.find_member_field(mname, true)
            .map(|(_, offset)| i64::from(offset))
    }

    /// Class mirror holding the static field
    pub fn static_field_base(&self, mname: &MemberName) -> Result<JavaClass> {
        self.find_member_field(mname, true).map(|(clazz, _)| clazz)
    }

    // ------------------------------------------------------------------
    // Call sites
    // ------------------------------------------------------------------

    /// Retarget a non-volatile call site.
    pub fn set_call_site_target_normal(&self, call_site: &CallSite, target: MethodHandle) {
        self.set_call_site_target(call_site, target, Ordering::Release);
    }

    /// Retarget a volatile call site; the new target is visible to every
    /// subsequent read in the total store order.
    pub fn set_call_site_target_volatile(&self, call_site: &CallSite, target: MethodHandle) {
        self.set_call_site_target(call_site, target, Ordering::SeqCst);
    }

    fn set_call_site_target(&self, call_site: &CallSite, target: MethodHandle, ordering: Ordering) {
        let lock = self.code_cache.compile_lock().lock();
        let invalidated = self.code_cache.flush_dependents_on(&lock, call_site, &target);
        call_site.publish(target, ordering);
        drop(lock);

        log_event(RuntimeEvent::CallSiteRetargeted {
            call_site: call_site.id(),
            invalidated,
        });
    }
}

/// Classes visited by a member search, subclass first, then interfaces
fn search_scope(klass: &Arc<Klass>, local_only: bool, with_interfaces: bool) -> Vec<Arc<Klass>> {
    let mut scope = vec![Arc::clone(klass)];
    if local_only {
        return scope;
    }
    let mut current = klass.super_klass().cloned();
    while let Some(sup) = current {
        current = sup.super_klass().cloned();
        scope.push(sup);
    }
    if with_interfaces {
        scope.extend(klass.transitive_interfaces().iter().cloned());
    }
    scope
}

/// A resolution computed but not yet stored into a member name
struct ResolvedMember {
    clazz: JavaClass,
    flags: i32,
    target: Target,
    vmindex: i32,
}

/// Skip, fill and overflow accounting of a member search.
///
/// A slot handed out by `next` only counts once it is committed; a match
/// that fails to initialize leaves the slot for the next match.
struct SearchCursor<'r> {
    results: &'r [Option<Arc<MemberName>>],
    to_skip: usize,
    fill: usize,
    overflow: usize,
    overflow_limit: usize,
}

enum SearchStep<'r> {
    Fill(&'r Arc<MemberName>),
    Pass,
    Exhausted,
}

impl<'r> SearchCursor<'r> {
    fn next(&mut self) -> std::result::Result<SearchStep<'r>, MemberSearchError> {
        if self.to_skip > 0 {
            self.to_skip -= 1;
            return Ok(SearchStep::Pass);
        }
        if self.fill < self.results.len() {
            let results: &'r [Option<Arc<MemberName>>] = self.results;
            let slot = results[self.fill]
                .as_ref()
                .ok_or(MemberSearchError::CallerBug)?;
            return Ok(SearchStep::Fill(slot));
        }
        self.overflow += 1;
        if self.overflow >= self.overflow_limit {
            Ok(SearchStep::Exhausted)
        } else {
            Ok(SearchStep::Pass)
        }
    }

    /// Overwrite the slot last handed out and count it as filled
    fn commit(&mut self, slot: &MemberName, resolved: ResolvedMember) {
        slot.reset_resolved(resolved.clazz, resolved.flags, resolved.target, resolved.vmindex);
        self.fill += 1;
    }

    fn count(&self) -> usize {
        self.fill + self.overflow
    }
}

fn describe_class(clazz: Option<&JavaClass>) -> String {
    match clazz {
        Some(JavaClass::Instance(k)) => k.external_name(),
        Some(other) => other.descriptor(),
        None => "<null>".to_string(),
    }
}

fn describe_name(mname: &MemberName) -> String {
    mname
        .name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| "<null>".to_string())
}
