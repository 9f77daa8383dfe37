//! Well-known symbols, interned permanently at startup.

use crate::error::Result;
use crate::intern::{Symbol, SymbolTable};

/// Symbols the runtime compares against by identity
#[derive(Debug, Clone)]
pub struct VmSymbols {
    pub object_initializer_name: Symbol,
    pub class_initializer_name: Symbol,
    pub java_lang_object: Symbol,
    pub java_lang_invoke_method_handle: Symbol,
    /// `([Ljava/lang/Object;)Ljava/lang/Object;`
    pub object_array_object_signature: Symbol,
    pub void_method_signature: Symbol,
}

impl VmSymbols {
    pub fn new(symbols: &SymbolTable) -> Result<Self> {
        Ok(Self {
            object_initializer_name: symbols.new_permanent_symbol("<init>")?,
            class_initializer_name: symbols.new_permanent_symbol("<clinit>")?,
            java_lang_object: symbols.new_permanent_symbol("java/lang/Object")?,
            java_lang_invoke_method_handle: symbols
                .new_permanent_symbol("java/lang/invoke/MethodHandle")?,
            object_array_object_signature: symbols
                .new_permanent_symbol("([Ljava/lang/Object;)Ljava/lang/Object;")?,
            void_method_signature: symbols.new_permanent_symbol("()V")?,
        })
    }
}
