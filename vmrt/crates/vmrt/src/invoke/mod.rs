//! Invoke Module - Method Handle Support
//!
//! - [`MemberName`]: symbolic or resolved member reference
//! - [`MethodHandles`]: resolution, expansion, member search and call-site
//!   retargeting
//! - [`CallSite`] / [`MethodHandle`]: retargetable invocation targets

pub mod call_site;
pub mod member_name;
pub mod method_handles;
pub mod ref_kind;

pub use call_site::{CallSite, MethodHandle};
pub use member_name::{flags, DispatchIndex, MemberName, MemberType, Target};
pub use method_handles::{MemberSearchError, MethodHandles};
pub use ref_kind::RefKind;
