//! Instruction-level utilities shared by passes and lowerings.
//!
//! # Architecture
//!
//! - [`dead`] - trivially dead instructions and transitive use erasure
//! - [`refcount`] - retain and release emission
//! - [`apply_site`] - local call sites of a function reference
//! - [`closure`] - dead closure elimination with capture cleanup
//! - [`expect`] - use iteration looking through the builtin `expect`
//! - [`branch`] - adding block arguments to branch terminators
//! - [`callbacks`] - observers of deleted and created instructions
//!
//! Every utility edits a [`Function`](crate::pil::Function) in place and keeps
//! the use lists consistent on return.

pub mod apply_site;
pub mod branch;
pub mod callbacks;
pub mod closure;
pub mod dead;
pub mod expect;
pub mod refcount;

pub use apply_site::{find_local_apply_sites, FindLocalApplySitesResult};
pub use branch::add_argument_to_branch;
pub use callbacks::InstModCallbacks;
pub use closure::{
    get_final_releases_for_value, release_partial_apply_captured_arg, try_delete_dead_closure,
    ReleaseTracker,
};
pub use dead::{
    collect_uses_of_value, erase_uses_of_instruction, erase_uses_of_value,
    is_instruction_trivially_dead, recursively_delete_trivially_dead_instructions,
};
pub use expect::ignore_expect_uses;
pub use refcount::{create_decrement_before, create_increment_before};
