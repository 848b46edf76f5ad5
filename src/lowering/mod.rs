//! Lowerings that rewrite high-level call conventions into explicit control flow.
//!
//! - [`foreign_error`] - sentinel and error-slot checks around foreign calls, and
//!   the matching callee-side bridging

pub mod foreign_error;

pub use foreign_error::{
    emit_bridge_error_for_foreign_error, emit_bridge_return_value_for_foreign_error,
    emit_foreign_error_block, emit_foreign_error_check, emit_int_value,
    emit_store_to_foreign_error_slot, emit_unwrap_integer_result, lower_foreign_error_call,
    BridgedErrorSource, NativeErrorSource, NilErrorSource,
};
