//! Bridging between native error propagation and foreign error conventions.
//!
//! A foreign callee never throws. It reports failure through a sentinel result
//! and, for every convention, by writing a bridged error object into an error
//! out-parameter (the *error slot*). This module builds both directions:
//!
//! - **Caller side**: after a foreign call, [`emit_foreign_error_check`] inspects
//!   the sentinel and branches to a postmatter block that loads the bridged error
//!   from the slot, converts it into a native error and throws it.
//! - **Callee side**: a native function exposed to foreign code stores its error
//!   into the slot with [`emit_bridge_error_for_foreign_error`] and produces the
//!   failure sentinel, or produces the success sentinel with
//!   [`emit_bridge_return_value_for_foreign_error`].
//!
//! # Strategies
//!
//! | Convention | Check | Results after the check |
//! |------------|-------|--------------------------|
//! | `zero_result` | `cond_br (r != 0), cont, error` | sentinel dropped |
//! | `zero_preserved_result` | `cond_br (r != 0), cont, error` | sentinel kept |
//! | `non_zero_result` | `cond_br (r != 0), error, cont` | sentinel dropped |
//! | `nil_result` | `switch_enum r, some: cont(payload), none: error` | payload |
//! | `non_nil_error` | `switch_enum slot, some: error(e), none: cont` | unchanged |
//!
//! Integer sentinels may be wrapped in one single-field struct (a status code
//! newtype); the check extracts the field before comparing. Wrappers with more
//! than one stored property are rejected with a panic.

use crate::{
    diagnostics::{Diagnostic, DiagnosticEngine, DiagnosticId},
    pil::{
        BlockId, EnumCase, ForeignErrorConvention, ForeignErrorKind, Function, InstId, InstKind,
        LoadQualifier, OwnershipKind, PilBuilder, PilType, Section, StoreQualifier, ValueId,
    },
    Error, Result,
};

/// The stored field of a sentinel wrapper struct, or `ty` itself.
///
/// # Panics
///
/// Panics if `ty` is a struct without exactly one stored property, or if the
/// unwrapped type is not a builtin integer.
fn sentinel_integer_type(ty: &PilType) -> (&PilType, bool) {
    let (inner, wrapped) = match ty.struct_fields() {
        Some(fields) => {
            assert!(
                fields.len() == 1,
                "foreign error sentinel {ty} must have exactly one stored property, found {}",
                fields.len()
            );
            (&fields[0].1, true)
        }
        None => (ty, false),
    };
    assert!(
        matches!(inner, PilType::Int(_)),
        "foreign error sentinel {ty} does not wrap a builtin integer"
    );
    (inner, wrapped)
}

/// Unwraps a sentinel result to its raw builtin integer.
///
/// Looks through at most one single-field struct.
///
/// # Panics
///
/// Panics on wrappers with zero or several stored properties and on
/// non-integer payloads.
pub fn emit_unwrap_integer_result(builder: &mut PilBuilder<'_>, value: ValueId) -> ValueId {
    let ty = builder.function().ty(value).clone();
    let (_, wrapped) = sentinel_integer_type(&ty);
    if wrapped {
        builder.struct_extract(value, 0)
    } else {
        value
    }
}

/// Builds the integer `value` of type `ty`, wrapping it in `ty`'s single stored
/// property when `ty` is a sentinel wrapper struct.
pub fn emit_int_value(builder: &mut PilBuilder<'_>, ty: &PilType, value: i128) -> ValueId {
    let (raw_ty, wrapped) = sentinel_integer_type(ty);
    let raw = builder.integer_literal(raw_ty.clone(), value);
    if wrapped {
        builder.struct_(ty.clone(), &[raw])
    } else {
        raw
    }
}

/// Emits the contents of an error block: take the bridged error (from the slot,
/// or from the block's single argument), convert it to a native error and throw.
///
/// The insertion point of `builder` is left unchanged.
pub fn emit_foreign_error_block(
    builder: &mut PilBuilder<'_>,
    error_block: BlockId,
    error_slot: Option<ValueId>,
) {
    let saved = builder.save_insertion_point();
    builder.emit_block(error_block);

    let bridged = match error_slot {
        Some(slot) => builder.emit_load_value_operation(slot, LoadQualifier::Take),
        None => {
            let args = builder.function().block(error_block).args();
            assert!(
                args.len() == 1,
                "error block {error_block} without a slot must take the error as its argument"
            );
            args[0]
        }
    };
    let native = builder.bridged_to_native_error(bridged);
    builder.throw(native);

    builder.restore_insertion_point(saved);
}

fn emit_result_is_zero_error_check(
    builder: &mut PilBuilder<'_>,
    result: ValueId,
    error_slot: ValueId,
    suppress_error_check: bool,
    zero_is_error: bool,
) {
    if suppress_error_check {
        return;
    }

    let raw = emit_unwrap_integer_result(builder, result);
    let condition = if builder.function().ty(raw).is_builtin_integer(1) {
        raw
    } else {
        let ty = builder.function().ty(raw).clone();
        let zero = builder.integer_literal(ty, 0);
        builder.cmp_ne(raw, zero)
    };

    let cont = builder.create_block_after_insertion_block();
    let error = builder.create_block(Section::Postmatter);
    if zero_is_error {
        builder.cond_branch(condition, cont, &[], error, &[]);
    } else {
        builder.cond_branch(condition, error, &[], cont, &[]);
    }

    emit_foreign_error_block(builder, error, Some(error_slot));
    builder.emit_block(cont);
}

fn emit_result_is_nil_error_check(
    builder: &mut PilBuilder<'_>,
    result: &mut ValueId,
    error_slot: ValueId,
    suppress_error_check: bool,
) {
    if suppress_error_check {
        *result = builder.unchecked_enum_data(*result);
        return;
    }

    let Some(payload_ty) = builder.function().ty(*result).optional_object_type().cloned() else {
        panic!(
            "nil_result convention on non-optional result {} : {}",
            *result,
            builder.function().ty(*result)
        );
    };

    let cont = builder.create_block_after_insertion_block();
    let ownership = builder.owned(&payload_ty);
    let payload = builder.add_block_arg(cont, payload_ty, ownership);
    let error = builder.create_block(Section::Postmatter);
    builder.switch_enum(
        *result,
        vec![(EnumCase::Some, cont), (EnumCase::None, error)],
        None,
    );

    emit_foreign_error_block(builder, error, Some(error_slot));
    builder.emit_block(cont);
    *result = payload;
}

fn emit_error_is_non_nil_error_check(
    builder: &mut PilBuilder<'_>,
    error_slot: ValueId,
    suppress_error_check: bool,
) {
    if suppress_error_check {
        return;
    }

    let optional_error = builder.emit_load_value_operation(error_slot, LoadQualifier::Take);
    let error_ty = builder
        .function()
        .ty(optional_error)
        .unwrap_optional_type()
        .clone();

    let error = builder.create_block(Section::Postmatter);
    let ownership = builder.owned(&error_ty);
    builder.add_block_arg(error, error_ty, ownership);
    let cont = builder.create_block_after_insertion_block();
    builder.switch_enum(
        optional_error,
        vec![(EnumCase::Some, error), (EnumCase::None, cont)],
        None,
    );

    emit_foreign_error_block(builder, error, None);
    builder.emit_block(cont);
}

/// Emits the post-call check of a foreign call.
///
/// The builder must be positioned at the end of the unterminated block holding
/// the call. On return it is positioned at the end of the (unterminated)
/// continuation block, and `results` holds the formal results of the call.
///
/// # Arguments
///
/// * `builder` - Builder positioned right after the call
/// * `results` - Direct results of the call, rewritten in place
/// * `error_slot` - Address of the optional bridged error written by the callee
/// * `suppress_error_check` - The callee is known not to fail; skip the branches
/// * `convention` - Failure contract of the callee
///
/// # Panics
///
/// Panics if a result-based convention does not see exactly one direct result.
pub fn emit_foreign_error_check(
    builder: &mut PilBuilder<'_>,
    results: &mut Vec<ValueId>,
    error_slot: ValueId,
    suppress_error_check: bool,
    convention: &ForeignErrorConvention,
) {
    if convention.kind != ForeignErrorKind::NonNilError {
        assert!(
            results.len() == 1,
            "{} convention expects one direct result, found {}",
            convention.kind,
            results.len()
        );
    }

    match convention.kind {
        ForeignErrorKind::ZeroPreservedResult => {
            emit_result_is_zero_error_check(builder, results[0], error_slot, suppress_error_check, true);
        }
        ForeignErrorKind::ZeroResult | ForeignErrorKind::NonZeroResult => {
            let zero_is_error = convention.kind == ForeignErrorKind::ZeroResult;
            if let Some(sentinel) = results.pop() {
                emit_result_is_zero_error_check(
                    builder,
                    sentinel,
                    error_slot,
                    suppress_error_check,
                    zero_is_error,
                );
            }
        }
        ForeignErrorKind::NilResult => {
            emit_result_is_nil_error_check(builder, &mut results[0], error_slot, suppress_error_check);
        }
        ForeignErrorKind::NonNilError => {
            emit_error_is_non_nil_error_check(builder, error_slot, suppress_error_check);
        }
    }
}

/// Something that can be stored into a foreign error slot.
pub trait BridgedErrorSource {
    /// Produces the value to store into a slot whose pointee type is `pointee`.
    fn emit_bridged(&self, builder: &mut PilBuilder<'_>, pointee: &PilType) -> ValueId;

    /// Releases the source when there is no slot to store it into.
    fn emit_release(&self, builder: &mut PilBuilder<'_>);
}

/// A native error to be bridged and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NativeErrorSource {
    native: ValueId,
}

impl NativeErrorSource {
    /// Wraps an owned native error value.
    #[must_use]
    pub const fn new(native: ValueId) -> Self {
        Self { native }
    }
}

impl BridgedErrorSource for NativeErrorSource {
    fn emit_bridged(&self, builder: &mut PilBuilder<'_>, pointee: &PilType) -> ValueId {
        match pointee.optional_object_type() {
            Some(payload) => {
                let bridged = builder.native_to_bridged_error(self.native, payload.clone());
                builder.enum_some(bridged, pointee.clone())
            }
            None => builder.native_to_bridged_error(self.native, pointee.clone()),
        }
    }

    fn emit_release(&self, builder: &mut PilBuilder<'_>) {
        builder.emit_destroy_value_operation(self.native);
    }
}

/// `nil`, stored on success so the foreign caller sees no error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NilErrorSource;

impl BridgedErrorSource for NilErrorSource {
    fn emit_bridged(&self, builder: &mut PilBuilder<'_>, pointee: &PilType) -> ValueId {
        builder.enum_none(pointee.clone())
    }

    fn emit_release(&self, _builder: &mut PilBuilder<'_>) {}
}

fn is_bridged_error_pointee(pointee: &PilType) -> bool {
    matches!(pointee.unwrap_optional_type(), PilType::BridgedError(_))
}

/// Stores `source` through the foreign error slot `slot`.
///
/// An optional slot pointer is switched on first: when present the store happens
/// in a `some` block, when absent the source is released instead, and both paths
/// join in a continuation block where the builder is left. A slot whose pointee
/// is not a bridged error is diagnosed and the source is released.
pub fn emit_store_to_foreign_error_slot(
    builder: &mut PilBuilder<'_>,
    slot: ValueId,
    source: &dyn BridgedErrorSource,
    diagnostics: &dyn DiagnosticEngine,
) {
    let slot_ty = builder.function().ty(slot).clone();

    if let Some(pointer_ty) = slot_ty.optional_object_type() {
        let cont = builder.create_block_after_insertion_block();
        let no_slot = builder.function_mut().create_block_after(cont);
        let has_slot = builder.function_mut().create_block_after(no_slot);
        let pointer = builder.add_block_arg(has_slot, pointer_ty.clone(), OwnershipKind::Trivial);
        builder.switch_enum(
            slot,
            vec![(EnumCase::Some, has_slot), (EnumCase::None, no_slot)],
            None,
        );

        builder.emit_block(has_slot);
        emit_store_to_foreign_error_slot(builder, pointer, source, diagnostics);
        builder.branch(cont, &[]);

        builder.emit_block(no_slot);
        source.emit_release(builder);
        builder.branch(cont, &[]);

        builder.emit_block(cont);
        return;
    }

    let pointee = match slot_ty.pointer_element_type() {
        Some((_, pointee)) if is_bridged_error_pointee(pointee) => pointee.clone(),
        _ => {
            let function = builder.function().name().to_string();
            diagnostics.diagnose(
                Diagnostic::new(
                    DiagnosticId::CouldNotFindPointerPointeeProperty,
                    format!("could not find pointee property of error slot type {slot_ty}"),
                )
                .at(builder.loc())
                .in_function(function),
            );
            source.emit_release(builder);
            return;
        }
    };

    let bridged = source.emit_bridged(builder, &pointee);
    let address = builder.pointer_to_address(slot);
    builder.store(bridged, address, StoreQualifier::Assign);
}

/// Callee side of a failing call: stores `native_error` into the slot and returns
/// the failure sentinel of type `bridged_result_ty`.
pub fn emit_bridge_error_for_foreign_error(
    builder: &mut PilBuilder<'_>,
    native_error: ValueId,
    bridged_result_ty: &PilType,
    error_slot: ValueId,
    convention: &ForeignErrorConvention,
    diagnostics: &dyn DiagnosticEngine,
) -> ValueId {
    emit_store_to_foreign_error_slot(
        builder,
        error_slot,
        &NativeErrorSource::new(native_error),
        diagnostics,
    );

    match convention.kind {
        ForeignErrorKind::ZeroResult | ForeignErrorKind::ZeroPreservedResult => {
            emit_int_value(builder, bridged_result_ty, 0)
        }
        ForeignErrorKind::NonZeroResult => emit_int_value(builder, bridged_result_ty, 1),
        ForeignErrorKind::NilResult => builder.enum_none(bridged_result_ty.clone()),
        ForeignErrorKind::NonNilError => builder.function_mut().undef(bridged_result_ty.clone()),
    }
}

/// Callee side of a successful call: turns the native `result` into the bridged
/// success value of type `bridged_result_ty`.
pub fn emit_bridge_return_value_for_foreign_error(
    builder: &mut PilBuilder<'_>,
    result: ValueId,
    bridged_result_ty: &PilType,
    error_slot: ValueId,
    convention: &ForeignErrorConvention,
    diagnostics: &dyn DiagnosticEngine,
) -> ValueId {
    match convention.kind {
        ForeignErrorKind::ZeroResult => emit_int_value(builder, bridged_result_ty, 1),
        ForeignErrorKind::NonZeroResult => emit_int_value(builder, bridged_result_ty, 0),
        ForeignErrorKind::ZeroPreservedResult => result,
        ForeignErrorKind::NilResult => builder.enum_some(result, bridged_result_ty.clone()),
        ForeignErrorKind::NonNilError => {
            emit_store_to_foreign_error_slot(builder, error_slot, &NilErrorSource, diagnostics);
            result
        }
    }
}

/// Where the callee writes its error.
#[derive(Debug, Clone, Copy)]
enum ErrorSlot {
    /// Already an address.
    Address(ValueId),
    /// A pointer still to be converted with `pointer_to_address`.
    Pointer(ValueId),
}

impl ErrorSlot {
    fn emit_address(self, builder: &mut PilBuilder<'_>) -> ValueId {
        match self {
            Self::Address(address) => address,
            Self::Pointer(pointer) => builder.pointer_to_address(pointer),
        }
    }
}

/// Finds the value the callee writes its error through, without touching `func`.
fn resolve_error_slot(func: &Function, argument: ValueId) -> Result<ErrorSlot> {
    match func.ty(argument) {
        PilType::Address(_) => Ok(ErrorSlot::Address(argument)),
        PilType::Pointer { .. } => Ok(ErrorSlot::Pointer(argument)),
        PilType::Optional(inner) if matches!(**inner, PilType::Pointer { .. }) => {
            let wrapped = func.value(argument).defining_inst().and_then(|def| {
                matches!(func.kind(def), InstKind::Enum { case: EnumCase::Some })
                    .then(|| func.operand_value(def, 0))
            });
            wrapped.map(ErrorSlot::Pointer).ok_or_else(|| {
                Error::Error(format!(
                    "error slot {argument} of a foreign call in '{}' is not a statically present pointer",
                    func.name()
                ))
            })
        }
        other => Err(Error::Error(format!(
            "error slot {argument} of a foreign call in '{}' has non-pointer type {other}",
            func.name()
        ))),
    }
}

/// Lowers the foreign error convention of one `apply`.
///
/// The block is split after the call, the check is emitted in between and
/// `unchecked_enum_data` unwraps of a `nil_result` call are redirected to the
/// checked payload. The convention is cleared from the call so a second run does
/// nothing.
///
/// # Returns
///
/// `Ok(false)` if `apply` carries no convention.
///
/// # Errors
///
/// Returns an error if the error slot argument cannot be resolved to an address.
/// `func` is left unchanged in that case.
pub fn lower_foreign_error_call(func: &mut Function, apply: InstId) -> Result<bool> {
    let (convention, suppress) = match func.kind(apply) {
        InstKind::Apply {
            foreign_error: Some(convention),
            does_not_throw,
        } => (convention.clone(), *does_not_throw),
        _ => return Ok(false),
    };

    let arg_index = 1 + convention.error_parameter_index;
    if arg_index >= func.inst(apply).operands().len() {
        return Err(Error::Error(format!(
            "foreign call {apply} in '{}' has no error parameter at index {}",
            func.name(),
            convention.error_parameter_index
        )));
    }
    let slot = resolve_error_slot(func, func.operand_value(apply, arg_index))?;
    let call_result = func.result(apply);
    let loc = func.inst(apply).loc();
    let block = func.parent_block(apply);
    let rest = func.split_block_after(apply);

    let mut results: Vec<ValueId> = call_result.into_iter().collect();
    let checked = {
        let mut builder = PilBuilder::at_end(func, block);
        builder.set_loc(loc);
        let slot = slot.emit_address(&mut builder);
        emit_foreign_error_check(&mut builder, &mut results, slot, suppress, &convention);
        builder.branch(rest, &[]);
        results.first().copied()
    };

    if convention.kind == ForeignErrorKind::NilResult {
        if let (Some(optional), Some(payload)) = (call_result, checked) {
            let placeholders: Vec<InstId> = func
                .users(optional)
                .into_iter()
                .filter(|&user| matches!(func.kind(user), InstKind::UncheckedEnumData))
                .filter(|&user| func.results(user).first() != Some(&payload))
                .collect();
            for placeholder in placeholders {
                let old = func.results(placeholder)[0];
                func.replace_all_uses_with(old, payload);
                func.erase_inst(placeholder);
            }
        }
    }

    if let InstKind::Apply { foreign_error, .. } = func.kind_mut(apply) {
        *foreign_error = None;
    }
    log::trace!(
        "lowered {} call {apply} in '{}'",
        convention.kind,
        func.name()
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        diagnostics::{DiagnosticCollector, Severity},
        options::DiagnosticOptions,
        pil::{PilLinkage, PointerKind},
    };

    fn error_ty() -> PilType {
        PilType::optional(PilType::BridgedError("NSError".into()))
    }

    fn slot_ty() -> PilType {
        PilType::pointer(PointerKind::Autoreleasing, error_ty())
    }

    fn status_code() -> PilType {
        PilType::structure("StatusCode", vec![("raw".into(), PilType::Int(32))])
    }

    #[test]
    fn test_unwrap_single_field_wrapper() {
        let mut f = Function::new("f", PilLinkage::Private);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let status = emit_int_value(&mut b, &status_code(), 1);
        let raw = emit_unwrap_integer_result(&mut b, status);
        assert_eq!(b.function().ty(raw), &PilType::Int(32));
        let plain = b.integer_literal(PilType::Int(8), 3);
        assert_eq!(emit_unwrap_integer_result(&mut b, plain), plain);
    }

    #[test]
    #[should_panic(expected = "exactly one stored property")]
    fn test_two_field_wrapper_rejected() {
        let pair = PilType::structure(
            "Pair",
            vec![("a".into(), PilType::Int(32)), ("b".into(), PilType::Int(32))],
        );
        let mut f = Function::new("f", PilLinkage::Private);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let a = b.integer_literal(PilType::Int(32), 1);
        let value = b.struct_(pair, &[a, a]);
        emit_unwrap_integer_result(&mut b, value);
    }

    #[test]
    fn test_zero_result_check_shape() -> crate::Result<()> {
        let mut f = Function::new("caller", PilLinkage::Public);
        f.set_throws(true);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let slot = b.add_block_arg(entry, PilType::address(error_ty()), OwnershipKind::Trivial);
        let sentinel = b.integer_literal(PilType::Int(8), 1);
        let convention =
            ForeignErrorConvention::new(ForeignErrorKind::ZeroResult, 0, slot_ty(), PilType::Int(8));
        let mut results = vec![sentinel];
        emit_foreign_error_check(&mut b, &mut results, slot, false, &convention);
        let unit = b.integer_literal(PilType::Int(8), 0);
        b.return_(unit);

        assert!(results.is_empty());
        assert_eq!(f.block_count(), 3);
        let last = *f.layout().last().unwrap_or(&entry);
        assert_eq!(f.block(last).section(), Section::Postmatter);
        assert!(matches!(
            f.kind(f.terminator(last).unwrap()),
            InstKind::Throw
        ));
        f.verify()
    }

    #[test]
    fn test_suppressed_checks_emit_no_branches() {
        let mut f = Function::new("caller", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let slot = b.add_block_arg(entry, PilType::address(error_ty()), OwnershipKind::Trivial);
        let payload = b.integer_literal(PilType::Int(64), 9);
        let optional = b.enum_some(payload, PilType::optional(PilType::Int(64)));
        let convention = ForeignErrorConvention::new(
            ForeignErrorKind::NilResult,
            0,
            slot_ty(),
            PilType::optional(PilType::Int(64)),
        );
        let mut results = vec![optional];
        emit_foreign_error_check(&mut b, &mut results, slot, true, &convention);
        assert_ne!(results[0], optional);
        assert_eq!(b.function().ty(results[0]), &PilType::Int(64));
        assert_eq!(b.function().block_count(), 1);
    }

    #[test]
    fn test_store_through_optional_slot() -> crate::Result<()> {
        let diagnostics = DiagnosticCollector::new(DiagnosticOptions::default());
        let mut f = Function::new("callee", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let native = b.add_block_arg(entry, PilType::NativeError, OwnershipKind::Owned);
        let slot = b.add_block_arg(entry, PilType::optional(slot_ty()), OwnershipKind::Trivial);
        let convention =
            ForeignErrorConvention::new(ForeignErrorKind::ZeroResult, 0, slot_ty(), status_code());
        let failure =
            emit_bridge_error_for_foreign_error(&mut b, native, &status_code(), slot, &convention, &diagnostics);
        b.return_(failure);

        assert_eq!(f.block_count(), 4);
        assert!(diagnostics.diagnostics().is_empty());
        let kinds: Vec<&'static str> = f
            .instructions()
            .into_iter()
            .map(|inst| f.kind(inst).mnemonic())
            .collect();
        assert!(kinds.contains(&"switch_enum"));
        assert!(kinds.contains(&"native_to_bridged_error"));
        assert!(kinds.contains(&"destroy_value"));
        f.verify()
    }

    #[test]
    fn test_non_pointer_slot_leaves_function_unchanged() {
        let mut f = Function::new("caller", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let slot = b.add_block_arg(entry, PilType::Int(64), OwnershipKind::Trivial);
        let callee = b.function_ref("foreign");
        let convention = ForeignErrorConvention::new(
            ForeignErrorKind::ZeroResult,
            0,
            slot_ty(),
            PilType::Int(8),
        );
        let call = b.apply(callee, &[slot], PilType::Int(8), Some(convention));
        let value = b.function().results(call)[0];
        b.return_(value);
        let before = f.to_string();

        let error = lower_foreign_error_call(&mut f, call).unwrap_err();
        assert!(error.to_string().contains("non-pointer type"));
        assert_eq!(f.to_string(), before);
        assert_eq!(f.block_count(), 1);
        assert!(matches!(
            f.kind(call),
            InstKind::Apply {
                foreign_error: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_slot_is_diagnosed() {
        let diagnostics = DiagnosticCollector::new(DiagnosticOptions::default());
        let mut f = Function::new("callee", PilLinkage::Public);
        let mut b = PilBuilder::new(&mut f);
        let entry = b.create_block(Section::Main);
        b.emit_block(entry);
        let native = b.add_block_arg(entry, PilType::NativeError, OwnershipKind::Owned);
        let slot = b.add_block_arg(entry, PilType::RawPointer, OwnershipKind::Trivial);
        emit_store_to_foreign_error_slot(&mut b, slot, &NativeErrorSource::new(native), &diagnostics);

        let reported = diagnostics.diagnostics();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].id, DiagnosticId::CouldNotFindPointerPointeeProperty);
        assert_eq!(reported[0].severity, Severity::Error);
        assert_eq!(f.uses(native).len(), 1);
    }
}
