//! Lowered types of the mid-level IR.
//!
//! A [`PilType`] is the type of a value after type lowering: it distinguishes objects
//! from addresses, exposes the stored-field layout of structs and tells whether values
//! of the type need reference counting. Passes never see surface AST types.
//!
//! # Triviality
//!
//! | Type | Trivial | Reference counted |
//! |------|---------|-------------------|
//! | `Int(n)`, `RawPointer`, `Pointer`, `Address`, `Empty` | yes | no |
//! | `Function { thick: false }` | yes | no |
//! | `Function { thick: true }` | no | yes |
//! | `Object`, `NativeError`, `BridgedError` | no | yes |
//! | `Struct`, `Optional` | if every field / the payload is | no |

use std::{fmt, sync::Arc};

/// A nominal struct layout with ordered stored properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructLayout {
    /// Declared name of the struct.
    pub name: String,
    /// Stored properties in declaration order.
    pub fields: Vec<(String, PilType)>,
}

/// The flavour of a typed pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerKind {
    /// `UnsafeMutablePointer<T>`
    Mutable,
    /// `AutoreleasingUnsafeMutablePointer<T>`, the canonical foreign error out-parameter.
    Autoreleasing,
}

/// A lowered type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PilType {
    /// `Builtin.IntN`
    Int(u16),
    /// `Builtin.RawPointer`
    RawPointer,
    /// A struct with a known stored-field layout.
    Struct(Arc<StructLayout>),
    /// `Optional<T>` with the `some` payload type.
    Optional(Box<PilType>),
    /// A typed pointer object.
    Pointer {
        /// Mutable or autoreleasing.
        kind: PointerKind,
        /// The pointee type.
        pointee: Box<PilType>,
    },
    /// A native class reference.
    Object(String),
    /// The native error existential.
    NativeError,
    /// A foreign error object (for example `NSError`).
    BridgedError(String),
    /// A function value.
    Function {
        /// Thick functions carry a context and are reference counted.
        thick: bool,
    },
    /// The address of a value of the wrapped type.
    Address(Box<PilType>),
    /// The empty tuple `()`.
    Empty,
}

impl PilType {
    /// Convenience constructor for `Optional<ty>`.
    #[must_use]
    pub fn optional(ty: PilType) -> Self {
        Self::Optional(Box::new(ty))
    }

    /// Convenience constructor for the address of `ty`.
    #[must_use]
    pub fn address(ty: PilType) -> Self {
        Self::Address(Box::new(ty))
    }

    /// Convenience constructor for a typed pointer.
    #[must_use]
    pub fn pointer(kind: PointerKind, pointee: PilType) -> Self {
        Self::Pointer {
            kind,
            pointee: Box::new(pointee),
        }
    }

    /// Convenience constructor for a struct type.
    #[must_use]
    pub fn structure(name: impl Into<String>, fields: Vec<(String, PilType)>) -> Self {
        Self::Struct(Arc::new(StructLayout {
            name: name.into(),
            fields,
        }))
    }

    /// Returns `true` if values of this type need no reference counting.
    #[must_use]
    pub fn is_trivial(&self) -> bool {
        match self {
            Self::Int(_) | Self::RawPointer | Self::Pointer { .. } | Self::Address(_) => true,
            Self::Empty => true,
            Self::Function { thick } => !thick,
            Self::Object(_) | Self::NativeError | Self::BridgedError(_) => false,
            Self::Struct(layout) => layout.fields.iter().all(|(_, ty)| ty.is_trivial()),
            Self::Optional(payload) => payload.is_trivial(),
        }
    }

    /// Returns `true` if the value itself is a single reference-counted pointer.
    ///
    /// Such values are adjusted with `strong_retain` / `strong_release`; other
    /// non-trivial values use `retain_value` / `release_value`.
    #[must_use]
    pub fn is_reference_counted(&self) -> bool {
        matches!(
            self,
            Self::Object(_) | Self::NativeError | Self::BridgedError(_) | Self::Function { thick: true }
        )
    }

    /// Returns `true` for addresses.
    #[must_use]
    pub const fn is_address(&self) -> bool {
        matches!(self, Self::Address(_))
    }

    /// Returns `true` for `Builtin.Int{bits}`.
    #[must_use]
    pub fn is_builtin_integer(&self, bits: u16) -> bool {
        matches!(self, Self::Int(b) if *b == bits)
    }

    /// The payload type if this is an optional.
    #[must_use]
    pub fn optional_object_type(&self) -> Option<&PilType> {
        match self {
            Self::Optional(payload) => Some(payload),
            _ => None,
        }
    }

    /// Strips one level of optionality, returning the type itself otherwise.
    #[must_use]
    pub fn unwrap_optional_type(&self) -> &PilType {
        self.optional_object_type().unwrap_or(self)
    }

    /// The pointee type of a typed pointer.
    #[must_use]
    pub fn pointer_element_type(&self) -> Option<(PointerKind, &PilType)> {
        match self {
            Self::Pointer { kind, pointee } => Some((*kind, pointee)),
            _ => None,
        }
    }

    /// The stored fields if this is a struct.
    #[must_use]
    pub fn struct_fields(&self) -> Option<&[(String, PilType)]> {
        match self {
            Self::Struct(layout) => Some(&layout.fields),
            _ => None,
        }
    }

    /// The object type of an address.
    #[must_use]
    pub fn object_type(&self) -> &PilType {
        match self {
            Self::Address(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for PilType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(bits) => write!(f, "Builtin.Int{bits}"),
            Self::RawPointer => write!(f, "Builtin.RawPointer"),
            Self::Struct(layout) => write!(f, "{}", layout.name),
            Self::Optional(payload) => write!(f, "Optional<{payload}>"),
            Self::Pointer { kind, pointee } => match kind {
                PointerKind::Mutable => write!(f, "UnsafeMutablePointer<{pointee}>"),
                PointerKind::Autoreleasing => {
                    write!(f, "AutoreleasingUnsafeMutablePointer<{pointee}>")
                }
            },
            Self::Object(name) => write!(f, "{name}"),
            Self::NativeError => write!(f, "Error"),
            Self::BridgedError(name) => write!(f, "{name}"),
            Self::Function { thick: true } => write!(f, "@callee_guaranteed ()"),
            Self::Function { thick: false } => write!(f, "@convention(thin) ()"),
            Self::Address(inner) => write!(f, "*{inner}"),
            Self::Empty => write!(f, "()"),
        }
    }
}
