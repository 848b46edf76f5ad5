#![allow(unused_macros)]

/// Helper macro for reading locked items
///
/// ```rust, ignore
///  let graph = read_lock!(ctx.call_graph)?;
///  println!("{}", graph.caller_count("main"));
/// ```
macro_rules! read_lock {
    ($rwlock:expr) => {
        $rwlock.read().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for writing to locked items
///
/// ```rust, ignore
///  let mut graph = write_lock!(ctx.call_graph)?;
///  *graph = CallGraph::build(module);
/// ```
macro_rules! write_lock {
    ($rwlock:expr) => {
        $rwlock.write().map_err(|_| crate::Error::LockError)
    };
}

/// Helper macro for locking items
///
/// ```rust, ignore
///  let mut diagnostics = lock!(self.diagnostics)?;
///  diagnostics.push(diag);
/// ```
macro_rules! lock {
    ($mutex:expr) => {
        $mutex.lock().map_err(|_| crate::Error::LockError)
    };
}

/// Declares a generation-checked handle into a per-function arena.
///
/// ```rust, ignore
///  entity_id!(ValueId, "%");
///  let id = ValueId::new(3, 0);
///  assert_eq!(id.to_string(), "%3");
/// ```
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            index: u32,
            generation: u32,
        }

        impl $name {
            /// Creates a handle from a raw arena slot and generation.
            #[must_use]
            pub const fn new(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            /// Returns the arena slot of this handle.
            #[must_use]
            pub const fn index(self) -> usize {
                self.index as usize
            }

            /// Returns the generation of the arena slot this handle was issued for.
            #[must_use]
            pub const fn generation(self) -> u32 {
                self.generation
            }
        }

        impl crate::pil::entity::EntityId for $name {
            fn from_parts(index: u32, generation: u32) -> Self {
                Self::new(index, generation)
            }

            fn slot(self) -> usize {
                self.index()
            }

            fn generation(self) -> u32 {
                self.generation
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}.{}", $prefix, self.index, self.generation)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.index)
            }
        }
    };
}
