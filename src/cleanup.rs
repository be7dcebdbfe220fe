//! Cleanup strategies for objects leaving the pool

use std::fmt;
use std::sync::Arc;

use crate::errors::BoxError;

/// Capability for objects that hold an external resource which must be
/// closed explicitly rather than just dropped.
///
/// # Examples
///
/// ```
/// use esox_boundedpool::{BoxError, Closeable};
///
/// struct Channel {
///     open: bool,
/// }
///
/// impl Closeable for Channel {
///     fn close(mut self) -> Result<(), BoxError> {
///         self.open = false;
///         Ok(())
///     }
/// }
/// ```
pub trait Closeable {
    /// Release the underlying resource, consuming the object.
    fn close(self) -> Result<(), BoxError>;
}

pub(crate) type CleanupFn<T> = Arc<dyn Fn(T) -> Result<(), BoxError> + Send + Sync>;

/// What happens to an object when the pool evicts or disposes it
pub(crate) enum Cleanup<T> {
    /// Drop the object
    Drop,

    /// Call a user supplied function
    Custom(CleanupFn<T>),
}

impl<T> Cleanup<T> {
    pub fn run(&self, item: T) -> Result<(), BoxError> {
        match self {
            Self::Drop => {
                drop(item);
                Ok(())
            }
            Self::Custom(func) => func(item),
        }
    }
}

impl<T> Clone for Cleanup<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Drop => Self::Drop,
            Self::Custom(func) => Self::Custom(Arc::clone(func)),
        }
    }
}

impl<T> fmt::Debug for Cleanup<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("Drop"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}
