//! Durable single-value storage for the last issued identifier.
//!
//! ## Structure
//!
//! - [`Store`] - the storage seam the [`Allocator`](crate::Allocator) writes
//!   through.
//! - [`FileStore`] - a single text file holding decimal digits.

mod file;
#[cfg(test)]
mod tests;

pub use file::*;

use crate::Result;

/// Durable storage for exactly one value: the most recently issued
/// identifier.
///
/// Implementations are driven by a single owner and are never called
/// concurrently.
pub trait Store {
    /// Prepares the backing medium and reads the last issued identifier.
    ///
    /// Returns `Ok(None)` when nothing has been issued yet.
    ///
    /// # Errors
    ///
    /// Any error here is fatal ([`Error::is_fatal`]): the medium could not be
    /// prepared or read ([`Error::StoreInit`]), or it holds something that is
    /// not an identifier ([`Error::Corrupted`]).
    ///
    /// [`Error::is_fatal`]: crate::Error::is_fatal
    /// [`Error::StoreInit`]: crate::Error::StoreInit
    /// [`Error::Corrupted`]: crate::Error::Corrupted
    fn initialize(&mut self) -> Result<Option<u64>>;

    /// Replaces the stored value with `id`.
    ///
    /// Must not return `Ok` until the value is durable.
    ///
    /// # Errors
    ///
    /// [`Error::Persist`](crate::Error::Persist) if the write did not complete.
    fn persist(&mut self, id: u64) -> Result<()>;
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn initialize(&mut self) -> Result<Option<u64>> {
        (**self).initialize()
    }

    fn persist(&mut self, id: u64) -> Result<()> {
        (**self).persist(id)
    }
}
