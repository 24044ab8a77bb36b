use core::{fmt, num::NonZeroU64};

use crate::Error;

/// The reserved identifier meaning "allocation failed".
///
/// It is never issued as a valid identifier. In-process, failure is carried
/// as an [`Error`]; this raw value only exists at wire boundaries that
/// cannot express one.
pub const SENTINEL_ID: u64 = 0;

/// An identifier issued by the pool.
///
/// Backed by [`NonZeroU64`], so the [`SENTINEL_ID`] can never be mistaken for
/// a valid identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct UniqueId(NonZeroU64);

impl UniqueId {
    /// The smallest identifier a fresh pool issues.
    pub const FIRST: Self = Self(NonZeroU64::MIN);

    /// Wraps a raw value, returning `None` for the sentinel.
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Returns the raw `u64` value.
    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Flattens an allocation result into its raw wire form: the identifier on
    /// success, [`SENTINEL_ID`] on any failure.
    pub fn raw_or_sentinel(result: &Result<Self, Error>) -> u64 {
        result.as_ref().map_or(SENTINEL_ID, |id| id.get())
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<UniqueId> for u64 {
    fn from(id: UniqueId) -> Self {
        id.get()
    }
}

impl TryFrom<u64> for UniqueId {
    type Error = u64;

    /// Fails with the rejected value when given the sentinel.
    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Self::new(raw).ok_or(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_not_an_id() {
        assert_eq!(UniqueId::new(SENTINEL_ID), None);
        assert_eq!(UniqueId::try_from(0), Err(0));
    }

    #[test]
    fn first_id_is_one() {
        assert_eq!(UniqueId::FIRST.get(), 1);
        assert_eq!(UniqueId::FIRST.to_string(), "1");
    }

    #[test]
    fn raw_or_sentinel_flattens_failures() {
        let ok: Result<UniqueId, Error> = Ok(UniqueId::new(42).unwrap());
        let err: Result<UniqueId, Error> = Err(Error::ServiceShutdown);
        assert_eq!(UniqueId::raw_or_sentinel(&ok), 42);
        assert_eq!(UniqueId::raw_or_sentinel(&err), SENTINEL_ID);
    }
}
