use crate::{Error, Result, UniqueId, store::Store};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Owns the pool's counter and checkpoints every identifier to a [`Store`]
/// before handing it out.
///
/// An `Allocator` only exists in the ready state: [`Allocator::new`] reads the
/// store and resumes strictly after the last identifier it recorded.
///
/// [`allocate`](Self::allocate) takes `&mut self`, so exclusive access is
/// enforced by the borrow checker. To share one allocator between concurrent
/// callers, hand it to a [`Dispatcher`](crate::Dispatcher).
///
/// ## Guarantees
/// - An identifier is durable before it is returned.
/// - The counter only advances after a successful persist.
/// - Identifiers start at `1`, never wrap, and never repeat.
///
/// ## Example
/// ```
/// use uidpool::{Allocator, FileStore};
///
/// let path = std::env::temp_dir().join("uidpool-allocator-doctest.txt");
/// # let _ = std::fs::remove_file(&path);
/// let mut allocator = Allocator::new(FileStore::new(&path))?;
/// let first = allocator.allocate()?;
/// let second = allocator.allocate()?;
/// assert!(first < second);
/// # std::fs::remove_file(&path).ok();
/// # Ok::<(), uidpool::Error>(())
/// ```
#[derive(Debug)]
pub struct Allocator<S>
where
    S: Store,
{
    store: S,
    next: u64,
}

impl<S> Allocator<S>
where
    S: Store,
{
    /// Initializes `store` and resumes after its last issued identifier.
    ///
    /// An empty store starts the pool at `1`.
    ///
    /// # Errors
    ///
    /// Propagates the store's fatal initialization errors
    /// ([`Error::StoreInit`], [`Error::Corrupted`]). The pool must not serve
    /// requests when this fails.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(store)))]
    pub fn new(mut store: S) -> Result<Self> {
        let last = store.initialize()?;
        let next = resume_after(last);

        #[cfg(feature = "tracing")]
        tracing::info!("Allocator ready, next id is {next}");

        Ok(Self { store, next })
    }

    /// Issues the next identifier.
    ///
    /// The identifier is persisted first; the in-memory counter only advances
    /// once that write succeeded.
    ///
    /// # Errors
    ///
    /// - [`Error::Persist`] if the store write failed. The counter is left as
    ///   is, so the next call attempts the same identifier again. There is no
    ///   automatic retry.
    /// - [`Error::PoolDepleted`] with `last_issued: Some(id)` when `id` was
    ///   issued and durably recorded but exhausted the pool.
    /// - [`Error::PoolDepleted`] with `last_issued: None` on every call after
    ///   that. Nothing is persisted.
    pub fn allocate(&mut self) -> Result<UniqueId> {
        if self.is_depleted() {
            return Err(Error::PoolDepleted { last_issued: None });
        }

        let id = self.next;
        // `next` is at least 1 and below `u64::MAX` here.
        let Some(issued) = UniqueId::new(id) else {
            return Err(Error::PoolDepleted { last_issued: None });
        };

        if let Err(e) = self.store.persist(id) {
            #[cfg(feature = "tracing")]
            tracing::error!("Failed to persist id {id}, counter not advanced: {e}");
            return Err(e);
        }

        self.next = id + 1;

        if self.is_depleted() {
            #[cfg(feature = "tracing")]
            tracing::warn!("Unique ID pool is depleted after issuing {id}");
            return Err(Error::PoolDepleted {
                last_issued: Some(issued),
            });
        }

        Ok(issued)
    }

    /// The identifier the next successful [`allocate`](Self::allocate) will
    /// return.
    pub const fn peek_next(&self) -> u64 {
        self.next
    }

    /// Returns `true` once the counter has reached `u64::MAX`.
    pub const fn is_depleted(&self) -> bool {
        self.next == u64::MAX
    }

    /// Borrows the underlying store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Consumes the allocator, returning its store.
    pub fn into_store(self) -> S {
        self.store
    }
}

/// Computes the first identifier to issue given the last one recorded.
///
/// A recorded sentinel resumes at `1` like an empty store. A record at
/// `u64::MAX` saturates, leaving the pool depleted.
const fn resume_after(last: Option<u64>) -> u64 {
    match last {
        None => 1,
        Some(last) => last.saturating_add(1),
    }
}
