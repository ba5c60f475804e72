use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Client-count bookkeeping for pooled entries.
pub(crate) trait Releaser: Send + Sync {
    fn retain(&self, entry_id: u64);
    fn release(&self, entry_id: u64);
}

struct Lease {
    releaser: Arc<dyn Releaser>,
    entry_id: u64,
}

/// Shared handle to an immutable value, optionally counted against a pool entry.
///
/// A *detached* ref is a plain shared value. A *leased* ref was handed out by a
/// [`CountingPool`](crate::pool::counting::CountingPool); cloning it adds a client to the entry
/// and dropping it removes one. When the last client goes away the entry becomes exclusive to
/// the pool and eligible for reuse.
pub struct PooledRef<V> {
    value: Arc<V>,
    lease: Option<Lease>,
}

impl<V> PooledRef<V> {
    /// Detached ref owning `value`.
    pub fn new(value: V) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Detached ref sharing `value`.
    pub fn from_arc(value: Arc<V>) -> Self {
        Self { value, lease: None }
    }

    /// Leased ref. The caller already counted this client.
    pub(crate) fn leased(value: Arc<V>, releaser: Arc<dyn Releaser>, entry_id: u64) -> Self {
        Self {
            value,
            lease: Some(Lease { releaser, entry_id }),
        }
    }

    /// Borrow the value.
    pub fn get(&self) -> &V {
        &self.value
    }

    /// Return `true` when both refs point at the same value.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.value, &b.value)
    }

    /// Return `true` when this ref counts against a pool entry.
    pub fn is_leased(&self) -> bool {
        self.lease.is_some()
    }

    /// Release this ref now. Equivalent to dropping it.
    pub fn close(self) {}

    pub(crate) fn shared(&self) -> &Arc<V> {
        &self.value
    }

    /// Take the value back when this is the only handle to it anywhere.
    ///
    /// Leased refs are never unwrapped: the pool still owns their entry.
    pub(crate) fn try_unwrap(self) -> Result<V, Self> {
        if self.lease.is_some() {
            return Err(self);
        }
        let value = Arc::clone(&self.value);
        drop(self);
        Arc::try_unwrap(value).map_err(Self::from_arc)
    }
}

impl<V> Clone for PooledRef<V> {
    fn clone(&self) -> Self {
        let lease = self.lease.as_ref().map(|lease| {
            lease.releaser.retain(lease.entry_id);
            Lease {
                releaser: Arc::clone(&lease.releaser),
                entry_id: lease.entry_id,
            }
        });
        Self {
            value: Arc::clone(&self.value),
            lease,
        }
    }
}

impl<V> Drop for PooledRef<V> {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            lease.releaser.release(lease.entry_id);
        }
    }
}

impl<V> Deref for PooledRef<V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.value
    }
}

impl<V: fmt::Debug> fmt::Debug for PooledRef<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledRef")
            .field("value", &self.value)
            .field("entry", &self.lease.as_ref().map(|l| l.entry_id))
            .finish()
    }
}
