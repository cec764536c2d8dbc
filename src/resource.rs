//! Capability trait for pooled resources and the closure-based wrapper

use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::errors::CleanupError;

/// A value that can live in an [`ObjectPool`](crate::ObjectPool).
///
/// The pool calls [`reset_state`](Self::reset_state) every time a value is
/// returned, and [`release_resources`](Self::release_resources) exactly once
/// right before it drops a value for good (disposal, trimming, eviction or a
/// failed reset).
///
/// # Examples
///
/// ```
/// use recycle_pool::PooledResource;
///
/// struct Buffer {
///     bytes: Vec<u8>,
/// }
///
/// impl PooledResource for Buffer {
///     fn reset_state(&mut self) -> bool {
///         self.bytes.clear();
///         // Oversized buffers are not worth keeping around.
///         self.bytes.capacity() <= 64 * 1024
///     }
/// }
/// ```
pub trait PooledResource: Send + 'static {
    /// Bring the value back to a state indistinguishable from a fresh one.
    ///
    /// Returning `false` marks the value as unusable: it is released and
    /// never handed out again.
    fn reset_state(&mut self) -> bool {
        true
    }

    /// Free anything not reclaimed by `Drop` alone.
    fn release_resources(&mut self) -> Result<(), CleanupError> {
        Ok(())
    }
}

impl<T: Send + 'static> PooledResource for Vec<T> {
    fn reset_state(&mut self) -> bool {
        self.clear();
        true
    }
}

impl PooledResource for String {
    fn reset_state(&mut self) -> bool {
        self.clear();
        true
    }
}

type ResetFn<T> = Box<dyn FnMut(&mut T) -> bool + Send>;
type ReleaseFn<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Adapter for pooling types that do not implement [`PooledResource`].
///
/// The reset and release behaviour is injected as closures that receive the
/// wrapped value itself. Missing hooks are no-ops.
///
/// # Examples
///
/// ```
/// use recycle_pool::{ObjectPool, PoolConfiguration, Wrapped};
///
/// let pool = ObjectPool::new(
///     || Ok::<_, std::io::Error>(
///         Wrapped::new(String::new()).on_reset(|s: &mut String| {
///             s.clear();
///             true
///         }),
///     ),
///     PoolConfiguration::new().with_max_size(4),
/// )
/// .unwrap();
///
/// {
///     let mut text = pool.acquire().unwrap();
///     text.push_str("scratch");
/// }
///
/// let text = pool.acquire().unwrap();
/// assert!(text.is_empty());
/// ```
pub struct Wrapped<T> {
    inner: T,
    on_reset: Option<ResetFn<T>>,
    on_release: Option<ReleaseFn<T>>,
}

impl<T> Wrapped<T> {
    /// Wrap a value with no hooks.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            on_reset: None,
            on_release: None,
        }
    }

    /// Wrap a value with both hooks at once.
    pub fn with_hooks<R, D>(inner: T, on_reset: R, on_release: D) -> Self
    where
        R: FnMut(&mut T) -> bool + Send + 'static,
        D: FnOnce(&mut T) + Send + 'static,
    {
        Self::new(inner).on_reset(on_reset).on_release(on_release)
    }

    /// Set the hook run on every return to the pool.
    pub fn on_reset<R>(mut self, hook: R) -> Self
    where
        R: FnMut(&mut T) -> bool + Send + 'static,
    {
        self.on_reset = Some(Box::new(hook));
        self
    }

    /// Set the hook run once when the value leaves the pool for good.
    pub fn on_release<D>(mut self, hook: D) -> Self
    where
        D: FnOnce(&mut T) + Send + 'static,
    {
        self.on_release = Some(Box::new(hook));
        self
    }

    /// Borrow the wrapped value.
    pub fn get(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the wrapped value.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Unwrap without running the release hook.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Send + 'static> PooledResource for Wrapped<T> {
    fn reset_state(&mut self) -> bool {
        match self.on_reset.as_mut() {
            Some(hook) => hook(&mut self.inner),
            None => true,
        }
    }

    fn release_resources(&mut self) -> Result<(), CleanupError> {
        // FnOnce: a second call finds the hook gone.
        if let Some(hook) = self.on_release.take() {
            hook(&mut self.inner);
        }
        Ok(())
    }
}

impl<T> Deref for Wrapped<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> DerefMut for Wrapped<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T: fmt::Debug> fmt::Debug for Wrapped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapped")
            .field("inner", &self.inner)
            .field("on_reset", &self.on_reset.is_some())
            .field("on_release", &self.on_release.is_some())
            .finish()
    }
}
