//! Core object pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{BoxError, CleanupError, PoolError, PoolResult, panic_message};
use crate::eviction::{EvictionPolicy, Lifetime};
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::reservation::Reservation;
use crate::resource::PooledResource;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

type Factory<T> = Box<dyn Fn() -> Result<T, BoxError> + Send + Sync>;

/// A value owned by the pool together with its bookkeeping
pub(crate) struct Instance<T> {
    pub value: T,
    pub id: usize,
    pub lifetime: Lifetime,
}

/// Everything guarded by the pool lock
pub(crate) struct State<T> {
    pub idle: VecDeque<Instance<T>>,
    pub checked_out: usize,
    /// Slots reserved for factory calls in progress
    pub pending: usize,
    pub closed: bool,
}

impl<T> State<T> {
    fn live(&self) -> usize {
        self.idle.len() + self.checked_out + self.pending
    }
}

enum Step<T> {
    Ready(Instance<T>),
    Create,
    Saturated,
}

pub(crate) struct Shared<T: PooledResource> {
    pub state: Mutex<State<T>>,
    /// Wakes threads blocked in `acquire`
    available: Condvar,
    /// Wakes tasks suspended in `acquire_async`
    notify: Notify,
    factory: Factory<T>,
    config: PoolConfiguration,
    policy: EvictionPolicy,
    metrics: MetricsTracker,
    leases: DashMap<usize, Instant>,
    next_id: AtomicUsize,
}

impl<T: PooledResource> Shared<T> {
    fn has_capacity(&self, state: &State<T>) -> bool {
        self.config.max_size.is_none_or(|max| state.live() < max)
    }

    /// One attempt at taking an instance, under the lock.
    ///
    /// Expired idle entries are moved into `expired` so they can be
    /// released once the lock is dropped.
    fn step(&self, state: &mut State<T>, expired: &mut Vec<Instance<T>>) -> PoolResult<Step<T>> {
        if state.closed {
            return Err(PoolError::Closed);
        }

        while let Some(instance) = state.idle.pop_front() {
            if instance.lifetime.is_expired(&self.policy) {
                expired.push(instance);
                continue;
            }
            state.checked_out += 1;
            return Ok(Step::Ready(instance));
        }

        if self.has_capacity(state) {
            state.pending += 1;
            return Ok(Step::Create);
        }

        Ok(Step::Saturated)
    }

    fn create(&self) -> PoolResult<Instance<T>> {
        match (self.factory)() {
            Ok(value) => {
                MetricsTracker::bump(&self.metrics.total_created);
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(id, "Created pooled resource");
                Ok(Instance {
                    value,
                    id,
                    lifetime: Lifetime::new(),
                })
            }
            Err(err) => {
                MetricsTracker::bump(&self.metrics.creation_failures);
                let err = PoolError::creation(err);
                tracing::warn!(error = %err, "Resource factory failed");
                Err(err)
            }
        }
    }

    /// Create up to `count` idle instances without exceeding `max_size` or `max_idle`.
    fn warmup(&self, count: usize) -> PoolResult<usize> {
        let mut created = 0;
        while created < count {
            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                // In-flight creations count towards the idle cap.
                let idle_full = self
                    .config
                    .max_idle
                    .is_some_and(|cap| state.idle.len() + state.pending >= cap);
                if idle_full || !self.has_capacity(&state) {
                    break;
                }
                state.pending += 1;
            }

            let reservation = Reservation::claimed(self);
            let instance = self.create()?;
            if let Err(instance) = reservation.park(instance) {
                self.destroy(instance);
                return Err(PoolError::Closed);
            }
            created += 1;
        }
        Ok(created)
    }

    /// Take a value back from a handle.
    ///
    /// Never fails: reset and release problems go to `report`.
    fn give_back(&self, instance: Instance<T>) {
        let Instance {
            mut value,
            id,
            mut lifetime,
        } = instance;
        self.leases.remove(&id);

        let reusable = match catch_unwind(AssertUnwindSafe(|| value.reset_state())) {
            Ok(reusable) => reusable,
            Err(payload) => {
                self.report(CleanupError::ResetPanicked(panic_message(payload.as_ref())));
                false
            }
        };

        let mut state = self.state.lock();
        state.checked_out -= 1;
        let retain = reusable
            && !state.closed
            && self.config.max_idle.is_none_or(|cap| state.idle.len() < cap);

        if retain {
            lifetime.touch();
            state.idle.push_back(Instance { value, id, lifetime });
            drop(state);
            MetricsTracker::bump(&self.metrics.total_returned);
            self.wake_one();
            return;
        }

        drop(state);
        self.wake_one();
        if !reusable {
            MetricsTracker::bump(&self.metrics.reset_failures);
            tracing::debug!(id, "Discarding resource that failed to reset");
        }
        self.destroy(Instance { value, id, lifetime });
    }

    fn forget(&self, id: usize) {
        self.leases.remove(&id);
        self.state.lock().checked_out -= 1;
        self.wake_one();
    }

    /// Run `release_resources` and drop the value.
    fn destroy(&self, instance: Instance<T>) {
        let Instance { mut value, id, .. } = instance;
        match catch_unwind(AssertUnwindSafe(|| value.release_resources())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => self.report(err),
            Err(payload) => self.report(CleanupError::ReleasePanicked(panic_message(payload.as_ref()))),
        }
        MetricsTracker::bump(&self.metrics.total_destroyed);
        tracing::debug!(id, "Released pooled resource");
    }

    fn destroy_all(&self, instances: Vec<Instance<T>>) {
        for instance in instances {
            self.destroy(instance);
        }
    }

    fn report(&self, err: CleanupError) {
        MetricsTracker::bump(&self.metrics.cleanup_errors);
        tracing::warn!(error = %err, "Pool cleanup failed");
        if let Some(hook) = &self.config.on_cleanup_error
            && catch_unwind(AssertUnwindSafe(|| hook(&err))).is_err()
        {
            tracing::warn!("Cleanup hook panicked");
        }
    }

    pub(crate) fn wake_one(&self) {
        self.available.notify_one();
        self.notify.notify_one();
    }

    fn wake_all(&self) {
        self.available.notify_all();
        self.notify.notify_waiters();
    }

    fn trim_idle(&self) -> usize {
        if self.policy.is_none() {
            return 0;
        }

        let now = Instant::now();
        let evicted = {
            let mut state = self.state.lock();
            let mut removable = state.live().saturating_sub(self.config.min_size);
            let mut kept = VecDeque::with_capacity(state.idle.len());
            let mut evicted = Vec::new();
            for instance in state.idle.drain(..) {
                if removable > 0 && instance.lifetime.is_expired_at(&self.policy, now) {
                    removable -= 1;
                    evicted.push(instance);
                } else {
                    kept.push_back(instance);
                }
            }
            state.idle = kept;
            evicted
        };

        let trimmed = evicted.len();
        if trimmed > 0 {
            tracing::debug!(trimmed, "Trimmed idle resources");
            self.wake_all();
            self.destroy_all(evicted);
        }
        trimmed
    }

    fn dispose(&self) {
        let drained: Vec<_> = {
            let mut state = self.state.lock();
            state.closed = true;
            state.idle.drain(..).collect()
        };
        self.wake_all();
        tracing::debug!(released = drained.len(), "Disposing pool");
        self.destroy_all(drained);
    }
}

impl<T: PooledResource> Drop for Shared<T> {
    fn drop(&mut self) {
        let idle = std::mem::take(&mut self.state.get_mut().idle);
        for instance in idle {
            self.destroy(instance);
        }
    }
}

/// A pooled object that automatically returns to the pool when dropped
///
/// Returning runs [`PooledResource::reset_state`]; the value is kept for
/// reuse or released depending on the outcome and the pool's settings.
pub struct PooledObject<T: PooledResource> {
    instance: Option<Instance<T>>,
    shared: Arc<Shared<T>>,
}

impl<T: PooledResource> PooledObject<T> {
    fn new(instance: Instance<T>, shared: Arc<Shared<T>>) -> Self {
        Self {
            instance: Some(instance),
            shared,
        }
    }

    /// Pool-assigned identifier of the underlying instance
    pub fn id(&self) -> usize {
        self.instance.as_ref().map_or(usize::MAX, |i| i.id)
    }

    /// Return the object to the pool now instead of at end of scope
    pub fn release(self) {
        drop(self);
    }

    /// Take the value out of the pool for good
    ///
    /// The slot is freed and neither reset nor release hooks run.
    pub fn detach(mut self) -> T {
        let instance = self.instance.take().expect("Value already taken");
        self.shared.forget(instance.id);
        instance.value
    }
}

impl<T: PooledResource> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.instance.as_ref().expect("Value already taken").value
    }
}

impl<T: PooledResource> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.instance.as_mut().expect("Value already taken").value
    }
}

impl<T: PooledResource> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            self.shared.give_back(instance);
        }
    }
}

impl<T: PooledResource + fmt::Debug> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("id", &self.id())
            .field("value", &self.instance.as_ref().map(|i| &i.value))
            .finish()
    }
}

/// Bounded, thread-safe pool of self-resetting objects
///
/// Cloning is cheap and yields another handle to the same pool.
///
/// # Examples
///
/// ```
/// use recycle_pool::{ObjectPool, PoolConfiguration};
///
/// let pool = ObjectPool::new(
///     || Ok::<_, std::io::Error>(Vec::<u8>::with_capacity(1024)),
///     PoolConfiguration::new().with_min_size(2).with_max_size(8),
/// )
/// .unwrap();
///
/// assert_eq!(pool.idle_count(), 2);
/// {
///     let mut buf = pool.acquire().unwrap();
///     buf.extend_from_slice(b"payload");
///     assert_eq!(pool.checked_out_count(), 1);
/// }
/// assert_eq!(pool.idle_count(), 2);
/// ```
pub struct ObjectPool<T: PooledResource> {
    shared: Arc<Shared<T>>,
}

impl<T: PooledResource> Clone for ObjectPool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: PooledResource> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("config", &self.shared.config)
            .field("metrics", &self.metrics())
            .finish()
    }
}

impl<T: PooledResource> ObjectPool<T> {
    /// Create a pool and pre-warm `min_size` instances
    ///
    /// Fails if the configuration is invalid or the factory fails while
    /// pre-warming; instances created before the failure are released.
    pub fn new<F, E>(factory: F, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        config.validate()?;
        let policy = config.eviction_policy();
        let min_size = config.min_size;

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                idle: VecDeque::with_capacity(min_size),
                checked_out: 0,
                pending: 0,
                closed: false,
            }),
            available: Condvar::new(),
            notify: Notify::new(),
            factory: Box::new(move || factory().map_err(Into::into)),
            config,
            policy,
            metrics: MetricsTracker::new(),
            leases: DashMap::new(),
            next_id: AtomicUsize::new(0),
        });

        shared.warmup(min_size)?;
        Ok(Self { shared })
    }

    /// Create a pool from a factory that cannot fail
    pub fn from_fn<F>(factory: F, config: PoolConfiguration) -> PoolResult<Self>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(move || Ok::<_, std::convert::Infallible>(factory()), config)
    }

    /// Create a pool holding between `min_size` and `max_size` instances
    pub fn bounded<F, E>(min_size: usize, max_size: usize, factory: F) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let config = PoolConfiguration::new()
            .with_min_size(min_size)
            .with_max_size(max_size);
        Self::new(factory, config)
    }

    /// Get an object, waiting up to the configured acquire timeout
    pub fn acquire(&self) -> PoolResult<PooledObject<T>> {
        self.acquire_timeout(self.shared.config.acquire_timeout)
    }

    /// Get an object only if one is available or can be created right away
    pub fn try_acquire(&self) -> PoolResult<PooledObject<T>> {
        self.acquire_timeout(Some(Duration::ZERO))
    }

    /// Get an object, blocking the thread while the pool is saturated
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` never blocks.
    pub fn acquire_timeout(&self, timeout: Option<Duration>) -> PoolResult<PooledObject<T>> {
        let deadline =
            timeout.and_then(|limit| Instant::now().checked_add(limit).map(|at| (limit, at)));
        let mut waited = false;
        let mut state = self.shared.state.lock();

        loop {
            let mut expired = Vec::new();
            match self.shared.step(&mut state, &mut expired)? {
                Step::Ready(instance) => {
                    drop(state);
                    self.shared.destroy_all(expired);
                    return Ok(self.lease(instance));
                }
                Step::Create => {
                    drop(state);
                    self.shared.destroy_all(expired);
                    return self.create_leased();
                }
                Step::Saturated => {}
            }

            if !waited {
                waited = true;
                MetricsTracker::bump(&self.shared.metrics.saturation_waits);
            }

            match deadline {
                None => self.shared.available.wait(&mut state),
                Some((limit, at)) => {
                    if Instant::now() >= at {
                        MetricsTracker::bump(&self.shared.metrics.timeouts);
                        return Err(PoolError::Timeout(limit));
                    }
                    let _ = self.shared.available.wait_until(&mut state, at);
                }
            }
        }
    }

    /// Get an object asynchronously, waiting up to the configured acquire timeout
    ///
    /// # Notes
    ///
    /// When no idle instance is available the factory runs on the calling
    /// task. Pools with a slow factory should be filled ahead of time with
    /// [`warmup_async`](Self::warmup_async).
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<T>> {
        self.acquire_async_timeout(self.shared.config.acquire_timeout).await
    }

    /// Get an object asynchronously, suspending the task while the pool is saturated
    ///
    /// Dropping the future abandons the wait without affecting the pool.
    /// Like [`acquire_async`](Self::acquire_async), creation runs the
    /// factory on the calling task.
    pub async fn acquire_async_timeout(&self, timeout: Option<Duration>) -> PoolResult<PooledObject<T>> {
        let deadline = timeout.and_then(|limit| {
            tokio::time::Instant::now()
                .checked_add(limit)
                .map(|at| (limit, at))
        });
        let mut waited = false;

        loop {
            // Register before looking at the state so a return in between
            // is not missed.
            let notified = self.shared.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(object) = self.try_checkout()? {
                return Ok(object);
            }

            if !waited {
                waited = true;
                MetricsTracker::bump(&self.shared.metrics.saturation_waits);
            }

            match deadline {
                None => notified.await,
                Some((limit, at)) => {
                    if tokio::time::timeout_at(at, notified).await.is_err() {
                        MetricsTracker::bump(&self.shared.metrics.timeouts);
                        return Err(PoolError::Timeout(limit));
                    }
                }
            }
        }
    }

    /// Get an object asynchronously unless `cancel` completes first
    ///
    /// # Examples
    ///
    /// ```
    /// use recycle_pool::{ObjectPool, PoolError};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let pool = ObjectPool::bounded(0, 1, || Ok::<_, std::io::Error>(String::new())).unwrap();
    /// let _held = pool.acquire().unwrap();
    ///
    /// let (cancel, cancelled) = tokio::sync::oneshot::channel::<()>();
    /// drop(cancel);
    /// let result = pool.acquire_async_until(cancelled).await;
    /// assert!(matches!(result, Err(PoolError::Cancelled)));
    /// # }
    /// ```
    pub async fn acquire_async_until<C>(&self, cancel: C) -> PoolResult<PooledObject<T>>
    where
        C: Future,
    {
        tokio::select! {
            result = self.acquire_async() => result,
            _ = cancel => Err(PoolError::Cancelled),
        }
    }

    /// Release every idle instance and refuse further acquisitions
    ///
    /// Objects still checked out are released when they come back.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    /// Pre-create up to `count` idle instances, bounded by `max_size` and `max_idle`
    ///
    /// Returns how many were created.
    pub fn warmup(&self, count: usize) -> PoolResult<usize> {
        self.shared.warmup(count)
    }

    /// Pre-create idle instances on the blocking thread pool
    pub async fn warmup_async(&self, count: usize) -> PoolResult<usize> {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || shared.warmup(count))
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Release idle instances the eviction policy considers expired
    ///
    /// Never shrinks the pool below `min_size`. Returns how many were released.
    pub fn trim_idle(&self) -> usize {
        self.shared.trim_idle()
    }

    /// Run [`trim_idle`](Self::trim_idle) every `period` on the tokio runtime
    ///
    /// The task stops once the pool is disposed or dropped. Must be called
    /// from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::InvalidConfiguration`] when `period` is zero.
    pub fn spawn_idle_trimmer(&self, period: Duration) -> PoolResult<JoinHandle<()>> {
        if period.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "trim period must be greater than zero".to_string(),
            ));
        }
        let weak: Weak<Shared<T>> = Arc::downgrade(&self.shared);
        Ok(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(shared) = weak.upgrade() else {
                    break;
                };
                if shared.state.lock().closed {
                    break;
                }
                shared.trim_idle();
            }
        }))
    }

    /// Get idle count
    pub fn idle_count(&self) -> usize {
        self.shared.state.lock().idle.len()
    }

    /// Get checked-out count
    pub fn checked_out_count(&self) -> usize {
        self.shared.state.lock().checked_out
    }

    /// Idle, checked-out and in-creation instances
    pub fn size(&self) -> usize {
        self.shared.state.lock().live()
    }

    pub fn config(&self) -> &PoolConfiguration {
        &self.shared.config
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        let (checked_out, idle) = {
            let state = self.shared.state.lock();
            (state.checked_out, state.idle.len())
        };
        self.shared
            .metrics
            .get_metrics(checked_out, idle, self.shared.config.max_size)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }

    /// Get health status
    pub fn health_status(&self) -> HealthStatus {
        let (idle, checked_out, closed) = {
            let state = self.shared.state.lock();
            (state.idle.len(), state.checked_out, state.closed)
        };
        let lease_warning = self.shared.config.lease_warning;
        let long_held = lease_warning.map_or(0, |threshold| {
            self.shared
                .leases
                .iter()
                .filter(|lease| lease.value().elapsed() > threshold)
                .count()
        });
        HealthStatus::new(
            idle,
            checked_out,
            self.shared.config.max_size,
            long_held,
            lease_warning,
            closed,
        )
    }

    fn try_checkout(&self) -> PoolResult<Option<PooledObject<T>>> {
        let mut expired = Vec::new();
        let step = {
            let mut state = self.shared.state.lock();
            self.shared.step(&mut state, &mut expired)?
        };
        self.shared.destroy_all(expired);
        match step {
            Step::Ready(instance) => Ok(Some(self.lease(instance))),
            Step::Create => self.create_leased().map(Some),
            Step::Saturated => Ok(None),
        }
    }

    fn create_leased(&self) -> PoolResult<PooledObject<T>> {
        let reservation = Reservation::claimed(&self.shared);
        let instance = self.shared.create()?;
        match reservation.check_out(instance) {
            Ok(instance) => Ok(self.lease(instance)),
            Err(instance) => {
                self.shared.destroy(instance);
                Err(PoolError::Closed)
            }
        }
    }

    fn lease(&self, instance: Instance<T>) -> PooledObject<T> {
        MetricsTracker::bump(&self.shared.metrics.total_acquired);
        self.shared.leases.insert(instance.id, Instant::now());
        PooledObject::new(instance, Arc::clone(&self.shared))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    #[derive(Debug, Default)]
    struct Counted {
        dirty: bool,
        poisoned: bool,
        resets: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    impl PooledResource for Counted {
        fn reset_state(&mut self) -> bool {
            self.resets.fetch_add(1, Ordering::SeqCst);
            self.dirty = false;
            !self.poisoned
        }

        fn release_resources(&mut self) -> Result<(), CleanupError> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counted_pool(min: usize, max: usize) -> (ObjectPool<Counted>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let resets = Arc::new(AtomicUsize::new(0));
        let releases = Arc::new(AtomicUsize::new(0));
        let (r, d) = (resets.clone(), releases.clone());
        let pool = ObjectPool::from_fn(
            move || Counted {
                resets: r.clone(),
                releases: d.clone(),
                ..Counted::default()
            },
            PoolConfiguration::new().with_min_size(min).with_max_size(max),
        )
        .unwrap();
        (pool, resets, releases)
    }

    #[test]
    fn prewarms_min_size() {
        let (pool, _, _) = counted_pool(5, 10);
        assert_eq!(pool.idle_count(), 5);
        assert_eq!(pool.checked_out_count(), 0);
        assert_eq!(pool.metrics().total_created, 5);
    }

    #[test]
    fn reuses_returned_object() {
        let (pool, resets, _) = counted_pool(0, 2);
        let first_id = {
            let mut obj = pool.acquire().unwrap();
            obj.dirty = true;
            obj.id()
        };
        assert_eq!(resets.load(Ordering::SeqCst), 1);

        let obj = pool.acquire().unwrap();
        assert_eq!(obj.id(), first_id);
        assert!(!obj.dirty);
        assert_eq!(pool.metrics().total_created, 1);
    }

    #[test]
    fn zero_timeout_fails_when_saturated() {
        let (pool, _, _) = counted_pool(0, 1);
        let _held = pool.acquire().unwrap();
        let err = pool.try_acquire().unwrap_err();
        assert!(matches!(err, PoolError::Timeout(d) if d.is_zero()));
        assert_eq!(pool.metrics().timeouts, 1);
    }

    #[test]
    fn poisoned_object_is_released_not_reused() {
        let (pool, _, releases) = counted_pool(0, 2);
        let id = {
            let mut obj = pool.acquire().unwrap();
            obj.poisoned = true;
            obj.id()
        };
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count(), 0);
        assert_eq!(pool.size(), 0);

        let obj = pool.acquire().unwrap();
        assert_ne!(obj.id(), id);
        assert_eq!(pool.metrics().reset_failures, 1);
    }

    #[test]
    fn max_idle_discards_surplus() {
        let pool = ObjectPool::from_fn(
            Counted::default,
            PoolConfiguration::new().with_max_size(4).with_max_idle(1),
        )
        .unwrap();
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        drop(a);
        drop(b);
        assert_eq!(pool.idle_count(), 1);
        assert_eq!(pool.metrics().total_destroyed, 1);
    }

    #[test]
    fn failing_factory_leaves_counts_unchanged() {
        let fail = Arc::new(AtomicBool::new(false));
        let fail_c = fail.clone();
        let pool = ObjectPool::new(
            move || {
                if fail_c.load(Ordering::SeqCst) {
                    Err("factory down")
                } else {
                    Ok(Counted::default())
                }
            },
            PoolConfiguration::new().with_max_size(2),
        )
        .unwrap();

        fail.store(true, Ordering::SeqCst);
        let err = pool.acquire().unwrap_err();
        assert!(err.is_creation());
        assert_eq!(pool.size(), 0);

        fail.store(false, Ordering::SeqCst);
        let _a = pool.acquire().unwrap();
        let _b = pool.acquire().unwrap();
        assert_eq!(pool.checked_out_count(), 2);
    }

    #[test]
    fn prewarm_failure_releases_partial_instances() {
        let releases = Arc::new(AtomicUsize::new(0));
        let made = Arc::new(AtomicUsize::new(0));
        let (d, m) = (releases.clone(), made.clone());
        let result = ObjectPool::new(
            move || {
                if m.fetch_add(1, Ordering::SeqCst) == 2 {
                    return Err("third one fails");
                }
                Ok(Counted {
                    releases: d.clone(),
                    ..Counted::default()
                })
            },
            PoolConfiguration::new().with_min_size(4).with_max_size(4),
        );
        assert!(matches!(result, Err(PoolError::Creation(_))));
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn factory_panic_rolls_back_reservation() {
        let pool = ObjectPool::from_fn(
            || -> Counted { panic!("boom") },
            PoolConfiguration::new().with_max_size(1),
        )
        .unwrap();
        let pool_c = pool.clone();
        let outcome = std::thread::spawn(move || pool_c.acquire().map(|_| ())).join();
        assert!(outcome.is_err());
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn dispose_releases_idle_and_closes() {
        let (pool, _, releases) = counted_pool(3, 5);
        let held = pool.acquire().unwrap();
        pool.dispose();
        assert_eq!(releases.load(Ordering::SeqCst), 2);
        assert!(matches!(pool.acquire(), Err(PoolError::Closed)));
        assert!(matches!(pool.warmup(1), Err(PoolError::Closed)));

        drop(held);
        assert_eq!(releases.load(Ordering::SeqCst), 3);
        assert_eq!(pool.idle_count(), 0);
        assert!(!pool.health_status().is_healthy());
    }

    #[test]
    fn idle_released_when_last_reference_drops() {
        let (pool, _, releases) = counted_pool(2, 2);
        let held = pool.acquire().unwrap();
        drop(pool);
        // The handle keeps the shared state alive.
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        drop(held);
        assert_eq!(releases.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn detach_frees_the_slot() {
        let (pool, resets, releases) = counted_pool(0, 1);
        let obj = pool.acquire().unwrap();
        let counted = obj.detach();
        assert!(!counted.poisoned);
        assert_eq!(pool.size(), 0);
        assert_eq!(resets.load(Ordering::SeqCst), 0);
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        assert!(pool.try_acquire().is_ok());
    }

    #[test]
    fn warmup_stops_at_max() {
        let (pool, _, _) = counted_pool(1, 3);
        assert_eq!(pool.warmup(10).unwrap(), 2);
        assert_eq!(pool.idle_count(), 3);
    }

    #[test]
    fn warmup_respects_idle_cap() {
        let pool = ObjectPool::from_fn(
            Counted::default,
            PoolConfiguration::new().with_max_size(10).with_max_idle(2),
        )
        .unwrap();
        assert_eq!(pool.warmup(10).unwrap(), 2);
        assert_eq!(pool.idle_count(), 2);
        assert_eq!(pool.metrics().total_created, 2);

        // Checked-out instances do not count towards the idle cap.
        let held = pool.acquire().unwrap();
        assert_eq!(pool.warmup(10).unwrap(), 1);
        assert_eq!(pool.idle_count(), 2);
        drop(held);
    }

    #[test]
    fn cleanup_panics_reach_the_hook() {
        struct Fragile;

        impl PooledResource for Fragile {
            fn reset_state(&mut self) -> bool {
                panic!("reset exploded");
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = seen.clone();
        let pool = ObjectPool::from_fn(
            || Fragile,
            PoolConfiguration::new()
                .with_max_size(1)
                .with_cleanup_hook(move |err| seen_c.lock().push(err.clone())),
        )
        .unwrap();

        pool.acquire().unwrap().release();
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert!(matches!(&seen[0], CleanupError::ResetPanicked(msg) if msg == "reset exploded"));
        assert_eq!(pool.metrics().cleanup_errors, 1);
        assert_eq!(pool.size(), 0);
    }

    #[test]
    fn release_errors_are_swallowed() {
        struct Leaky;

        impl PooledResource for Leaky {
            fn release_resources(&mut self) -> Result<(), CleanupError> {
                Err(CleanupError::ReleaseFailed("handle already closed".to_string()))
            }
        }

        let pool = ObjectPool::from_fn(
            || Leaky,
            PoolConfiguration::new().with_max_size(2).with_max_idle(0),
        )
        .unwrap();
        pool.acquire().unwrap().release();
        assert_eq!(pool.metrics().cleanup_errors, 1);
        assert_eq!(pool.metrics().total_destroyed, 1);
    }

    #[test]
    fn trim_respects_min_size() {
        let pool = ObjectPool::from_fn(
            Counted::default,
            PoolConfiguration::new()
                .with_min_size(1)
                .with_max_size(4)
                .with_idle_timeout(Duration::from_millis(1)),
        )
        .unwrap();
        pool.warmup(3).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert_eq!(pool.trim_idle(), 3);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn expired_idle_is_replaced_on_acquire() {
        let pool = ObjectPool::from_fn(
            Counted::default,
            PoolConfiguration::new()
                .with_min_size(1)
                .with_max_size(1)
                .with_ttl(Duration::from_millis(1)),
        )
        .unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let obj = pool.acquire().unwrap();
        assert_eq!(obj.id(), 1);
        assert_eq!(pool.metrics().total_destroyed, 1);
    }

    #[test]
    fn health_reports_long_leases() {
        let pool = ObjectPool::from_fn(
            Counted::default,
            PoolConfiguration::new()
                .with_max_size(4)
                .with_lease_warning(Duration::from_millis(1)),
        )
        .unwrap();
        let _held = pool.acquire().unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(pool.health_status().long_held_leases, 1);
    }

    #[tokio::test]
    async fn async_acquire_waits_for_return() {
        let (pool, _, _) = counted_pool(0, 1);
        let held = pool.acquire_async().await.unwrap();

        let pool_c = pool.clone();
        let waiter = tokio::spawn(async move { pool_c.acquire_async().await.map(|obj| obj.id()) });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        let id = held.id();
        drop(held);

        assert_eq!(waiter.await.unwrap().unwrap(), id);
    }

    #[tokio::test]
    async fn async_timeout_expires() {
        let (pool, _, _) = counted_pool(1, 1);
        let _held = pool.acquire_async().await.unwrap();
        let err = pool
            .acquire_async_timeout(Some(Duration::from_millis(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
    }

    #[tokio::test]
    async fn async_waiter_sees_dispose() {
        let (pool, _, _) = counted_pool(0, 1);
        let _held = pool.acquire().unwrap();

        let pool_c = pool.clone();
        let waiter = tokio::spawn(async move { pool_c.acquire_async().await.map(|_| ()) });
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.dispose();

        assert!(matches!(waiter.await.unwrap(), Err(PoolError::Closed)));
    }

    #[tokio::test]
    async fn warmup_async_fills_idle() {
        let (pool, _, _) = counted_pool(0, 3);
        assert_eq!(pool.warmup_async(2).await.unwrap(), 2);
        assert_eq!(pool.idle_count(), 2);
    }

    #[tokio::test]
    async fn trimmer_task_evicts_idle() {
        let pool = ObjectPool::from_fn(
            Counted::default,
            PoolConfiguration::new()
                .with_max_size(2)
                .with_idle_timeout(Duration::from_millis(5)),
        )
        .unwrap();
        pool.warmup(2).unwrap();
        let trimmer = pool.spawn_idle_trimmer(Duration::from_millis(20)).unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(pool.idle_count(), 0);

        pool.dispose();
        tokio::time::timeout(Duration::from_secs(1), trimmer)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn trimmer_rejects_zero_period() {
        let (pool, _, _) = counted_pool(0, 2);
        let result = pool.spawn_idle_trimmer(Duration::ZERO);
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
        assert!(!pool.is_closed());
    }
}
