//! Bounded object pool implementation

use crate::cleanup::Cleanup;
use crate::config::PoolConfiguration;
use crate::errors::{BoxError, PoolError, PoolResult};
use crate::metrics::{Gauges, MetricsExporter, MetricsTracker, PoolMetrics};
use crate::shrink::ShrinkWorker;

use crossbeam::queue::SegQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError, watch};

type Factory<T> = dyn Fn() -> Result<T, BoxError> + Send + Sync;

/// An object checked out of a [`BoundedPool`]
///
/// Dropping the guard returns the object to the pool and then releases the
/// admission permit it holds.
pub struct PooledObject<T: Send + 'static> {
    value: Option<T>,
    permit: Option<OwnedSemaphorePermit>,
    pool: Arc<PoolInner<T>>,
}

impl<T: Send + 'static> PooledObject<T> {
    fn new(value: T, permit: OwnedSemaphorePermit, pool: Arc<PoolInner<T>>) -> Self {
        Self {
            value: Some(value),
            permit: Some(permit),
            pool,
        }
    }

    /// Take the object out of the pool for good.
    ///
    /// The pool forgets the object, so its size drops by one and the permit is
    /// released. No cleanup runs; the caller now owns the object outright.
    pub fn detach(mut self) -> T {
        let value = self.value.take().expect("Value already taken");
        self.pool.forget_one();
        tracing::debug!(pool = %self.pool.name, "object detached from pool");
        value
    }
}

impl<T: Send + 'static> Deref for PooledObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T: Send + 'static> DerefMut for PooledObject<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T: Send + 'static> Drop for PooledObject<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.give_back(value);
        }
        // The object must be visible before a waiter can be admitted.
        drop(self.permit.take());
    }
}

impl<T: Send + fmt::Debug + 'static> fmt::Debug for PooledObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledObject")
            .field("value", &self.value)
            .field("pool", &self.pool.name)
            .finish()
    }
}

/// Rolls a `current_size` reservation back unless it is committed.
struct SizeReservation<'a> {
    size: &'a AtomicUsize,
    committed: bool,
}

impl SizeReservation<'_> {
    fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for SizeReservation<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.size.fetch_sub(1, Ordering::AcqRel);
        }
    }
}

/// Clears the shrink-in-progress flag even if a cleanup function panics.
struct ShrinkingFlag<'a>(&'a watch::Sender<bool>);

impl<'a> ShrinkingFlag<'a> {
    fn raise(sender: &'a watch::Sender<bool>) -> Self {
        sender.send_replace(true);
        Self(sender)
    }
}

impl Drop for ShrinkingFlag<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// State shared between the pool handle, its guards and the shrink worker
struct PoolInner<T: Send + 'static> {
    name: String,
    available: SegQueue<T>,
    gate: Arc<Semaphore>,
    factory: Box<Factory<T>>,
    cleanup: Cleanup<T>,
    current_size: AtomicUsize,
    baseline_size: usize,
    max_size: usize,
    growth_increment: usize,
    /// Serializes growth with shrink cycles and disposal
    resize_lock: Mutex<()>,
    shrinking: watch::Sender<bool>,
    disposed: AtomicBool,
    metrics: MetricsTracker,
}

impl<T: Send + 'static> PoolInner<T> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn wait_for_shrink(&self) {
        let mut shrinking = self.shrinking.subscribe();
        // The sender lives as long as `self`, so this only returns once clear.
        let _ = shrinking.wait_for(|in_progress| !*in_progress).await;
    }

    fn take_or_grow(&self) -> PoolResult<T> {
        if let Some(item) = self.available.pop() {
            return Ok(item);
        }

        let _resize = self.resize_lock.lock();
        if self.is_disposed() {
            return Err(PoolError::Disposed);
        }
        if let Some(item) = self.available.pop() {
            return Ok(item);
        }

        let mut claimed = None;
        let mut failure = None;
        for _ in 0..self.growth_increment {
            match self.grow_one() {
                Ok(item) if claimed.is_none() => claimed = Some(item),
                Ok(item) => self.available.push(item),
                Err(err) => {
                    let exhausted = matches!(err, PoolError::Exhausted { .. });
                    failure.get_or_insert(err);
                    if exhausted {
                        break;
                    }
                }
            }
        }

        if let Some(item) = claimed.or_else(|| self.available.pop()) {
            return Ok(item);
        }

        let err = failure.unwrap_or(PoolError::Exhausted {
            max_size: self.max_size,
        });
        if matches!(err, PoolError::Exhausted { .. }) {
            MetricsTracker::increment(&self.metrics.exhausted_events);
        }
        Err(err)
    }

    /// Reserve one unit of `current_size` and run the factory for it.
    fn grow_one(&self) -> PoolResult<T> {
        let size = self.current_size.fetch_add(1, Ordering::AcqRel) + 1;
        let reservation = SizeReservation {
            size: &self.current_size,
            committed: false,
        };
        if size > self.max_size {
            return Err(PoolError::Exhausted {
                max_size: self.max_size,
            });
        }

        match (self.factory)() {
            Ok(item) => {
                reservation.commit();
                MetricsTracker::increment(&self.metrics.total_created);
                tracing::debug!(pool = %self.name, current_size = size, "created pooled object");
                Ok(item)
            }
            Err(error) => {
                MetricsTracker::increment(&self.metrics.creation_failures);
                tracing::warn!(pool = %self.name, %error, "object creation failed");
                Err(PoolError::creation(error))
            }
        }
    }

    fn give_back(&self, item: T) {
        if self.is_disposed() {
            self.evict(item);
            return;
        }

        self.available.push(item);
        MetricsTracker::increment(&self.metrics.total_released);
        tracing::trace!(pool = %self.name, "object released");

        // Lost a race with dispose, which has already drained the queue.
        if self.is_disposed() {
            self.drain();
        }
    }

    fn forget_one(&self) {
        self.current_size.fetch_sub(1, Ordering::AcqRel);
        MetricsTracker::increment(&self.metrics.total_evicted);
    }

    fn evict(&self, item: T) {
        self.forget_one();
        if let Err(error) = self.cleanup.run(item) {
            tracing::warn!(pool = %self.name, %error, "cleanup failed, object discarded");
        }
    }

    fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(item) = self.available.pop() {
            self.evict(item);
            drained += 1;
        }
        drained
    }

    fn shrink(&self) -> usize {
        let _resize = self.resize_lock.lock();
        if self.is_disposed() {
            return 0;
        }

        let flag = ShrinkingFlag::raise(&self.shrinking);
        let excess = self
            .current_size
            .load(Ordering::Acquire)
            .saturating_sub(self.baseline_size);

        let mut evicted = 0;
        while evicted < excess {
            let Some(item) = self.available.pop() else {
                break;
            };
            self.evict(item);
            evicted += 1;
        }
        MetricsTracker::increment(&self.metrics.shrink_cycles);
        drop(flag);

        tracing::debug!(
            pool = %self.name,
            evicted,
            current_size = self.current_size.load(Ordering::Acquire),
            "shrink cycle finished"
        );
        evicted
    }
}

/// Bounded, thread-safe object pool
///
/// At most `max_pool_size` objects exist at once. `baseline_size` objects are
/// created up front, more are created on demand, and the optional shrink cycle
/// trims idle objects back to the baseline.
///
/// # Examples
///
/// ```
/// use esox_boundedpool::{BoundedPool, PoolConfiguration};
///
/// let pool = BoundedPool::new(
///     || Ok::<_, std::io::Error>(String::with_capacity(1024)),
///     PoolConfiguration::new().with_baseline_size(2).with_max_pool_size(4),
/// )
/// .unwrap();
///
/// {
///     let mut buf = pool.acquire().unwrap();
///     buf.push_str("hello");
/// }
///
/// assert_eq!(pool.current_size(), 2);
/// assert_eq!(pool.current_available_permits(), 4);
/// ```
pub struct BoundedPool<T: Send + 'static> {
    inner: Arc<PoolInner<T>>,
    shrinker: Option<ShrinkWorker>,
}

impl<T: Send + 'static> BoundedPool<T> {
    /// Create a pool and eagerly fill it to the baseline size.
    ///
    /// Fails with [`PoolError::Configuration`] on invalid settings and with
    /// [`PoolError::Creation`] if the factory fails while filling the pool.
    pub fn new<F, E>(factory: F, config: PoolConfiguration<T>) -> PoolResult<Self>
    where
        F: Fn() -> Result<T, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        config.validate()?;

        let (shrinking, _) = watch::channel(false);
        let inner = Arc::new(PoolInner {
            name: config.name,
            available: SegQueue::new(),
            gate: Arc::new(Semaphore::new(config.max_pool_size)),
            factory: Box::new(move || factory().map_err(Into::into)),
            cleanup: config.cleanup,
            current_size: AtomicUsize::new(0),
            baseline_size: config.baseline_size,
            max_size: config.max_pool_size,
            growth_increment: config.growth_increment,
            resize_lock: Mutex::new(()),
            shrinking,
            disposed: AtomicBool::new(false),
            metrics: MetricsTracker::new(),
        });

        let shrinker = match config.shrink_interval {
            Some(interval) => {
                let weak = Arc::downgrade(&inner);
                Some(ShrinkWorker::start(interval, move || {
                    weak.upgrade().map(|inner| inner.shrink())
                })?)
            }
            None => None,
        };

        for _ in 0..inner.baseline_size {
            match inner.grow_one() {
                Ok(item) => inner.available.push(item),
                Err(err) => {
                    inner.disposed.store(true, Ordering::Release);
                    inner.drain();
                    return Err(err);
                }
            }
        }

        tracing::debug!(
            pool = %inner.name,
            baseline_size = inner.baseline_size,
            max_size = inner.max_size,
            "pool created"
        );

        Ok(Self { inner, shrinker })
    }

    /// Get an object, blocking the current thread until a permit is free.
    ///
    /// Do not call this from inside an async task; use
    /// [`acquire_async`](Self::acquire_async) there.
    pub fn acquire(&self) -> PoolResult<PooledObject<T>> {
        futures::executor::block_on(self.acquire_async())
    }

    /// Get an object without waiting for a permit
    pub fn try_acquire(&self) -> PoolResult<PooledObject<T>> {
        self.ensure_live()?;
        let permit = match Arc::clone(&self.inner.gate).try_acquire_owned() {
            Ok(permit) => permit,
            Err(TryAcquireError::Closed) => return Err(PoolError::Disposed),
            Err(TryAcquireError::NoPermits) => {
                MetricsTracker::increment(&self.inner.metrics.exhausted_events);
                return Err(PoolError::Exhausted {
                    max_size: self.inner.max_size,
                });
            }
        };
        futures::executor::block_on(self.checkout(permit))
    }

    /// Get an object asynchronously.
    ///
    /// Dropping the returned future while it waits for a permit consumes no
    /// permit.
    pub async fn acquire_async(&self) -> PoolResult<PooledObject<T>> {
        self.ensure_live()?;
        let permit = Arc::clone(&self.inner.gate)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Disposed)?;
        self.checkout(permit).await
    }

    /// Get an object asynchronously, giving up after `timeout`
    pub async fn acquire_timeout(&self, timeout: Duration) -> PoolResult<PooledObject<T>> {
        tokio::time::timeout(timeout, self.acquire_async())
            .await
            .map_err(|_| PoolError::Timeout(timeout))?
    }

    async fn checkout(&self, permit: OwnedSemaphorePermit) -> PoolResult<PooledObject<T>> {
        let inner = &self.inner;
        inner.wait_for_shrink().await;
        self.ensure_live()?;

        // On error the permit drops here and returns to the gate.
        let item = inner.take_or_grow()?;
        MetricsTracker::increment(&inner.metrics.total_acquired);
        tracing::trace!(pool = %inner.name, "object acquired");
        Ok(PooledObject::new(item, permit, Arc::clone(inner)))
    }

    /// Return an object to the pool explicitly.
    ///
    /// Dropping the [`PooledObject`] does the same; this variant reports
    /// objects from another pool and releases after disposal.
    pub fn release(&self, object: PooledObject<T>) -> PoolResult<()> {
        if !Arc::ptr_eq(&object.pool, &self.inner) {
            return Err(PoolError::InvalidArgument(
                "object was not acquired from this pool",
            ));
        }
        let disposed = self.inner.is_disposed();
        drop(object);
        if disposed {
            return Err(PoolError::Disposed);
        }
        Ok(())
    }

    /// Run one shrink cycle now, returning the number of evicted objects.
    ///
    /// Only idle objects are evicted and the pool never drops below its
    /// baseline size.
    pub fn shrink(&self) -> usize {
        self.inner.shrink()
    }

    /// Tear the pool down, cleaning up every idle object.
    ///
    /// Objects still checked out are cleaned up when they are released.
    /// Calling this more than once has no further effect.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        if let Some(shrinker) = &self.shrinker {
            shrinker.stop();
        }
        self.inner.gate.close();

        let drained = {
            let _resize = self.inner.resize_lock.lock();
            self.inner.drain()
        };
        tracing::debug!(pool = %self.inner.name, drained, "pool disposed");
    }

    /// Whether [`dispose`](Self::dispose) has been called
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn ensure_live(&self) -> PoolResult<()> {
        if self.inner.is_disposed() {
            return Err(PoolError::Disposed);
        }
        Ok(())
    }

    /// Pool name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Free admission permits
    pub fn current_available_permits(&self) -> usize {
        self.inner.gate.available_permits()
    }

    /// Objects currently in existence, checked out or idle
    pub fn current_size(&self) -> usize {
        self.inner.current_size.load(Ordering::Acquire)
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    pub fn baseline_size(&self) -> usize {
        self.inner.baseline_size
    }

    /// How many more objects may still be created
    pub fn available_capacity(&self) -> usize {
        self.max_size().saturating_sub(self.current_size())
    }

    /// Idle objects ready to be handed out
    pub fn available_count(&self) -> usize {
        self.inner.available.len()
    }

    /// Objects currently held by callers
    pub fn checked_out(&self) -> usize {
        self.max_size().saturating_sub(self.current_available_permits())
    }

    /// Get pool metrics
    pub fn metrics(&self) -> PoolMetrics {
        self.inner.metrics.snapshot(Gauges {
            current_size: self.current_size(),
            baseline_size: self.baseline_size(),
            max_size: self.max_size(),
            available_objects: self.available_count(),
            available_permits: self.current_available_permits(),
        })
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.metrics(), pool_name, tags)
    }
}

impl<T: Send + 'static> Drop for BoundedPool<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Send + 'static> fmt::Debug for BoundedPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedPool")
            .field("name", &self.inner.name)
            .field("current_size", &self.current_size())
            .field("max_size", &self.inner.max_size)
            .field("available_permits", &self.current_available_permits())
            .field(
                "shrink_active",
                &self.shrinker.as_ref().is_some_and(|s| !s.is_stopped()),
            )
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_pool(baseline: usize, max: usize) -> BoundedPool<u32> {
        let next = AtomicU32::new(0);
        BoundedPool::new(
            move || Ok::<_, BoxError>(next.fetch_add(1, Ordering::SeqCst)),
            PoolConfiguration::new()
                .with_baseline_size(baseline)
                .with_max_pool_size(max),
        )
        .unwrap()
    }

    #[test]
    fn construction_fills_to_baseline() {
        let pool = counting_pool(3, 6);
        assert_eq!(pool.current_size(), 3);
        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.current_available_permits(), 6);
        assert_eq!(pool.available_capacity(), 3);
    }

    #[test]
    fn acquire_reuses_idle_objects_before_growing() {
        let pool = counting_pool(1, 4);

        let first = *pool.acquire().unwrap();
        let second = *pool.acquire().unwrap();

        assert_eq!(first, second);
        assert_eq!(pool.current_size(), 1);
    }

    #[test]
    fn growth_happens_on_demand() {
        let pool = counting_pool(1, 3);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(*a, *b);
        assert_eq!(pool.current_size(), 2);
        assert_eq!(pool.checked_out(), 2);
        assert_eq!(pool.current_available_permits(), 1);
    }

    #[test]
    fn growth_increment_creates_a_burst() {
        let pool = BoundedPool::new(
            || Ok::<_, BoxError>(0u8),
            PoolConfiguration::new()
                .with_baseline_size(0)
                .with_max_pool_size(6)
                .with_growth_increment(3),
        )
        .unwrap();

        let _obj = pool.acquire().unwrap();
        assert_eq!(pool.current_size(), 3);
        assert_eq!(pool.available_count(), 2);
    }

    #[test]
    fn partial_growth_is_tolerated() {
        let calls = AtomicU32::new(0);
        let pool = BoundedPool::new(
            move || match calls.fetch_add(1, Ordering::SeqCst) {
                1 => Err(BoxError::from("flaky")),
                n => Ok(n),
            },
            PoolConfiguration::new()
                .with_baseline_size(0)
                .with_max_pool_size(5)
                .with_growth_increment(3),
        )
        .unwrap();

        let obj = pool.acquire().unwrap();
        assert_eq!(*obj, 0);
        assert_eq!(pool.current_size(), 2);
        assert_eq!(pool.metrics().creation_failures, 1);
    }

    #[test]
    fn try_acquire_reports_exhaustion_without_waiting() {
        let pool = counting_pool(1, 1);
        let held = pool.try_acquire().unwrap();

        let err = pool.try_acquire().unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { max_size: 1 }));
        assert_eq!(pool.current_available_permits(), 0);

        drop(held);
        assert!(pool.try_acquire().is_ok());
    }

    #[test]
    fn detach_forgets_the_object() {
        let pool = counting_pool(2, 2);
        let obj = pool.acquire().unwrap();

        let value = obj.detach();
        assert_eq!(value, 0);
        assert_eq!(pool.current_size(), 1);
        assert_eq!(pool.current_available_permits(), 2);
        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn release_rejects_foreign_objects() {
        let pool = counting_pool(1, 2);
        let other = counting_pool(1, 2);
        let foreign = other.acquire().unwrap();

        let err = pool.release(foreign).unwrap_err();
        assert!(matches!(err, PoolError::InvalidArgument(_)));
        assert_eq!(pool.current_available_permits(), 2);
        assert_eq!(pool.available_count(), 1);
        assert_eq!(other.current_available_permits(), 2);
    }

    #[test]
    fn shrink_trims_idle_objects_to_baseline() {
        let pool = counting_pool(1, 4);
        let held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        drop(held);
        assert_eq!(pool.current_size(), 4);

        assert_eq!(pool.shrink(), 3);
        assert_eq!(pool.current_size(), 1);
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.shrink(), 0);
    }

    #[test]
    fn shrink_skips_checked_out_objects() {
        let pool = counting_pool(1, 4);
        let mut held: Vec<_> = (0..4).map(|_| pool.acquire().unwrap()).collect();
        held.truncate(3);

        assert_eq!(pool.shrink(), 1);
        assert_eq!(pool.current_size(), 3);
        assert_eq!(pool.checked_out(), 3);
    }

    #[test]
    fn dispose_is_idempotent() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cleaned);
        let pool = BoundedPool::new(
            || Ok::<_, BoxError>(7u8),
            PoolConfiguration::new()
                .with_baseline_size(3)
                .with_max_pool_size(3)
                .with_cleanup(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        pool.dispose();
        pool.dispose();

        assert!(pool.is_disposed());
        assert_eq!(cleaned.load(Ordering::SeqCst), 3);
        assert_eq!(pool.current_size(), 0);
        assert!(matches!(pool.acquire(), Err(PoolError::Disposed)));
        assert!(matches!(pool.try_acquire(), Err(PoolError::Disposed)));
    }

    #[test]
    fn release_after_dispose_cleans_up() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cleaned);
        let pool = BoundedPool::new(
            || Ok::<_, BoxError>(1u8),
            PoolConfiguration::new()
                .with_baseline_size(2)
                .with_max_pool_size(2)
                .with_cleanup(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
        )
        .unwrap();

        let held = pool.acquire().unwrap();
        pool.dispose();
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);

        assert!(matches!(pool.release(held), Err(PoolError::Disposed)));
        assert_eq!(cleaned.load(Ordering::SeqCst), 2);
        assert_eq!(pool.current_size(), 0);
    }

    #[tokio::test]
    async fn test_async_acquire() {
        let pool = counting_pool(2, 4);

        {
            let obj = pool.acquire_async().await.unwrap();
            assert!([0, 1].contains(&*obj));
            assert_eq!(pool.checked_out(), 1);
        }

        assert_eq!(pool.checked_out(), 0);
        assert_eq!(pool.metrics().total_released, 1);
    }

    #[tokio::test]
    async fn acquire_timeout_expires_when_full() {
        let pool = counting_pool(1, 1);
        let _held = pool.acquire_async().await.unwrap();

        let err = pool
            .acquire_timeout(Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
        assert_eq!(pool.current_available_permits(), 0);
    }
}
