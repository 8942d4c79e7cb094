//! Tests for the connection pool.

#[cfg(test)]
mod pool_tests {
    use std::fmt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::Duration;

    use crate::pool::{ConnectionPool, DirectConnector, ManageConnection, PoolConfig, PoolError};

    #[derive(Debug)]
    struct ConnectRefused;

    impl fmt::Display for ConnectRefused {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl std::error::Error for ConnectRefused {}

    /// Counts connections alive right now and the highest count ever seen.
    #[derive(Default)]
    struct Counters {
        next_id: AtomicUsize,
        live: AtomicUsize,
        peak: AtomicUsize,
        opened: AtomicUsize,
    }

    struct FakeConn {
        id: usize,
        broken: Arc<AtomicBool>,
        counters: Arc<Counters>,
    }

    impl Drop for FakeConn {
        fn drop(&mut self) {
            self.counters.live.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default, Clone)]
    struct FakeManager {
        counters: Arc<Counters>,
        refuse: Arc<AtomicBool>,
        /// Flag handed to every new connection; setting it breaks them all.
        broken: Arc<AtomicBool>,
    }

    impl ManageConnection for FakeManager {
        type Connection = FakeConn;
        type Error = ConnectRefused;

        fn connect(&self) -> Result<FakeConn, ConnectRefused> {
            if self.refuse.load(Ordering::SeqCst) {
                return Err(ConnectRefused);
            }
            let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
            self.counters.peak.fetch_max(live, Ordering::SeqCst);
            self.counters.opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakeConn {
                id: self.counters.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                broken: Arc::clone(&self.broken),
                counters: Arc::clone(&self.counters),
            })
        }

        fn has_broken(&self, conn: &mut FakeConn) -> bool {
            conn.broken.load(Ordering::SeqCst)
        }
    }

    fn pool(max_size: usize, acquire_timeout: Option<Duration>) -> (ConnectionPool<FakeManager>, FakeManager) {
        let manager = FakeManager::default();
        let config = PoolConfig {
            min_size: 1,
            max_size,
            acquire_timeout,
        };
        (ConnectionPool::new(manager.clone(), config), manager)
    }

    #[test]
    fn test_lazy_creation() {
        let (pool, manager) = pool(3, None);
        assert_eq!(manager.counters.opened.load(Ordering::SeqCst), 0);

        let conn = pool.acquire().unwrap();
        assert_eq!(conn.id, 1);
        assert_eq!(pool.status().in_use, 1);
        assert_eq!(pool.status().idle, 0);

        pool.release(conn);
        let status = pool.status();
        assert_eq!((status.idle, status.in_use), (1, 0));
    }

    #[test]
    fn test_idle_connection_is_reused() {
        let (pool, manager) = pool(3, None);
        drop(pool.acquire().unwrap());
        let conn = pool.acquire().unwrap();
        assert_eq!(conn.id, 1);
        assert_eq!(manager.counters.opened.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initialize_creates_min_size() {
        let manager = FakeManager::default();
        let config = PoolConfig {
            min_size: 3,
            max_size: 5,
            acquire_timeout: None,
        };
        let pool = ConnectionPool::new(manager.clone(), config);
        pool.initialize().unwrap();

        assert_eq!(pool.status().idle, 3);
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 3);

        // Already at min_size: nothing more is opened.
        pool.initialize().unwrap();
        assert_eq!(manager.counters.opened.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_config_is_clamped() {
        let config = PoolConfig {
            min_size: 9,
            max_size: 0,
            acquire_timeout: None,
        };
        let pool = ConnectionPool::new(FakeManager::default(), config);
        assert_eq!(pool.config().max_size, 1);
        assert_eq!(pool.config().min_size, 1);
    }

    #[test]
    fn test_release_on_saturated_pool_hands_back_connection() {
        let (pool, _) = pool(2, None);
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        pool.release(first);
        let again = pool.acquire().unwrap();
        assert_eq!(again.id, 1);
        assert_eq!(pool.status().in_use, 2);
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let (pool, _) = pool(1, None);
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|conn| conn.id))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        drop(held);
        assert_eq!(waiter.join().unwrap().unwrap(), 1);
    }

    #[test]
    fn test_acquire_timeout() {
        let (pool, _) = pool(1, Some(Duration::from_millis(30)));
        let _held = pool.acquire().unwrap();

        let result = pool.acquire();
        assert!(matches!(result, Err(PoolError::Timeout(d)) if d == Duration::from_millis(30)));
    }

    #[test]
    fn test_connect_failure_frees_the_slot() {
        let (pool, manager) = pool(1, None);
        manager.refuse.store(true, Ordering::SeqCst);
        assert!(matches!(pool.acquire(), Err(PoolError::Connect(ConnectRefused))));
        assert_eq!(pool.status().in_use, 0);

        manager.refuse.store(false, Ordering::SeqCst);
        assert!(pool.acquire().is_ok());
    }

    #[test]
    fn test_marked_broken_connection_is_discarded() {
        let (pool, manager) = pool(2, None);
        let mut conn = pool.acquire().unwrap();
        conn.mark_broken();
        assert!(conn.is_marked_broken());
        drop(conn);

        assert_eq!(pool.status().idle, 0);
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 0);

        let replacement = pool.acquire().unwrap();
        assert_eq!(replacement.id, 2);
    }

    #[test]
    fn test_broken_idle_connection_replaced_on_acquire() {
        let (pool, manager) = pool(2, None);
        drop(pool.acquire().unwrap());
        assert_eq!(pool.status().idle, 1);

        // The backend closed the idle connection behind the pool's back.
        manager.broken.store(true, Ordering::SeqCst);

        let conn = pool.acquire().unwrap();
        assert_eq!(conn.id, 2, "broken idle connection must not be handed out");
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 1);
        assert_eq!(pool.status().in_use, 1);
        assert_eq!(pool.status().idle, 0);
    }

    #[test]
    fn test_close_then_acquire_recreates_pool() {
        let (pool, manager) = pool(2, None);
        drop(pool.acquire().unwrap());
        pool.close();

        let status = pool.status();
        assert!(status.closed);
        assert_eq!(status.idle, 0);
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 0);

        let conn = pool.acquire().unwrap();
        assert_eq!(conn.id, 2);
        assert!(!pool.status().closed);
    }

    #[test]
    fn test_connection_from_closed_pool_not_repooled() {
        let (pool, manager) = pool(2, None);
        let old = pool.acquire().unwrap();
        pool.close();

        let fresh = pool.acquire().unwrap();
        assert_eq!(pool.status().in_use, 2);

        drop(old);
        assert_eq!(pool.status().idle, 0);
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 1);

        drop(fresh);
        assert_eq!(pool.status().idle, 1);
    }

    #[test]
    fn test_never_exceeds_max_size_under_contention() {
        const MAX: usize = 4;
        const WORKERS: usize = 16;
        const ROUNDS: usize = 50;

        let (pool, manager) = pool(MAX, None);
        let start = Arc::new(Barrier::new(WORKERS));

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let pool = pool.clone();
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    for _ in 0..ROUNDS {
                        let conn = pool.acquire().unwrap();
                        let status = pool.status();
                        assert!(status.idle + status.in_use <= MAX);
                        thread::yield_now();
                        pool.release(conn);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(manager.counters.peak.load(Ordering::SeqCst) <= MAX);
        assert!(manager.counters.opened.load(Ordering::SeqCst) <= MAX);
        let status = pool.status();
        assert_eq!(status.in_use, 0);
        assert!(status.idle <= MAX);
    }

    #[test]
    fn test_direct_connector_opens_fresh_connections() {
        let manager = FakeManager::default();
        let direct = DirectConnector::new(manager.clone());

        let first = direct.connect().unwrap();
        let second = direct.connect().unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 2);

        drop(first);
        drop(second);
        assert_eq!(manager.counters.live.load(Ordering::SeqCst), 0);
        assert_eq!(direct.manager().counters.opened.load(Ordering::SeqCst), 2);
    }
}
