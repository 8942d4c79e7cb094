//! A bounded, self-healing connection pool.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use log::{debug, info, warn};

use crate::pool::error::PoolError;
use crate::pool::manager::ManageConnection;

/// Pool sizing and acquire policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Connections created by [`ConnectionPool::initialize`].
    pub min_size: usize,
    /// Upper bound on connections alive at once, idle and in use together.
    pub max_size: usize,
    /// How long `acquire` waits when the pool is saturated. `None` waits
    /// until a connection is released, however long that takes.
    pub acquire_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            acquire_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Clamp to `max_size >= 1` and `min_size <= max_size`.
    fn sanitized(self) -> Self {
        let max_size = self.max_size.max(1);
        Self {
            min_size: self.min_size.min(max_size),
            max_size,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

/// A snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub in_use: usize,
    pub max_size: usize,
    pub closed: bool,
}

struct State<C> {
    idle: Vec<C>,
    /// Connections handed out plus slots reserved for connections being
    /// opened. Spans generations: a connection from a torn-down pool still
    /// counts until it is returned.
    in_use: usize,
    generation: u64,
    closed: bool,
}

impl<C> State<C> {
    fn total(&self) -> usize {
        self.idle.len() + self.in_use
    }

    fn reopen(&mut self) {
        self.closed = false;
        self.generation += 1;
    }
}

struct Shared<M: ManageConnection> {
    manager: M,
    config: PoolConfig,
    state: Mutex<State<M::Connection>>,
    released: Condvar,
}

impl<M: ManageConnection> Shared<M> {
    fn lock(&self) -> MutexGuard<'_, State<M::Connection>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn put_back(&self, conn: M::Connection, generation: u64, broken: bool) {
        let mut state = self.lock();
        state.in_use -= 1;

        if broken {
            warn!("Discarding broken backend connection");
        } else if state.closed || generation != state.generation {
            debug!("Dropping connection from a torn-down pool");
        } else {
            state.idle.push(conn);
        }

        debug!("Connection released, used connections: {in_use}", in_use = state.in_use);
        drop(state);
        self.released.notify_one();
    }

    fn unreserve(&self, slots: usize) {
        let mut state = self.lock();
        state.in_use -= slots;
        drop(state);
        self.released.notify_all();
    }
}

/// A bounded pool of backend connections.
///
/// Connections are opened on demand up to `max_size`; `idle + in_use` never
/// exceeds it, including while connections are being opened. When every
/// connection is in use, `acquire` blocks the calling thread until one is
/// released or the configured timeout passes. Cloning is cheap and clones
/// share the same pool.
///
/// After [`ConnectionPool::close`] the next `acquire` transparently starts a
/// fresh pool instead of failing, so a backend restart heals without
/// operator action.
pub struct ConnectionPool<M: ManageConnection> {
    shared: Arc<Shared<M>>,
}

impl<M: ManageConnection> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M: ManageConnection> fmt::Debug for ConnectionPool<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.shared.config)
            .field("status", &self.status())
            .finish()
    }
}

impl<M: ManageConnection> ConnectionPool<M> {
    /// Create an empty pool. No connection is opened until first demand or
    /// an explicit [`ConnectionPool::initialize`].
    pub fn new(manager: M, config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                manager,
                config: config.sanitized(),
                state: Mutex::new(State {
                    idle: Vec::new(),
                    in_use: 0,
                    generation: 0,
                    closed: false,
                }),
                released: Condvar::new(),
            }),
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.shared.config
    }

    pub fn manager(&self) -> &M {
        &self.shared.manager
    }

    /// Open connections until `min_size` exist.
    ///
    /// Connections opened before a failure are kept.
    pub fn initialize(&self) -> Result<(), PoolError<M::Error>> {
        let (reserved, generation) = {
            let mut state = self.shared.lock();
            if state.closed {
                state.reopen();
            }
            let reserved = self.shared.config.min_size.saturating_sub(state.total());
            state.in_use += reserved;
            (reserved, state.generation)
        };

        let mut opened = Vec::with_capacity(reserved);
        let mut failure = None;
        for _ in 0..reserved {
            match self.shared.manager.connect() {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        {
            let mut state = self.shared.lock();
            state.in_use -= reserved;
            if !state.closed && state.generation == generation {
                state.idle.extend(opened);
            }
            info!("Database connection pool created, idle connections: {idle}", idle = state.idle.len());
        }
        self.shared.released.notify_all();

        match failure {
            Some(e) => Err(PoolError::Connect(e)),
            None => Ok(()),
        }
    }

    /// Take a connection, opening one if the pool has room, otherwise
    /// waiting for a release.
    pub fn acquire(&self) -> Result<PooledConnection<M>, PoolError<M::Error>> {
        let shared = &self.shared;
        let deadline = shared.config.acquire_timeout.map(|t| (t, Instant::now() + t));
        let mut state = shared.lock();

        loop {
            if state.closed {
                info!("Connection pool has been closed, initializing a new one");
                state.reopen();
            }

            while let Some(mut conn) = state.idle.pop() {
                if shared.manager.has_broken(&mut conn) {
                    warn!("Discarding broken idle connection");
                    continue;
                }
                state.in_use += 1;
                debug!("Retrieved a connection from the pool, used connections: {in_use}", in_use = state.in_use);
                return Ok(self.guard(conn, state.generation));
            }

            if state.total() < shared.config.max_size {
                // Reserve the slot before unlocking so concurrent acquirers
                // cannot overshoot max_size while this one connects.
                state.in_use += 1;
                let generation = state.generation;
                drop(state);

                return match shared.manager.connect() {
                    Ok(conn) => {
                        debug!("Opened a new pooled connection");
                        Ok(self.guard(conn, generation))
                    }
                    Err(e) => {
                        shared.unreserve(1);
                        Err(PoolError::Connect(e))
                    }
                };
            }

            state = match deadline {
                None => shared.released.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some((timeout, deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(PoolError::Timeout(timeout));
                    }
                    shared
                        .released
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Return a connection. Equivalent to dropping it.
    pub fn release(&self, conn: PooledConnection<M>) {
        drop(conn);
    }

    /// Tear the pool down: idle connections are closed now, in-use ones when
    /// they come back. The next `acquire` starts a fresh pool.
    pub fn close(&self) {
        let idle = {
            let mut state = self.shared.lock();
            state.closed = true;
            std::mem::take(&mut state.idle)
        };
        info!("Connection pool closed, dropped {count} idle connections", count = idle.len());
        drop(idle);
        self.shared.released.notify_all();
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.shared.lock();
        PoolStatus {
            idle: state.idle.len(),
            in_use: state.in_use,
            max_size: self.shared.config.max_size,
            closed: state.closed,
        }
    }

    fn guard(&self, conn: M::Connection, generation: u64) -> PooledConnection<M> {
        PooledConnection {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
            generation,
            broken: false,
        }
    }
}

/// A connection on loan from a [`ConnectionPool`]; dropping it releases it.
pub struct PooledConnection<M: ManageConnection> {
    conn: Option<M::Connection>,
    shared: Arc<Shared<M>>,
    generation: u64,
    broken: bool,
}

impl<M: ManageConnection> PooledConnection<M> {
    /// Flag the connection as unusable so release discards it instead of
    /// returning it to the idle set.
    pub fn mark_broken(&mut self) {
        self.broken = true;
    }

    pub fn is_marked_broken(&self) -> bool {
        self.broken
    }
}

impl<M: ManageConnection> Deref for PooledConnection<M> {
    type Target = M::Connection;

    fn deref(&self) -> &Self::Target {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection is present until drop"),
        }
    }
}

impl<M: ManageConnection> DerefMut for PooledConnection<M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.conn {
            Some(conn) => conn,
            None => unreachable!("connection is present until drop"),
        }
    }
}

impl<M: ManageConnection> fmt::Debug for PooledConnection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("generation", &self.generation)
            .field("broken", &self.broken)
            .finish_non_exhaustive()
    }
}

impl<M: ManageConnection> Drop for PooledConnection<M> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.put_back(conn, self.generation, self.broken);
        }
    }
}
