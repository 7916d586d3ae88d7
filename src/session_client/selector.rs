use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::backend::SessionStub;
use crate::errors::SessionError;

// -----------------------------------------------------------------------------
// ----- Connection ------------------------------------------------------------

/// One backend connection and the stub bound to it. Identified by its
/// position in the selector; never mutated after construction.
pub struct Connection {
    index: usize,
    stub: Arc<dyn SessionStub>,
}

impl Connection {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn stub(&self) -> &dyn SessionStub {
        self.stub.as_ref()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("index", &self.index).finish()
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionSelector ----------------------------------------------------

/// Round-robin over a fixed, non-empty set of connections.
///
/// `len()` consecutive calls to [`next`](Self::next) hand out every connection
/// exactly once, in the same cyclic order every time, also under concurrent
/// callers.
#[derive(Debug)]
pub struct ConnectionSelector {
    connections: Vec<Arc<Connection>>,
    cursor: AtomicUsize,
}

// -----------------------------------------------------------------------------
// ----- ConnectionSelector: Static --------------------------------------------

impl ConnectionSelector {
    pub fn new(stubs: Vec<Arc<dyn SessionStub>>) -> Result<Self, SessionError> {
        if stubs.is_empty() {
            return Err(SessionError::NoConnections);
        }

        let connections = stubs
            .into_iter()
            .enumerate()
            .map(|(index, stub)| Arc::new(Connection { index, stub }))
            .collect();

        Ok(Self {
            connections,
            cursor: AtomicUsize::new(0),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- ConnectionSelector: Public --------------------------------------------

impl ConnectionSelector {
    pub fn next(&self) -> Arc<Connection> {
        let len = self.connections.len();
        let index = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
        {
            Ok(previous) | Err(previous) => previous,
        };
        self.connections[index].clone()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn connections(&self) -> &[Arc<Connection>] {
        &self.connections
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
