use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

// -----------------------------------------------------------------------------
// ----- Singleton -------------------------------------------------------------

static PROCESS_IDS: Lazy<ClientIdGenerator> = Lazy::new(ClientIdGenerator::new);

// -----------------------------------------------------------------------------
// ----- ClientIdGenerator -----------------------------------------------------

/// Hands out `client-N` identifiers, counting separately per database.
///
/// Entries are never evicted; there is one per distinct database ever seen,
/// not one per client.
#[derive(Debug, Default)]
pub struct ClientIdGenerator {
    counters: Mutex<HashMap<String, u64>>,
}

impl ClientIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generator shared by every client in this process.
    pub fn process() -> &'static ClientIdGenerator {
        &PROCESS_IDS
    }

    pub fn next_id(&self, database: &str) -> String {
        let mut counters = self.counters.lock();
        let counter = counters.entry(database.to_string()).or_insert(0);
        *counter += 1;
        format!("client-{counter}")
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
