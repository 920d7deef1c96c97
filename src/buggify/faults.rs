//! Named fault injection points.
//!
//! Fault ids are dotted strings so trace output stays readable.

/// Object store faults, injected by `SimulatedObjectStore`
pub mod object_store {
    /// PUT fails before reaching the store
    pub const PUT_FAIL: &str = "object_store.put_fail";
    /// PUT is applied but the acknowledgement is lost
    pub const PUT_ACK_LOST: &str = "object_store.put_ack_lost";
    /// PUT stores only a prefix of the body and reports success
    pub const PARTIAL_WRITE: &str = "object_store.partial_write";
    /// GET fails with a transient error
    pub const GET_FAIL: &str = "object_store.get_fail";
    /// GET returns flipped bytes
    pub const GET_CORRUPT: &str = "object_store.get_corrupt";
    /// LIST fails with a transient error
    pub const LIST_FAIL: &str = "object_store.list_fail";
    /// LIST omits the newest objects (eventual consistency)
    pub const LIST_STALE: &str = "object_store.list_stale";
    /// Operation times out
    pub const TIMEOUT: &str = "object_store.timeout";
}
