//! Messages posted to background contexts and exchanged over query channels.

use serde::{Deserialize, Serialize};

use dbprobe_core::{CompatibilityCheck, QueryResult, SqlValue, StorageBackend};

use crate::init::InitRequester;
use crate::transport::{message_channel, Port, ReplySender};

/// Current query protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// A request posted to a dedicated or shared context.
#[derive(Debug)]
pub enum WorkerRequest {
    /// Probe the context's capabilities. Exactly one reply is expected on
    /// `reply`.
    CompatibilityCheck {
        check: CompatibilityCheck,
        reply: ReplySender,
    },

    /// Host a database and serve queries for it.
    Serve(ServeRequest),
}

/// Ask a context to host database `database_name` on `backend`.
#[derive(Debug)]
pub struct ServeRequest {
    /// Location of the SQL engine module to load.
    pub engine_uri: String,
    /// Backend the database must be hosted on.
    pub backend: StorageBackend,
    /// Database name.
    pub database_name: String,
    /// Server end of the query channel. Ownership moves to the context.
    pub query_port: ServerPort,
    /// Hosting end of the init handshake, if the caller supplied an
    /// initializer.
    pub init_port: Option<InitRequester>,
}

/// A message tagged with the request id it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub body: T,
}

/// Requests from a connection to the hosting side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryRequest {
    /// Opening handshake. Must be the first request on a channel.
    Hello { protocol_version: u8 },

    /// Run one statement.
    Execute { sql: String, params: Vec<SqlValue> },

    /// Run several statements without parameters.
    ExecuteBatch { sql: String },

    /// Run a query and return every row.
    Select { sql: String, params: Vec<SqlValue> },

    /// Release the channel. No further requests are answered.
    Close,
}

/// Responses from the hosting side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum QueryResponse {
    /// Handshake accepted; the database is open.
    Ready,

    /// Statement finished.
    Executed { rows_affected: u64 },

    /// Batch finished.
    Done,

    /// Query rows.
    Rows(QueryResult),

    /// Channel released.
    Closed,

    /// The request failed on the hosting side.
    Error { message: String },
}

/// Connection end of a query channel.
pub type ClientPort = Port<Envelope<QueryRequest>, Envelope<QueryResponse>>;

/// Hosting end of a query channel.
pub type ServerPort = Port<Envelope<QueryResponse>, Envelope<QueryRequest>>;

/// Create a query channel.
pub fn query_channel() -> (ClientPort, ServerPort) {
    message_channel()
}
