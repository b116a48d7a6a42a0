//! # dbprobe channel
//!
//! Plumbing between the caller and its background contexts.
//!
//! ## Overview
//!
//! Background contexts are reached only by posting messages. This crate
//! defines the handles ([`DedicatedContext`], [`SharedContext`]), the
//! requests posted to them ([`WorkerRequest`]), the two-endpoint channels the
//! requests carry ([`Port`], [`ReplySender`], [`InitRequester`]), and the
//! query protocol a connection uses to reach a remotely hosted database
//! ([`RemoteExecutor`], [`serve`]).
//!
//! ## Key Properties
//!
//! - **Move-only endpoints**: ports are transferred, never cloned, so every
//!   channel end has one owner
//! - **At-most-once init**: both halves of the init handshake are consumed
//!   by use
//! - **Request correlation**: every query response carries the id of the
//!   request it answers
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dbprobe_channel::{query_channel, serve, RemoteExecutor};
//! use dbprobe_store::{Executor, LocalDatabase, MemoryFileSystem, DATABASE_PATH};
//!
//! async fn example() {
//!     let fs = Arc::new(MemoryFileSystem::new());
//!     let db = LocalDatabase::open(fs, DATABASE_PATH, None).await.unwrap();
//!     let (client, server) = query_channel();
//!     tokio::spawn(serve(server, Ok(Arc::new(db) as Arc<dyn Executor>)));
//!
//!     let remote = RemoteExecutor::connect(client).await.unwrap();
//!     remote.execute_batch("CREATE TABLE notes (body TEXT)").await.unwrap();
//! }
//! ```

pub mod context;
pub mod error;
pub mod init;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use context::{DedicatedContext, SharedContext};
pub use error::{ChannelError, Result};
pub use init::{init_channel, InitRequester, InitResponder};
pub use messages::{
    query_channel, ClientPort, Envelope, QueryRequest, QueryResponse, ServeRequest, ServerPort,
    WorkerRequest, PROTOCOL_VERSION,
};
pub use protocol::{serve, RemoteExecutor};
pub use transport::{message_channel, reply_channel, Port, ReplyReceiver, ReplySender};
