//! wise-protocol
//!
//! Wire codec for delegated-voting commands, plus the collaborator traits the
//! core calls (index reads, broadcast, post metadata, custom RPC).
//!
//! Architectural decisions:
//! - Every protocol version ever published stays decodable; the ledger is
//!   append-only and historical records are never migrated.
//! - Decoding walks a fixed, newest-first table of versions; the first whose
//!   discriminator matches wins.
//! - Encoding targets exactly one current version.
//! - Decoding never panics: anything unrecognized is a [`SchemaError`].

mod api;
mod codec;
mod errors;
mod operation;
mod v1;
mod v2;

pub use api::{Broadcaster, CustomRpcClient, PostLoader, RulesIndex, RulesReader};
pub use codec::{CommandEnvelope, Protocol, ProtocolVersion};
pub use errors::SchemaError;
pub use operation::{CustomJson, WireOperation, CUSTOM_JSON};
