//! Wire model for the native-messaging protocol.
//!
//! - [`Command`]: a request written to the host's stdin
//! - [`Response`]: a message decoded from the host's stdout
//! - [`frame`]: `LEN(u32 LE) || JSON` framing, encode and streaming decode
//! - [`schema`]: optional per-command payload checks, layered above the codec

pub mod command;
pub mod frame;
pub mod response;
pub mod schema;

pub use command::{Command, CommandKind, Payload};
pub use frame::{decode, encode, encode_all, Decoded, DecodeTruncation, TruncationReason};
pub use response::{Response, ResponseType, MISSING_REQUEST_ID};
pub use schema::{validate, PayloadIssue};
