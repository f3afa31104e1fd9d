pub mod attribute;
pub mod ber;
pub mod config;
pub mod dn;
pub mod entry;
pub mod error;
pub mod messages;
pub mod result;
pub mod schema;
pub mod serialize;
pub mod value;

pub use attribute::Attribute;
pub use config::CodecConfig;
pub use dn::Dn;
pub use entry::{Entry, SetOutcome};
pub use error::{DecodeError, EncodeError, LdapError};
pub use messages::{encode_message, parse_message, parse_message_header, LdapMessage, ProtocolOp};
pub use result::{LdapResult, ResultCode};
pub use schema::{AttributeType, Normalizer, SchemaContext, SchemaRegistry, SyntaxChecker};
pub use value::{needs_base64_encoding, Validity, Value, ValueBuf};
