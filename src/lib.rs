//! A sans-io SASL negotiation layer for AMQP 1.0 transports.
//!
//! The layer sits between a raw byte stream (often beneath a TLS layer) and
//! the AMQP frame layer, performs the SASL security layer handshake defined
//! in Part 5.3 of the AMQP 1.0 core specification, and then hands the
//! stream off to the layer above untouched. It never owns an I/O loop:
//! bytes are pushed in with [`IoLayer::process_input`] and pulled out with
//! [`IoLayer::process_output`], and both operations are synchronous.
//!
//! The exchange itself is delegated to a [`SaslProvider`]. The bundled
//! [`BuiltinProvider`] covers the mechanisms that need no external SASL
//! library (ANONYMOUS, PLAIN and EXTERNAL); anything beyond that, such as a
//! SCRAM family or a Cyrus-style provider, plugs in through the same trait.
//!
//! # Example
//!
//! ```
//! use fe2o3_amqp_sasl::{Builder, IoLayer, IoProgress, NullLayer};
//!
//! let mut client = Builder::client()
//!     .allowed_mechs("ANONYMOUS")
//!     .env_config_path(false)
//!     .build(NullLayer);
//!
//! // The first write produces the 8 byte SASL protocol header
//! let mut buf = [0u8; 512];
//! match client.process_output(&mut buf) {
//!     IoProgress::Bytes(n) => {
//!         assert_eq!(n, 8);
//!         assert_eq!(&buf[..8], b"AMQP\x03\x01\x00\x00");
//!     }
//!     IoProgress::Eos => unreachable!(),
//! }
//! ```

#![deny(missing_docs, missing_debug_implementations)]

mod context;
mod error;
mod event;
pub mod frames;
mod layer;
pub mod mechanisms;
mod protocol_header;
mod provider;
mod state;
mod util;

pub use context::SaslContext;
pub use error::Error;
pub use event::{Collector, TransportEvent};
pub use layer::{
    Builder, IoLayer, IoProgress, LayerKind, NullLayer, SaslLayer, CONFIG_PATH_ENV_VAR,
};
pub use protocol_header::{
    sniff_protocol, ProtocolHeader, ProtocolId, SniffedProtocol, AMQP_PROTOCOL_HEADER,
    PROTOCOL_HEADER_LEN, SASL_PROTOCOL_HEADER,
};
pub use provider::{
    BuiltinProvider, PlainCredentialProvider, PlainCredentials, SaslProvider, SingleCredential,
};
pub use state::{Role, SaslState};
