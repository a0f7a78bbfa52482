pub mod alias;
pub mod config;
pub mod dns;
pub mod dnssec;
pub mod error;
pub mod lookup;
pub mod record;
pub mod resolver;
pub mod transport;

pub use alias::{CanonicalName, Normalized, normalize};
pub use config::ResolverConfig;
pub use dns::DNSPacket;
pub use dnssec::{DnssecStatus, DnssecVerifier, TrustAnchorStore};
pub use error::{ConfigError, ResolveError, TransportError};
pub use lookup::{QueryClient, RawTxtAnswer, RetryPolicy, TxtResolver};
pub use record::{MalformedKind, MalformedRecord, ParsedAliasRecord};
pub use resolver::{AliasResolver, Resolution, ResolvedAlias, TrustPolicy};
pub use transport::{DnsTransport, UdpTransport};
