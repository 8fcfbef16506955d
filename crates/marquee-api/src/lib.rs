// marquee-api: Async Rust client for the marquee signage content API

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::PullClient;
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
pub use types::{Collection, PlaylistSlide, ResourceRef};
