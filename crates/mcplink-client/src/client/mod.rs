//! Session client
//!
//! - `core`: the [`Client`] facade
//! - `correlator`: id assignment and response matching
//! - `dispatcher`: the read loop consuming the event stream
//! - `handshake`: initialize / initialized exchange
//! - `session`: session record and [`SessionState`] machine

mod core;
mod correlator;
mod dispatcher;
mod handshake;
mod session;

pub use self::core::Client;
pub use correlator::PendingResponse;
pub use session::SessionState;
