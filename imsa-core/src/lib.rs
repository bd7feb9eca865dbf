//! IMSA core - everything the bot does that is not Telegram glue
//!
//! - `liveness`: heartbeat file, downtime measurement, network probe and watchdog
//! - `notify`: downtime notice fan-out to registered users
//! - `directory`: SQLite-backed table of registered users and their roles
//! - `access`: role gate applied by the command router
//! - `dialog`: add-user / delete-user conversation state machine
//! - `transport`: outbound chat boundary

pub mod access;
pub mod dialog;
pub mod directory;
pub mod liveness;
pub mod notify;
pub mod transport;

pub use access::Role;
pub use directory::{Directory, DirectoryError, RegisteredUser};
pub use transport::{ChatTransport, DeliveryError};
