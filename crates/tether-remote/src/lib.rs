//! tether-remote: Remote execution session over SSH
//!
//! One authenticated SSH connection plus an attached SFTP sub-channel,
//! representing one terminal/file-browser session: command execution with
//! a bounded output buffer and de-duplicated history, directory listings
//! with a TTL cache, and file read/write/delete.

pub mod cache;
pub mod listing;
pub mod session;
pub mod state;

pub use cache::DirectoryCache;
pub use session::RemoteSession;
pub use state::{CommandHistory, OutputBuffer};
