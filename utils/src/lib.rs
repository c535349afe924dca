//! Shared IO utilities for tidegate.
//!
//! - **`atomic_write`**: crash-safe file persistence (temp + rename), including a
//!   create-new variant that refuses to replace an existing file
//! - **`append`**: line-oriented append for the telemetry and audit logs

pub mod append;
pub mod atomic_write;

pub use append::append_line;
pub use atomic_write::{
    AtomicWriteOptions, FileSyncPolicy, ParentDirSyncPolicy, PersistMode, atomic_write_new,
    atomic_write_new_with_options, atomic_write_with_options, recover_bak_file,
};
