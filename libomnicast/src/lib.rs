//! Omnicast - Unix tools for multi-platform social posting
//!
//! This library provides core functionality for composing, scheduling, and
//! publishing posts across mainstream social platforms.

pub mod config;
pub mod error;
pub mod logging;
pub mod platforms;
pub mod poster;
pub mod scheduler;
pub mod scheduling;
pub mod store;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{OmnicastError, Result};
pub use platforms::PlatformRegistry;
pub use poster::{DispatchPolicy, DispatchReport, Dispatcher};
pub use scheduler::{Scheduler, SchedulerHandle};
pub use store::{PostPatch, PostStore};
pub use types::{MediaFile, PlatformAccount, PlatformId, Post, PostStatus};
