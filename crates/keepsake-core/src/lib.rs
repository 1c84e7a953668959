//! # Keepsake Core
//!
//! Security core for Keepsake - an encrypted personal journal service.
//!
//! This crate turns opaque credentials into trusted, time-bounded
//! sessions, protects sensitive values at rest with authenticated
//! encryption, throttles abusive access patterns, and keeps a
//! tamper-evident audit trail. Journal CRUD, HTTP routing, UI, and the
//! backup scheduler live elsewhere and consume this crate through the
//! component handles below.
//!
//! ## Architecture
//!
//! - **crypto**: master-key derivation and encryption envelopes
//! - **audit**: append-only structured event sink with filtered retrieval
//! - **session**: token issuance, validation, revocation, and lockout
//! - **monitor**: sliding-window anomaly tracking and security reports
//! - **authz**: resource-ownership enforcement
//! - **config**: startup configuration, master secret included
//!
//! ## Usage
//!
//! Components are constructed once at process start and shared by
//! handle; none of them is a global:
//!
//! ```no_run
//! use std::sync::Arc;
//! use keepsake_core::{
//!     derive_master_key, AuditTrail, AuthorizationGuard, MonitorScheduler,
//!     SecurityConfig, SecurityMonitor, SessionAuthority,
//! };
//! # use keepsake_core::{Identity, IdentityStore, OwnershipStore, Result};
//! # struct Users;
//! # impl IdentityStore for Users {
//! #     fn verify_credentials(&self, _: &str, _: &str) -> Result<Identity> { unimplemented!() }
//! # }
//! # struct Owners;
//! # impl OwnershipStore for Owners {
//! #     fn owner_of(&self, _: &str, _: &str) -> Result<Option<String>> { unimplemented!() }
//! # }
//!
//! # fn main() -> keepsake_core::Result<()> {
//! let config = SecurityConfig::from_env()?;
//! let master_key = derive_master_key(config.master_secret())?;
//!
//! let audit = Arc::new(AuditTrail::new(&config.audit_log_path));
//! let sessions = Arc::new(SessionAuthority::new(&config, Arc::new(Users), audit.clone()));
//! let monitor = Arc::new(SecurityMonitor::new(&config, audit.clone()));
//! let guard = AuthorizationGuard::new(Arc::new(Owners), audit.clone());
//! let scheduler = MonitorScheduler::start(monitor.clone(), sessions.clone());
//! # let _ = (master_key, guard, scheduler);
//! # Ok(())
//! # }
//! ```

pub mod audit;
pub mod authz;
pub mod config;
pub mod crypto;
pub mod error;
pub mod monitor;
pub mod session;

pub use audit::{AuditEvent, AuditFilter, AuditTrail, EventKind};
pub use authz::{AuthorizationGuard, Decision, DenyReason, OwnershipStore};
pub use config::SecurityConfig;
pub use crypto::{derive_master_key, hash_identity, open, seal, Envelope, MasterKey};
pub use error::{Result, SecurityError};
pub use monitor::{MonitorScheduler, SecurityMonitor, SecurityReport};
pub use session::{
    Identity, IdentityStore, Role, SessionAuthority, SessionRecord, TOKEN_LENGTH,
};

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
