//! Webhook Module
//!
//! Validating admission webhook for the operator's custom resources.
//!
//! # Rules
//!
//! - **DevfileRegistry**: never deployed to the `default` namespace; on update
//!   the published registry URL must still serve a devfile index
//! - **Registries lists**: one instance per namespace (or per cluster), entry
//!   names and URLs unique, every URL a reachable devfile registry
//!
//! # Example
//!
//! ```rust,ignore
//! use devfile_registry_operator::webhook::{TlsConfig, WebhookServer};
//!
//! let server = WebhookServer::new(store, validator);
//! server
//!     .start("0.0.0.0:9443".parse()?, TlsConfig { cert_path, key_path })
//!     .await?;
//! ```

pub mod server;
pub mod validation;

pub use server::{TlsConfig, WebhookServer};
pub use validation::{review_list, review_registry, Verdict};
