//! Feature Flags for Flaggr
//!
//! Feature flags with a global switch per feature, attribute-matched groups
//! and individually registered users, backed by a pluggable store.
//!
//! # Features
//!
//! - **Global switch** - Turn a feature on or off for everyone
//! - **Groups** - Enable a feature for members whose property matches a value
//! - **Users** - Enable a feature for specific identities
//! - **Pluggable storage** - In-memory, or Redis shared across instances
//!
//! A feature is on for a group member or a user only when its global switch
//! is on *and* the matching gate is enabled.
//!
//! # Quick Start
//!
//! ```
//! use flaggr_features::*;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let flaggr = Flaggr::in_memory();
//!
//! flaggr.add("uploader").await?;
//! flaggr.register_group("uploader", "admins", "admin", true).await?;
//!
//! let admin = json!({"id": 1, "admin": true});
//! assert!(flaggr.is_enabled_for_group("uploader", "admins", &admin).await?);
//!
//! // The global switch dominates every gate
//! flaggr.disable("uploader").await?;
//! assert!(!flaggr.is_enabled_for_group("uploader", "admins", &admin).await?);
//! # Ok::<(), FlagError>(())
//! # }).unwrap();
//! ```
//!
//! # Redis
//!
//! ```rust,ignore
//! use flaggr_features::{Flaggr, FlaggrConfig};
//! use flaggr_redis::RedisConfig;
//!
//! let config = FlaggrConfig::redis(RedisConfig::from_url("redis://localhost?db=1")?);
//! let flaggr = Flaggr::connect(config).await?;
//! assert_eq!(flaggr.adapter_name(), "redis");
//! ```

pub mod config;
pub mod error;
pub mod facade;
pub mod flag;
pub mod keys;
pub mod member;
pub mod store;

pub use config::{AdapterKind, DEFAULT_ADAPTER, FlaggrConfig, connect_store};
pub use error::{FlagError, FlagResult};
pub use facade::{EvaluationOptions, Flaggr};
pub use flag::{Feature, Gate, GroupGate, UserGate, evaluate_group, evaluate_user};
pub use member::{Accessor, GroupMember, Identity, Member, MemberProperty, User};
pub use store::{FeatureStore, MemoryStore};

#[cfg(feature = "redis")]
pub use store::RedisStore;
