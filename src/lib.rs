// Flaggr - feature flags with groups and users for Rust
//
// This library re-exports the flag engine and, with the `redis` feature,
// the Redis connectivity it uses for shared storage.

// Re-export the flag engine
pub use flaggr_features::*;

// Re-export optional crates
#[cfg(feature = "redis")]
pub use flaggr_redis;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        EvaluationOptions,
        Feature,
        FeatureStore,
        FlagError,
        FlagResult,
        Flaggr,
        FlaggrConfig,
        GroupMember,
        Identity,
        Member,
        MemoryStore,
        User,
    };

    #[cfg(feature = "redis")]
    pub use crate::RedisStore;

    #[cfg(feature = "redis")]
    pub use flaggr_redis::RedisConfig;
}
