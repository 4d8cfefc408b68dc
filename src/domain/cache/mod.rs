//! Cache domain - Content-addressed key/value store abstraction

mod key;
mod repository;

pub use key::{
    canonical_search_content, CacheNamespace, ClearScope, ContentKeyGenerator,
    DIGEST_HEX_LEN,
};
pub(crate) use repository::glob_to_regex;
pub use repository::{Cache, CacheExt};

#[cfg(test)]
pub use repository::mock::MockCache;
