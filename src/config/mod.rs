//! Tiered configuration.
//!
//! Later tiers override earlier ones field by field:
//! 1. **Defaults** compiled in
//! 2. **User** `~/.bujo/config.yaml`
//! 3. **Project** `./bujo/config.yaml`
//! 4. **Explicit** `--config` or `BUJO_CONFIG_PATH`
//! 5. **Environment** `BUJO_DB_PATH`, `BUJO_USER`, `BUJO_PORT`, `BUJO_STRICT_TRANSITIONS`
//!
//! CLI flags are applied on top by the binary.

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{merge_into, merge_layers};
pub use types::*;
