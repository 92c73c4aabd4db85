//! Agent selection
//!
//! Strategies, in the order the orchestrator consults them:
//! - `ForcedStrategy` - Caller-requested agent
//! - `ContinuityStrategy` - Agent lock
//! - `CapabilityStrategy` - Keyword/capability scoring with fallback

pub mod capability;
pub mod continuity;
pub mod forced;
pub mod strategy;
pub mod text;

pub use capability::{CapabilityStrategy, CAPABILITY_STRATEGY, FALLBACK_STRATEGY};
pub use continuity::{ContinuityStrategy, CONTINUITY_STRATEGY};
pub use forced::{ForcedStrategy, FORCED_STRATEGY};
pub use strategy::{ForcedRoute, SelectionContext, SelectionResult, SelectionStrategy};
pub use text::{normalize, KeywordMatcher};
