//! # Formcoach-Rules
//!
//! Exercise rule catalog for the form-analysis engine.
//!
//! ## Resolution
//!
//! A free-text exercise name resolves in three steps:
//!
//! 1. **Exact** - normalized name or alias equality, confidence 100
//! 2. **Fuzzy** - best similarity score above the configured floor
//! 3. **Fallback** - keyword classification into a movement category and a
//!    synthesized rule set for that category
//!
//! Step 3 always produces rules, so an unknown exercise name never stops a
//! session.

pub mod catalog;
pub mod document;
pub mod fallback;
pub mod matcher;
pub mod model;

pub use catalog::*;
pub use document::RuleDocument;
pub use matcher::MatchThresholds;
pub use model::*;
