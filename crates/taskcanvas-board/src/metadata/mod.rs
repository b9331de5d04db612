//! Derived metadata.
//!
//! Read-only projections over the board: recursive task counts and smart
//! property inheritance. Nothing in this module produces a position or parent
//! write; inherited patches only touch status, priority, due date, project and
//! estimated duration.

pub mod counts;
pub mod inherit;
pub mod keywords;

pub use counts::{affected_groups, task_counts};
pub use inherit::{group_contribution, inherited_patch};
pub use keywords::{keyword_priority, keyword_status, DateKeywordResolver, KeywordDates};
