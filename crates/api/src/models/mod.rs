//! Domain models for the API.
//!
//! Stored records and the request bodies that create them. Pure value types
//! shared with the client live in `swag_core`.

pub mod contributor;
pub mod feedback;

pub use contributor::{ContributorInput, ContributorRecord, DiscountCodeResponse, NewContributor};
pub use feedback::{FeedbackInput, FeedbackRecord};
