//! Data Transfer Objects for the CI engine API
//!
//! Wire representations returned by the CI engine. They are converted into
//! domain types at the client boundary and never stored.

pub mod run;
