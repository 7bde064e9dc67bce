//! Domain types shared by every step
//!
//! - [`Status`] - the sparse profile being filled in, merged field by field
//! - [`Meta`] - where the interview is: step number and phase

mod meta;
mod status;

pub use meta::{COMPLETED_STEP, FIRST_STEP, LAST_STEP, Meta, Phase, step_topic};
pub use status::{Status, TextField};
