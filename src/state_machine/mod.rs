// State machine module for release orchestration
//
// Every entity below the release moves pending -> deploying -> terminal; the
// release itself moves pending -> in_progress -> terminal.

pub mod states;

pub use states::{EntityState, ReleaseState};
