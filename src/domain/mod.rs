//! Usage: Domain modules (sign-in state machine and its collaborator seams).

pub mod sign_in;
