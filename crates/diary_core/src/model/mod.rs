//! Domain model for the study diary.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep gamification rules (experience, level) as pure functions.
//!
//! # Invariants
//! - One `User` per external participant identifier.
//! - Task completion is one-way (`false -> true`).
//! - `level` is always derived from `xp`, never set independently.

pub mod mood;
pub mod progression;
pub mod task;
pub mod user;
