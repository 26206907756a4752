//! Domain models for Planwise.
//!
//! # Planning Records
//!
//! - [`Goal`]: A monthly objective with a derived completion percentage.
//! - [`Task`]: A unit of work, optionally attached to a goal, with a priority and due date.
//! - [`CalendarEvent`]: A time-boxed entry on the user's calendar.
//! - [`Habit`]: A recurring behaviour the user wants reminders for.
//!
//! ## AI Suggestions
//!
//! - [`Suggestion`]: A stored, model-generated proposal awaiting (or having received) application.
//! - [`SuggestionContent`]: The closed set of proposal shapes (plan, briefing, reschedule).
//! - [`ApplyResult`]: Per-item accounting of what applying a suggestion actually wrote.

mod apply;
mod event;
mod goal;
mod habit;
mod suggestion;
mod task;

pub use apply::*;
pub use event::*;
pub use goal::*;
pub use habit::*;
pub use suggestion::*;
pub use task::*;
