//! Household chore domain: due dates, rotation, and the task lifecycle.

pub mod due;
pub mod lifecycle;
pub mod rotation;

pub use due::{
    Calendar, DateLocale, days_left, format_due_date, next_due_date, percentage_left, total_hours,
};
pub use lifecycle::{TaskLifecycle, TaskSpec, TaskView};
pub use rotation::{Rotation, next_assignee};
