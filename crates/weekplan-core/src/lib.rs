//! Core types: users, events, week helpers and the schedule slot engine

pub mod event;
pub mod schedule;
pub mod time;
pub mod tracing;

pub use event::{CalendarEvent, DEFAULT_CLASS, NO_TITLE, User, sort_chronologically};
pub use schedule::{
    ScheduleRow, SlotInfo, build_schedule_rows, compute_all_free_slots, compute_user_slots,
    generate_slot_keys, generate_time_slots, slot_key,
};
pub use time::{WEEKDAY_COUNT, next_week, previous_week, week_start_of, weekday_dates};
pub use crate::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
