mod attendance;
mod badge_events;
mod live_state;
mod sessions;
mod timetable;
