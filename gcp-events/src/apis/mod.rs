pub mod events;
pub mod intevents;
