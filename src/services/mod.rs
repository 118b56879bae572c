pub mod booking_api;
pub mod calendar;
pub mod day_model;
pub mod rate_limit;
pub mod resolver;
pub mod scheduling;
pub mod slots;
pub mod submitter;
pub mod wizard;
