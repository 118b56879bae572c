pub mod availability;
pub mod booking;
pub mod business;
pub mod calendar;
pub mod service;
pub mod slot;

pub use availability::{
    AssignmentMode, AvailabilityResponse, BusinessHours, BusinessSchedule, DayHours, DayStatus,
    StaffOption,
};
pub use booking::{
    Appointment, BookingDraft, BookingResult, BookingStatus, ContactDetails, CreateBookingRequest,
    CreateBookingResponse,
};
pub use business::{Business, CalendarSettings};
pub use calendar::CalendarDay;
pub use service::Service;
pub use slot::Slot;
