pub mod reservation;
pub mod session;
pub mod slot;

pub use reservation::ReservationRecord;
pub use session::{BookingDraft, DayContext, PendingContext, Period, Session, SessionData, SessionState};
pub use slot::{human_datetime, SlotId, MONTHS_ES, WEEKDAYS_ES};
