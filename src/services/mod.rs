pub mod availability;
pub mod booking;
pub mod calendar;
pub mod classifier;
pub mod contact;
pub mod conversation;
pub mod mailer;
pub mod resolver;
