use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::services::classifier::IntentClassifier;
use crate::services::mailer::NotificationSender;
use crate::store::ReservationStore;

pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub config: AppConfig,
    pub store: Arc<dyn ReservationStore>,
    /// `None` when no API key is configured; the resolver then has no
    /// fallback and unparsed messages get the generic prompt.
    pub classifier: Option<Box<dyn IntentClassifier>>,
    pub mailer: Box<dyn NotificationSender>,
    pub clock: Box<dyn Clock>,
}
