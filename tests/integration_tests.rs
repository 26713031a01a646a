use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDateTime;
use tower::ServiceExt;

use citabot::clock::FixedClock;
use citabot::config::AppConfig;
use citabot::db;
use citabot::handlers;
use citabot::models::{ReservationRecord, SlotId};
use citabot::services::classifier::{ClassifierParse, IntentClassifier};
use citabot::services::mailer::{NotificationSender, SendOutcome};
use citabot::state::AppState;
use citabot::store::{ReservationStore, SqliteReservationStore};

// ── Mock providers ──

/// Recognizes one fixed phrase; anything else gets an empty datetime, the
/// way the real model answers smalltalk.
struct MockClassifier;

#[async_trait]
impl IntentClassifier for MockClassifier {
    async fn classify(&self, message: &str, _now_iso: &str) -> anyhow::Result<ClassifierParse> {
        if message.contains("después del puente") {
            Ok(ClassifierParse {
                reply: "Claro".to_string(),
                datetime_iso: "2025-11-17T10:00".to_string(),
                intent: "check".to_string(),
                alt_suggestion: String::new(),
            })
        } else {
            Ok(ClassifierParse::default())
        }
    }
}

struct MockMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

#[async_trait]
impl NotificationSender for MockMailer {
    async fn send_confirmation(
        &self,
        to: &str,
        name: &str,
        _slot: &SlotId,
    ) -> anyhow::Result<SendOutcome> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), name.to_string()));
        Ok(SendOutcome {
            delivered: true,
            id: Some("mock-id".to_string()),
        })
    }
}

/// In-memory store with a failure switch, for exercising outage handling.
struct FlakyStore {
    taken: Mutex<HashSet<String>>,
    failing: AtomicBool,
}

impl FlakyStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            taken: Mutex::new(HashSet::new()),
            failing: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ReservationStore for FlakyStore {
    async fn exists(&self, slot: &SlotId) -> anyhow::Result<bool> {
        Ok(self.taken.lock().unwrap().contains(&slot.to_string()))
    }

    async fn create_if_absent(
        &self,
        slot: &SlotId,
        _record: &ReservationRecord,
    ) -> anyhow::Result<bool> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("storage unavailable");
        }
        Ok(self.taken.lock().unwrap().insert(slot.to_string()))
    }
}

/// Always errors, like a model endpoint that is down.
struct FailingClassifier;

#[async_trait]
impl IntentClassifier for FailingClassifier {
    async fn classify(&self, _message: &str, _now_iso: &str) -> anyhow::Result<ClassifierParse> {
        anyhow::bail!("model endpoint unreachable")
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3000,
        database_url: ":memory:".to_string(),
        gemini_api_key: String::new(),
        gemini_model: "gemini-2.5-flash".to_string(),
        resend_api_key: String::new(),
        from_email: "reservas@example.com".to_string(),
        session_ttl_minutes: 30,
    }
}

/// Monday 2025-11-10, 08:00 local time.
fn test_now() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2025-11-10 08:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
}

fn test_state() -> (Arc<AppState>, Arc<Mutex<Vec<(String, String)>>>) {
    let conn = db::init_db(":memory:").unwrap();
    let db = Arc::new(Mutex::new(conn));
    let sent = Arc::new(Mutex::new(vec![]));
    let state = Arc::new(AppState {
        store: Arc::new(SqliteReservationStore::new(db.clone())),
        db,
        config: test_config(),
        classifier: Some(Box::new(MockClassifier)),
        mailer: Box::new(MockMailer {
            sent: Arc::clone(&sent),
        }),
        clock: Box::new(FixedClock(test_now())),
    });
    (state, sent)
}

/// Like `test_state` but with the store and classifier supplied by the test.
fn injected_state(
    store: Arc<dyn ReservationStore>,
    classifier: Box<dyn IntentClassifier>,
) -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    let db = Arc::new(Mutex::new(conn));
    Arc::new(AppState {
        store,
        db,
        config: test_config(),
        classifier: Some(classifier),
        mailer: Box::new(MockMailer {
            sent: Arc::new(Mutex::new(vec![])),
        }),
        clock: Box::new(FixedClock(test_now())),
    })
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/chat", post(handlers::chat::chat))
        .route(
            "/api/availability/check",
            get(handlers::availability::check),
        )
        .route(
            "/api/availability/suggest",
            get(handlers::availability::suggest),
        )
        .route("/api/availability/next", get(handlers::availability::next))
        .route(
            "/api/availability/summary",
            get(handlers::availability::summary),
        )
        .route("/api/book", post(handlers::booking::book))
        .with_state(state)
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn post_json(
    app: &Router,
    uri: &str,
    payload: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let res = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("Content-Type", "application/json")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn chat(app: &Router, session: &str, message: &str) -> serde_json::Value {
    let (status, json) = post_json(
        app,
        "/chat",
        serde_json::json!({ "session_id": session, "message": message }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

// ── Tests ──

#[tokio::test]
async fn test_health() {
    let (state, _) = test_state();
    let (status, json) = get_json(&app(state), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
}

#[tokio::test]
async fn test_check_reports_reasons() {
    let (state, _) = test_state();
    let app = app(state);

    let (_, json) = get_json(&app, "/api/availability/check?iso=hola").await;
    assert_eq!(json["available"], false);
    assert_eq!(json["reason"], "bad_format");

    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-17T09:30").await;
    assert_eq!(json["reason"], "not_aligned");

    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-16T10:00").await;
    assert_eq!(json["reason"], "sunday_closed");

    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-17T18:00").await;
    assert_eq!(json["reason"], "outside_hours");

    // Saturday closes at 13:00
    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-15T14:00").await;
    assert_eq!(json["reason"], "outside_hours");

    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-17T09:00").await;
    assert_eq!(json["available"], true);
    assert!(json.get("reason").is_none());
}

#[tokio::test]
async fn test_suggest_is_deterministic() {
    let (state, _) = test_state();
    let app = app(state);
    let uri = "/api/availability/suggest?day=fecha&date=2025-11-17&period=tarde&count=3";

    let (status, first) = get_json(&app, uri).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = get_json(&app, uri).await;
    assert_eq!(first, second);

    let slots = first["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0]["iso"], "2025-11-17T12:00");
    assert_eq!(
        slots[0]["human"],
        "lunes, 17 de noviembre de 2025, 12:00"
    );
}

#[tokio::test]
async fn test_suggest_today_skips_past_hours() {
    // Fixed clock says Monday 08:00, so the whole day is still open.
    let (state, _) = test_state();
    let app = app(state);
    let (_, json) = get_json(&app, "/api/availability/suggest?day=hoy&count=10").await;
    let slots = json["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 8);
    assert_eq!(slots[0]["iso"], "2025-11-10T09:00");
}

#[tokio::test]
async fn test_book_then_conflict() {
    let (state, sent) = test_state();
    let app = app(state);
    let payload = serde_json::json!({
        "iso": "2025-11-17T09:00",
        "name": "Juan Pérez",
        "email": "juan@correo.com"
    });

    let (status, json) = post_json(&app, "/api/book", payload.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);
    assert_eq!(json["emailOk"], true);
    assert_eq!(sent.lock().unwrap().len(), 1);

    let (status, json) = post_json(&app, "/api/book", payload).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("slot_taken"));

    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-17T09:00").await;
    assert_eq!(json["available"], false);
}

#[tokio::test]
async fn test_book_rejects_sunday() {
    let (state, _) = test_state();
    let app = app(state);
    let (status, _) = post_json(
        &app,
        "/api/book",
        serde_json::json!({
            "iso": "2025-11-16T10:00",
            "name": "Juan",
            "email": "juan@correo.com"
        }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_concurrent_bookings_have_one_winner() {
    let (state, _) = test_state();
    let slot: SlotId = "2025-11-17T09:00".parse().unwrap();
    let record_a =
        citabot::models::ReservationRecord::new("Ana", "ana@correo.com", None, test_now());
    let record_b =
        citabot::models::ReservationRecord::new("Luis", "luis@correo.com", None, test_now());

    let (a, b) = tokio::join!(
        state.store.create_if_absent(&slot, &record_a),
        state.store.create_if_absent(&slot, &record_b),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(a ^ b, "exactly one create must win");
}

#[tokio::test]
async fn test_next_available_skips_booked_slot() {
    let (state, _) = test_state();
    let slot: SlotId = "2025-11-17T09:00".parse().unwrap();
    let record = citabot::models::ReservationRecord::new("Ana", "a@b.es", None, test_now());
    state.store.create_if_absent(&slot, &record).await.unwrap();

    let app = app(state);
    let (status, json) =
        get_json(&app, "/api/availability/next?from=2025-11-17T09:00").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["iso"], "2025-11-17T10:00");
}

#[tokio::test]
async fn test_summary_reports_open_day() {
    let (state, _) = test_state();
    let app = app(state);
    let (status, json) = get_json(&app, "/api/availability/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["today"]["any"], true);
    let range = &json["today"]["rangeHuman"];
    assert!(range["start"].as_str().unwrap().contains("09:00"));
    assert!(range["end"].as_str().unwrap().contains("16:00"));
    assert_eq!(json["tomorrow"]["any"], true);
}

#[tokio::test]
async fn test_chat_answers_todays_date() {
    let (state, _) = test_state();
    let app = app(state);
    let json = chat(&app, "s1", "¿qué día es hoy?").await;
    assert_eq!(
        json["reply"],
        "Hoy es lunes, 10 de noviembre de 2025, 08:00 (hora local)."
    );
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_chat_full_booking_flow() {
    let (state, sent) = test_state();
    let app = app(state);

    // Date without hour: the assistant asks for a period.
    let json = chat(&app, "s1", "me viene bien el lunes 17").await;
    assert!(json["reply"].as_str().unwrap().contains("lunes 17"));
    assert!(json["reply"].as_str().unwrap().contains("mañana o por la tarde"));
    assert_eq!(json["state"], "awaiting_period_choice");

    // Period choice: three numbered afternoon slots.
    let json = chat(&app, "s1", "por la tarde").await;
    let reply = json["reply"].as_str().unwrap();
    assert!(reply.contains("(1) lunes, 17 de noviembre de 2025, 12:00"));
    assert!(reply.contains("(3)"));
    assert!(reply.contains("Elige 1-3"));
    assert_eq!(json["state"], "awaiting_period_choice");

    // "1" picks the first listed slot, never 01:00.
    let json = chat(&app, "s1", "1").await;
    let reply = json["reply"].as_str().unwrap();
    assert!(reply.contains("apunto lunes, 17 de noviembre de 2025, 12:00"));
    assert!(reply.contains("nombre y correo"));
    assert_eq!(json["state"], "awaiting_contact");

    // Contact in one message confirms the booking.
    let json = chat(&app, "s1", "Juan Pérez juan@correo.com").await;
    let reply = json["reply"].as_str().unwrap();
    assert!(reply.contains("Cita confirmada"));
    assert!(reply.contains("juan@correo.com"));
    assert_eq!(json["state"], "idle");

    assert_eq!(sent.lock().unwrap().len(), 1);
    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-17T12:00").await;
    assert_eq!(json["available"], false);
}

#[tokio::test]
async fn test_chat_rejects_closed_hours() {
    let (state, _) = test_state();
    let app = app(state);
    // 2025-12-14 is a Sunday.
    let json = chat(&app, "s1", "14/12/2025 10:00").await;
    assert!(json["reply"].as_str().unwrap().contains("no es válido"));
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_chat_explicit_datetime_creates_draft() {
    let (state, _) = test_state();
    let app = app(state);
    let json = chat(&app, "s1", "14/11 09:00").await;
    let reply = json["reply"].as_str().unwrap();
    assert!(reply.contains("tengo libre viernes, 14 de noviembre de 2025, 09:00"));
    assert_eq!(json["state"], "awaiting_contact");
}

#[tokio::test]
async fn test_chat_cancel_clears_draft() {
    let (state, _) = test_state();
    let app = app(state);
    chat(&app, "s1", "14/11 09:00").await;
    let json = chat(&app, "s1", "mejor no, olvídalo").await;
    assert!(json["reply"].as_str().unwrap().contains("cancelamos"));
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_chat_change_hour_keeps_contact_data() {
    let (state, _) = test_state();
    let app = app(state);
    chat(&app, "s1", "14/11 09:00").await;
    chat(&app, "s1", "me llamo Ana López").await;

    let json = chat(&app, "s1", "mejor a las 10:00").await;
    assert!(json["reply"]
        .as_str()
        .unwrap()
        .contains("He cambiado la hora a viernes, 14 de noviembre de 2025, 10:00"));
    assert_eq!(json["state"], "awaiting_contact");

    // Only the email is still missing.
    let json = chat(&app, "s1", "ana@correo.com").await;
    assert!(json["reply"].as_str().unwrap().contains("Cita confirmada"));

    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-14T10:00").await;
    assert_eq!(json["available"], false);
    let (_, json) = get_json(&app, "/api/availability/check?iso=2025-11-14T09:00").await;
    assert_eq!(json["available"], true);
}

#[tokio::test]
async fn test_chat_tomorrow_asks_period_then_lists() {
    let (state, _) = test_state();
    let app = app(state);

    let json = chat(&app, "s1", "quiero una cita mañana").await;
    assert!(json["reply"].as_str().unwrap().contains("Para mañana"));
    assert_eq!(json["state"], "awaiting_period_choice");

    let json = chat(&app, "s1", "temprano").await;
    let reply = json["reply"].as_str().unwrap();
    assert!(reply.contains("(1) martes, 11 de noviembre de 2025, 09:00"));
}

#[tokio::test]
async fn test_chat_number_out_of_range() {
    let (state, _) = test_state();
    let app = app(state);
    chat(&app, "s1", "lunes 17").await;
    chat(&app, "s1", "por la tarde").await;
    // A bare number is a list pick, and 9 exceeds the five afternoon slots.
    let json = chat(&app, "s1", "9").await;
    assert!(json["reply"].as_str().unwrap().contains("fuera de rango"));
}

#[tokio::test]
async fn test_chat_picked_slot_taken_in_meantime() {
    let (state, _) = test_state();
    let store = Arc::clone(&state.store);
    let app = app(state);

    chat(&app, "s1", "lunes 17").await;
    chat(&app, "s1", "por la tarde").await;

    // Another customer grabs the first offered slot.
    let slot: SlotId = "2025-11-17T12:00".parse().unwrap();
    let record = citabot::models::ReservationRecord::new("Otro", "otro@b.es", None, test_now());
    store.create_if_absent(&slot, &record).await.unwrap();

    // With the list re-derived, "1" now lands on the next free slot.
    let json = chat(&app, "s1", "1").await;
    assert!(json["reply"]
        .as_str()
        .unwrap()
        .contains("apunto lunes, 17 de noviembre de 2025, 13:00"));
}

#[tokio::test]
async fn test_chat_store_outage_keeps_draft_for_retry() {
    let store = FlakyStore::new();
    let state = injected_state(store.clone(), Box::new(MockClassifier));
    let app = app(state);

    let json = chat(&app, "s1", "14/11 09:00").await;
    assert_eq!(json["state"], "awaiting_contact");

    // The store goes down mid-dialogue; the turn must not consume the draft.
    store.failing.store(true, Ordering::SeqCst);
    let json = chat(&app, "s1", "Juan Pérez juan@correo.com").await;
    assert!(json["reply"].as_str().unwrap().contains("Inténtalo de nuevo"));
    assert_eq!(json["state"], "awaiting_contact");

    // Once the store recovers, the same utterance completes the booking.
    store.failing.store(false, Ordering::SeqCst);
    let json = chat(&app, "s1", "Juan Pérez juan@correo.com").await;
    assert!(json["reply"].as_str().unwrap().contains("Cita confirmada"));
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_chat_survives_classifier_outage() {
    let state = injected_state(FlakyStore::new(), Box::new(FailingClassifier));
    let app = app(state);
    let json = chat(&app, "s1", "hola buenas").await;
    assert!(json["reply"].as_str().unwrap().contains("lunes 17"));
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_chat_classifier_fallback() {
    let (state, _) = test_state();
    let app = app(state);
    let json = chat(&app, "s1", "algo para después del puente").await;
    assert!(json["reply"]
        .as_str()
        .unwrap()
        .contains("tengo libre lunes, 17 de noviembre de 2025, 10:00"));
    assert_eq!(json["state"], "awaiting_contact");
}

#[tokio::test]
async fn test_chat_unclear_message_gets_examples() {
    let (state, _) = test_state();
    let app = app(state);
    let json = chat(&app, "s1", "hola buenas").await;
    assert!(json["reply"].as_str().unwrap().contains("lunes 17"));
    assert_eq!(json["state"], "idle");
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let (state, _) = test_state();
    let app = app(state);
    chat(&app, "s1", "lunes 17").await;
    let json = chat(&app, "s2", "hola buenas").await;
    assert_eq!(json["state"], "idle");

    let json = chat(&app, "s1", "por la tarde").await;
    assert!(json["reply"].as_str().unwrap().contains("(1)"));
}
