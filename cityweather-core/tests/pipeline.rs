//! End-to-end fetch cycles against a mock OpenWeather server.

use std::{
    sync::{Arc, Mutex, mpsc},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path, query_param},
};

use cityweather_core::{
    AlertKind, AlertRequest, BundleStore, CacheError, CachedBundle, CitySelector, CurrentSnapshot, CycleOutcome,
    FailureKind, FixedLocation, Coordinates, ForecastStep, LocationResolver, MemoryStore,
    NotificationPermission, Notifier, NotifyError, OpenWeatherClient, PipelineOptions, ViewState,
    WeatherPipeline,
};

#[derive(Debug)]
struct RecordingNotifier {
    permission: NotificationPermission,
    sent: Mutex<Vec<AlertRequest>>,
}

impl RecordingNotifier {
    fn new(permission: NotificationPermission) -> Arc<Self> {
        Arc::new(Self { permission, sent: Mutex::new(Vec::new()) })
    }

    fn sent_kinds(&self) -> Vec<AlertKind> {
        self.sent.lock().unwrap().iter().map(|a| a.kind).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn request_permission(&self) -> NotificationPermission {
        self.permission
    }

    async fn notify(&self, alert: &AlertRequest) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(alert.clone());
        Ok(())
    }
}

/// Memory store whose first save waits until the test lets it through.
#[derive(Debug)]
struct GatedStore {
    slot: MemoryStore,
    entered: Mutex<Option<mpsc::Sender<()>>>,
    release: Mutex<Option<mpsc::Receiver<()>>>,
}

impl GatedStore {
    fn new(entered: mpsc::Sender<()>, release: mpsc::Receiver<()>) -> Arc<Self> {
        Arc::new(Self {
            slot: MemoryStore::new(),
            entered: Mutex::new(Some(entered)),
            release: Mutex::new(Some(release)),
        })
    }
}

impl BundleStore for GatedStore {
    fn save(&self, bundle: &CachedBundle) -> Result<(), CacheError> {
        let entered = self.entered.lock().unwrap().take();
        if let Some(entered) = entered {
            entered.send(()).unwrap();
            let release = self.release.lock().unwrap().take().unwrap();
            release.recv().unwrap();
        }
        self.slot.save(bundle)
    }

    fn try_load(&self) -> Result<CachedBundle, CacheError> {
        self.slot.try_load()
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.slot.clear()
    }
}

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
}

fn options() -> PipelineOptions {
    PipelineOptions { clock: fixed_now, fetch_timeout: Duration::from_secs(5), ..PipelineOptions::default() }
}

fn current_body(city: &str, temp: f64, condition: &str, wind: f64) -> serde_json::Value {
    json!({
        "name": city,
        "dt": 1717236000,
        "sys": { "country": "VN" },
        "main": { "temp": temp, "feels_like": temp, "humidity": 75, "pressure": 1005 },
        "visibility": 8000,
        "wind": { "speed": wind },
        "weather": [{ "main": condition, "description": "test conditions" }]
    })
}

/// 40 three-hourly steps starting 2024-06-01 00:00 UTC.
fn forecast_body() -> serde_json::Value {
    let start = 1717200000_i64;
    let list: Vec<_> = (0..40)
        .map(|i| {
            json!({
                "dt": start + i * 3 * 3600,
                "main": { "temp": 25.0, "temp_min": 23.6, "temp_max": 27.4 },
                "weather": [{ "main": "Clouds", "description": "overcast clouds" }]
            })
        })
        .collect();
    json!({ "city": { "name": "Hanoi", "country": "VN" }, "list": list })
}

async fn mount_city(server: &MockServer, city: &str, current: serde_json::Value, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("q", city))
        .respond_with(ResponseTemplate::new(200).set_body_json(current).set_delay(delay))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/2.5/forecast"))
        .and(query_param("q", city))
        .respond_with(ResponseTemplate::new(200).set_body_json(forecast_body()).set_delay(delay))
        .mount(server)
        .await;
}

async fn mount_position(server: &MockServer, lat: &str, lon: &str, city: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path("/data/2.5/weather"))
        .and(query_param("lat", lat))
        .and(query_param("lon", lon))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(current_body(city, 24.0, "Clear", 1.0))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

async fn mount_outage(server: &MockServer) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(server)
        .await;
}

fn client(server: &MockServer) -> Arc<OpenWeatherClient> {
    Arc::new(OpenWeatherClient::new("KEY".into(), server.uri(), Duration::from_secs(5)).unwrap())
}

fn cached_bundle() -> CachedBundle {
    let at = Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap();
    CachedBundle {
        current: CurrentSnapshot {
            city: "London".into(),
            country: "GB".into(),
            observed_at: at,
            temperature_c: 20.0,
            feels_like_c: 19.0,
            humidity_pct: 60,
            pressure_hpa: 1015,
            visibility_m: 10_000,
            wind_speed_mps: 6.0,
            condition: "Clouds".into(),
            description: "broken clouds".into(),
        },
        forecast: vec![ForecastStep {
            at,
            temperature_c: 20.0,
            temp_min_c: 18.0,
            temp_max_c: 21.0,
            condition: "Clouds".into(),
        }],
    }
}

#[tokio::test]
async fn fresh_fetch_caches_projects_and_alerts() {
    let server = MockServer::start().await;
    mount_city(&server, "Hanoi", current_body("Hanoi", 28.0, "Rain", 5.0), Duration::ZERO).await;

    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline = WeatherPipeline::new(client(&server), store.clone(), notifier.clone(), options());

    assert!(!pipeline.cold_start().await);
    assert_eq!(pipeline.state(), ViewState::Idle);

    let outcome = pipeline.refresh(CitySelector::name("Hanoi")).await;
    let CycleOutcome::Fresh { alerts } = outcome.clone() else {
        panic!("expected fresh data, got {outcome:?}");
    };
    let kinds: Vec<_> = alerts.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AlertKind::Heat, AlertKind::Rain, AlertKind::Wind]);
    assert_eq!(notifier.sent_kinds(), kinds);

    let ViewState::Ready(view) = pipeline.state() else {
        panic!("expected ready state");
    };
    assert!(!view.stale);
    assert_eq!(view.bundle.current.city, "Hanoi");
    assert_eq!(view.hourly.len(), 7);
    assert_eq!(view.daily.len(), 5);
    assert_eq!(view.daily[0].temp_min, 24);
    assert_eq!(view.daily[0].temp_max, 27);

    assert_eq!(store.load(), Some(view.bundle));
    assert_eq!(pipeline.city(), "Hanoi");
}

#[tokio::test]
async fn network_failure_falls_back_to_cache_without_alerts() {
    let server = MockServer::start().await;
    mount_outage(&server).await;

    let store = Arc::new(MemoryStore::new());
    store.save(&cached_bundle()).unwrap();
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline = WeatherPipeline::new(client(&server), store, notifier.clone(), options());

    assert!(pipeline.cold_start().await);
    assert!(matches!(pipeline.state(), ViewState::Ready(ref v) if v.stale));

    let outcome = pipeline.refresh(CitySelector::name("London")).await;
    assert_eq!(outcome, CycleOutcome::Fallback { kind: FailureKind::Network });

    let state = pipeline.state();
    let ViewState::Error { kind, last_good: Some(view) } = state.clone() else {
        panic!("expected error state with cached view, got {state:?}");
    };
    assert_eq!(kind, FailureKind::Network);
    assert_eq!(view.bundle, cached_bundle());
    assert!(view.stale);

    // The cached snapshot is over the wind threshold, yet nothing is re-sent.
    assert!(notifier.sent_kinds().is_empty());
}

#[tokio::test]
async fn failure_with_empty_cache_is_an_explicit_empty_state() {
    let server = MockServer::start().await;
    mount_outage(&server).await;

    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline =
        WeatherPipeline::new(client(&server), Arc::new(MemoryStore::new()), notifier, options());

    pipeline.cold_start().await;
    let outcome = pipeline.refresh(CitySelector::name("Atlantis")).await;

    assert_eq!(outcome, CycleOutcome::Empty { kind: FailureKind::Network });
    let state = pipeline.state();
    assert!(!state.is_loading());
    assert_eq!(state, ViewState::Error { kind: FailureKind::Network, last_good: None });
}

#[tokio::test]
async fn corrupt_cache_on_cold_start_is_treated_as_empty() {
    let server = MockServer::start().await;
    mount_outage(&server).await;

    let store = Arc::new(MemoryStore::with_raw("definitely not json"));
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline = WeatherPipeline::new(client(&server), store, notifier, options());

    assert!(!pipeline.cold_start().await);
    assert_eq!(pipeline.state(), ViewState::Idle);
    assert!(matches!(pipeline.reload().await, CycleOutcome::Empty { .. }));
}

#[tokio::test]
async fn newer_cycle_supersedes_the_one_in_flight() {
    let server = MockServer::start().await;
    mount_city(&server, "Slowtown", current_body("Slowtown", 30.0, "Clear", 1.0), Duration::from_millis(800))
        .await;
    mount_city(&server, "Hanoi", current_body("Hanoi", 22.0, "Clouds", 1.0), Duration::ZERO).await;

    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline = WeatherPipeline::new(client(&server), store.clone(), notifier.clone(), options());
    pipeline.cold_start().await;

    let slow = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.refresh(CitySelector::name("Slowtown")).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fast = pipeline.refresh(CitySelector::name("Hanoi")).await;
    assert!(matches!(fast, CycleOutcome::Fresh { ref alerts } if alerts.is_empty()));
    assert_eq!(slow.await.unwrap(), CycleOutcome::Superseded);

    assert_eq!(pipeline.city(), "Hanoi");
    let view = pipeline.state().view().cloned().unwrap();
    assert_eq!(view.bundle.current.city, "Hanoi");
    assert_eq!(store.load().unwrap().current.city, "Hanoi");
    assert!(notifier.sent_kinds().is_empty());
}

#[tokio::test]
async fn fetch_timeout_is_a_network_failure() {
    let server = MockServer::start().await;
    mount_city(&server, "Hanoi", current_body("Hanoi", 20.0, "Clear", 1.0), Duration::from_millis(500))
        .await;

    let options = PipelineOptions { fetch_timeout: Duration::from_millis(50), ..options() };
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline =
        WeatherPipeline::new(client(&server), Arc::new(MemoryStore::new()), notifier, options);

    let outcome = pipeline.refresh(CitySelector::name("Hanoi")).await;
    assert_eq!(outcome, CycleOutcome::Empty { kind: FailureKind::Network });
}

#[tokio::test]
async fn denied_notifications_still_report_alerts() {
    let server = MockServer::start().await;
    mount_city(&server, "Hanoi", current_body("Hanoi", 35.0, "Clear", 1.0), Duration::ZERO).await;

    let notifier = RecordingNotifier::new(NotificationPermission::Denied);
    let pipeline = WeatherPipeline::new(
        client(&server),
        Arc::new(MemoryStore::new()),
        notifier.clone(),
        options(),
    );
    pipeline.cold_start().await;

    let outcome = pipeline.refresh(CitySelector::name("Hanoi")).await;
    assert!(matches!(outcome, CycleOutcome::Fresh { ref alerts } if alerts.len() == 1));
    assert!(notifier.sent_kinds().is_empty());
}

#[tokio::test]
async fn located_city_replaces_the_default() {
    let server = MockServer::start().await;
    mount_position(&server, "21.03", "105.85", "Hanoi", Duration::ZERO).await;
    mount_city(&server, "Hanoi", current_body("Hanoi", 24.0, "Clear", 1.0), Duration::ZERO).await;

    let source = client(&server);
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline =
        WeatherPipeline::new(source.clone(), Arc::new(MemoryStore::new()), notifier, options());
    assert_eq!(pipeline.city(), "London");

    let here = FixedLocation(Coordinates { latitude: 21.03, longitude: 105.85 });
    let resolver = LocationResolver::new(Arc::new(here), source);

    let outcome = pipeline.locate_and_refresh(&resolver).await;
    assert!(matches!(outcome, CycleOutcome::Fresh { .. }));
    assert_eq!(pipeline.city(), "Hanoi");

    // Coordinates given directly resolve the same way.
    let outcome = pipeline.refresh(CitySelector::coordinates(21.03, 105.85)).await;
    assert!(matches!(outcome, CycleOutcome::Fresh { .. }));
    assert_eq!(pipeline.city(), "Hanoi");
}

#[tokio::test]
async fn blank_search_keeps_the_current_city() {
    let server = MockServer::start().await;
    mount_city(&server, "London", current_body("London", 18.0, "Clouds", 2.0), Duration::ZERO).await;

    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline =
        WeatherPipeline::new(client(&server), Arc::new(MemoryStore::new()), notifier, options());

    let outcome = pipeline.refresh(CitySelector::name("   ")).await;
    assert!(matches!(outcome, CycleOutcome::Fresh { .. }));
    assert_eq!(pipeline.city(), "London");
}

#[tokio::test]
async fn slow_reverse_lookup_does_not_cancel_a_later_search() {
    let server = MockServer::start().await;
    mount_position(&server, "21.03", "105.85", "Located", Duration::from_millis(300)).await;
    mount_city(&server, "Located", current_body("Located", 24.0, "Clear", 1.0), Duration::ZERO).await;
    mount_city(&server, "Newer", current_body("Newer", 20.0, "Clouds", 1.0), Duration::from_millis(600))
        .await;

    let store = Arc::new(MemoryStore::new());
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline = WeatherPipeline::new(client(&server), store.clone(), notifier, options());

    let older = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.refresh(CitySelector::coordinates(21.03, 105.85)).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let newer = pipeline.refresh(CitySelector::name("Newer")).await;
    assert!(matches!(newer, CycleOutcome::Fresh { .. }), "newer search lost: {newer:?}");
    assert_eq!(older.await.unwrap(), CycleOutcome::Superseded);

    assert_eq!(pipeline.city(), "Newer");
    assert_eq!(pipeline.state().view().unwrap().bundle.current.city, "Newer");
    assert_eq!(store.load().unwrap().current.city, "Newer");
}

#[tokio::test]
async fn slow_location_does_not_cancel_a_later_search() {
    let server = MockServer::start().await;
    mount_position(&server, "21.03", "105.85", "Located", Duration::from_millis(300)).await;
    mount_city(&server, "Located", current_body("Located", 24.0, "Clear", 1.0), Duration::ZERO).await;
    mount_city(&server, "Newer", current_body("Newer", 20.0, "Clouds", 1.0), Duration::from_millis(600))
        .await;

    let source = client(&server);
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline =
        WeatherPipeline::new(source.clone(), Arc::new(MemoryStore::new()), notifier, options());
    let here = FixedLocation(Coordinates { latitude: 21.03, longitude: 105.85 });
    let resolver = LocationResolver::new(Arc::new(here), source);

    let located = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.locate_and_refresh(&resolver).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let newer = pipeline.refresh(CitySelector::name("Newer")).await;
    assert!(matches!(newer, CycleOutcome::Fresh { .. }), "newer search lost: {newer:?}");
    assert_eq!(located.await.unwrap(), CycleOutcome::Superseded);
    assert_eq!(pipeline.city(), "Newer");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cache_matches_the_view_when_a_save_overlaps_a_newer_cycle() {
    let server = MockServer::start().await;
    mount_city(&server, "Older", current_body("Older", 20.0, "Clouds", 1.0), Duration::ZERO).await;
    mount_city(&server, "Newer", current_body("Newer", 21.0, "Clouds", 1.0), Duration::ZERO).await;

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = GatedStore::new(entered_tx, release_rx);
    let notifier = RecordingNotifier::new(NotificationPermission::Granted);
    let pipeline = WeatherPipeline::new(client(&server), store.clone(), notifier, options());

    let older = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.refresh(CitySelector::name("Older")).await })
    };
    // The older cycle is now inside its cache write.
    tokio::task::spawn_blocking(move || entered_rx.recv()).await.unwrap().unwrap();

    let newer = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.refresh(CitySelector::name("Newer")).await })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    release_tx.send(()).unwrap();

    let older = older.await.unwrap();
    let newer = newer.await.unwrap();
    assert!(matches!(older, CycleOutcome::Fresh { .. }), "older: {older:?}");
    assert!(matches!(newer, CycleOutcome::Fresh { .. }), "newer: {newer:?}");

    let shown = pipeline.state().view().unwrap().bundle.current.city.clone();
    assert_eq!(shown, "Newer");
    assert_eq!(store.load().unwrap().current.city, shown);
}
