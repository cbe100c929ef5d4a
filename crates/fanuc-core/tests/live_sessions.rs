//! Live session behaviour under a paused clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;

use common::{FakeKafka, Harness, KafkaReply, RecordingRenderer};
use fanuc_adapters::{KafkaFetch, KafkaRecord};
use fanuc_core::{
    Action, Dispatcher, LiveConfig, LiveSessionManager, Monitoring, RenderError, Renderer,
    SessionRegistry, View,
};
use fanuc_models::{KeyId, MonitoringKey, MonitoringTarget, NewTarget, TargetId, UserId};
use fanuc_persistence::TargetStore;

const USER: UserId = UserId(42);
const PERIOD: Duration = Duration::from_millis(1500);

fn target() -> MonitoringTarget {
    MonitoringTarget {
        id: TargetId(1),
        user_id: USER,
        name: "CNC1".into(),
        broker: "10.0.0.5:9092".into(),
        topic: "telemetry".into(),
        keys: vec![key()],
        created_at: Utc::now(),
    }
}

fn key() -> MonitoringKey {
    MonitoringKey {
        id: KeyId(2),
        target_id: TargetId(1),
        key: "m-7".into(),
    }
}

fn manager(h: &Harness, kafka: Arc<dyn KafkaFetch>) -> LiveSessionManager {
    LiveSessionManager::new(
        Arc::new(SessionRegistry::new()),
        Monitoring::new(h.store.clone(), kafka),
        LiveConfig::default(),
    )
}

fn record(value: &str) -> KafkaReply {
    KafkaReply::Record(Some("m-7".into()), value.into())
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_then_first_frame() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record(r#"{"spindle":1200}"#)]);
    let live = manager(&h, kafka.clone());
    let renderer = RecordingRenderer::new();

    live.start_live(USER, target(), Some(key()), renderer.clone())
        .await
        .unwrap();
    let edits = renderer.edits();
    assert_eq!(edits.len(), 1);
    assert!(edits[0].text.contains("LIVE: CNC1 [m-7]"));
    assert!(edits[0].text.contains("Connecting..."));
    assert_eq!(
        edits[0].actions(),
        vec![&Action::StopLive(TargetId(1), Some(KeyId(2)))]
    );

    sleep(Duration::from_millis(10)).await;

    let edits = renderer.edits();
    assert_eq!(edits.len(), 2);
    assert!(edits[1].text.contains("Updated: "));
    assert!(edits[1].text.contains("&quot;spindle&quot;: 1200"));
    live.stop_live(USER).await;
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_payload_is_not_rendered_again() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record(r#"{"a":1}"#)]);
    let live = manager(&h, kafka.clone());
    let renderer = RecordingRenderer::new();

    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    sleep(PERIOD * 3 + Duration::from_millis(10)).await;

    assert!(kafka.calls() >= 4);
    assert_eq!(renderer.edits().len(), 2);

    kafka.set(record(r#"{"a":2}"#));
    sleep(PERIOD).await;

    let edits = renderer.edits();
    assert_eq!(edits.len(), 3);
    assert!(edits[2].text.contains("&quot;a&quot;: 2"));
    live.stop_live(USER).await;
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_first_fetch_shows_error_and_keeps_ticking() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![KafkaReply::Unavailable("broker down".into())]);
    let live = manager(&h, kafka.clone());
    let renderer = RecordingRenderer::new();

    live.start_live(USER, target(), Some(key()), renderer.clone())
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;

    let frame = renderer.edits()[1].text.clone();
    assert!(frame.contains("LIVE: CNC1 [m-7]"));
    assert!(frame.contains("Updated: "));
    assert!(frame.contains("❌"));
    assert!(frame.contains("broker down"));

    let calls = kafka.calls();
    sleep(PERIOD * 2).await;
    assert!(kafka.calls() >= calls + 2);
    assert!(live.is_live(USER).await);
    live.stop_live(USER).await;
}

#[tokio::test(start_paused = true)]
async fn test_second_start_replaces_first_session() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record("1"), record("2"), record("3"), record("4")]);
    let live = manager(&h, kafka.clone());
    let first = RecordingRenderer::new();
    let second = RecordingRenderer::new();

    live.start_live(USER, target(), None, first.clone())
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    live.start_live(USER, target(), Some(key()), second.clone())
        .await
        .unwrap();

    let frozen = first.edits().len();
    sleep(PERIOD * 3).await;

    assert_eq!(first.edits().len(), frozen);
    assert!(second.edits().len() >= 2);
    assert_eq!(live.registry().active_count().await, 1);
    live.stop_live(USER).await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_live_halts_the_loop() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record("1")]);
    let live = manager(&h, kafka.clone());
    let renderer = RecordingRenderer::new();

    assert!(!live.stop_live(USER).await);
    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    assert!(live.stop_live(USER).await);

    let calls = kafka.calls();
    sleep(PERIOD * 4).await;
    assert_eq!(kafka.calls(), calls);
    assert!(!live.is_live(USER).await);
}

#[tokio::test(start_paused = true)]
async fn test_gone_message_ends_session() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record("1")]);
    let live = manager(&h, kafka.clone());
    let renderer = RecordingRenderer::new();

    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    renderer.fail_edits_with(RenderError::TargetGone("message to edit not found".into()));
    sleep(Duration::from_millis(10)).await;

    assert!(!live.is_live(USER).await);
    let calls = kafka.calls();
    sleep(PERIOD * 2).await;
    assert_eq!(kafka.calls(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_keeps_session_alive() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record("1")]);
    let live = manager(&h, kafka.clone());
    let renderer = RecordingRenderer::new();

    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    renderer.fail_edits_with(RenderError::Transport("Too Many Requests".into()));
    sleep(PERIOD * 2 + Duration::from_millis(10)).await;

    assert!(live.is_live(USER).await);
    assert!(kafka.calls() >= 3);
    live.stop_live(USER).await;
}

/// Records edits when they land; live frames take a second to land.
#[derive(Default)]
struct SlowFrames {
    landed: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl Renderer for SlowFrames {
    async fn show_prompt(&self, _view: View) -> Result<(), RenderError> {
        Ok(())
    }

    async fn edit_current(&self, view: View) -> Result<(), RenderError> {
        if view.text.contains("Updated: ") {
            sleep(Duration::from_secs(1)).await;
        }
        self.landed.lock().unwrap().push(view.text);
        Ok(())
    }

    async fn notify(&self, _text: &str) -> Result<(), RenderError> {
        Ok(())
    }

    async fn send_document(
        &self,
        _file_name: &str,
        _contents: Vec<u8>,
        _caption: &str,
    ) -> Result<(), RenderError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_frame_in_flight_lands_before_new_placeholder() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record("1")]);
    let live = manager(&h, kafka.clone());
    let renderer = Arc::new(SlowFrames::default());

    live.start_live(USER, target(), Some(key()), renderer.clone())
        .await
        .unwrap();
    // first frame of the keyed session is now on the wire
    sleep(Duration::from_millis(10)).await;
    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    sleep(PERIOD * 3).await;
    live.stop_live(USER).await;

    let landed = renderer.landed.lock().unwrap().clone();
    let restart = landed
        .iter()
        .rposition(|text| text.contains("Connecting..."))
        .unwrap();
    assert!(landed[restart].contains("[Default]"));
    assert!(landed[..restart].iter().any(|text| text.contains("Updated: ")));
    assert!(landed[restart..].iter().all(|text| !text.contains("[m-7]")));
}

#[tokio::test(start_paused = true)]
async fn test_stop_live_waits_for_frame_in_flight() {
    let h = Harness::new();
    let kafka = FakeKafka::new(vec![record("1")]);
    let live = manager(&h, kafka.clone());
    let renderer = Arc::new(SlowFrames::default());

    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    sleep(Duration::from_millis(10)).await;
    assert!(live.stop_live(USER).await);

    // the frame finished drawing before stop returned, and nothing follows it
    let landed = renderer.landed.lock().unwrap().len();
    assert_eq!(landed, 2);
    sleep(PERIOD * 3).await;
    assert_eq!(renderer.landed.lock().unwrap().len(), landed);
}

struct StalledKafka;

#[async_trait]
impl KafkaFetch for StalledKafka {
    async fn get_last_message(
        &self,
        _broker: &str,
        _topic: &str,
        _key_filter: Option<&str>,
    ) -> fanuc_adapters::Result<KafkaRecord> {
        sleep(Duration::from_secs(60)).await;
        Ok(KafkaRecord {
            key: None,
            value: "late".into(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out() {
    let h = Harness::new();
    let live = manager(&h, Arc::new(StalledKafka));
    let renderer = RecordingRenderer::new();

    live.start_live(USER, target(), None, renderer.clone())
        .await
        .unwrap();
    sleep(Duration::from_millis(5010)).await;

    let edits = renderer.edits();
    assert_eq!(edits.len(), 2);
    assert!(edits[1].text.contains("no answer within 5000 ms"));
    live.stop_live(USER).await;
}

#[tokio::test(start_paused = true)]
async fn test_live_action_resolves_target_through_dispatcher() {
    let h = Harness::new();
    h.kafka.set(record(r#"{"mode":"AUTO"}"#));
    let target_id = h
        .store
        .add_target(NewTarget {
            user_id: USER,
            name: "CNC1".into(),
            broker: "10.0.0.5:9092".into(),
            topic: "telemetry".into(),
            key: String::new(),
        })
        .await
        .unwrap();
    let dispatcher = Dispatcher::new(h.backends(), LiveConfig::default());
    let renderer = RecordingRenderer::new();

    dispatcher
        .on_action(USER, Action::LiveMode(target_id, None), renderer.clone())
        .await;
    sleep(Duration::from_millis(10)).await;
    assert!(dispatcher.live().is_live(USER).await);
    assert!(renderer.last_text().contains("LIVE: CNC1 [Default]"));

    dispatcher
        .on_action(USER, Action::StopLive(target_id, None), renderer.clone())
        .await;
    assert!(!dispatcher.live().is_live(USER).await);
    assert!(renderer.last_text().contains("default view"));
}
