//! Shared fakes for the engine integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tempfile::TempDir;

use fanuc_adapters::{AdapterError, KafkaFetch, KafkaRecord, MachineControl};
use fanuc_core::{Backends, RenderError, Renderer, View};
use fanuc_models::{
    ConnectionRequest, FanucService, Machine, MachineId, MachineMode, MachineStatus,
};
use fanuc_persistence::JsonStore;

/// One thing the engine sent to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    Prompt(View),
    Edit(View),
    Notice(String),
    Document { name: String, caption: String, body: String },
}

impl Rendered {
    pub fn text(&self) -> &str {
        match self {
            Rendered::Prompt(v) | Rendered::Edit(v) => &v.text,
            Rendered::Notice(t) => t,
            Rendered::Document { caption, .. } => caption,
        }
    }
}

/// Records everything rendered; edits can be made to fail.
#[derive(Default)]
pub struct RecordingRenderer {
    events: Mutex<Vec<Rendered>>,
    edit_error: Mutex<Option<RenderError>>,
}

impl RecordingRenderer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Rendered> {
        self.events.lock().unwrap().clone()
    }

    pub fn edits(&self) -> Vec<View> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Rendered::Edit(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> String {
        self.events()
            .last()
            .map(|e| e.text().to_string())
            .unwrap_or_default()
    }

    pub fn all_text(&self) -> String {
        self.events()
            .iter()
            .map(|e| e.text().to_string())
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn fail_edits_with(&self, err: RenderError) {
        *self.edit_error.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl Renderer for RecordingRenderer {
    async fn show_prompt(&self, view: View) -> Result<(), RenderError> {
        self.events.lock().unwrap().push(Rendered::Prompt(view));
        Ok(())
    }

    async fn edit_current(&self, view: View) -> Result<(), RenderError> {
        if let Some(err) = self.edit_error.lock().unwrap().clone() {
            return Err(err);
        }
        self.events.lock().unwrap().push(Rendered::Edit(view));
        Ok(())
    }

    async fn notify(&self, text: &str) -> Result<(), RenderError> {
        self.events
            .lock()
            .unwrap()
            .push(Rendered::Notice(text.to_string()));
        Ok(())
    }

    async fn send_document(
        &self,
        file_name: &str,
        contents: Vec<u8>,
        caption: &str,
    ) -> Result<(), RenderError> {
        self.events.lock().unwrap().push(Rendered::Document {
            name: file_name.to_string(),
            caption: caption.to_string(),
            body: String::from_utf8_lossy(&contents).into_owned(),
        });
        Ok(())
    }
}

/// Scripted Kafka reply.
#[derive(Debug, Clone)]
pub enum KafkaReply {
    Record(Option<String>, String),
    NotFound,
    Unavailable(String),
}

/// Plays scripted replies in order, repeating the last one.
#[derive(Default)]
pub struct FakeKafka {
    replies: Mutex<VecDeque<KafkaReply>>,
    calls: AtomicUsize,
}

impl FakeKafka {
    pub fn new(replies: Vec<KafkaReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set(&self, reply: KafkaReply) {
        let mut replies = self.replies.lock().unwrap();
        replies.clear();
        replies.push_back(reply);
    }
}

#[async_trait]
impl KafkaFetch for FakeKafka {
    async fn get_last_message(
        &self,
        _broker: &str,
        _topic: &str,
        _key_filter: Option<&str>,
    ) -> fanuc_adapters::Result<KafkaRecord> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front()
            } else {
                replies.front().cloned()
            }
        };
        match reply {
            Some(KafkaReply::Record(key, value)) => Ok(KafkaRecord { key, value }),
            Some(KafkaReply::Unavailable(reason)) => Err(AdapterError::Unavailable(reason)),
            Some(KafkaReply::NotFound) | None => {
                Err(AdapterError::NotFound("no messages".to_string()))
            }
        }
    }
}

/// In-memory machine control API.
#[derive(Default)]
pub struct FakeMachines {
    pub machines: Mutex<Vec<Machine>>,
    pub created: Mutex<Vec<ConnectionRequest>>,
    pub polling: Mutex<Vec<(MachineId, u64)>>,
    pub down: Mutex<Option<String>>,
    pub program: Mutex<String>,
}

impl FakeMachines {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_machine(self: Arc<Self>, id: &str) -> Arc<Self> {
        self.machines.lock().unwrap().push(machine(id));
        self
    }

    pub fn go_down(&self, reason: &str) {
        *self.down.lock().unwrap() = Some(reason.to_string());
    }

    fn check(&self) -> fanuc_adapters::Result<()> {
        match self.down.lock().unwrap().clone() {
            Some(reason) => Err(AdapterError::Unavailable(reason)),
            None => Ok(()),
        }
    }

    fn find(&self, id: &MachineId) -> fanuc_adapters::Result<Machine> {
        self.machines
            .lock()
            .unwrap()
            .iter()
            .find(|m| &m.id == id)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(format!("machine {}", id)))
    }
}

pub fn machine(id: &str) -> Machine {
    Machine {
        id: MachineId::new(id),
        endpoint: "192.168.1.10:8193".to_string(),
        timeout: 5000,
        model: "0i-F".to_string(),
        series: "0i".to_string(),
        status: MachineStatus::Connected,
        mode: MachineMode::Static,
        interval: 0,
    }
}

#[async_trait]
impl MachineControl for FakeMachines {
    async fn list_machines(&self, _service: &FanucService) -> fanuc_adapters::Result<Vec<Machine>> {
        self.check()?;
        Ok(self.machines.lock().unwrap().clone())
    }

    async fn get_machine(
        &self,
        _service: &FanucService,
        id: &MachineId,
    ) -> fanuc_adapters::Result<Machine> {
        self.check()?;
        self.find(id)
    }

    async fn create_machine(
        &self,
        _service: &FanucService,
        request: &ConnectionRequest,
    ) -> fanuc_adapters::Result<Machine> {
        self.check()?;
        self.created.lock().unwrap().push(request.clone());
        let mut created = machine(&format!("m-{}", self.created.lock().unwrap().len()));
        created.endpoint = request.endpoint.clone();
        created.model = request.model.clone();
        created.series = request.series.clone();
        created.timeout = request.timeout;
        self.machines.lock().unwrap().push(created.clone());
        Ok(created)
    }

    async fn delete_machine(
        &self,
        _service: &FanucService,
        id: &MachineId,
    ) -> fanuc_adapters::Result<()> {
        self.check()?;
        self.find(id)?;
        self.machines.lock().unwrap().retain(|m| &m.id != id);
        Ok(())
    }

    async fn start_polling(
        &self,
        _service: &FanucService,
        id: &MachineId,
        interval_ms: u64,
    ) -> fanuc_adapters::Result<()> {
        self.check()?;
        self.find(id)?;
        self.polling.lock().unwrap().push((id.clone(), interval_ms));
        Ok(())
    }

    async fn stop_polling(
        &self,
        _service: &FanucService,
        id: &MachineId,
    ) -> fanuc_adapters::Result<()> {
        self.check()?;
        self.find(id)?;
        Ok(())
    }

    async fn get_program_text(
        &self,
        _service: &FanucService,
        id: &MachineId,
    ) -> fanuc_adapters::Result<String> {
        self.check()?;
        self.find(id)?;
        Ok(self.program.lock().unwrap().clone())
    }
}

/// A JSON store in a fresh temp dir plus the fakes, wired as [`Backends`].
pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<JsonStore>,
    pub kafka: Arc<FakeKafka>,
    pub machines: Arc<FakeMachines>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonStore::open(dir.path().join("store.json")).unwrap());
        Self {
            dir,
            store,
            kafka: FakeKafka::new(vec![KafkaReply::NotFound]),
            machines: FakeMachines::new(),
        }
    }

    pub fn backends(&self) -> Backends {
        Backends {
            state: self.store.clone(),
            targets: self.store.clone(),
            services: self.store.clone(),
            kafka: self.kafka.clone(),
            machines: self.machines.clone(),
        }
    }
}
