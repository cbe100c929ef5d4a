//! Per-user session record and wizard state machine types.
//!
//! A [`UserSession`] stores exactly one [`State`] and one [`Draft`]. The
//! draft is a tagged union per wizard kind, so a wizard can only ever read
//! the fields it wrote itself. Context references (service, machine, target)
//! travel inside the draft variant of the wizard that needs them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::ids::{MachineId, ServiceId, TargetId, UserId};

/// The kinds of multi-step wizards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WizardKind {
    /// Kafka target registration.
    Target,
    /// Fanuc service registration.
    Service,
    /// Remote machine connection.
    Connection,
    /// Remote polling start.
    Polling,
    /// Key addition to an existing target.
    NewKey,
}

impl WizardKind {
    /// First waiting state of this wizard.
    pub fn first_state(self) -> State {
        match self {
            WizardKind::Target => State::WaitingName,
            WizardKind::Service => State::WaitingSvcName,
            WizardKind::Connection => State::WaitingConnEndpoint,
            WizardKind::Polling => State::WaitingPollInterval,
            WizardKind::NewKey => State::WaitingNewKey,
        }
    }

    /// Whether the final step persists a local record (as opposed to a remote call).
    pub fn persists_locally(self) -> bool {
        matches!(self, WizardKind::Target | WizardKind::Service | WizardKind::NewKey)
    }
}

/// Current FSM position of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum State {
    #[default]
    Idle,

    WaitingName,
    WaitingBroker,
    WaitingTopic,
    WaitingKey,

    WaitingSvcName,
    WaitingSvcHost,
    WaitingSvcKey,

    WaitingConnEndpoint,
    WaitingConnTimeout,
    WaitingConnModel,
    WaitingConnSeries,

    WaitingPollInterval,

    WaitingNewKey,

    /// A stored value this build does not recognise.
    #[serde(other)]
    Unknown,
}

impl State {
    /// Whether the user is outside of any wizard.
    pub fn is_idle(self) -> bool {
        self == State::Idle
    }

    /// The wizard this state belongs to.
    pub fn kind(self) -> Option<WizardKind> {
        match self {
            State::WaitingName | State::WaitingBroker | State::WaitingTopic | State::WaitingKey => {
                Some(WizardKind::Target)
            }
            State::WaitingSvcName | State::WaitingSvcHost | State::WaitingSvcKey => {
                Some(WizardKind::Service)
            }
            State::WaitingConnEndpoint
            | State::WaitingConnTimeout
            | State::WaitingConnModel
            | State::WaitingConnSeries => Some(WizardKind::Connection),
            State::WaitingPollInterval => Some(WizardKind::Polling),
            State::WaitingNewKey => Some(WizardKind::NewKey),
            State::Idle | State::Unknown => None,
        }
    }

    /// Transition table: the state reached after a valid submission.
    ///
    /// `Idle` after a waiting state means the step is the wizard's final one.
    pub fn next(self) -> State {
        match self {
            State::WaitingName => State::WaitingBroker,
            State::WaitingBroker => State::WaitingTopic,
            State::WaitingTopic => State::WaitingKey,
            State::WaitingKey => State::Idle,

            State::WaitingSvcName => State::WaitingSvcHost,
            State::WaitingSvcHost => State::WaitingSvcKey,
            State::WaitingSvcKey => State::Idle,

            State::WaitingConnEndpoint => State::WaitingConnTimeout,
            State::WaitingConnTimeout => State::WaitingConnModel,
            State::WaitingConnModel => State::WaitingConnSeries,
            State::WaitingConnSeries => State::Idle,

            State::WaitingPollInterval => State::Idle,
            State::WaitingNewKey => State::Idle,

            State::Idle | State::Unknown => State::Idle,
        }
    }

    /// Whether a valid submission in this state completes the wizard.
    pub fn is_final_step(self) -> bool {
        self.kind().is_some() && self.next() == State::Idle
    }

    /// Stable snake_case name, used in logs and the profile view.
    pub fn as_str(self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::WaitingName => "waiting_name",
            State::WaitingBroker => "waiting_broker",
            State::WaitingTopic => "waiting_topic",
            State::WaitingKey => "waiting_key",
            State::WaitingSvcName => "waiting_svc_name",
            State::WaitingSvcHost => "waiting_svc_host",
            State::WaitingSvcKey => "waiting_svc_key",
            State::WaitingConnEndpoint => "waiting_conn_endpoint",
            State::WaitingConnTimeout => "waiting_conn_timeout",
            State::WaitingConnModel => "waiting_conn_model",
            State::WaitingConnSeries => "waiting_conn_series",
            State::WaitingPollInterval => "waiting_poll_interval",
            State::WaitingNewKey => "waiting_new_key",
            State::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields entered so far in the Kafka target wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TargetDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub broker: String,
    #[serde(default)]
    pub topic: String,
}

/// Fields entered so far in the service wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServiceDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub host: String,
}

/// Fields entered so far in the connection wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDraft {
    /// Service the machine is registered against.
    pub service_id: ServiceId,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub timeout_ms: u32,
    #[serde(default)]
    pub model: String,
}

/// Context of the polling wizard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingDraft {
    pub service_id: ServiceId,
    pub machine_id: MachineId,
}

/// Context of the key-addition flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewKeyDraft {
    pub target_id: TargetId,
}

/// In-progress wizard data, one variant per wizard kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Draft {
    Target(TargetDraft),
    Service(ServiceDraft),
    Connection(ConnectionDraft),
    Polling(PollingDraft),
    NewKey(NewKeyDraft),
    /// No wizard data. Also the fallback for unrecognised stored variants.
    #[default]
    #[serde(other)]
    Empty,
}

impl Draft {
    /// The wizard this draft belongs to.
    pub fn kind(&self) -> Option<WizardKind> {
        match self {
            Draft::Empty => None,
            Draft::Target(_) => Some(WizardKind::Target),
            Draft::Service(_) => Some(WizardKind::Service),
            Draft::Connection(_) => Some(WizardKind::Connection),
            Draft::Polling(_) => Some(WizardKind::Polling),
            Draft::NewKey(_) => Some(WizardKind::NewKey),
        }
    }
}

/// A chat user's persisted session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    /// Telegram user id.
    pub user_id: UserId,
    /// Display name captured at the last interaction.
    #[serde(default)]
    pub display_name: String,
    /// Current FSM position.
    #[serde(default)]
    pub state: State,
    /// In-progress wizard data. An unreadable value loads as `Empty`.
    #[serde(default, deserialize_with = "lenient_draft")]
    pub draft: Draft,
    /// When the user first interacted with the bot.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

/// Decodes a stored draft, falling back to `Empty` when it has a known kind
/// but unusable fields. The session then fails `is_consistent` and gets reset.
fn lenient_draft<'de, D>(deserializer: D) -> Result<Draft, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Draft(Draft),
        Unreadable(serde::de::IgnoredAny),
    }

    Ok(match Stored::deserialize(deserializer)? {
        Stored::Draft(draft) => draft,
        Stored::Unreadable(_) => Draft::Empty,
    })
}

impl UserSession {
    /// Creates an idle session.
    pub fn new(user_id: UserId, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            display_name: display_name.into(),
            state: State::Idle,
            draft: Draft::Empty,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `state` and `draft` describe the same wizard.
    ///
    /// An idle session must carry an empty draft; a waiting state must carry
    /// the draft variant of its own wizard.
    pub fn is_consistent(&self) -> bool {
        self.state != State::Unknown && self.state.kind() == self.draft.kind()
    }
}
