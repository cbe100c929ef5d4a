//! Wizard step rules.
//!
//! Pure functions: given the current state, draft and raw input, decide
//! whether the input is valid and what happens next. All I/O lives in
//! [`crate::engine`].

use fanuc_models::{
    ConnectionDraft, ConnectionRequest, Draft, MachineId, NewKeyDraft, PollingDraft, ServiceDraft,
    ServiceId, State, TargetDraft, TargetId,
};

use crate::action::Action;
use crate::error::{CoreError, Result};
use crate::format::html_escape;
use crate::render::{Button, View};

/// Connection timeout used when the user skips the step.
pub const DEFAULT_TIMEOUT_MS: u32 = 5000;

/// Smallest accepted polling interval.
pub const MIN_POLL_INTERVAL_MS: u64 = 100;

/// Placeholder stored for a skipped model or series.
pub const UNKNOWN: &str = "Unknown";

const SKIP_SENTINELS: [&str; 3] = ["0", "-", "no"];

/// Whether `input` asks to skip an optional step.
pub fn is_skip(input: &str) -> bool {
    SKIP_SENTINELS
        .iter()
        .any(|s| input.eq_ignore_ascii_case(s))
}

/// What a valid submission leads to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Store the updated draft and move to `state`.
    Advance { state: State, draft: Draft },
    /// The wizard is complete.
    Finish(Finalize),
}

/// Work required to complete a wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalize {
    Target {
        name: String,
        broker: String,
        topic: String,
        /// Empty when the user skipped the key.
        key: String,
    },
    Service {
        name: String,
        base_url: String,
        api_key: String,
    },
    Connection {
        service_id: ServiceId,
        request: ConnectionRequest,
    },
    Polling {
        service_id: ServiceId,
        machine_id: MachineId,
        interval_ms: u64,
    },
    NewKey {
        target_id: TargetId,
        key: String,
    },
}

fn required(input: &str, what: &str) -> Result<String> {
    if input.is_empty() {
        return Err(CoreError::Validation(format!("{} cannot be empty.", what)));
    }
    Ok(input.to_string())
}

fn optional_or(input: &str, default: &str) -> String {
    if is_skip(input) {
        default.to_string()
    } else {
        input.to_string()
    }
}

fn parse_timeout(input: &str) -> Result<u32> {
    if is_skip(input) {
        return Ok(DEFAULT_TIMEOUT_MS);
    }
    input.parse::<u32>().map_err(|_| {
        CoreError::Validation(
            "Enter a whole number of milliseconds, or '-' for the default (5000 ms).".to_string(),
        )
    })
}

fn parse_interval(input: &str) -> Result<u64> {
    match input.parse::<u64>() {
        Ok(ms) if ms >= MIN_POLL_INTERVAL_MS => Ok(ms),
        _ => Err(CoreError::Validation(format!(
            "Enter a valid number of milliseconds (at least {}).",
            MIN_POLL_INTERVAL_MS
        ))),
    }
}

fn advance(state: State, draft: Draft) -> Result<Step> {
    Ok(Step::Advance {
        state: state.next(),
        draft,
    })
}

/// Applies one submission to the wizard at `state`.
///
/// `raw` is trimmed first. Validation failures leave the caller's state
/// untouched; a state without a matching draft is reported as corrupt.
pub fn apply(state: State, draft: Draft, raw: &str) -> Result<Step> {
    let input = raw.trim();

    match (state, draft) {
        (State::WaitingName, Draft::Target(mut d)) => {
            d.name = required(input, "Name")?;
            advance(state, Draft::Target(d))
        }
        (State::WaitingBroker, Draft::Target(mut d)) => {
            d.broker = required(input, "Broker address")?;
            advance(state, Draft::Target(d))
        }
        (State::WaitingTopic, Draft::Target(mut d)) => {
            d.topic = required(input, "Topic")?;
            advance(state, Draft::Target(d))
        }
        (State::WaitingKey, Draft::Target(d)) => {
            let key = optional_or(&required(input, "Key")?, "");
            Ok(Step::Finish(Finalize::Target {
                name: d.name,
                broker: d.broker,
                topic: d.topic,
                key,
            }))
        }

        (State::WaitingSvcName, Draft::Service(mut d)) => {
            d.name = required(input, "Name")?;
            advance(state, Draft::Service(d))
        }
        (State::WaitingSvcHost, Draft::Service(mut d)) => {
            d.host = required(input, "Host")?;
            advance(state, Draft::Service(d))
        }
        (State::WaitingSvcKey, Draft::Service(d)) => Ok(Step::Finish(Finalize::Service {
            name: d.name,
            base_url: d.host,
            api_key: required(input, "API key")?,
        })),

        (State::WaitingConnEndpoint, Draft::Connection(mut d)) => {
            d.endpoint = required(input, "Endpoint")?;
            advance(state, Draft::Connection(d))
        }
        (State::WaitingConnTimeout, Draft::Connection(mut d)) => {
            d.timeout_ms = parse_timeout(&required(input, "Timeout")?)?;
            advance(state, Draft::Connection(d))
        }
        (State::WaitingConnModel, Draft::Connection(mut d)) => {
            d.model = optional_or(&required(input, "Model")?, UNKNOWN);
            advance(state, Draft::Connection(d))
        }
        (State::WaitingConnSeries, Draft::Connection(d)) => {
            let series = optional_or(&required(input, "Series")?, UNKNOWN);
            Ok(Step::Finish(Finalize::Connection {
                service_id: d.service_id,
                request: ConnectionRequest {
                    endpoint: d.endpoint,
                    timeout: d.timeout_ms,
                    model: d.model,
                    series,
                },
            }))
        }

        (State::WaitingPollInterval, Draft::Polling(d)) => {
            let interval_ms = parse_interval(input)?;
            Ok(Step::Finish(Finalize::Polling {
                service_id: d.service_id,
                machine_id: d.machine_id,
                interval_ms,
            }))
        }

        (State::WaitingNewKey, Draft::NewKey(d)) => Ok(Step::Finish(Finalize::NewKey {
            target_id: d.target_id,
            key: required(input, "Key")?,
        })),

        (state, draft) => Err(CoreError::Corrupt(format!(
            "state {} does not accept draft {:?}",
            state,
            draft.kind()
        ))),
    }
}

fn cancel_row() -> Vec<Button> {
    vec![Button::new("🚫 Cancel", Action::CancelWizard)]
}

fn prompt_text(state: State, draft: &Draft) -> String {
    match state {
        State::WaitingName => "🖊 <b>Step 1/4: Name</b>\n\nEnter a name for this Kafka target (e.g. 'Lathe 1'):".to_string(),
        State::WaitingBroker => "🔌 <b>Step 2/4: Broker</b>\n\nEnter the broker address (IP:PORT):".to_string(),
        State::WaitingTopic => "📝 <b>Step 3/4: Topic</b>\n\nEnter the Kafka topic name:".to_string(),
        State::WaitingKey => "🔑 <b>Step 4/4: Key (optional)</b>\n\nEnter a Kafka message key (e.g. the machine IP), or send '0', '-' or 'no' to read the latest message of any key:".to_string(),

        State::WaitingSvcName => "🖊 <b>Step 1/3: Service name</b>\n\nEnter a name (e.g. 'Main workshop'):".to_string(),
        State::WaitingSvcHost => "🔗 <b>Step 2/3: Host (IP:PORT)</b>\n\nEnter the service address (http:// is optional):".to_string(),
        State::WaitingSvcKey => "🔐 <b>Step 3/3: API key</b>\n\nEnter the service access key:".to_string(),

        State::WaitingConnEndpoint => "🔌 <b>Step 1/4: Endpoint</b>\n\nEnter the machine IP and port (e.g. 192.168.1.10:8193):".to_string(),
        State::WaitingConnTimeout => format!(
            "⏱ <b>Step 2/4: Timeout (ms)</b>\n\nEnter the connection timeout.\nSend '0' or '-' for the default ({} ms).",
            DEFAULT_TIMEOUT_MS
        ),
        State::WaitingConnModel => "🤖 <b>Step 3/4: Model</b>\n\nEnter the controller model.\nSend '0' or '-' for 'Unknown'.".to_string(),
        State::WaitingConnSeries => "🔢 <b>Step 4/4: Series</b>\n\nEnter the controller series (0i, 30i, 31i).\nSend '0' or '-' for 'Unknown'.".to_string(),

        State::WaitingPollInterval => {
            let machine = match draft {
                Draft::Polling(PollingDraft { machine_id, .. }) => {
                    format!(" for <code>{}</code>", html_escape(machine_id.as_str()))
                }
                _ => String::new(),
            };
            format!(
                "⏱ <b>Polling setup</b>{}\n\nEnter the polling interval in milliseconds (at least {}):",
                machine, MIN_POLL_INTERVAL_MS
            )
        }
        State::WaitingNewKey => "🔑 <b>New key</b>\n\nEnter the message key to filter on:".to_string(),

        State::Idle | State::Unknown => String::new(),
    }
}

/// The prompt shown when entering `state`.
pub fn prompt(state: State, draft: &Draft) -> View {
    View::inline(prompt_text(state, draft), vec![cancel_row()])
}

/// The prompt shown again after a rejected submission.
pub fn reprompt(state: State, draft: &Draft, reason: &str) -> View {
    View::inline(
        format!("⚠️ {}\n\n{}", html_escape(reason), prompt_text(state, draft)),
        vec![cancel_row()],
    )
}

/// Fresh draft for a wizard started with the given context.
pub fn target_draft() -> Draft {
    Draft::Target(TargetDraft::default())
}

pub fn service_draft() -> Draft {
    Draft::Service(ServiceDraft::default())
}

pub fn connection_draft(service_id: ServiceId) -> Draft {
    Draft::Connection(ConnectionDraft {
        service_id,
        endpoint: String::new(),
        timeout_ms: DEFAULT_TIMEOUT_MS,
        model: String::new(),
    })
}

pub fn polling_draft(service_id: ServiceId, machine_id: MachineId) -> Draft {
    Draft::Polling(PollingDraft {
        service_id,
        machine_id,
    })
}

pub fn new_key_draft(target_id: TargetId) -> Draft {
    Draft::NewKey(NewKeyDraft { target_id })
}
