//! Screen builders.

use fanuc_models::{
    FanucService, KeyId, Machine, MachineId, MonitoringKey, MonitoringTarget, ServiceId, TargetId,
    UserSession,
};

use crate::action::Action;
use crate::format::{html_escape, payload_block};
use crate::render::{Button, View};

/// Reply-keyboard labels. They work even while a wizard is active.
pub const MENU_KAFKA: &str = "📋 Kafka Reader";
pub const MENU_SERVICES: &str = "🌐 API Services";
pub const MENU_PROFILE: &str = "👤 Profile";
pub const MENU_HOME: &str = "🏠 Home";

/// Reply-keyboard layout, row by row.
pub const REPLY_MENU: [[&str; 2]; 2] = [[MENU_KAFKA, MENU_SERVICES], [MENU_PROFILE, MENU_HOME]];

/// Character limit for one-shot message checks.
pub const CHECK_PAYLOAD_LIMIT: usize = 3800;

/// Character limit for live frames.
pub const LIVE_PAYLOAD_LIMIT: usize = 3500;

/// Maps a reply-keyboard label to the action it stands for.
pub fn menu_action(text: &str) -> Option<Action> {
    match text.trim() {
        MENU_KAFKA => Some(Action::TargetsList),
        MENU_SERVICES => Some(Action::ServicesList),
        MENU_PROFILE => Some(Action::WhoAmI),
        MENU_HOME => Some(Action::Home),
        _ => None,
    }
}

fn home_row() -> Vec<Button> {
    vec![Button::new("🏠 Home", Action::Home)]
}

fn key_label(key: Option<&MonitoringKey>) -> String {
    match key {
        Some(k) => html_escape(&k.key),
        None => "Default".to_string(),
    }
}

fn key_id(key: Option<&MonitoringKey>) -> Option<KeyId> {
    key.map(|k| k.id)
}

/// Greeting sent on `/start`, installing the reply keyboard.
pub fn welcome() -> View {
    View::with_reply_menu("👋 <b>Fanuc Client</b>\n\nUse the keyboard below or the buttons to navigate.")
}

pub fn home() -> View {
    View::inline(
        "🏠 <b>Main menu</b>",
        vec![
            vec![Button::new(MENU_KAFKA, Action::TargetsList)],
            vec![Button::new(MENU_SERVICES, Action::ServicesList)],
            vec![Button::new(MENU_PROFILE, Action::WhoAmI)],
        ],
    )
}

pub fn help() -> View {
    View::inline(
        "ℹ️ <b>Fanuc Client</b>\n\n\
         /start – main menu\n\
         /kafka – Kafka targets\n\
         /services – Fanuc API services\n\
         /profile – your profile\n\
         /cancel – abort the current input\n\n\
         Kafka targets read the newest telemetry message of a topic, once or live. \
         API services manage machine connections, polling and programs.",
        vec![home_row()],
    )
}

/// Reply to free text while no wizard is active.
pub fn not_understood() -> View {
    View::with_reply_menu("🤔 I don't understand. Use the menu or press /start.")
}

pub fn profile(session: &UserSession, targets: usize, services: usize) -> View {
    View::inline(
        format!(
            "👤 <b>Profile</b>\n\n\
             🆔 ID: <code>{}</code>\n\
             📛 Name: <b>{}</b>\n\
             🏷 State: <code>{}</code>\n\n\
             📋 Kafka targets: {}\n\
             🌐 API services: {}",
            session.user_id,
            html_escape(&session.display_name),
            session.state,
            targets,
            services
        ),
        vec![home_row()],
    )
}

pub fn targets_list(targets: &[MonitoringTarget]) -> View {
    let mut rows: Vec<Vec<Button>> = targets
        .iter()
        .map(|t| vec![Button::new(format!("🔩 {}", t.name), Action::ViewTarget(t.id))])
        .collect();
    rows.push(vec![Button::new("➕ Kafka Target", Action::AddTarget)]);
    rows.push(home_row());

    View::inline(
        format!(
            "📋 <b>Kafka Targets ({})</b>\n\nSelect a target to manage:",
            targets.len()
        ),
        rows,
    )
}

pub fn target_view(target: &MonitoringTarget) -> View {
    let mut rows = vec![vec![Button::new(
        "📂 Default (any key)",
        Action::ViewKey(target.id, None),
    )]];
    rows.extend(target.keys.iter().map(|k| {
        vec![Button::new(
            format!("🔑 {}", k.key),
            Action::ViewKey(target.id, Some(k.id)),
        )]
    }));
    rows.push(vec![Button::new("➕ Add key", Action::AddKeyStart(target.id))]);
    rows.push(vec![Button::new("🗑 Delete target", Action::DeleteTarget(target.id))]);
    rows.push(vec![Button::new("🔙 Kafka targets", Action::BackToList)]);

    View::inline(
        format!(
            "📋 <b>Target: {}</b>\nBroker: <code>{}</code>\nTopic: <code>{}</code>\nCreated: {}\n\nSelect a key to monitor or an action:",
            html_escape(&target.name),
            html_escape(&target.broker),
            html_escape(&target.topic),
            target.created_at.format("%d %b %H:%M")
        ),
        rows,
    )
}

fn key_rows(target_id: TargetId, key: Option<&MonitoringKey>) -> Vec<Vec<Button>> {
    let key_id = key_id(key);
    let mut rows = vec![vec![
        Button::new("📨 Last message", Action::CheckMessage(target_id, key_id)),
        Button::new("🔴 Live", Action::LiveMode(target_id, key_id)),
    ]];
    if let Some(id) = key_id {
        rows.push(vec![Button::new("🗑 Delete key", Action::DeleteKey(target_id, id))]);
    }
    rows.push(vec![Button::new("🔙 Target", Action::ViewTarget(target_id))]);
    rows
}

pub fn key_view(target: &MonitoringTarget, key: Option<&MonitoringKey>) -> View {
    let text = match key {
        None => format!(
            "📂 <b>{}: default view</b>\n(no key filter, newest message of the topic)",
            html_escape(&target.name)
        ),
        Some(k) => format!(
            "🔑 <b>{}</b> key: <code>{}</code>",
            html_escape(&target.name),
            html_escape(&k.key)
        ),
    };
    View::inline(text, key_rows(target.id, key))
}

/// One-shot message check result.
pub fn check_result(
    target: &MonitoringTarget,
    key: Option<&MonitoringKey>,
    found_key: Option<&str>,
    payload: &str,
) -> View {
    let mut text = String::new();
    if let Some(found) = found_key.filter(|k| !k.is_empty()) {
        text.push_str(&format!("🔑 Key: <code>{}</code>\n", html_escape(found)));
    }
    text.push_str("📨 Result:\n");
    text.push_str(&payload_block(payload, CHECK_PAYLOAD_LIMIT));
    View::inline(text, key_rows(target.id, key))
}

pub fn check_error(target: &MonitoringTarget, key: Option<&MonitoringKey>, error: &str) -> View {
    View::inline(
        format!("❌ <b>Error:</b>\n{}", html_escape(error)),
        key_rows(target.id, key),
    )
}

/// Header line of a live session, e.g. `LIVE: CNC1 [Default]`.
pub fn live_title(target: &MonitoringTarget, key: Option<&MonitoringKey>) -> String {
    format!("LIVE: {} [{}]", html_escape(&target.name), key_label(key))
}

fn live_rows(target_id: TargetId, key_id: Option<KeyId>) -> Vec<Vec<Button>> {
    vec![vec![Button::new("⏹ Stop", Action::StopLive(target_id, key_id))]]
}

pub fn live_placeholder(title: &str, target_id: TargetId, key_id: Option<KeyId>) -> View {
    View::inline(
        format!("🔴 <b>{}</b>\n⏳ Connecting...", title),
        live_rows(target_id, key_id),
    )
}

/// Body of a live frame: an error line or the payload block.
pub fn live_body(result: Result<&str, &str>) -> String {
    match result {
        Ok(payload) => payload_block(payload, LIVE_PAYLOAD_LIMIT),
        Err(error) => format!("❌ {}", html_escape(error)),
    }
}

pub fn live_frame(
    title: &str,
    timestamp: &str,
    body: &str,
    target_id: TargetId,
    key_id: Option<KeyId>,
) -> View {
    View::inline(
        format!("🔴 <b>{}</b>\nUpdated: {}\n{}", title, timestamp, body),
        live_rows(target_id, key_id),
    )
}

pub fn services_list(services: &[FanucService]) -> View {
    let mut rows: Vec<Vec<Button>> = services
        .iter()
        .map(|s| vec![Button::new(format!("🌐 {}", s.name), Action::ViewService(s.id))])
        .collect();
    rows.push(vec![Button::new("➕ API Service", Action::AddService)]);
    rows.push(home_row());

    View::inline(
        format!(
            "🌐 <b>API Services ({})</b>\n\nSelect a service to manage:",
            services.len()
        ),
        rows,
    )
}

fn machine_icon(machine: &Machine) -> &'static str {
    if !machine.is_connected() {
        "🔴"
    } else if machine.is_polling() {
        "🔄"
    } else {
        "🟢"
    }
}

/// Service screen; `machines` carries the remote error text when the API is down.
pub fn service_view(service: &FanucService, machines: Result<&[Machine], &str>) -> View {
    let mut text = format!(
        "🌐 <b>Service: {}</b>\n🔗 URL: <code>{}</code>\n",
        html_escape(&service.name),
        html_escape(&service.base_url)
    );

    let mut rows = Vec::new();
    match machines {
        Ok(machines) => {
            text.push_str(&format!("\n🔌 <b>Machines: {}</b>", machines.len()));
            rows.extend(machines.iter().map(|m| {
                vec![Button::new(
                    format!("{} {} ({})", machine_icon(m), m.endpoint, m.model),
                    Action::ViewMachine(service.id, m.id.clone()),
                )]
            }));
        }
        Err(error) => {
            text.push_str(&format!("\n⚠️ <b>API unavailable:</b>\n{}", html_escape(error)));
        }
    }
    text.push_str("\n\nSelect a machine or an action:");

    rows.push(vec![Button::new("➕ Connect machine", Action::AddConnection(service.id))]);
    rows.push(vec![Button::new("🔄 Refresh", Action::ServiceMachines(service.id))]);
    rows.push(vec![Button::new("🗑 Delete service", Action::DeleteService(service.id))]);
    rows.push(vec![Button::new("🔙 API services", Action::ServicesList)]);

    View::inline(text, rows)
}

pub fn machine_view(service_id: ServiceId, machine: &Machine) -> View {
    let status_icon = if machine.is_connected() { "🟢" } else { "🔴" };
    let mode_icon = if machine.is_polling() { "🔄" } else { "⏸️" };
    let mut text = format!(
        "📟 <b>Machine: {}</b>\n\
         ID: <code>{}</code>\n\
         Endpoint: <code>{}</code>\n\
         Model: {}\n\
         Series: {}\n\
         Timeout: {} ms\n\
         Status: {} <b>{}</b>\n\
         Mode: {} <b>{}</b>",
        html_escape(&machine.model),
        html_escape(machine.id.as_str()),
        html_escape(&machine.endpoint),
        html_escape(&machine.model),
        html_escape(&machine.series),
        machine.timeout,
        status_icon,
        machine.status.as_str(),
        mode_icon,
        machine.mode.as_str()
    );
    if machine.is_polling() {
        text.push_str(&format!("\nPolling interval: {} ms", machine.interval));
    }

    let id = machine.id.clone();
    let poll = if machine.is_polling() {
        Button::new("⏹ Stop polling", Action::StopPolling(service_id, id.clone()))
    } else {
        Button::new("▶ Start polling", Action::StartPolling(service_id, id.clone()))
    };

    View::inline(
        text,
        vec![
            vec![poll],
            vec![Button::new("📄 Download program", Action::GetProgram(service_id, id.clone()))],
            vec![Button::new("🗑 Delete connection", Action::DeleteConnection(service_id, id))],
            vec![Button::new("🔙 Machines", Action::ServiceMachines(service_id))],
        ],
    )
}

/// Shown when a machine action fails, with a way back to the machine.
pub fn machine_error(service_id: ServiceId, machine_id: &MachineId, error: &str) -> View {
    View::inline(
        format!("❌ <b>Error:</b>\n{}", html_escape(error)),
        vec![vec![Button::new(
            "🔙 Back",
            Action::ViewMachine(service_id, machine_id.clone()),
        )]],
    )
}

pub fn program_caption(machine_id: &MachineId) -> String {
    format!("📄 Control program\nID: <code>{}</code>", html_escape(machine_id.as_str()))
}

/// Generic failure screen.
pub fn error(message: &str) -> View {
    View::inline(format!("❌ {}", html_escape(message)), vec![home_row()])
}
