//! Inline-button action tokens.
//!
//! Tokens are short `name[:id[:id]]` strings so they fit Telegram's 64-byte
//! callback payload. Key id `0` stands for the keyless "Default" view.
//! Machine ids are opaque and may contain `:`, so they always come last.

use std::fmt;
use std::str::FromStr;

use fanuc_models::{KeyId, MachineId, ServiceId, TargetId};

/// Every button action the bot understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Home,
    WhoAmI,
    CancelWizard,

    AddTarget,
    TargetsList,
    BackToList,
    ViewTarget(TargetId),
    DeleteTarget(TargetId),
    AddKeyStart(TargetId),
    ViewKey(TargetId, Option<KeyId>),
    DeleteKey(TargetId, KeyId),
    CheckMessage(TargetId, Option<KeyId>),
    LiveMode(TargetId, Option<KeyId>),
    StopLive(TargetId, Option<KeyId>),

    ServicesList,
    AddService,
    ViewService(ServiceId),
    ServiceMachines(ServiceId),
    DeleteService(ServiceId),
    AddConnection(ServiceId),

    ViewMachine(ServiceId, MachineId),
    StartPolling(ServiceId, MachineId),
    StopPolling(ServiceId, MachineId),
    GetProgram(ServiceId, MachineId),
    DeleteConnection(ServiceId, MachineId),
}

/// A callback payload that is not a known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action token: {0:?}")]
pub struct ParseActionError(pub String);

fn key_token(key: Option<KeyId>) -> u64 {
    key.map(KeyId::get).unwrap_or(0)
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Home => f.write_str("home"),
            Action::WhoAmI => f.write_str("who_btn"),
            Action::CancelWizard => f.write_str("cancel_wizard"),
            Action::AddTarget => f.write_str("add_target"),
            Action::TargetsList => f.write_str("targets_list"),
            Action::BackToList => f.write_str("back_to_list"),
            Action::ViewTarget(t) => write!(f, "view_target:{}", t),
            Action::DeleteTarget(t) => write!(f, "del_target:{}", t),
            Action::AddKeyStart(t) => write!(f, "add_key_start:{}", t),
            Action::ViewKey(t, k) => write!(f, "view_key:{}:{}", t, key_token(*k)),
            Action::DeleteKey(t, k) => write!(f, "del_key:{}:{}", t, k),
            Action::CheckMessage(t, k) => write!(f, "check_msg:{}:{}", t, key_token(*k)),
            Action::LiveMode(t, k) => write!(f, "live_mode:{}:{}", t, key_token(*k)),
            Action::StopLive(t, k) => write!(f, "stop_live:{}:{}", t, key_token(*k)),
            Action::ServicesList => f.write_str("services_list"),
            Action::AddService => f.write_str("add_service"),
            Action::ViewService(s) => write!(f, "view_service:{}", s),
            Action::ServiceMachines(s) => write!(f, "svc_machines:{}", s),
            Action::DeleteService(s) => write!(f, "del_service:{}", s),
            Action::AddConnection(s) => write!(f, "add_conn:{}", s),
            Action::ViewMachine(s, m) => write!(f, "vm:{}:{}", s, m),
            Action::StartPolling(s, m) => write!(f, "sp:{}:{}", s, m),
            Action::StopPolling(s, m) => write!(f, "stp:{}:{}", s, m),
            Action::GetProgram(s, m) => write!(f, "gp:{}:{}", s, m),
            Action::DeleteConnection(s, m) => write!(f, "dc:{}:{}", s, m),
        }
    }
}

impl FromStr for Action {
    type Err = ParseActionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let token = raw.trim();
        let err = || ParseActionError(token.to_string());

        let mut parts = token.splitn(3, ':');
        let name = parts.next().unwrap_or_default();
        let first = parts.next();
        let second = parts.next();

        let simple = match name {
            "home" => Some(Action::Home),
            "who_btn" => Some(Action::WhoAmI),
            "cancel_wizard" => Some(Action::CancelWizard),
            "add_target" => Some(Action::AddTarget),
            "targets_list" => Some(Action::TargetsList),
            "back_to_list" => Some(Action::BackToList),
            "services_list" => Some(Action::ServicesList),
            "add_service" => Some(Action::AddService),
            _ => None,
        };
        if let Some(action) = simple {
            return match first {
                None => Ok(action),
                Some(_) => Err(err()),
            };
        }

        let first = first.ok_or_else(err)?;

        let target = || first.parse::<TargetId>().map_err(|_| err());
        let service = || first.parse::<ServiceId>().map_err(|_| err());
        let key = || -> Result<Option<KeyId>, ParseActionError> {
            let id: u64 = second.ok_or_else(err)?.parse().map_err(|_| err())?;
            Ok((id != 0).then_some(KeyId(id)))
        };
        let machine = || -> Result<MachineId, ParseActionError> {
            match second {
                Some(m) if !m.is_empty() => Ok(MachineId::new(m)),
                _ => Err(err()),
            }
        };
        let single = |action: Action| match second {
            None => Ok(action),
            Some(_) => Err(err()),
        };

        match name {
            "view_target" => single(Action::ViewTarget(target()?)),
            "del_target" => single(Action::DeleteTarget(target()?)),
            "add_key_start" => single(Action::AddKeyStart(target()?)),
            "view_key" => Ok(Action::ViewKey(target()?, key()?)),
            "del_key" => Ok(Action::DeleteKey(target()?, key()?.ok_or_else(err)?)),
            "check_msg" => Ok(Action::CheckMessage(target()?, key()?)),
            "live_mode" => Ok(Action::LiveMode(target()?, key()?)),
            "stop_live" => Ok(Action::StopLive(target()?, key()?)),
            "view_service" => single(Action::ViewService(service()?)),
            "svc_machines" => single(Action::ServiceMachines(service()?)),
            "del_service" => single(Action::DeleteService(service()?)),
            "add_conn" => single(Action::AddConnection(service()?)),
            "vm" => Ok(Action::ViewMachine(service()?, machine()?)),
            "sp" => Ok(Action::StartPolling(service()?, machine()?)),
            "stp" => Ok(Action::StopPolling(service()?, machine()?)),
            "gp" => Ok(Action::GetProgram(service()?, machine()?)),
            "dc" => Ok(Action::DeleteConnection(service()?, machine()?)),
            _ => Err(err()),
        }
    }
}
