//! Routes inbound actions and text to the engine, the live manager and the
//! screen builders.

use std::sync::Arc;

use tracing::{debug, error, warn};

use fanuc_adapters::{KafkaFetch, MachineControl};
use fanuc_models::{Draft, FanucService, MachineId, State, UserId, UserSession};
use fanuc_persistence::{ServiceStore, StateStore, TargetStore};

use crate::action::Action;
use crate::config::LiveConfig;
use crate::engine::{Screen, StepOutcome, WizardEngine, WizardStart};
use crate::error::{CoreError, Result, ResultExt};
use crate::live::LiveSessionManager;
use crate::monitoring::Monitoring;
use crate::registry::SessionRegistry;
use crate::render::{Button, RenderError, Renderer, View};
use crate::views;

/// File name used for downloaded control programs.
pub const PROGRAM_FILE_NAME: &str = "GCODE.NC";

/// The collaborators the bot runs against.
#[derive(Clone)]
pub struct Backends {
    pub state: Arc<dyn StateStore>,
    pub targets: Arc<dyn TargetStore>,
    pub services: Arc<dyn ServiceStore>,
    pub kafka: Arc<dyn KafkaFetch>,
    pub machines: Arc<dyn MachineControl>,
}

/// Entry point for every user interaction.
#[derive(Clone)]
pub struct Dispatcher {
    backends: Backends,
    engine: WizardEngine,
    live: LiveSessionManager,
    monitoring: Monitoring,
}

impl Dispatcher {
    pub fn new(backends: Backends, live_config: LiveConfig) -> Self {
        let monitoring = Monitoring::new(
            Arc::clone(&backends.targets),
            Arc::clone(&backends.kafka),
        );
        let engine = WizardEngine::new(
            Arc::clone(&backends.state),
            Arc::clone(&backends.targets),
            Arc::clone(&backends.services),
            Arc::clone(&backends.machines),
        );
        let live = LiveSessionManager::new(
            Arc::new(SessionRegistry::new()),
            monitoring.clone(),
            live_config,
        );
        Self {
            backends,
            engine,
            live,
            monitoring,
        }
    }

    pub fn engine(&self) -> &WizardEngine {
        &self.engine
    }

    pub fn live(&self) -> &LiveSessionManager {
        &self.live
    }

    /// Records the user (and refreshes the display name) on first contact.
    pub async fn register_user(&self, user: UserId, display_name: &str) -> Result<UserSession> {
        self.backends
            .state
            .upsert_user(user, display_name)
            .await
            .during("register user")
    }

    /// `/start`: resets everything and shows the menus.
    pub async fn on_start(&self, user: UserId, display_name: &str, renderer: Arc<dyn Renderer>) {
        let result = async {
            self.register_user(user, display_name).await?;
            self.live.stop_live(user).await;
            self.engine.cancel_wizard(user).await?;
            renderer.show_prompt(views::welcome()).await?;
            renderer.show_prompt(views::home()).await?;
            Ok::<_, CoreError>(())
        }
        .await;
        if let Err(e) = result {
            self.report(user, e, renderer.as_ref(), false).await;
        }
    }

    pub async fn on_help(&self, renderer: Arc<dyn Renderer>) {
        if let Err(e) = renderer.show_prompt(views::help()).await {
            warn!(error = %e, "Failed to send help");
        }
    }

    /// `/cancel`: leaves any wizard and live session.
    pub async fn on_cancel(&self, user: UserId, renderer: Arc<dyn Renderer>) {
        let result = async {
            self.live.stop_live(user).await;
            self.engine.cancel_wizard(user).await?;
            renderer
                .show_prompt(View::with_reply_menu("🚫 Cancelled."))
                .await?;
            renderer.show_prompt(views::home()).await?;
            Ok::<_, CoreError>(())
        }
        .await;
        if let Err(e) = result {
            self.report(user, e, renderer.as_ref(), false).await;
        }
    }

    /// Handles a button press or a command mapped to an action.
    pub async fn on_action(&self, user: UserId, action: Action, renderer: Arc<dyn Renderer>) {
        debug!(user_id = %user, action = %action, "Dispatching action");
        if let Err(e) = self.handle_action(user, &action, &renderer).await {
            if e.is_not_found() {
                self.redirect(user, &e, fallback_screen(&action), renderer.as_ref())
                    .await;
            } else {
                self.report(user, e, renderer.as_ref(), true).await;
            }
        }
    }

    /// Handles free text: menu labels first, then the active wizard.
    pub async fn on_text(&self, user: UserId, raw: &str, renderer: Arc<dyn Renderer>) {
        if let Some(action) = views::menu_action(raw) {
            return self.on_action(user, action, renderer).await;
        }

        let result = async {
            let outcome = self.engine.submit_step(user, raw).await?;
            self.show_outcome(user, outcome, renderer.as_ref()).await
        }
        .await;
        if let Err(e) = result {
            self.report(user, e, renderer.as_ref(), false).await;
        }
    }

    async fn show_outcome(
        &self,
        user: UserId,
        outcome: StepOutcome,
        renderer: &dyn Renderer,
    ) -> Result<()> {
        match outcome {
            StepOutcome::NotInWizard => renderer.show_prompt(views::not_understood()).await?,
            StepOutcome::Prompt(view) | StepOutcome::Rejected(view) => {
                renderer.show_prompt(view).await?
            }
            StepOutcome::Completed { notice, next } | StepOutcome::Aborted { notice, next } => {
                renderer.show_prompt(View::text(notice)).await?;
                let view = self.screen(user, &next).await?;
                renderer.show_prompt(view).await?;
            }
            StepOutcome::Failed {
                notice,
                next: Some(next),
            } => {
                renderer.show_prompt(View::text(notice)).await?;
                let view = self.screen(user, &next).await?;
                renderer.show_prompt(view).await?;
            }
            StepOutcome::Failed { notice, next: None } => {
                let cancel = vec![vec![Button::new("🚫 Cancel", Action::CancelWizard)]];
                renderer.show_prompt(View::inline(notice, cancel)).await?;
            }
        }
        Ok(())
    }

    /// Resets a stale wizard without writing when the user is already idle.
    async fn leave_wizard(&self, user: UserId) -> Result<()> {
        let session = self
            .backends
            .state
            .get_user_state(user)
            .await
            .during("load session")?;
        let busy = session.is_some_and(|s| !(s.state.is_idle() && s.is_consistent()));
        if busy {
            self.backends
                .state
                .transition(user, State::Idle, Draft::Empty)
                .await
                .during("leave wizard")?;
            debug!(user_id = %user, "Wizard abandoned by navigation");
        }
        Ok(())
    }

    async fn handle_action(
        &self,
        user: UserId,
        action: &Action,
        renderer: &Arc<dyn Renderer>,
    ) -> Result<()> {
        if !matches!(action, Action::LiveMode(..)) {
            self.live.stop_live(user).await;
        }
        if wizard_start(action).is_none() {
            self.leave_wizard(user).await?;
        }

        match action {
            Action::Home => renderer.edit_current(views::home()).await?,
            Action::WhoAmI => {
                let view = self.profile(user).await?;
                renderer.edit_current(view).await?;
            }
            Action::CancelWizard => {
                renderer.notify("🚫 Cancelled").await?;
                renderer.edit_current(views::home()).await?;
            }

            Action::TargetsList | Action::BackToList => {
                let view = self.screen(user, &Screen::Targets).await?;
                renderer.edit_current(view).await?;
            }
            Action::ViewTarget(target_id) => {
                let view = self.screen(user, &Screen::Target(*target_id)).await?;
                renderer.edit_current(view).await?;
            }
            Action::DeleteTarget(target_id) => {
                self.monitoring.resolve(user, *target_id, None).await?;
                self.backends
                    .targets
                    .delete_target(*target_id, user)
                    .await
                    .during(format!("delete target {}", target_id))?;
                renderer.notify("🗑 Target deleted").await?;
                let view = self.screen(user, &Screen::Targets).await?;
                renderer.edit_current(view).await?;
            }
            Action::ViewKey(target_id, key_id) => {
                let (target, key) = self.monitoring.resolve(user, *target_id, *key_id).await?;
                renderer
                    .edit_current(views::key_view(&target, key.as_ref()))
                    .await?;
            }
            Action::DeleteKey(target_id, key_id) => {
                self.monitoring
                    .resolve(user, *target_id, Some(*key_id))
                    .await?;
                self.backends
                    .targets
                    .delete_key(*key_id, user)
                    .await
                    .during(format!("delete key {}", key_id))?;
                renderer.notify("🗑 Key deleted").await?;
                let view = self.screen(user, &Screen::Target(*target_id)).await?;
                renderer.edit_current(view).await?;
            }
            Action::CheckMessage(target_id, key_id) => {
                let (target, key) = self.monitoring.resolve(user, *target_id, *key_id).await?;
                let view = match self.monitoring.fetch(&target, key.as_ref()).await {
                    Ok(record) => views::check_result(
                        &target,
                        key.as_ref(),
                        record.key.as_deref(),
                        &record.value,
                    ),
                    Err(e) => {
                        warn!(user_id = %user, target_id = %target_id, error = %e, "Message check failed");
                        views::check_error(&target, key.as_ref(), &e.to_string())
                    }
                };
                renderer.edit_current(view).await?;
            }
            Action::LiveMode(target_id, key_id) => {
                let (target, key) = self.monitoring.resolve(user, *target_id, *key_id).await?;
                self.live
                    .start_live(user, target, key, Arc::clone(renderer))
                    .await?;
            }
            Action::StopLive(target_id, key_id) => {
                renderer.notify("⏹ Live stopped").await?;
                let (target, key) = self.monitoring.resolve(user, *target_id, *key_id).await?;
                renderer
                    .edit_current(views::key_view(&target, key.as_ref()))
                    .await?;
            }

            Action::ServicesList => {
                let view = self.screen(user, &Screen::Services).await?;
                renderer.edit_current(view).await?;
            }
            Action::ViewService(service_id) | Action::ServiceMachines(service_id) => {
                let view = self.screen(user, &Screen::Service(*service_id)).await?;
                renderer.edit_current(view).await?;
            }
            Action::DeleteService(service_id) => {
                self.engine.owned_service(user, *service_id).await?;
                self.backends
                    .services
                    .delete_service(*service_id, user)
                    .await
                    .during(format!("delete service {}", service_id))?;
                renderer.notify("🗑 Service deleted").await?;
                let view = self.screen(user, &Screen::Services).await?;
                renderer.edit_current(view).await?;
            }

            Action::ViewMachine(service_id, machine_id) => {
                let service = self.engine.owned_service(user, *service_id).await?;
                let view = self.machine_screen(&service, machine_id).await?;
                renderer.edit_current(view).await?;
            }
            Action::StopPolling(service_id, machine_id) => {
                let service = self.engine.owned_service(user, *service_id).await?;
                let view = match self
                    .backends
                    .machines
                    .stop_polling(&service, machine_id)
                    .await
                    .during(format!("stop polling {}", machine_id))
                {
                    Ok(()) => {
                        renderer.notify("⏹ Polling stopped").await?;
                        self.machine_screen(&service, machine_id).await?
                    }
                    Err(e) if e.is_not_found() => return Err(e),
                    Err(e) => views::machine_error(*service_id, machine_id, &e.to_string()),
                };
                renderer.edit_current(view).await?;
            }
            Action::GetProgram(service_id, machine_id) => {
                let service = self.engine.owned_service(user, *service_id).await?;
                match self
                    .backends
                    .machines
                    .get_program_text(&service, machine_id)
                    .await
                    .during(format!("read program of {}", machine_id))
                {
                    Ok(program) => {
                        renderer
                            .send_document(
                                PROGRAM_FILE_NAME,
                                program.into_bytes(),
                                &views::program_caption(machine_id),
                            )
                            .await?;
                        renderer.notify("📄 Program sent").await?;
                    }
                    Err(e) if e.is_not_found() => return Err(e),
                    Err(e) => {
                        renderer
                            .edit_current(views::machine_error(
                                *service_id,
                                machine_id,
                                &e.to_string(),
                            ))
                            .await?
                    }
                }
            }
            Action::DeleteConnection(service_id, machine_id) => {
                let service = self.engine.owned_service(user, *service_id).await?;
                match self
                    .backends
                    .machines
                    .delete_machine(&service, machine_id)
                    .await
                    .during(format!("delete connection {}", machine_id))
                {
                    Ok(()) => {
                        renderer.notify("🗑 Connection deleted").await?;
                        let view = self.service_screen(&service).await;
                        renderer.edit_current(view).await?;
                    }
                    Err(e) if e.is_not_found() => return Err(e),
                    Err(e) => {
                        renderer
                            .edit_current(views::machine_error(
                                *service_id,
                                machine_id,
                                &e.to_string(),
                            ))
                            .await?
                    }
                }
            }

            Action::AddTarget
            | Action::AddKeyStart(_)
            | Action::AddService
            | Action::AddConnection(_)
            | Action::StartPolling(..) => {
                if let Some(start) = wizard_start(action) {
                    self.check_wizard_context(user, &start).await?;
                    let view = self.engine.start_wizard(user, start).await?;
                    renderer.edit_current(view).await?;
                }
            }
        }
        Ok(())
    }

    /// Makes sure the entity a wizard hangs off belongs to the user.
    async fn check_wizard_context(&self, user: UserId, start: &WizardStart) -> Result<()> {
        match start {
            WizardStart::NewKey { target_id } => {
                self.monitoring.resolve(user, *target_id, None).await?;
            }
            WizardStart::Connection { service_id } | WizardStart::Polling { service_id, .. } => {
                self.engine.owned_service(user, *service_id).await?;
            }
            WizardStart::Target | WizardStart::Service => {}
        }
        Ok(())
    }

    async fn profile(&self, user: UserId) -> Result<View> {
        let session = self
            .backends
            .state
            .get_user_state(user)
            .await
            .during("load profile")?
            .unwrap_or_else(|| UserSession::new(user, ""));
        let targets = self
            .backends
            .targets
            .list_targets(user)
            .await
            .during("list targets")?;
        let services = self
            .backends
            .services
            .list_services(user)
            .await
            .during("list services")?;
        Ok(views::profile(&session, targets.len(), services.len()))
    }

    /// Builds the view for a screen, loading whatever it shows.
    pub async fn screen(&self, user: UserId, screen: &Screen) -> Result<View> {
        match screen {
            Screen::Home => Ok(views::home()),
            Screen::Targets => {
                let targets = self
                    .backends
                    .targets
                    .list_targets(user)
                    .await
                    .during("list targets")?;
                Ok(views::targets_list(&targets))
            }
            Screen::Target(target_id) => {
                let (target, _) = self.monitoring.resolve(user, *target_id, None).await?;
                Ok(views::target_view(&target))
            }
            Screen::Services => {
                let services = self
                    .backends
                    .services
                    .list_services(user)
                    .await
                    .during("list services")?;
                Ok(views::services_list(&services))
            }
            Screen::Service(service_id) => {
                let service = self.engine.owned_service(user, *service_id).await?;
                Ok(self.service_screen(&service).await)
            }
            Screen::Machine(service_id, machine_id) => {
                let service = self.engine.owned_service(user, *service_id).await?;
                self.machine_screen(&service, machine_id).await
            }
        }
    }

    /// Service screen; a failing API shows as a warning instead of an error.
    async fn service_screen(&self, service: &FanucService) -> View {
        match self
            .backends
            .machines
            .list_machines(service)
            .await
            .during(format!("list machines of service {}", service.id))
        {
            Ok(machines) => views::service_view(service, Ok(&machines)),
            Err(e) => {
                warn!(service_id = %service.id, error = %e, "Machine list unavailable");
                views::service_view(service, Err(&e.to_string()))
            }
        }
    }

    async fn machine_screen(&self, service: &FanucService, machine_id: &MachineId) -> Result<View> {
        match self
            .backends
            .machines
            .get_machine(service, machine_id)
            .await
            .during(format!("load machine {}", machine_id))
        {
            Ok(machine) => Ok(views::machine_view(service.id, &machine)),
            Err(e) if e.is_not_found() => Err(e),
            Err(e) => Ok(views::machine_error(service.id, machine_id, &e.to_string())),
        }
    }

    /// Sends the user back to a list after the entity they acted on vanished.
    async fn redirect(&self, user: UserId, err: &CoreError, screen: Screen, renderer: &dyn Renderer) {
        debug!(user_id = %user, error = %err, "Entity gone, redirecting");
        let result = async {
            self.engine.cancel_wizard(user).await?;
            renderer.notify("⚠️ No longer exists").await?;
            let view = match self.screen(user, &screen).await {
                Ok(view) => view,
                Err(e) if e.is_not_found() => views::home(),
                Err(e) => return Err(e),
            };
            renderer.edit_current(view).await?;
            Ok::<_, CoreError>(())
        }
        .await;
        if let Err(e) = result {
            self.report(user, e, renderer, true).await;
        }
    }

    /// Logs a failed interaction and tells the user, unless the chat is gone.
    async fn report(&self, user: UserId, err: CoreError, renderer: &dyn Renderer, edit: bool) {
        if let CoreError::Render(RenderError::TargetGone(reason)) = &err {
            debug!(user_id = %user, reason = %reason, "Interaction target gone");
            return;
        }
        error!(user_id = %user, error = %err, "Interaction failed");

        let view = views::error(&err.to_string());
        let sent = if edit {
            renderer.edit_current(view).await
        } else {
            renderer.show_prompt(view).await
        };
        if let Err(e) = sent {
            warn!(user_id = %user, error = %e, "Failed to report error to user");
        }
    }
}

/// The wizard an action starts, if any.
fn wizard_start(action: &Action) -> Option<WizardStart> {
    match action {
        Action::AddTarget => Some(WizardStart::Target),
        Action::AddService => Some(WizardStart::Service),
        Action::AddKeyStart(target_id) => Some(WizardStart::NewKey {
            target_id: *target_id,
        }),
        Action::AddConnection(service_id) => Some(WizardStart::Connection {
            service_id: *service_id,
        }),
        Action::StartPolling(service_id, machine_id) => Some(WizardStart::Polling {
            service_id: *service_id,
            machine_id: machine_id.clone(),
        }),
        _ => None,
    }
}

/// Where to send the user when an action's entity no longer exists.
fn fallback_screen(action: &Action) -> Screen {
    match action {
        Action::ViewTarget(_)
        | Action::DeleteTarget(_)
        | Action::AddKeyStart(_)
        | Action::ViewKey(..)
        | Action::DeleteKey(..)
        | Action::CheckMessage(..)
        | Action::LiveMode(..)
        | Action::StopLive(..)
        | Action::TargetsList
        | Action::BackToList => Screen::Targets,

        Action::ViewMachine(service_id, _)
        | Action::StartPolling(service_id, _)
        | Action::StopPolling(service_id, _)
        | Action::GetProgram(service_id, _)
        | Action::DeleteConnection(service_id, _) => Screen::Service(*service_id),

        Action::ViewService(_)
        | Action::ServiceMachines(_)
        | Action::DeleteService(_)
        | Action::AddConnection(_)
        | Action::ServicesList
        | Action::AddService => Screen::Services,

        Action::Home | Action::WhoAmI | Action::CancelWizard | Action::AddTarget => Screen::Home,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fanuc_models::{ServiceId, TargetId};

    #[test]
    fn test_wizard_start_covers_add_actions() {
        assert_eq!(wizard_start(&Action::AddTarget), Some(WizardStart::Target));
        assert_eq!(
            wizard_start(&Action::StartPolling(ServiceId(2), MachineId::new("m:1"))),
            Some(WizardStart::Polling {
                service_id: ServiceId(2),
                machine_id: MachineId::new("m:1"),
            })
        );
        assert_eq!(wizard_start(&Action::TargetsList), None);
    }

    #[test]
    fn test_fallback_screen_points_at_parent() {
        assert_eq!(
            fallback_screen(&Action::CheckMessage(TargetId(1), None)),
            Screen::Targets
        );
        assert_eq!(
            fallback_screen(&Action::GetProgram(ServiceId(4), MachineId::new("m"))),
            Screen::Service(ServiceId(4))
        );
        assert_eq!(fallback_screen(&Action::DeleteService(ServiceId(4))), Screen::Services);
    }
}
