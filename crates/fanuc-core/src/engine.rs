//! Wizard engine: drives the per-user state machine against the stores and
//! the control API.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use fanuc_adapters::MachineControl;
use fanuc_models::{
    Draft, FanucService, MachineId, NewService, NewTarget, ServiceId, State, TargetId, UserId,
    WizardKind,
};
use fanuc_persistence::{ServiceStore, StateStore, TargetStore};

use crate::error::{CoreError, Result, ResultExt};
use crate::format::html_escape;
use crate::render::View;
use crate::wizard::{self, Finalize, Step};

/// Which wizard to start, with the context it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardStart {
    Target,
    Service,
    Connection { service_id: ServiceId },
    Polling { service_id: ServiceId, machine_id: MachineId },
    NewKey { target_id: TargetId },
}

impl WizardStart {
    pub fn kind(&self) -> WizardKind {
        match self {
            WizardStart::Target => WizardKind::Target,
            WizardStart::Service => WizardKind::Service,
            WizardStart::Connection { .. } => WizardKind::Connection,
            WizardStart::Polling { .. } => WizardKind::Polling,
            WizardStart::NewKey { .. } => WizardKind::NewKey,
        }
    }

    fn draft(&self) -> Draft {
        match self {
            WizardStart::Target => wizard::target_draft(),
            WizardStart::Service => wizard::service_draft(),
            WizardStart::Connection { service_id } => wizard::connection_draft(*service_id),
            WizardStart::Polling {
                service_id,
                machine_id,
            } => wizard::polling_draft(*service_id, machine_id.clone()),
            WizardStart::NewKey { target_id } => wizard::new_key_draft(*target_id),
        }
    }
}

/// A screen to show after a wizard ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Home,
    Targets,
    Target(TargetId),
    Services,
    Service(ServiceId),
    Machine(ServiceId, MachineId),
}

/// Result of one text submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The user is idle; the text is not wizard input.
    NotInWizard,
    /// Input accepted, next step prompted.
    Prompt(View),
    /// Input rejected, same step prompted again.
    Rejected(View),
    /// The wizard finished successfully; the user is idle again.
    Completed { notice: String, next: Screen },
    /// The wizard was reset because its context vanished or its state was
    /// unreadable.
    Aborted { notice: String, next: Screen },
    /// The final step failed. `next` is `None` when the state was kept so
    /// the user can retry.
    Failed { notice: String, next: Option<Screen> },
}

/// Runs wizards on top of the stores and the control API.
#[derive(Clone)]
pub struct WizardEngine {
    state: Arc<dyn StateStore>,
    targets: Arc<dyn TargetStore>,
    services: Arc<dyn ServiceStore>,
    machines: Arc<dyn MachineControl>,
}

impl WizardEngine {
    pub fn new(
        state: Arc<dyn StateStore>,
        targets: Arc<dyn TargetStore>,
        services: Arc<dyn ServiceStore>,
        machines: Arc<dyn MachineControl>,
    ) -> Self {
        Self {
            state,
            targets,
            services,
            machines,
        }
    }

    /// Enters the first step of a wizard, abandoning any other one.
    pub async fn start_wizard(&self, user: UserId, start: WizardStart) -> Result<View> {
        let state = start.kind().first_state();
        let draft = start.draft();
        self.state
            .transition(user, state, draft.clone())
            .await
            .during(format!("start {:?} wizard", start.kind()))?;

        debug!(user_id = %user, state = %state, "Wizard started");
        Ok(wizard::prompt(state, &draft))
    }

    /// Resets the user to idle. Safe to call at any time.
    pub async fn cancel_wizard(&self, user: UserId) -> Result<()> {
        self.reset(user).await.during("cancel wizard")
    }

    async fn reset(&self, user: UserId) -> Result<()> {
        self.state
            .transition(user, State::Idle, Draft::Empty)
            .await?;
        Ok(())
    }

    /// Resets after a remote finalizer or an abort; a failure here is only logged.
    async fn reset_after_finish(&self, user: UserId) {
        if let Err(e) = self.reset(user).await {
            error!(user_id = %user, error = %e, "Failed to reset state after wizard");
        }
    }

    /// Feeds one text message into the user's active wizard.
    pub async fn submit_step(&self, user: UserId, raw: &str) -> Result<StepOutcome> {
        let session = match self.state.get_user_state(user).await.during("load session")? {
            Some(session) => session,
            None => return Ok(StepOutcome::NotInWizard),
        };
        if session.state.is_idle() && session.is_consistent() {
            return Ok(StepOutcome::NotInWizard);
        }

        let state = session.state;
        if !session.is_consistent() {
            return self
                .abort_corrupt(user, &format!("state {} with draft {:?}", state, session.draft.kind()))
                .await;
        }

        let draft = session.draft;
        match wizard::apply(state, draft.clone(), raw) {
            Ok(Step::Advance { state: next, draft }) => {
                self.state
                    .transition(user, next, draft.clone())
                    .await
                    .during(format!("save step {}", state))?;
                debug!(user_id = %user, from = %state, to = %next, "Wizard advanced");
                Ok(StepOutcome::Prompt(wizard::prompt(next, &draft)))
            }
            Ok(Step::Finish(finalize)) => self.finish(user, finalize).await,
            Err(CoreError::Validation(reason)) => {
                debug!(user_id = %user, state = %state, reason = %reason, "Wizard input rejected");
                Ok(StepOutcome::Rejected(wizard::reprompt(state, &draft, &reason)))
            }
            Err(CoreError::Corrupt(detail)) => self.abort_corrupt(user, &detail).await,
            Err(other) => Err(other),
        }
    }

    async fn abort_corrupt(&self, user: UserId, detail: &str) -> Result<StepOutcome> {
        warn!(user_id = %user, detail = %detail, "Corrupt session, resetting to idle");
        self.reset(user).await.during("reset corrupt session")?;
        Ok(StepOutcome::Aborted {
            notice: "⚠️ Your input session could not be read and was reset.".to_string(),
            next: Screen::Home,
        })
    }

    async fn finish(&self, user: UserId, finalize: Finalize) -> Result<StepOutcome> {
        match finalize {
            Finalize::Target {
                name,
                broker,
                topic,
                key,
            } => {
                let result = self
                    .state
                    .finish_target(NewTarget {
                        user_id: user,
                        name: name.clone(),
                        broker,
                        topic,
                        key,
                    })
                    .await;
                match result {
                    Ok(id) => {
                        info!(user_id = %user, target_id = %id, "Kafka target saved");
                        Ok(StepOutcome::Completed {
                            notice: format!("✅ Kafka target <b>{}</b> saved!", html_escape(&name)),
                            next: Screen::Targets,
                        })
                    }
                    Err(e) => Ok(persist_failed(user, "save Kafka target", e.into())),
                }
            }

            Finalize::Service {
                name,
                base_url,
                api_key,
            } => {
                let result = self
                    .state
                    .finish_service(NewService {
                        user_id: user,
                        name: name.clone(),
                        base_url,
                        api_key,
                    })
                    .await;
                match result {
                    Ok(id) => {
                        info!(user_id = %user, service_id = %id, "Fanuc service saved");
                        Ok(StepOutcome::Completed {
                            notice: format!("✅ Service <b>{}</b> saved!", html_escape(&name)),
                            next: Screen::Services,
                        })
                    }
                    Err(e) => Ok(persist_failed(user, "save service", e.into())),
                }
            }

            Finalize::NewKey { target_id, key } => {
                let owned = match self.targets.get_target(target_id).await {
                    Ok(target) => target.user_id == user,
                    Err(e) if e.is_not_found() => false,
                    Err(e) => return Ok(persist_failed(user, "load target", e.into())),
                };
                if !owned {
                    self.reset_after_finish(user).await;
                    return Ok(StepOutcome::Aborted {
                        notice: "⚠️ That target no longer exists.".to_string(),
                        next: Screen::Targets,
                    });
                }

                match self.state.finish_key(user, target_id, &key).await {
                    Ok(key_id) => {
                        info!(user_id = %user, target_id = %target_id, key_id = %key_id, "Key added");
                        Ok(StepOutcome::Completed {
                            notice: format!("✅ Key <code>{}</code> added!", html_escape(&key)),
                            next: Screen::Target(target_id),
                        })
                    }
                    Err(e) if e.is_not_found() => {
                        self.reset_after_finish(user).await;
                        Ok(StepOutcome::Aborted {
                            notice: "⚠️ That target no longer exists.".to_string(),
                            next: Screen::Targets,
                        })
                    }
                    Err(e) => Ok(persist_failed(user, "add key", e.into())),
                }
            }

            Finalize::Connection {
                service_id,
                request,
            } => {
                let outcome = match self.owned_service(user, service_id).await {
                    Ok(service) => {
                        let op = format!("create connection on service {}", service_id);
                        match self.machines.create_machine(&service, &request).await.during(&op) {
                            Ok(machine) => {
                                info!(
                                    user_id = %user,
                                    service_id = %service_id,
                                    machine_id = %machine.id,
                                    "Machine connection created"
                                );
                                StepOutcome::Completed {
                                    notice: "✅ Connection created!".to_string(),
                                    next: Screen::Service(service_id),
                                }
                            }
                            Err(e) => remote_failed(user, e, Screen::Service(service_id)),
                        }
                    }
                    Err(e) if e.is_not_found() => service_gone(),
                    Err(e) => remote_failed(user, e, Screen::Services),
                };
                self.reset_after_finish(user).await;
                Ok(outcome)
            }

            Finalize::Polling {
                service_id,
                machine_id,
                interval_ms,
            } => {
                let outcome = match self.owned_service(user, service_id).await {
                    Ok(service) => {
                        let op = format!("start polling {}", machine_id);
                        match self
                            .machines
                            .start_polling(&service, &machine_id, interval_ms)
                            .await
                            .during(&op)
                        {
                            Ok(()) => {
                                info!(
                                    user_id = %user,
                                    machine_id = %machine_id,
                                    interval_ms,
                                    "Polling started"
                                );
                                StepOutcome::Completed {
                                    notice: format!("✅ Polling started every {} ms!", interval_ms),
                                    next: Screen::Machine(service_id, machine_id),
                                }
                            }
                            Err(e) => remote_failed(user, e, Screen::Service(service_id)),
                        }
                    }
                    Err(e) if e.is_not_found() => service_gone(),
                    Err(e) => remote_failed(user, e, Screen::Services),
                };
                self.reset_after_finish(user).await;
                Ok(outcome)
            }
        }
    }

    /// Loads a service and checks it belongs to `user`.
    pub async fn owned_service(&self, user: UserId, id: ServiceId) -> Result<FanucService> {
        let service = self.services.get_service(id).await.during("load service")?;
        if service.user_id != user {
            return Err(CoreError::not_found("service", id));
        }
        Ok(service)
    }
}

fn persist_failed(user: UserId, op: &str, err: CoreError) -> StepOutcome {
    let err = err.during(op);
    error!(user_id = %user, error = %err, "Wizard persist failed");
    StepOutcome::Failed {
        notice: format!("❌ {}\nPlease try again or press Cancel.", html_escape(&err.to_string())),
        next: None,
    }
}

fn remote_failed(user: UserId, err: CoreError, next: Screen) -> StepOutcome {
    warn!(user_id = %user, error = %err, "Wizard remote call failed");
    StepOutcome::Failed {
        notice: format!("❌ {}", html_escape(&err.to_string())),
        next: Some(next),
    }
}

fn service_gone() -> StepOutcome {
    StepOutcome::Aborted {
        notice: "⚠️ That service no longer exists.".to_string(),
        next: Screen::Services,
    }
}
