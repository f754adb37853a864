use std::sync::Arc;
use std::time::Duration;

use focusboard_core::summary::SUMMARY_MARKER_KEY;
use focusboard_protocol::TaskPatch;
use tokio::sync::mpsc;

use super::confetti::Burst;
use super::core::{reduce, Effect, Model, Msg};
use crate::prefs::{Prefs, CREDENTIAL_KEY};
use crate::rewards::RewardsClient;
use crate::store::{Subscription, TaskStore};

/// Everything effects talk to outside the model.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn TaskStore>,
    pub prefs: Arc<dyn Prefs>,
    pub rewards: Option<RewardsClient>,
    /// Credential to fall back on when the stored override is cleared.
    pub fallback_credential: Option<String>,
}

/// Where spawned effects report back in the interactive board.
#[derive(Clone)]
pub struct Outbox {
    pub msgs: mpsc::UnboundedSender<Msg>,
    /// Freshly opened subscriptions; the runtime owns the live one.
    pub subscriptions: mpsc::UnboundedSender<Subscription>,
}

/// Runs `effects` in order, feeding each result back through `reduce` and
/// running whatever follow-up effects that produces. Returns the final model
/// and whether a quit was requested.
///
/// With an outbox, remote calls and delayed messages run as spawned tasks
/// that post their result to it, so the caller can keep drawing while they
/// are in flight. Without one every effect completes before this returns.
pub async fn apply_effects(
    mut model: Model,
    mut effects: Vec<Effect>,
    services: &Services,
    outbox: Option<&Outbox>,
    subscription: &mut Option<Subscription>,
) -> (Model, bool) {
    let mut quit = false;

    let mut idx = 0;
    while idx < effects.len() {
        let effect = effects[idx].clone();
        idx += 1;

        let msg = match effect {
            Effect::Quit => {
                quit = true;
                None
            }
            Effect::ScheduleRefresh { id, delay_ms } => match outbox {
                Some(out) => {
                    let tx = out.msgs.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        let _ = tx.send(Msg::RefreshDue { id });
                    });
                    None
                }
                None => Some(Msg::RefreshDue { id }),
            },
            Effect::Celebrate => {
                let burst = Burst::launch(&mut rand::rng(), model.now_ms, model.width, model.height);
                Some(Msg::BurstLaunched(burst))
            }
            Effect::Subscribe => {
                *subscription = None;
                match outbox {
                    Some(out) => {
                        let out = out.clone();
                        let services = services.clone();
                        tokio::spawn(async move {
                            match open_subscription(&services).await {
                                Ok(Some(sub)) => {
                                    let _ = out.subscriptions.send(sub);
                                }
                                Ok(None) => {}
                                Err(msg) => {
                                    let _ = out.msgs.send(msg);
                                }
                            }
                        });
                        None
                    }
                    None => match open_subscription(services).await {
                        Ok(Some(sub)) => {
                            *subscription = Some(sub);
                            Some(Msg::SubscriptionStarted)
                        }
                        Ok(None) => None,
                        Err(msg) => Some(msg),
                    },
                }
            }
            remote => match outbox {
                Some(out) => {
                    let tx = out.msgs.clone();
                    let services = services.clone();
                    tokio::spawn(async move {
                        if let Some(msg) = perform(remote, &services).await {
                            let _ = tx.send(msg);
                        }
                    });
                    None
                }
                None => perform(remote, services).await,
            },
        };

        if let Some(msg) = msg {
            let (next, more) = reduce(model, msg);
            model = next;
            effects.extend(more);
        }
    }

    (model, quit)
}

async fn open_subscription(services: &Services) -> Result<Option<Subscription>, Msg> {
    services
        .store
        .subscribe()
        .await
        .map_err(|err| Msg::SubscriptionClosed {
            reason: err.to_string(),
        })
}

/// Performs one IO effect and returns the message carrying its outcome.
async fn perform(effect: Effect, services: &Services) -> Option<Msg> {
    match effect {
        Effect::FetchTasks => {
            let result = services.store.list().await.map_err(|err| err.to_string());
            Some(Msg::TasksLoaded(result))
        }
        Effect::CreateTask { payload } => {
            let result = services
                .store
                .create(&payload)
                .await
                .map_err(|err| err.to_string());
            Some(Msg::TaskCreated { payload, result })
        }
        Effect::UpdateTitle { id, title } => {
            let result = services
                .store
                .update(&id, &TaskPatch::title(title.clone()))
                .await
                .map(|_| ())
                .map_err(|err| err.to_string());
            Some(Msg::TitleUpdated { id, title, result })
        }
        Effect::MarkDone { id } => {
            let result = services
                .store
                .update(&id, &TaskPatch::completed())
                .await
                .map(|_| ())
                .map_err(|err| err.to_string());
            Some(Msg::MarkedDone { id, result })
        }
        Effect::DeleteTask { id } => {
            let result = services
                .store
                .delete(&id)
                .await
                .map_err(|err| err.to_string());
            Some(Msg::TaskDeleted { id, result })
        }
        Effect::LoadSummaryMarker => {
            let marker = match services.prefs.get(SUMMARY_MARKER_KEY).await {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(error = %format!("{err:#}"), "read summary marker failed");
                    None
                }
            };
            Some(Msg::SummaryMarkerLoaded(marker))
        }
        Effect::SaveSummaryMarker { date } => {
            if let Err(err) = services.prefs.set(SUMMARY_MARKER_KEY, &date).await {
                tracing::warn!(error = %format!("{err:#}"), "write summary marker failed");
            }
            None
        }
        Effect::SaveCredential { value } => {
            let saved = match &value {
                Some(v) => services.prefs.set(CREDENTIAL_KEY, v).await,
                None => services.prefs.remove(CREDENTIAL_KEY).await,
            };
            let result = match saved {
                Ok(()) => {
                    let effective = value
                        .clone()
                        .or_else(|| services.fallback_credential.clone());
                    services.store.set_credential(effective);
                    Ok(value.is_some())
                }
                Err(err) => Err(format!("{err:#}")),
            };
            Some(Msg::CredentialSaved(result))
        }
        Effect::FetchRewards => match services.rewards.as_ref() {
            Some(client) => {
                let result = client.now_playing().await.map_err(|err| err.to_string());
                Some(Msg::RewardsLoaded(result))
            }
            None => None,
        },
        Effect::Quit | Effect::ScheduleRefresh { .. } | Effect::Celebrate | Effect::Subscribe => {
            None
        }
    }
}
