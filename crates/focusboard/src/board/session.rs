//! Headless board: the same reducer and effects as the terminal UI, driven
//! one command at a time. Used by the non-interactive subcommands.

use anyhow::anyhow;
use focusboard_core::task::{Task, TaskId};
use focusboard_protocol::RawTask;

use super::core::{reduce, Command, Model, Msg};
use super::effects::{apply_effects, Services};
use super::{unix_epoch_ms, BoardSettings};
use crate::store::Subscription;

pub struct Session {
    model: Model,
    services: Services,
    subscription: Option<Subscription>,
}

impl Session {
    /// Builds the board and performs the initial load.
    pub async fn start(services: Services, settings: &BoardSettings) -> anyhow::Result<Self> {
        let model = Model::new(services.store.kind(), settings.categories.clone())
            .with_credential(settings.credential_set);
        let mut session = Self {
            model,
            services,
            subscription: None,
        };
        session
            .dispatch(Msg::Tick {
                now_ms: unix_epoch_ms(),
                clock: None,
            })
            .await?;
        session.load().await?;
        Ok(session)
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn tasks(&self) -> &[Task] {
        self.model.tasks.as_slice()
    }

    pub fn edit_lock(&self) -> Option<&str> {
        self.model.edit_lock()
    }

    pub async fn load(&mut self) -> anyhow::Result<()> {
        self.command(Command::Load).await
    }

    /// Adds a task and returns its id when the store accepted it.
    pub async fn add(
        &mut self,
        title: &str,
        category: &str,
        is_focus: bool,
    ) -> anyhow::Result<Option<TaskId>> {
        let before: Vec<TaskId> = self.tasks().iter().map(|t| t.id.clone()).collect();
        self.command(Command::Add {
            title: title.to_owned(),
            category: category.to_owned(),
            is_focus,
        })
        .await?;
        Ok(self
            .tasks()
            .iter()
            .find(|t| !before.contains(&t.id))
            .map(|t| t.id.clone()))
    }

    pub async fn begin_edit(&mut self, id: &str) -> anyhow::Result<()> {
        self.command(Command::BeginEdit { id: id.to_owned() }).await
    }

    pub async fn commit_edit(&mut self, id: &str, title: &str) -> anyhow::Result<()> {
        self.command(Command::CommitEdit {
            id: id.to_owned(),
            title: title.to_owned(),
        })
        .await
    }

    pub async fn cancel_edit(&mut self) -> anyhow::Result<()> {
        self.command(Command::CancelEdit).await
    }

    pub async fn complete(&mut self, id: &str) -> anyhow::Result<()> {
        self.command(Command::Complete { id: id.to_owned() }).await
    }

    pub async fn remove(&mut self, id: &str) -> anyhow::Result<()> {
        self.command(Command::Remove { id: id.to_owned() }).await
    }

    pub async fn push_snapshot(&mut self, records: Vec<RawTask>) -> anyhow::Result<()> {
        self.dispatch(Msg::SnapshotPushed(records)).await
    }

    pub async fn command(&mut self, cmd: Command) -> anyhow::Result<()> {
        self.dispatch(Msg::Command(cmd)).await
    }

    /// Reduces `msg`, runs the resulting effects, and turns a raised alert
    /// into an error.
    pub async fn dispatch(&mut self, msg: Msg) -> anyhow::Result<()> {
        let (next, effects) = reduce(self.model.clone(), msg);
        let (next, _quit) =
            apply_effects(next, effects, &self.services, None, &mut self.subscription).await;
        self.model = next;

        match self.model.alert.take() {
            Some(alert) => Err(anyhow!(alert)),
            None => Ok(()),
        }
    }
}
