use std::collections::BTreeSet;

use focusboard_core::config::BackendKind;
use focusboard_core::list::TaskList;
use focusboard_core::summary::{daily_summary_due, DailySummary, LocalClock};
use focusboard_core::task::{
    local_task, new_task_payload, normalize, validate_title, Task, TaskId, DEFAULT_CATEGORY,
};
use focusboard_core::views::{display_order, progress, Progress};
use focusboard_protocol::{NewTask, RawTask};

use super::confetti::Burst;
use super::editor::Editor;
use crate::rewards::Movie;

pub const REFRESH_AFTER_COMPLETE_MS: u64 = 450;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Compose,
    Edit,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Request/response backend; nothing is pushed.
    Static,
    Connecting,
    Live,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    Unknown,
    Known(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RewardsState {
    Disabled,
    Loading,
    Loaded(Vec<Movie>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub id: TaskId,
    pub editor: Editor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddForm {
    pub editor: Editor,
    pub category: usize,
    pub is_focus: bool,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub width: u16,
    pub height: u16,
    pub now_ms: u64,
    pub clock: Option<LocalClock>,

    pub backend: BackendKind,
    pub connection: ConnectionState,
    pub reconnect_attempt: u32,
    pub next_reconnect_ms: u64,

    pub mode: Mode,
    pub tasks: TaskList,
    pub selected: usize,
    pub edit: Option<EditSession>,
    pub form: AddForm,
    pub categories: Vec<String>,

    pub loading: bool,
    pub adding: bool,
    pub completing: BTreeSet<TaskId>,
    pub busy: BTreeSet<TaskId>,

    pub alert: Option<String>,
    pub status: Option<String>,
    pub summary: Option<DailySummary>,
    pub summary_marker: MarkerState,
    pub settings: Option<Editor>,
    pub credential_set: bool,
    pub burst: Option<Burst>,
    pub rewards: RewardsState,
}

impl Model {
    pub fn new(backend: BackendKind, categories: Vec<String>) -> Self {
        let mut categories: Vec<String> = categories
            .into_iter()
            .map(|c| c.trim().to_owned())
            .filter(|c| !c.is_empty())
            .collect();
        if categories.is_empty() {
            categories.push(DEFAULT_CATEGORY.to_owned());
        }

        Self {
            width: 0,
            height: 0,
            now_ms: 0,
            clock: None,
            backend,
            connection: match backend {
                BackendKind::Rest => ConnectionState::Static,
                BackendKind::Realtime => ConnectionState::Connecting,
            },
            reconnect_attempt: 0,
            next_reconnect_ms: 0,
            mode: Mode::Normal,
            tasks: TaskList::new(),
            selected: 0,
            edit: None,
            form: AddForm {
                editor: Editor::new(),
                category: 0,
                is_focus: false,
            },
            categories,
            loading: false,
            adding: false,
            completing: BTreeSet::new(),
            busy: BTreeSet::new(),
            alert: None,
            status: None,
            summary: None,
            summary_marker: MarkerState::Unknown,
            settings: None,
            credential_set: false,
            burst: None,
            rewards: RewardsState::Disabled,
        }
    }

    pub fn with_rewards(mut self, enabled: bool) -> Self {
        self.rewards = if enabled {
            RewardsState::Loading
        } else {
            RewardsState::Disabled
        };
        self
    }

    pub fn with_credential(mut self, set: bool) -> Self {
        self.credential_set = set;
        self
    }

    pub fn edit_lock(&self) -> Option<&str> {
        self.edit.as_ref().map(|e| e.id.as_str())
    }

    pub fn is_editing(&self, id: &str) -> bool {
        self.edit_lock() == Some(id)
    }

    pub fn visible_ids(&self) -> Vec<TaskId> {
        display_order(self.tasks.as_slice())
            .into_iter()
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn selected_task(&self) -> Option<&Task> {
        display_order(self.tasks.as_slice())
            .into_iter()
            .nth(self.selected)
    }

    pub fn form_category(&self) -> &str {
        self.categories
            .get(self.form.category)
            .map(String::as_str)
            .unwrap_or(DEFAULT_CATEGORY)
    }

    pub fn progress(&self) -> Progress {
        progress(self.tasks.as_slice())
    }

    #[cfg(test)]
    pub fn validate(&self) -> Result<(), String> {
        let ids: BTreeSet<&str> = self.tasks.iter().map(|t| t.id.as_str()).collect();
        if ids.len() != self.tasks.len() {
            return Err("duplicate task ids".to_owned());
        }
        if let Some(id) = self.edit_lock() {
            if !ids.contains(id) {
                return Err(format!("edit lock on missing task {id}"));
            }
        }
        if matches!(self.mode, Mode::Edit) != self.edit.is_some() {
            return Err("edit mode and edit lock disagree".to_owned());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Up,
    Down,
    Top,
    Bottom,
    Enter,
    Backspace,
    Tab,
    BackTab,
    ToggleFocus,
    Cancel,
    Char(char),
}

/// A user-level operation on the board, independent of how it was
/// triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Load,
    Add {
        title: String,
        category: String,
        is_focus: bool,
    },
    BeginEdit {
        id: TaskId,
    },
    CommitEdit {
        id: TaskId,
        title: String,
    },
    CancelEdit,
    Complete {
        id: TaskId,
    },
    Remove {
        id: TaskId,
    },
    SaveCredential {
        value: String,
    },
    Reconnect,
    DismissAlert,
    CloseSummary,
}

#[derive(Debug, Clone)]
pub enum Msg {
    Init,
    Resize {
        width: u16,
        height: u16,
    },
    Tick {
        now_ms: u64,
        clock: Option<LocalClock>,
    },
    Action(Action),
    Paste(String),
    Command(Command),

    TasksLoaded(Result<Vec<RawTask>, String>),
    TaskCreated {
        payload: NewTask,
        result: Result<Option<RawTask>, String>,
    },
    TitleUpdated {
        id: TaskId,
        title: String,
        result: Result<(), String>,
    },
    MarkedDone {
        id: TaskId,
        result: Result<(), String>,
    },
    TaskDeleted {
        id: TaskId,
        result: Result<(), String>,
    },
    RefreshDue {
        id: TaskId,
    },
    BurstLaunched(Burst),
    SummaryMarkerLoaded(Option<String>),
    CredentialSaved(Result<bool, String>),
    RewardsLoaded(Result<Vec<Movie>, String>),

    SubscriptionStarted,
    SnapshotPushed(Vec<RawTask>),
    SubscriptionClosed {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FetchTasks,
    CreateTask { payload: NewTask },
    UpdateTitle { id: TaskId, title: String },
    MarkDone { id: TaskId },
    DeleteTask { id: TaskId },
    ScheduleRefresh { id: TaskId, delay_ms: u64 },
    Celebrate,
    LoadSummaryMarker,
    SaveSummaryMarker { date: String },
    SaveCredential { value: Option<String> },
    Subscribe,
    FetchRewards,
    Quit,
}

pub fn reduce(mut model: Model, msg: Msg) -> (Model, Vec<Effect>) {
    let mut effects = Vec::new();

    match msg {
        Msg::Init => {
            model.loading = true;
            effects.push(Effect::FetchTasks);
            effects.push(Effect::LoadSummaryMarker);
            if model.backend == BackendKind::Realtime {
                model.connection = ConnectionState::Connecting;
                effects.push(Effect::Subscribe);
            }
            if matches!(model.rewards, RewardsState::Loading) {
                effects.push(Effect::FetchRewards);
            }
        }
        Msg::Resize { width, height } => {
            model.width = width;
            model.height = height;
        }
        Msg::Tick { now_ms, clock } => {
            model.now_ms = now_ms;
            if clock.is_some() {
                model.clock = clock;
            }
            if let Some(burst) = model.burst.as_mut() {
                if !burst.advance(now_ms) {
                    model.burst = None;
                }
            }
            maybe_reconnect(&mut model, &mut effects);
        }
        Msg::Action(action) => handle_action(&mut model, action, &mut effects),
        Msg::Paste(text) => {
            if model.alert.is_none() {
                if let Some(editor) = active_editor(&mut model) {
                    editor.insert_str(&text);
                }
            }
        }
        Msg::Command(cmd) => apply_command(&mut model, cmd, &mut effects),

        Msg::TasksLoaded(result) => {
            model.loading = false;
            match result {
                Ok(records) => replace_collection(&mut model, records),
                Err(err) => fail(&mut model, "load", err),
            }
        }
        Msg::TaskCreated { payload, result } => {
            model.adding = false;
            match result {
                Ok(record) => {
                    let task = record
                        .map(|raw| normalize(&raw, model.now_ms))
                        .filter(|t| !t.id.is_empty())
                        .unwrap_or_else(|| {
                            let id = model.tasks.unique_local_id(model.now_ms);
                            local_task(id, &payload, model.now_ms)
                        });
                    let id = task.id.clone();
                    model.tasks.upsert(task);
                    model.form.editor.commit(&payload.title);
                    model.form.is_focus = false;
                    select_id(&mut model, &id);
                }
                Err(err) => fail(&mut model, "add", err),
            }
        }
        Msg::TitleUpdated { id, title, result } => {
            model.busy.remove(&id);
            match result {
                Ok(()) => {
                    model.tasks.set_title(&id, &title);
                }
                Err(err) => fail(&mut model, "edit", err),
            }
        }
        Msg::MarkedDone { id, result } => match result {
            Ok(()) => {
                model.tasks.mark_done(&id);
                effects.push(Effect::Celebrate);
                effects.push(Effect::ScheduleRefresh {
                    id,
                    delay_ms: REFRESH_AFTER_COMPLETE_MS,
                });
            }
            Err(err) => {
                model.completing.remove(&id);
                fail(&mut model, "complete", err);
            }
        },
        Msg::TaskDeleted { id, result } => {
            model.busy.remove(&id);
            match result {
                Ok(()) => {
                    model.tasks.remove(&id);
                    model.completing.remove(&id);
                    clamp_selection(&mut model);
                }
                Err(err) => fail(&mut model, "delete", err),
            }
        }
        // The redraw that follows every message is the refresh.
        Msg::RefreshDue { id } => {
            model.completing.remove(&id);
        }
        Msg::BurstLaunched(burst) => {
            model.burst = Some(burst);
        }
        Msg::SummaryMarkerLoaded(marker) => {
            model.summary_marker = MarkerState::Known(marker);
        }
        Msg::CredentialSaved(result) => match result {
            Ok(set) => {
                model.credential_set = set;
                model.status = Some(if set {
                    "credential saved".to_owned()
                } else {
                    "credential cleared".to_owned()
                });
                cmd_load(&mut model, &mut effects);
                if model.backend == BackendKind::Realtime {
                    resubscribe(&mut model, &mut effects);
                }
            }
            Err(err) => fail(&mut model, "save credential", err),
        },
        Msg::RewardsLoaded(result) => {
            model.rewards = match result {
                Ok(movies) => RewardsState::Loaded(movies),
                Err(err) => {
                    tracing::warn!(error = %err, "rewards feed failed");
                    RewardsState::Failed(err)
                }
            };
        }

        Msg::SubscriptionStarted => {
            model.connection = ConnectionState::Live;
            model.reconnect_attempt = 0;
            model.next_reconnect_ms = 0;
            model.status = None;
        }
        Msg::SnapshotPushed(records) => {
            model.connection = ConnectionState::Live;
            model.loading = false;
            replace_collection(&mut model, records);
        }
        Msg::SubscriptionClosed { reason } => {
            let was_live = matches!(model.connection, ConnectionState::Live);
            model.connection = ConnectionState::Disconnected;
            model.status = Some(format!("live updates stopped: {reason}"));
            if was_live {
                model.reconnect_attempt = 0;
            }
            if model.next_reconnect_ms == 0 && model.now_ms > 0 {
                model.next_reconnect_ms = model
                    .now_ms
                    .saturating_add(reconnect_backoff_ms(model.reconnect_attempt));
            }
        }
    }

    check_summary(&mut model, &mut effects);
    (model, effects)
}

fn handle_action(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    if model.alert.is_some() {
        match action {
            Action::Quit => effects.push(Effect::Quit),
            Action::Enter | Action::Cancel => apply_command(model, Command::DismissAlert, effects),
            _ => {}
        }
        return;
    }
    if model.summary.is_some() {
        match action {
            Action::Quit => effects.push(Effect::Quit),
            _ => apply_command(model, Command::CloseSummary, effects),
        }
        return;
    }
    if action == Action::Quit {
        effects.push(Effect::Quit);
        return;
    }

    match model.mode {
        Mode::Normal => normal_key(model, action, effects),
        Mode::Compose => compose_key(model, action, effects),
        Mode::Edit => edit_key(model, action, effects),
        Mode::Settings => settings_key(model, action, effects),
    }
}

fn normal_key(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    let selected = model.selected_task().map(|t| t.id.clone());
    match action {
        Action::Up | Action::Char('k') => model.selected = model.selected.saturating_sub(1),
        Action::Down | Action::Char('j') => {
            let len = model.tasks.len();
            if len > 0 {
                model.selected = (model.selected + 1).min(len - 1);
            }
        }
        Action::Top | Action::Char('g') => model.selected = 0,
        Action::Bottom | Action::Char('G') => model.selected = model.tasks.len().saturating_sub(1),
        Action::Enter | Action::Char('e') => {
            if let Some(id) = selected {
                apply_command(model, Command::BeginEdit { id }, effects);
            }
        }
        Action::Char('c') | Action::Char(' ') => {
            if let Some(id) = selected {
                apply_command(model, Command::Complete { id }, effects);
            }
        }
        Action::Char('d') | Action::Char('x') => {
            if let Some(id) = selected {
                apply_command(model, Command::Remove { id }, effects);
            }
        }
        Action::Char('a') | Action::Char('i') | Action::Tab => model.mode = Mode::Compose,
        Action::Char('r') => {
            apply_command(model, Command::Load, effects);
            if matches!(model.connection, ConnectionState::Disconnected) {
                apply_command(model, Command::Reconnect, effects);
            }
        }
        Action::Char('s') => {
            model.settings = Some(Editor::new());
            model.mode = Mode::Settings;
        }
        Action::Char('q') => effects.push(Effect::Quit),
        _ => {}
    }
}

fn compose_key(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    match action {
        Action::Char(ch) => model.form.editor.insert_char(ch),
        Action::Backspace => model.form.editor.backspace(),
        Action::Up => model.form.editor.history_prev(),
        Action::Down => model.form.editor.history_next(),
        Action::Tab => {
            model.form.category = (model.form.category + 1) % model.categories.len().max(1);
        }
        Action::BackTab => {
            let len = model.categories.len().max(1);
            model.form.category = (model.form.category + len - 1) % len;
        }
        Action::ToggleFocus => model.form.is_focus = !model.form.is_focus,
        Action::Enter => {
            let cmd = Command::Add {
                title: model.form.editor.buffer.clone(),
                category: model.form_category().to_owned(),
                is_focus: model.form.is_focus,
            };
            apply_command(model, cmd, effects);
        }
        Action::Cancel => model.mode = Mode::Normal,
        _ => {}
    }
}

fn edit_key(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    match action {
        Action::Enter => {
            if let Some(session) = model.edit.as_ref() {
                let cmd = Command::CommitEdit {
                    id: session.id.clone(),
                    title: session.editor.buffer.clone(),
                };
                apply_command(model, cmd, effects);
            }
        }
        Action::Cancel => apply_command(model, Command::CancelEdit, effects),
        Action::Char(ch) => {
            if let Some(session) = model.edit.as_mut() {
                session.editor.insert_char(ch);
            }
        }
        Action::Backspace => {
            if let Some(session) = model.edit.as_mut() {
                session.editor.backspace();
            }
        }
        _ => {}
    }
}

fn settings_key(model: &mut Model, action: Action, effects: &mut Vec<Effect>) {
    match action {
        Action::Enter => {
            let value = model
                .settings
                .as_ref()
                .map(|e| e.buffer.clone())
                .unwrap_or_default();
            apply_command(model, Command::SaveCredential { value }, effects);
        }
        Action::Cancel => {
            model.settings = None;
            model.mode = Mode::Normal;
        }
        Action::Char(ch) => {
            if let Some(editor) = model.settings.as_mut() {
                editor.insert_char(ch);
            }
        }
        Action::Backspace => {
            if let Some(editor) = model.settings.as_mut() {
                editor.backspace();
            }
        }
        _ => {}
    }
}

fn active_editor(model: &mut Model) -> Option<&mut Editor> {
    match model.mode {
        Mode::Normal => None,
        Mode::Compose => Some(&mut model.form.editor),
        Mode::Edit => model.edit.as_mut().map(|e| &mut e.editor),
        Mode::Settings => model.settings.as_mut(),
    }
}

pub fn apply_command(model: &mut Model, cmd: Command, effects: &mut Vec<Effect>) {
    match cmd {
        Command::Load => cmd_load(model, effects),
        Command::Add {
            title,
            category,
            is_focus,
        } => cmd_add(model, &title, &category, is_focus, effects),
        Command::BeginEdit { id } => cmd_begin_edit(model, &id),
        Command::CommitEdit { id, title } => cmd_commit_edit(model, &id, &title, effects),
        Command::CancelEdit => cmd_cancel_edit(model),
        Command::Complete { id } => cmd_complete(model, &id, effects),
        Command::Remove { id } => cmd_remove(model, &id, effects),
        Command::SaveCredential { value } => {
            let value = value.trim().to_owned();
            model.settings = None;
            if model.mode == Mode::Settings {
                model.mode = Mode::Normal;
            }
            effects.push(Effect::SaveCredential {
                value: (!value.is_empty()).then_some(value),
            });
        }
        Command::Reconnect => {
            if model.backend == BackendKind::Realtime {
                resubscribe(model, effects);
            }
        }
        Command::DismissAlert => model.alert = None,
        Command::CloseSummary => model.summary = None,
    }
}

fn cmd_load(model: &mut Model, effects: &mut Vec<Effect>) {
    if model.loading {
        return;
    }
    model.loading = true;
    effects.push(Effect::FetchTasks);
}

fn cmd_add(model: &mut Model, title: &str, category: &str, is_focus: bool, effects: &mut Vec<Effect>) {
    if model.adding {
        return;
    }
    let Ok(title) = validate_title(title) else {
        return;
    };
    model.adding = true;
    effects.push(Effect::CreateTask {
        payload: new_task_payload(title, category, is_focus),
    });
}

fn cmd_begin_edit(model: &mut Model, id: &str) {
    if model.busy.contains(id) {
        return;
    }
    let Some(task) = model.tasks.get(id) else {
        return;
    };
    model.edit = Some(EditSession {
        id: id.to_owned(),
        editor: Editor::seeded(&task.title),
    });
    model.mode = Mode::Edit;
    model.settings = None;
    select_id(model, id);
}

fn cmd_commit_edit(model: &mut Model, id: &str, title: &str, effects: &mut Vec<Effect>) {
    if !model.is_editing(id) {
        return;
    }
    end_edit(model);

    match validate_title(title) {
        Err(_) => cmd_remove(model, id, effects),
        Ok(title) => {
            if !model.busy.insert(id.to_owned()) {
                return;
            }
            effects.push(Effect::UpdateTitle {
                id: id.to_owned(),
                title: title.to_owned(),
            });
        }
    }
}

fn cmd_cancel_edit(model: &mut Model) {
    end_edit(model);
}

fn cmd_complete(model: &mut Model, id: &str, effects: &mut Vec<Effect>) {
    let Some(task) = model.tasks.get(id) else {
        return;
    };
    if task.done || model.completing.contains(id) || model.busy.contains(id) {
        return;
    }
    model.completing.insert(id.to_owned());
    effects.push(Effect::MarkDone { id: id.to_owned() });
}

fn cmd_remove(model: &mut Model, id: &str, effects: &mut Vec<Effect>) {
    if !model.tasks.contains(id) || model.busy.contains(id) {
        return;
    }
    if model.is_editing(id) {
        end_edit(model);
    }
    model.busy.insert(id.to_owned());
    effects.push(Effect::DeleteTask { id: id.to_owned() });
}

fn end_edit(model: &mut Model) {
    model.edit = None;
    if model.mode == Mode::Edit {
        model.mode = Mode::Normal;
    }
}

fn resubscribe(model: &mut Model, effects: &mut Vec<Effect>) {
    model.connection = ConnectionState::Connecting;
    model.reconnect_attempt = 0;
    model.next_reconnect_ms = 0;
    effects.push(Effect::Subscribe);
}

/// Swaps in a fetched or pushed collection. An edit survives only while its
/// task is still present.
fn replace_collection(model: &mut Model, records: Vec<RawTask>) {
    let now_ms = model.now_ms;
    let selected = model.selected_task().map(|t| t.id.clone());
    let tasks = records.iter().map(|raw| normalize(raw, now_ms)).collect();
    let dropped = model.tasks.replace_all(tasks);
    if dropped > 0 {
        tracing::warn!(dropped, "ignored records with missing or repeated ids");
    }

    if let Some(id) = model.edit_lock().map(str::to_owned) {
        if !model.tasks.contains(&id) {
            end_edit(model);
        }
    }
    let tasks = &model.tasks;
    model.busy.retain(|id| tasks.contains(id));

    match selected {
        Some(id) if model.tasks.contains(&id) => select_id(model, &id),
        _ => clamp_selection(model),
    }
}

fn select_id(model: &mut Model, id: &str) {
    if let Some(idx) = model.visible_ids().iter().position(|v| v == id) {
        model.selected = idx;
    }
}

fn clamp_selection(model: &mut Model) {
    let len = model.tasks.len();
    model.selected = if len == 0 {
        0
    } else {
        model.selected.min(len - 1)
    };
}

fn fail(model: &mut Model, op: &str, err: String) {
    tracing::error!(op, error = %err, "board operation failed");
    model.alert = Some(format!("{op} failed: {err}"));
}

fn check_summary(model: &mut Model, effects: &mut Vec<Effect>) {
    if model.summary.is_some() {
        return;
    }
    let MarkerState::Known(last) = &model.summary_marker else {
        return;
    };
    let Some(clock) = model.clock else {
        return;
    };
    let Some(summary) = daily_summary_due(&model.progress(), &clock, last.as_deref()) else {
        return;
    };

    model.summary_marker = MarkerState::Known(Some(summary.date_key.clone()));
    effects.push(Effect::SaveSummaryMarker {
        date: summary.date_key.clone(),
    });
    model.summary = Some(summary);
}

const RECONNECT_BASE_MS: u64 = 500;
const RECONNECT_MAX_MS: u64 = 10_000;
const RECONNECT_MAX_ATTEMPTS: u32 = 10;

fn reconnect_backoff_ms(attempt: u32) -> u64 {
    let shift = attempt.min(20);
    let exp = 1u64 << shift;
    RECONNECT_BASE_MS.saturating_mul(exp).min(RECONNECT_MAX_MS)
}

fn maybe_reconnect(model: &mut Model, effects: &mut Vec<Effect>) {
    if !matches!(model.connection, ConnectionState::Disconnected)
        || model.reconnect_attempt >= RECONNECT_MAX_ATTEMPTS
    {
        return;
    }
    if model.next_reconnect_ms == 0 && model.now_ms > 0 {
        model.next_reconnect_ms = model
            .now_ms
            .saturating_add(reconnect_backoff_ms(model.reconnect_attempt));
    }
    if model.next_reconnect_ms == 0 || model.now_ms < model.next_reconnect_ms {
        return;
    }

    model.connection = ConnectionState::Connecting;
    effects.push(Effect::Subscribe);
    model.reconnect_attempt = model.reconnect_attempt.saturating_add(1);
    model.next_reconnect_ms = model
        .now_ms
        .saturating_add(reconnect_backoff_ms(model.reconnect_attempt));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HelpItem {
    pub key: &'static str,
    pub desc: &'static str,
}

pub fn help_items(model: &Model) -> Vec<HelpItem> {
    let item = |key, desc| HelpItem { key, desc };

    if model.alert.is_some() {
        return vec![item("Enter", "dismiss"), item("Ctrl+C", "quit")];
    }
    if model.summary.is_some() {
        return vec![item("any key", "close")];
    }

    match model.mode {
        Mode::Compose => vec![
            item("Enter", "add"),
            item("Tab", "category"),
            item("Ctrl+T", "focus"),
            item("↑/↓", "history"),
            item("Esc", "back"),
        ],
        Mode::Edit => vec![item("Enter", "save"), item("Esc", "cancel")],
        Mode::Settings => vec![item("Enter", "save key"), item("Esc", "cancel")],
        Mode::Normal => {
            let mut items = vec![
                item("a", "add"),
                item("c", "complete"),
                item("e", "edit"),
                item("d", "delete"),
                item("j/k", "move"),
                item("r", "reload"),
                item("s", "api key"),
                item("q", "quit"),
            ];
            if model.tasks.is_empty() {
                items.retain(|i| !matches!(i.key, "c" | "e" | "d" | "j/k"));
            }
            items
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(id: &str, title: &str, created_at: u64) -> RawTask {
        RawTask::from_value(json!({
            "_id": id,
            "title": title,
            "createdAt": created_at,
            "category": "Work",
        }))
        .unwrap()
    }

    fn loaded(records: Vec<RawTask>) -> Model {
        let model = Model::new(BackendKind::Rest, vec!["Work".to_owned(), "Home".to_owned()]);
        let (model, _) = reduce(model, Msg::TasksLoaded(Ok(records)));
        model
    }

    fn cmd(model: Model, cmd: Command) -> (Model, Vec<Effect>) {
        reduce(model, Msg::Command(cmd))
    }

    #[test]
    fn init_fetches_tasks_and_marker_and_subscribes_for_realtime() {
        let model = Model::new(BackendKind::Rest, vec![]);
        let (model, effects) = reduce(model, Msg::Init);
        assert!(model.loading);
        assert_eq!(effects, vec![Effect::FetchTasks, Effect::LoadSummaryMarker]);

        let model = Model::new(BackendKind::Realtime, vec![]).with_rewards(true);
        let (model, effects) = reduce(model, Msg::Init);
        assert_eq!(model.connection, ConnectionState::Connecting);
        assert!(effects.contains(&Effect::Subscribe));
        assert!(effects.contains(&Effect::FetchRewards));
    }

    #[test]
    fn load_failure_keeps_previous_collection_and_alerts() {
        let model = loaded(vec![raw("a", "one", 1)]);
        let (model, effects) = cmd(model, Command::Load);
        assert_eq!(effects, vec![Effect::FetchTasks]);
        let (model, _) = reduce(model, Msg::TasksLoaded(Err("boom".to_owned())));
        assert_eq!(model.tasks.len(), 1);
        assert!(!model.loading);
        assert_eq!(model.alert.as_deref(), Some("load failed: boom"));
    }

    #[test]
    fn blank_add_is_ignored_and_in_flight_add_blocks_second_submit() {
        let model = loaded(vec![]);
        let (model, effects) = cmd(
            model,
            Command::Add {
                title: "   ".to_owned(),
                category: "Work".to_owned(),
                is_focus: false,
            },
        );
        assert!(effects.is_empty());
        assert!(!model.adding);

        let add = Command::Add {
            title: " Buy milk ".to_owned(),
            category: "Home".to_owned(),
            is_focus: true,
        };
        let (model, effects) = cmd(model, add.clone());
        assert!(model.adding);
        let [Effect::CreateTask { payload }] = effects.as_slice() else {
            panic!("expected create, got {effects:?}");
        };
        assert_eq!(payload.title, "Buy milk");
        assert_eq!(payload.estimated_time, 40);
        assert!(payload.is_focus);

        let (_model, effects) = cmd(model, add);
        assert!(effects.is_empty());
    }

    #[test]
    fn create_without_echo_gets_a_local_id() {
        let mut model = loaded(vec![]);
        model.now_ms = 36;
        model.form.editor.buffer = "x".to_owned();
        model.form.is_focus = true;
        let payload = new_task_payload("x", "Work", true);
        let (model, _) = reduce(
            model,
            Msg::TaskCreated {
                payload,
                result: Ok(None),
            },
        );
        assert_eq!(model.tasks.len(), 1);
        assert_eq!(model.tasks.as_slice()[0].id, "local-10");
        assert_eq!(model.form.editor.buffer, "");
        assert!(!model.form.is_focus);
        assert!(!model.adding);
    }

    #[test]
    fn create_failure_keeps_input() {
        let mut model = loaded(vec![]);
        model.adding = true;
        model.form.editor.buffer = "keep me".to_owned();
        let (model, _) = reduce(
            model,
            Msg::TaskCreated {
                payload: new_task_payload("keep me", "Work", false),
                result: Err("503".to_owned()),
            },
        );
        assert!(model.tasks.is_empty());
        assert_eq!(model.form.editor.buffer, "keep me");
        assert!(model.alert.is_some());
    }

    #[test]
    fn begin_edit_moves_the_lock_and_discards_unsaved_text() {
        let model = loaded(vec![raw("x", "ex", 1), raw("y", "why", 2)]);
        let (mut model, _) = cmd(model, Command::BeginEdit { id: "x".to_owned() });
        model.edit.as_mut().unwrap().editor.buffer = "unsaved".to_owned();

        let (model, effects) = cmd(model, Command::BeginEdit { id: "y".to_owned() });
        assert!(effects.is_empty());
        assert_eq!(model.edit_lock(), Some("y"));
        assert_eq!(model.edit.as_ref().unwrap().editor.buffer, "why");
        assert_eq!(model.tasks.get("x").unwrap().title, "ex");
        model.validate().unwrap();
    }

    #[test]
    fn commit_edit_requires_the_lock_and_empty_title_deletes() {
        let model = loaded(vec![raw("x", "ex", 1)]);
        let (model, effects) = cmd(
            model,
            Command::CommitEdit {
                id: "x".to_owned(),
                title: "new".to_owned(),
            },
        );
        assert!(effects.is_empty());

        let (model, _) = cmd(model, Command::BeginEdit { id: "x".to_owned() });
        let (model, effects) = cmd(
            model,
            Command::CommitEdit {
                id: "x".to_owned(),
                title: "  ".to_owned(),
            },
        );
        assert_eq!(effects, vec![Effect::DeleteTask { id: "x".to_owned() }]);
        assert_eq!(model.edit_lock(), None);
        assert_eq!(model.mode, Mode::Normal);
        model.validate().unwrap();
    }

    #[test]
    fn complete_is_single_flight_and_schedules_refresh() {
        let model = loaded(vec![raw("a", "one", 1)]);
        let (model, effects) = cmd(model, Command::Complete { id: "a".to_owned() });
        assert_eq!(effects, vec![Effect::MarkDone { id: "a".to_owned() }]);
        let (model, effects) = cmd(model, Command::Complete { id: "a".to_owned() });
        assert!(effects.is_empty());

        let (model, effects) = reduce(
            model,
            Msg::MarkedDone {
                id: "a".to_owned(),
                result: Ok(()),
            },
        );
        assert!(model.tasks.get("a").unwrap().done);
        assert_eq!(
            effects,
            vec![
                Effect::Celebrate,
                Effect::ScheduleRefresh {
                    id: "a".to_owned(),
                    delay_ms: REFRESH_AFTER_COMPLETE_MS,
                },
            ]
        );
        assert!(model.completing.contains("a"));

        let (model, effects) = reduce(model, Msg::RefreshDue { id: "a".to_owned() });
        assert!(!model.completing.contains("a"));
        assert!(!model.loading);
        assert!(effects.is_empty());
    }

    #[test]
    fn complete_failure_reverts_marker() {
        let model = loaded(vec![raw("a", "one", 1)]);
        let (model, _) = cmd(model, Command::Complete { id: "a".to_owned() });
        let (model, _) = reduce(
            model,
            Msg::MarkedDone {
                id: "a".to_owned(),
                result: Err("nope".to_owned()),
            },
        );
        assert!(!model.tasks.get("a").unwrap().done);
        assert!(model.completing.is_empty());
        assert_eq!(model.alert.as_deref(), Some("complete failed: nope"));
    }

    #[test]
    fn remove_clears_lock_and_delete_failure_keeps_task() {
        let model = loaded(vec![raw("a", "one", 1)]);
        let (model, _) = cmd(model, Command::BeginEdit { id: "a".to_owned() });
        let (model, effects) = cmd(model, Command::Remove { id: "a".to_owned() });
        assert_eq!(model.edit_lock(), None);
        assert_eq!(effects, vec![Effect::DeleteTask { id: "a".to_owned() }]);

        let (model, _) = reduce(
            model,
            Msg::TaskDeleted {
                id: "a".to_owned(),
                result: Err("500".to_owned()),
            },
        );
        assert!(model.tasks.contains("a"));
        assert!(model.busy.is_empty());
        assert!(model.alert.is_some());
    }

    #[test]
    fn alert_blocks_keys_until_dismissed() {
        let mut model = loaded(vec![raw("a", "one", 1)]);
        model.alert = Some("x".to_owned());
        let (model, effects) = reduce(model, Msg::Action(Action::Char('c')));
        assert!(effects.is_empty());
        let (model, _) = reduce(model, Msg::Action(Action::Enter));
        assert!(model.alert.is_none());
    }

    #[test]
    fn push_mid_edit_keeps_lock_while_task_exists() {
        let model = loaded(vec![raw("a", "one", 1), raw("b", "two", 2)]);
        let (model, _) = cmd(model, Command::BeginEdit { id: "a".to_owned() });

        let (model, _) = reduce(
            model,
            Msg::SnapshotPushed(vec![raw("a", "one (remote)", 1), raw("b", "two", 2)]),
        );
        assert_eq!(model.edit_lock(), Some("a"));
        assert_eq!(model.edit.as_ref().unwrap().editor.buffer, "one");

        let (model, _) = reduce(model, Msg::SnapshotPushed(vec![raw("b", "two", 2)]));
        assert_eq!(model.edit_lock(), None);
        model.validate().unwrap();
    }

    #[test]
    fn compose_keys_cycle_category_and_toggle_focus() {
        let model = loaded(vec![]);
        let (model, _) = reduce(model, Msg::Action(Action::Char('a')));
        assert_eq!(model.mode, Mode::Compose);
        assert_eq!(model.form_category(), "Work");
        let (model, _) = reduce(model, Msg::Action(Action::Tab));
        assert_eq!(model.form_category(), "Home");
        let (model, _) = reduce(model, Msg::Action(Action::BackTab));
        assert_eq!(model.form_category(), "Work");
        let (model, _) = reduce(model, Msg::Action(Action::ToggleFocus));
        assert!(model.form.is_focus);
        let (model, _) = reduce(model, Msg::Paste("tea".to_owned()));
        let (_model, effects) = reduce(model, Msg::Action(Action::Enter));
        assert!(matches!(
            effects.as_slice(),
            [Effect::CreateTask { payload }] if payload.title == "tea" && payload.is_focus
        ));
    }

    #[test]
    fn subscription_close_then_tick_reconnects_with_backoff() {
        let model = Model::new(BackendKind::Realtime, vec![]);
        let (model, _) = reduce(model, Msg::SubscriptionStarted);
        let (model, _) = reduce(
            model,
            Msg::Tick {
                now_ms: 1_000,
                clock: None,
            },
        );
        let (model, _) = reduce(
            model,
            Msg::SubscriptionClosed {
                reason: "cancel".to_owned(),
            },
        );
        assert_eq!(model.connection, ConnectionState::Disconnected);
        assert_eq!(model.next_reconnect_ms, 1_500);

        let (model, effects) = reduce(
            model,
            Msg::Tick {
                now_ms: 1_200,
                clock: None,
            },
        );
        assert!(effects.is_empty());
        let (model, effects) = reduce(
            model,
            Msg::Tick {
                now_ms: 1_500,
                clock: None,
            },
        );
        assert_eq!(effects, vec![Effect::Subscribe]);
        assert_eq!(model.connection, ConnectionState::Connecting);
    }

    #[test]
    fn reconnect_backoff_is_exponential_and_clamped() {
        assert_eq!(reconnect_backoff_ms(0), 500);
        assert_eq!(reconnect_backoff_ms(1), 1_000);
        assert_eq!(reconnect_backoff_ms(5), 10_000);
        assert_eq!(reconnect_backoff_ms(40), 10_000);
    }

    #[test]
    fn summary_opens_once_per_date() {
        use time::{Date, Month};

        let mut model = loaded(vec![raw("a", "one", 1)]);
        model.tasks.mark_done("a");
        let (model, effects) = reduce(model, Msg::SummaryMarkerLoaded(None));
        assert!(effects.is_empty());

        let clock = LocalClock {
            date: Date::from_calendar_date(2026, Month::March, 4).unwrap(),
            hour: 23,
        };
        let (model, effects) = reduce(
            model,
            Msg::Tick {
                now_ms: 1,
                clock: Some(clock),
            },
        );
        assert_eq!(
            effects,
            vec![Effect::SaveSummaryMarker {
                date: "2026-03-04".to_owned()
            }]
        );
        assert_eq!(model.summary.as_ref().unwrap().minutes, 40);

        let (model, _) = reduce(model, Msg::Action(Action::Char('z')));
        assert!(model.summary.is_none());
        let (model, effects) = reduce(
            model,
            Msg::Tick {
                now_ms: 2,
                clock: Some(clock),
            },
        );
        assert!(effects.is_empty());
        assert!(model.summary.is_none());
    }

    #[test]
    fn settings_submit_saves_trimmed_credential() {
        let model = loaded(vec![]);
        let (model, _) = reduce(model, Msg::Action(Action::Char('s')));
        assert_eq!(model.mode, Mode::Settings);
        let (model, _) = reduce(model, Msg::Paste(" tok ".to_owned()));
        let (model, effects) = reduce(model, Msg::Action(Action::Enter));
        assert_eq!(model.mode, Mode::Normal);
        assert_eq!(
            effects,
            vec![Effect::SaveCredential {
                value: Some("tok".to_owned())
            }]
        );

        let (model, effects) = reduce(model, Msg::CredentialSaved(Ok(true)));
        assert!(model.credential_set);
        assert_eq!(effects, vec![Effect::FetchTasks]);
    }

    #[test]
    fn selection_follows_display_order() {
        let model = loaded(vec![
            RawTask::from_value(json!({"_id": "b", "title": "B", "category": "Zeta", "createdAt": 1})).unwrap(),
            RawTask::from_value(json!({"_id": "a", "title": "A", "category": "Alpha", "createdAt": 2})).unwrap(),
        ]);
        assert_eq!(model.selected_task().unwrap().id, "a");
        let (model, _) = reduce(model, Msg::Action(Action::Down));
        assert_eq!(model.selected_task().unwrap().id, "b");
        let (model, _) = reduce(model, Msg::Action(Action::Down));
        assert_eq!(model.selected_task().unwrap().id, "b");
    }
}
