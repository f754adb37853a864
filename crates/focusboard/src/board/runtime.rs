use std::io::{self, Stdout};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use crossterm::event::{Event as CEvent, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::event::{DisableBracketedPaste, EnableBracketedPaste};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, terminal};
use focusboard_core::summary::LocalClock;
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use time::UtcOffset;
use tokio::sync::mpsc;

use super::core::{reduce, Action, Model, Msg};
use super::effects::{apply_effects, Outbox, Services};
use super::{unix_epoch_ms, view, BoardSettings};
use crate::store::{SnapshotResult, Subscription};

const TICK_MS: u64 = 50;

enum Wake {
    Msg(Msg),
    Pushed(Option<SnapshotResult>),
    Opened(Subscription),
}

struct TerminalGuard {
    stdout: Stdout,
}

impl TerminalGuard {
    fn enter() -> Result<(Self, Terminal<CrosstermBackend<Stdout>>)> {
        enable_raw_mode().context("enable raw mode")?;

        let mut stdout = io::stdout();
        execute!(
            stdout,
            EnterAlternateScreen,
            EnableBracketedPaste,
            terminal::Clear(terminal::ClearType::All)
        )
        .context("enter alt screen")?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).context("create terminal")?;

        Ok((
            Self {
                stdout: io::stdout(),
            },
            terminal,
        ))
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, DisableBracketedPaste, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

pub async fn run(services: Services, settings: BoardSettings) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));

    let (_guard, mut terminal) = TerminalGuard::enter()?;

    let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<Msg>();
    let (sub_tx, mut sub_rx) = mpsc::unbounded_channel::<Subscription>();
    let outbox = Outbox {
        msgs: msg_tx.clone(),
        subscriptions: sub_tx,
    };
    spawn_input_pump(msg_tx.clone(), shutdown.clone());
    spawn_tick_pump(msg_tx.clone(), shutdown.clone(), settings.utc_offset);

    let mut model = Model::new(services.store.kind(), settings.categories.clone())
        .with_rewards(services.rewards.is_some())
        .with_credential(settings.credential_set);
    let size = terminal.size().context("terminal size")?;
    (model, _) = reduce(
        model,
        Msg::Resize {
            width: size.width,
            height: size.height,
        },
    );
    let now_ms = unix_epoch_ms();
    (model, _) = reduce(
        model,
        Msg::Tick {
            now_ms,
            clock: Some(LocalClock::at(now_ms, settings.utc_offset)),
        },
    );

    let mut subscription: Option<Subscription> = None;

    let (next, effects) = reduce(model, Msg::Init);
    let (mut model, quit) =
        apply_effects(next, effects, &services, Some(&outbox), &mut subscription).await;
    if quit {
        shutdown.store(true, Ordering::Relaxed);
        return Ok(());
    }

    terminal.draw(|f| view::draw(f, &model)).context("draw")?;

    loop {
        let wake = tokio::select! {
            msg = msg_rx.recv() => {
                let Some(msg) = msg else { break };
                Wake::Msg(msg)
            }
            Some(sub) = sub_rx.recv() => Wake::Opened(sub),
            pushed = async {
                match subscription.as_mut() {
                    Some(s) => s.recv().await,
                    None => None,
                }
            }, if subscription.is_some() => Wake::Pushed(pushed),
        };

        let msg = match wake {
            Wake::Msg(msg) => msg,
            Wake::Opened(sub) => {
                subscription = Some(sub);
                Msg::SubscriptionStarted
            }
            Wake::Pushed(Some(Ok(records))) => Msg::SnapshotPushed(records),
            Wake::Pushed(Some(Err(err))) => {
                subscription = None;
                Msg::SubscriptionClosed {
                    reason: err.to_string(),
                }
            }
            Wake::Pushed(None) => {
                subscription = None;
                Msg::SubscriptionClosed {
                    reason: "subscription ended".to_owned(),
                }
            }
        };

        let (next, effects) = reduce(model, msg);
        let (next, quit) =
            apply_effects(next, effects, &services, Some(&outbox), &mut subscription).await;
        model = next;
        terminal.draw(|f| view::draw(f, &model)).context("draw")?;
        if quit {
            break;
        }
    }

    shutdown.store(true, Ordering::Relaxed);
    Ok(())
}

fn spawn_input_pump(tx: mpsc::UnboundedSender<Msg>, shutdown: Arc<AtomicBool>) {
    tokio::task::spawn_blocking(move || {
        while !shutdown.load(Ordering::Relaxed) {
            let ready = match crossterm::event::poll(Duration::from_millis(50)) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if !ready {
                continue;
            }

            let evt = match crossterm::event::read() {
                Ok(evt) => evt,
                Err(_) => continue,
            };

            let msg = match evt {
                CEvent::Key(key) => map_key(key).map(Msg::Action),
                CEvent::Paste(text) => Some(Msg::Paste(text)),
                CEvent::Resize(w, h) => Some(Msg::Resize {
                    width: w,
                    height: h,
                }),
                _ => None,
            };

            if let Some(msg) = msg {
                if tx.send(msg).is_err() {
                    break;
                }
            }
        }
    });
}

fn spawn_tick_pump(tx: mpsc::UnboundedSender<Msg>, shutdown: Arc<AtomicBool>, offset: UtcOffset) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let now_ms = unix_epoch_ms();
            let _ = tx.send(Msg::Tick {
                now_ms,
                clock: Some(LocalClock::at(now_ms, offset)),
            });
        }
    });
}

fn map_key(key: KeyEvent) -> Option<Action> {
    if !matches!(key.kind, KeyEventKind::Press) {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(Action::Quit),
            KeyCode::Char('t') => Some(Action::ToggleFocus),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Tab => Some(Action::Tab),
        KeyCode::BackTab => Some(Action::BackTab),
        KeyCode::Esc => Some(Action::Cancel),
        KeyCode::Up => Some(Action::Up),
        KeyCode::Down => Some(Action::Down),
        KeyCode::Home => Some(Action::Top),
        KeyCode::End => Some(Action::Bottom),
        KeyCode::Backspace => Some(Action::Backspace),
        KeyCode::Enter => Some(Action::Enter),
        KeyCode::Char(c) => {
            if key.modifiers.contains(KeyModifiers::ALT) {
                None
            } else {
                Some(Action::Char(c))
            }
        }
        _ => None,
    }
}
