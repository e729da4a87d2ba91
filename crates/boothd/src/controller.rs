use crate::camera::{Camera, CaptureContext, Surface};
use crate::deck::DeckLoader;
use crate::input;
use crate::presenter::Presenter;
use crate::state_machine::{Command, GameMachine, State, Trigger};
use crate::timer::TimerSlot;
use anyhow::{Context, Result};
use booth_core::cards::{self, Card};
use booth_core::config::Config;
use booth_core::ipc::InputAction;
use rand::seq::SliceRandom;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// What the IPC server reports for `get_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: State,
    pub activity_delay_ms: u64,
    pub cards_remaining: usize,
}

/// Fixed delays used while running commands.
#[derive(Debug, Clone, Copy)]
struct Delays {
    first_shot: Duration,
    between_pictures: Duration,
    burst_show: Duration,
}

pub struct GameController {
    machine: GameMachine,
    deck: Vec<Card>,
    timer: TimerSlot,
    /// Triggers raised while a command runs; drained in order by `emit_trigger`.
    queue: VecDeque<(Trigger, &'static str)>,
    camera: Box<dyn Camera>,
    presenter: Box<dyn Presenter>,
    loader: Box<dyn DeckLoader>,
    delays: Delays,
    status_tx: watch::Sender<StatusSnapshot>,
}

impl GameController {
    pub fn new(
        config: &Config,
        camera: Box<dyn Camera>,
        presenter: Box<dyn Presenter>,
        loader: Box<dyn DeckLoader>,
    ) -> Self {
        let machine = GameMachine::new(config);
        let (status_tx, _) = watch::channel(StatusSnapshot {
            state: machine.state(),
            activity_delay_ms: machine.activity_delay_ms(),
            cards_remaining: 0,
        });
        Self {
            machine,
            deck: Vec::new(),
            timer: TimerSlot::new(),
            queue: VecDeque::new(),
            camera,
            presenter,
            loader,
            delays: Delays {
                first_shot: Duration::from_millis(config.capture.first_shot_delay_ms),
                between_pictures: Duration::from_millis(config.capture.between_pictures_ms),
                burst_show: Duration::from_millis(config.burst.show_ms),
            },
            status_tx,
        }
    }

    /// Show the start card and load the shuffled deck. A deck that cannot be
    /// loaded is fatal; nothing else here is.
    pub async fn mount(&mut self) -> Result<()> {
        info!("mounting game controller");
        if let Err(e) = self.presenter.render(&cards::start_card()) {
            warn!(error = %e, "could not render start card");
        }

        let mut deck = self.loader.load().await.context("loading deck")?;
        deck.shuffle(&mut rand::thread_rng());
        info!(size = deck.len(), "deck loaded and shuffled");
        self.deck = deck;
        self.publish_status();
        Ok(())
    }

    pub fn status(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> State {
        self.machine.state()
    }

    /// Process inputs and timer expiries, one trigger at a time, until every
    /// input source has closed and no timer is pending.
    pub async fn run(&mut self, mut inputs: mpsc::UnboundedReceiver<InputAction>) {
        loop {
            let deadline = self.timer.deadline();
            let sleep_fut = match deadline {
                Some(dl) => tokio::time::sleep_until(dl),
                None => tokio::time::sleep(Duration::from_secs(86400)),
            };

            tokio::select! {
                Some(action) = inputs.recv() => {
                    if let Some(trigger) = input::trigger_for(action, self.machine.state()) {
                        self.emit_trigger(trigger, "input").await;
                    }
                }
                _ = sleep_fut, if deadline.is_some() => {
                    self.fire_timer().await;
                }
                else => break,
            }
        }
        info!("input closed and no timer pending; controller loop done");
    }

    /// Emit whatever the timer slot holds. Called when its deadline passed.
    pub async fn fire_timer(&mut self) {
        if let Some(trigger) = self.timer.take() {
            self.emit_trigger(trigger, "timer").await;
        }
    }

    /// Single entry point for every trigger. Triggers raised by a running
    /// command are queued and handled after it, never recursively.
    pub async fn emit_trigger(&mut self, trigger: Trigger, source: &'static str) {
        self.queue.push_back((trigger, source));
        while let Some((trigger, source)) = self.queue.pop_front() {
            info!(?trigger, source, state = %self.machine.state(), "emitting trigger");
            let command = self.machine.next_command(trigger);
            self.execute(command, trigger).await;
        }
        self.publish_status();
    }

    /// Release the camera and drop the pending timer.
    pub fn shutdown(&mut self) {
        info!("shutting down game controller");
        self.timer.clear();
        self.camera.stop();
    }

    async fn execute(&mut self, command: Command, trigger: Trigger) {
        info!(?command, ?trigger, state = %self.machine.state(), "executing command");
        let result = match command {
            Command::None => Ok(()),
            Command::ToggleFullscreen => {
                self.presenter.toggle_fullscreen().await;
                Ok(())
            }
            Command::Schedule { trigger, delay_ms } => {
                self.timer.schedule(trigger, Duration::from_millis(delay_ms));
                Ok(())
            }
            Command::EnterSetup => self.enter_setup().await,
            Command::ExitSetup(previous) => self.exit_setup(previous),
            Command::EnterPause => self.enter_pause(),
            Command::ExitPause(previous) => self.exit_pause(previous),
            Command::RunActivity => self.run_activity().await,
            Command::ShowBurst => self.show_burst().await,
            Command::EndBurst(previous) => self.end_burst(previous),
        };

        if let Err(e) = result {
            error!(error = %format!("{:#}", e), ?command, "command execution failed; starting recovery");
            self.recover();
        }
    }

    fn enqueue(&mut self, trigger: Trigger, source: &'static str) {
        self.queue.push_back((trigger, source));
    }

    async fn run_activity(&mut self) -> Result<()> {
        let Some(card) = self.deck.pop() else {
            info!("deck exhausted; ending game");
            self.machine.end_game();
            return self.presenter.render(&cards::end_card());
        };

        info!(
            cards_remaining = self.deck.len(),
            next_delay_ms = self.machine.activity_delay_ms(),
            "running activity"
        );
        let surface = self.camera.start().await?;
        self.presenter.render(&card)?;

        self.capture_after_delay(&card, &surface, self.delays.first_shot).await?;
        self.capture_after_delay(&card, &surface, self.delays.between_pictures).await?;
        self.capture_after_delay(&card, &surface, self.delays.between_pictures).await?;

        self.camera.stop();
        self.timer.wait(self.delays.between_pictures).await;

        self.presenter.render_idle()?;
        self.enqueue(Trigger::ActivityCompleted, "activity");
        Ok(())
    }

    async fn capture_after_delay(&mut self, card: &Card, surface: &Surface, delay: Duration) -> Result<()> {
        info!(delay_ms = delay.as_millis() as u64, "waiting before capture");
        self.timer.wait(delay).await;
        self.take_picture(card, surface).await
    }

    /// Flash, capture, and show the result if there is one.
    async fn take_picture(&mut self, card: &Card, surface: &Surface) -> Result<()> {
        self.presenter.flash();
        let ctx = CaptureContext { card, surface };
        if let Some(image) = self.camera.capture(&ctx).await {
            self.presenter.render_captured_image(&image)?;
        }
        Ok(())
    }

    async fn show_burst(&mut self) -> Result<()> {
        info!("starting burst photo step");
        self.timer.clear();

        let surface = self.camera.start().await?;
        let card = cards::burst_card();
        self.presenter.render(&card)?;
        self.take_picture(&card, &surface).await?;
        self.timer.wait(self.delays.burst_show).await;

        self.presenter.clear_captured_image()?;
        self.camera.stop();
        self.presenter.render_idle()?;
        self.enqueue(Trigger::BurstPictureTaken, "burst");
        Ok(())
    }

    async fn enter_setup(&mut self) -> Result<()> {
        info!("entering setup mode");
        self.timer.clear();
        let surface = self.camera.start().await?;
        self.presenter.render_setup(&surface)
    }

    fn exit_setup(&mut self, previous: State) -> Result<()> {
        info!(%previous, "exiting setup mode");
        self.camera.stop();
        self.restore_view(previous)
    }

    fn enter_pause(&mut self) -> Result<()> {
        info!("entering pause mode");
        self.timer.clear();
        self.presenter.render_pause()
    }

    fn exit_pause(&mut self, previous: State) -> Result<()> {
        info!(%previous, "exiting pause mode");
        self.restore_view(previous)
    }

    fn end_burst(&mut self, previous: State) -> Result<()> {
        info!(%previous, "ending burst mode");
        self.timer.clear();
        self.camera.stop();
        self.presenter.clear_captured_image()?;
        self.restore_view(previous)
    }

    /// Re-arm the timer of a state we return to, then re-render its screen.
    fn restore_view(&mut self, previous: State) -> Result<()> {
        match previous {
            State::Idle => {
                self.schedule_activity(self.machine.activity_delay_ms());
                self.presenter.render_idle()?;
            }
            State::BurstIdle => {
                self.schedule_burst(self.machine.burst_interval_ms());
                self.presenter.render_idle()?;
            }
            State::Ended => self.presenter.render(&cards::end_card())?,
            State::NotStarted => self.presenter.render(&cards::start_card())?,
            other => warn!(state = %other, "no view to restore"),
        }
        Ok(())
    }

    fn schedule_activity(&mut self, delay_ms: u64) {
        self.timer.schedule(Trigger::TimerActivity, Duration::from_millis(delay_ms));
    }

    fn schedule_burst(&mut self, delay_ms: u64) {
        self.timer.schedule(Trigger::TimerBurst, Duration::from_millis(delay_ms));
    }

    /// Bring the display back to a coherent screen after a failed command.
    /// Keyed on the state at the time of failure, not on the error. Failures
    /// inside recovery are logged and never recovered from again.
    pub fn recover(&mut self) {
        let state = self.machine.state();
        warn!(%state, previous = %self.machine.previous_state(), "running recovery flow");

        match state {
            State::Activity => {
                // Count the failed activity as done so the schedule moves on.
                self.camera.stop();
                log_failure(self.presenter.render_idle());
                self.enqueue(Trigger::ActivityCompleted, "recovery");
            }
            State::BurstPhoto | State::BurstIdle => {
                self.timer.clear();
                self.camera.stop();
                log_failure(self.presenter.clear_captured_image());
                self.machine.force_state(State::BurstIdle);
                self.schedule_burst(self.machine.retry_delay_ms());
            }
            State::Idle => {
                self.timer.clear();
                self.camera.stop();
                self.machine.force_state(State::Idle);
                log_failure(self.presenter.render_idle());
                self.schedule_activity(self.machine.activity_delay_ms());
            }
            State::Setup | State::Paused => {
                self.timer.clear();
                self.camera.stop();
                let previous = self.machine.restore_previous();
                log_failure(self.restore_view(previous));
            }
            State::Ended => {
                self.timer.clear();
                self.camera.stop();
                log_failure(self.presenter.render(&cards::end_card()));
            }
            State::NotStarted => {
                self.timer.clear();
                self.camera.stop();
                self.machine.force_state(State::NotStarted);
                log_failure(self.presenter.render(&cards::start_card()));
                warn!("recovery returned to start state");
            }
        }
    }

    fn publish_status(&self) {
        self.status_tx.send_replace(StatusSnapshot {
            state: self.machine.state(),
            activity_delay_ms: self.machine.activity_delay_ms(),
            cards_remaining: self.deck.len(),
        });
    }

    #[cfg(test)]
    fn pending_timer(&self) -> Option<(Trigger, u64)> {
        self.timer
            .pending()
            .map(|p| (p.trigger, p.delay.as_millis() as u64))
    }
}

fn log_failure(result: Result<()>) {
    if let Err(e) = result {
        warn!(error = %format!("{:#}", e), "recovery step failed");
    }
}
