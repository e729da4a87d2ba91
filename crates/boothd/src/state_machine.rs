use booth_core::config::Config;
use std::fmt;
use tracing::debug;

/// Game states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// Start card shown, waiting for the first click.
    NotStarted,
    /// Display idle, activity timer armed.
    Idle,
    /// A card is on screen and photos are being taken.
    Activity,
    /// Operator burst: a single shot is being taken.
    BurstPhoto,
    /// Between burst shots, burst timer armed.
    BurstIdle,
    /// Deck exhausted.
    Ended,
    /// Camera preview for framing.
    Setup,
    Paused,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::NotStarted => "not_started",
            State::Idle => "idle",
            State::Activity => "activity",
            State::BurstPhoto => "burst_photo",
            State::BurstIdle => "burst_idle",
            State::Ended => "ended",
            State::Setup => "setup",
            State::Paused => "paused",
        }
    }

    /// States from which setup, pause or a burst may start.
    pub fn is_interruptible(self) -> bool {
        matches!(self, State::NotStarted | State::Idle | State::Ended)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events fed into the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Click,
    KeyFullscreen,
    KeySetup,
    KeyPause,
    KeyBurstPhoto,
    TimerActivity,
    BurstPictureTaken,
    TimerBurst,
    ActivityCompleted,
}

/// Commands that the machine wants the controller to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    None,
    ToggleFullscreen,
    /// Arm the single timer slot, replacing whatever was pending.
    Schedule { trigger: Trigger, delay_ms: u64 },
    EnterSetup,
    ExitSetup(State),
    EnterPause,
    ExitPause(State),
    RunActivity,
    ShowBurst,
    EndBurst(State),
}

pub struct GameMachine {
    state: State,
    /// State interrupted by setup or pause.
    previous_state: State,
    /// State interrupted by the burst. Kept apart from `previous_state` so
    /// that pausing between burst shots cannot overwrite it.
    burst_origin: State,
    activity_delay_ms: u64,
    step_delay_ms: u64,
    max_delay_ms: u64,
    retry_delay_ms: u64,
    burst_interval_ms: u64,
}

impl GameMachine {
    pub fn new(config: &Config) -> Self {
        Self {
            state: State::NotStarted,
            previous_state: State::NotStarted,
            burst_origin: State::NotStarted,
            activity_delay_ms: config.schedule.start_delay_ms.min(config.schedule.max_delay_ms),
            step_delay_ms: config.schedule.step_delay_ms,
            max_delay_ms: config.schedule.max_delay_ms,
            retry_delay_ms: config.schedule.retry_delay_ms,
            burst_interval_ms: config.burst.interval_ms,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn previous_state(&self) -> State {
        self.previous_state
    }

    pub fn activity_delay_ms(&self) -> u64 {
        self.activity_delay_ms
    }

    pub fn burst_interval_ms(&self) -> u64 {
        self.burst_interval_ms
    }

    pub fn retry_delay_ms(&self) -> u64 {
        self.retry_delay_ms
    }

    /// Deck exhausted: nothing but interrupts leaves this state.
    pub fn end_game(&mut self) {
        debug!(from = %self.state, "game ended");
        self.state = State::Ended;
    }

    /// Recovery override: put the machine into a known-safe state.
    pub fn force_state(&mut self, state: State) {
        debug!(from = %self.state, to = %state, "state forced");
        self.state = state;
    }

    /// Recovery override for setup/pause: return to the interrupted state.
    pub fn restore_previous(&mut self) -> State {
        self.state = self.previous_state;
        self.state
    }

    /// Map a trigger to the next command, updating state as a side effect.
    pub fn next_command(&mut self, trigger: Trigger) -> Command {
        match trigger {
            Trigger::KeyFullscreen => Command::ToggleFullscreen,
            Trigger::Click if self.state == State::NotStarted => {
                self.state = State::Idle;
                Command::Schedule { trigger: Trigger::TimerActivity, delay_ms: 0 }
            }
            Trigger::KeySetup => self.handle_setup_key(),
            Trigger::KeyPause => self.handle_pause_key(),
            Trigger::KeyBurstPhoto => self.handle_burst_key(),
            Trigger::BurstPictureTaken if self.state == State::BurstPhoto => {
                self.state = State::BurstIdle;
                Command::Schedule { trigger: Trigger::TimerBurst, delay_ms: self.burst_interval_ms }
            }
            Trigger::TimerBurst if self.state == State::BurstIdle => {
                self.state = State::BurstPhoto;
                Command::ShowBurst
            }
            Trigger::TimerActivity => self.handle_activity_timer(),
            Trigger::ActivityCompleted if self.state == State::Activity => {
                self.activity_delay_ms = self
                    .activity_delay_ms
                    .saturating_add(self.step_delay_ms)
                    .min(self.max_delay_ms);
                self.state = State::Idle;
                debug!(next_delay_ms = self.activity_delay_ms, "activity completed");
                Command::Schedule { trigger: Trigger::TimerActivity, delay_ms: self.activity_delay_ms }
            }
            _ => Command::None,
        }
    }

    fn handle_setup_key(&mut self) -> Command {
        if self.state == State::Setup {
            self.state = self.previous_state;
            return Command::ExitSetup(self.state);
        }
        if self.state.is_interruptible() {
            self.previous_state = self.state;
            self.state = State::Setup;
            return Command::EnterSetup;
        }
        Command::None
    }

    fn handle_pause_key(&mut self) -> Command {
        if self.state == State::Paused {
            self.state = self.previous_state;
            return Command::ExitPause(self.state);
        }
        if self.state.is_interruptible() || self.state == State::BurstIdle {
            self.previous_state = self.state;
            self.state = State::Paused;
            return Command::EnterPause;
        }
        Command::None
    }

    fn handle_burst_key(&mut self) -> Command {
        if matches!(self.state, State::BurstPhoto | State::BurstIdle) {
            self.state = self.burst_origin;
            return Command::EndBurst(self.state);
        }
        if self.state.is_interruptible() {
            self.burst_origin = self.state;
            self.state = State::BurstPhoto;
            return Command::ShowBurst;
        }
        Command::None
    }

    fn handle_activity_timer(&mut self) -> Command {
        match self.state {
            // Deferred, not dropped: the activity runs once the operator is done.
            State::Setup | State::Paused => Command::Schedule {
                trigger: Trigger::TimerActivity,
                delay_ms: self.retry_delay_ms,
            },
            State::Idle => {
                self.state = State::Activity;
                Command::RunActivity
            }
            _ => Command::None,
        }
    }

    #[cfg(test)]
    fn burst_origin(&self) -> State {
        self.burst_origin
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const MINUTE: u64 = 60 * 1000;

    const ALL_TRIGGERS: [Trigger; 9] = [
        Trigger::Click,
        Trigger::KeyFullscreen,
        Trigger::KeySetup,
        Trigger::KeyPause,
        Trigger::KeyBurstPhoto,
        Trigger::TimerActivity,
        Trigger::BurstPictureTaken,
        Trigger::TimerBurst,
        Trigger::ActivityCompleted,
    ];

    fn make_machine() -> GameMachine {
        let mut config = Config::default(); // start=10m, step=2m, max=25m, retry=1s
        config.burst.interval_ms = 10_000;
        GameMachine::new(&config)
    }

    fn machine_in_idle() -> GameMachine {
        let mut m = make_machine();
        m.next_command(Trigger::Click);
        m
    }

    fn schedule(trigger: Trigger, delay_ms: u64) -> Command {
        Command::Schedule { trigger, delay_ms }
    }

    // --- start ---

    #[test]
    fn new_machine_is_not_started_with_start_delay() {
        let m = make_machine();
        assert_eq!(m.state(), State::NotStarted);
        assert_eq!(m.activity_delay_ms(), 10 * MINUTE);
    }

    #[test]
    fn click_from_not_started_schedules_activity_immediately() {
        let mut m = make_machine();
        assert_eq!(m.next_command(Trigger::Click), schedule(Trigger::TimerActivity, 0));
        assert_eq!(m.state(), State::Idle);
    }

    #[test]
    fn second_click_is_ignored() {
        let mut m = machine_in_idle();
        assert_eq!(m.next_command(Trigger::Click), Command::None);
        assert_eq!(m.state(), State::Idle);
    }

    #[test]
    fn not_started_only_moves_on_click_or_interrupt_keys() {
        for trigger in ALL_TRIGGERS {
            let mut m = make_machine();
            let command = m.next_command(trigger);
            match trigger {
                Trigger::Click | Trigger::KeySetup | Trigger::KeyPause | Trigger::KeyBurstPhoto => {
                    assert_ne!(m.state(), State::NotStarted, "{:?} should move", trigger)
                }
                Trigger::KeyFullscreen => {
                    assert_eq!(command, Command::ToggleFullscreen);
                    assert_eq!(m.state(), State::NotStarted);
                }
                _ => {
                    assert_eq!(command, Command::None, "{:?} should be inert", trigger);
                    assert_eq!(m.state(), State::NotStarted);
                }
            }
        }
    }

    // --- fullscreen ---

    #[test]
    fn fullscreen_key_never_changes_state() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeyPause);
        assert_eq!(m.next_command(Trigger::KeyFullscreen), Command::ToggleFullscreen);
        assert_eq!(m.state(), State::Paused);
    }

    // --- activity cycle ---

    #[test]
    fn activity_timer_from_idle_runs_activity() {
        let mut m = machine_in_idle();
        assert_eq!(m.next_command(Trigger::TimerActivity), Command::RunActivity);
        assert_eq!(m.state(), State::Activity);
    }

    #[test]
    fn completing_activity_grows_delay_by_step() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::TimerActivity);
        assert_eq!(
            m.next_command(Trigger::ActivityCompleted),
            schedule(Trigger::TimerActivity, 12 * MINUTE)
        );
        assert_eq!(m.state(), State::Idle);
        assert_eq!(m.activity_delay_ms(), 12 * MINUTE);
    }

    #[test]
    fn delay_is_capped_at_max() {
        let mut m = machine_in_idle();
        let mut last = 0;
        for _ in 0..20 {
            m.next_command(Trigger::TimerActivity);
            if let Command::Schedule { delay_ms, .. } = m.next_command(Trigger::ActivityCompleted) {
                last = delay_ms;
            }
        }
        assert_eq!(last, 25 * MINUTE);
        assert_eq!(m.activity_delay_ms(), 25 * MINUTE);
    }

    #[test]
    fn activity_completed_outside_activity_is_ignored() {
        let mut m = machine_in_idle();
        assert_eq!(m.next_command(Trigger::ActivityCompleted), Command::None);
        assert_eq!(m.activity_delay_ms(), 10 * MINUTE);
    }

    #[test]
    fn activity_timer_during_activity_is_ignored() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::TimerActivity);
        assert_eq!(m.next_command(Trigger::TimerActivity), Command::None);
    }

    #[test]
    fn interrupt_keys_are_ignored_during_activity() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::TimerActivity);
        for trigger in [Trigger::KeySetup, Trigger::KeyPause, Trigger::KeyBurstPhoto] {
            assert_eq!(m.next_command(trigger), Command::None);
            assert_eq!(m.state(), State::Activity);
        }
    }

    #[test]
    fn end_game_forces_ended() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::TimerActivity);
        m.end_game();
        assert_eq!(m.state(), State::Ended);
        assert_eq!(m.next_command(Trigger::TimerActivity), Command::None);
        assert_eq!(m.next_command(Trigger::ActivityCompleted), Command::None);
    }

    // --- setup ---

    #[test]
    fn setup_round_trip_from_idle() {
        let mut m = machine_in_idle();
        assert_eq!(m.next_command(Trigger::KeySetup), Command::EnterSetup);
        assert_eq!(m.state(), State::Setup);
        assert_eq!(m.next_command(Trigger::KeySetup), Command::ExitSetup(State::Idle));
        assert_eq!(m.state(), State::Idle);
        assert_eq!(m.activity_delay_ms(), 10 * MINUTE);
    }

    #[test]
    fn setup_round_trip_from_ended() {
        let mut m = machine_in_idle();
        m.end_game();
        m.next_command(Trigger::KeySetup);
        assert_eq!(m.next_command(Trigger::KeySetup), Command::ExitSetup(State::Ended));
    }

    #[test]
    fn activity_timer_during_setup_is_deferred() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeySetup);
        assert_eq!(m.next_command(Trigger::TimerActivity), schedule(Trigger::TimerActivity, 1000));
        assert_eq!(m.state(), State::Setup);
    }

    #[test]
    fn pause_key_is_ignored_during_setup() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeySetup);
        assert_eq!(m.next_command(Trigger::KeyPause), Command::None);
        assert_eq!(m.next_command(Trigger::KeyBurstPhoto), Command::None);
        assert_eq!(m.state(), State::Setup);
    }

    // --- pause ---

    #[test]
    fn pause_round_trip_from_not_started() {
        let mut m = make_machine();
        assert_eq!(m.next_command(Trigger::KeyPause), Command::EnterPause);
        assert_eq!(m.next_command(Trigger::KeyPause), Command::ExitPause(State::NotStarted));
        assert_eq!(m.state(), State::NotStarted);
    }

    #[test]
    fn activity_timer_during_pause_is_deferred() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeyPause);
        assert_eq!(m.next_command(Trigger::TimerActivity), schedule(Trigger::TimerActivity, 1000));
    }

    #[test]
    fn click_during_pause_is_ignored() {
        let mut m = make_machine();
        m.next_command(Trigger::KeyPause);
        assert_eq!(m.next_command(Trigger::Click), Command::None);
        assert_eq!(m.state(), State::Paused);
    }

    // --- burst ---

    #[test]
    fn burst_cycle_from_idle() {
        let mut m = machine_in_idle();
        assert_eq!(m.next_command(Trigger::KeyBurstPhoto), Command::ShowBurst);
        assert_eq!(m.state(), State::BurstPhoto);
        assert_eq!(
            m.next_command(Trigger::BurstPictureTaken),
            schedule(Trigger::TimerBurst, 10_000)
        );
        assert_eq!(m.state(), State::BurstIdle);
        assert_eq!(m.next_command(Trigger::TimerBurst), Command::ShowBurst);
        assert_eq!(m.state(), State::BurstPhoto);
    }

    #[test]
    fn burst_key_ends_burst_from_either_burst_state() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeyBurstPhoto);
        assert_eq!(m.next_command(Trigger::KeyBurstPhoto), Command::EndBurst(State::Idle));

        m.next_command(Trigger::KeyBurstPhoto);
        m.next_command(Trigger::BurstPictureTaken);
        assert_eq!(m.next_command(Trigger::KeyBurstPhoto), Command::EndBurst(State::Idle));
        assert_eq!(m.state(), State::Idle);
    }

    #[test]
    fn burst_timer_outside_burst_is_ignored() {
        let mut m = machine_in_idle();
        assert_eq!(m.next_command(Trigger::TimerBurst), Command::None);
        assert_eq!(m.next_command(Trigger::BurstPictureTaken), Command::None);
    }

    #[test]
    fn pause_between_burst_shots_keeps_burst_origin() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeyBurstPhoto);
        m.next_command(Trigger::BurstPictureTaken);
        assert_eq!(m.next_command(Trigger::KeyPause), Command::EnterPause);
        assert_eq!(m.next_command(Trigger::KeyPause), Command::ExitPause(State::BurstIdle));
        assert_eq!(m.next_command(Trigger::KeyBurstPhoto), Command::EndBurst(State::Idle));
        assert_eq!(m.state(), State::Idle);
    }

    #[test]
    fn pause_is_refused_while_burst_shot_in_progress() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeyBurstPhoto);
        assert_eq!(m.next_command(Trigger::KeyPause), Command::None);
        assert_eq!(m.state(), State::BurstPhoto);
    }

    // --- recovery overrides ---

    #[test]
    fn restore_previous_returns_interrupted_state() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::KeySetup);
        assert_eq!(m.restore_previous(), State::Idle);
        assert_eq!(m.state(), State::Idle);
    }

    #[test]
    fn force_state_does_not_touch_delay() {
        let mut m = machine_in_idle();
        m.next_command(Trigger::TimerActivity);
        m.force_state(State::Idle);
        assert_eq!(m.state(), State::Idle);
        assert_eq!(m.activity_delay_ms(), 10 * MINUTE);
    }

    // --- invariants over arbitrary trigger sequences ---

    fn arbitrary_trigger() -> impl Strategy<Value = Trigger> {
        (0..ALL_TRIGGERS.len()).prop_map(|i| ALL_TRIGGERS[i])
    }

    proptest! {
        #[test]
        fn delay_is_monotonic_and_capped(triggers in prop::collection::vec(arbitrary_trigger(), 0..200)) {
            let mut m = make_machine();
            let mut last = m.activity_delay_ms();
            for trigger in triggers {
                m.next_command(trigger);
                prop_assert!(m.activity_delay_ms() >= last);
                prop_assert!(m.activity_delay_ms() <= 25 * MINUTE);
                last = m.activity_delay_ms();
            }
        }

        #[test]
        fn interruptions_never_nest(triggers in prop::collection::vec(arbitrary_trigger(), 0..200)) {
            let mut m = make_machine();
            for trigger in triggers {
                m.next_command(trigger);
                prop_assert!(m.burst_origin().is_interruptible());
                match m.state() {
                    State::Setup => prop_assert!(m.previous_state().is_interruptible()),
                    State::Paused => prop_assert!(
                        m.previous_state().is_interruptible() || m.previous_state() == State::BurstIdle
                    ),
                    _ => {}
                }
            }
        }

        #[test]
        fn schedules_only_name_timer_triggers(triggers in prop::collection::vec(arbitrary_trigger(), 0..200)) {
            let mut m = make_machine();
            for trigger in triggers {
                if let Command::Schedule { trigger: scheduled, .. } = m.next_command(trigger) {
                    prop_assert!(matches!(scheduled, Trigger::TimerActivity | Trigger::TimerBurst));
                }
            }
        }
    }
}
