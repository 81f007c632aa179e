pub mod error;
pub mod events;
pub mod game_trait;
pub mod net;
pub mod phase;
pub mod player;
pub mod roster;
pub mod snapshot;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::events::{Envelope, Outbox, ServerEvent};
    use crate::game_trait::{
        Action, Minigame, Parity, ParticipantId, RoundComplete, RoundContext, Side,
    };
    use crate::roster::Roster;
    use crate::time::DEFAULT_TICK_RATE_HZ;

    /// Deterministic random source for tests.
    pub fn seeded_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// A roster and outbox standing in for the session while a minigame runs.
    pub struct TestTable {
        pub roster: Roster,
        pub outbox: Outbox,
        pub tick_rate: u32,
    }

    impl TestTable {
        /// `n` participants with ids 1..=n named `Player1`, `Player2`, ...
        pub fn with_participants(n: usize) -> Self {
            let mut roster = Roster::new(seeded_rng(0xA11CE));
            let mut outbox = Outbox::new();
            for i in 1..=n {
                roster
                    .join(i as ParticipantId, &format!("Player{i}"), &mut outbox)
                    .expect("test participant names are unique");
            }
            outbox.drain();
            Self {
                roster,
                outbox,
                tick_rate: DEFAULT_TICK_RATE_HZ,
            }
        }

        pub fn ctx(&mut self) -> RoundContext<'_> {
            RoundContext::new(&mut self.roster, &mut self.outbox, self.tick_rate)
        }

        pub fn start(&mut self, game: &mut dyn Minigame) -> Option<RoundComplete> {
            let mut ctx = self.ctx();
            game.start(&mut ctx)
        }

        pub fn input(
            &mut self,
            game: &mut dyn Minigame,
            id: ParticipantId,
            action: Action,
        ) -> Option<RoundComplete> {
            let mut ctx = self.ctx();
            game.handle_input(id, &action, &mut ctx)
        }

        pub fn tick(&mut self, game: &mut dyn Minigame) -> Option<RoundComplete> {
            let mut ctx = self.ctx();
            game.update(&mut ctx)
        }

        /// Tick until the round completes. Returns the number of ticks taken.
        pub fn run_until_complete(
            &mut self,
            game: &mut dyn Minigame,
            max_ticks: u32,
        ) -> Option<u32> {
            for n in 1..=max_ticks {
                if self.tick(game).is_some() {
                    return Some(n);
                }
            }
            None
        }

        pub fn events(&mut self) -> Vec<Envelope> {
            self.outbox.drain()
        }

        pub fn alive_count(&self) -> usize {
            self.roster.alive_count()
        }

        pub fn is_alive(&self, id: ParticipantId) -> bool {
            self.roster.get(id).is_some_and(|p| p.alive)
        }

        pub fn score(&self, id: ParticipantId) -> u32 {
            self.roster.get(id).map_or(0, |p| p.score)
        }
    }

    /// Count outbound events matching a predicate.
    pub fn count_events(events: &[Envelope], pred: impl Fn(&ServerEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(&e.event)).count()
    }

    fn every_action() -> [Action; 6] {
        [
            Action::Tap,
            Action::Move,
            Action::Choose { side: Side::Left },
            Action::Choose { side: Side::Right },
            Action::ChooseParity {
                parity: Parity::Even,
            },
            Action::ChooseGroup { group: 0 },
        ]
    }

    // ================================================================
    // Minigame Contract Tests
    // ================================================================
    // Generic checks every Minigame implementation must pass. Game crates
    // call them from their own #[cfg(test)] modules with a fresh instance.

    /// start() must not eliminate anybody by itself.
    pub fn contract_start_eliminates_nobody(game: &mut dyn Minigame, participants: usize) {
        let mut table = TestTable::with_participants(participants);
        table.start(game);
        assert_eq!(
            table.alive_count(),
            participants,
            "start() must not eliminate participants"
        );
    }

    /// With no input at all the round must still resolve, exactly once.
    pub fn contract_completes_exactly_once(
        game: &mut dyn Minigame,
        participants: usize,
        max_ticks: u32,
    ) {
        let mut table = TestTable::with_participants(participants);
        let mut completions = usize::from(table.start(game).is_some());
        if completions == 0 {
            let ticks = table.run_until_complete(game, max_ticks);
            assert!(ticks.is_some(), "round must complete within {max_ticks} ticks");
            completions += 1;
        }
        assert!(game.is_finished(), "is_finished() must be true after completion");

        for _ in 0..50 {
            if table.tick(game).is_some() {
                completions += 1;
            }
            for action in every_action() {
                for id in 1..=participants as ParticipantId {
                    if table.input(game, id, action).is_some() {
                        completions += 1;
                    }
                }
            }
        }
        assert_eq!(completions, 1, "completion must be signalled exactly once");
    }

    /// Alive count is monotonically non-increasing across the round.
    pub fn contract_alive_count_never_increases(
        game: &mut dyn Minigame,
        participants: usize,
        max_ticks: u32,
    ) {
        let mut table = TestTable::with_participants(participants);
        let mut last = table.alive_count();
        if table.start(game).is_some() {
            return;
        }
        for tick in 0..max_ticks {
            // Everyone mashes every action on alternating ticks.
            if tick % 2 == 0 {
                for id in 1..=participants as ParticipantId {
                    for action in every_action() {
                        table.input(game, id, action);
                    }
                }
            }
            let done = table.tick(game).is_some();
            let now = table.alive_count();
            assert!(now <= last, "alive count rose from {last} to {now}");
            last = now;
            if done || game.is_finished() {
                return;
            }
        }
    }

    /// Input from someone who was not alive at start() is ignored.
    pub fn contract_ignores_late_joiners(game: &mut dyn Minigame, participants: usize) {
        let mut table = TestTable::with_participants(participants);
        table.start(game);
        let late = 10_000;
        table
            .roster
            .join(late, "Latecomer", &mut table.outbox)
            .expect("late joiner name is unique");
        table.events();

        for action in every_action() {
            table.input(game, late, action);
        }
        assert!(table.is_alive(late), "late joiner must not be eliminated");
        assert_eq!(table.score(late), 0, "late joiner must not score");
        let targeted = table
            .events()
            .iter()
            .filter(|e| e.audience == crate::events::Audience::Participant(late))
            .count();
        assert_eq!(targeted, 0, "late joiner must not receive round messages");
    }

    /// public_state() must produce a JSON object.
    pub fn contract_public_state_is_object(game: &mut dyn Minigame, participants: usize) {
        let mut table = TestTable::with_participants(participants);
        table.start(game);
        let state = game.public_state(&table.roster);
        assert!(state.is_object(), "public_state must be a JSON object");
    }
}
