/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::{
    io,
    sync::{
        mpsc::{channel, Receiver, Sender},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{bail, Context, Result};
use futures_lite::future::block_on;
use tracing::{debug, error, info, warn};

use crate::{
    perft_generic, ArcanaCatalog, Color, EngineCommand, EngineConfig, Evaluator, GameSession,
    HintLevel, MoveOutcome, Navigation, Scenario, SearchConfig, SearchPurpose, Square,
};

/// The arcana engine: a [`GameSession`] driven by text commands.
#[derive(Debug)]
pub struct Engine {
    /// The game being played.
    session: GameSession,

    /// One half of a channel, responsible for sending commands to the engine to execute.
    sender: Sender<EngineCommand>,

    /// One half of a channel, responsible for receiving commands for the engine to execute.
    receiver: Receiver<EngineCommand>,

    /// Handle to the currently-running search thread, if one exists.
    search_thread: Option<JoinHandle<()>>,
}

impl Engine {
    /// Constructs a new [`Engine`] instance to be executed with [`Engine::run`].
    pub fn new(catalog: Arc<ArcanaCatalog>, config: EngineConfig, scenario: Scenario) -> Result<Self> {
        let (sender, receiver) = channel();
        let session = GameSession::from_scenario(catalog, config, scenario)?;

        Ok(Self {
            session,
            sender,
            receiver,
            search_thread: None,
        })
    }

    /// Returns a string of the engine's name and current version.
    pub fn name(&self) -> String {
        format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
    }

    /// The game being played.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Sends an [`EngineCommand`] to the engine to be executed.
    pub fn send_command(&self, command: EngineCommand) -> Result<()> {
        self.sender
            .send(command)
            .context("Failed to send command to engine")
    }

    /// Execute the main event loop for the engine.
    ///
    /// This function spawns a thread to handle input from `stdin` and waits on received commands.
    pub fn run(&mut self) -> Result<()> {
        info!("{} ready", self.name());

        // Spawn a separate thread for handling user input
        let sender = self.sender.clone();
        thread::spawn(|| {
            if let Err(err) = input_handler(sender) {
                debug!("Input handler thread stopping: {err}");
            }
        });

        // Loop on user input
        while let Ok(cmd) = self.receiver.recv() {
            if let EngineCommand::Exit { cleanup } = cmd {
                // If requested, await the completion of any ongoing search threads
                if cleanup {
                    self.wait();
                } else {
                    self.session.stop_search();
                }
                break;
            }

            // Keep running, even on error
            if let Err(e) = self.handle_command(cmd) {
                eprintln!("Error: {e}");
            }
        }

        Ok(())
    }

    /// Handle the execution of a single [`EngineCommand`].
    fn handle_command(&mut self, cmd: EngineCommand) -> Result<()> {
        match cmd {
            EngineCommand::Activate { id } => match self.session.activate_arcana(&id)? {
                Some(activation) => println!("{id}: {activation:?}"),
                None => println!("{id} had nothing to do and was refunded"),
            },

            EngineCommand::Arcana => self.arcana(),

            EngineCommand::Back => self.navigate(Navigation::Back)?,
            EngineCommand::Forward => self.navigate(Navigation::Forward)?,
            EngineCommand::Start => self.navigate(Navigation::Start)?,
            EngineCommand::End => self.navigate(Navigation::End)?,
            EngineCommand::Jump { ply } => self.navigate(Navigation::Jump(ply))?,

            EngineCommand::Cancel => {
                if !self.session.cancel_active_mode()? {
                    println!("No arcana is active");
                }
            }

            EngineCommand::Display => println!("{}", self.session.position()),

            EngineCommand::Eval { pretty } => self.eval(pretty),

            EngineCommand::Fen => println!("{}", self.session.fen()),

            EngineCommand::Go {
                depth,
                movetime,
                glitch,
            } => {
                let config = self.search_config(depth, movetime, glitch);
                self.start_search(config, SearchPurpose::Play)?;
            }

            EngineCommand::Grant { id, color, uses } => {
                let color = color.unwrap_or(self.session.position().side_to_move());
                self.session.grant_arcana(&id, color, uses)?;
            }

            EngineCommand::Hint { level } => {
                let level = HintLevel::try_from(level)?;
                let config = self.search_config(None, None, false);
                self.start_search(config, SearchPurpose::Hint(level))?;
            }

            EngineCommand::History => self.history(),

            EngineCommand::Moves {
                square,
                pretty,
                sort,
            } => self.moves(square, pretty, sort),

            EngineCommand::New => self.session.restart()?,

            EngineCommand::Perft { depth } => self.perft::<false>(depth),

            EngineCommand::Splitperft { depth } => self.perft::<true>(depth),

            EngineCommand::Play { moves } => {
                for mv in moves {
                    let outcome = self.session.apply_uci(&mv)?;
                    self.report(outcome);
                }
            }

            EngineCommand::Position { fen } => {
                let scenario = if fen.is_empty() {
                    Scenario::default()
                } else {
                    Scenario::from_fen(fen.join(" "))
                };
                self.session.new_game(scenario)?;
            }

            EngineCommand::Randomize => {
                let n = self.session.randomize()?;
                println!("Position #{n}: {}", self.session.fen());
            }

            EngineCommand::GameResult => match self.session.result() {
                Some(result) => println!("{result}"),
                None => println!("The game is still in progress"),
            },

            EngineCommand::Sight { id } => {
                self.session.future_sight(&id)?;
                println!("{}", self.session.fen());
            }

            EngineCommand::Stop => self.session.stop_search(),

            EngineCommand::Wait => self.wait(),

            EngineCommand::Finished {
                result,
                purpose,
                root,
            } => {
                self.join_search();

                // The position may have been changed since the search was started
                if root != self.session.position().key() {
                    warn!("Discarding search result for a position that is no longer current");
                    return Ok(());
                }

                match purpose {
                    SearchPurpose::Play => match result.bestmove {
                        Some(mv) => {
                            println!("bestmove {mv} score {}", result.score.describe());
                            let outcome = self.session.apply_move(mv)?;
                            self.report(outcome);
                        }
                        None => println!("bestmove (none)"),
                    },
                    SearchPurpose::Hint(level) => {
                        match result.hint(level, self.session.position()) {
                            Some(hint) => println!("hint {hint}"),
                            None => println!("hint (none)"),
                        }
                    }
                }
            }

            EngineCommand::Exit { .. } => bail!("Exit is handled by the run loop"),
        }

        Ok(())
    }

    /// Builds a search config from the session's defaults, overriding whatever was supplied.
    fn search_config(&self, depth: Option<usize>, movetime: Option<u64>, glitch: bool) -> SearchConfig {
        let defaults = self.session.config().search;
        let depth = depth.unwrap_or(defaults.depth);
        let movetime = Duration::from_millis(movetime.unwrap_or(defaults.movetime_ms));

        SearchConfig {
            glitch: glitch || defaults.glitch,
            ..SearchConfig::new(depth, movetime)
        }
    }

    /// Starts a search on the current position, given the parameters in `config`.
    ///
    /// The result is sent back through the command channel once the search concludes.
    fn start_search(&mut self, config: SearchConfig, purpose: SearchPurpose) -> Result<()> {
        let task = self.session.start_search(config)?;
        let root = task.position().key();
        let sender = self.sender.clone();

        // Spawn a thread to conduct the search
        let handle = thread::spawn(move || {
            let result = block_on(task.run());
            if sender
                .send(EngineCommand::Finished {
                    result,
                    purpose,
                    root,
                })
                .is_err()
            {
                debug!("Engine quit before the search concluded");
            }
        });

        self.search_thread = Some(handle);
        Ok(())
    }

    /// Awaits the current search thread, then handles its result.
    fn wait(&mut self) {
        if self.search_thread.is_none() {
            return;
        }
        self.join_search();

        // The search thread sends its result right before exiting
        match self.receiver.try_recv() {
            Ok(cmd) => {
                if let Err(e) = self.handle_command(cmd) {
                    eprintln!("Error: {e}");
                }
            }
            Err(e) => debug!("No search result after waiting: {e}"),
        }
    }

    /// Joins the search thread, if one exists.
    fn join_search(&mut self) {
        let Some(handle) = self.search_thread.take() else {
            return;
        };

        let id = handle.thread().id();
        if handle.join().is_err() {
            error!("Failed to join on search thread {id:?}");
        }
    }

    /// Moves through history and prints where it landed.
    fn navigate(&mut self, navigation: Navigation) -> Result<()> {
        let ply = self.session.navigate(navigation)?;
        println!("ply {ply}/{}: {}", self.session.history().len(), self.session.fen());
        Ok(())
    }

    /// Prints what happened when a move was applied.
    fn report(&self, outcome: MoveOutcome) {
        match outcome {
            MoveOutcome::Committed {
                notation,
                expired,
                result,
            } => {
                println!("{notation}");
                for effect in expired {
                    println!("  {effect}");
                }
                if let Some(result) = result {
                    println!("Game over: {result}");
                }
            }
            MoveOutcome::Pending => println!("Awaiting the second half of the double move"),
            MoveOutcome::Cancelled => println!("The double move had no second half and was refunded"),
        }
    }

    /// Executes the `arcana` command, listing what each player holds.
    fn arcana(&self) {
        let arcana = self.session.arcana();
        for color in Color::all() {
            let held = arcana
                .catalog()
                .iter()
                .filter_map(|entry| {
                    let uses = arcana.uses(&entry.id, color);
                    (uses > 0).then(|| format!("{} ({}) x{uses}", entry.id, entry.name))
                })
                .collect::<Vec<_>>();

            let held = if held.is_empty() {
                String::from("(none)")
            } else {
                held.join(", ")
            };
            println!("{}: {held}", color.name());
        }

        if let Some(active) = self.session.active_mode() {
            println!("Active: {} ({})", active.id, active.mode);
        }
    }

    /// Executes the `history` command, printing every committed turn.
    fn history(&self) {
        let history = self.session.history();
        for (i, entry) in history.entries().iter().enumerate() {
            let marker = if i + 1 == history.cursor() { '>' } else { ' ' };
            println!("{marker}{:>3}. {}", i + 1, entry.notation);
        }
    }

    /// Executes the `moves` command, printing every legal move (or those of the piece on `square`).
    fn moves(&self, square: Option<Square>, pretty: bool, sort: bool) {
        let mut moves = self
            .session
            .legal_moves()
            .into_iter()
            .filter(|mv| square.map_or(true, |sq| mv.from() == sq))
            .collect::<Vec<_>>();

        if sort {
            moves.sort_by_key(|mv| mv.to_string());
        }

        // If there are none, print "(none)"
        let moves_string = if moves.is_empty() {
            String::from("(none)")
        } else {
            // Otherwise, join them by comma-space
            moves
                .iter()
                .map(|mv| mv.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!("{moves_string}");

        if pretty {
            let destinations = moves.iter().map(|mv| mv.to()).collect::<crate::Bitboard>();
            println!("{destinations}");
        }
    }

    /// Executes the `eval` command, printing an evaluation of the current position.
    fn eval(&self, pretty: bool) {
        let evaluator = Evaluator::new(self.session.position(), &self.session.config().eval);
        if pretty {
            print!("{evaluator}\n\nScore: ");
        }

        println!("{}", evaluator.eval());
    }

    /// Executes a perft on the current position, printing per-move counts if `SPLIT` is set.
    fn perft<const SPLIT: bool>(&self, depth: usize) {
        let position = self.session.position();
        let start = std::time::Instant::now();
        let nodes = perft_generic::<true, SPLIT>(position, depth);
        let elapsed = start.elapsed();

        let nps = (nodes as f32 / elapsed.as_secs_f32().max(f32::EPSILON)) as u64;
        println!("\n{nodes} nodes in {}ms ({nps} nps)", elapsed.as_millis());
    }
}

/// Loops endlessly to await input via `stdin`, sending all successfully-parsed commands through the supplied `sender`.
fn input_handler(sender: Sender<EngineCommand>) -> Result<()> {
    let mut buffer = String::with_capacity(2048);

    loop {
        // Clear the buffer, read input, and trim the trailing newline
        buffer.clear();
        let bytes = io::stdin()
            .read_line(&mut buffer)
            .context("Failed to read line when parsing engine commands")?;

        // For ctrl + d
        if 0 == bytes {
            // Send the Exit command and exit this function
            sender
                .send(EngineCommand::Exit { cleanup: false })
                .context("Failed to send 'exit' command after receiving empty input")?;

            bail!("Engine received input of 0 bytes and is quitting");
        }

        // Trim any leading/trailing whitespace
        let buf = buffer.trim();

        // Ignore empty lines
        if buf.is_empty() {
            continue;
        }

        match buf.parse::<EngineCommand>() {
            Ok(cmd) => sender
                .send(cmd)
                .context("Failed to send command to engine")?,

            // If an invalid command was received, just print the error and continue running
            Err(err) => eprintln!("{err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let catalog = Arc::new(ArcanaCatalog::builtin().unwrap());
        Engine::new(catalog, EngineConfig::default(), Scenario::default()).unwrap()
    }

    #[test]
    fn test_play_and_navigate() {
        let mut engine = engine();
        engine
            .handle_command("play e2e4 e7e5".parse().unwrap())
            .unwrap();
        assert_eq!(engine.session().history().len(), 2);

        engine.handle_command(EngineCommand::Back).unwrap();
        assert_eq!(engine.session().history().cursor(), 1);

        assert!(engine.handle_command("play e2e5".parse().unwrap()).is_err());
    }

    #[test]
    fn test_go_plays_a_move() {
        let mut engine = engine();
        engine.handle_command("go -d 2".parse().unwrap()).unwrap();
        engine.wait();
        assert_eq!(engine.session().history().len(), 1);
        assert!(!engine.session().is_thinking());
    }

    #[test]
    fn test_stale_search_result_is_discarded() {
        let mut engine = engine();
        engine.handle_command("hint 1".parse().unwrap()).unwrap();
        engine.join_search();

        // Move on before the result is handled
        engine.handle_command("play e2e4".parse().unwrap()).unwrap();
        let cmd = engine.receiver.try_recv().unwrap();
        let EngineCommand::Finished { root, .. } = cmd.clone() else {
            panic!("expected a search result");
        };
        assert_ne!(root, engine.session().position().key());
        engine.handle_command(cmd).unwrap();
        assert_eq!(engine.session().history().len(), 1);
    }
}
