//! The UCI command loop.
//!
//! Searches run on a background thread that owns the [`Engine`] and hands it
//! back when it finishes, so `stop` and `isready` are answered while a search
//! is in progress.

use crate::clock;
use chess_core::Color;
use chess_engine::Board;
use chess_search::{
    mate_in, AbortHandle, Engine, EngineConfig, SearchInfo, MAX_HASH_MB, MAX_THREADS,
};
use parking_lot::Mutex;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uci::{EngineInfo, GoOptions, GuiCommand, InfoBuilder, Score, SpinOption, UciEngine, UciError};

const ENGINE_NAME: &str = "bot-ybw";
const ENGINE_AUTHOR: &str = "Tom Metten";
const STOP_POLL: Duration = Duration::from_millis(1);

/// A writer shared between the command loop and the search thread.
/// `write_all` holds the lock for the whole buffer, so a line sent with one
/// `write_all` is never split by output from the other thread.
pub struct SharedWriter<W>(Arc<Mutex<W>>);

impl<W> SharedWriter<W> {
    pub fn new(inner: W) -> Self {
        SharedWriter(Arc::new(Mutex::new(inner)))
    }
}

impl<W> Clone for SharedWriter<W> {
    fn clone(&self) -> Self {
        SharedWriter(Arc::clone(&self.0))
    }
}

impl<W: Write> Write for SharedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut inner = self.0.lock();
        inner.write_all(buf)?;
        inner.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.lock().flush()
    }
}

struct RunningSearch {
    abort: AbortHandle,
    handle: JoinHandle<Engine>,
}

pub struct Session<R: BufRead, W: Write + Send + 'static> {
    uci: UciEngine<R, SharedWriter<W>>,
    writer: SharedWriter<W>,
    /// `None` while a search thread holds it.
    engine: Option<Engine>,
    search: Option<RunningSearch>,
    config: EngineConfig,
    board: Board,
    /// Keys of the positions before `board`, oldest first.
    game: Vec<u64>,
}

impl<R: BufRead, W: Write + Send + 'static> Session<R, W> {
    pub fn new(reader: R, writer: SharedWriter<W>, config: EngineConfig) -> anyhow::Result<Self> {
        let engine = Engine::new(config)?;
        Ok(Session {
            uci: UciEngine::new(reader, writer.clone()),
            writer,
            config: engine.config(),
            engine: Some(engine),
            search: None,
            board: Board::startpos(),
            game: Vec::new(),
        })
    }

    /// Runs until `quit` or end of input.
    pub fn run(&mut self) -> anyhow::Result<()> {
        loop {
            let command = match self.uci.read_command() {
                Ok(command) => command,
                Err(UciError::IoError(e)) => return Err(e.into()),
                Err(e) => {
                    warn!("{e}");
                    continue;
                }
            };
            debug!(?command, "received");
            if !self.handle(command)? {
                break;
            }
        }
        self.stop_search()?;
        Ok(())
    }

    /// Applies one command. Returns `false` on `quit`.
    fn handle(&mut self, command: GuiCommand) -> anyhow::Result<bool> {
        match command {
            GuiCommand::Uci => {
                self.uci.send_id(ENGINE_NAME, ENGINE_AUTHOR)?;
                self.uci.send_option(SpinOption {
                    name: "Threads",
                    default: self.config.threads as i64,
                    min: 1,
                    max: MAX_THREADS as i64,
                })?;
                self.uci.send_option(SpinOption {
                    name: "Hash",
                    default: self.config.hash_mb as i64,
                    min: 1,
                    max: MAX_HASH_MB as i64,
                })?;
                self.uci.send_uciok()?;
            }
            GuiCommand::IsReady => self.uci.send_readyok()?,
            GuiCommand::UciNewGame => {
                self.idle_engine()?.new_game();
                self.board = Board::startpos();
                self.game.clear();
            }
            GuiCommand::SetOption { name, value } => self.set_option(&name, value.as_deref())?,
            GuiCommand::Position { fen, moves } => {
                self.idle_engine()?;
                if let Err(e) = self.set_position(fen.as_deref(), &moves) {
                    warn!("position ignored: {e}");
                }
            }
            GuiCommand::Go(opts) => self.go(&opts)?,
            GuiCommand::Stop => self.stop_search()?,
            GuiCommand::Quit => return Ok(false),
            GuiCommand::Unknown(text) if text.is_empty() => {}
            GuiCommand::Unknown(text) => debug!("ignoring unknown command '{text}'"),
        }
        Ok(true)
    }

    fn set_option(&mut self, name: &str, value: Option<&str>) -> anyhow::Result<()> {
        let Some(value) = value.and_then(|v| v.trim().parse::<usize>().ok()) else {
            warn!("setoption {name}: expected a number, got {value:?}");
            return Ok(());
        };
        let config = match name.to_ascii_lowercase().as_str() {
            "threads" => self.config.with_threads(value),
            "hash" => self.config.with_hash_mb(value),
            _ => {
                debug!("ignoring unknown option '{name}'");
                return Ok(());
            }
        };
        self.idle_engine()?.resize(config)?;
        self.config = config;
        info!(threads = config.threads, hash_mb = config.hash_mb, "engine resized");
        Ok(())
    }

    /// Replaces the position only if the FEN and every move are valid.
    fn set_position(&mut self, fen: Option<&str>, moves: &[String]) -> Result<(), UciError> {
        let mut board = match fen {
            Some(fen) => Board::from_fen(fen).map_err(|e| UciError::ParseError(e.to_string()))?,
            None => Board::startpos(),
        };
        let mut game = Vec::with_capacity(moves.len());
        for text in moves {
            let mv = board
                .find_move(text)
                .ok_or_else(|| UciError::InvalidCommand(format!("illegal move '{text}'")))?;
            game.push(board.key());
            board.make(mv);
        }
        self.board = board;
        self.game = game;
        Ok(())
    }

    fn go(&mut self, opts: &GoOptions) -> anyhow::Result<()> {
        let mut engine = match self.engine.take() {
            Some(engine) => engine,
            None => {
                warn!("go ignored: a search is already running");
                return Ok(());
            }
        };
        let limits = clock::limits(opts, self.board.side_to_move() == Color::White);
        debug!(?limits, "starting search");

        let board = self.board.clone();
        let game = self.game.clone();
        let writer = self.writer.clone();
        let abort = engine.abort_handle();
        let handle = thread::Builder::new()
            .name("uci-search".to_string())
            .spawn(move || {
                let mut out = UciEngine::new(io::empty(), writer);
                let outcome = engine.search_with_history(&board, &game, limits, |info| {
                    if let Err(e) = out.send_info(info_line(info)) {
                        warn!("writing info: {e}");
                    }
                });
                info!(
                    best = %outcome.best_move,
                    score = outcome.score,
                    depth = outcome.depth,
                    nodes = outcome.nodes,
                    researched = outcome.researched,
                    "search finished"
                );
                if let Err(e) = out.send_bestmove(&outcome.best_move.to_uci()) {
                    error!("writing bestmove: {e}");
                }
                engine
            })?;
        self.search = Some(RunningSearch { abort, handle });
        Ok(())
    }

    /// Aborts until the thread exits: an abort that lands before the search
    /// has started is cleared when it starts.
    fn stop_search(&mut self) -> anyhow::Result<()> {
        if let Some(running) = &self.search {
            while !running.handle.is_finished() {
                running.abort.abort();
                thread::sleep(STOP_POLL);
            }
        }
        self.idle_engine()?;
        Ok(())
    }

    /// Waits for a running search to finish and returns the engine.
    fn idle_engine(&mut self) -> anyhow::Result<&mut Engine> {
        if let Some(running) = self.search.take() {
            match running.handle.join() {
                Ok(engine) => self.engine = Some(engine),
                Err(_) => error!("search thread panicked; restarting the engine"),
            }
        }
        let engine = match self.engine.take() {
            Some(engine) => engine,
            None => Engine::new(self.config)?,
        };
        Ok(self.engine.insert(engine))
    }
}

fn info_line(info: &SearchInfo) -> EngineInfo {
    let score = match mate_in(info.score) {
        Some(moves) => Score::Mate(moves),
        None => Score::Cp(info.score),
    };
    InfoBuilder::new()
        .depth(info.depth.max(0) as u32)
        .score(score)
        .nodes(info.nodes)
        .elapsed_ms(info.elapsed.as_millis() as u64)
        .hashfull(info.hashfull)
        .pv(info.pv.iter().map(|mv| mv.to_uci()).collect())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            threads: 1,
            hash_mb: 1,
        }
    }

    /// Feeds `input` to a fresh session and returns everything it printed.
    fn run(input: &str) -> String {
        let out = SharedWriter::new(Vec::new());
        let mut session = Session::new(input.as_bytes(), out.clone(), config()).unwrap();
        session.run().unwrap();
        let bytes = out.0.lock().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn handshake() {
        let out = run("uci\nisready\nquit\n");
        assert!(out.starts_with("id name bot-ybw\n"));
        assert!(out.contains("option name Threads type spin default 1 min 1 max"));
        assert!(out.contains("option name Hash type spin default 1 min 1 max 4096"));
        assert!(out.ends_with("uciok\nreadyok\n"), "{out}");
    }

    #[test]
    fn go_prints_info_then_bestmove() {
        let out = run("position fen 6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1\ngo depth 2\n");
        let first = out.lines().next().unwrap();
        assert!(first.starts_with("info depth 1 score mate 1 nodes"), "{first}");
        assert!(first.ends_with("pv a1a8"), "{first}");
        assert!(out.ends_with("bestmove a1a8\n"), "{out}");
    }

    #[test]
    fn quit_stops_an_infinite_search() {
        let out = run("position startpos moves e2e4 e7e5\ngo infinite\nisready\nquit\n");
        assert!(out.contains("readyok\n"));
        assert!(out.contains("info depth 1 "));
        let last = out.lines().last().unwrap();
        assert!(last.starts_with("bestmove "), "{out}");
    }

    #[test]
    fn mated_side_answers_null_move() {
        let out = run(
            "position fen rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3\ngo depth 3\n",
        );
        assert_eq!(out, "bestmove 0000\n");
    }

    #[test]
    fn positions_track_game_history() {
        let out = SharedWriter::new(Vec::new());
        let mut session = Session::new(&b""[..], out, config()).unwrap();
        session
            .handle(GuiCommand::parse("position startpos moves g1f3 g8f6 f3g1").unwrap())
            .unwrap();
        assert_eq!(session.game.len(), 3);
        assert_eq!(session.game[0], Board::startpos().key());

        // an illegal move leaves the previous position in place
        let before = session.board.to_fen();
        session
            .handle(GuiCommand::parse("position startpos moves e2e5").unwrap())
            .unwrap();
        assert_eq!(session.board.to_fen(), before);
    }

    #[test]
    fn setoption_resizes_the_engine() {
        let out = SharedWriter::new(Vec::new());
        let mut session = Session::new(&b""[..], out, config()).unwrap();
        session
            .handle(GuiCommand::parse("setoption name Threads value 2").unwrap())
            .unwrap();
        session
            .handle(GuiCommand::parse("setoption name hash value 2").unwrap())
            .unwrap();
        assert_eq!(session.config.threads, 2);
        assert_eq!(session.config.hash_mb, 2);
        assert_eq!(session.idle_engine().unwrap().config(), session.config);

        session
            .handle(GuiCommand::parse("setoption name Threads value many").unwrap())
            .unwrap();
        assert_eq!(session.config.threads, 2);
    }
    /// Accepts a few bytes per `write` and yields between them.
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            thread::yield_now();
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn lines_from_two_threads_never_interleave() {
        let out = SharedWriter::new(Trickle(Vec::new()));
        let search_out = out.clone();
        let search = thread::spawn(move || {
            let mut uci = UciEngine::new(io::empty(), search_out);
            for depth in 1..=200 {
                let info = InfoBuilder::new().depth(depth).nodes(1000).build();
                uci.send_info(info).unwrap();
            }
        });
        let mut uci = UciEngine::new(io::empty(), out.clone());
        for _ in 0..200 {
            uci.send_readyok().unwrap();
        }
        search.join().unwrap();

        let text = String::from_utf8(out.0.lock().0.clone()).unwrap();
        assert_eq!(text.lines().count(), 400);
        for line in text.lines() {
            assert!(line == "readyok" || line.starts_with("info depth "), "{line:?}");
        }
    }
}
