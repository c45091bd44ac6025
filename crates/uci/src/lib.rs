//! UCI (Universal Chess Interface) protocol library.
//!
//! This crate provides types and parsing for the UCI protocol used by chess engines.
//!
//! # Supported commands
//!
//! - `uci` - Initialize engine, get id and options
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Forget the previous game
//! - `setoption name <name> [value <value>]` - Change an option
//! - `position startpos|fen <fen> [moves <move>...]` - Set position
//! - `go [movetime <ms>] [depth <d>] [wtime <ms>] [btime <ms>] ...` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{EngineInfo, InfoBuilder, Score};

use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A `spin` option advertised after `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOption {
    pub name: &'static str,
    pub default: i64,
    pub min: i64,
    pub max: i64,
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// Option declaration.
    Option(SpinOption),
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found.
    BestMove { mv: String, ponder: Option<String> },
}

impl EngineMessage {
    /// Format message for output.
    pub fn to_uci(&self) -> String {
        match self {
            EngineMessage::Id { name, author } => {
                let mut parts = Vec::new();
                if let Some(n) = name {
                    parts.push(format!("id name {}", n));
                }
                if let Some(a) = author {
                    parts.push(format!("id author {}", a));
                }
                parts.join("\n")
            }
            EngineMessage::Option(opt) => format!(
                "option name {} type spin default {} min {} max {}",
                opt.name, opt.default, opt.min, opt.max
            ),
            EngineMessage::UciOk => "uciok".to_string(),
            EngineMessage::ReadyOk => "readyok".to_string(),
            EngineMessage::Info(info) => info.to_uci(),
            EngineMessage::BestMove { mv, ponder } => match ponder {
                Some(p) => format!("bestmove {} ponder {}", mv, p),
                None => format!("bestmove {}", mv),
            },
        }
    }
}

/// Line-oriented UCI endpoint over any reader/writer pair.
pub struct UciEngine<R: BufRead, W: Write> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> UciEngine<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Read and parse the next command from GUI. End of input reads as `quit`.
    pub fn read_command(&mut self) -> Result<GuiCommand, UciError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(GuiCommand::Quit);
        }
        GuiCommand::parse(&line)
    }

    /// Send a message to the GUI.
    pub fn send(&mut self, msg: &EngineMessage) -> Result<(), UciError> {
        let mut line = msg.to_uci();
        line.push('\n');
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn send_id(&mut self, name: &str, author: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::Id {
            name: Some(name.to_string()),
            author: Some(author.to_string()),
        })
    }

    pub fn send_option(&mut self, option: SpinOption) -> Result<(), UciError> {
        self.send(&EngineMessage::Option(option))
    }

    pub fn send_uciok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::UciOk)
    }

    pub fn send_readyok(&mut self) -> Result<(), UciError> {
        self.send(&EngineMessage::ReadyOk)
    }

    pub fn send_bestmove(&mut self, mv: &str) -> Result<(), UciError> {
        self.send(&EngineMessage::BestMove {
            mv: mv.to_string(),
            ponder: None,
        })
    }

    pub fn send_info(&mut self, info: EngineInfo) -> Result<(), UciError> {
        self.send(&EngineMessage::Info(info))
    }

    /// The writer, e.g. to inspect output in tests.
    pub fn writer(&self) -> &W {
        &self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_output() {
        let mut engine = UciEngine::new(&b""[..], Vec::new());
        engine.send_id("ybw", "someone").unwrap();
        engine
            .send_option(SpinOption {
                name: "Hash",
                default: 16,
                min: 1,
                max: 4096,
            })
            .unwrap();
        engine.send_uciok().unwrap();
        engine.send_bestmove("e2e4").unwrap();

        let out = String::from_utf8(engine.writer().clone()).unwrap();
        assert_eq!(
            out,
            "id name ybw\nid author someone\n\
             option name Hash type spin default 16 min 1 max 4096\n\
             uciok\nbestmove e2e4\n"
        );
    }

    #[test]
    fn reads_commands_until_end_of_input() {
        let mut engine = UciEngine::new(&b"isready\ngo depth 2\n"[..], Vec::new());
        assert_eq!(engine.read_command().unwrap(), GuiCommand::IsReady);
        assert!(matches!(engine.read_command().unwrap(), GuiCommand::Go(_)));
        assert_eq!(engine.read_command().unwrap(), GuiCommand::Quit);
    }
}
