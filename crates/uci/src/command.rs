//! UCI command parsing.

use crate::UciError;

/// Commands sent from GUI to engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GuiCommand {
    /// Initialize UCI mode.
    Uci,
    /// Check if engine is ready.
    IsReady,
    /// The next position belongs to a different game.
    UciNewGame,
    /// `setoption name <name> [value <value>]`. Names may contain spaces.
    SetOption { name: String, value: Option<String> },
    /// Set up position. `fen` is `None` for `startpos`.
    Position {
        fen: Option<String>,
        moves: Vec<String>,
    },
    /// Start calculating.
    Go(GoOptions),
    /// Stop calculating.
    Stop,
    /// Quit the engine.
    Quit,
    /// Unknown command (for forward compatibility).
    Unknown(String),
}

/// Options for the `go` command.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GoOptions {
    /// Search for exactly this time in milliseconds.
    pub movetime: Option<u64>,
    /// Search to this depth.
    pub depth: Option<u32>,
    /// White time remaining in milliseconds.
    pub wtime: Option<u64>,
    /// Black time remaining in milliseconds.
    pub btime: Option<u64>,
    /// White increment per move in milliseconds.
    pub winc: Option<u64>,
    /// Black increment per move in milliseconds.
    pub binc: Option<u64>,
    /// Moves to go until next time control.
    pub movestogo: Option<u32>,
    /// Search indefinitely until `stop`.
    pub infinite: bool,
}

impl GoOptions {
    /// Remaining time and increment for the side to move.
    pub fn clock(&self, white: bool) -> (Option<u64>, Option<u64>) {
        if white {
            (self.wtime, self.winc)
        } else {
            (self.btime, self.binc)
        }
    }
}

impl GuiCommand {
    /// Parse a UCI command string.
    pub fn parse(input: &str) -> Result<Self, UciError> {
        let input = input.trim();
        let mut parts = input.split_whitespace();

        match parts.next().unwrap_or("") {
            "uci" => Ok(GuiCommand::Uci),
            "isready" => Ok(GuiCommand::IsReady),
            "ucinewgame" => Ok(GuiCommand::UciNewGame),
            "setoption" => Self::parse_setoption(parts),
            "stop" => Ok(GuiCommand::Stop),
            "quit" => Ok(GuiCommand::Quit),
            "position" => Self::parse_position(parts),
            "go" => Self::parse_go(parts),
            _ => Ok(GuiCommand::Unknown(input.to_string())),
        }
    }

    fn parse_setoption<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        if parts.next() != Some("name") {
            return Err(UciError::ParseError(
                "setoption must start with 'name'".to_string(),
            ));
        }

        let mut name = Vec::new();
        let mut value = None::<Vec<&str>>;
        for part in parts {
            match value.as_mut() {
                Some(words) => words.push(part),
                None if part == "value" => value = Some(Vec::new()),
                None => name.push(part),
            }
        }

        if name.is_empty() {
            return Err(UciError::ParseError("setoption without a name".to_string()));
        }
        Ok(GuiCommand::SetOption {
            name: name.join(" "),
            value: value.map(|words| words.join(" ")),
        })
    }

    fn parse_position<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        let fen = match parts.next() {
            Some("startpos") => {
                match parts.next() {
                    None | Some("moves") => {}
                    Some(other) => {
                        return Err(UciError::ParseError(format!(
                            "Expected 'moves' after 'startpos', got '{}'",
                            other
                        )))
                    }
                }
                None
            }
            Some("fen") => {
                // FEN fields run until "moves" or the end of the line
                let fields: Vec<&str> = parts.by_ref().take_while(|&s| s != "moves").collect();
                if fields.is_empty() {
                    return Err(UciError::ParseError("Empty FEN".to_string()));
                }
                Some(fields.join(" "))
            }
            Some(other) => {
                return Err(UciError::ParseError(format!(
                    "Expected 'startpos' or 'fen', got '{}'",
                    other
                )));
            }
            None => {
                return Err(UciError::ParseError(
                    "Expected 'startpos' or 'fen'".to_string(),
                ));
            }
        };

        let moves = parts.map(str::to_string).collect();
        Ok(GuiCommand::Position { fen, moves })
    }

    fn parse_go<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Self, UciError> {
        fn value<T: std::str::FromStr>(
            key: &str,
            text: Option<&str>,
        ) -> Result<Option<T>, UciError> {
            let text = text.ok_or_else(|| UciError::ParseError(format!("'{key}' needs a value")))?;
            text.parse()
                .map(Some)
                .map_err(|_| UciError::ParseError(format!("Bad value for '{key}': '{text}'")))
        }

        let mut opts = GoOptions::default();
        while let Some(key) = parts.next() {
            match key {
                "movetime" => opts.movetime = value(key, parts.next())?,
                "depth" => opts.depth = value(key, parts.next())?,
                "wtime" => opts.wtime = value(key, parts.next())?,
                "btime" => opts.btime = value(key, parts.next())?,
                "winc" => opts.winc = value(key, parts.next())?,
                "binc" => opts.binc = value(key, parts.next())?,
                "movestogo" => opts.movestogo = value(key, parts.next())?,
                "infinite" => opts.infinite = true,
                _ => {}
            }
        }

        Ok(GuiCommand::Go(opts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_commands() {
        assert_eq!(GuiCommand::parse("uci").unwrap(), GuiCommand::Uci);
        assert_eq!(GuiCommand::parse("isready\n").unwrap(), GuiCommand::IsReady);
        assert_eq!(GuiCommand::parse("ucinewgame").unwrap(), GuiCommand::UciNewGame);
        assert_eq!(GuiCommand::parse("  stop ").unwrap(), GuiCommand::Stop);
        assert_eq!(
            GuiCommand::parse("register later").unwrap(),
            GuiCommand::Unknown("register later".to_string())
        );
    }

    #[test]
    fn parse_position_startpos_with_moves() {
        let cmd = GuiCommand::parse("position startpos moves e2e4 e7e5").unwrap();
        assert_eq!(
            cmd,
            GuiCommand::Position {
                fen: None,
                moves: vec!["e2e4".to_string(), "e7e5".to_string()]
            }
        );
        assert_eq!(
            GuiCommand::parse("position startpos").unwrap(),
            GuiCommand::Position {
                fen: None,
                moves: vec![]
            }
        );
    }

    #[test]
    fn parse_position_fen_with_moves() {
        let cmd = GuiCommand::parse(
            "position fen rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1 moves c7c5",
        )
        .unwrap();
        assert_eq!(
            cmd,
            GuiCommand::Position {
                fen: Some(
                    "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq e3 0 1".to_string()
                ),
                moves: vec!["c7c5".to_string()]
            }
        );
    }

    #[test]
    fn parse_position_errors() {
        assert!(GuiCommand::parse("position").is_err());
        assert!(GuiCommand::parse("position fen").is_err());
        assert!(GuiCommand::parse("position somewhere").is_err());
    }

    #[test]
    fn parse_setoption() {
        assert_eq!(
            GuiCommand::parse("setoption name Threads value 4").unwrap(),
            GuiCommand::SetOption {
                name: "Threads".to_string(),
                value: Some("4".to_string())
            }
        );
        assert_eq!(
            GuiCommand::parse("setoption name Clear Hash").unwrap(),
            GuiCommand::SetOption {
                name: "Clear Hash".to_string(),
                value: None
            }
        );
        assert!(GuiCommand::parse("setoption Threads 4").is_err());
    }

    #[test]
    fn parse_go_clock() {
        let cmd = GuiCommand::parse("go wtime 60000 btime 55000 winc 1000 binc 900 movestogo 20")
            .unwrap();
        let GuiCommand::Go(opts) = cmd else {
            panic!("Expected Go command");
        };
        assert_eq!(opts.clock(true), (Some(60000), Some(1000)));
        assert_eq!(opts.clock(false), (Some(55000), Some(900)));
        assert_eq!(opts.movestogo, Some(20));
        assert!(!opts.infinite);
    }

    #[test]
    fn parse_go_depth_and_movetime() {
        let GuiCommand::Go(opts) = GuiCommand::parse("go depth 10 movetime 500").unwrap() else {
            panic!("Expected Go command");
        };
        assert_eq!(opts.depth, Some(10));
        assert_eq!(opts.movetime, Some(500));

        let GuiCommand::Go(opts) = GuiCommand::parse("go infinite").unwrap() else {
            panic!("Expected Go command");
        };
        assert!(opts.infinite);
    }

    #[test]
    fn parse_go_rejects_bad_values() {
        assert!(GuiCommand::parse("go depth").is_err());
        assert!(GuiCommand::parse("go movetime soon").is_err());
    }
}
