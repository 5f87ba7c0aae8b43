//! Stockfish engine adapter using UCI protocol (async I/O)
//!
//! Every evaluation runs in a fresh subprocess. The session walks
//! `Starting -> UciReady -> Configured -> Searching -> Done`, and the process
//! is quit, then killed and reaped if it lingers, on every exit path.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chess_core::position::side_to_move;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::evaluation::{Evaluation, PvLine};

/// Default allowance on top of the search budget for handshake and output.
const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// How long `quit` may take before the process is killed.
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Bounds for one search. Whichever of depth and move time triggers first ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub depth: u32,
    pub move_time: Duration,
    pub multi_pv: u32,
}

/// A source of engine evaluations.
#[async_trait]
pub trait PositionEvaluator: Send + Sync {
    async fn evaluate(&self, fen: &str, limits: SearchLimits) -> Result<Evaluation, EngineError>;
}

/// Evaluates positions with a UCI engine binary.
#[derive(Debug, Clone)]
pub struct StockfishEvaluator {
    program: Option<PathBuf>,
    args: Vec<String>,
    hash_mb: u32,
    grace: Duration,
}

impl StockfishEvaluator {
    /// `None` yields an evaluator that always reports itself unavailable.
    pub fn new(program: Option<PathBuf>, hash_mb: u32) -> Self {
        Self {
            program,
            args: Vec::new(),
            hash_mb,
            grace: DEFAULT_GRACE,
        }
    }

    /// Extra command-line arguments for the engine process.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }
}

#[async_trait]
impl PositionEvaluator for StockfishEvaluator {
    async fn evaluate(&self, fen: &str, limits: SearchLimits) -> Result<Evaluation, EngineError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| EngineError::Unavailable("no engine executable configured".into()))?;

        let mut session = UciSession::spawn(program, &self.args).await?;
        let budget = limits.move_time + self.grace;

        let outcome = tokio::time::timeout(budget, async {
            session.handshake().await?;
            session.configure(self.hash_mb, limits.multi_pv).await?;
            session.search(fen, &limits).await
        })
        .await;

        session.shutdown().await;

        match outcome {
            Ok(result) => result?.into_evaluation(fen),
            Err(_) => {
                warn!(fen, ?budget, "Engine search timed out");
                Err(EngineError::Timeout(budget))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Starting,
    UciReady,
    Configured,
    Searching,
    Done,
    Failed,
}

/// One engine process for the lifetime of a single evaluation.
struct UciSession {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    state: SessionState,
}

impl UciSession {
    async fn spawn(program: &Path, args: &[String]) -> Result<Self, EngineError> {
        let mut process = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                EngineError::Unavailable(format!("Failed to spawn {}: {e}", program.display()))
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::Protocol("engine stdin not captured".into()))?;
        let stdout = process
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| EngineError::Protocol("engine stdout not captured".into()))?;

        Ok(Self {
            process,
            stdin,
            stdout,
            state: SessionState::Starting,
        })
    }

    fn expect_state(&mut self, expected: SessionState) -> Result<(), EngineError> {
        if self.state == expected {
            Ok(())
        } else {
            let found = self.state;
            self.state = SessionState::Failed;
            Err(EngineError::Protocol(format!(
                "expected state {expected:?}, session is {found:?}"
            )))
        }
    }

    /// `uci` -> `uciok`, then `isready` -> `readyok`.
    async fn handshake(&mut self) -> Result<(), EngineError> {
        self.expect_state(SessionState::Starting)?;
        self.send("uci").await?;
        self.wait_for("uciok").await?;
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        self.state = SessionState::UciReady;
        Ok(())
    }

    /// Single thread and a bounded hash keep repeated searches reproducible.
    async fn configure(&mut self, hash_mb: u32, multi_pv: u32) -> Result<(), EngineError> {
        self.expect_state(SessionState::UciReady)?;
        self.send(&format!("setoption name Hash value {hash_mb}")).await?;
        self.send("setoption name Threads value 1").await?;
        self.send("setoption name UCI_AnalyseMode value true").await?;
        if multi_pv > 1 {
            self.send(&format!("setoption name MultiPV value {multi_pv}")).await?;
        }
        self.send("isready").await?;
        self.wait_for("readyok").await?;
        self.state = SessionState::Configured;
        Ok(())
    }

    async fn search(&mut self, fen: &str, limits: &SearchLimits) -> Result<SearchOutput, EngineError> {
        self.expect_state(SessionState::Configured)?;
        self.send(&format!("position fen {fen}")).await?;
        self.send(&format!(
            "go depth {} movetime {}",
            limits.depth,
            limits.move_time.as_millis()
        ))
        .await?;
        self.state = SessionState::Searching;

        let mut output = SearchOutput::default();
        loop {
            let line = self.read_line().await?;

            if line.starts_with("info") {
                if let Some(info) = InfoLine::parse(&line) {
                    output.record(info);
                }
            } else if line.starts_with("bestmove") {
                output.best_move = line.split_whitespace().nth(1).map(String::from);
                break;
            }
        }

        self.state = SessionState::Done;
        Ok(output)
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "SF <");
        let result = async {
            self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
            self.stdin.flush().await
        }
        .await;
        result.map_err(|e| {
            self.state = SessionState::Failed;
            EngineError::Protocol(format!("Failed to write to engine: {e}"))
        })
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        match self.stdout.read_line(&mut line).await {
            Ok(0) => {
                self.state = SessionState::Failed;
                Err(EngineError::Protocol("engine closed its output".into()))
            }
            Ok(_) => {
                let trimmed = line.trim().to_string();
                debug!(line = %trimmed, "SF >");
                Ok(trimmed)
            }
            Err(e) => {
                self.state = SessionState::Failed;
                Err(EngineError::Protocol(format!("Failed to read from engine: {e}")))
            }
        }
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    /// Ask the engine to quit, then kill and reap it if it does not exit in time.
    async fn shutdown(mut self) {
        let _ = self.send("quit").await;
        match tokio::time::timeout(QUIT_GRACE, self.process.wait()).await {
            Ok(Ok(_)) => {}
            _ => {
                if let Err(e) = self.process.kill().await {
                    warn!(error = %e, "Failed to kill engine process");
                }
            }
        }
    }
}

impl Drop for UciSession {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

/// Parsed `info` line carrying both a score and a principal variation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InfoLine {
    multipv: u32,
    depth: u32,
    cp: Option<i32>,
    mate: Option<i32>,
    nodes: Option<u64>,
    pv: Vec<String>,
}

impl InfoLine {
    fn parse(line: &str) -> Option<Self> {
        let pv = parse_pv(line);
        let cp = parse_cp(line);
        let mate = parse_mate(line);
        if pv.is_empty() || (cp.is_none() && mate.is_none()) {
            return None;
        }
        Some(Self {
            multipv: parse_field(line, "multipv").unwrap_or(1),
            depth: parse_field(line, "depth").unwrap_or(0),
            cp,
            mate,
            nodes: parse_field(line, "nodes"),
            pv,
        })
    }
}

#[derive(Debug, Default)]
struct SearchOutput {
    /// Deepest scored line per multipv index
    lines: BTreeMap<u32, InfoLine>,
    best_move: Option<String>,
}

impl SearchOutput {
    fn record(&mut self, info: InfoLine) {
        let deeper = self
            .lines
            .get(&info.multipv)
            .map_or(true, |current| info.depth >= current.depth);
        if deeper {
            self.lines.insert(info.multipv, info);
        }
    }

    /// Build a White-relative evaluation from side-to-move engine output.
    fn into_evaluation(self, fen: &str) -> Result<Evaluation, EngineError> {
        match self.best_move.as_deref() {
            None | Some("(none)") => {
                return Err(EngineError::NoEvaluation(format!("no best move for {fen}")));
            }
            Some(_) => {}
        }
        if self.lines.is_empty() {
            return Err(EngineError::NoEvaluation(format!("no scored line for {fen}")));
        }

        // Involution: converts side-to-move terms into White's terms
        let stm = side_to_move(fen);
        let depth = self.lines.values().map(|l| l.depth).max();
        let nodes = self.lines.values().filter_map(|l| l.nodes).max();
        let pvs = self
            .lines
            .into_values()
            .map(|line| PvLine {
                moves: line.pv.join(" "),
                cp: line.cp.map(|cp| stm.perspective(cp)),
                mate: line.mate.map(|m| stm.perspective(m)),
            })
            .collect();

        Ok(Evaluation {
            fen: fen.to_string(),
            depth,
            knodes: nodes.map(|n| n / 1000),
            pvs,
        })
    }
}

/// Parse the numeric value following `key` in an info line
fn parse_field<T: std::str::FromStr>(line: &str, key: &str) -> Option<T> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    parse_field(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    parse_field(line, "mate")
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";

    #[test]
    fn test_parse_cp() {
        let line = "info depth 20 seldepth 25 multipv 1 score cp 35 nodes 100000 pv e2e4";
        assert_eq!(parse_cp(line), Some(35));
    }

    #[test]
    fn test_parse_mate() {
        let line = "info depth 20 score mate 3 nodes 100000 pv e2e4";
        assert_eq!(parse_mate(line), Some(3));
    }

    #[test]
    fn test_parse_pv() {
        let line = "info depth 20 score cp 35 pv e2e4 e7e5 g1f3";
        let pv = parse_pv(line);
        assert_eq!(pv, vec!["e2e4", "e7e5", "g1f3"]);
    }

    #[test]
    fn test_info_line_requires_score_and_pv() {
        assert!(InfoLine::parse("info depth 5 currmove e2e4 currmovenumber 1").is_none());
        assert!(InfoLine::parse("info depth 5 score cp 10 nodes 40").is_none());
        let info = InfoLine::parse("info depth 5 multipv 2 score cp 10 nodes 4000 pv d2d4").unwrap();
        assert_eq!(info.multipv, 2);
        assert_eq!(info.depth, 5);
        assert_eq!(info.nodes, Some(4000));
    }

    #[test]
    fn test_keeps_deepest_line_per_multipv() {
        let mut output = SearchOutput::default();
        for line in [
            "info depth 1 multipv 1 score cp 10 pv e2e4",
            "info depth 1 multipv 2 score cp 5 pv d2d4",
            "info depth 2 multipv 1 score cp 30 pv g1f3 d7d5",
        ] {
            output.record(InfoLine::parse(line).unwrap());
        }
        output.best_move = Some("g1f3".into());

        let eval = output.into_evaluation(START).unwrap();
        assert_eq!(eval.depth, Some(2));
        assert_eq!(eval.pvs.len(), 2);
        assert_eq!(eval.pvs[0].cp, Some(30));
        assert_eq!(eval.pvs[0].moves, "g1f3 d7d5");
        assert_eq!(eval.pvs[1].cp, Some(5));
    }

    #[test]
    fn test_black_to_move_scores_are_flipped_to_white() {
        let mut output = SearchOutput::default();
        output.record(InfoLine::parse("info depth 10 score cp 40 pv e7e5").unwrap());
        output.record(InfoLine::parse("info depth 10 multipv 2 score mate 2 pv d8h4").unwrap());
        output.best_move = Some("e7e5".into());

        let eval = output.into_evaluation(AFTER_E4).unwrap();
        assert_eq!(eval.pvs[0].cp, Some(-40));
        assert_eq!(eval.pvs[1].mate, Some(-2));
    }

    #[test]
    fn test_no_bestmove_is_no_evaluation() {
        let mut output = SearchOutput::default();
        output.record(InfoLine::parse("info depth 0 score mate 0 pv a1a1").unwrap());
        output.best_move = Some("(none)".into());
        assert!(matches!(
            output.into_evaluation(START),
            Err(EngineError::NoEvaluation(_))
        ));

        let output = SearchOutput {
            best_move: Some("e2e4".into()),
            ..Default::default()
        };
        assert!(matches!(
            output.into_evaluation(START),
            Err(EngineError::NoEvaluation(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let limits = SearchLimits {
            depth: 5,
            move_time: Duration::from_millis(100),
            multi_pv: 1,
        };
        let evaluator = StockfishEvaluator::new(Some("/nonexistent/stockfish".into()), 16);
        assert!(matches!(
            evaluator.evaluate(START, limits).await,
            Err(EngineError::Unavailable(_))
        ));

        let unconfigured = StockfishEvaluator::new(None, 16);
        assert!(matches!(
            unconfigured.evaluate(START, limits).await,
            Err(EngineError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;

        const FAKE_ENGINE: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "id name FakeFish"; echo "uciok" ;;
    isready) echo "readyok" ;;
    go*)
      echo "info depth 1 seldepth 1 score cp 20 nodes 900 pv e2e4"
      echo "info depth 2 seldepth 3 score cp 35 nodes 2500 pv e2e4 e7e5"
      echo "bestmove e2e4 ponder e7e5" ;;
    quit) exit 0 ;;
  esac
done
"#;

        const SILENT_SEARCH: &str = r#"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
    quit) exit 0 ;;
  esac
done
"#;

        // Ignores quit and SIGTERM, never answers go, and records its pid in $1
        const STUBBORN_ENGINE: &str = r#"
trap '' TERM
echo $$ > "$1"
while read -r line; do
  case "$line" in
    uci) echo "uciok" ;;
    isready) echo "readyok" ;;
  esac
done
while :; do sleep 1; done
"#;

        fn fake(script: &str) -> StockfishEvaluator {
            StockfishEvaluator::new(Some("sh".into()), 16)
                .with_args(["-c", script])
                .with_grace(Duration::from_millis(300))
        }

        fn limits() -> SearchLimits {
            SearchLimits {
                depth: 2,
                move_time: Duration::from_millis(200),
                multi_pv: 1,
            }
        }

        #[tokio::test]
        async fn test_full_session_with_fake_engine() {
            let eval = fake(FAKE_ENGINE).evaluate(START, limits()).await.unwrap();
            assert_eq!(eval.depth, Some(2));
            assert_eq!(eval.score_cp(), Some(35));
            assert_eq!(eval.best_move(), Some("e2e4"));
            assert_eq!(eval.knodes, Some(2));
        }

        #[tokio::test]
        async fn test_fake_engine_black_to_move() {
            let eval = fake(FAKE_ENGINE).evaluate(AFTER_E4, limits()).await.unwrap();
            assert_eq!(eval.score_cp(), Some(-35));
        }

        #[tokio::test]
        async fn test_silent_engine_times_out() {
            let result = fake(SILENT_SEARCH).evaluate(START, limits()).await;
            assert!(matches!(result, Err(EngineError::Timeout(_))));
        }

        #[tokio::test]
        async fn test_stubborn_engine_is_killed_and_reaped() {
            let pid_file =
                std::env::temp_dir().join(format!("stubborn-engine-{}.pid", std::process::id()));
            let evaluator = StockfishEvaluator::new(Some("sh".into()), 16)
                .with_args([
                    "-c".to_string(),
                    STUBBORN_ENGINE.to_string(),
                    "stubborn".to_string(),
                    pid_file.display().to_string(),
                ])
                .with_grace(Duration::from_millis(300));

            let result = evaluator.evaluate(START, limits()).await;
            assert!(matches!(result, Err(EngineError::Timeout(_))));

            let pid = std::fs::read_to_string(&pid_file).unwrap().trim().to_string();
            let _ = std::fs::remove_file(&pid_file);

            // A zombie still answers kill -0, so this also checks the reap
            let alive = std::process::Command::new("kill")
                .args(["-0", &pid])
                .stderr(Stdio::null())
                .status()
                .unwrap()
                .success();
            assert!(!alive, "engine process {pid} outlived its evaluation");
        }

        #[tokio::test]
        async fn test_engine_exiting_mid_handshake_is_protocol_error() {
            let result = fake("read -r line; exit 0").evaluate(START, limits()).await;
            assert!(matches!(result, Err(EngineError::Protocol(_))));
        }
    }
}
