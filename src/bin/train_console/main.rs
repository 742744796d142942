//! Interactive console for driving one train through a serial command base.
//!
//! Opens the serial port, starts the horn monitor and then reads one menu
//! choice per line from stdin until the operator quits (or stdin closes).
//! Quitting always sends a system halt.
//!
//! # Build
//!
//! ```bash
//! cargo run --features cli --bin train_console -- --port /dev/ttyUSB0 --address 23
//! ```

mod logging;

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use rs_trainz_base::config::{Config, HornConfig, LinkConfig, TargetConfig, DEFAULT_PORT};
use rs_trainz_base::hal::SerialTransport;
use rs_trainz_base::{
    parse_speed, CommandDispatcher, Error, HornMonitor, InteractiveController, LoopControl,
    TargetType, Transport, UserAction, MAX_SPEED, MENU,
};

use crate::logging::{init_logging, LogFormat, LogLevel};

#[derive(Parser, Debug)]
#[command(name = "train_console", version, about = "Model train serial console")]
struct Cli {
    /// Serial port the base is attached to.
    #[arg(long, env = "TRAIN_PORT", default_value = DEFAULT_PORT)]
    port: String,

    /// Bus address of the train (0 to 127).
    #[arg(long, env = "TRAIN_ADDRESS", default_value_t = 23,
          value_parser = clap::value_parser!(u8).range(0..=127))]
    address: u8,

    /// Target type.
    #[arg(long, default_value = "train", value_parser = parse_kind)]
    kind: TargetType,

    /// Line speed in baud.
    #[arg(long, default_value_t = 9600)]
    baud: u32,

    /// Write timeout in milliseconds.
    #[arg(long, default_value_t = 50)]
    timeout_ms: u32,

    /// Sound the horn while speed is at or above this step.
    #[arg(long, default_value_t = 5)]
    horn_threshold: u8,

    /// Horn monitor period in milliseconds (at least 1).
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u32).range(1..))]
    horn_period_ms: u32,

    /// Do not start the horn monitor.
    #[arg(long)]
    no_horn: bool,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,
}

impl Cli {
    fn config(&self) -> Config {
        Config::default()
            .with_link(
                LinkConfig::default()
                    .with_port(&self.port)
                    .with_baud_rate(self.baud)
                    .with_timeout_ms(self.timeout_ms),
            )
            .with_target(
                TargetConfig::default()
                    .with_address(self.address)
                    .with_kind(self.kind),
            )
            .with_horn(
                HornConfig::default()
                    .with_enabled(!self.no_horn)
                    .with_threshold(self.horn_threshold)
                    .with_period_ms(self.horn_period_ms),
            )
    }
}

fn parse_kind(s: &str) -> Result<TargetType, String> {
    TargetType::from_text(s).ok_or_else(|| format!("unknown target type {:?}", s))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);
    let config = cli.config();

    // =========================================================================
    // Link
    // =========================================================================
    let transport = match SerialTransport::open(&config.link) {
        Ok(t) => t,
        Err(e) => {
            error!(port = %config.link.port, error = %e, "cannot open transport");
            return Err(Error::CannotOpenTransport(e).into());
        }
    };

    let target = config.target.build();
    info!(
        port = %config.link.port,
        address = %target.address(),
        kind = target.kind().as_str(),
        "controller ready"
    );
    let dispatcher = Arc::new(CommandDispatcher::new(target, transport));

    // =========================================================================
    // Horn monitor
    // =========================================================================
    let horn = if config.horn.enabled {
        Some(HornMonitor::new(Arc::clone(&dispatcher), &config.horn).spawn()?)
    } else {
        None
    };

    // =========================================================================
    // Operator loop
    // =========================================================================
    let controller = InteractiveController::new(Arc::clone(&dispatcher));
    let stdin = io::stdin();
    let stdout = io::stdout();
    // Halted on every path out of the loop, so shutdown always runs
    let outcome = run_console(&controller, stdin.lock(), stdout.lock());

    // =========================================================================
    // Shutdown
    // =========================================================================
    if let Some(handle) = horn {
        match handle.join() {
            Ok(report) => info!(
                ticks = report.ticks,
                horns = report.horns,
                failures = report.failures,
                "horn monitor stopped"
            ),
            Err(_) => warn!("horn monitor panicked"),
        }
    }

    let stats = dispatcher.stats();
    info!(dispatched = stats.dispatched, failed = stats.failed, "closing link");
    // Failure is already logged by the dispatcher
    let _ = dispatcher.close();

    outcome
}

/// Read actions until the operator quits.
///
/// The base is left halted on every return, including console I/O failures.
fn run_console<T, R, W>(
    controller: &InteractiveController<T>,
    input: R,
    out: W,
) -> anyhow::Result<()>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    let result = console_loop(controller, input, out);
    if let Err(e) = &result {
        if !controller.dispatcher().is_halted() {
            error!(error = %e, "console failed, halting");
            controller.handle(UserAction::Quit)?;
        }
    }
    result
}

fn console_loop<T, R, W>(
    controller: &InteractiveController<T>,
    mut input: R,
    mut out: W,
) -> anyhow::Result<()>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        write!(out, "{}> ", MENU)?;
        out.flush()?;

        line.clear();
        let action = match read_line(&mut input, &mut line)? {
            Some(Ok(())) => read_action(&line, &mut input, &mut out)?,
            Some(Err(e)) => Err(e),
            None => {
                info!("end of input, halting");
                controller.handle(UserAction::Quit)?;
                return Ok(());
            }
        };

        let action = match action {
            Ok(action) => action,
            Err(e) => {
                writeln!(out, "{}", e)?;
                continue;
            }
        };

        match controller.handle(action) {
            Ok(LoopControl::Continue) => {}
            Ok(LoopControl::Exit) => {
                writeln!(out, "Halted.")?;
                return Ok(());
            }
            Err(e) => {
                warn!(action = ?action, error = %e, "command not delivered");
                writeln!(out, "{}", e)?;
            }
        }
    }
}

/// Read one line. `None` at end of input; a line that is not UTF-8 is
/// consumed and reported as invalid input.
fn read_line<R: BufRead>(
    input: &mut R,
    line: &mut String,
) -> io::Result<Option<rs_trainz_base::Result<()>>> {
    match input.read_line(line) {
        Ok(0) => Ok(None),
        Ok(_) => Ok(Some(Ok(()))),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(Some(Err(
            Error::InvalidUserInput("input is not valid UTF-8".into()),
        ))),
        Err(e) => Err(e),
    }
}

/// Parse one menu line. A bare `*` prompts for the speed on the next line.
fn read_action<R: BufRead, W: Write>(
    line: &str,
    input: &mut R,
    out: &mut W,
) -> io::Result<rs_trainz_base::Result<UserAction>> {
    if line.trim() != "*" {
        return Ok(UserAction::parse(line));
    }

    write!(out, "Speed (0 to {}): ", MAX_SPEED)?;
    out.flush()?;
    let mut speed = String::new();
    Ok(match read_line(input, &mut speed)? {
        Some(Ok(())) => parse_speed(&speed).map(UserAction::SetSpeed),
        Some(Err(e)) => Err(e),
        None => Err(Error::InvalidUserInput("speed required (0 to 20)".into())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rs_trainz_base::hal::MockTransport;
    use rs_trainz_base::Address;
    use std::io::{BufReader, Cursor, Read};

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct DeadInput;

    impl Read for DeadInput {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "stdin gone"))
        }
    }

    fn controller() -> (InteractiveController<MockTransport>, MockTransport) {
        let transport = MockTransport::new();
        let wire = transport.clone();
        let target = TargetConfig::default().build();
        let dispatcher = Arc::new(CommandDispatcher::new(target, transport));
        (InteractiveController::new(dispatcher), wire)
    }

    fn run(input: &str) -> (MockTransport, String) {
        let (c, wire) = controller();
        let mut out = Vec::new();
        run_console(&c, Cursor::new(input.as_bytes()), &mut out).unwrap();
        (wire, String::from_utf8(out).unwrap())
    }

    #[test]
    fn parses_defaults() {
        let cli = Cli::try_parse_from(["train_console"]).expect("defaults should parse");
        let config = cli.config();
        assert_eq!(config.target.address, 23);
        assert_eq!(config.link.baud_rate, 9600);
        assert!(config.horn.enabled);
        assert_eq!(config.horn.threshold, 5);
        assert_eq!(config.horn.period_ms, 500);
    }

    #[test]
    fn parses_overrides() {
        let cli = Cli::try_parse_from([
            "train_console",
            "--port",
            "COM3",
            "--address",
            "42",
            "--kind",
            "switch",
            "--no-horn",
            "--log-format",
            "json",
        ])
        .expect("overrides should parse");
        let config = cli.config();
        assert_eq!(config.link.port.as_str(), "COM3");
        assert_eq!(config.target.build().address(), Address::new(42));
        assert_eq!(config.target.kind, TargetType::Switch);
        assert!(!config.horn.enabled);
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_wide_address() {
        let err = Cli::try_parse_from(["train_console", "--address", "128"])
            .expect_err("address above 127 should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn quit_sends_halt() {
        let (wire, out) = run("w\nq\n");
        assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0x80], [0xFE, 0xFF, 0xFF]]);
        assert!(out.contains("Halted."));
    }

    #[test]
    fn end_of_input_halts() {
        let (wire, _) = run("b\n");
        assert_eq!(wire.last_frame(), Some([0xFE, 0xFF, 0xFF]));
    }

    #[test]
    fn star_prompts_for_speed() {
        let (wire, out) = run("*\n12\nq\n");
        assert_eq!(wire.frames()[0], [0xFE, 0x0B, 0xEC]);
        assert!(out.contains("Speed (0 to 20)"));
    }

    #[test]
    fn invalid_input_reprompts() {
        let (wire, out) = run("x\n*abc\n \nq\n");
        assert!(out.contains("unknown option"));
        assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0x87], [0xFE, 0xFF, 0xFF]]);
    }

    #[test]
    fn write_failure_keeps_going() {
        let (c, wire) = controller();
        wire.fail_next(1);
        let mut out = Vec::new();
        run_console(&c, Cursor::new(&b"*5\n+\nq\n"[..]), &mut out).unwrap();

        assert_eq!(c.dispatcher().speed(), 6);
        assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0xC6], [0xFE, 0xFF, 0xFF]]);
        assert!(String::from_utf8(out).unwrap().contains("write failed"));
    }

    #[test]
    fn rejects_zero_horn_period() {
        let err = Cli::try_parse_from(["train_console", "--horn-period-ms", "0"])
            .expect_err("zero period should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn non_utf8_line_reprompts() {
        let (c, wire) = controller();
        let mut out = Vec::new();
        run_console(&c, Cursor::new(&b"*8\n\xff\nq\n"[..]), &mut out).unwrap();

        assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0xE8], [0xFE, 0xFF, 0xFF]]);
        assert!(String::from_utf8(out).unwrap().contains("not valid UTF-8"));
    }

    #[test]
    fn non_utf8_speed_reprompts() {
        let (c, wire) = controller();
        let mut out = Vec::new();
        run_console(&c, Cursor::new(&b"*\n\xfe\n*3\nq\n"[..]), &mut out).unwrap();

        assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0xE3], [0xFE, 0xFF, 0xFF]]);
    }

    #[test]
    fn output_failure_still_halts() {
        let (c, wire) = controller();
        c.handle(UserAction::SetSpeed(8)).unwrap();

        assert!(run_console(&c, Cursor::new(&b"w\n"[..]), BrokenPipe).is_err());
        assert!(c.dispatcher().is_halted());
        assert_eq!(wire.frames(), vec![[0xFE, 0x0B, 0xE8], [0xFE, 0xFF, 0xFF]]);
    }

    #[test]
    fn input_failure_still_halts() {
        let (c, wire) = controller();
        c.handle(UserAction::SetSpeed(8)).unwrap();

        let mut out = Vec::new();
        assert!(run_console(&c, BufReader::new(DeadInput), &mut out).is_err());
        assert!(c.dispatcher().is_halted());
        assert_eq!(wire.last_frame(), Some([0xFE, 0xFF, 0xFF]));
    }

    #[test]
    fn failure_after_quit_sends_one_halt() {
        let (c, wire) = controller();
        let mut out = Vec::new();
        run_console(&c, Cursor::new(&b"q\n"[..]), &mut out).unwrap();
        // Base already halted; a later console failure must not halt again
        assert!(run_console(&c, Cursor::new(&b""[..]), BrokenPipe).is_err());

        let halts = wire.frames().iter().filter(|f| **f == [0xFE, 0xFF, 0xFF]).count();
        assert_eq!(halts, 1);
    }
}
