use instrument_layer::config::LayerConfig;
use instrument_layer::logging::init_logging;
use instrument_layer::rpc::{dispatch, drain_notifications, ServerState};
use instrument_layer::runtime::PeriodicClock;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Everything the main loop reacts to
enum Input {
    Line(String),
    Tick,
    Eof,
}

fn main() -> anyhow::Result<()> {
    let config = LayerConfig::load(std::env::args().nth(1))?;
    let _logging = init_logging(&config.logging)?;
    tracing::info!("Starting instrument layer server");

    let clock_period = Duration::from_millis(config.clock_period_ms);
    let mut state = ServerState::new(config)?;
    let (tx, rx) = mpsc::channel::<Input>();

    let stdin_tx = tx.clone();
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(l) => {
                        if stdin_tx.send(Input::Line(l)).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Error reading stdin");
                        break;
                    }
                }
            }
            let _ = stdin_tx.send(Input::Eof);
        })?;

    let clock = PeriodicClock::new();
    clock.subscribe(move |_| {
        tx.send(Input::Tick)?;
        Ok(())
    });
    let clock_handle = clock.start(clock_period)?;

    let mut stdout = io::stdout();
    for input in rx.iter() {
        let mut out = Vec::new();
        match input {
            Input::Line(line) => {
                if let Some(response) = dispatch(&mut state, &line) {
                    out.push(response);
                }
            }
            Input::Tick => {
                state.pump();
            }
            Input::Eof => break,
        }
        out.extend(drain_notifications(&state));

        for message in &out {
            writeln!(stdout, "{}", message)?;
        }
        if !out.is_empty() {
            stdout.flush()?;
        }
        if state.closed {
            break;
        }
    }

    clock_handle.stop();
    tracing::info!("Shutting down");
    Ok(())
}
