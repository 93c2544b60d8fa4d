//! Sequencer demo
//!
//! Runs a few small sequences on a realtime engine and logs what happens.
//!
//! Usage:
//!   cargo run --bin sequence_demo -- --demo 1            # Run demo 1
//!   cargo run --bin sequence_demo -- --demo 3 --rate 4   # Run demo 3 four times faster
//!   cargo run --bin sequence_demo -- --offline           # Run every demo on the offline clock
//!
//! Demos:
//!   1. Clicks   - A chain of deferred steps, one every 250ms
//!   2. Race     - Three "requests" race through once(); the fastest wins
//!   3. Barrier  - Four "requests" joined with all(); waits for the slowest
//!   4. Peek     - A step previews the next one with next() before moving on
//!
//! Set RUST_LOG=beat_sequencer=debug to see every advance and timer.

use beat_sequencer::{Engine, EngineConfig, SchedulerMode, Sequencer};
use std::cell::Cell;
use std::env;
use std::rc::Rc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_usage() {
    println!("Usage: cargo run --bin sequence_demo -- [--demo <1-4>] [--rate <R>] [--offline]");
    println!();
    println!("Demos:");
    println!("  1. Clicks   - deferred steps every 250ms");
    println!("  2. Race     - once() callbacks, fastest wins");
    println!("  3. Barrier  - all() callbacks, slowest releases");
    println!("  4. Peek     - next() previews the following step");
}

/// Demo 1: each step logs a click and defers the next one.
fn demo_clicks(engine: &mut Engine) -> Result<(), Box<dyn std::error::Error>> {
    const CLICKS: u32 = 8;
    let seq: Sequencer<u32> = engine.sequencer();

    for _ in 0..CLICKS {
        seq.beat(|b, n| {
            info!(click = n, index = b.index(), "click");
            b.defer_with(250, n + 1);
            Ok(())
        });
    }
    seq.beat(|_, n| {
        info!(clicks = n, "done clicking");
        Ok(())
    });

    seq.go(1)?;
    engine.run_until_idle()?;
    Ok(())
}

/// Demo 2: the first of several simulated responses advances the sequence.
fn demo_race(engine: &mut Engine) -> Result<(), Box<dyn std::error::Error>> {
    let seq: Sequencer<&'static str> = engine.sequencer();

    seq.beat(|b, _| {
        for (delay, name) in [(300, "slow"), (120, "fast"), (200, "medium")] {
            let done = b.once();
            b.set_timeout(delay, move || {
                info!(name, delay, "response arrived");
                done.call(name)
            });
        }
        Ok(())
    })
    .beat(|_, winner| {
        info!(winner, "race finished");
        Ok(())
    });

    seq.go("start")?;
    engine.run_until_idle()?;
    Ok(())
}

/// Demo 3: the sequence waits until every simulated response has arrived.
fn demo_barrier(engine: &mut Engine) -> Result<(), Box<dyn std::error::Error>> {
    let arrived = Rc::new(Cell::new(0u32));
    let seq: Sequencer<u64> = engine.sequencer();

    let counter = arrived.clone();
    seq.beat(move |b, _| {
        for delay in [400, 100, 250, 50] {
            let done = b.all();
            let counter = counter.clone();
            b.set_timeout(delay, move || {
                counter.set(counter.get() + 1);
                info!(delay, arrived = counter.get(), "response arrived");
                done.call(delay)
            });
        }
        Ok(())
    })
    .beat(|_, last| {
        info!(last_delay = last, "all responses in");
        Ok(())
    });

    seq.go(0)?;
    engine.run_until_idle()?;
    info!(arrived = arrived.get(), "barrier demo complete");
    Ok(())
}

/// Demo 4: a step peeks at its follower, then advances for real.
fn demo_peek(engine: &mut Engine) -> Result<(), Box<dyn std::error::Error>> {
    let seq: Sequencer<String> = engine.sequencer();

    seq.beat(|b, _| {
        b.next("preview".to_string())?;
        b.defer_with(100, "for real".to_string());
        Ok(())
    })
    .beat(|b, mode| {
        info!(%mode, cursor = ?b.sequencer().cursor(), "second step ran");
        Ok(())
    });

    seq.go(String::new())?;
    engine.run_until_idle()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    let mut demo: Option<usize> = None;
    let mut rate = 1.0;
    let mut mode = SchedulerMode::Realtime;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--demo" | "-d" => {
                i += 1;
                if i < args.len() {
                    demo = args[i].parse().ok();
                }
            }
            "--rate" | "-r" => {
                i += 1;
                if i < args.len() {
                    rate = args[i].parse().unwrap_or(1.0);
                }
            }
            "--offline" => {
                mode = SchedulerMode::Offline;
            }
            "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let demos: Vec<usize> = match demo {
        Some(d) if (1..=4).contains(&d) => vec![d],
        Some(d) => {
            return Err(format!("Invalid demo {}. Must be 1-4.", d).into());
        }
        None => (1..=4).collect(),
    };

    for d in demos {
        let mut engine = Engine::new(
            mode,
            EngineConfig {
                rate,
                ..Default::default()
            },
        );
        info!(demo = d, ?mode, rate, "starting demo");

        match d {
            1 => demo_clicks(&mut engine)?,
            2 => demo_race(&mut engine)?,
            3 => demo_barrier(&mut engine)?,
            _ => demo_peek(&mut engine)?,
        }

        info!(demo = d, elapsed_ms = engine.now_ms(), "demo finished");
    }

    Ok(())
}
