//! A calculator driven synchronously from a scoped actor.
//!
//! Exit codes: 0 on clean shutdown, 2 on configuration error.

#![allow(clippy::expect_used)]

use serde::{Deserialize, Serialize};
use skein_rt::prelude::*;
use std::process::ExitCode;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Plus;
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Minus;

fn build_config() -> Result<SystemConfig, String> {
    let mut builder = SystemConfig::builder();
    if let Ok(raw) = std::env::var("SKEIN_WORKERS") {
        let workers: usize = raw
            .parse()
            .map_err(|_| format!("SKEIN_WORKERS must be a number, got {raw:?}"))?;
        builder = builder.with_workers(workers);
    }
    builder.build()
}

fn main() -> ExitCode {
    let config = match build_config() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("startup configuration error: {message}");
            return ExitCode::from(2);
        }
    };
    let system = match ActorSystem::new(config) {
        Ok(system) => system,
        Err(err) => {
            eprintln!("startup configuration error: {err}");
            return ExitCode::from(2);
        }
    };

    let calculator = system
        .spawn(|_| {
            Behavior::new()
                .on(|_, (_, x, y): (Plus, i64, i64)| (x + y,))
                .on(|_, (_, x, y): (Minus, i64, i64)| (x - y,))
        })
        .expect("spawn calculator");

    let mut driver = system.scoped();
    for (x, y) in [(16i64, 26i64), (7, 35), (100, -58)] {
        match driver.request(&calculator, payload!(Plus, x, y), Duration::from_secs(1)) {
            Ok(reply) => println!("{x} + {y} = {:?}", reply.get::<i64>(0)),
            Err(err) => println!("{x} + {y} failed: {err}"),
        }
    }
    drop(driver);

    calculator.kill();
    match system.shutdown() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("shutdown failed: {err}");
            ExitCode::from(1)
        }
    }
}
