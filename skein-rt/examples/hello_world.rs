//! Smallest possible runtime usage: one actor, one message.

use serde::{Deserialize, Serialize};
use skein_rt::prelude::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Greet {
    name: String,
}

fn main() -> Result<(), SystemError> {
    let system = ActorSystem::new(SystemConfig::default())?;

    let greeter = system
        .spawn(|_| {
            Behavior::new().on(|ctx, (greet,): (Greet,)| {
                println!("hello, {}!", greet.name);
                ctx.quit(ExitReason::Normal);
            })
        })
        .map_err(SystemError::from)?;

    greeter
        .send(payload!(Greet {
            name: String::from("world")
        }))
        .ok();

    system.await_all_actors_done();
    system.shutdown()
}
