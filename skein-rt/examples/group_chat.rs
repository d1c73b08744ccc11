//! Group multicast: several listeners join a chat room and every published
//! line fans out to all of them.

#![allow(clippy::expect_used)]

use serde::{Deserialize, Serialize};
use skein_rt::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Line {
    from: String,
    text: String,
}

fn main() -> Result<(), SystemError> {
    let system = ActorSystem::new(SystemConfig::default())?;
    let room = system
        .groups()
        .get_local("chatroom")
        .expect("local module is registered");

    for id in 0..3 {
        let listener = system
            .spawn(move |_| {
                Behavior::new().on(move |_, (line,): (Line,)| {
                    println!("[listener {id}] {}: {}", line.from, line.text);
                })
            })
            .map_err(SystemError::from)?;
        room.subscribe(listener.address());
    }

    room.publish(payload!(Line {
        from: String::from("system"),
        text: String::from("welcome to the chatroom"),
    }));
    room.publish(payload!(Line {
        from: String::from("system"),
        text: String::from("three listeners should see each line"),
    }));

    // Let the fan-out drain before tearing down.
    std::thread::sleep(Duration::from_millis(100));
    system.shutdown()
}
