//! Two actors exchanging a bounded rally, then shutting down together
//! through their link.

use serde::{Deserialize, Serialize};
use skein_rt::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Ball {
    rally: u32,
}

const RALLIES: u32 = 10;

fn main() -> Result<(), SystemError> {
    let system = ActorSystem::new(SystemConfig::default())?;

    // Pong returns every ball to whoever served it.
    let pong = system
        .spawn(|_| {
            Behavior::new().on(|ctx, (ball,): (Ball,)| {
                println!("pong returns rally {}", ball.rally);
                let server = ctx.sender().clone();
                let _ = ctx.send_to(
                    &server,
                    payload!(Ball {
                        rally: ball.rally + 1
                    }),
                );
            })
        })
        .map_err(SystemError::from)?;

    // Ping drives the rally toward pong and ends the match at the cap.
    let opponent = pong.clone();
    let ping = system
        .spawn(move |_| {
            Behavior::new().on(move |ctx, (ball,): (Ball,)| {
                println!("ping plays rally {}", ball.rally);
                if ball.rally >= RALLIES {
                    ctx.quit(ExitReason::UserShutdown);
                    return;
                }
                let _ = ctx.send(&opponent, payload!(ball));
            })
        })
        .map_err(SystemError::from)?;

    // The link carries ping's final exit over to pong.
    system.link(&ping, &pong);
    ping.send(payload!(Ball { rally: 0 })).ok();

    system.await_all_actors_done();
    system.shutdown()
}
