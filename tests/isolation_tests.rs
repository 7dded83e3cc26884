//! Concurrency-focused checks on the isolation invariant: many clients
//! hammering the same handler never leak state across sessions.

mod common;

use common::*;
use fiberserve::sandbox::RequestContext;
use serde_json::{json, Value};
use std::thread;

fn counter(ctx: &mut RequestContext) -> anyhow::Result<()> {
    let count = ctx
        .session()
        .get("count")
        .and_then(Value::as_i64)
        .unwrap_or(0)
        + 1;
    ctx.session_mut().insert("count".to_string(), json!(count));
    ctx.echo(&format!("count={count}"));
    Ok(())
}

#[test]
fn concurrent_clients_accumulate_independently() {
    let server = start_service(|handlers| handlers.register("/counter", counter));
    let addr = server.addr;

    const CLIENTS: usize = 4;
    const REQUESTS: i64 = 10;

    let tokens: Vec<String> = thread::scope(|scope| {
        let workers: Vec<_> = (0..CLIENTS)
            .map(|_| {
                scope.spawn(move || {
                    let first = get(&addr, "/counter");
                    assert_eq!(parse_response(&first).2, "count=1");
                    let token = session_cookie(&first).unwrap();
                    for expected in 2..=REQUESTS {
                        let resp = get_with_cookie(
                            &addr,
                            "/counter",
                            &format!("SESSIONID={token}"),
                        );
                        // each client only ever sees its own monotonic count
                        assert_eq!(parse_response(&resp).2, format!("count={expected}"));
                    }
                    token
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    // all sessions are distinct and each finished at exactly REQUESTS
    assert_eq!(server.sessions.len(), CLIENTS);
    for token in &tokens {
        assert_eq!(
            server.sessions.load(token).get("count"),
            Some(&json!(REQUESTS)),
            "session {token} lost or gained increments"
        );
    }

    server.stop();
}

#[test]
fn interleaved_requests_do_not_leak_output() {
    // a handler that builds its response from its own session id; if output
    // buffers were shared, interleaved requests would corrupt each other
    let server = start_service(|handlers| {
        handlers.register("/whoami", |ctx: &mut RequestContext| {
            let id = ctx.session_id().to_string();
            ctx.echo("id=");
            ctx.echo(&id);
            Ok(())
        });
    });
    let addr = server.addr;

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(move || {
                for _ in 0..5 {
                    let resp = get(&addr, "/whoami");
                    let (status, _, body) = parse_response(&resp);
                    assert_eq!(status, 200);
                    let token = session_cookie(&resp).unwrap();
                    assert_eq!(body, format!("id={token}"));
                }
            });
        }
    });

    server.stop();
}
