use std::io::Write;

use meteotrip_core::chat::ChatSession;
use meteotrip_core::trip::ChatReply;
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::util::{api_request, exit_code_for, print_connection_error, raw_api_request};

const EXIT_WORDS: &[&str] = &["exit", "quit", ":q"];

pub async fn run(api_url: &str, message: Option<&str>, raw: bool) -> i32 {
    match message {
        Some(message) => {
            api_request(
                api_url,
                reqwest::Method::POST,
                "/api/chat",
                None,
                Some(json!({ "message": message })),
                &[],
                raw,
            )
            .await
        }
        None => repl(api_url).await,
    }
}

/// Interactive session: one wish per line until EOF or an exit word.
async fn repl(api_url: &str) -> i32 {
    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!("Décrivez votre envie de voyage (\"exit\" pour quitter).");
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();

        let Some(wish) = next_wish(&mut lines).await else {
            break;
        };
        let wish = wish.as_str();

        let (status, body) = match raw_api_request(
            api_url,
            reqwest::Method::POST,
            "/api/chat",
            None,
            Some(json!({ "message": wish })),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                print_connection_error(&e);
                return 3;
            }
        };
        if exit_code_for(status) != 0 {
            eprintln!("{}", serde_json::to_string_pretty(&body).unwrap());
            return exit_code_for(status);
        }

        let reply: ChatReply = match serde_json::from_value(body) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(error = %e, "unexpected chat reply shape");
                continue;
            }
        };
        session.push_user(wish);
        println!("{}", render_reply(&reply));
        session.push_assistant(reply);
    }

    if let Some(destination) = session.last_destination() {
        eprintln!(
            "Pour planifier : meteotrip trip create --stop '{}@AAAA-MM-JJ' ...",
            destination.city
        );
    }
    0
}

/// Next non-blank line, or `None` at EOF, on a read error or an exit word.
async fn next_wish<R: AsyncBufRead + Unpin>(lines: &mut Lines<R>) -> Option<String> {
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                return None;
            }
        };
        let wish = line.trim();
        if wish.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&wish) {
            return None;
        }
        return Some(wish.to_string());
    }
}

fn render_reply(reply: &ChatReply) -> String {
    let mut out = reply.response.clone();
    for destination in &reply.destinations {
        out.push_str(&format!("\n  → {} : {}", destination.city, destination.reason));
    }
    out
}

#[cfg(test)]
mod tests {
    use meteotrip_core::trip::ChatDestination;

    use super::*;

    #[test]
    fn reply_lists_destinations_under_the_answer() {
        let reply = ChatReply {
            response: "Cap sur le Japon !".to_string(),
            destinations: vec![ChatDestination {
                city: "Tokyo, Japon".to_string(),
                reason: "Capitale mondiale du sushi".to_string(),
            }],
        };
        assert_eq!(
            render_reply(&reply),
            "Cap sur le Japon !\n  → Tokyo, Japon : Capitale mondiale du sushi"
        );
    }

    #[tokio::test]
    async fn wishes_skip_blank_lines_and_stop_at_exit_word() {
        let mut lines = BufReader::new(&b"\n   \n  Lisbonne en mai \nquit\nRome\n"[..]).lines();

        assert_eq!(next_wish(&mut lines).await.as_deref(), Some("Lisbonne en mai"));
        assert_eq!(next_wish(&mut lines).await, None);
    }

    #[tokio::test]
    async fn wishes_end_at_eof() {
        let mut lines = BufReader::new(&b"Kyoto"[..]).lines();

        assert_eq!(next_wish(&mut lines).await.as_deref(), Some("Kyoto"));
        assert_eq!(next_wish(&mut lines).await, None);
    }
}
