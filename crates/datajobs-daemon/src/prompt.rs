use std::io::{BufRead, Write};

use async_trait::async_trait;
use datajobs_scheduler::{ConfirmationPrompt, Decision};
use tracing::warn;

/// Asks on the terminal. Anything but an explicit yes declines.
pub(crate) struct StdinPrompt;

#[async_trait]
impl ConfirmationPrompt for StdinPrompt {
    async fn confirm(&self, title: &str, message: &str) -> Decision {
        let question = format!("{title}: {message} [y/N] ");
        let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
            let mut stdout = std::io::stdout();
            stdout.write_all(question.as_bytes())?;
            stdout.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await;

        match answer {
            Ok(Ok(line)) => parse_answer(&line),
            Ok(Err(e)) => {
                warn!(error = %e, "could not read confirmation");
                Decision::Decline
            }
            Err(e) => {
                warn!(error = %e, "confirmation task failed");
                Decision::Decline
            }
        }
    }
}

pub(crate) fn parse_answer(line: &str) -> Decision {
    let answer = line.trim();
    Decision::from(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_approves() {
        assert_eq!(parse_answer("y\n"), Decision::Approve);
        assert_eq!(parse_answer(" YES "), Decision::Approve);
        assert_eq!(parse_answer("\n"), Decision::Decline);
        assert_eq!(parse_answer("no"), Decision::Decline);
        assert_eq!(parse_answer("yep"), Decision::Decline);
    }
}
