use crate::application::session::Session;
use crate::application::turn::TurnOrchestrator;
use crate::infrastructure::model::ModelProvider;
use crate::infrastructure::transport::ToolTransport;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;

/// Line-oriented interactive loop. Reads queries from stdin, runs one
/// turn per line, and prints either the answer or an error line; a turn
/// failure never terminates the loop. `quit` (any case) or EOF exits.
pub async fn run<P, T>(
    orchestrator: &TurnOrchestrator<P>,
    session: &mut Session<T>,
) -> Result<(), io::Error>
where
    P: ModelProvider,
    T: ToolTransport,
{
    let stdin = BufReader::new(io::stdin());
    let mut lines = stdin.lines();
    let mut stdout = io::stdout();

    stdout
        .write_all(b"\ndeskpilot agent started.\nType your queries or 'quit' to exit.\n")
        .await?;

    loop {
        stdout.write_all(b"\nQuery: ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("quit") {
            break;
        }

        match orchestrator.run_turn(session, query).await {
            Ok(answer) => {
                stdout.write_all(format!("\n{answer}\n").as_bytes()).await?;
            }
            Err(err) => {
                error!(%err, "Turn failed");
                stdout
                    .write_all(format!("\nError: {err}\n").as_bytes())
                    .await?;
            }
        }
        stdout.flush().await?;
    }

    Ok(())
}
