use music_store_agent::{
    agent::build_agent,
    config::{AgentConfig, DEFAULT_LOG_FILTER},
    ConfirmationRequest,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin, Stdout};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

type Input = Lines<BufReader<Stdin>>;

async fn prompt(stdout: &mut Stdout, label: &str) -> std::io::Result<()> {
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await
}

fn print_confirmation(request: &ConfirmationRequest) {
    println!("\n{}", request.question);
    println!(
        "  Customer ID: {}\n  Name: {}",
        request.account_details.customer_id, request.account_details.customer_name
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing; logs go to stderr so the conversation stays readable
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)))
        .with_writer(std::io::stderr)
        .init();

    let config = AgentConfig::from_env()?;
    if config.llm.api_key.is_empty() {
        warn!("OPENAI_API_KEY not set; model calls will fail");
    }

    let agent = build_agent(&config).await?;
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, "Music store agent starting");

    let mut lines: Input = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("Music store assistant. Type 'quit' to exit.");

    loop {
        // The stored checkpoint decides what to ask for, so a failed resume
        // simply asks for the decision again
        if let Some(request) = agent.pending_confirmation(session_id).await? {
            print_confirmation(&request);
            prompt(&mut stdout, "(yes/no)> ").await?;

            let Some(decision) = lines.next_line().await? else {
                break;
            };
            if decision.trim() == "quit" {
                break;
            }

            match agent.confirm(session_id, &decision).await {
                Ok(outcome) => {
                    if let Some(reply) = outcome.reply {
                        println!("\nassistant> {}", reply);
                    }
                }
                Err(e) => eprintln!("Confirmation failed: {}", e),
            }
            continue;
        }

        prompt(&mut stdout, "\nyou> ").await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }

        match agent.handle_message(session_id, line).await {
            Ok(outcome) => {
                if let Some(reply) = outcome.reply {
                    println!("\nassistant> {}", reply);
                }
            }
            Err(e) => eprintln!("Turn failed: {}", e),
        }
    }

    Ok(())
}
