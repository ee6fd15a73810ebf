use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use legal_chat_client::{
    ui, AppConfig, AssistantBackend, AssistantClient, ChatController, HealthMonitor,
};

#[derive(Parser)]
#[command(name = "chat-cli")]
#[command(about = "Consultation juridique en ligne de commande", long_about = None)]
struct Cli {
    /// Backend API base URL
    #[arg(long)]
    api_url: Option<String>,

    /// Directory holding persisted conversations
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Caller identity sent with every message
    #[arg(long)]
    user: Option<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

enum LoopAction {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(user) = cli.user {
        config.user_id = user;
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout = std::time::Duration::from_secs(secs);
    }

    let client = Arc::new(AssistantClient::new(
        config.api_base_url.clone(),
        config.user_id.clone(),
        config.request_timeout,
    ));
    let backend: Arc<dyn AssistantBackend> = client.clone();
    let controller = Arc::new(legal_chat_client::open_file_backed(
        &config.data_dir,
        backend,
        config.user_id.clone(),
    )?);
    controller.initialize();

    let monitor = HealthMonitor::spawn(client.clone(), config.health_check_interval);
    info!("Connected to {}", config.api_base_url);

    println!("{}", ui::welcome_screen());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let snapshot = controller.snapshot();
        // The banner only appears once the probe has actually run
        if monitor.last_check().is_some() {
            if let Some(banner) = ui::health_banner(monitor.is_healthy()) {
                print!("{}", banner);
            }
        }
        print!("{} > ", ui::conversation_header(&snapshot));
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let action = if let Some(command) = input.strip_prefix('/') {
            run_command(command, &controller, &client).await
        } else {
            send(input, &controller).await;
            LoopAction::Continue
        };
        if matches!(action, LoopAction::Quit) {
            break;
        }
    }

    println!("Au revoir.");
    Ok(())
}

async fn send(text: &str, controller: &ChatController) {
    println!("{}", ui::typing_indicator());
    controller.send_message(text).await;

    let snapshot = controller.snapshot();
    if let Some(error) = snapshot.error.as_deref() {
        print!("{}", ui::render_error(error));
        return;
    }
    // Echo the exchange that just completed
    for message in snapshot.messages.iter().rev().take(2).rev() {
        print!("{}", ui::render_message(message));
    }
}

async fn run_command(
    command: &str,
    controller: &ChatController,
    client: &AssistantClient,
) -> LoopAction {
    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let argument = parts.next();

    match name {
        "new" => {
            controller.start_new_conversation();
            println!("Nouvelle consultation ouverte.");
        }
        "list" => {
            let snapshot = controller.snapshot();
            print!(
                "{}",
                ui::render_conversation_list(
                    &snapshot.conversations,
                    snapshot.current_conversation_id.as_deref(),
                )
            );
        }
        "open" => match resolve_conversation(controller, argument) {
            Some(id) => {
                controller.load_conversation(&id);
                let snapshot = controller.snapshot();
                println!("{}", ui::conversation_header(&snapshot));
                for message in &snapshot.messages {
                    print!("{}", ui::render_message(message));
                }
            }
            None => println!("Conversation introuvable."),
        },
        "delete" => match resolve_conversation(controller, argument) {
            Some(id) => {
                controller.delete_conversation(&id);
                println!("Conversation supprimée.");
            }
            None => println!("Conversation introuvable."),
        },
        "doc" => match argument {
            Some(name) => match client.fetch_document(name).await {
                Ok(bytes) => {
                    let target = name.replace('/', "_");
                    match std::fs::write(&target, &bytes) {
                        Ok(()) => println!("Document enregistré sous {}", target),
                        Err(e) => print!("{}", ui::render_error(&e.to_string())),
                    }
                }
                Err(e) => print!("{}", ui::render_error(&e.to_string())),
            },
            None => println!("Usage : /doc <nom>"),
        },
        "docs" => match client.list_documents().await {
            Ok(documents) => {
                println!("{} documents disponibles :", documents.total_count);
                for name in documents.available_documents {
                    println!("  - {}", name);
                }
            }
            Err(e) => print!("{}", ui::render_error(&e.to_string())),
        },
        "clear" => controller.clear_error(),
        "help" => print!("{}", ui::help_text()),
        "quit" | "exit" => return LoopAction::Quit,
        _ => println!("Commande inconnue. /help pour la liste."),
    }
    LoopAction::Continue
}

/// Accept a 1-based index from /list, or a full conversation id
fn resolve_conversation(controller: &ChatController, argument: Option<&str>) -> Option<String> {
    let argument = argument?;
    let snapshot = controller.snapshot();

    if let Ok(index) = argument.parse::<usize>() {
        if index >= 1 {
            return snapshot
                .conversations
                .get(index - 1)
                .map(|c| c.id.clone());
        }
    }
    snapshot
        .conversations
        .iter()
        .find(|c| c.id == argument)
        .map(|c| c.id.clone())
}
