use chrono::Local;
use colored::Colorize;

use crate::controller::ChatSnapshot;
use crate::models::{Conversation, Message, MessageRole, Source};

/// Example questions offered on an empty consultation
pub const EXAMPLE_QUESTIONS: [&str; 4] = [
    "Comment la législation tunisienne protège-t-elle les données bancaires personnelles ?",
    "Quels droits a le client face à sa banque ?",
    "Quelles règles encadrent le crédit bancaire ?",
    "Quels recours pour un client en cas de litige bancaire ?",
];

pub fn welcome_screen() -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "Assistant Juridique".bold()));
    out.push_str("Bienvenue dans votre consultation juridique.\n");
    out.push_str(
        "Posez vos questions sur le droit bancaire tunisien; les réponses s'appuient \
         sur la législation en vigueur.\n\n",
    );
    out.push_str("Exemples de questions :\n");
    for question in EXAMPLE_QUESTIONS {
        out.push_str(&format!("  - {}\n", question.italic()));
    }
    out.push_str("\nTapez /help pour la liste des commandes.\n");
    out
}

/// "Consultation #xxxxxxxx" from the last 8 characters of the id
pub fn conversation_header(snapshot: &ChatSnapshot) -> String {
    match snapshot.current_conversation_id.as_deref() {
        Some(id) => {
            let tail: String = id.chars().rev().take(8).collect::<Vec<_>>().into_iter().rev().collect();
            format!("Consultation #{}", tail)
        }
        None => "Nouvelle consultation".to_string(),
    }
}

pub fn render_message(message: &Message) -> String {
    let time = message
        .created_at
        .with_timezone(&Local)
        .format("%H:%M");

    let speaker = match message.role {
        MessageRole::User => "Vous".blue().bold(),
        MessageRole::Assistant => "Assistant Juridique".green().bold(),
        MessageRole::System => "Système".yellow().bold(),
    };

    let mut out = format!("[{}] {}\n{}\n", time, speaker, message.content);
    if !message.sources.is_empty() {
        out.push_str(&render_sources(&message.sources));
    }
    out
}

fn render_sources(sources: &[Source]) -> String {
    let mut out = format!("{}\n", "Sources :".dimmed());
    for (index, source) in sources.iter().enumerate() {
        let title = source
            .title
            .as_deref()
            .or(source.document_name.as_deref())
            .unwrap_or("Document");
        let mut line = format!("  {}. {}", index + 1, title);
        if let Some(page) = source.page {
            line.push_str(&format!(" (page {})", page));
        }
        if let Some(url) = source.url.as_deref() {
            line.push_str(&format!(" — {}", url.dimmed()));
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

pub fn render_conversation_list(conversations: &[Conversation], active: Option<&str>) -> String {
    if conversations.is_empty() {
        return "Aucune conversation.\n".to_string();
    }

    let mut out = String::new();
    for (index, conv) in conversations.iter().enumerate() {
        let marker = if active == Some(conv.id.as_str()) {
            "*"
        } else {
            " "
        };
        let updated = conv.updated_at.with_timezone(&Local).format("%d/%m %H:%M");
        out.push_str(&format!(
            "{} {}. {} — {} messages, {}\n",
            marker,
            index + 1,
            conv.title.bold(),
            conv.message_count,
            updated
        ));
        if let Some(preview) = conv.last_message.as_deref() {
            out.push_str(&format!("      {}\n", preview.dimmed()));
        }
    }
    out
}

/// Dismissible error panel; /clear drops it
pub fn render_error(error: &str) -> String {
    format!(
        "{} {}\n{}\n",
        "Erreur :".red().bold(),
        error.red(),
        "(/clear pour fermer)".dimmed()
    )
}

/// Degraded-service banner driven by the health probe, independent of the
/// controller's error state
pub fn health_banner(healthy: bool) -> Option<String> {
    if healthy {
        None
    } else {
        Some(format!(
            "{}\n",
            "⚠ Service dégradé : l'assistant est actuellement indisponible."
                .yellow()
                .bold()
        ))
    }
}

pub fn typing_indicator() -> String {
    "Assistant Juridique rédige une réponse...".dimmed().to_string()
}

pub fn help_text() -> String {
    let mut out = String::new();
    out.push_str("Commandes :\n");
    out.push_str("  /new           nouvelle consultation\n");
    out.push_str("  /list          liste des conversations\n");
    out.push_str("  /open <n>      ouvrir la conversation n\n");
    out.push_str("  /delete <n>    supprimer la conversation n\n");
    out.push_str("  /docs          documents disponibles\n");
    out.push_str("  /doc <nom>     télécharger un document\n");
    out.push_str("  /clear         fermer le panneau d'erreur\n");
    out.push_str("  /quit          quitter\n");
    out.push_str("Tout autre texte est envoyé comme question.\n");
    out
}
