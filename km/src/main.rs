//! KitchenMaster - conversational kitchen design assistant
//!
//! CLI entry point: interactive chat, one-shot turns, and the stored
//! conversation archive.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result, eyre};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

use kitchenmaster::cli::{Cli, Command, DEFAULT_USER};
use kitchenmaster::config::Config;
use kitchenmaster::domain::{Artifact, ArtifactKind, Budget, Materials, Shape};
use kitchenmaster::prompts::PromptLoader;
use kitchenmaster::session::{Archive, ChatReply, ChatService};
use kitchenmaster::workflow::technical_specs;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kitchenmaster")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(log_dir.join("kitchenmaster.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref()).context("Failed to setup logging")?;

    match cli.command {
        Some(Command::Chat { user, conversation, out }) => {
            debug!(%user, ?conversation, "main: matched Chat command");
            cmd_chat(&config, &user, conversation, &out).await
        }
        None => {
            debug!("main: no command, starting chat");
            cmd_chat(&config, DEFAULT_USER, None, Path::new(".")).await
        }
        Some(Command::Send {
            message,
            user,
            conversation,
            out,
        }) => {
            debug!(%user, ?conversation, "main: matched Send command");
            cmd_send(&config, &user, conversation.as_deref(), &message, &out).await
        }
        Some(Command::Conversations { user, limit }) => {
            debug!(%user, limit, "main: matched Conversations command");
            cmd_conversations(&config, &user, limit).await
        }
        Some(Command::History { id, user }) => {
            debug!(%id, %user, "main: matched History command");
            cmd_history(&config, &user, &id).await
        }
        Some(Command::Designs { id, user, latest }) => {
            debug!(%id, %user, latest, "main: matched Designs command");
            cmd_designs(&config, &user, &id, latest).await
        }
        Some(Command::Delete { id, user }) => {
            debug!(%id, %user, "main: matched Delete command");
            cmd_delete(&config, &user, &id).await
        }
        Some(Command::Specs {
            meters,
            shape,
            budget,
            cabinets,
            countertop,
            backsplash,
        }) => {
            debug!(meters, %shape, ?budget, "main: matched Specs command");
            let materials = Materials {
                cabinets,
                countertop,
                backsplash,
            };
            cmd_specs(&config, meters, &shape, budget.as_deref(), materials)
        }
    }
}

fn format_timestamp(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Write image artifacts to `out`, returning the written paths
fn save_images(out: &Path, reply: &ChatReply) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for (i, artifact) in reply.artifacts.iter().enumerate() {
        let Some(image) = &artifact.image else { continue };
        fs::create_dir_all(out).context(format!("Failed to create {}", out.display()))?;

        let suffix = if i == 0 { String::new() } else { format!("-{}", i) };
        let path = out.join(format!(
            "{}-v{}{}.{}",
            reply.conversation_id,
            reply.design_version,
            suffix,
            image.extension()
        ));
        fs::write(&path, &image.data).context(format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), bytes = image.data.len(), "Saved design image");
        written.push(path);
    }
    Ok(written)
}

fn print_artifact(artifact: &Artifact, saved: &[PathBuf], image_index: &mut usize) {
    match artifact.kind {
        ArtifactKind::Image => {
            let location = saved
                .get(*image_index)
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            *image_index += 1;
            println!("{} {} {}", "🖼".bright_magenta(), artifact.title.bold(), location.dimmed());
        }
        _ => {
            println!();
            println!("{}", artifact.title.bright_cyan());
            if let Some(content) = &artifact.content {
                println!("{}", content);
            }
        }
    }
}

fn print_reply(reply: &ChatReply, out: &Path) -> Result<()> {
    println!();
    println!("{}", reply.content);

    let saved = save_images(out, reply)?;
    let mut image_index = 0;
    for artifact in &reply.artifacts {
        print_artifact(artifact, &saved, &mut image_index);
    }
    println!();
    Ok(())
}

enum SlashResult {
    Continue,
    Quit,
}

fn print_help() {
    println!();
    println!("{}", "Available Commands:".bright_cyan());
    println!("  {:14} Show this help", "/help".yellow());
    println!("  {:14} Start a new conversation", "/new".yellow());
    println!("  {:14} Show the current conversation id", "/id".yellow());
    println!("  {:14} Exit", "/quit".yellow());
    println!();
}

fn handle_slash_command(input: &str, conversation: &mut Option<String>) -> SlashResult {
    let cmd = input.split_whitespace().next().unwrap_or(input);
    match cmd {
        "/help" | "/h" | "/?" => {
            print_help();
            SlashResult::Continue
        }
        "/quit" | "/q" | "/exit" => SlashResult::Quit,
        "/new" => {
            *conversation = None;
            println!("{}", "Starting a new kitchen.".dimmed());
            SlashResult::Continue
        }
        "/id" => {
            match conversation {
                Some(id) => println!("{}", id),
                None => println!("{}", "No conversation yet.".dimmed()),
            }
            SlashResult::Continue
        }
        _ => {
            println!("{} Unknown command: {}", "?".yellow(), cmd);
            println!("Type {} for available commands", "/help".yellow());
            SlashResult::Continue
        }
    }
}

async fn cmd_chat(config: &Config, user: &str, conversation: Option<String>, out: &Path) -> Result<()> {
    config.validate()?;
    let service = ChatService::from_config(config)?;

    let mut conversation = conversation;
    if let Some(id) = &conversation {
        let record = service.archive().conversation(user, id).await?;
        println!("Continuing {}", record.title.bold());
    }

    println!();
    println!("{}", "KitchenMaster".bright_cyan().bold());
    println!("Describe the kitchen you want. Type {} for help, {} to quit", "/help".yellow(), "/quit".yellow());
    println!();

    let mut rl = DefaultEditor::new().map_err(|e| eyre!("Failed to initialize readline: {}", e))?;

    loop {
        match rl.readline(&format!("{} ", ">".bright_green())) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                if input.starts_with('/') {
                    match handle_slash_command(input, &mut conversation) {
                        SlashResult::Continue => continue,
                        SlashResult::Quit => break,
                    }
                }

                match service.send(user, conversation.as_deref(), input).await {
                    Ok(reply) => {
                        conversation = Some(reply.conversation_id.clone());
                        print_reply(&reply, out)?;
                    }
                    Err(e) => eprintln!("{} {}", "Error:".red(), e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!();
                break;
            }
            Err(err) => {
                return Err(eyre!("Readline error: {}", err));
            }
        }
    }

    service.shutdown().await?;
    println!("Goodbye!");
    Ok(())
}

async fn cmd_send(config: &Config, user: &str, conversation: Option<&str>, message: &str, out: &Path) -> Result<()> {
    config.validate()?;
    let service = ChatService::from_config(config)?;

    let reply = service.send(user, conversation, message).await?;
    print_reply(&reply, out)?;
    println!("{} {}", "conversation:".dimmed(), reply.conversation_id);

    service.shutdown().await?;
    Ok(())
}

async fn cmd_conversations(config: &Config, user: &str, limit: usize) -> Result<()> {
    let archive = Archive::open(config)?;
    let conversations = archive.conversations(user, limit).await?;

    if conversations.is_empty() {
        println!("{}", "No conversations.".dimmed());
    }
    for c in &conversations {
        println!("{}  {}  {}", c.id.yellow(), format_timestamp(c.updated_at).dimmed(), c.title);
    }

    archive.shutdown().await?;
    Ok(())
}

async fn cmd_history(config: &Config, user: &str, id: &str) -> Result<()> {
    let archive = Archive::open(config)?;
    let history = archive.history(user, id).await?;

    for entry in &history {
        let role = match entry.message.role.as_str() {
            "user" => "You".bright_green().bold(),
            _ => "KitchenMaster".bright_cyan().bold(),
        };
        println!("{} {}", role, format_timestamp(entry.message.created_at).dimmed());
        println!("{}", entry.message.content);
        for artifact in &entry.artifacts {
            let title = artifact.title.as_deref().unwrap_or("");
            println!("  {} {}", format!("[{}]", artifact.artifact_type).magenta(), title);
        }
        println!();
    }

    archive.shutdown().await?;
    Ok(())
}

async fn cmd_designs(config: &Config, user: &str, id: &str, latest: bool) -> Result<()> {
    let archive = Archive::open(config)?;
    let designs = if latest {
        archive.latest_design(user, id).await?.into_iter().collect()
    } else {
        archive.designs(user, id).await?
    };

    if designs.is_empty() {
        println!("{}", "No designs yet.".dimmed());
    }
    for d in &designs {
        let image = if d.has_image() { "image" } else { "no image" };
        println!(
            "{}  {}  {}  {}",
            format!("v{}", d.version).bright_cyan().bold(),
            format_timestamp(d.created_at).dimmed(),
            d.parameters,
            image.dimmed()
        );
        println!("    {}", d.prompt_used);
    }

    archive.shutdown().await?;
    Ok(())
}

async fn cmd_delete(config: &Config, user: &str, id: &str) -> Result<()> {
    let archive = Archive::open(config)?;
    let deleted = archive.delete(user, id).await?;
    archive.shutdown().await?;

    if deleted {
        println!("{} Deleted {}", "✓".green(), id);
        Ok(())
    } else {
        Err(eyre!("Conversation not found: {}", id))
    }
}

fn cmd_specs(config: &Config, meters: f64, shape: &str, budget: Option<&str>, materials: Materials) -> Result<()> {
    if !meters.is_finite() || meters <= 0.0 {
        return Err(eyre!("--meters must be a positive number"));
    }
    let shape = Shape::parse(shape).ok_or_else(|| eyre!("Unknown shape: {}", shape))?;
    let budget = budget
        .map(|b| Budget::parse(b).ok_or_else(|| eyre!("Unknown budget: {}", b)))
        .transpose()?;

    let prompts = PromptLoader::new(config.prompts_dir.clone());
    let specs = technical_specs(&prompts, meters, shape, &materials.resolved(), budget)?;
    println!("{}", specs);
    Ok(())
}
