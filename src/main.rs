use clap::Parser;
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use pollcast::api::ApiClient;
use pollcast::channel::{Channel, WsChannel};
use pollcast::cli::{parse_guest_line, parse_host_line, Args, Command, GuestInput, HostInput};
use pollcast::config::Config;
use pollcast::guest::GuestController;
use pollcast::host::{HostController, HostSession, HostSnapshot};
use pollcast::model::Question;
use pollcast::stats::{PlotType, StatsPanel, StatsView, MAX_BAR_WIDTH};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pollcast=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref(), args.base_url.clone())?;

    match args.command {
        Command::Host { project_id } => run_host(&config, &project_id).await?,
        Command::Guest { room_id } => run_guest(&config, &room_id).await?,
        Command::Stats { project_id, view } => run_stats(&config, &project_id, view).await,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

async fn run_host(config: &Config, project_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (channel, connector) = WsChannel::new(&config.api_base_url, project_id)?;
    let mut status = channel.status();
    let controller = HostController::new(project_id, channel, config.reaction_window)?;
    // The session subscribes on construction, before the socket opens.
    let handle = HostSession::new(controller, ApiClient::from_config(config)).spawn();
    connector.connect().await?;
    let mut state = handle.subscribe();

    eprintln!(
        "{}",
        "commands: next | prev | start | stop | heart | like | dislike | quit".bright_black()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown_comments = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_host_line(&line) {
                    Some(HostInput::Quit) => break,
                    Some(HostInput::Command(cmd)) => handle.send(cmd)?,
                    None => eprintln!("{} {}", "unknown command:".bright_red(), line),
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = state.borrow_and_update().clone();
                shown_comments = print_host(&snap, shown_comments);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *status.borrow_and_update();
                eprintln!("{} {}", "[channel]".bright_magenta(), current);
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn print_host(snap: &HostSnapshot, shown_comments: usize) -> usize {
    for comment in snap.comments.iter().skip(shown_comments) {
        println!("{} {}", format!("{}:", comment.user_name).bright_cyan(), comment.text);
    }
    if snap.is_loading {
        return snap.comments.len();
    }
    let live = if snap.is_broadcasting {
        "LIVE".bright_green()
    } else {
        "off".bright_black()
    };
    match &snap.current_question {
        Some(q) => println!(
            "[{}] {} {}/{}  {}  answers submitted: {}",
            live,
            snap.project_name.bold(),
            snap.question_index + 1,
            snap.question_count,
            q.content,
            snap.answer_count
        ),
        None => println!("[{}] {} (no questions)", live, snap.project_name.bold()),
    }
    if let Some(emoji) = snap.selected_emoji {
        println!("  {}", emoji.to_string().bright_yellow());
    }
    snap.comments.len()
}

// ---------------------------------------------------------------------------
// Guest
// ---------------------------------------------------------------------------

async fn run_guest(config: &Config, room_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (channel, connector) = WsChannel::new(&config.api_base_url, room_id)?;
    let mut guest = GuestController::new(channel);
    connector.connect().await?;
    print_screen(guest.screen());
    eprintln!(
        "{}",
        "type to chat | /answer <n> | /emoji heart|like|dislike | /quit".bright_black()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match parse_guest_line(&line) {
                    Ok(GuestInput::Quit) => break,
                    Ok(GuestInput::Chat(text)) => {
                        guest.set_input(text);
                        let entry = guest.submit();
                        println!("{} {}", format!("{}:", entry.author).bright_cyan(), entry.content);
                    }
                    Ok(GuestInput::Answer(i)) => match guest.screen().options.get(i).cloned() {
                        Some(option) => guest.submit_answer(option),
                        None => eprintln!("{} {}", "no such option:".bright_red(), i + 1),
                    },
                    Ok(GuestInput::Emoji(emoji)) => guest.send_emoji(emoji),
                    Err(e) => eprintln!("{} {}", "error:".bright_red(), e),
                }
            }
            screen = guest.next_screen() => {
                if screen.is_none() {
                    break;
                }
                print_screen(guest.screen());
            }
        }
    }
    Ok(())
}

fn print_screen(question: &Question) {
    println!("\n{}", question.content.bold());
    for (i, option) in question.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option.text);
    }
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

async fn run_stats(config: &Config, project_id: &str, plot: PlotType) {
    let api = ApiClient::from_config(config);
    let mut view = StatsView::new(project_id);
    view.select_plot(plot);
    view.load(&api).await;

    println!("{} {}", "Statistics for".bold(), view.stats().project_name.bold());
    match view.panel() {
        StatsPanel::Answers(panels) => {
            for panel in panels {
                println!("\n{} {}", "Question:".bright_cyan(), panel.title);
                let widths = panel.bar_widths(MAX_BAR_WIDTH);
                for ((label, count), width) in panel.bars.iter().zip(widths) {
                    println!("  {:<24} {:>5} {}", label, count, "#".repeat(width).bright_blue());
                }
                println!(
                    "  total answers: {}  correct answers: {}",
                    panel.total_answers, panel.total_correct_answers
                );
            }
        }
        StatsPanel::Reactions(panels) => {
            for panel in panels {
                println!("\n{}", panel.title.bright_cyan());
                for link in &panel.links {
                    println!("  {:<10} -> {:<10} {}", link.from, link.to, link.weight);
                }
            }
        }
    }

    println!("\n{}", "Words".bold());
    for word in view.word_counts() {
        println!("  {:<20} {}", word.text, word.value);
    }
}
