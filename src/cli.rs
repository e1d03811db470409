use std::sync::Arc;

use clap::{Parser, Subcommand};
use inquire::{Confirm, Text};

use crate::handlers::executor::ExecutionLog;
use crate::models::action::Action;
use crate::service::agent::CalendarAgent;

#[derive(Parser)]
#[command(about = "Manage a calendar with natural-language instructions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the planned actions without executing them.
    Plan { instruction: String },
    /// Plan, confirm, then execute.
    Run {
        instruction: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Ask for the instruction interactively.
    Prompt {},
    /// List events between two local times.
    Events {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        time_zone: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
}

pub async fn cli(agent: Arc<CalendarAgent>) {
    // Fine to exit on bad arguments here
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Plan { instruction } => plan(&agent, &instruction).await,
        Commands::Run { instruction, yes } => run(&agent, &instruction, yes).await,
        Commands::Prompt {} => match specify_prompt() {
            Ok(instruction) => run(&agent, &instruction, false).await,
            Err(e) => Err(format!("No instruction supplied: {}", e).into()),
        },
        Commands::Events {
            from,
            to,
            time_zone,
            limit,
        } => events(&agent, &from, &to, time_zone.as_deref(), limit).await,
    };
    if let Err(e) = result {
        println!("{}", e);
    }
}

async fn plan(agent: &CalendarAgent, instruction: &str) -> Result<(), Box<dyn std::error::Error>> {
    let actions = agent.plan(instruction).await?;
    print_actions(&actions)?;
    Ok(())
}

async fn run(
    agent: &CalendarAgent,
    instruction: &str,
    assume_yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let actions = agent.plan(instruction).await?;
    if actions.is_empty() {
        println!("Nothing to do.");
        return Ok(());
    }
    print_actions(&actions)?;
    if !assume_yes && !execute_confirmation().prompt()? {
        println!("Cancelled.");
        return Ok(());
    }
    let log = agent.execute(&actions).await;
    print_log(&log);
    Ok(())
}

async fn events(
    agent: &CalendarAgent,
    from: &str,
    to: &str,
    time_zone: Option<&str>,
    limit: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let events = agent.list_events(from, to, time_zone, limit).await?;
    if events.is_empty() {
        println!("No events found.");
    }
    for event in events {
        println!(
            "{} | {} - {} | {}",
            event.title,
            event.start.as_deref().unwrap_or("?"),
            event.end.as_deref().unwrap_or("?"),
            event.location.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn print_actions(actions: &[Action]) -> Result<(), serde_json::Error> {
    println!("{}", render_plan(actions)?);
    Ok(())
}

// Same `{"actions": [...]}` shape the planner reads.
fn render_plan(actions: &[Action]) -> Result<String, serde_json::Error> {
    let plan = serde_json::json!({ "actions": actions });
    Ok(format!(
        "Planned actions (no execution):\n{}",
        serde_json::to_string_pretty(&plan)?
    ))
}

// Writes and deletes only on an explicit yes.
fn execute_confirmation() -> Confirm<'static> {
    Confirm::new("Execute these actions?").with_default(false)
}

fn print_log(log: &ExecutionLog) {
    print!("{}", log.render());
}

fn specify_prompt() -> Result<String, Box<dyn std::error::Error>> {
    Ok(Text::new("What should I do with your calendar?").prompt()?)
}
