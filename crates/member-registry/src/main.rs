//! `memreg` - CLI for the member registry
//!
//! Runs the web application and offers a few maintenance commands against
//! the same database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use clap::Parser;

use member_registry::cli::{Cli, Command, ConfigCommand, ListCommand, OutputFormat, ServeCommand};
use member_registry::member::CREATED_AT_FORMAT;
use member_registry::web::templates::format_amount;
use member_registry::{handlers, init_logging, web, Config, Member, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(serve_cmd) => handle_serve(config, serve_cmd).await,
        Command::InitDb => handle_init_db(&config),
        Command::List(list_cmd) => handle_list(&config, &list_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_serve(mut config: Config, cmd: ServeCommand) -> anyhow::Result<()> {
    if let Some(host) = cmd.host {
        config.server.host = host;
    }
    if let Some(port) = cmd.port {
        config.server.port = port;
    }
    config.validate()?;

    web::serve(config).await?;
    Ok(())
}

fn handle_init_db(config: &Config) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    storage.ensure_schema()?;
    println!("Database ready: {}", storage.path().display());
    println!("Members:        {}", storage.count()?);
    Ok(())
}

fn handle_list(config: &Config, cmd: &ListCommand) -> anyhow::Result<()> {
    let storage = Storage::open(config.database_path())?;
    let listing = handlers::search(&storage, cmd.query.as_deref())?;

    match cmd.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&listing.members)?);
        }
        OutputFormat::Plain => {
            for member in &listing.members {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    member.id,
                    member.name,
                    member.apartment.as_deref().unwrap_or(""),
                    member.phone.as_deref().unwrap_or(""),
                    format_amount(member.amount),
                );
            }
        }
        OutputFormat::Table => print_table(&listing.members),
    }
    Ok(())
}

fn print_table(members: &[Member]) {
    if members.is_empty() {
        println!("No members found.");
        return;
    }

    let name_width = members
        .iter()
        .map(|m| m.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());

    println!(
        "{:>6}  {:<name_width$}  {:<10}  {:<14}  {:>12}  Created",
        "ID", "Name", "Apartment", "Phone", "Amount"
    );
    for member in members {
        println!(
            "{:>6}  {:<name_width$}  {:<10}  {:<14}  {:>12}  {}",
            member.id,
            member.name,
            member.apartment.as_deref().unwrap_or("-"),
            member.phone.as_deref().unwrap_or("-"),
            format_amount(member.amount),
            member.created_at.format(CREATED_AT_FORMAT),
        );
    }
    println!();
    println!("{} member(s)", members.len());
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Host:               {}", config.server.host);
                println!("  Port:               {}", config.server.port);
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Site]");
                println!("  Title:              {}", config.site.title);
                println!();
                println!("[Session]");
                println!("  Cookie name:        {}", config.session.cookie_name);
                println!("  Secure cookie:      {}", config.session.secure);
                println!("  Idle (minutes):     {}", config.session.idle_minutes);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
