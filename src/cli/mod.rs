//! Command-line interface for Epic Events CRM.
//!
//! Every subcommand maps onto one authenticator or service operation:
//! - `login` / `logout` / `whoami` - session management
//! - `users` - user administration (management)
//! - `clients`, `contracts`, `events` - role-scoped entity operations

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::BufRead;
use std::path::PathBuf;

use crate::auth::{Authenticator, Claims, SessionState};
use crate::db::{
    Amount, Client, Contract, ContractFilter, CreateClientRequest, CreateContractRequest,
    CreateEventRequest, CreateUserRequest, DbPool, Event, EventFilter, FieldChanges, Role,
    UserResponse,
};
use crate::error::CrmError;
use crate::services::{clients, contracts, events, policy, users};
use crate::validation::parse_timestamp;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "epicrm")]
#[command(author, version, about = "Epic Events customer relationship management", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "epicrm.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long, env = "EPICRM_LOG")]
    pub log_level: Option<String>,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Token signing secret
    #[arg(long, env = "EPICRM_JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: Option<String>,

    /// Print records as JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store a session token
    Login {
        email: String,
        /// Read from stdin when omitted
        #[arg(long, env = "EPICRM_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session token
    Logout,

    /// Show who is logged in and what they may do
    Whoami,

    /// User administration
    #[command(subcommand)]
    Users(UsersCommands),

    /// Client management
    #[command(subcommand)]
    Clients(ClientsCommands),

    /// Contract management
    #[command(subcommand)]
    Contracts(ContractsCommands),

    /// Event management
    #[command(subcommand)]
    Events(EventsCommands),
}

#[derive(Subcommand, Debug)]
pub enum UsersCommands {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "EPICRM_NEW_PASSWORD", hide_env_values = true)]
        password: String,
        /// management, sales or support
        #[arg(long)]
        role: Role,
    },
    List,
    Update {
        id: String,
        /// Field to change, as field=value (repeatable)
        #[arg(long = "set", value_parser = FieldChanges::parse_assignment)]
        set: Vec<(String, String)>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ClientsCommands {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
    List,
    Update {
        id: String,
        /// Field to change, as field=value (repeatable)
        #[arg(long = "set", value_parser = FieldChanges::parse_assignment)]
        set: Vec<(String, String)>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ContractsCommands {
    Create {
        client_id: String,
        #[arg(long)]
        total: Amount,
        /// Defaults to the total
        #[arg(long)]
        remaining: Option<Amount>,
    },
    List {
        /// Only contracts not signed yet
        #[arg(long)]
        unsigned: bool,
        /// Only contracts with an amount left to pay
        #[arg(long)]
        unpaid: bool,
    },
    Update {
        id: String,
        /// Field to change, as field=value (repeatable)
        #[arg(long = "set", value_parser = FieldChanges::parse_assignment)]
        set: Vec<(String, String)>,
    },
    Delete {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum EventsCommands {
    Create {
        contract_id: String,
        /// YYYY-MM-DD HH:MM
        #[arg(long, value_parser = parse_timestamp)]
        starts_at: NaiveDateTime,
        /// YYYY-MM-DD HH:MM
        #[arg(long, value_parser = parse_timestamp)]
        ends_at: NaiveDateTime,
        #[arg(long)]
        location: String,
        #[arg(long, default_value_t = 0)]
        attendees: i64,
        #[arg(long)]
        notes: Option<String>,
    },
    List {
        /// Only events without a support user
        #[arg(long)]
        unassigned: bool,
    },
    Update {
        id: String,
        /// Field to change, as field=value (repeatable)
        #[arg(long = "set", value_parser = FieldChanges::parse_assignment)]
        set: Vec<(String, String)>,
    },
}

/// Run a CLI command against an opened store
pub async fn run_command(cli: &Cli, db: &DbPool, auth: &Authenticator) -> Result<(), CrmError> {
    match &cli.command {
        Commands::Login { email, password } => cmd_login(auth, email, password.as_deref()).await,
        Commands::Logout => cmd_logout(auth),
        Commands::Whoami => cmd_whoami(&auth.resolve_session()),
        Commands::Users(cmd) => run_users(cli, db, &auth.resolve_session(), cmd).await,
        Commands::Clients(cmd) => run_clients(cli, db, &auth.resolve_session(), cmd).await,
        Commands::Contracts(cmd) => run_contracts(cli, db, &auth.resolve_session(), cmd).await,
        Commands::Events(cmd) => run_events(cli, db, &auth.resolve_session(), cmd).await,
    }
}

async fn cmd_login(auth: &Authenticator, email: &str, password: Option<&str>) -> Result<(), CrmError> {
    let password = match password {
        Some(p) => p.to_string(),
        None => read_password()?,
    };
    let user = auth.login(email, &password).await?;
    println!("Logged in as {} ({})", user.email, user.role);
    Ok(())
}

fn read_password() -> Result<String, CrmError> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| CrmError::internal(format!("Failed to read password: {}", e)))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn cmd_logout(auth: &Authenticator) -> Result<(), CrmError> {
    if auth.logout()? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn cmd_whoami(session: &SessionState) -> Result<(), CrmError> {
    let claims = session.require()?;

    println!();
    for line in whoami_lines(claims) {
        println!("{}", line);
    }
    println!();
    Ok(())
}

fn whoami_lines(claims: &Claims) -> Vec<String> {
    let expires = claims
        .expires_at()
        .map(|exp| exp.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string());

    let mut lines = vec![
        format!("Email:   {}", claims.email),
        format!("Role:    {}", claims.role),
        format!("Expires: {}", expires),
        String::new(),
        "Allowed:".to_string(),
    ];
    for (resource, action, scope) in policy::permitted(claims.role) {
        lines.push(format!("  {:<10} {:<8} {}", resource, action, scope));
    }
    lines
}

async fn run_users(
    cli: &Cli,
    db: &DbPool,
    session: &SessionState,
    cmd: &UsersCommands,
) -> Result<(), CrmError> {
    match cmd {
        UsersCommands::Create {
            name,
            email,
            password,
            role,
        } => {
            let req = CreateUserRequest {
                name: name.clone(),
                email: email.clone(),
                password: password.clone(),
                role: *role,
            };
            let user = users::create_user(db, session, req).await?;
            output(cli, &[user], print_users)
        }
        UsersCommands::List => {
            let list = users::list_users(db, session).await?;
            output(cli, &list, print_users)
        }
        UsersCommands::Update { id, set } => {
            let user = users::update_user(db, session, id, changes(set)).await?;
            output(cli, &[user], print_users)
        }
        UsersCommands::Delete { id } => {
            users::delete_user(db, session, id).await?;
            println!("User {} deleted.", id);
            Ok(())
        }
    }
}

async fn run_clients(
    cli: &Cli,
    db: &DbPool,
    session: &SessionState,
    cmd: &ClientsCommands,
) -> Result<(), CrmError> {
    match cmd {
        ClientsCommands::Create {
            name,
            email,
            phone,
            company,
        } => {
            let req = CreateClientRequest {
                full_name: name.clone(),
                email: email.clone(),
                phone: phone.clone(),
                company: company.clone(),
            };
            let client = clients::create_client(db, session, req).await?;
            output(cli, &[client], print_clients)
        }
        ClientsCommands::List => {
            let list = clients::list_clients(db, session).await?;
            output(cli, &list, print_clients)
        }
        ClientsCommands::Update { id, set } => {
            let client = clients::update_client(db, session, id, changes(set)).await?;
            output(cli, &[client], print_clients)
        }
        ClientsCommands::Delete { id } => {
            clients::delete_client(db, session, id).await?;
            println!("Client {} deleted.", id);
            Ok(())
        }
    }
}

async fn run_contracts(
    cli: &Cli,
    db: &DbPool,
    session: &SessionState,
    cmd: &ContractsCommands,
) -> Result<(), CrmError> {
    match cmd {
        ContractsCommands::Create {
            client_id,
            total,
            remaining,
        } => {
            let req = CreateContractRequest {
                client_id: client_id.clone(),
                total_amount: *total,
                remaining_amount: *remaining,
            };
            let contract = contracts::create_contract(db, session, req).await?;
            output(cli, &[contract], print_contracts)
        }
        ContractsCommands::List { unsigned, unpaid } => {
            let filter = ContractFilter {
                unsigned_only: *unsigned,
                unpaid_only: *unpaid,
            };
            let list = contracts::list_contracts(db, session, filter).await?;
            output(cli, &list, print_contracts)
        }
        ContractsCommands::Update { id, set } => {
            let contract = contracts::update_contract(db, session, id, changes(set)).await?;
            output(cli, &[contract], print_contracts)
        }
        ContractsCommands::Delete { id } => {
            contracts::delete_contract(db, session, id).await?;
            println!("Contract {} deleted.", id);
            Ok(())
        }
    }
}

async fn run_events(
    cli: &Cli,
    db: &DbPool,
    session: &SessionState,
    cmd: &EventsCommands,
) -> Result<(), CrmError> {
    match cmd {
        EventsCommands::Create {
            contract_id,
            starts_at,
            ends_at,
            location,
            attendees,
            notes,
        } => {
            let req = CreateEventRequest {
                contract_id: contract_id.clone(),
                starts_at: *starts_at,
                ends_at: *ends_at,
                location: location.clone(),
                attendees: *attendees,
                notes: notes.clone(),
            };
            let event = events::create_event(db, session, req).await?;
            output(cli, &[event], print_events)
        }
        EventsCommands::List { unassigned } => {
            let filter = EventFilter {
                unassigned_only: *unassigned,
            };
            let list = events::list_events(db, session, filter).await?;
            output(cli, &list, print_events)
        }
        EventsCommands::Update { id, set } => {
            let event = events::update_event(db, session, id, changes(set)).await?;
            output(cli, &[event], print_events)
        }
    }
}

fn changes(set: &[(String, String)]) -> FieldChanges {
    set.iter().cloned().collect()
}

/// Print `records` as JSON or with the given table printer
fn output<T: Serialize>(cli: &Cli, records: &[T], table: fn(&[T])) -> Result<(), CrmError> {
    if cli.json {
        let json = serde_json::to_string_pretty(records)
            .map_err(|e| CrmError::internal(format!("Failed to encode output: {}", e)))?;
        println!("{}", json);
    } else if records.is_empty() {
        println!("Nothing to show.");
    } else {
        table(records);
    }
    Ok(())
}

fn print_users(users: &[UserResponse]) {
    println!();
    println!("{:<36}  {:<20}  {:<30}  {:<10}", "ID", "NAME", "EMAIL", "ROLE");
    println!("{}", "-".repeat(102));
    for user in users {
        println!(
            "{:<36}  {:<20}  {:<30}  {:<10}",
            user.id,
            truncate(&user.name, 20),
            truncate(&user.email, 30),
            user.role
        );
    }
    println!();
}

fn print_clients(clients: &[Client]) {
    println!();
    println!(
        "{:<36}  {:<20}  {:<26}  {:<16}  {:<20}",
        "ID", "NAME", "EMAIL", "PHONE", "COMPANY"
    );
    println!("{}", "-".repeat(126));
    for client in clients {
        println!(
            "{:<36}  {:<20}  {:<26}  {:<16}  {:<20}",
            client.id,
            truncate(&client.full_name, 20),
            truncate(&client.email, 26),
            truncate(client.phone.as_deref().unwrap_or("-"), 16),
            truncate(client.company.as_deref().unwrap_or("-"), 20)
        );
    }
    println!();
}

fn print_contracts(contracts: &[Contract]) {
    println!();
    println!(
        "{:<36}  {:<36}  {:>12}  {:>12}  {:<6}",
        "ID", "CLIENT", "TOTAL", "REMAINING", "SIGNED"
    );
    println!("{}", "-".repeat(110));
    for contract in contracts {
        println!(
            "{:<36}  {:<36}  {:>12}  {:>12}  {:<6}",
            contract.id,
            contract.client_id,
            contract.total_amount.to_string(),
            contract.remaining_amount.to_string(),
            if contract.signed { "yes" } else { "no" }
        );
    }
    println!();
}

fn print_events(events: &[Event]) {
    println!();
    println!(
        "{:<36}  {:<20}  {:<16}  {:<16}  {:<24}  {:>5}  {:<8}",
        "ID", "CLIENT", "START", "END", "LOCATION", "PAX", "SUPPORT"
    );
    println!("{}", "-".repeat(140));
    for event in events {
        println!(
            "{:<36}  {:<20}  {:<16}  {:<16}  {:<24}  {:>5}  {:<8}",
            event.id,
            truncate(&event.client_name, 20),
            event.starts_at,
            event.ends_at,
            truncate(&event.location, 24),
            event.attendees,
            event
                .support_id
                .as_deref()
                .map(|id| truncate(id, 8))
                .unwrap_or_else(|| "-".to_string())
        );
    }
    println!();
}

/// Truncate a string to max characters with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
