use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::sync::Arc;

use fleetdesk::api::ApiClient;
use fleetdesk::auth::AuthService;
use fleetdesk::config::Config;
use fleetdesk::lifecycle::TicketLifecycle;
use fleetdesk::logging;
use fleetdesk::models::{
    AuditLog, CreateTicket, DeviceStatus, Role, SortOrder, TicketPriority, TicketStatus,
    TicketType, UpdateDevice,
};
use fleetdesk::operation::{OperationStatus, PendingOperation};
use fleetdesk::store::{DevicesStore, TicketsStore};

#[derive(Parser)]
#[command(name = "fleetdesk")]
#[command(about = "Device fleet and maintenance ticket console")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in as the demo user for a role (admin, technician, viewer)
    Login { role: Role },

    /// Log out and forget the saved login
    Logout,

    /// Show the logged-in user and their permissions
    Whoami,

    /// Browse and edit devices
    Devices {
        #[command(subcommand)]
        command: DeviceCommands,
    },

    /// Browse, create and progress tickets
    Tickets {
        #[command(subcommand)]
        command: TicketCommands,
    },
}

#[derive(Args)]
struct ListArgs {
    /// Page number (1-based)
    #[arg(long, default_value_t = 1)]
    page: u32,

    /// Items per page (default: paging.default_page_size)
    #[arg(long)]
    limit: Option<u32>,

    /// Full-text search
    #[arg(short, long)]
    search: Option<String>,

    /// Field to sort by
    #[arg(long)]
    sort: Option<String>,

    /// Sort direction (asc, desc)
    #[arg(long)]
    order: Option<SortOrder>,
}

#[derive(Subcommand)]
enum DeviceCommands {
    /// List devices
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Only devices with this status
        #[arg(long)]
        status: Option<DeviceStatus>,
    },

    /// Show one device with its history
    Show { id: String },

    /// Edit device fields
    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        status: Option<DeviceStatus>,

        #[arg(long)]
        firmware: Option<String>,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        ip: Option<String>,
    },
}

#[derive(Subcommand)]
enum TicketCommands {
    /// List tickets
    List {
        #[command(flatten)]
        list: ListArgs,

        /// Only tickets with this status
        #[arg(long)]
        status: Option<TicketStatus>,

        /// Only tickets with this priority
        #[arg(long)]
        priority: Option<TicketPriority>,
    },

    /// Show one ticket, its next statuses and its history
    Show { id: String },

    /// Open a new ticket
    Create {
        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        #[arg(long, default_value = "medium")]
        priority: TicketPriority,

        #[arg(long = "type", default_value = "maintenance")]
        ticket_type: TicketType,

        /// Device id the ticket is about
        #[arg(long)]
        device: String,
    },

    /// Move a ticket to its next status
    Transition { id: String, status: TicketStatus },
}

/// Services shared by every command
struct Console {
    config: Config,
    auth: Arc<AuthService>,
    tickets: Arc<TicketsStore>,
    devices: Arc<DevicesStore>,
}

impl Console {
    fn new(config: Config) -> Result<Self> {
        let client = Arc::new(
            ApiClient::from_config(&config.api).context("Failed to create API client")?,
        );
        let page_size = config.paging.default_page_size;
        Ok(Self {
            auth: Arc::new(AuthService::with_state_dir(&config.state_path())),
            tickets: Arc::new(TicketsStore::new(client.clone(), page_size)),
            devices: Arc::new(DevicesStore::new(client, page_size)),
            config,
        })
    }

    fn lifecycle(&self) -> TicketLifecycle {
        TicketLifecycle::new(self.tickets.clone(), self.auth.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    let console = Console::new(config)?;

    let result = match cli.command {
        Commands::Login { role } => cmd_login(&console, role),
        Commands::Logout => cmd_logout(&console),
        Commands::Whoami => cmd_whoami(&console),
        Commands::Devices { command } => cmd_devices(&console, command).await,
        Commands::Tickets { command } => cmd_tickets(&console, command).await,
    };

    if let Some(log_path) = logging_handle.log_file_path {
        if log_path.metadata().map(|m| m.len() > 0).unwrap_or(false) {
            eprintln!("Session log: {}", log_path.display());
        }
    }

    result
}

fn cmd_login(console: &Console, role: Role) -> Result<()> {
    let user = console.auth.login(role)?;
    println!("Logged in as {} ({})", user.display_name, user.role);
    Ok(())
}

fn cmd_logout(console: &Console) -> Result<()> {
    console.auth.logout()?;
    println!("Logged out");
    Ok(())
}

fn cmd_whoami(console: &Console) -> Result<()> {
    let Some(user) = console.auth.user() else {
        println!("Not logged in");
        return Ok(());
    };

    let permissions = console.auth.permissions();
    let flag = |on: bool| if on { "yes" } else { "no" };

    println!("{} ({})", user.display_name, user.username);
    println!("{}", "─".repeat(60));
    println!("  Id:              {}", user.id);
    println!("  Role:            {}", user.role);
    println!("  Manage devices:  {}", flag(permissions.can_manage_devices));
    println!("  Manage tickets:  {}", flag(permissions.can_manage_tickets));
    println!("  Assign tickets:  {}", flag(permissions.can_assign_tickets));
    Ok(())
}

fn apply_list_args(
    list: &ListArgs,
    default_limit: u32,
    set_page_size: impl FnOnce(u32),
    set_search: impl FnOnce(&str),
    set_page: impl FnOnce(u32),
) {
    set_page_size(list.limit.unwrap_or(default_limit));
    if let Some(search) = &list.search {
        set_search(search);
    }
    set_page(list.page);
}

fn print_history(logs: &[AuditLog]) {
    println!();
    println!("History");
    println!("{}", "─".repeat(60));
    if logs.is_empty() {
        println!("  (no changes recorded)");
    }
    for log in logs {
        println!(
            "{} {}  {}  by {}",
            log.action.glyph(),
            log.performed_at.format("%Y-%m-%d %H:%M"),
            log.description,
            log.performed_by
        );
    }
}

async fn cmd_devices(console: &Console, command: DeviceCommands) -> Result<()> {
    let store = &console.devices;

    match command {
        DeviceCommands::List { list, status } => {
            store.set_status_filter(status);
            if let Some(sort) = &list.sort {
                store.set_sort(sort, list.order.unwrap_or_default());
            }
            apply_list_args(
                &list,
                console.config.paging.default_page_size,
                |size| store.set_page_size(size),
                |query| store.set_search(query),
                |page| store.set_page(page),
            );

            store.load_devices().await;
            if let Some(err) = store.error() {
                bail!("{}", err);
            }
            if store.is_empty() {
                println!("No devices found");
                return Ok(());
            }

            let state = store.snapshot();
            println!(
                "Devices ({} total, {} online, {} offline on this page)",
                state.pagination.total_items,
                store.online_count(),
                store.offline_count()
            );
            println!("{}", "─".repeat(60));
            for device in &state.devices {
                println!(
                    "{:<14} {:<12} {:<24} {}",
                    device.id, device.status.as_str(), device.name, device.location
                );
            }
            println!(
                "Page {}/{}",
                state.pagination.current_page,
                state.pagination.total_pages.max(1)
            );
        }

        DeviceCommands::Show { id } => {
            tokio::join!(store.load_device(&id), store.load_audit_logs(&id));
            if let Some(err) = store.error() {
                bail!("{}", err);
            }
            let state = store.snapshot();
            let Some(device) = state.selected_device else {
                bail!("Device {} not found", id);
            };

            println!("{} ({})", device.name, device.id);
            println!("{}", "─".repeat(60));
            println!("  Status:    {}", device.status);
            println!("  Model:     {}", device.model);
            println!("  Serial:    {}", device.serial_number);
            println!("  Firmware:  {}", device.firmware_version);
            println!("  Location:  {}", device.location);
            println!("  IP:        {}", device.ip_address);
            println!("  Last seen: {}", device.last_seen.format("%Y-%m-%d %H:%M"));
            print_history(&state.audit_logs);
        }

        DeviceCommands::Update {
            id,
            name,
            status,
            firmware,
            location,
            ip,
        } => {
            console.auth.technician_or_admin()?;

            let patch = UpdateDevice {
                name,
                status,
                firmware_version: firmware,
                location,
                ip_address: ip,
            };
            if patch.is_empty() {
                bail!("Nothing to update; pass at least one field");
            }

            let mut pending = PendingOperation::new();
            let mut updates = store.update_result().subscribe();
            let token = pending.begin();
            store.update_device(&id, &patch, token).await;

            match pending.settle(&mut updates).await {
                Some(OperationStatus::Success) => println!("Device updated successfully"),
                _ => bail!(
                    "{}",
                    store
                        .error()
                        .unwrap_or_else(|| "Failed to update device".to_string())
                ),
            }
        }
    }

    Ok(())
}

async fn cmd_tickets(console: &Console, command: TicketCommands) -> Result<()> {
    let store = &console.tickets;

    match command {
        TicketCommands::List {
            list,
            status,
            priority,
        } => {
            store.set_status_filter(status);
            store.set_priority_filter(priority);
            if let Some(sort) = &list.sort {
                store.set_sort(sort, list.order.unwrap_or_default());
            }
            apply_list_args(
                &list,
                console.config.paging.default_page_size,
                |size| store.set_page_size(size),
                |query| store.set_search(query),
                |page| store.set_page(page),
            );

            store.load_tickets().await;
            if let Some(err) = store.error() {
                bail!("{}", err);
            }
            if store.is_empty() {
                println!("No tickets found");
                return Ok(());
            }

            let state = store.snapshot();
            let counts = store.tickets_by_status();
            println!("Tickets ({} total)", state.pagination.total_items);
            println!(
                "  new {} | in progress {} | waiting parts {} | done {}",
                counts.new, counts.in_progress, counts.waiting_parts, counts.done
            );
            println!("{}", "─".repeat(60));
            for ticket in &state.tickets {
                println!(
                    "{:<20} {:<14} {:<9} {}",
                    ticket.id,
                    ticket.status.label(),
                    ticket.priority.label(),
                    ticket.title
                );
            }
            println!(
                "Page {}/{}",
                state.pagination.current_page,
                state.pagination.total_pages.max(1)
            );
        }

        TicketCommands::Show { id } => {
            tokio::join!(store.load_ticket(&id), store.load_audit_logs(&id));
            if let Some(err) = store.error() {
                bail!("{}", err);
            }
            let state = store.snapshot();
            let Some(ticket) = state.selected_ticket else {
                bail!("Ticket {} not found", id);
            };

            println!("{} ({})", ticket.title, ticket.id);
            println!("{}", "─".repeat(60));
            println!("  Status:    {}", ticket.status.label());
            println!("  Priority:  {}", ticket.priority.label());
            println!("  Type:      {}", ticket.ticket_type.label());
            println!("  Device:    {}", ticket.device_display());
            println!("  Assignee:  {}", ticket.assignee_display());
            println!("  Opened:    {}", ticket.created_at.format("%Y-%m-%d %H:%M"));
            println!();
            println!("  {}", ticket.description);

            let next = console.lifecycle().offered_transitions(ticket.status);
            if !next.is_empty() {
                let labels: Vec<&str> = next.iter().map(|s| s.as_str()).collect();
                println!();
                println!("Next: {}", labels.join(", "));
            }
            print_history(&state.audit_logs);
        }

        TicketCommands::Create {
            title,
            description,
            priority,
            ticket_type,
            device,
        } => {
            let user = console.auth.technician_or_admin()?;
            let data = CreateTicket {
                title,
                description,
                priority,
                ticket_type,
                device_id: device,
            };
            data.validate().map_err(anyhow::Error::msg)?;

            let mut pending = PendingOperation::new();
            let mut updates = store.create_result().subscribe();
            let token = pending.begin();
            store.create_ticket(&data, &user.id, token).await;

            match pending.settle(&mut updates).await {
                Some(OperationStatus::Success) => {
                    println!("Ticket created successfully");
                    if let Some(ticket) = store.snapshot().created_ticket {
                        println!("  {}", ticket.id);
                    }
                }
                _ => bail!(
                    "{}",
                    store
                        .error()
                        .unwrap_or_else(|| "Failed to create ticket".to_string())
                ),
            }
        }

        TicketCommands::Transition { id, status } => {
            let mut pending = PendingOperation::new();
            let mut updates = store.transition_result().subscribe();
            let token = pending.begin();

            if let Err(err) = console.lifecycle().request_transition(&id, status, token).await {
                pending.abandon();
                bail!("{}", err);
            }

            match pending.settle(&mut updates).await {
                Some(OperationStatus::Success) => {
                    println!("Ticket status changed to {}", status.label())
                }
                _ => bail!(
                    "{}",
                    store
                        .error()
                        .unwrap_or_else(|| "Failed to update ticket status".to_string())
                ),
            }
        }
    }

    Ok(())
}
