use anyhow::Result;
use clap::Parser;
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

mod utils;

use charla::{
    config::{self, Config},
    ChatService, Direction, FlowError, Session, XmlMessageStore, XmlUserStore,
};

/// Command line arguments for charla
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "charla: a local instant-messaging client backed by XML files.",
    long_about = "charla is a line-oriented instant-messaging client. Users register, log in, \
    maintain a mutual contact list and exchange messages, all persisted to local XML files \
    plus a plain-text transcript."
)]
struct Args {
    /// Directory for the UsersData.xml, ChatData.xml and ChatData.txt data files
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Log file path (defaults to charla.log in the current directory)
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short)]
    verbose: bool,
}

type Service = ChatService<XmlUserStore, XmlMessageStore>;

fn main() -> Result<()> {
    let args = Args::parse();

    let log_file_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from("charla.log"));
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    utils::setup_logging(log_file_path.to_str(), level)?;

    let config = match &args.data_dir {
        Some(dir) => {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
            Config::in_dir(dir)
        }
        None => config::load_config()?.unwrap_or_default(),
    };
    info!("Using user store at {}", config.users_path.display());

    let users = XmlUserStore::new(&config.users_path);
    let messages = XmlMessageStore::new(
        &config.messages_path,
        &config.transcript_path,
        &config.users_path,
    );
    let service = ChatService::new(users, messages);
    let mut session = Session::new();

    println!("charla");
    // Brief splash pause before the first menu.
    thread::sleep(Duration::from_millis(600));

    main_menu(&service, &mut session)
}

fn main_menu(service: &Service, session: &mut Session) -> Result<()> {
    loop {
        println!();
        println!("1) Log in");
        println!("2) Register");
        println!("q) Quit");

        match utils::read_line()?.as_str() {
            "1" => {
                if login(service, session)? {
                    user_menu(service, session)?;
                }
            }
            "2" => register(service)?,
            "q" | "Q" => return Ok(()),
            other => println!("Unknown option: {}", other),
        }
    }
}

fn login(service: &Service, session: &mut Session) -> Result<bool> {
    println!("Username:");
    let name = utils::read_line()?;
    println!("Password:");
    let password = utils::read_line()?;

    match service.login(session, &name, &password) {
        Ok(()) => {
            println!("Logged in as {}.", name);
            Ok(true)
        }
        Err(e) => {
            report(e);
            Ok(false)
        }
    }
}

fn register(service: &Service) -> Result<()> {
    println!("Choose a username:");
    let name = utils::read_line()?;
    println!("Choose a password:");
    let password = utils::read_line()?;
    println!("Path to a profile image (leave empty for none):");
    let image_path = utils::read_line()?;

    let profile_image = if image_path.is_empty() {
        Vec::new()
    } else {
        match std::fs::read(&image_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("Could not read {}: {}. Registering without an image.", image_path, e);
                Vec::new()
            }
        }
    };

    match service.register(&name, &password, profile_image) {
        Ok(()) => println!("Registered {}. You can log in now.", name),
        Err(e) => report(e),
    }
    Ok(())
}

fn user_menu(service: &Service, session: &mut Session) -> Result<()> {
    loop {
        println!();
        println!("1) List users you can add");
        println!("2) Add a contact");
        println!("3) List your contacts");
        println!("4) Chat with a contact");
        println!("b) Back");

        match utils::read_line()?.as_str() {
            "1" => match service.available_users(session) {
                Ok(users) if users.is_empty() => println!("No one left to add."),
                Ok(users) => {
                    for user in users {
                        println!("  {}", user.name);
                    }
                }
                Err(e) => report(e),
            },
            "2" => {
                println!("Contact name:");
                let name = utils::read_line()?;
                match service.add_contact(session, &name) {
                    Ok(()) => println!("Contact {} added.", name),
                    Err(e) => report(e),
                }
            }
            "3" => {
                if let Some(user) = session.current_user() {
                    if user.contacts.is_empty() {
                        println!("You have no contacts yet.");
                    }
                    for contact in &user.contacts {
                        println!("  {}", contact.name);
                    }
                }
            }
            "4" => {
                println!("Chat with:");
                let name = utils::read_line()?;
                match service.open_chat(session, &name) {
                    Ok(()) => chat_loop(service, session)?,
                    Err(e) => report(e),
                }
            }
            "b" | "B" => return Ok(()),
            other => println!("Unknown option: {}", other),
        }
    }
}

fn chat_loop(service: &Service, session: &mut Session) -> Result<()> {
    let peer_name = match session.selected_user() {
        Some(peer) => peer.name.clone(),
        None => return Ok(()),
    };

    show_conversation(service, session, &peer_name);
    println!("Type a message, /export <path>, or /back.");

    loop {
        let input = utils::read_line()?;
        match input.as_str() {
            "/back" => {
                session.clear_selected_user();
                return Ok(());
            }
            "" => continue,
            _ if input.starts_with("/export") => {
                let path = input.trim_start_matches("/export").trim();
                if path.is_empty() {
                    println!("Usage: /export <path>");
                    continue;
                }
                match service.export_conversation(session, std::path::Path::new(path)) {
                    Ok(count) => println!("Exported {} messages to {}.", count, path),
                    Err(e) => report(e),
                }
            }
            _ => match service.send_message(session, &input) {
                Ok(message) => println!("To {}: {}", peer_name, message.content),
                Err(e) => report(e),
            },
        }
    }
}

fn show_conversation(service: &Service, session: &Session, peer_name: &str) {
    match service.conversation(session) {
        Ok(conversation) => {
            for (direction, message) in conversation {
                match direction {
                    Direction::Sent => println!("To {}: {}", peer_name, message.content),
                    Direction::Received => println!("From {}: {}", peer_name, message.content),
                }
            }
        }
        Err(e) => report(e),
    }
}

fn report(e: FlowError) {
    error!("Flow error: {}", e);
    println!("{}", e);
}
