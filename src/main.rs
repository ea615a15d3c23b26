use parley::app::{Controller, Repl};
use parley::backend::new_backend;
use parley::cli::Command;
use parley::config::{Configuration, init_logger, verbose};
use parley::storage::new_storage;
use eyre::{Context, Result};
use tokio::io::{self, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    let cmd = Command::new();
    if cmd.version() {
        cmd.print_version();
        return Ok(());
    }

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let config = cmd.get_config()?;
    Configuration::init(config.clone())?;
    init_logger(&config.log)?;
    verbose!("[+] Logger initialized");

    verbose!("[+] Initializing storage...");
    let storage = new_storage(&config.storage)
        .await
        .wrap_err("initializing storage")?;
    verbose!("[+] Storage initialized");

    let backend = new_backend(&config.backend);
    verbose!("[+] Using inference engine at {}", config.backend.endpoint);

    let mut controller = Controller::new(storage, backend);
    if let Err(err) = controller
        .resolve_model(config.backend.default_model.as_deref())
        .await
    {
        // Chatting still works once a model is set with /model.
        log::warn!("Failed to resolve model: {:#}", err);
        eprintln!("warning: {:#}", err);
    }
    if controller.model().is_empty() {
        eprintln!("warning: no model selected, pick one with /model <name>");
    } else {
        verbose!("[+] Using model {}", controller.model());
    }

    if let Some(latest) = controller.conversations().await?.first() {
        controller.switch_conversation(latest.id()).await?;
        verbose!("[+] Resumed conversation {}", latest);
    }

    println!("Type /help for commands");
    let mut repl = Repl::new(controller, BufReader::new(io::stdin()), io::stdout());
    if let Err(err) = repl.run().await {
        eprintln!("Error: {}", err);
    }

    Ok(())
}
