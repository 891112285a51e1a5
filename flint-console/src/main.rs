use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use flint_console::api::{Endpoints, FlintApi};
use flint_console::controller::Controller;
use flint_console::prefs::PrefsStore;
use flint_console::{channel, ops, view};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    dotenv::dotenv().ok();

    if let Err(error) = run().await {
        eprintln!("{}", view::service_unavailable(&error));
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let endpoints = Endpoints::load()?;
    let api = FlintApi::new(&endpoints);
    let (ws, mut events) = channel::connect(&endpoints.messaging_url);
    let prefs = PrefsStore::open(PrefsStore::default_path());
    let mut controller = Controller::bootstrap(api, Arc::new(ws), prefs).await?;

    println!("{}", view::render(&controller.store));
    println!("{}", ops::USAGE);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if controller.handle_event(event).await {
                        println!("{}", view::render(&controller.store));
                    }
                }
                None => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match ops::parse(line) {
                        Ok(ops::OperatorCommand::Quit) => break,
                        Ok(command) => {
                            let feedback = controller.handle_operator(command).await?;
                            println!("{}", feedback);
                        }
                        Err(message) => println!("{}", message),
                    }
                }
                None => break,
            },
        }
    }
    Ok(())
}
