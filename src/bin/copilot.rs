use clap::Parser;
use craftdeal::{
    config::AppConfig,
    generation::GenerationCoordinator,
    model::{GenerationRequest, NegotiationSession, Product},
    negotiation::{fallback_reply, opening_greeting, suggested_opening_offer, NegotiationEngine},
    provider::GeminiClient,
    store::AppStore,
    tools::MarketAssistant,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "copilot")]
#[command(about = "Artisan marketplace co-pilot: bargain, generate, and certify")]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    let config = if std::path::Path::new(&args.config).exists() {
        AppConfig::load_with_env_overrides(&args.config)?
    } else {
        let mut config = AppConfig::default();
        if let Ok(api_key) = std::env::var("GEMINI_API_KEY") {
            config.provider.api_key = Some(api_key);
        }
        config
    };
    config.validate()?;

    let client = Arc::new(GeminiClient::new(config.provider.clone())?);
    let engine = NegotiationEngine::new(client.clone(), config.negotiation.clone());
    let coordinator = GenerationCoordinator::new(client.clone(), config.generation.clone());
    let assistant = MarketAssistant::new(client);
    let store = AppStore::with_products(seed_products());

    println!("Artisan marketplace co-pilot");
    println!("Available commands:");
    println!("  list - Show products");
    println!("  bargain <product_id> - Open a negotiation (then type offers; 'done' to leave)");
    println!("  ad <product_id> <prompt...> - Generate a video ad");
    println!("  mint <product_id> - Mint a certificate of authenticity");
    println!("  exit - Exit program");

    let mut input = String::new();
    loop {
        print!("> ");
        use std::io::Write;
        std::io::stdout().flush()?;
        input.clear();
        if std::io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        match input {
            "exit" => break,
            "list" => {
                for product in store.products() {
                    println!(
                        "  {} - {} (${}, {}){}",
                        product.id,
                        product.name,
                        product.price,
                        product.category,
                        if product.verified { " [verified]" } else { "" }
                    );
                }
            }
            cmd if cmd.starts_with("bargain ") => {
                let product_id = cmd[8..].trim();
                let Some(product) = store.product(product_id) else {
                    println!("Unknown product: {}", product_id);
                    continue;
                };

                let mut session = match NegotiationSession::open(&product) {
                    Ok(session) => session,
                    Err(e) => {
                        println!("Cannot open negotiation: {}", e);
                        continue;
                    }
                };

                println!("{}", opening_greeting(&session.snapshot));
                println!(
                    "(Tip: a customary opening offer is ${})",
                    suggested_opening_offer(session.snapshot.list_price)
                );

                let mut line = String::new();
                while !session.is_terminal() {
                    print!("offer> ");
                    std::io::stdout().flush()?;
                    line.clear();
                    if std::io::stdin().read_line(&mut line)? == 0 {
                        break;
                    }
                    let message = line.trim();
                    if message.is_empty() {
                        continue;
                    }
                    if message == "done" {
                        break;
                    }

                    match engine.submit_offer(&mut session, message).await {
                        Ok(outcome) => {
                            println!("{}", outcome.seller_reply);
                            if let Some(terms) = outcome.deal {
                                store.apply_deal(&terms)?;
                                println!("Deal secured at ${}. Price updated.", terms.price);
                            }
                        }
                        Err(e) if e.is_recoverable() => println!("{}", fallback_reply()),
                        Err(e) => println!("Negotiation error: {}", e),
                    }
                }
            }
            cmd if cmd.starts_with("ad ") => {
                let parts: Vec<&str> = cmd.splitn(3, ' ').collect();
                if parts.len() < 3 {
                    println!("Usage: ad <product_id> <prompt...>");
                    continue;
                }
                let Some(product) = store.product(parts[1]) else {
                    println!("Unknown product: {}", parts[1]);
                    continue;
                };

                let prompt = format!(
                    "A cinematic product advertisement for \"{}\" by {}. {}",
                    product.name, product.artisan_name, parts[2]
                );
                let cancel = CancellationToken::new();
                let guard = cancel.clone();
                let ctrl_c = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        guard.cancel();
                    }
                });

                println!("Generating video ad (Ctrl-C to cancel)...");
                match coordinator
                    .run(&GenerationRequest::video(prompt, None), cancel)
                    .await
                {
                    Ok(artifact) => {
                        let path = format!("{}-ad.mp4", product.id);
                        std::fs::write(&path, &artifact.data)?;
                        println!("Saved {} ({} bytes)", path, artifact.data.len());
                    }
                    Err(e) => println!("Generation failed: {}", e),
                }
                ctrl_c.abort();
            }
            cmd if cmd.starts_with("mint ") => {
                let product_id = cmd[5..].trim();
                match assistant.issue_certificate(&store, product_id).await {
                    Ok(certificate) => {
                        println!("Certificate {} minted:", certificate.id);
                        println!("  {}", certificate.story);
                    }
                    Err(e) => println!("Minting failed: {}", e),
                }
            }
            "" => continue,
            _ => println!("Unknown command."),
        }
    }

    println!("Co-pilot shutting down");
    Ok(())
}

fn seed_products() -> Vec<Product> {
    vec![
        Product {
            id: "scarf-001".to_string(),
            name: "Banarasi Silk Scarf".to_string(),
            description: "Hand-woven silk scarf with zari borders".to_string(),
            price: 45.0,
            category: "Textiles".to_string(),
            image_url: String::new(),
            artisan_id: "a1".to_string(),
            artisan_name: "Meera Devi".to_string(),
            verified: false,
            can_bargain: true,
            certificate: None,
        },
        Product {
            id: "vase-001".to_string(),
            name: "Terracotta Vase".to_string(),
            description: "Wheel-thrown vase with natural ochre glaze".to_string(),
            price: 80.0,
            category: "Pottery".to_string(),
            image_url: String::new(),
            artisan_id: "a2".to_string(),
            artisan_name: "Ravi Kumar".to_string(),
            verified: false,
            can_bargain: true,
            certificate: None,
        },
    ]
}
