use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tag-cli")]
#[command(about = "Inspect and bump cache tag versions on an edge-ssr-cache server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current version of a tag
    Current { tag: String },
    /// Bump a tag, invalidating every cached page that carries it
    Increment { tag: String },
    /// Step a tag back one version
    Decrement { tag: String },
}

impl Commands {
    fn tag_and_operation(&self) -> (&str, &'static str) {
        match self {
            Commands::Current { tag } => (tag, "current"),
            Commands::Increment { tag } => (tag, "increment"),
            Commands::Decrement { tag } => (tag, "decrement"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let (tag, operation) = cli.command.tag_and_operation();
    let url = format!(
        "{}/ssr/tags/{}/{}",
        cli.url.trim_end_matches('/'),
        tag,
        operation
    );

    let res = client.get(url).send().await?;
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        eprintln!("Response: {}", text);
        std::process::exit(1);
    }

    println!("{} {}", tag, text.trim());
    Ok(())
}
