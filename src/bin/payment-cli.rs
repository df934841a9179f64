use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "payment-cli")]
#[command(about = "Management CLI for the payment router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check router status
    Status,
    /// List recorded payments, newest first
    History {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Only show `success` or `failure` records
        #[arg(long)]
        status: Option<String>,
    },
    /// View payment metrics and per-endpoint failures
    Metrics,
    /// Execute a single payment
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// Amount in the smallest unit
        #[arg(long)]
        amount: String,
        /// Token contract; omit for a native transfer
        #[arg(long)]
        token: Option<String>,
        #[arg(long, default_value = "medium")]
        priority: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/api/payment/status")).send().await?;
            print_response(res).await?;
        }
        Commands::History {
            limit,
            offset,
            status,
        } => {
            let mut query = vec![("limit", limit.to_string()), ("offset", offset.to_string())];
            if let Some(status) = status {
                query.push(("status", status));
            }
            let res = client
                .get(format!("{base}/api/payment/history"))
                .query(&query)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{base}/api/payment/metrics")).send().await?;
            print_response(res).await?;
        }
        Commands::Send {
            from,
            to,
            amount,
            token,
            priority,
        } => {
            let mut body = json!({
                "fromAddress": from,
                "toAddress": to,
                "amount": amount,
                "priority": priority,
            });
            if let Some(token) = token {
                body["tokenContract"] = Value::String(token);
            }
            let res = client
                .post(format!("{base}/api/payment/execute"))
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Payment API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
