use clap::{Parser, Subcommand};
use reqwest::{Client, Response, StatusCode, redirect::Policy};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use url::Url;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "A CLI for reading and managing Ferryline site content")]
struct Cli {
    /// Base URL for the Ferryline service
    #[arg(long, default_value = "http://localhost:3000")]
    service_url: Url,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List published articles, bundled ones first
    Articles {
        /// Only articles flagged as defaults
        #[arg(long)]
        defaults: bool,
    },
    /// Show one article by slug
    Article { slug: String },
    /// List ferry schedules, newest first
    Schedules,
    /// List advertised products
    Products,
    /// Sign the service in as the admin
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign the service out
    Logout,
    /// Publish a new article
    AddArticle {
        #[arg(long)]
        title: String,
        /// Article body (HTML)
        #[arg(long)]
        content: String,
        #[arg(long)]
        excerpt: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        author: Option<String>,
        #[arg(long)]
        read_time: Option<String>,
        /// Feature the article with the bundled ones
        #[arg(long)]
        default: bool,
    },
    /// Delete a record: articles, schedules or products
    Delete { collection: String, id: String },
}

#[derive(Serialize)]
struct NewArticle {
    title: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    read_time: Option<String>,
    is_default: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    // The admin guard answers with a redirect to the login page; report it
    // instead of following it.
    let client = Client::builder().redirect(Policy::none()).build()?;
    let base = cli.service_url.as_str().trim_end_matches('/');

    let response = match cli.command {
        Commands::Articles { defaults } => {
            client
                .get(format!("{base}/api/v1/articles"))
                .query(&[("defaults", defaults)])
                .send()
                .await?
        }
        Commands::Article { slug } => {
            client
                .get(format!("{base}/api/v1/articles/{slug}"))
                .send()
                .await?
        }
        Commands::Schedules => client.get(format!("{base}/api/v1/schedules")).send().await?,
        Commands::Products => client.get(format!("{base}/api/v1/products")).send().await?,
        Commands::Login { email, password } => {
            client
                .post(format!("{base}/admin/login"))
                .json(&serde_json::json!({ "email": email, "password": password }))
                .send()
                .await?
        }
        Commands::Logout => client.post(format!("{base}/admin/logout")).send().await?,
        Commands::AddArticle {
            title,
            content,
            excerpt,
            category,
            author,
            read_time,
            default,
        } => {
            let payload = NewArticle {
                title,
                content,
                excerpt,
                category,
                author,
                read_time,
                is_default: default,
            };
            client
                .post(format!("{base}/admin/api/articles"))
                .json(&payload)
                .send()
                .await?
        }
        Commands::Delete { collection, id } => {
            client
                .delete(format!("{base}/admin/api/{collection}/{id}"))
                .send()
                .await?
        }
    };

    report(response).await
}

async fn report(response: Response) -> Result<(), Box<dyn Error>> {
    let status = response.status();

    match status {
        StatusCode::NO_CONTENT => {
            println!("Done");
            Ok(())
        }
        StatusCode::SEE_OTHER => {
            eprintln!("Not signed in; run `ferry login` first");
            std::process::exit(1);
        }
        StatusCode::SERVICE_UNAVAILABLE => {
            eprintln!("Service is still restoring its session, try again shortly");
            std::process::exit(1);
        }
        status if status.is_success() => {
            let body: Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        status => {
            eprintln!("Request failed: {status}");
            eprintln!("Response: {}", response.text().await?);
            std::process::exit(1);
        }
    }
}
