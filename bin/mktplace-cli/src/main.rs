//! Buyer/seller command-line client for the marketplace.
//!
//! Talks to `mktplace-api-server` over HTTP for everything catalog-related
//! (register, login, list, purchase, trial, profile), and does local,
//! network-free attribution verification against a suspected leaked file —
//! the one command that never touches the marketplace at all, since a leak
//! investigation starts from a file someone else handed you, not a fresh
//! purchase.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use mktplace_common::value::AnchorValue;
use serde::Deserialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(name = "mktplace-cli")]
#[command(about = "Marketplace buyer/seller CLI")]
#[command(version)]
struct Args {
    /// Marketplace catalog API base URL
    #[arg(long, env = "MARKETPLACE_URL", default_value = "http://localhost:8000")]
    marketplace_url: String,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Register a new user
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "buyer")]
        role: String,
    },
    /// Login and print a bearer token
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Save the token to this file instead of only printing it
        #[arg(long)]
        save_token: Option<PathBuf>,
    },
    /// List datasets visible to the authenticated user
    List {
        #[arg(long, env = "MARKETPLACE_TOKEN")]
        token: String,
    },
    /// Purchase a dataset
    Purchase {
        #[arg(long)]
        dataset_id: i64,
        #[arg(long, env = "MARKETPLACE_TOKEN")]
        token: String,
    },
    /// Request trial access to a dataset
    Trial {
        #[arg(long)]
        dataset_id: i64,
        #[arg(long, default_value_t = 100)]
        row_limit: i64,
        #[arg(long, default_value_t = 7)]
        days_valid: i64,
        #[arg(long, env = "MARKETPLACE_TOKEN")]
        token: String,
    },
    /// Fetch a share's Delta Sharing profile and save it to a file
    Profile {
        #[arg(long)]
        share_id: i64,
        #[arg(long)]
        output: PathBuf,
        #[arg(long, env = "MARKETPLACE_TOKEN")]
        token: String,
    },
    /// Query a shared table directly against its Delta Sharing profile
    Query {
        /// Profile file saved by `profile`
        #[arg(long)]
        profile: PathBuf,
        #[arg(long)]
        share: String,
        #[arg(long)]
        schema: String,
        #[arg(long)]
        table: String,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Check whether a suspected-leaked Parquet file carries this buyer's watermark
    Verify {
        /// Local Parquet file to check
        #[arg(long)]
        parquet_file: PathBuf,
        #[arg(long)]
        buyer_id: i64,
        #[arg(long)]
        share_id: i64,
        #[arg(long, value_delimiter = ',')]
        anchor_columns: Vec<String>,
        #[arg(long, value_delimiter = ',', default_value = "")]
        timestamp_columns: Vec<String>,
        #[arg(long, env = "WATERMARK_SECRET")]
        secret: String,
    },
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: i64,
    email: String,
}

#[derive(Debug, Deserialize)]
struct Token {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    id: i64,
    name: String,
    price: f64,
    risk_level: Option<String>,
    risk_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PurchaseResponse {
    share_id: i64,
    approval_status: String,
    share_token: String,
}

#[derive(Debug, Deserialize)]
struct TrialResponse {
    share_id: i64,
    trial_row_limit: Option<i64>,
    trial_expires_at: Option<String>,
    share_token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    profile_json: String,
}

#[derive(Debug, Deserialize)]
struct DeltaSharingProfile {
    endpoint: String,
    #[serde(rename = "bearerToken")]
    bearer_token: String,
}

#[derive(Debug, Deserialize)]
struct FileLine {
    file: FileEntry,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    url: String,
    size: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let client = reqwest::Client::new();

    match args.command {
        Commands::Register { email, password, role } => {
            let body = serde_json::json!({"email": email, "password": password, "role": role});
            let response: UserResponse =
                post_json(&client, &args.marketplace_url, "/register", &body, None).await?;
            println!("User registered: {} (id: {})", response.email, response.id);
        }

        Commands::Login { email, password, save_token } => {
            let body = serde_json::json!({"email": email, "password": password});
            let response: Token = post_json(&client, &args.marketplace_url, "/login", &body, None).await?;
            println!("Login successful");
            println!("Token: {}", response.access_token);
            if let Some(path) = save_token {
                std::fs::write(&path, &response.access_token)
                    .with_context(|| format!("writing token to {}", path.display()))?;
                println!("Token saved to {}", path.display());
            }
        }

        Commands::List { token } => {
            let datasets: Vec<DatasetResponse> =
                get_json(&client, &args.marketplace_url, "/datasets", &token).await?;
            println!("Available datasets ({}):", datasets.len());
            for ds in datasets {
                println!("  id={} name={} price=${:.2}", ds.id, ds.name, ds.price);
                if let Some(level) = ds.risk_level {
                    println!("    risk: {level} ({:.1})", ds.risk_score.unwrap_or(0.0));
                }
            }
        }

        Commands::Purchase { dataset_id, token } => {
            let response: PurchaseResponse =
                post_json(&client, &args.marketplace_url, &format!("/purchase/{dataset_id}"), &serde_json::json!({}), Some(&token))
                    .await?;
            println!("Purchase created");
            println!("  share_id: {}", response.share_id);
            println!("  approval_status: {}", response.approval_status);
            println!("  share_token: {}…", &response.share_token[..response.share_token.len().min(20)]);
        }

        Commands::Trial { dataset_id, row_limit, days_valid, token } => {
            let body = serde_json::json!({"row_limit": row_limit, "days_valid": days_valid});
            let response: TrialResponse = post_json(
                &client,
                &args.marketplace_url,
                &format!("/datasets/{dataset_id}/trial"),
                &body,
                Some(&token),
            )
            .await?;
            println!("Trial access granted");
            println!("  share_id: {}", response.share_id);
            println!("  row_limit: {:?}", response.trial_row_limit);
            println!("  expires_at: {:?}", response.trial_expires_at);
            println!("  share_token: {}…", &response.share_token[..response.share_token.len().min(20)]);
        }

        Commands::Profile { share_id, output, token } => {
            let response: ProfileResponse =
                get_json(&client, &args.marketplace_url, &format!("/shares/{share_id}/profile"), &token).await?;
            std::fs::write(&output, &response.profile_json)
                .with_context(|| format!("writing profile to {}", output.display()))?;
            println!("Profile saved to {}", output.display());
        }

        Commands::Query { profile, share, schema, table, limit } => {
            run_query(&client, &profile, &share, &schema, &table, limit).await?;
        }

        Commands::Verify { parquet_file, buyer_id, share_id, anchor_columns, timestamp_columns, secret } => {
            run_verify(&parquet_file, buyer_id, share_id, &anchor_columns, &timestamp_columns, &secret)?;
        }
    }

    Ok(())
}

async fn post_json<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    body: &serde_json::Value,
    token: Option<&str>,
) -> Result<T> {
    let mut request = client.post(format!("{base_url}{path}")).json(body);
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request.send().await.with_context(|| format!("POST {path}"))?;
    parse_response(response).await
}

async fn get_json<T: for<'de> Deserialize<'de>>(
    client: &reqwest::Client,
    base_url: &str,
    path: &str,
    token: &str,
) -> Result<T> {
    let response =
        client.get(format!("{base_url}{path}")).bearer_auth(token).send().await.with_context(|| format!("GET {path}"))?;
    parse_response(response).await
}

async fn parse_response<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.context("reading response body")?;
    if !status.is_success() {
        bail!("request failed with status {status}: {body}");
    }
    serde_json::from_str(&body).with_context(|| format!("decoding response body: {body}"))
}

/// Fetch table metadata then the file manifest from the Delta Sharing REST
/// API named in `profile_path`, download every file, and print a row/column
/// summary — the CLI-side counterpart of `mktplace-sharing`'s `query_table`.
async fn run_query(
    client: &reqwest::Client,
    profile_path: &PathBuf,
    share: &str,
    schema: &str,
    table: &str,
    limit: Option<u64>,
) -> Result<()> {
    let profile_raw = std::fs::read_to_string(profile_path)
        .with_context(|| format!("reading profile {}", profile_path.display()))?;
    let profile: DeltaSharingProfile = serde_json::from_str(&profile_raw).context("parsing Delta Sharing profile")?;

    let query_url = format!(
        "{}/shares/{share}/schemas/{schema}/tables/{table}/query",
        profile.endpoint.trim_end_matches('/')
    );
    let mut body = serde_json::json!({});
    if let Some(limit) = limit {
        body["limitHint"] = serde_json::json!(limit);
    }

    let response = client
        .post(&query_url)
        .bearer_auth(&profile.bearer_token)
        .json(&body)
        .send()
        .await
        .context("querying table")?;
    let status = response.status();
    let ndjson = response.text().await.context("reading query response")?;
    if !status.is_success() {
        bail!("query failed with status {status}: {ndjson}");
    }

    let mut total_rows = 0usize;
    let mut columns: Vec<String> = Vec::new();
    for line in ndjson.lines() {
        let Ok(file_line) = serde_json::from_str::<FileLine>(line) else { continue };
        let bytes: Bytes = client
            .get(&file_line.file.url)
            .send()
            .await
            .context("downloading file")?
            .bytes()
            .await
            .context("reading file bytes")?;
        let rows = mktplace_table::reader::scan(bytes, None, limit)?;
        if let Some(first) = rows.first() {
            columns = first.keys().cloned().collect();
        }
        total_rows += rows.len();
    }

    println!("Query successful");
    println!("  rows: {total_rows}");
    println!("  columns: {columns:?}");
    Ok(())
}

/// Recompute the expected watermark for `(buyer_id, share_id)` and report
/// how often it actually appears in a suspected-leaked file.
fn run_verify(
    parquet_file: &PathBuf,
    buyer_id: i64,
    share_id: i64,
    anchor_columns: &[String],
    timestamp_columns: &[String],
    secret: &str,
) -> Result<()> {
    let bytes = std::fs::read(parquet_file).with_context(|| format!("reading {}", parquet_file.display()))?;
    let rows: Vec<HashMap<String, AnchorValue>> = mktplace_table::reader::scan(Bytes::from(bytes), None, None)?;

    let result =
        mktplace_watermark::verify_watermark(&rows, secret.as_bytes(), buyer_id, share_id, anchor_columns, timestamp_columns);

    if result.found {
        println!("Watermark detected — file is attributable to buyer {buyer_id}, share {share_id}");
    } else {
        println!("Watermark not detected for buyer {buyer_id}, share {share_id}");
    }
    for channel in result.channels {
        println!(
            "  channel={} matches={}/{} rate={:.1}% declared_match={}",
            channel.channel,
            channel.matches,
            channel.sample_size,
            channel.match_rate * 100.0,
            channel.declared_match
        );
    }
    Ok(())
}
