use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ideabox_types::{
    ActionResponse, ActionStatus, AnalysisRunSummary, AnalysisStats, AnalyzeEmailResponse,
    EmailAccountResponse, Paginated, RunAnalysisRequest, UpdateActionRequest,
};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "ideabox-cli")]
#[command(about = "CLI for running and inspecting IdeaBox email analysis")]
#[command(
    long_about = "A command-line interface for the IdeaBox backend.\n\n\
    Triggers AI analysis runs, analyzes single emails, and manages the\n\
    action items extracted from analyzed mail."
)]
struct Cli {
    /// Backend server URL to connect to.
    #[arg(
        short,
        long,
        default_value = "http://localhost:3000",
        env = "IDEABOX_API_URL"
    )]
    base_url: String,

    /// Access token issued by the auth service, sent as a bearer token.
    #[arg(short, long, env = "IDEABOX_TOKEN", hide_env_values = true)]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run AI analysis over unanalyzed emails or a single email
    Analyze {
        #[command(subcommand)]
        action: AnalyzeAction,
    },
    /// Show how many emails are analyzed
    Stats,
    /// Inspect connected email accounts
    Accounts {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Manage extracted action items
    Actions {
        #[command(subcommand)]
        action: ActionAction,
    },
}

#[derive(Subcommand)]
enum AnalyzeAction {
    /// Analyze the newest unanalyzed, unarchived emails
    ///
    /// Prints success/failure/skip counts, token usage, estimated cost
    /// and a per-category breakdown.
    Run {
        /// Maximum number of emails to analyze (server default 50, capped at 200).
        #[arg(short, long, value_name = "N")]
        max: Option<usize>,
    },

    /// Analyze one email by id
    Email {
        /// The UUID of the email to analyze.
        id: Uuid,

        /// Analyze again even if a stored analysis exists.
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// List accounts with their sync status and email counts
    List,
}

#[derive(Subcommand)]
enum ActionAction {
    /// List action items, newest first
    List {
        /// Only show actions with this status
        /// (pending, in_progress, completed, dismissed).
        #[arg(short, long, value_parser = parse_status)]
        status: Option<ActionStatus>,
    },

    /// Mark an action item as completed
    Complete {
        /// The UUID of the action to complete.
        id: Uuid,
    },
}

fn parse_status(value: &str) -> Result<ActionStatus, String> {
    ActionStatus::from_str(&value.to_lowercase().replace('-', "_"))
        .ok_or_else(|| format!("unknown status '{}'", value))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Authenticated client for the backend API
struct Api {
    http: Client,
    base_url: String,
    token: String,
}

impl Api {
    fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> anyhow::Result<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .context("Failed to reach backend")?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| status.to_string());
            bail!("{} ({})", message, status.as_u16());
        }

        response.json().await.context("Unexpected response body")
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.send(self.http.get(self.url(path))).await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let api = Api {
        http: Client::new(),
        base_url: cli.base_url,
        token: cli.token,
    };

    match cli.command {
        Commands::Analyze { action } => handle_analyze(&api, action).await?,
        Commands::Stats => {
            let stats: AnalysisStats = api.get("/analysis/stats").await?;
            println!(
                "{} emails, {} analyzed, {} waiting",
                stats.total_emails, stats.analyzed_emails, stats.unanalyzed_emails
            );
        }
        Commands::Accounts { action } => match action {
            AccountAction::List => {
                let accounts: Vec<EmailAccountResponse> = api.get("/accounts").await?;
                if accounts.is_empty() {
                    println!("No accounts connected.");
                }
                for account in accounts {
                    println!(
                        "[{}] {} ({}, {} emails)",
                        &account.id.to_string()[..8],
                        account.email_address,
                        account.sync_status,
                        account.email_count
                    );
                    if let Some(error) = &account.last_sync_error {
                        println!("    Last error: {}", error);
                    }
                }
            }
        },
        Commands::Actions { action } => handle_actions(&api, action).await?,
    }

    Ok(())
}

async fn handle_analyze(api: &Api, action: AnalyzeAction) -> anyhow::Result<()> {
    match action {
        AnalyzeAction::Run { max } => {
            let req = RunAnalysisRequest { max_emails: max };
            let summary: AnalysisRunSummary = api
                .send(api.http.post(api.url("/analysis/run")).json(&req))
                .await?;
            print_summary(&summary);
        }
        AnalyzeAction::Email { id, force } => {
            let mut request = api.http.post(api.url(&format!("/emails/{}/analyze", id)));
            if force {
                request = request.header("x-force-reanalyze", "true");
            }
            let response: AnalyzeEmailResponse = api.send(request).await?;
            match response {
                AnalyzeEmailResponse::AlreadyAnalyzed(body) => {
                    println!("{}", body.message);
                    println!("{}", serde_json::to_string_pretty(&body.analysis)?);
                }
                AnalyzeEmailResponse::Analyzed(body) => {
                    let summary = body.summary;
                    println!(
                        "Category: {}",
                        summary.category.as_ref().map_or("none", |c| c.as_str())
                    );
                    if let Some(title) = summary.action_title {
                        println!("Action: {}", title);
                    }
                    if let Some(client) = summary.client_match {
                        println!("Client: {}", client);
                    }
                    println!(
                        "{} tokens in {}ms",
                        summary.tokens_used, summary.processing_time_ms
                    );
                }
            }
        }
    }

    Ok(())
}

fn print_summary(summary: &AnalysisRunSummary) {
    if summary.processed_count() == 0 {
        println!("Nothing to analyze.");
        return;
    }

    println!(
        "Analyzed {} emails: {} ok, {} failed, {} skipped",
        summary.processed_count(),
        summary.success_count,
        summary.failure_count,
        summary.skipped_count
    );
    println!("Actions created: {}", summary.actions_created);
    println!(
        "Tokens: {} (~${:.4}) in {}ms",
        summary.tokens_used, summary.estimated_cost, summary.processing_time_ms
    );
    for (category, count) in &summary.categorized {
        println!("    {:<22} {}", category, count);
    }
}

async fn handle_actions(api: &Api, action: ActionAction) -> anyhow::Result<()> {
    match action {
        ActionAction::List { status } => {
            let path = match status {
                Some(s) => format!("/actions?status={}", s.as_str()),
                None => "/actions".to_string(),
            };
            let page: Paginated<ActionResponse> = api.get(&path).await?;
            if page.items.is_empty() {
                println!("No actions found.");
            }
            for action in &page.items {
                let marker = if action.status == ActionStatus::Completed.as_str() {
                    "✓"
                } else {
                    "○"
                };
                println!(
                    "{} [{}] {} ({})",
                    marker,
                    &action.id.to_string()[..8],
                    action.title,
                    action.priority
                );
                if let Some(due) = action.due_date {
                    println!("    Due: {}", due.format("%Y-%m-%d"));
                }
            }
            if page.has_more {
                println!("... {} total", page.total);
            }
        }
        ActionAction::Complete { id } => {
            let req = UpdateActionRequest {
                status: ActionStatus::Completed,
            };
            let action: ActionResponse = api
                .send(api.http.patch(api.url(&format!("/actions/{}", id))).json(&req))
                .await?;
            println!(
                "Completed: [{}] {}",
                &action.id.to_string()[..8],
                action.title
            );
        }
    }

    Ok(())
}
