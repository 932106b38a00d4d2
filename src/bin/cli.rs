use std::collections::HashSet;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use pronto_mia::authz::{AccessObjectBinding, Capability, FIELD_POLICIES};
use pronto_mia::config::load_env;
use pronto_mia::db::SqliteStore;

#[derive(Parser, Debug)]
#[command(author, version, about = "pronto-mia administration tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending migrations
    MigrateRun,
    /// Show migration status against the current database
    MigrateStatus,
    /// Create a department
    CreateDepartment { name: String },
    /// Create a user with the default capability set
    CreateUser {
        username: String,
        password: String,
        #[arg(long)]
        department: Option<i64>,
    },
    /// Grant a capability, e.g. `grant alice CanEditUsers`
    Grant { username: String, capability: String },
    /// Revoke a capability
    Revoke { username: String, capability: String },
    /// Reject every token issued to the user so far
    InvalidateTokens { username: String },
    /// Print the guarded fields and their policies
    Policies,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::MigrateRun => {
            let pool = get_pool().await?;
            pronto_mia::db::migrate(&pool).await?;
            println!("Migrations applied");
        }
        Commands::MigrateStatus => {
            let pool = get_pool().await?;
            print_status(&pool).await?;
        }
        Commands::CreateDepartment { name } => {
            let store = SqliteStore::new(get_pool().await?);
            let department = store.create_department(&name).await?;
            println!("Created department {} ({})", department.name, department.id);
        }
        Commands::CreateUser {
            username,
            password,
            department,
        } => {
            let store = SqliteStore::new(get_pool().await?);
            let user = store.create_user(&username, &password, department).await?;
            println!("Created user {} ({})", user.username, user.id);
        }
        Commands::Grant { username, capability } => {
            set_capability(&username, &capability, true).await?;
        }
        Commands::Revoke { username, capability } => {
            set_capability(&username, &capability, false).await?;
        }
        Commands::InvalidateTokens { username } => {
            let store = SqliteStore::new(get_pool().await?);
            let user = find_user(&store, &username).await?;
            store.invalidate_tokens(user, Utc::now()).await?;
            println!("Invalidated tokens of {}", username);
        }
        Commands::Policies => {
            println!("{:<28} {:<36} {}", "Field", "Policy", "Scope");
            for entry in FIELD_POLICIES {
                let scope = match entry.access {
                    Some(AccessObjectBinding::Ignored) => "ignored",
                    Some(binding) if binding.is_direct_department_id() => "department id",
                    Some(_) => "object",
                    None => "-",
                };
                println!("{:<28} {:<36} {}", entry.field, entry.policy, scope);
            }
        }
    }

    Ok(())
}

async fn set_capability(username: &str, capability: &str, value: bool) -> anyhow::Result<()> {
    let capability: Capability = capability.parse()?;
    let store = SqliteStore::new(get_pool().await?);
    let user = find_user(&store, username).await?;

    let set = store.set_capability(user, capability, value).await?;
    let granted: Vec<&str> = set.granted().iter().map(|c| c.name()).collect();
    println!("{}: {}", username, granted.join(", "));
    Ok(())
}

async fn find_user(store: &SqliteStore, username: &str) -> anyhow::Result<i64> {
    let user = store
        .find_user_by_username(username)
        .await?
        .with_context(|| format!("unknown user {username}"))?;
    Ok(user.id)
}

async fn get_pool() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to database")
}

async fn print_status(pool: &SqlitePool) -> anyhow::Result<()> {
    let has_table = sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'")
        .fetch_optional(pool)
        .await?
        .is_some();

    let applied_versions: HashSet<i64> = if has_table {
        let rows = sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?;
        rows.iter().filter_map(|row| row.try_get::<i64, _>("version").ok()).collect()
    } else {
        HashSet::new()
    };

    println!("{:<8} {:<20} {}", "Status", "Version", "Name");
    for migration in sqlx::migrate!().iter() {
        let status = if applied_versions.contains(&migration.version) {
            "applied"
        } else {
            "pending"
        };
        println!("{:<8} {:<20} {}", status, migration.version, migration.description.trim());
    }

    Ok(())
}
