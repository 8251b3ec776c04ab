use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dvota::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    db,
    repositories::SqliteUserRepository,
    services::{
        user_service::{CreateUserRequest, UpdatePasswordRequest},
        CleanupService, UserService,
    },
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dvota-cli")]
#[command(about = "Administration tool for the Dvota voting service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Maintenance sweeps
    Cleanup {
        #[command(subcommand)]
        command: CleanupCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Full name
        #[arg(short, long)]
        fullname: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Mark email as verified
        #[arg(long)]
        verified: bool,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a user
    Delete {
        #[arg(short, long)]
        email: String,
    },

    /// Verify a user's email
    Verify {
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum CleanupCommands {
    /// Purge stale unverified accounts and expired OTPs once
    Run,
}

fn get_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn confirm_password(prompt: &str) -> anyhow::Result<(String, String)> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    Ok((password, confirm))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;
    db::run_migrations(&pool).await?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone(), clock.clone()));
    let user_service = UserService::new(user_repository);

    let cli = Cli::parse();

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                fullname,
                email,
                password,
                verified,
            } => {
                let (password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("Password")?,
                };

                let user = user_service
                    .create_user(CreateUserRequest {
                        fullname,
                        email,
                        password,
                        password_confirm: Some(password_confirm),
                        email_verified: verified,
                    })
                    .await
                    .context("Failed to create user")?;

                println!("✅ User created successfully!");
                println!("  ID: {}", user.id);
                println!("  Name: {}", user.fullname);
                println!("  Email: {}", user.email);
                println!("  Verified: {}", user.email_verified);
            }

            UserCommands::List { limit, offset } => {
                let users = user_service
                    .list_users(Some(limit), Some(offset))
                    .await
                    .context("Failed to list users")?;

                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<5} {:<25} {:<35} {:<10} {:<20}",
                        "ID", "Name", "Email", "Verified", "Created"
                    );
                    println!("{}", "-".repeat(95));
                    for user in users {
                        println!(
                            "{:<5} {:<25} {:<35} {:<10} {:<20}",
                            user.id,
                            user.fullname,
                            user.email,
                            if user.email_verified { "Yes" } else { "No" },
                            user.created_at.format("%Y-%m-%d %H:%M:%S")
                        );
                    }
                }
            }

            UserCommands::Delete { email } => {
                let Some(user) = user_service.find_user_by_email(&email).await? else {
                    bail!("User '{}' not found", email);
                };
                user_service
                    .delete_user(user.id)
                    .await
                    .context("Failed to delete user")?;
                println!("✅ User '{}' deleted successfully!", email);
            }

            UserCommands::Verify { email } => {
                let Some(user) = user_service.find_user_by_email(&email).await? else {
                    bail!("User '{}' not found", email);
                };
                if user.email_verified {
                    println!("ℹ️  User '{}' is already verified", email);
                } else {
                    user_service
                        .verify_user_email(user.id)
                        .await
                        .context("Failed to verify user")?;
                    println!("✅ User '{}' email verified successfully!", email);
                }
            }

            UserCommands::SetPassword { email, password } => {
                let Some(user) = user_service.find_user_by_email(&email).await? else {
                    bail!("User '{}' not found", email);
                };
                let (new_password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("New password")?,
                };

                user_service
                    .update_password(UpdatePasswordRequest {
                        user_id: user.id,
                        new_password,
                        new_password_confirm: Some(password_confirm),
                    })
                    .await
                    .context("Failed to update password")?;
                println!("✅ Password updated successfully for '{}'!", email);
            }
        },

        Commands::Cleanup {
            command: CleanupCommands::Run,
        } => {
            let cleanup = CleanupService::new(pool.clone(), clock);
            let (users, otps) = cleanup.run_once().await.context("Cleanup failed")?;
            println!("✅ Removed {} unverified user(s) and {} expired OTP(s)", users, otps);
        }
    }

    Ok(())
}
