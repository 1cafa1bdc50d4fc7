use clap::{Parser, Subcommand};
use delivery_notes::{
    config::AppConfig,
    db,
    models::User,
    services::{
        create_upload_service, user_service::CreateUserRequest, MockEmailService, UploadService,
    },
    AppState,
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "delivery-notes-cli")]
#[command(about = "CLI tool for managing delivery notes users", long_about = None)]
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
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
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
        /// Email address of the user to delete
        #[arg(short, long)]
        email: String,
    },

    /// Verify a user's email
    Verify {
        /// Email address of the user to verify
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Print a bearer token for a user
    Token {
        /// Email address of the user
        #[arg(short, long)]
        email: String,
    },
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

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

async fn require_user(state: &AppState, email: &str) -> User {
    match state.user_service.find_user_by_email(email).await {
        Ok(Some(user)) => user,
        Ok(None) => fail(format!("User '{}' not found", email)),
        Err(err) => fail(format!("Failed to find user: {}", err)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let uploader: Arc<dyn UploadService> = Arc::from(create_upload_service(&config));
    let state = AppState::new(pool, config, Arc::new(MockEmailService::new()), uploader);
    let user_service = state.user_service.clone();

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                email,
                password,
                verified,
            } => {
                let (password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("Password")?,
                };

                let request = CreateUserRequest {
                    email,
                    password,
                    password_confirm: Some(password_confirm),
                    email_verified: verified,
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Email: {}", user.email);
                        println!("  Verified: {}", user.is_verified);
                    }
                    Err(err) => fail(format!("Failed to create user: {}", err)),
                }
            }

            UserCommands::List { limit, offset } => {
                match user_service.list_users(Some(limit), Some(offset)).await {
                    Ok(users) if users.is_empty() => println!("No users found."),
                    Ok(users) => {
                        println!(
                            "{:<5} {:<40} {:<10} {:<10} {:<12} {:<20}",
                            "ID", "Email", "Verified", "Status", "Company", "Created"
                        );
                        println!("{}", "-".repeat(100));
                        for user in users {
                            println!(
                                "{:<5} {:<40} {:<10} {:<10} {:<12} {:<20}",
                                user.id,
                                user.email,
                                if user.is_verified { "Yes" } else { "No" },
                                format!("{:?}", user.status).to_lowercase(),
                                user.company_id.as_deref().unwrap_or("-"),
                                user.created_at.format("%Y-%m-%d %H:%M")
                            );
                        }
                    }
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                }
            }

            UserCommands::Delete { email } => {
                let user = require_user(&state, &email).await;
                match user_service.delete_user(user.id).await {
                    Ok(()) => println!("✅ User '{}' deleted successfully!", email),
                    Err(err) => fail(format!("Failed to delete user: {}", err)),
                }
            }

            UserCommands::Verify { email } => {
                let user = require_user(&state, &email).await;
                if user.is_verified {
                    println!("ℹ️  User '{}' is already verified", email);
                } else {
                    match user_service.verify_user_email(user.id).await {
                        Ok(()) => println!("✅ User '{}' email verified successfully!", email),
                        Err(err) => fail(format!("Failed to verify user: {}", err)),
                    }
                }
            }

            UserCommands::SetPassword { email, password } => {
                let user = require_user(&state, &email).await;
                let (new_password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("New password")?,
                };

                if new_password != password_confirm {
                    fail("Passwords do not match");
                }

                match user_service.set_password(user.id, &new_password).await {
                    Ok(()) => println!("✅ Password updated successfully for '{}'!", email),
                    Err(err) => fail(format!("Failed to update password: {}", err)),
                }
            }

            UserCommands::Token { email } => {
                let user = require_user(&state, &email).await;
                match user_service.issue_token(&user) {
                    Ok(token) => println!("{}", token),
                    Err(err) => fail(format!("Failed to issue token: {}", err)),
                }
            }
        },
    }

    Ok(())
}
