use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Input, Password};
use dotenvy::dotenv;
use schoolyard::cli::seeder::{SeedConfig, seed_all};
use schoolyard::cli::{NewAdmin, create_admin, sync_permissions};
use schoolyard::modules::auth::session::SessionService;
use schoolyard_config::DatabaseConfig;
use schoolyard_db::{MIGRATOR, PgPool, init_db_pool};

#[derive(Parser)]
#[command(name = "schoolyard-cli")]
#[command(about = "Schoolyard CLI - Administrative tools for the Schoolyard API", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run pending database migrations
    Migrate,
    /// Insert or refresh every permission the API checks
    SyncPermissions,
    /// Create an administrator holding the Super Admin role
    CreateAdmin {
        /// Login name
        #[arg(short = 'u', long)]
        username: Option<String>,

        /// Email address
        #[arg(short = 'e', long)]
        email: Option<String>,

        /// Password (will be prompted securely if not provided)
        #[arg(short = 'p', long)]
        password: Option<String>,
    },
    /// Seed the database with fake geography, classes, sections and subjects
    Seed {
        #[arg(long, default_value = "3")]
        countries: usize,

        #[arg(long, default_value = "4")]
        states_per_country: usize,

        #[arg(long, default_value = "5")]
        cities_per_state: usize,

        #[arg(long, default_value = "6")]
        classes: usize,

        #[arg(long, default_value = "3")]
        sections_per_class: usize,

        #[arg(long, default_value = "5")]
        subjects_per_class: usize,
    },
    /// Delete expired sessions
    PurgeSessions,
}

#[tokio::main]
async fn main() {
    dotenv().ok();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("\n❌ {:#}", e);
        std::process::exit(1);
    }
}

async fn connect() -> anyhow::Result<PgPool> {
    let config = DatabaseConfig::from_env()?;
    init_db_pool(&config)
        .await
        .context("Failed to connect to database")
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let pool = connect().await?;

    match cli.command {
        Commands::Migrate => {
            MIGRATOR.run(&pool).await.context("Migration failed")?;
            println!("✅ Migrations applied");
        }
        Commands::SyncPermissions => {
            let report = sync_permissions(&pool).await?;
            println!(
                "✅ Permissions synced: {} added, {} refreshed",
                report.inserted, report.updated
            );
        }
        Commands::CreateAdmin {
            username,
            email,
            password,
        } => handle_create_admin(&pool, username, email, password).await?,
        Commands::Seed {
            countries,
            states_per_country,
            cities_per_state,
            classes,
            sections_per_class,
            subjects_per_class,
        } => {
            let config = SeedConfig {
                countries,
                states_per_country,
                cities_per_state,
                classes,
                sections_per_class,
                subjects_per_class,
            };
            seed_all(&pool, config).await.context("Seeding failed")?;
        }
        Commands::PurgeSessions => {
            let purged = SessionService::purge_expired(&pool)
                .await
                .map_err(|e| e.error)?;
            println!("✅ Removed {} expired sessions", purged);
        }
    }

    Ok(())
}

async fn handle_create_admin(
    pool: &PgPool,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> anyhow::Result<()> {
    // Use provided values or prompt interactively
    let username = match username {
        Some(username) => username,
        None => Input::new().with_prompt("Username").interact_text()?,
    };

    let email = match email {
        Some(email) => email,
        None => Input::new().with_prompt("Email address").interact_text()?,
    };

    let password = match password {
        Some(password) => password,
        None => Password::new()
            .with_prompt("Password")
            .with_confirmation("Confirm password", "Passwords don't match")
            .interact()?,
    };

    let created = create_admin(
        pool,
        NewAdmin {
            username: username.clone(),
            email: email.clone(),
            password,
        },
    )
    .await?;

    println!("\n✅ Admin created successfully!");
    println!("   Username: {}", username);
    println!("   Email: {}", email);
    println!("   Code: {}", created.code);
    println!(
        "   Super Admin role holds {} newly granted permissions",
        created.granted_permissions
    );
    if created.granted_permissions == 0 {
        println!("   Run `schoolyard-cli sync-permissions` first if the role has none yet");
    }

    Ok(())
}
