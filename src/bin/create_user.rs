//! Out-of-band user creation, for admin bootstrapping and for deployments
//! that keep self-registration closed.
//!
//! Usage: `create_user <email>`. The password is prompted for twice, with
//! terminal echo disabled.

use anyhow::{bail, Context};

use jobtrack::auth::{repo::User, service};
use jobtrack::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()))
        .init();

    let email = match std::env::args().nth(1) {
        Some(email) => email,
        None => {
            eprintln!("Usage: create_user <email>");
            eprintln!("Example: create_user admin@example.com");
            std::process::exit(1);
        }
    };

    let state = AppState::init().await?;
    sqlx::migrate!("./migrations")
        .run(&state.db)
        .await
        .context("apply migrations")?;

    let normalized = service::normalize_email(&email);
    if User::find_by_email(&state.db, &normalized).await?.is_some() {
        bail!("user with email {normalized} already exists");
    }

    println!("Creating user: {normalized}");
    let password = rpassword::prompt_password("Enter password: ").context("read password")?;
    let confirm = rpassword::prompt_password("Confirm password: ").context("read password")?;
    if password != confirm {
        bail!("passwords do not match");
    }

    let user = service::register(&state, &email, &password).await?;
    println!("User created");
    println!("  Email:   {}", user.email);
    println!("  User ID: {}", user.id);
    Ok(())
}
