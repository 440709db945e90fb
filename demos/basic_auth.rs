//! Basic authentication example
//!
//! Usage:
//!   CAMPUS_EMAIL=me@example.com CAMPUS_PASSWORD=secret cargo run --example basic_auth

use campus_rs_client::{ApiClient, AuthClientConfig, AuthClientHttp};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Configuration
    let config = AuthClientConfig::from_env()?;
    let email = std::env::var("CAMPUS_EMAIL").unwrap_or_else(|_| "test@test.com".to_string());
    let password = std::env::var("CAMPUS_PASSWORD").unwrap_or_else(|_| "password".to_string());

    println!("=== Campus Rust Client Example ===");
    println!("Backend: {}", config.base_url);
    println!();

    // Create client; a session persisted in CAMPUS_CREDENTIALS_DIR is restored
    let client = AuthClientHttp::new(config)?;

    if !client.session().is_authenticated() {
        println!("Logging in as {email}...");
        client.login(&email, &password).await?;
    }

    let user_id = client.session().user_id().ok_or("session carries no user id")?;
    println!("✓ Logged in as user {user_id}");
    println!();

    // Expired access tokens are refreshed transparently
    let profile: serde_json::Value = client
        .send(client.get(&format!("usuarios/{user_id}"))?)
        .await?
        .json()
        .await?;
    println!("Profile: {profile}");

    // Watch for forced logout while issuing a few concurrent calls
    let mut watcher = client.session().subscribe();
    let (brands, tags) = tokio::join!(
        client.send(client.get("marcas/")?),
        client.send(client.get("etiquetas/")?),
    );
    println!("Brands: {}", brands.map(|r| r.status().to_string()).unwrap_or_else(|e| e.to_string()));
    println!("Tags: {}", tags.map(|r| r.status().to_string()).unwrap_or_else(|e| e.to_string()));

    if watcher.has_changed()? && !watcher.borrow_and_update().is_authenticated() {
        println!("✗ Session expired, please log in again");
    }

    Ok(())
}
