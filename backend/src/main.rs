//! # Backend Service
//!
//! Thin entry point that delegates to lib-web for server setup.

use lib_web::start_server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    start_server().await
}
