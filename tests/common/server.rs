//! Test server management.
//!
//! Spawns and manages gradecastd instances for integration testing.

use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// Knobs for the generated config file.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub auth_timeout: u64,
    pub api_token: Option<String>,
    pub allow_origins: Vec<String>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            auth_timeout: 5,
            api_token: None,
            allow_origins: Vec::new(),
        }
    }
}

/// A test server instance. The WebSocket listener is on `port`, the
/// collaborator API on `port + 1`.
pub struct TestServer {
    child: Child,
    port: u16,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a new test server with default options.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, ServerOptions::default()).await
    }

    /// Spawn a new test server with the given options.
    pub async fn spawn_with(port: u16, options: ServerOptions) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("config.toml");

        let api_token = options
            .api_token
            .as_deref()
            .map(|t| format!("api_token = {t:?}\n"))
            .unwrap_or_default();
        let config_content = format!(
            r#"
[server]
name = "test.gradecast"

[listen]
address = "127.0.0.1:{port}"
allow_origins = {origins:?}

[http]
address = "127.0.0.1:{http_port}"
{api_token}
[timeouts]
authentication = {auth_timeout}
ping = 30
pong = 20
"#,
            port = port,
            origins = options.allow_origins,
            http_port = port + 1,
            api_token = api_token,
            auth_timeout = options.auth_timeout,
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_gradecastd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            port,
            _data_dir: data_dir,
        };

        // Wait for both listeners
        server.wait_until_ready(port).await?;
        server.wait_until_ready(port + 1).await?;

        Ok(server)
    }

    /// Wait until the server is accepting connections on `port`.
    async fn wait_until_ready(&self, port: u16) -> anyhow::Result<()> {
        for _ in 0..30 {
            if tokio::net::TcpStream::connect(("127.0.0.1", port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 3 seconds")
    }

    /// WebSocket URL.
    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Collaborator API base URL.
    #[allow(dead_code)]
    pub fn api_url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port + 1, path)
    }

    /// Create a new test client connected to this server.
    pub async fn connect(&self) -> anyhow::Result<super::client::TestClient> {
        super::client::TestClient::connect(&self.ws_url()).await
    }

    /// Connect and authenticate, consuming the acknowledgement.
    #[allow(dead_code)]
    pub async fn login(&self, role: &str, user_id: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client = self.connect().await?;
        client.authenticate(role, user_id).await?;
        client.expect_authenticated(true).await?;
        Ok(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
