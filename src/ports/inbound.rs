//! Inbound port. UI (adapter) calls into the application.

/// Input port: UI/CLI drives the session controller.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Run the interactive loop until the user quits.
    async fn run(&self) -> anyhow::Result<()>;
}
