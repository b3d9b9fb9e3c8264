//! Implements InputPort. Inquire-driven interactive session loop.

use super::view;
use crate::domain::Document;
use crate::ports::InputPort;
use crate::usecases::SessionController;
use anyhow::Context;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use inquire::{Confirm, Select, Text};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Applies the prompt theme for all subsequent inquire prompts. Call once
/// at startup.
pub fn apply_theme() {
    let config = RenderConfig::default()
        .with_prompt_prefix(Styled::new("»").with_fg(Color::LightCyan))
        .with_answer(StyleSheet::new().with_fg(Color::LightCyan))
        .with_help_message(StyleSheet::new().with_fg(Color::DarkGrey));
    inquire::set_global_render_config(config);
}

fn spinner(label: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(label.to_string());
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

const MENU_OPEN: &str = "Open a document";
const MENU_UPLOAD: &str = "Upload a document";
const MENU_CHAT: &str = "Chat about the document";
const MENU_ANALYSIS: &str = "Show analysis";
const MENU_REFRESH_ANALYSIS: &str = "Refresh analysis";
const MENU_PREVIEW: &str = "Show preview";
const MENU_REFRESH_PREVIEW: &str = "Refresh preview";
const MENU_DOWNLOAD: &str = "Download the processed document";
const MENU_CLOSE: &str = "Close the document";
const MENU_QUIT: &str = "Quit";

/// Terminal front end over the session controller.
pub struct ReplInputPort {
    session: Arc<SessionController>,
    download_dir: PathBuf,
}

impl ReplInputPort {
    pub fn new(session: Arc<SessionController>, download_dir: impl AsRef<Path>) -> Self {
        Self {
            session,
            download_dir: download_dir.as_ref().to_path_buf(),
        }
    }

    fn menu_options(&self) -> Vec<&'static str> {
        let has_document = self.session.snapshot().current_document.is_some();
        if has_document {
            vec![
                MENU_CHAT,
                MENU_ANALYSIS,
                MENU_REFRESH_ANALYSIS,
                MENU_PREVIEW,
                MENU_REFRESH_PREVIEW,
                MENU_DOWNLOAD,
                MENU_OPEN,
                MENU_UPLOAD,
                MENU_CLOSE,
                MENU_QUIT,
            ]
        } else {
            vec![MENU_OPEN, MENU_UPLOAD, MENU_QUIT]
        }
    }

    async fn open_document(&self) -> anyhow::Result<()> {
        let documents = match self.session.list_documents().await {
            Ok(documents) => documents,
            Err(e) => {
                println!("Could not list documents: {e}");
                return Ok(());
            }
        };
        if documents.is_empty() {
            println!("No documents on the backend yet. Upload one first.");
            return Ok(());
        }

        let options: Vec<String> = documents.iter().map(view::document_line).collect();
        let Ok(selected) = Select::new("Open which document?", options.clone()).prompt() else {
            return Ok(());
        };
        let Some(index) = options.iter().position(|o| *o == selected) else {
            return Ok(());
        };
        self.select_with_spinner(documents[index].clone()).await;
        Ok(())
    }

    async fn select_with_spinner(&self, document: Document) {
        let bar = spinner(&format!("Opening {}...", document.name));
        self.session.select_document(document).await;
        bar.finish_and_clear();
        println!("{}", view::session_header(&self.session.snapshot()));
    }

    async fn upload_document(&self) -> anyhow::Result<()> {
        let Ok(path) = Text::new("Path to the file:").prompt() else {
            return Ok(());
        };
        let path = PathBuf::from(path.trim());
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                println!("Could not read {}: {e}", path.display());
                return Ok(());
            }
        };
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let title = Text::new("Title:")
            .with_default(&file_name)
            .prompt()
            .unwrap_or_else(|_| file_name.clone());

        let bar = spinner(&format!("Uploading {file_name}..."));
        let result = self.session.upload_document(&file_name, bytes, &title).await;
        bar.finish_and_clear();

        match result {
            Ok(document) => println!("Uploaded and opened {}.", document.name),
            // The controller already raised a notice with the cause.
            Err(_) => println!("Upload failed."),
        }
        Ok(())
    }

    /// Chat sub-loop: free-form messages until an empty line.
    async fn chat_loop(&self) -> anyhow::Result<()> {
        println!("{}", view::render_transcript(&self.session.snapshot().chat_messages));
        println!("(empty message returns to the menu)");

        loop {
            let Ok(text) = Text::new("you:").prompt() else {
                return Ok(());
            };
            if text.trim().is_empty() {
                return Ok(());
            }

            let bar = spinner("Thinking...");
            self.session.send_message(&text).await;
            bar.finish_and_clear();

            // Render whatever the controller committed, including system
            // messages and inline apologies.
            let snapshot = self.session.snapshot();
            if let Some(last) = snapshot.chat_messages.last() {
                println!("{}", view::message_line(last));
            }
        }
    }

    fn show_analysis(&self) {
        match self.session.snapshot().document_analysis {
            Some(analysis) => println!("{}", view::render_analysis(&analysis)),
            None => println!("No analysis available yet."),
        }
    }

    fn show_preview(&self) {
        match self.session.snapshot().document_preview {
            Some(preview) => println!("{}", view::render_preview(&preview)),
            None => println!("No preview available yet."),
        }
    }

    async fn download(&self) -> anyhow::Result<()> {
        let bar = spinner("Downloading...");
        let result = self.session.download_document().await;
        bar.finish_and_clear();

        let payload = match result {
            Ok(payload) => payload,
            Err(e) => {
                println!("Download failed: {e}");
                return Ok(());
            }
        };

        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .with_context(|| format!("creating {}", self.download_dir.display()))?;
        let target = self.download_dir.join(&payload.file_name);
        tokio::fs::write(&target, &payload.bytes)
            .await
            .with_context(|| format!("writing {}", target.display()))?;
        println!(
            "Saved {} ({} bytes, {}).",
            target.display(),
            payload.bytes.len(),
            payload.content_type
        );
        Ok(())
    }
}

#[async_trait]
impl InputPort for ReplInputPort {
    async fn run(&self) -> anyhow::Result<()> {
        loop {
            let header = view::session_header(&self.session.snapshot());
            let Ok(choice) = Select::new(&header, self.menu_options()).prompt() else {
                // Esc / ctrl-c on the main menu exits.
                return Ok(());
            };

            match choice {
                MENU_OPEN => self.open_document().await?,
                MENU_UPLOAD => self.upload_document().await?,
                MENU_CHAT => self.chat_loop().await?,
                MENU_ANALYSIS => self.show_analysis(),
                MENU_REFRESH_ANALYSIS => {
                    let bar = spinner("Refreshing analysis...");
                    self.session.refresh_analysis().await;
                    bar.finish_and_clear();
                    self.show_analysis();
                }
                MENU_PREVIEW => self.show_preview(),
                MENU_REFRESH_PREVIEW => {
                    let bar = spinner("Refreshing preview...");
                    self.session.refresh_preview().await;
                    bar.finish_and_clear();
                    self.show_preview();
                }
                MENU_DOWNLOAD => self.download().await?,
                MENU_CLOSE => self.session.clear_document().await,
                MENU_QUIT => {
                    let confirmed = Confirm::new("Quit?")
                        .with_default(true)
                        .prompt()
                        .unwrap_or(true);
                    if confirmed {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
    }
}
