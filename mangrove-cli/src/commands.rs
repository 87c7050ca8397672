//! CLI subcommand handlers.

use crate::{Commands, ConfigAction, DocsAction};
use anyhow::Context as _;
use mangrove_core::config::{config_exists, load_config, load_config_file};
use mangrove_core::{Document, MangroveConfig, Message, MockServices, Services, create_services};
use mangrove_rag::{
    DocumentLoader, GeneratedResponse, RagError, RagPipeline, RecursiveSplitter, is_supported,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Shown when there is no corpus to answer from.
pub const NOT_READY_MESSAGE: &str = "I'm not ready to chat yet. Please try again in a moment.";
/// Shown for any failure while producing an answer.
pub const TROUBLE_MESSAGE: &str = "I'm having trouble processing your request. Please try again.";

/// Options shared by every subcommand.
pub struct Context {
    pub workspace: PathBuf,
    pub config_path: Option<PathBuf>,
    pub offline: bool,
}

impl Context {
    /// Load configuration and log any warnings.
    pub fn load_config(&self) -> anyhow::Result<MangroveConfig> {
        let config = match &self.config_path {
            Some(path) => load_config_file(path)?,
            None => load_config(Some(&self.workspace), None)
                .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?,
        };
        for warning in config.validate() {
            tracing::warn!("{}", warning);
        }
        Ok(config)
    }

    /// The documents directory, resolved against the workspace.
    pub fn documents_dir(&self, config: &MangroveConfig) -> PathBuf {
        let dir = &config.ingest.documents_dir;
        if dir.is_absolute() {
            dir.clone()
        } else {
            self.workspace.join(dir)
        }
    }

    fn services(&self, config: &MangroveConfig) -> anyhow::Result<Services> {
        if self.offline {
            tracing::info!("Offline mode: using local deterministic services");
            return Ok(Services::from_shared(Arc::new(MockServices::new())));
        }
        create_services(&config.provider).context("Failed to set up the Cohere client")
    }

    /// Load the documents directory and build a pipeline over it.
    ///
    /// Configuration errors are returned. Remote failures while embedding the
    /// corpus yield [`PipelineState::Unavailable`].
    pub async fn build_pipeline(&self, config: &MangroveConfig) -> anyhow::Result<PipelineState> {
        let services = self.services(config)?;
        let loader = DocumentLoader::new(RecursiveSplitter::new(
            config.ingest.chunk_size,
            config.ingest.chunk_overlap,
        ));
        let documents = loader.load_dir(&self.documents_dir(config)).await;
        init_pipeline(documents, services, config).await
    }
}

/// A pipeline, or the reason none could be built.
pub enum PipelineState {
    Ready(RagPipeline),
    /// Building failed on a remote call; answers report trouble.
    Unavailable(String),
}

impl PipelineState {
    pub fn pipeline(&self) -> Option<&RagPipeline> {
        match self {
            PipelineState::Ready(pipeline) => Some(pipeline),
            PipelineState::Unavailable(_) => None,
        }
    }

    pub fn document_count(&self) -> usize {
        self.pipeline().map(|p| p.documents().len()).unwrap_or(0)
    }
}

/// Initialize a pipeline, separating configuration errors from remote failures.
pub async fn init_pipeline(
    documents: Vec<Document>,
    services: Services,
    config: &MangroveConfig,
) -> anyhow::Result<PipelineState> {
    match RagPipeline::initialize(documents, services, config).await {
        Ok(pipeline) => Ok(PipelineState::Ready(pipeline)),
        Err(RagError::Config(e)) => Err(e.into()),
        Err(e) => {
            tracing::error!(error = %e, "Pipeline initialization failed");
            Ok(PipelineState::Unavailable(e.to_string()))
        }
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(command: Commands, ctx: &Context) -> anyhow::Result<()> {
    match command {
        Commands::Ask {
            question,
            history,
            sources,
        } => handle_ask(ctx, question, history.as_deref(), sources).await,
        Commands::Chat { sources } => {
            let config = ctx.load_config()?;
            crate::repl::run_chat(ctx, config, sources).await
        }
        Commands::Docs { action } => handle_docs(action, ctx).await,
        Commands::Config { action } => handle_config(action, ctx),
    }
}

/// Result of one chat turn as presented to the user.
#[derive(Debug)]
pub enum Reply {
    Answer(GeneratedResponse),
    /// A user-facing explanation of why no answer was produced.
    Refused(String),
}

/// Answer a message list whose last message is the question.
pub async fn respond(state: &PipelineState, messages: &[Message]) -> Reply {
    if messages.is_empty() {
        return Reply::Refused("No messages provided".to_string());
    }
    let pipeline = match state {
        PipelineState::Unavailable(reason) => {
            tracing::error!(reason = %reason, "Pipeline unavailable");
            return Reply::Refused(TROUBLE_MESSAGE.to_string());
        }
        PipelineState::Ready(pipeline) if pipeline.is_empty() => {
            return Reply::Refused(NOT_READY_MESSAGE.to_string());
        }
        PipelineState::Ready(pipeline) => pipeline,
    };
    match pipeline.answer(messages).await {
        Ok(response) => Reply::Answer(response),
        Err(RagError::Validation { message }) => Reply::Refused(message),
        Err(e) => {
            tracing::error!(error = %e, "Failed to generate a response");
            Reply::Refused(TROUBLE_MESSAGE.to_string())
        }
    }
}

/// Render a source list, one `- name` line per distinct source.
pub fn format_sources(sources: &[String]) -> String {
    if sources.is_empty() {
        return "No sources available".to_string();
    }
    let mut unique: Vec<&str> = sources.iter().map(|s| s.as_str()).collect();
    unique.sort_unstable();
    unique.dedup();
    unique
        .iter()
        .map(|s| format!("- {}", s))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn handle_ask(
    ctx: &Context,
    question: String,
    history: Option<&Path>,
    show_sources: bool,
) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let mut messages: Vec<Message> = match history {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read history file {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("Invalid history file {}", path.display()))?
        }
        None => Vec::new(),
    };
    messages.push(Message::user(question));

    let state = ctx.build_pipeline(&config).await?;
    match respond(&state, &messages).await {
        Reply::Answer(response) => {
            println!("{}", response.text);
            if show_sources {
                println!("\nSources:\n{}", format_sources(&response.sources));
            }
            Ok(())
        }
        Reply::Refused(message) => anyhow::bail!("{}", message),
    }
}

async fn handle_docs(action: DocsAction, ctx: &Context) -> anyhow::Result<()> {
    let config = ctx.load_config()?;
    let dir = ctx.documents_dir(&config);
    match action {
        DocsAction::List => {
            let names = list_documents(&dir)?;
            if names.is_empty() {
                println!("No documents in {}", dir.display());
            } else {
                println!("Documents ({}):", names.len());
                for name in &names {
                    println!("  {}", name);
                }
            }
            Ok(())
        }
        DocsAction::Add { path } => {
            let dest = add_document(&dir, &path)?;
            let loader = DocumentLoader::new(RecursiveSplitter::new(
                config.ingest.chunk_size,
                config.ingest.chunk_overlap,
            ));
            match loader.load_file(&dest).await {
                Ok(chunks) => println!("Added {} ({} chunks)", dest.display(), chunks.len()),
                Err(e) => {
                    tracing::warn!(error = %e, "Added file will be skipped when loading");
                    println!("Added {} (unreadable: {})", dest.display(), e);
                }
            }
            Ok(())
        }
        DocsAction::Remove { name } => {
            remove_document(&dir, &name)?;
            println!("Removed {}", name);
            Ok(())
        }
    }
}

/// Sorted file names of supported documents in `dir`.
pub fn list_documents(dir: &Path) -> anyhow::Result<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && is_supported(&path)
            && let Some(name) = path.file_name()
        {
            names.push(name.to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Copy `source` into `dir`, returning the destination path.
pub fn add_document(dir: &Path, source: &Path) -> anyhow::Result<PathBuf> {
    if !is_supported(source) {
        anyhow::bail!(
            "Unsupported file type: {} (supported: {})",
            source.display(),
            mangrove_rag::SUPPORTED_EXTENSIONS.join(", ")
        );
    }
    let name = source
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Not a file: {}", source.display()))?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let dest = dir.join(name);
    std::fs::copy(source, &dest)
        .with_context(|| format!("Failed to copy {}", source.display()))?;
    Ok(dest)
}

/// Delete the document called `name` from `dir`.
pub fn remove_document(dir: &Path, name: &str) -> anyhow::Result<()> {
    if name.contains('/') || name.contains('\\') || name == ".." {
        anyhow::bail!("Invalid document name: {}", name);
    }
    let path = dir.join(name);
    if !path.is_file() {
        anyhow::bail!("Document '{}' not found", name);
    }
    std::fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))
}

fn handle_config(action: ConfigAction, ctx: &Context) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = ctx.workspace.join(".mangrove").join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let toml_str = toml::to_string_pretty(&MangroveConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = ctx.load_config()?;
            if ctx.config_path.is_none() && !config_exists(Some(&ctx.workspace)) {
                println!("# No configuration file found; showing defaults and environment.");
            }
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Check => {
            let config = ctx.load_config()?;
            config.check()?;
            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration OK");
            } else {
                for warning in warnings {
                    println!("warning: {}", warning);
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mangrove_core::{DocumentMetadata, ProviderError, RetryConfig};
    use mangrove_rag::GenerationMode;
    use pretty_assertions::assert_eq;

    fn fast_config() -> MangroveConfig {
        MangroveConfig {
            retry: RetryConfig {
                max_attempts: 3,
                initial_backoff_ms: 1,
                max_backoff_ms: 2,
                backoff_multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    async fn pipeline(mock: Arc<MockServices>, docs: Vec<Document>) -> PipelineState {
        init_pipeline(docs, Services::from_shared(mock), &fast_config())
            .await
            .unwrap()
    }

    fn carbon_doc() -> Vec<Document> {
        vec![Document::new(
            "Mangroves store carbon",
            DocumentMetadata::new("doc1.pdf", 0),
        )]
    }

    #[test]
    fn test_format_sources() {
        assert_eq!(format_sources(&[]), "No sources available");
        let sources = vec![
            "b.pdf".to_string(),
            "a.pdf".to_string(),
            "b.pdf".to_string(),
        ];
        assert_eq!(format_sources(&sources), "- a.pdf\n- b.pdf");
    }

    #[test]
    fn test_docs_add_list_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("documents");
        let src = tmp.path().join("notes.md");
        std::fs::write(&src, "Mangroves store carbon.").unwrap();
        let pdf = tmp.path().join("paper.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();

        assert!(list_documents(&dir).unwrap().is_empty());
        add_document(&dir, &src).unwrap();
        assert!(add_document(&dir, &pdf).is_err());
        assert_eq!(list_documents(&dir).unwrap(), vec!["notes.md"]);

        assert!(remove_document(&dir, "missing.md").is_err());
        assert!(remove_document(&dir, "../notes.md").is_err());
        remove_document(&dir, "notes.md").unwrap();
        assert!(list_documents(&dir).unwrap().is_empty());
    }

    #[test]
    fn test_documents_dir_resolution() {
        let ctx = Context {
            workspace: PathBuf::from("/work"),
            config_path: None,
            offline: true,
        };
        let mut config = MangroveConfig::default();
        assert_eq!(
            ctx.documents_dir(&config),
            PathBuf::from("/work/data/documents")
        );
        config.ingest.documents_dir = PathBuf::from("/srv/docs");
        assert_eq!(ctx.documents_dir(&config), PathBuf::from("/srv/docs"));
    }

    #[tokio::test]
    async fn test_respond_without_messages() {
        let state = PipelineState::Unavailable("down".into());
        match respond(&state, &[]).await {
            Reply::Refused(message) => assert_eq!(message, "No messages provided"),
            other => panic!("Expected refusal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_not_ready() {
        let mock = Arc::new(MockServices::new());
        let empty = pipeline(mock.clone(), Vec::new()).await;
        match respond(&empty, &[Message::user("Hello")]).await {
            Reply::Refused(message) => assert_eq!(message, NOT_READY_MESSAGE),
            other => panic!("Expected refusal, got {:?}", other),
        }
        assert!(mock.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn test_respond_answers_from_documents() {
        let mock = Arc::new(MockServices::with_reply("They store carbon."));
        let p = pipeline(mock, carbon_doc()).await;
        match respond(&p, &[Message::user("What do mangroves store?")]).await {
            Reply::Answer(response) => {
                assert_eq!(response.text, "They store carbon.");
                assert_eq!(response.sources, vec!["doc1.pdf"]);
                assert_eq!(response.mode, GenerationMode::Grounded);
            }
            other => panic!("Expected answer, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_hides_remote_failures() {
        let mock = Arc::new(MockServices::new());
        let p = pipeline(mock.clone(), carbon_doc()).await;
        for _ in 0..3 {
            mock.queue_chat(Err(ProviderError::ApiRequest {
                message: "Server error (500)".into(),
            }));
        }
        match respond(&p, &[Message::user("What do mangroves store?")]).await {
            Reply::Refused(message) => assert_eq!(message, TROUBLE_MESSAGE),
            other => panic!("Expected refusal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corpus_embedding_failure_reports_trouble() {
        let mock = Arc::new(MockServices::new());
        for _ in 0..3 {
            mock.queue_embed(Err(ProviderError::Connection {
                message: "connection refused".into(),
            }));
        }
        let state = pipeline(mock.clone(), carbon_doc()).await;
        assert!(matches!(state, PipelineState::Unavailable(_)));
        assert_eq!(state.document_count(), 0);

        match respond(&state, &[Message::user("What do mangroves store?")]).await {
            Reply::Refused(message) => assert_eq!(message, TROUBLE_MESSAGE),
            other => panic!("Expected refusal, got {:?}", other),
        }
        assert!(mock.chat_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_service_reports_trouble() {
        let tmp = tempfile::tempdir().unwrap();
        let docs_dir = tmp.path().join("data").join("documents");
        std::fs::create_dir_all(&docs_dir).unwrap();
        std::fs::write(docs_dir.join("doc1.txt"), "Mangroves store carbon.").unwrap();

        let ctx = Context {
            workspace: tmp.path().to_path_buf(),
            config_path: None,
            offline: false,
        };
        let mut config = fast_config();
        config.provider.base_url = "http://127.0.0.1:1".to_string();
        config.provider.api_key = Some("k".repeat(40));
        config.provider.timeout_secs = 5;

        let state = ctx.build_pipeline(&config).await.unwrap();
        assert!(state.pipeline().is_none());
        match respond(&state, &[Message::user("What do mangroves store?")]).await {
            Reply::Refused(message) => assert_eq!(message, TROUBLE_MESSAGE),
            other => panic!("Expected refusal, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_config_is_an_error() {
        let mut config = fast_config();
        config.retrieval.top_k = 0;
        let result = init_pipeline(
            carbon_doc(),
            Services::from_shared(Arc::new(MockServices::new())),
            &config,
        )
        .await;
        assert!(result.is_err());
    }
}
