use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use mmindex::chunk::DocumentChunker;
use mmindex::cli::{Cli, Commands, ConfigAction};
use mmindex::config::Config;
use mmindex::embedding::{ClipProvider, EmbeddingProvider, FastEmbedProvider, VisualProvider};
use mmindex::error::{MmIndexError, Result};
use mmindex::index::{HnswParams, IndexKind, IndexSettings};
use mmindex::ingest::{DocumentIngestor, DocumentInput};
use mmindex::retrieval::{
    FieldBoosts, Lexicon, RelevanceReranker, RerankConfig, SearchMode, SearchQuery, SmartSearcher,
};
use mmindex::tenants::TenantRegistry;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Ingest {
            client,
            file,
            update,
            visual,
        } => cmd_ingest(cli.config, &client, &file, update, visual),
        Commands::Search {
            client,
            query,
            limit,
            mode,
            min_score,
            filter,
            json,
        } => cmd_search(
            cli.config, &client, &query, limit, &mode, min_score, &filter, json,
        ),
        Commands::Stats { client, json } => cmd_stats(cli.config, &client, json),
        Commands::Remove {
            client,
            source_file,
        } => cmd_remove(cli.config, &client, &source_file),
        Commands::Clear { client, yes } => cmd_clear(cli.config, &client, yes),
        Commands::Config { action } => cmd_config(cli.config, action),
    }
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_filter = if verbose { "mmindex=debug" } else { "mmindex=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn load_config(config_path: Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };

    if path.exists() {
        Config::load(&path)
    } else {
        tracing::warn!(
            "Config file not found, using defaults. Run 'mmindex config init' to create one."
        );
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

fn build_registry(config: &Config, visual: bool) -> Result<TenantRegistry> {
    let clients_dir = expand_path(&config.storage.clients_dir)?;
    Ok(TenantRegistry::new(
        clients_dir,
        index_settings(config, visual),
        config.cache.capacity,
        config.cache.ttl_minutes,
    ))
}

fn index_settings(config: &Config, enable_visual_search: bool) -> IndexSettings {
    IndexSettings {
        model_name: config.embedding.text_model.clone(),
        kind: IndexKind::from_str(&config.index.kind).unwrap_or(IndexKind::Flat),
        enable_visual_search,
        text_dimension: config.embedding.text_dimension,
        visual_dimension: config.embedding.visual_dimension,
        hnsw_params: HnswParams {
            ef_construction: config.index.hnsw_ef_construction,
            m: config.index.hnsw_m,
            ef_search: config.index.hnsw_ef_search,
        },
    }
}

fn load_lexicon(config: &Config) -> Result<Lexicon> {
    match &config.retrieval.lexicon_file {
        Some(path) => Lexicon::load(&expand_path(path)?),
        None => Ok(Lexicon::default()),
    }
}

fn build_reranker(config: &Config) -> Result<RelevanceReranker> {
    let rerank_config = RerankConfig {
        semantic_weight: config.retrieval.semantic_weight,
        keyword_weight: config.retrieval.keyword_weight,
        intent_weight: 0.3,
        min_score_threshold: config.retrieval.min_score_threshold,
        boosts: FieldBoosts {
            title: config.retrieval.title_boost,
            description: config.retrieval.description_boost,
            category: config.retrieval.category_boost,
        },
    };
    RelevanceReranker::new(rerank_config, load_lexicon(config)?)
        .map_err(|e| MmIndexError::Config(e.to_string()))
}

fn text_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider = FastEmbedProvider::new(&config.embedding.text_model)
        .map_err(|e| MmIndexError::Embedding(e.to_string()))?;
    Ok(Arc::new(provider))
}

fn visual_provider() -> Result<Arc<dyn VisualProvider>> {
    let provider = ClipProvider::new().map_err(|e| MmIndexError::Embedding(e.to_string()))?;
    Ok(Arc::new(provider))
}

/// Document shape accepted in ingestion JSON files
#[derive(serde::Deserialize)]
struct JsonDocument {
    source_file: String,
    text: String,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    image_path: Option<PathBuf>,
}

fn cmd_ingest(
    config_path: Option<PathBuf>,
    client: &str,
    file: &Path,
    update: bool,
    visual: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, visual)?;

    let raw = std::fs::read(file).map_err(|source| MmIndexError::Io {
        source,
        context: format!("reading {}", file.display()),
    })?;
    let json_documents: Vec<JsonDocument> =
        serde_json::from_slice(&raw).map_err(|source| MmIndexError::Json {
            source,
            context: format!("parsing {}", file.display()),
        })?;
    let documents: Vec<DocumentInput> = json_documents
        .into_iter()
        .map(|doc| DocumentInput {
            source_file: doc.source_file,
            text: doc.text,
            metadata: doc.metadata,
            image_path: doc.image_path,
        })
        .collect();

    let needs_visual = documents.iter().any(|doc| doc.image_path.is_some());
    let ingestor = DocumentIngestor::new(
        DocumentChunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap),
        text_provider(&config)?,
        if needs_visual && visual {
            Some(visual_provider()?)
        } else {
            None
        },
    );

    let handle = registry.get_or_create(client)?;
    let report = {
        let mut manager = handle
            .write()
            .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;
        ingestor.ingest(&mut manager, &documents, update)
    };
    registry.save(client)?;

    println!("Ingestion finished for tenant '{}'", client);
    println!("  Documents: {}", report.total_documents);
    println!("  Indexed chunks: {}", report.indexed);
    println!("  Skipped: {}", report.skipped);
    if !report.errors.is_empty() {
        println!("  Errors:");
        for (source_file, message) in &report.errors {
            println!("    {}: {}", source_file, message);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    config_path: Option<PathBuf>,
    client: &str,
    query: &str,
    limit: usize,
    mode: &str,
    min_score: f32,
    filters: &[String],
    json: bool,
) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, false)?;

    if !registry.tenant_known(client) {
        return Err(MmIndexError::Config(format!(
            "Unknown tenant: {}",
            client
        )));
    }

    let search_mode = match mode {
        "visual" => SearchMode::VisualDescription,
        "combined" => SearchMode::Combined,
        _ => SearchMode::Text,
    };

    let handle = registry.get_or_create(client)?;
    let manager = handle
        .read()
        .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;

    let needs_visual = search_mode != SearchMode::Text && manager.is_multimodal();
    let searcher = SmartSearcher::new(
        text_provider(&config)?,
        if needs_visual {
            Some(visual_provider()?)
        } else {
            None
        },
        build_reranker(&config)?,
        config.retrieval.text_weight,
    );

    let search_query = SearchQuery {
        query: query.to_string(),
        limit,
        mode: search_mode,
        min_score,
        filters: parse_filters(filters)?,
    };

    let results = searcher.search(&manager, &search_query)?;

    if json {
        let hits: Vec<&mmindex::index::SearchHit> = results.iter().map(|r| &r.hit).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&hits).map_err(|source| MmIndexError::Json {
                source,
                context: "serializing results".to_string(),
            })?
        );
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for '{}'", query);
        return Ok(());
    }

    for (i, ranked) in results.iter().enumerate() {
        let search_type = format!("{:?}", ranked.hit.search_type).to_lowercase();
        println!(
            "{}. [{:.3}] {} ({})",
            i + 1,
            ranked.combined_score,
            ranked.hit.source_file,
            search_type,
        );
        let preview: String = ranked.hit.text.chars().take(160).collect();
        println!("   {}", preview);
    }
    Ok(())
}

fn parse_filters(filters: &[String]) -> Result<HashMap<String, serde_json::Value>> {
    let mut parsed = HashMap::new();
    for filter in filters {
        let Some((key, value)) = filter.split_once('=') else {
            return Err(MmIndexError::Config(format!(
                "Invalid filter '{}', expected key=value",
                filter
            )));
        };
        // Values that parse as JSON keep their type, anything else is a string
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        parsed.insert(key.to_string(), value);
    }
    Ok(parsed)
}

fn cmd_stats(config_path: Option<PathBuf>, client: &str, json: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, false)?;

    if !registry.tenant_known(client) {
        return Err(MmIndexError::Config(format!(
            "Unknown tenant: {}",
            client
        )));
    }

    let handle = registry.get_or_create(client)?;
    let manager = handle
        .read()
        .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;
    let stats = manager.statistics();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).map_err(|source| MmIndexError::Json {
                source,
                context: "serializing statistics".to_string(),
            })?
        );
        return Ok(());
    }

    println!("Tenant: {}", stats.client_id);
    println!("Status: {}", stats.status);
    println!("Chunks: {} ({} multimodal)", stats.total_chunks, stats.multimodal_chunks);
    println!(
        "Vectors: {} text / {} visual",
        stats.text_vectors, stats.visual_vectors
    );
    println!("Visual content ratio: {:.1}%", stats.visual_content_ratio * 100.0);
    if !stats.sources_distribution.is_empty() {
        println!("Sources:");
        for (source, count) in &stats.sources_distribution {
            println!("  {} ({} chunks)", source, count);
        }
    }
    Ok(())
}

fn cmd_remove(config_path: Option<PathBuf>, client: &str, source_file: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, false)?;

    let handle = registry.get_or_create(client)?;
    let removed = {
        let mut manager = handle
            .write()
            .map_err(|_| MmIndexError::Config("Tenant lock poisoned".to_string()))?;
        let chunk_ids: Vec<String> = manager
            .get_chunks_by_source(source_file)
            .into_iter()
            .map(|record| record.chunk_id)
            .collect();
        manager.remove_chunks(&chunk_ids)?
    };
    registry.save(client)?;

    if removed == 0 {
        println!("No chunks found for '{}'", source_file);
    } else {
        println!("Removed {} chunks of '{}'", removed, source_file);
    }
    Ok(())
}

fn cmd_clear(config_path: Option<PathBuf>, client: &str, yes: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let registry = build_registry(&config, false)?;

    if !yes {
        println!(
            "This permanently deletes all indexed data for tenant '{}'. Continue? [y/N]",
            client
        );
        let mut answer = String::new();
        std::io::stdin()
            .read_line(&mut answer)
            .map_err(|source| MmIndexError::Io {
                source,
                context: "reading confirmation".to_string(),
            })?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    registry.remove_tenant(client)?;
    println!("Tenant '{}' cleared", client);
    Ok(())
}

fn cmd_config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = load_config(config_path)?;
            let json =
                serde_json::to_string_pretty(&config).map_err(|source| MmIndexError::Json {
                    source,
                    context: "serializing config".to_string(),
                })?;
            println!("{}", json);
        }
        ConfigAction::Validate { file } => {
            let path = match file {
                Some(path) => path,
                None => Config::default_path()?,
            };
            let config = Config::load(&path)?;
            println!("✓ Configuration is valid");
            println!("  Schema version: {}", config.meta.schema_version);
        }
        ConfigAction::Init { force } => {
            let path = Config::default_path()?;

            if path.exists() && !force {
                println!("Configuration file already exists at: {}", path.display());
                println!("Use --force to overwrite");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|source| MmIndexError::Io {
                    source,
                    context: format!("creating config directory {:?}", parent),
                })?;
            }

            let config = Config::default();
            config.save(&path)?;
            println!("✓ Configuration initialized at: {}", path.display());
        }
    }
    Ok(())
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| MmIndexError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| MmIndexError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
