use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::Result;
use crate::config::Config;
use crate::documents::{DocumentMetadata, Upload};
use crate::query::QueryRequest;
use crate::server::{self, AppContext};

/// Start the HTTP API, optionally overriding the configured address
#[inline]
pub async fn serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.validate()?;

    let ctx = Arc::new(AppContext::from_config(config)?);
    server::serve(ctx).await?;
    Ok(())
}

/// Index the given PDFs in a throwaway session and answer one question
#[inline]
pub async fn ask(
    config: Config,
    files: Vec<PathBuf>,
    query: String,
    top_k: Option<usize>,
    threshold: Option<f32>,
) -> Result<()> {
    let mut request = QueryRequest::new(query, &config.retrieval);
    if let Some(top_k) = top_k {
        request.top_k = top_k;
    }
    if let Some(threshold) = threshold {
        request.similarity_threshold = threshold;
    }
    request.validate()?;

    let ctx = AppContext::from_config(config)?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new(files.len() as u64).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Indexing {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    };

    let mut indexed = 0_usize;
    for path in &files {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        bar.set_message(filename.clone());

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let upload = Upload {
            filename: filename.clone(),
            content_type: None,
            bytes,
        };

        match ctx.documents.upload(upload, DocumentMetadata::default()).await {
            Ok(document) => {
                indexed += 1;
                info!(
                    "Indexed {} ({} chunks)",
                    filename,
                    document.chunk_count.unwrap_or(0)
                );
            }
            Err(e) => {
                warn!("Skipping {}: {}", filename, e);
                bar.suspend(|| {
                    eprintln!("{} {}: {}", style("⚠ Skipped").yellow(), filename, e);
                });
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    if indexed == 0 {
        eprintln!("{}", style("No documents could be indexed.").red());
    }

    let response = ctx.queries.query(request).await?;
    ctx.documents.cleanup_temp_files().await;

    println!("{}", response.answer);
    println!();
    println!(
        "Confidence: {:.2} ({} sources, {:.3}s)",
        response.confidence,
        response.sources.len(),
        response.processing_time
    );
    for (i, source) in response.sources.iter().enumerate() {
        let page = source
            .page_number
            .map_or_else(|| "N/A".to_string(), |p| p.to_string());
        println!(
            "  [{}] {} page {} chunk {} (score {:.3})",
            i + 1,
            style(&source.document_title).cyan(),
            page,
            source.chunk_index,
            source.similarity_score
        );
    }

    Ok(())
}
