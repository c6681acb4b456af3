//! Query command handler.
//!
//! One-shot question answering against the persisted vector store.

use clap::Args;
use incidex_core::config::AppConfig;
use incidex_retrieval::{QueryRequest, QueryService};

/// Answer one question from the vector store
#[derive(Args, Debug)]
pub struct QueryCommand {
    /// The question to answer
    pub question: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long, default_value = "5", allow_negative_numbers = true)]
    pub num_chunks: i64,

    /// Print the retrieved chunks after the answer
    #[arg(long)]
    pub show_chunks: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl QueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        tracing::info!("Executing query command");

        let service = QueryService::from_config(config)?;
        let request = QueryRequest::new(self.question.clone()).with_num_chunks(self.num_chunks);

        let response = service.query(request).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        println!("{}", response.answer);
        println!();
        println!(
            "({} chunks retrieved in {:.0} ms)",
            response.num_chunks_retrieved, response.processing_time_ms
        );

        if self.show_chunks {
            for (i, chunk) in response.relevant_chunks.iter().enumerate() {
                println!();
                println!(
                    "--- [{}] record {} / part {} ---",
                    i + 1,
                    chunk.metadata.source_record_id,
                    chunk.metadata.sequence_index
                );
                println!("{}", chunk.text.trim_end());
            }
        }

        Ok(())
    }
}
