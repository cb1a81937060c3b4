use std::{error::Error, sync::Arc};

use ai_llm_service::{
    LlmServiceProfiles,
    config::default_config::{config_embedding_from_env, config_generation_from_env},
};
use api::AppState;
use contextor::{AnswerPipeline, ContextorConfig};
use rag_store::RagConfig;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // A missing .env is fine; a malformed one is not.
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(e) if e.not_found() => {}
        Err(e) => return Err(e.into()),
    }

    ai_llm_service::telemetry::init();

    let generation = config_generation_from_env()?;
    let embedding = config_embedding_from_env()?;
    let llm = Arc::new(LlmServiceProfiles::new(generation, embedding, Some(10))?);

    let rag_cfg = RagConfig::from_env()?;
    let cfg = ContextorConfig::from_env()?;
    let pipeline = AnswerPipeline::from_services(llm.clone(), &rag_cfg, &cfg)?;
    info!(?pipeline, "pipeline ready");

    for status in llm.health_all().await {
        if !status.ok {
            warn!(provider = %status.provider, endpoint = %status.endpoint, message = %status.message, "llm backend not ready");
        }
    }

    api::start(AppState::new(Arc::new(pipeline), Some(llm))).await?;
    Ok(())
}
