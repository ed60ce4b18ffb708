use anyhow::Result;
use std::sync::Arc;
use story_wizard::core::config::Config;
use story_wizard::core::io::{NativeStorage, Storage};
use story_wizard::services::cache::{LocalCache, PracticeStore};
use story_wizard::services::generation::Generator;
use story_wizard::services::llm::create_llm;
use story_wizard::services::prompts::PromptRegistry;
use story_wizard::services::repository::create_repository;
use story_wizard::services::setup::{self, session_user};
use story_wizard::services::store::StoryStore;
use story_wizard::services::workflow::WizardWorkflow;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let mut config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please ensure 'config.yml' exists with valid LLM settings.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    setup::run_setup(&mut config).await?;

    let llm = create_llm(&config.llm)?;
    let prompts = PromptRegistry::from_config(&config.prompts);
    // Surface template file errors before the menu opens.
    prompts.book()?;
    let generator = Generator::new(Arc::new(prompts), Arc::from(llm));

    let storage: Arc<dyn Storage> = Arc::new(NativeStorage::new());
    let data_folder = &config.storage.data_folder;
    let repository =
        create_repository(config.storage.remote.as_ref(), storage.clone(), data_folder);
    let store = StoryStore::load(repository, session_user(&config)).await;
    let practice = PracticeStore::open(LocalCache::new(storage, data_folder)).await;

    if store.record_id().is_some() {
        println!("저장된 이야기를 불러왔습니다: {}", store.logline());
    }

    let mut workflow = WizardWorkflow::new(generator, store, practice);
    workflow.run().await?;

    Ok(())
}
