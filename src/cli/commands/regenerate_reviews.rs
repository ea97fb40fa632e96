use crate::config::Config;
use crate::db::Store;
use crate::services::markdown;

/// Re-renders the cached HTML for every stored review. Run after an
/// upgrade that changes the markdown pipeline.
pub async fn cmd_regenerate_reviews(config: &Config) -> anyhow::Result<()> {
    let store = Store::new(&config.general.database_path).await?;
    let sources = store.list_review_sources().await?;

    if sources.is_empty() {
        println!("No reviews to render.");
        return Ok(());
    }

    println!("Re-rendering {} review(s)...", sources.len());

    let mut updated = 0;
    for (id, review) in sources {
        let html = markdown::render(&review);
        store.update_review_html(id, &html).await?;
        updated += 1;
    }

    println!("✓ Re-rendered {updated} review(s)");

    Ok(())
}
