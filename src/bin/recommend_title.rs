use anyhow::{bail, Context};

use folio::artifacts::{ArtifactPaths, ArtifactStore};
use folio::config::AppConfig;
use folio::error::{RecommendError, NO_RECOMMENDATIONS};
use folio::logging;

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_default();
    let title = match args.next() {
        Some(title) => title,
        None => bail!("usage: recommend_title <config-path> <title> [n]"),
    };
    let requested = match args.next() {
        Some(raw) => Some(
            raw.parse::<usize>()
                .with_context(|| format!("invalid recommendation count {:?}", raw))?,
        ),
        None => None,
    };

    let config = AppConfig::new(&config_path)?;
    logging::init(&config.log.level);

    let paths = ArtifactPaths::from_config(&config.artifacts);
    let store = ArtifactStore::load(&paths).context("loading artifacts failed")?;
    let catalog = store.catalog();
    let n = config.recommend.effective_count(requested);

    match store.recommend(&title, n, &catalog, config.recommend.self_match) {
        Ok(recommendations) if recommendations.is_empty() => println!("{}", NO_RECOMMENDATIONS),
        Ok(recommendations) => {
            println!("Recommendations for {:?}", title);
            for scored in recommendations {
                println!(
                    "{:>7.2}%  {}  {}  {}",
                    scored.match_percent(),
                    scored.item.year,
                    scored.item.key,
                    scored.item.title
                );
            }
        }
        Err(err @ RecommendError::UnknownKey(_)) => {
            tracing::warn!(error = %err, "catalog and encoder disagree");
            println!("{}", err.user_message());
        }
        Err(err) => bail!("{} ({})", err.user_message(), err),
    }

    Ok(())
}
