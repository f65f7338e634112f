// Runs one search from a results-page URL against the configured backend

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use reqwest::Url;
use stay_search::booking::OfferIdAndQuantity;
use stay_search::results::visible_results;
use stay_search::search_params::{parse_from_query, query_from_url};
use stay_search::{
    resolve_mode, AppStore, ClientConfig, FetchOutcome, HttpApiClient, MapLocator, SearchSession,
};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_logger() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(env_filter)
        .try_init()?;

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;

    let Some(raw_url) = std::env::args().nth(1) else {
        bail!("usage: stay-search <search-url>");
    };
    let url = Url::parse(&raw_url).with_context(|| format!("invalid url {raw_url:?}"))?;
    let Some(params) = parse_from_query(&query_from_url(&url)) else {
        bail!("Fill in your destination, dates and the amount of rooms/guests.");
    };

    let config = ClientConfig::from_env()?;
    let client = Arc::new(HttpApiClient::new(config.clone())?);
    let store = Arc::new(AppStore::default());
    let locator = MapLocator::new(Arc::clone(&client), &config);
    let session = SearchSession::new(Arc::clone(&store), Arc::clone(&client), &config);

    let (center, outcome) =
        futures::future::join(locator.locate(&params.location), session.load_url(&url)).await;

    match center {
        Ok(center) => info!("Map center: {}, {}", center.lat, center.lon),
        Err(e) => warn!("{}", e),
    }

    match outcome {
        Some(FetchOutcome::Applied) => {}
        Some(FetchOutcome::Failed(e)) => return Err(e).context("search failed"),
        Some(FetchOutcome::Stale) | None => bail!("no results loaded"),
    }

    let results = session.results().unwrap_or_default();
    let facilities = visible_results(Some(&results), session.is_fetching());
    println!(
        "{} accommodations in {} for {} nights",
        facilities.len(),
        params.location,
        params.nights()
    );

    for facility in facilities {
        let Some(offer) = results.cheapest_offer(&facility.id) else {
            println!("  {:<40} no offers", facility.name);
            continue;
        };
        let selection = [OfferIdAndQuantity::new(offer.id.clone(), params.room_count)];
        let mode = resolve_mode(Some(&selection[..]), config.group_room_threshold);
        let price = offer
            .price
            .as_ref()
            .map(|p| format!("{:.2} {}", p.amount, p.currency))
            .unwrap_or_default();
        println!("  {:<40} {:>14}  {:?}", facility.name, price, mode);
    }

    Ok(())
}
