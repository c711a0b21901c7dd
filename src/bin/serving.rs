use std::sync::Arc;

use actix_web::http::header;
use actix_web::{http::ContentEncoding, middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use actix_web_prom::PrometheusMetrics;
use anyhow::Context;
use tracing::info;

use folio::artifacts::{ArtifactPaths, ArtifactStore};
use folio::config::AppConfig;
use folio::context::ServingContext;
use folio::endpoints::catalog_resource::v1_catalog;
use folio::endpoints::index_resource::internal;
use folio::endpoints::recommend_resource::v1_recommend;
use folio::logging;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).unwrap_or_default();
    let config = AppConfig::new(&config_path)?;
    logging::init(&config.log.level);

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let qty_workers = config.server.num_workers;

    // Without every artifact there is nothing to serve, so a load failure ends the process.
    let paths = ArtifactPaths::from_config(&config.artifacts);
    let store = Arc::new(ArtifactStore::load(&paths).context("loading artifacts failed")?);
    let serving_context = ServingContext::new(store, config.recommend.clone(), qty_workers);

    let prometheus = PrometheusMetrics::new("api", Some("/internal/prometheus"), None);

    info!("start httpd at http://{}", &bind_address);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Compress::new(ContentEncoding::Identity))
            .wrap(prometheus.clone())
            .wrap(
                middleware::DefaultHeaders::new()
                    .header("Cache-Control", "no-cache, no-store, must-revalidate")
                    .header("Pragma", "no-cache")
                    .header("Expires", "0"),
            )
            .data(serving_context.clone())
            .service(v1_recommend)
            .service(v1_catalog)
            .service(internal)
            .service(web::resource("/").route(web::get().to(|_req: HttpRequest| {
                HttpResponse::Found()
                    .header(header::LOCATION, "/internal")
                    .finish()
            })))
    })
    .workers(qty_workers)
    .bind(&bind_address)
    .with_context(|| format!("could not bind server to address {}", &bind_address))?
    .run()
    .await?;

    Ok(())
}
