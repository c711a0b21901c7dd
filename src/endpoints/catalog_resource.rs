use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::context::ServingContext;
use crate::endpoints::year_window;
use crate::io::Year;

#[derive(Debug, Deserialize)]
pub struct V1CatalogParams {
    min_year: Option<Year>,
    max_year: Option<Year>,
}

/// Year bounds always describe the whole catalog, so a year slider keeps its
/// range; `titles` only lists what falls inside the requested window.
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogResponse {
    pub min_year: Option<Year>,
    pub max_year: Option<Year>,
    pub titles: Vec<String>,
}

#[get("/v1/catalog")]
pub async fn v1_catalog(
    data: web::Data<ServingContext>,
    query: web::Query<V1CatalogParams>,
) -> HttpResponse {
    let catalog = data.store.catalog();
    let (min_year, max_year) = match catalog.year_bounds() {
        Some((lo, hi)) => (Some(lo), Some(hi)),
        None => (None, None),
    };
    let titles = year_window(catalog, query.min_year, query.max_year)
        .selectable_titles()
        .into_iter()
        .map(str::to_string)
        .collect();

    HttpResponse::Ok().json(CatalogResponse {
        min_year,
        max_year,
        titles,
    })
}
