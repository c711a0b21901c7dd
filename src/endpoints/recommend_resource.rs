use actix_web::{get, web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::ServingContext;
use crate::endpoints::year_window;
use crate::error::{RecommendError, NO_RECOMMENDATIONS};
use crate::io::Year;
use crate::knn::BookCard;

#[derive(Debug, Deserialize)]
pub struct V1RecommendParams {
    title: String,
    n: Option<usize>,
    min_year: Option<Year>,
    max_year: Option<Year>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub title: String,
    pub recommendations: Vec<BookCard>,
    pub warning: Option<String>,
}

impl RecommendResponse {
    fn warning(title: &str, message: &str) -> Self {
        RecommendResponse {
            title: title.to_string(),
            recommendations: Vec::new(),
            warning: Some(message.to_string()),
        }
    }
}

// Per-request failures never escape as server errors: each one maps to a
// response carrying the message the presentation layer shows to the user.
#[get("/v1/recommend")]
pub async fn v1_recommend(
    data: web::Data<ServingContext>,
    query: web::Query<V1RecommendParams>,
) -> HttpResponse {
    let store = data.store.as_ref();
    let settings = &data.recommend;
    let catalog = year_window(store.catalog(), query.min_year, query.max_year);
    let n = settings.effective_count(query.n);

    match store.recommend(&query.title, n, &catalog, settings.self_match) {
        Ok(recommendations) if recommendations.is_empty() => {
            debug!(title = %query.title, "no recommendations");
            HttpResponse::Ok().json(RecommendResponse::warning(&query.title, NO_RECOMMENDATIONS))
        }
        Ok(recommendations) => {
            let cards = recommendations
                .iter()
                .map(|scored| scored.to_card(&settings.placeholder_image))
                .collect();
            HttpResponse::Ok().json(RecommendResponse {
                title: query.title.clone(),
                recommendations: cards,
                warning: None,
            })
        }
        Err(err @ RecommendError::UnknownTitle(_)) => {
            debug!(error = %err, "rejected recommendation request");
            HttpResponse::NotFound()
                .json(RecommendResponse::warning(&query.title, err.user_message()))
        }
        Err(err @ RecommendError::UnknownKey(_)) => {
            warn!(error = %err, "catalog and encoder disagree");
            HttpResponse::Ok().json(RecommendResponse::warning(&query.title, err.user_message()))
        }
        Err(err @ RecommendError::InvalidCount) => {
            HttpResponse::BadRequest()
                .json(RecommendResponse::warning(&query.title, err.user_message()))
        }
    }
}
