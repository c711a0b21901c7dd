use actix_web::{get, web, HttpResponse};
use chrono::Utc;
use num_format::{Locale, ToFormattedString};

use crate::context::ServingContext;
use web::Data;

fn year_or_dash(year: Option<i32>) -> String {
    year.map(|year| year.to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[get("/internal")]
pub async fn internal(data: Data<ServingContext>) -> HttpResponse {
    let stats = data.store.stats();
    let settings = &data.recommend;

    let mut html = "<html>folio: item based book recommendations.<br />".to_string();

    html.push_str("<h3>Catalog</h3>");
    html.push_str("Loaded: ");
    html.push_str(&stats.descriptive_name);
    html.push_str("<br />Qty items in table: ");
    html.push_str(&stats.qty_items_in_table.to_formatted_string(&Locale::en));
    html.push_str("<br />Qty items known to the model: ");
    html.push_str(&stats.qty_known_items.to_formatted_string(&Locale::en));
    html.push_str("<br />Qty model items without table row: ");
    html.push_str(&stats.qty_classes_without_row.to_formatted_string(&Locale::en));
    html.push_str("<br />Qty selectable titles: ");
    html.push_str(&stats.qty_distinct_titles.to_formatted_string(&Locale::en));
    html.push_str("<br />Publication years: ");
    html.push_str(&year_or_dash(stats.min_year));
    html.push_str(" - ");
    html.push_str(&year_or_dash(stats.max_year));

    html.push_str("<h3>Model</h3>");
    html.push_str("Metric: ");
    html.push_str(&stats.metric.to_string());
    html.push_str("<br />Qty users: ");
    html.push_str(&stats.qty_users.to_formatted_string(&Locale::en));
    html.push_str("<br />Qty interactions: ");
    html.push_str(&stats.qty_interactions.to_formatted_string(&Locale::en));
    html.push_str("<br />Loaded at: ");
    html.push_str(&stats.loaded_at.to_rfc3339());
    html.push_str(" (");
    html.push_str(&(Utc::now() - stats.loaded_at).num_hours().to_string());
    html.push_str(" hours ago, took ");
    html.push_str(&stats.load_duration_millis.to_string());
    html.push_str(" ms)");

    html.push_str("<h3>Recommendations</h3>");
    html.push_str("Default qty: ");
    html.push_str(&settings.default_count.to_string());
    html.push_str("<br />Max qty: ");
    html.push_str(&settings.max_count.to_string());
    html.push_str("<br />Self match removal: ");
    html.push_str(&format!("{:?}", settings.self_match));
    html.push_str("<br /><a href=\"/v1/catalog\">v1 catalog</a>");

    html.push_str("<h3>Machine instance</h3>");
    html.push_str("Qty CPU's detected: ");
    html.push_str(&sys_info::cpu_num().unwrap_or(0).to_string());
    html.push_str("<br />Qty actix workers set: ");
    html.push_str(&data.qty_workers.to_string());
    html.push_str("<br />CPU speed: ");
    html.push_str(&sys_info::cpu_speed().unwrap_or(0).to_string());
    html.push_str("MHz");
    html.push_str("<h3>Metrics</h3>");
    html.push_str("<a href=\"/internal/prometheus\">prometheus</a>");
    html.push_str("</html>");

    HttpResponse::Ok().body(html)
}
