#[macro_use]
extern crate rocket;

mod api;
mod config;
mod models;
mod services;
mod utils;

use crate::config::ScraperSettings;
use crate::services::platform::VideoPlatform;
use rocket::serde::json::{json, Json, Value};
use rocket::{Build, Rocket};
use std::sync::Arc;

pub struct AppState {
    pub platform: Arc<dyn VideoPlatform>,
    pub settings: ScraperSettings,
}

#[get("/health")]
fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_rocket(state: AppState) -> Rocket<Build> {
    rocket::build()
        .manage(state)
        .mount("/", routes![health])
        .mount(
            "/api",
            routes![api::stream_comments, api::download_comments],
        )
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    config::load_environment();
    config::init_logger();

    let state = config::create_app_state()?;
    let cors = config::create_cors()?;

    let _rocket = build_rocket(state).attach(cors).launch().await?;
    Ok(())
}
