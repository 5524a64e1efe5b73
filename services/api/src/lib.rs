mod cli;
mod clients;
mod infra;
mod routes;
mod server;

use admission_ratings::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
