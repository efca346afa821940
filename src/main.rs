use googlespreadsheets_provider::{init_logging, serve, GoogleSpreadsheetsProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    serve(GoogleSpreadsheetsProvider::new()).await
}
