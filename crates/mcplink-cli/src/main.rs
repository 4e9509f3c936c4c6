#[tokio::main]
async fn main() {
    // The error and its suggestions were already printed
    if mcplink_cli::run().await.is_err() {
        std::process::exit(1);
    }
}
