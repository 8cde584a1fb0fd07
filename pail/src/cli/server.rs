pub async fn run() {
    if let Err(e) = server::run().await {
        eprintln!("server failed to start: {e}");
        std::process::exit(1);
    }
}
