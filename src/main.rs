#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    mira_server::run().await
}
