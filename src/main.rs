#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    procurement_report_server::run().await
}
