use report_digest::error::CommandError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("report_digest=info".parse()?))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = report_digest::run().await {
        match err.downcast_ref::<CommandError>() {
            Some(command_error) => {
                eprintln!("{}", serde_json::to_string_pretty(&command_error.to_response())?);
            }
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}
