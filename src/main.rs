use spa_backend::configuration::get_configuration;
use spa_backend::startup::Application;
use spa_backend::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("spa_backend".into(), "info".into(), std::io::stdout);
    init_subscriber(subscriber);

    let settings = get_configuration()?;
    let application = Application::build(&settings)?;
    application.serve().await?;

    Ok(())
}
