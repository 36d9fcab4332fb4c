use std::sync::Arc;

use ask_limit::EligibilityStatus;
use ask_limit::GateConfig;
use tower::BoxError;
use tower::Service;
use tower::ServiceBuilder;
use tower::ServiceExt;
use tower::service_fn;
use tower_ask::AskLayer;
use tower_ask::ChannelAnalytics;
use tower_ask::RatingCoordinator;
use tower_ask::StaticVersion;
use tower_ask::UserDecision;

const CONFIG: &str = r#"
native_prompt_min_stars = 4

[requirement]
min_account_age_days = 0
min_launches = 3
min_qualifying_actions = 1
cooldown_days = 30
"#;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt::init();

    // 1. Setup Coordinator
    let config = GateConfig::from_toml_str(CONFIG)?;
    let (analytics, mut events) = ChannelAnalytics::new();
    let coordinator = Arc::new(
        RatingCoordinator::from_config(&config, StaticVersion::new("2.1.0"))?
            .with_analytics(analytics)
            .with_prompt_trigger(|| println!("⭐ native review prompt")),
    );

    // 2. Setup the presenter: our "user" always picks five stars
    let presenter = service_fn(|status: EligibilityStatus| async move {
        println!("asking after {} launches", status.launch_count);
        Ok::<_, BoxError>(UserDecision::StarsSelected(5))
    });
    let mut ask = ServiceBuilder::new()
        .layer(AskLayer::new(Arc::clone(&coordinator)))
        .service(presenter);

    // 3. Launch the app a few times, asking on every launch
    for _ in 0..5 {
        coordinator.record_launch();
        coordinator.record_activation();

        let status = ask.ready().await?.call(()).await?;
        match status.decision() {
            std::ops::ControlFlow::Continue(()) => println!("asked"),
            std::ops::ControlFlow::Break(reasons) => println!("not asked: {reasons:?}"),
        }
    }

    while let Ok(event) = events.try_recv() {
        println!("event: {event}");
    }
    Ok(())
}
