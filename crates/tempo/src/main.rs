use anyhow::Result;
use tempo_calendar::{CalendarManager, EventTime};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    tempo_core::init()?;

    let manager = CalendarManager::shared()?;

    if !manager.is_signed_in() {
        println!("No Google session found. Opening browser to sign in...");
        manager.sign_in().await?;
        println!("Signed in.");
    }

    tracing::info!("Tempo started");

    let events = manager.fetch_events().await?;

    if events.is_empty() {
        println!("No upcoming events.");
        return Ok(());
    }

    println!("Upcoming events:");
    for event in &events {
        let when = match &event.start {
            EventTime::Date(date) => format!("{} (all day)", date),
            EventTime::DateTime(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        };
        println!("  {}  {}", when, event.summary);
    }

    Ok(())
}
