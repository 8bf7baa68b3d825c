//! Submit a wish through the proxy and print progress until it resolves.
//!
//! Press Ctrl+C once to cancel the wish; the backend is told to stop too.
//!
//! ```sh
//! cargo run --example grant_wish -- "status of the web servers"
//! ```

use shenron_client::{
    PollConfig, ShenronClient, ShenronError, WishEvent, WishOutcome, WishRequest, WishSession,
};

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let query = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "status of the web servers".to_string());
    let endpoint = std::env::var("SHENRON_ENDPOINT")
        .unwrap_or_else(|_| "http://127.0.0.1:8080/api.php".to_string());

    let client = ShenronClient::new(endpoint);
    let session = WishSession::new();

    let cancel = session.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let request = WishRequest::auto(query);
    println!("Power mode: {}", request.power_mode);

    let result = client
        .grant_wish(&session, &request, &PollConfig::default(), |event| match event {
            WishEvent::Queued { job_id, .. } => println!("Queued: {}", job_id),
            WishEvent::Progress(p) => println!("  {:>5.1}%  {}  ({})", p.percent, p.message, p.meta),
            WishEvent::Log { event, .. } => println!("  [{:?}] {}", event.kind, event.message),
            _ => {}
        })
        .await;

    match result {
        Ok(WishOutcome::Granted { result }) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Ok(WishOutcome::ActionRequired { pending_actions, .. }) => {
            println!("Follow-up required:");
            for (i, action) in pending_actions.iter().enumerate() {
                let source = action.get("source").and_then(|v| v.as_str()).unwrap_or("Warrior");
                let summary = action
                    .get("summary")
                    .and_then(|v| v.as_str())
                    .unwrap_or("Follow-up required");
                println!("  {}. {}: {}", i + 1, source, summary);
            }
        }
        Err(ShenronError::Cancelled) => eprintln!("Wish cancelled. No actions executed."),
        Err(e) => eprintln!("The summoning has failed: {}", e),
    }

    Ok(())
}
