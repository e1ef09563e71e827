//! Sends a couple of sample notices through the configured channels.

use watchdog_agent::notify::{NotifierMux, UpdateNotice};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let mux = NotifierMux::from_env();
    if mux.is_empty() {
        println!("no notification channels enabled");
        return;
    }

    mux.notify_started().await;

    let samples = [
        ("Fedora Release", "Fedora 44 beta announced, release slipped to March", Some("https://fedoramagazine.org/")),
        ("Example Software", "Version 2.0 released with a new plugin API", None),
    ];
    for (topic, summary, url) in samples {
        let delivered = mux.notify_update(&UpdateNotice::new(topic, summary, url)).await;
        println!("{topic}: delivered to {delivered}/{} channels", mux.len());
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("notify-demo done");
}
