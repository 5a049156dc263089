use pacer_load::{BoxError, InvocationId, PacedDispatcher, StepPlan};
use std::error::Error;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:8080/".to_string());
    let plan = StepPlan::new(vec![5, 10, 20]);
    let http = reqwest::Client::new();

    println!("🚀 Firing {} requests in {} steps at {}", plan.total(), plan.len(), target);

    let dispatcher = PacedDispatcher::new().with_step_interval(Duration::from_millis(500));
    let report = dispatcher
        .run(&plan, move |_id: InvocationId, _cancel: CancellationToken| {
            let request = http.get(target.as_str()).send();
            async move {
                let response = request.await?;
                Ok::<_, BoxError>(response.status().as_u16())
            }
        })
        .await;

    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(status) => println!("[{}] ✅ {} in {:?}", outcome.id, status, outcome.elapsed),
            Err(failure) => println!("[{}] ❌ {}", outcome.id, failure),
        }
    }

    println!(
        "\n✨ Done: {} ok, {} failed in {:?}",
        report.success_count(),
        report.failure_count(),
        report.elapsed
    );
    Ok(())
}
