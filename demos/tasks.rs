use marvin_http::{ClientOptions, MarvinClient, MarvinError, NewTask};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let marvin = MarvinClient::from_env()?.with_options(ClientOptions {
        timeout_ms: 10_000,
        max_retries: 5,
        retry_backoff_ms: 500,
    })?;

    let title = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "Try marvin-http".to_owned());
    let task = marvin.add_task(&NewTask::new(title).estimate_ms(15 * 60 * 1_000)).await?;
    println!("added {} ({})", task.title, task.id);

    match marvin.mark_done(&task.id, 0).await {
        Ok(done) => println!("completed {}", done.id),
        Err(MarvinError::Api(err)) if err.is_client_error() => {
            eprintln!("{} rejected by {} {}: {err}", task.id, err.method(), err.endpoint());
        }
        Err(err) => return Err(err.into()),
    }

    Ok(())
}
