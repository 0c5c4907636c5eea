use marvin_http::MarvinClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let marvin = MarvinClient::from_env()?;

    if !marvin.test_credentials().await? {
        anyhow::bail!("MARVIN_API_TOKEN was rejected");
    }

    for task in marvin.today_items(None).await? {
        let mark = if task.done { "x" } else { " " };
        println!("[{mark}] {} ({})", task.title, task.id);
    }

    Ok(())
}
