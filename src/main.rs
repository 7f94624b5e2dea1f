// Third Party
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

// Local
use kube_pod_logger::{
    utils::{init_kube_client, init_tracing, kubeconfig_path, panic_message, setup_exit_hooks},
    PodLogger,
};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    init_tracing(&["kube_pod_logger", "pod_logger"], tracing::Level::INFO);
    let stop = CancellationToken::new();
    setup_exit_hooks(stop.clone())?;
    let client = init_kube_client(kubeconfig_path()).await?;
    let pod_logger = PodLogger::new(&client);

    // Run the watch on its own task so that a panic inside it can be reported here
    let watch = tokio::spawn(async move { pod_logger.watch_pods(stop).await });
    match watch.await {
        Ok(()) => info!("Pod logger stopped"),
        Err(error) if error.is_panic() => {
            error!("Recovered from panic: {}", panic_message(error.into_panic().as_ref()));
        }
        Err(error) => error!("Pod watch task failed: {}", error),
    }
    Ok(())
}
