// System
use std::any::Any;
use std::env;
use std::path::PathBuf;
use std::thread;

// Third Party
use anyhow::Context;
use dirs::home_dir;
use kube::{
    config::{KubeConfigOptions, Kubeconfig},
    Client, Config,
};
use signal_hook::{
    consts::{SIGINT, SIGTERM},
    iterator::Signals,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub const KUBECONFIG: &str = "KUBECONFIG";

/// Log to stderr so that stdout carries only pod records.
/// `RUST_LOG` overrides the default of `level` for each of `targets`.
pub fn init_tracing(targets: &[&str], level: tracing::Level) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = level.to_string().to_lowercase();
        let directives: Vec<String> = targets
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect();
        EnvFilter::new(directives.join(","))
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancel `stop` on the first SIGINT or SIGTERM.
pub fn setup_exit_hooks(stop: CancellationToken) -> Result<(), anyhow::Error> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to register signal handlers")?;
    thread::spawn(move || {
        if let Some(signal) = signals.forever().next() {
            info!("Received signal {}, stopping...", signal);
            stop.cancel();
        }
    });
    Ok(())
}

/// Kubeconfig path from `KUBECONFIG`, falling back to `$HOME/.kube/config`.
pub fn kubeconfig_path() -> Option<PathBuf> {
    match env::var_os(KUBECONFIG).filter(|path| !path.is_empty()) {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            info!("KUBECONFIG environment variable is not set. Using default kubeconfig.");
            default_kubeconfig_path()
        }
    }
}

fn default_kubeconfig_path() -> Option<PathBuf> {
    home_dir().map(|home| home.join(".kube").join("config"))
}

/// Build a client from the kubeconfig at `kubeconfig`, or from the inferred configuration
/// (in-cluster service account or default kubeconfig) when no path is known.
pub async fn init_kube_client(kubeconfig: Option<PathBuf>) -> Result<Client, anyhow::Error> {
    let client = match kubeconfig {
        Some(kubeconfig_path) => {
            let kubeconfig = Kubeconfig::read_from(&kubeconfig_path).with_context(|| {
                format!(
                    "Failed to read kubeconfig file: {}",
                    kubeconfig_path.display()
                )
            })?;
            let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .with_context(|| {
                    format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    )
                })?;
            Client::try_from(config).context("Failed to create Kubernetes client")?
        }
        None => {
            warn!("No kubeconfig path could be resolved, inferring client configuration");
            Client::try_default()
                .await
                .context("Failed to create Kubernetes client")?
        }
    };
    Ok(client)
}

/// Text of a panic payload, as produced by `panic!` with a literal or a formatted message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    // System
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    // Third Party
    use serial_test::serial;

    // Local
    use super::{init_kube_client, kubeconfig_path, panic_message, KUBECONFIG};

    #[test]
    #[serial]
    fn test_kubeconfig_from_env() {
        env::set_var(KUBECONFIG, "/etc/kube/admin.conf");
        assert_eq!(
            kubeconfig_path(),
            Some(PathBuf::from("/etc/kube/admin.conf"))
        );
        env::remove_var(KUBECONFIG);
    }

    #[test]
    #[serial]
    fn test_kubeconfig_defaults_to_home() {
        let original_home = env::var_os("HOME");
        env::remove_var(KUBECONFIG);
        env::set_var("HOME", "/home/operator");
        assert_eq!(
            kubeconfig_path(),
            Some(PathBuf::from("/home/operator/.kube/config"))
        );

        // An empty value counts as unset
        env::set_var(KUBECONFIG, "");
        assert_eq!(
            kubeconfig_path(),
            Some(PathBuf::from("/home/operator/.kube/config"))
        );

        env::remove_var(KUBECONFIG);
        match original_home {
            Some(home) => env::set_var("HOME", home),
            None => env::remove_var("HOME"),
        }
    }

    #[tokio::test]
    async fn test_missing_kubeconfig_is_an_error() {
        let path = env::temp_dir().join("kube-pod-logger-missing").join("config");
        let error = init_kube_client(Some(path.clone())).await.err().unwrap();
        assert!(error.to_string().contains(&path.display().to_string()));
    }

    #[tokio::test]
    async fn test_malformed_kubeconfig_is_an_error() {
        let dir = env::temp_dir().join("kube-pod-logger-malformed");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config");
        fs::write(&path, "clusters: [this is: not valid").unwrap();
        let error = init_kube_client(Some(path.clone())).await.err().unwrap();
        assert!(error.to_string().starts_with("Failed to read kubeconfig file"));
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_panic_message() {
        let payload = std::panic::catch_unwind(|| panic!("watch loop exploded")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "watch loop exploded");

        let pod = "web-1";
        let payload = std::panic::catch_unwind(|| panic!("bad pod {}", pod)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "bad pod web-1");

        let payload = std::panic::catch_unwind(|| std::panic::panic_any(42)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
