use std::path::PathBuf;

use wagate::config::default_store_path;
use wagate::session::{IdentityCredentials, CREDS_KEY};
use wagate::store::CredentialStore;

/// Inspect the persisted session state
///
/// Reports whether a paired identity is persisted, its registration id and
/// self identity (when known), and how many key records the store holds.
/// Live connection state belongs to the embedding application and is not
/// visible here.
pub async fn execute(store_path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let store_path = store_path
        .map(PathBuf::from)
        .unwrap_or_else(default_store_path);

    println!("Wagate Session Status");
    println!("Store: {}", store_path.display());
    println!();

    if !store_path.exists() {
        println!("No persisted session found. Nothing has been paired yet.");
        return Ok(());
    }

    let store = CredentialStore::open(&store_path).await?;

    match store.read(CREDS_KEY).await {
        Some(value) => match serde_json::from_value::<IdentityCredentials>(value) {
            Ok(creds) => {
                println!("Paired session: yes");
                println!("Registration id: {}", creds.registration_id);
                let noise_hex = hex::encode(&creds.noise_key.public);
                println!("Noise key: {}…", &noise_hex[..noise_hex.len().min(16)]);
                match creds.me {
                    Some(me) => {
                        println!("Account: {} ({})", me.display_name, me.address);
                        println!("Transport: {}", me.transport);
                    }
                    None => println!("Account: not yet connected"),
                }
            }
            Err(e) => {
                println!("Paired session: unreadable ({e})");
                println!("A hard reset will regenerate the identity on next connect.");
            }
        },
        None => println!("Paired session: no (pairing required on next connect)"),
    }

    println!("Key records: {}", store.count().await);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_status_with_missing_store() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.db");

        let result = execute(Some(missing.to_string_lossy().to_string())).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_status_with_unpaired_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("session.db");
        CredentialStore::open(&path).await.unwrap();

        let result = execute(Some(path.to_string_lossy().to_string())).await;

        assert!(result.is_ok());
    }
}
