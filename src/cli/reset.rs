use std::io::{self, Write};
use std::path::PathBuf;

use wagate::config::default_store_path;
use wagate::store::CredentialStore;

/// Wipe the persisted session
///
/// Destroys every credential record so the next initialization generates a
/// fresh identity and requires scanning a new pairing code. Equivalent to the
/// destructive half of a hard reset, for operators working on a stopped
/// gateway.
pub async fn execute(store_path: Option<String>, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store_path = store_path
        .map(PathBuf::from)
        .unwrap_or_else(default_store_path);

    if !store_path.exists() {
        return Err(format!(
            "Store not found at: {}\nNothing to reset.",
            store_path.display()
        )
        .into());
    }

    if !yes {
        print!(
            "This permanently deletes the persisted session at {} and forces \
             re-pairing. Continue? [y/N] ",
            store_path.display()
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let store = CredentialStore::open(&store_path).await?;
    let records = store.count().await;
    store.wipe_all().await;

    println!("Wiped {} credential record(s).", records);
    println!("The gateway will require QR pairing on its next initialization.");

    Ok(())
}
